use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Register descriptions for the job metrics recorded by the orchestrator.
pub fn describe_job_metrics() {
    metrics::describe_counter!(
        "proteins_plus_jobs_submitted_total",
        "Total jobs submitted, including cache hits"
    );
    metrics::describe_counter!(
        "proteins_plus_cache_hits_total",
        "Submissions answered with an equivalent cached job"
    );
    metrics::describe_counter!(
        "proteins_plus_jobs_succeeded_total",
        "Total jobs that finished successfully"
    );
    metrics::describe_counter!(
        "proteins_plus_jobs_failed_total",
        "Total jobs that failed"
    );
    metrics::describe_histogram!(
        "proteins_plus_job_duration_seconds",
        "Time spent running a job's task"
    );
}

/// Prometheus scrape endpoint in text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
