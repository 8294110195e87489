//! Submission and execution workflow shared by every tool.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt::Write;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use uuid::Uuid;

use crate::db::store::{JobStore, StoreError};
use crate::models::job::{load_job, retrieve_from_cache, save_job, Job, JobError, JobStatus, TaskError};
use crate::models::response::SubmitResponse;
use crate::services::queue::TaskRunner;

/// Tool-specific work run once a job is `running`. Implementations may mutate
/// the job's output fields and persist them themselves.
#[async_trait]
pub trait JobTask<J: Job>: Send + Sync {
    async fn run(&self, job: &mut J, store: &dyn JobStore) -> Result<(), TaskError>;
}

/// Return an equivalent cached job, or persist and enqueue `job`.
///
/// Caching is skipped when `use_cache` is false and, unconditionally, for job
/// types without hash attributes. When a concurrent submit wins the insert
/// race for the same fingerprint, the winner is returned as the cached job.
pub async fn submit_job<J: Job>(
    mut job: J,
    store: &dyn JobStore,
    runner: &dyn TaskRunner,
    use_cache: bool,
) -> Result<SubmitResponse, JobError> {
    metrics::counter!("proteins_plus_jobs_submitted_total", "job_type" => J::JOB_TYPE)
        .increment(1);

    let cacheable = use_cache && !job.hash_attributes().is_empty();
    if cacheable {
        if let Some(cached) = retrieve_from_cache(&mut job, store).await? {
            return Ok(cache_hit(&cached));
        }
    } else {
        // Uncached jobs never hold a fingerprint, so they cannot collide.
        job.meta_mut().hash_value = None;
    }

    match save_job(&mut job, store).await {
        Ok(()) => {}
        Err(JobError::Store(StoreError::DuplicateHash { .. })) if cacheable => {
            tracing::info!(
                job_type = J::JOB_TYPE,
                hash_value = ?job.meta().hash_value,
                "Lost submit race, serving the concurrently inserted job"
            );
            if let Some(cached) = retrieve_from_cache(&mut job, store).await? {
                return Ok(cache_hit(&cached));
            }
            return Err(JobError::Store(StoreError::DuplicateHash {
                job_type: J::JOB_TYPE.to_string(),
                hash_value: job.meta().hash_value.clone().unwrap_or_default(),
            }));
        }
        Err(e) => return Err(e),
    }

    runner.enqueue(J::JOB_TYPE, job.id()).await?;

    tracing::info!(job_id = %job.id(), job_type = J::JOB_TYPE, "Submitted job");

    Ok(SubmitResponse {
        job_id: job.id(),
        retrieved_from_cache: false,
    })
}

fn cache_hit<J: Job>(cached: &J) -> SubmitResponse {
    metrics::counter!("proteins_plus_cache_hits_total", "job_type" => J::JOB_TYPE).increment(1);
    tracing::info!(job_id = %cached.id(), job_type = J::JOB_TYPE, "Retrieved job from cache");

    SubmitResponse {
        job_id: cached.id(),
        retrieved_from_cache: true,
    }
}

/// Run `task` on the stored job `job_id`, guarding the status lifecycle.
///
/// On failure the job records a templated error, the diagnostic text and a
/// cleared hash value before the error (or panic) is passed back to the caller.
/// Jobs already in a terminal state are left untouched.
pub async fn execute_job<J, T>(task: &T, job_id: Uuid, store: &dyn JobStore) -> Result<(), JobError>
where
    J: Job,
    T: JobTask<J> + ?Sized,
{
    tracing::info!(job_id = %job_id, job_type = J::JOB_TYPE, "Started task");

    let mut job: J = load_job(store, job_id).await?.ok_or(JobError::NotFound {
        job_type: J::JOB_TYPE,
        id: job_id,
    })?;

    // Redelivered jobs that already finished are never resurrected.
    if job.meta().status.is_terminal() {
        tracing::warn!(
            job_id = %job_id,
            job_type = J::JOB_TYPE,
            status = %job.meta().status,
            "Skipping job that already finished"
        );
        return Ok(());
    }

    job.meta_mut().status = JobStatus::Running;
    save_job(&mut job, store).await?;

    let start = Instant::now();
    let outcome = AssertUnwindSafe(task.run(&mut job, store)).catch_unwind().await;
    metrics::histogram!("proteins_plus_job_duration_seconds", "job_type" => J::JOB_TYPE)
        .record(start.elapsed().as_secs_f64());

    match outcome {
        Ok(Ok(())) => {
            job.meta_mut().status = JobStatus::Success;
            save_job(&mut job, store).await?;

            metrics::counter!("proteins_plus_jobs_succeeded_total", "job_type" => J::JOB_TYPE)
                .increment(1);
            tracing::info!(job_id = %job_id, job_type = J::JOB_TYPE, "Successfully finished task");
            Ok(())
        }
        Ok(Err(error)) => {
            let detailed = describe_error(&*error);
            record_failure(&mut job, detailed, store).await?;
            Err(JobError::Task(error))
        }
        Err(payload) => {
            let detailed = describe_panic(payload.as_ref());
            // The panic is resumed even when the failure cannot be recorded.
            let _ = record_failure(&mut job, detailed, store).await;
            std::panic::resume_unwind(payload)
        }
    }
}

async fn record_failure<J: Job>(
    job: &mut J,
    detailed: String,
    store: &dyn JobStore,
) -> Result<(), JobError> {
    let meta = job.meta_mut();
    meta.status = JobStatus::Failure;
    meta.hash_value = None;
    meta.error = Some(format!(
        "An error occurred during the execution of {}.",
        J::TOOL_NAME
    ));
    meta.error_detailed = Some(detailed);
    if let Err(e) = save_job(job, store).await {
        tracing::error!(
            job_id = %job.id(),
            job_type = J::JOB_TYPE,
            error = %e,
            task_error = job.meta().error_detailed.as_deref().unwrap_or_default(),
            "Failed to record job failure"
        );
        return Err(e);
    }

    metrics::counter!("proteins_plus_jobs_failed_total", "job_type" => J::JOB_TYPE).increment(1);
    tracing::error!(
        job_id = %job.id(),
        job_type = J::JOB_TYPE,
        error = job.meta().error_detailed.as_deref().unwrap_or_default(),
        "Error occurred during execution of task"
    );
    Ok(())
}

fn describe_error(error: &(dyn Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(text, "\nCaused by: {}", cause);
        source = cause.source();
    }
    let _ = write!(text, "\n\n{:?}\n\nBacktrace:\n{}", error, Backtrace::force_capture());
    text
}

fn describe_panic(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("Task panicked: {}\n\nBacktrace:\n{}", message, Backtrace::force_capture())
}
