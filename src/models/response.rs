use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::job::{JobRecord, JobStatus};

/// Result of submitting a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub retrieved_from_cache: bool,
}

/// Response for querying a job.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub job_type: String,
    pub status: JobStatus,
    pub error: Option<String>,
    pub error_detailed: Option<String>,
    pub hash_value: Option<String>,
    pub date_created: DateTime<Utc>,
    pub date_last_accessed: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl From<JobRecord> for JobStatusResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.meta.id,
            job_type: record.job_type,
            status: record.meta.status,
            error: record.meta.error,
            error_detailed: record.meta.error_detailed,
            hash_value: record.meta.hash_value,
            date_created: record.meta.date_created,
            date_last_accessed: record.meta.date_last_accessed,
            payload: record.payload,
        }
    }
}
