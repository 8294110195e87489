use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::db::store::{JobStore, StoreError};
use crate::models::hashable::{Fingerprint, HashError};
use crate::services::queue::QueueError;

/// Lifecycle status of a job: `pending -> running -> {success, failure}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failure,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }
}

/// Columns shared by every job type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobMeta {
    pub id: Uuid,
    pub status: JobStatus,
    pub error: Option<String>,
    pub error_detailed: Option<String>,
    pub date_created: DateTime<Utc>,
    pub date_last_accessed: DateTime<Utc>,
    /// Fingerprint of the declared hash attributes; unique per job type when set.
    pub hash_value: Option<String>,
}

impl Default for JobMeta {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            error: None,
            error_detailed: None,
            date_created: now,
            date_last_accessed: now,
            hash_value: None,
        }
    }
}

/// A job as the store sees it: shared columns plus the tool-specific fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    #[serde(flatten)]
    pub meta: JobMeta,
    pub job_type: String,
    pub payload: serde_json::Value,
}

/// A persisted unit of asynchronous tool work with cached-result semantics.
///
/// Implementors keep their [`JobMeta`] out of the serialized payload
/// (`#[serde(skip)]`); it travels in the record's own columns instead.
pub trait Job: Fingerprint + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Discriminator used by the store and the task queue.
    const JOB_TYPE: &'static str;
    /// Human-readable tool name used in error messages.
    const TOOL_NAME: &'static str;

    fn meta(&self) -> &JobMeta;
    fn meta_mut(&mut self) -> &mut JobMeta;

    fn id(&self) -> Uuid {
        self.meta().id
    }

    /// Compute the fingerprint of the current hash attributes and store it in
    /// memory. Persisting it is the caller's job.
    fn set_hash_value(&mut self) -> Result<(), HashError> {
        let bytes = self.generate_hashable_bytes()?;
        self.meta_mut().hash_value = Some(format!("{:x}", Sha256::digest(&bytes)));
        Ok(())
    }

    fn to_record(&self) -> Result<JobRecord, serde_json::Error> {
        Ok(JobRecord {
            meta: self.meta().clone(),
            job_type: Self::JOB_TYPE.to_string(),
            payload: serde_json::to_value(self)?,
        })
    }

    fn from_record(record: JobRecord) -> Result<Self, serde_json::Error> {
        let mut job: Self = serde_json::from_value(record.payload)?;
        *job.meta_mut() = record.meta;
        Ok(job)
    }
}

/// Persist `job`, refreshing its last-access date.
pub async fn save_job<J: Job>(job: &mut J, store: &dyn JobStore) -> Result<(), JobError> {
    job.meta_mut().date_last_accessed = Utc::now();
    store.save(&job.to_record()?).await?;
    Ok(())
}

pub async fn load_job<J: Job>(store: &dyn JobStore, id: Uuid) -> Result<Option<J>, JobError> {
    match store.get(J::JOB_TYPE, id).await? {
        Some(record) => Ok(Some(J::from_record(record)?)),
        None => Ok(None),
    }
}

/// Look up a persisted job of the same type with an equal fingerprint,
/// computing the fingerprint first if it is unset. Does not write to the store.
pub async fn retrieve_from_cache<J: Job>(
    job: &mut J,
    store: &dyn JobStore,
) -> Result<Option<J>, JobError> {
    if job.meta().hash_value.is_none() {
        job.set_hash_value()?;
    }
    let hash_value = match job.meta().hash_value.as_deref() {
        Some(hash_value) => hash_value.to_string(),
        None => return Ok(None),
    };

    match store.find_by_hash(J::JOB_TYPE, &hash_value).await? {
        Some(record) => Ok(Some(J::from_record(record)?)),
        None => Ok(None),
    }
}

/// Error returned by a tool-specific work function.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Fingerprint error: {0}")]
    Hash(#[from] HashError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Payload serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No {job_type} job with id {id}")]
    NotFound { job_type: &'static str, id: Uuid },

    #[error("No task registered for job type {0}")]
    UnknownJobType(String),

    #[error("Task failed: {0}")]
    Task(#[source] TaskError),
}
