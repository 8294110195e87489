use async_trait::async_trait;
use uuid::Uuid;

use crate::models::job::JobRecord;
use crate::models::molecule::MoleculeKind;

/// Persistence contract for jobs.
///
/// `save` is an upsert keyed by id. A non-null `hash_value` is unique per job
/// type; any number of rows may leave it null.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or update a job. Fails with [`StoreError::DuplicateHash`] when a
    /// different job of the same type already holds the same hash value.
    async fn save(&self, record: &JobRecord) -> Result<(), StoreError>;

    async fn get(&self, job_type: &str, id: Uuid) -> Result<Option<JobRecord>, StoreError>;

    async fn find_by_hash(
        &self,
        job_type: &str,
        hash_value: &str,
    ) -> Result<Option<JobRecord>, StoreError>;

    /// Returns whether a row was deleted.
    async fn delete(&self, job_type: &str, id: Uuid) -> Result<bool, StoreError>;

    async fn list(&self, job_type: &str) -> Result<Vec<JobRecord>, StoreError>;
}

/// Persistence contract for the molecule entities jobs consume and produce.
#[async_trait]
pub trait MoleculeStore: Send + Sync {
    async fn save_molecule(
        &self,
        kind: MoleculeKind,
        id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<(), StoreError>;

    async fn molecule_ids(&self, kind: MoleculeKind) -> Result<Vec<Uuid>, StoreError>;

    async fn delete_molecule(&self, kind: MoleculeKind, id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("A {job_type} job with hash value {hash_value} already exists")]
    DuplicateHash {
        job_type: String,
        hash_value: String,
    },

    #[error("Invalid stored value: {0}")]
    Decode(String),
}
