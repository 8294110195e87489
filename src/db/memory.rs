//! In-process store with the same uniqueness rules as the PostgreSQL schema.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use super::store::{JobStore, MoleculeStore, StoreError};
use crate::models::job::JobRecord;
use crate::models::molecule::MoleculeKind;

#[derive(Default)]
struct State {
    jobs: HashMap<Uuid, JobRecord>,
    molecules: HashMap<(MoleculeKind, Uuid), serde_json::Value>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_count(&self) -> usize {
        self.state.lock().jobs.len()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if let Some(hash_value) = &record.meta.hash_value {
            let taken = state.jobs.values().any(|other| {
                other.meta.id != record.meta.id
                    && other.job_type == record.job_type
                    && other.meta.hash_value.as_ref() == Some(hash_value)
            });
            if taken {
                return Err(StoreError::DuplicateHash {
                    job_type: record.job_type.clone(),
                    hash_value: hash_value.clone(),
                });
            }
        }
        state.jobs.insert(record.meta.id, record.clone());
        Ok(())
    }

    async fn get(&self, job_type: &str, id: Uuid) -> Result<Option<JobRecord>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .jobs
            .get(&id)
            .filter(|record| record.job_type == job_type)
            .cloned())
    }

    async fn find_by_hash(
        &self,
        job_type: &str,
        hash_value: &str,
    ) -> Result<Option<JobRecord>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .jobs
            .values()
            .find(|record| {
                record.job_type == job_type && record.meta.hash_value.as_deref() == Some(hash_value)
            })
            .cloned())
    }

    async fn delete(&self, job_type: &str, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        match state.jobs.get(&id) {
            Some(record) if record.job_type == job_type => {
                state.jobs.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, job_type: &str) -> Result<Vec<JobRecord>, StoreError> {
        let state = self.state.lock();
        let mut records: Vec<JobRecord> = state
            .jobs
            .values()
            .filter(|record| record.job_type == job_type)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.meta.date_created);
        Ok(records)
    }
}

#[async_trait]
impl MoleculeStore for MemoryStore {
    async fn save_molecule(
        &self,
        kind: MoleculeKind,
        id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<(), StoreError> {
        self.state.lock().molecules.insert((kind, id), payload.clone());
        Ok(())
    }

    async fn molecule_ids(&self, kind: MoleculeKind) -> Result<Vec<Uuid>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .molecules
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
            .collect())
    }

    async fn delete_molecule(&self, kind: MoleculeKind, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.state.lock().molecules.remove(&(kind, id)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobMeta;
    use serde_json::json;

    fn record(job_type: &str, hash_value: Option<&str>) -> JobRecord {
        JobRecord {
            meta: JobMeta {
                hash_value: hash_value.map(str::to_string),
                ..JobMeta::default()
            },
            job_type: job_type.to_string(),
            payload: json!({}),
        }
    }

    #[tokio::test]
    async fn test_duplicate_hash_is_rejected_per_type() {
        let store = MemoryStore::new();
        store.save(&record("dogsite", Some("abc"))).await.unwrap();

        let err = store.save(&record("dogsite", Some("abc"))).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateHash { .. }));

        // Same hash under another job type is fine.
        store.save(&record("protoss", Some("abc"))).await.unwrap();
        assert_eq!(store.job_count(), 2);
    }

    #[tokio::test]
    async fn test_null_hashes_never_collide() {
        let store = MemoryStore::new();
        store.save(&record("dogsite", None)).await.unwrap();
        store.save(&record("dogsite", None)).await.unwrap();
        assert_eq!(store.list("dogsite").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resave_keeps_own_hash() {
        let store = MemoryStore::new();
        let mut job = record("dogsite", Some("abc"));
        store.save(&job).await.unwrap();
        job.payload = json!({"chain_id": "A"});
        store.save(&job).await.unwrap();

        let found = store.find_by_hash("dogsite", "abc").await.unwrap().unwrap();
        assert_eq!(found.payload, json!({"chain_id": "A"}));
    }

    #[tokio::test]
    async fn test_lookup_is_scoped_to_job_type() {
        let store = MemoryStore::new();
        let job = record("dogsite", Some("abc"));
        store.save(&job).await.unwrap();

        assert!(store.get("protoss", job.meta.id).await.unwrap().is_none());
        assert!(!store.delete("protoss", job.meta.id).await.unwrap());
        assert!(store.delete("dogsite", job.meta.id).await.unwrap());
        assert!(store.get("dogsite", job.meta.id).await.unwrap().is_none());
    }
}
