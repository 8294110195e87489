use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use super::store::{JobStore, MoleculeStore, StoreError};
use crate::models::job::{JobMeta, JobRecord, JobStatus};
use crate::models::molecule::MoleculeKind;

const HASH_CONSTRAINT: &str = "jobs_job_type_hash_value_idx";

/// PostgreSQL-backed job and molecule store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn record_from_row(row: &PgRow) -> Result<JobRecord, StoreError> {
    let status_str: String = row.try_get("status")?;
    let status = JobStatus::from_str(&status_str)
        .map_err(|_| StoreError::Decode(format!("unknown job status '{}'", status_str)))?;

    Ok(JobRecord {
        meta: JobMeta {
            id: row.try_get("id")?,
            status,
            error: row.try_get("error")?,
            error_detailed: row.try_get("error_detailed")?,
            date_created: row.try_get("date_created")?,
            date_last_accessed: row.try_get("date_last_accessed")?,
            hash_value: row.try_get("hash_value")?,
        },
        job_type: row.try_get("job_type")?,
        payload: row.try_get("payload")?,
    })
}

fn map_save_error(err: sqlx::Error, record: &JobRecord) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() && db_err.constraint() == Some(HASH_CONSTRAINT) {
            return StoreError::DuplicateHash {
                job_type: record.job_type.clone(),
                hash_value: record.meta.hash_value.clone().unwrap_or_default(),
            };
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl JobStore for PgStore {
    async fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, job_type, status, error, error_detailed,
                              date_created, date_last_accessed, hash_value, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status,
                error = EXCLUDED.error,
                error_detailed = EXCLUDED.error_detailed,
                date_last_accessed = EXCLUDED.date_last_accessed,
                hash_value = EXCLUDED.hash_value,
                payload = EXCLUDED.payload
            "#,
        )
        .bind(record.meta.id)
        .bind(&record.job_type)
        .bind(record.meta.status.to_string())
        .bind(&record.meta.error)
        .bind(&record.meta.error_detailed)
        .bind(record.meta.date_created)
        .bind(record.meta.date_last_accessed)
        .bind(&record.meta.hash_value)
        .bind(&record.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| map_save_error(e, record))?;

        Ok(())
    }

    async fn get(&self, job_type: &str, id: Uuid) -> Result<Option<JobRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, job_type, status, error, error_detailed,
                   date_created, date_last_accessed, hash_value, payload
            FROM jobs
            WHERE job_type = $1 AND id = $2
            "#,
        )
        .bind(job_type)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn find_by_hash(
        &self,
        job_type: &str,
        hash_value: &str,
    ) -> Result<Option<JobRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, job_type, status, error, error_detailed,
                   date_created, date_last_accessed, hash_value, payload
            FROM jobs
            WHERE job_type = $1 AND hash_value = $2
            "#,
        )
        .bind(job_type)
        .bind(hash_value)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn delete(&self, job_type: &str, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM jobs WHERE job_type = $1 AND id = $2")
            .bind(job_type)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, job_type: &str) -> Result<Vec<JobRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, job_type, status, error, error_detailed,
                   date_created, date_last_accessed, hash_value, payload
            FROM jobs
            WHERE job_type = $1
            ORDER BY date_created ASC
            "#,
        )
        .bind(job_type)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}

#[async_trait]
impl MoleculeStore for PgStore {
    async fn save_molecule(
        &self,
        kind: MoleculeKind,
        id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO molecules (id, kind, payload)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET payload = EXCLUDED.payload
            "#,
        )
        .bind(id)
        .bind(kind.to_string())
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn molecule_ids(&self, kind: MoleculeKind) -> Result<Vec<Uuid>, StoreError> {
        let rows = sqlx::query("SELECT id FROM molecules WHERE kind = $1 ORDER BY date_created ASC")
            .bind(kind.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| r.try_get("id").map_err(StoreError::from))
            .collect()
    }

    async fn delete_molecule(&self, kind: MoleculeKind, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM molecules WHERE kind = $1 AND id = $2")
            .bind(kind.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
