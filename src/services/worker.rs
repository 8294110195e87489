//! Queue consumer that dispatches jobs to their tool-specific tasks.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

use crate::db::store::{JobStore, MoleculeStore};
use crate::models::job::{Job, JobError};
use crate::services::cleanup;
use crate::services::job_handler::{execute_job, JobTask};
use crate::services::queue::{JobQueue, QueueError};

const POLL_INTERVAL_MS: u64 = 1000;

type Executor =
    Box<dyn Fn(Uuid, Arc<dyn JobStore>) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync>;

/// Maps job types to the task that executes them.
#[derive(Default)]
pub struct TaskRegistry {
    executors: HashMap<&'static str, Executor>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` for jobs of type `J`, replacing any earlier registration.
    pub fn register<J, T>(&mut self, task: T) -> &mut Self
    where
        J: Job,
        T: JobTask<J> + 'static,
    {
        let task = Arc::new(task);
        let executor: Executor = Box::new(move |job_id, store| {
            let task = Arc::clone(&task);
            async move { execute_job::<J, T>(task.as_ref(), job_id, store.as_ref()).await }.boxed()
        });
        self.executors.insert(J::JOB_TYPE, executor);
        self
    }

    pub fn is_registered(&self, job_type: &str) -> bool {
        self.executors.contains_key(job_type)
    }

    pub async fn dispatch(
        &self,
        job_type: &str,
        job_id: Uuid,
        store: Arc<dyn JobStore>,
    ) -> Result<(), JobError> {
        let executor = self
            .executors
            .get(job_type)
            .ok_or_else(|| JobError::UnknownJobType(job_type.to_string()))?;
        executor(job_id, store).await
    }
}

pub struct Worker<S> {
    queue: Arc<JobQueue>,
    store: Arc<S>,
    registry: TaskRegistry,
    cache_time: chrono::Duration,
    cleanup_interval: Duration,
}

impl<S> Worker<S>
where
    S: JobStore + MoleculeStore + 'static,
{
    pub fn new(
        queue: Arc<JobQueue>,
        store: Arc<S>,
        registry: TaskRegistry,
        cache_time: chrono::Duration,
        cleanup_interval: Duration,
    ) -> Self {
        Self {
            queue,
            store,
            registry,
            cache_time,
            cleanup_interval,
        }
    }

    /// Process the next queued job.
    /// Returns Ok(true) if a job was processed, Ok(false) if none was available.
    pub async fn process_next(&self) -> Result<bool, QueueError> {
        let queued = match self.queue.dequeue().await? {
            Some(queued) => queued,
            None => return Ok(false),
        };

        tracing::info!(job_id = %queued.job_id, job_type = %queued.job_type, "Processing job");

        let store: Arc<dyn JobStore> = self.store.clone();
        let outcome = AssertUnwindSafe(self.registry.dispatch(&queued.job_type, queued.job_id, store))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            // Task failures are already recorded on the job itself.
            Ok(Err(e @ JobError::Task(_))) => {
                tracing::warn!(job_id = %queued.job_id, error = %e, "Job finished with failure");
            }
            Ok(Err(e)) => {
                tracing::error!(job_id = %queued.job_id, error = %e, "Job could not be executed");
            }
            Err(_) => {
                tracing::error!(job_id = %queued.job_id, "Job task panicked");
            }
        }

        self.queue.complete(&queued).await?;
        Ok(true)
    }

    /// Poll the queue forever, running the cleanup sweep alongside.
    pub async fn run(self) {
        let _sweep = cleanup::spawn_cleanup(
            Arc::clone(&self.store),
            self.cache_time,
            self.cleanup_interval,
        );

        tracing::info!("Worker ready, starting job processing loop");

        loop {
            match self.process_next().await {
                Ok(true) => {
                    tracing::debug!("Job processed, checking for next job");
                }
                Ok(false) => {
                    tracing::trace!("No jobs available, sleeping");
                    sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Error processing job, will retry");
                    sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::job::{load_job, save_job, JobStatus, TaskError};
    use crate::models::molecule::Protein;
    use crate::models::tools::ProtossJob;
    use async_trait::async_trait;

    struct AddHydrogens;

    #[async_trait]
    impl JobTask<ProtossJob> for AddHydrogens {
        async fn run(&self, job: &mut ProtossJob, _store: &dyn JobStore) -> Result<(), TaskError> {
            let mut output = job.input_protein.clone();
            output.file_string.push_str("\nHETATM");
            job.output_protein = Some(output);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_runs_registered_task() {
        let store = Arc::new(MemoryStore::new());
        let mut job = ProtossJob::new(Protein::new("4agm", "ATOM"));
        save_job(&mut job, store.as_ref()).await.unwrap();

        let mut registry = TaskRegistry::new();
        registry.register::<ProtossJob, _>(AddHydrogens);
        assert!(registry.is_registered("protoss"));

        registry.dispatch("protoss", job.id(), store.clone()).await.unwrap();

        let stored: ProtossJob = load_job(store.as_ref(), job.id()).await.unwrap().unwrap();
        assert_eq!(stored.meta.status, JobStatus::Success);
        assert!(stored.output_protein.is_some());
    }

    #[tokio::test]
    async fn test_dispatch_rejects_unknown_job_type() {
        let registry = TaskRegistry::new();
        let err = registry
            .dispatch("docking", Uuid::new_v4(), Arc::new(MemoryStore::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::UnknownJobType(t) if t == "docking"));
    }
}
