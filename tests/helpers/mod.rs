//! Shared doubles for orchestrator tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use proteins_plus::{
    db::store::JobStore,
    models::{job::TaskError, molecule::ProteinSite, tools::DoGSiteJob},
    services::{job_handler::JobTask, queue::{QueueError, TaskRunner}},
};
use serde_json::json;
use uuid::Uuid;

/// Task runner that records enqueued jobs instead of executing them.
#[derive(Default)]
pub struct RecordingRunner {
    pub enqueued: Mutex<Vec<(String, Uuid)>>,
}

impl RecordingRunner {
    pub fn count(&self) -> usize {
        self.enqueued.lock().len()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.enqueued.lock().iter().map(|(_, id)| *id).collect()
    }
}

#[async_trait]
impl TaskRunner for RecordingRunner {
    async fn enqueue(&self, job_type: &str, job_id: Uuid) -> Result<(), QueueError> {
        self.enqueued.lock().push((job_type.to_string(), job_id));
        Ok(())
    }
}

/// Fills in a single detected pocket.
pub struct DetectPockets;

#[async_trait]
impl JobTask<DoGSiteJob> for DetectPockets {
    async fn run(&self, job: &mut DoGSiteJob, _store: &dyn JobStore) -> Result<(), TaskError> {
        job.output_pockets.push(ProteinSite::new(json!({
            "residue_ids": [{"name": "ALA", "position": "12", "chain": "A"}]
        })));
        job.dogsite_info = Some(json!({"pockets": 1}));
        Ok(())
    }
}

/// Fails like a tool binary exiting with an error.
pub struct BrokenBinary;

#[async_trait]
impl JobTask<DoGSiteJob> for BrokenBinary {
    async fn run(&self, _job: &mut DoGSiteJob, _store: &dyn JobStore) -> Result<(), TaskError> {
        Err("dogsite exited with status 1".into())
    }
}

/// Panics inside the tool wrapper.
pub struct PanickingTask;

#[async_trait]
impl JobTask<DoGSiteJob> for PanickingTask {
    async fn run(&self, _job: &mut DoGSiteJob, _store: &dyn JobStore) -> Result<(), TaskError> {
        panic!("pocket grid index out of range")
    }
}
