//! Expiry of jobs that have not been accessed within the cache time, and of
//! molecules no surviving job refers to.

use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::db::store::{JobStore, MoleculeStore, StoreError};
use crate::models::job::{Job, JobRecord};
use crate::models::molecule::MoleculeKind;
use crate::models::tools::{
    DoGSiteJob, EdiaJob, GeoMineJob, MetalizerJob, PoseviewJob, PreprocessorJob, ProtossJob, SienaJob,
    StructureProfilerJob,
};

/// Every job type whose rows are subject to expiry.
pub const JOB_TYPES: &[&str] = &[
    DoGSiteJob::JOB_TYPE,
    EdiaJob::JOB_TYPE,
    GeoMineJob::JOB_TYPE,
    MetalizerJob::JOB_TYPE,
    PoseviewJob::JOB_TYPE,
    PreprocessorJob::JOB_TYPE,
    ProtossJob::JOB_TYPE,
    SienaJob::JOB_TYPE,
    StructureProfilerJob::JOB_TYPE,
];

pub const MOLECULE_KINDS: &[MoleculeKind] = &[
    MoleculeKind::Protein,
    MoleculeKind::Ligand,
    MoleculeKind::ProteinSite,
    MoleculeKind::ElectronDensityMap,
];

/// How a job relates to a molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationRole {
    /// The job consumes the molecule as an input.
    Child,
    /// The job produced the molecule.
    Parent,
}

/// Where a job payload stores the referenced molecule.
#[derive(Debug, Clone, Copy)]
pub enum RelationField {
    /// JSON pointer to the molecule object.
    One(&'static str),
    /// JSON pointer to an array of molecule objects.
    Many(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct JobRelation {
    pub job_type: &'static str,
    pub field: RelationField,
    pub role: RelationRole,
}

const fn child(job_type: &'static str, pointer: &'static str) -> JobRelation {
    JobRelation {
        job_type,
        field: RelationField::One(pointer),
        role: RelationRole::Child,
    }
}

const fn parent(job_type: &'static str, field: RelationField) -> JobRelation {
    JobRelation {
        job_type,
        field,
        role: RelationRole::Parent,
    }
}

const PROTEIN_RELATIONS: &[JobRelation] = &[
    child(DoGSiteJob::JOB_TYPE, "/input_protein"),
    child(EdiaJob::JOB_TYPE, "/input_protein"),
    child(MetalizerJob::JOB_TYPE, "/input_protein"),
    child(PoseviewJob::JOB_TYPE, "/input_protein"),
    child(ProtossJob::JOB_TYPE, "/input_protein"),
    child(SienaJob::JOB_TYPE, "/input_protein"),
    child(StructureProfilerJob::JOB_TYPE, "/input_protein"),
    parent(EdiaJob::JOB_TYPE, RelationField::One("/output_protein")),
    parent(MetalizerJob::JOB_TYPE, RelationField::One("/output_protein")),
    parent(PreprocessorJob::JOB_TYPE, RelationField::One("/output_protein")),
    parent(ProtossJob::JOB_TYPE, RelationField::One("/output_protein")),
    parent(SienaJob::JOB_TYPE, RelationField::Many("/output_proteins")),
];

const LIGAND_RELATIONS: &[JobRelation] = &[
    child(DoGSiteJob::JOB_TYPE, "/input_ligand"),
    child(PoseviewJob::JOB_TYPE, "/input_ligand"),
    child(SienaJob::JOB_TYPE, "/input_ligand"),
    child(StructureProfilerJob::JOB_TYPE, "/input_ligand"),
];

const PROTEIN_SITE_RELATIONS: &[JobRelation] = &[
    child(SienaJob::JOB_TYPE, "/input_site"),
    parent(DoGSiteJob::JOB_TYPE, RelationField::Many("/output_pockets")),
];

const DENSITY_MAP_RELATIONS: &[JobRelation] = &[
    child(EdiaJob::JOB_TYPE, "/electron_density_map"),
    child(StructureProfilerJob::JOB_TYPE, "/electron_density_map"),
    parent(DoGSiteJob::JOB_TYPE, RelationField::Many("/output_densities")),
];

/// The jobs that may refer to a molecule of `kind`.
pub fn relations_for(kind: MoleculeKind) -> &'static [JobRelation] {
    match kind {
        MoleculeKind::Protein => PROTEIN_RELATIONS,
        MoleculeKind::Ligand => LIGAND_RELATIONS,
        MoleculeKind::ProteinSite => PROTEIN_SITE_RELATIONS,
        MoleculeKind::ElectronDensityMap => DENSITY_MAP_RELATIONS,
    }
}

impl JobRelation {
    /// Whether `record` refers to the molecule `id` through this relation.
    pub fn references(&self, record: &JobRecord, id: Uuid) -> bool {
        let id = id.to_string();
        let matches = |value: &serde_json::Value| value.get("id").and_then(|v| v.as_str()) == Some(id.as_str());

        match self.field {
            RelationField::One(pointer) => record.payload.pointer(pointer).is_some_and(matches),
            RelationField::Many(pointer) => record
                .payload
                .pointer(pointer)
                .and_then(|v| v.as_array())
                .is_some_and(|items| items.iter().any(matches)),
        }
    }
}

fn is_stale(record: &JobRecord, cache_time: Duration) -> bool {
    Utc::now() - record.meta.date_last_accessed > cache_time
}

/// Delete `record` if it has not been accessed within `cache_time`.
pub async fn clean_up_job(
    store: &dyn JobStore,
    record: &JobRecord,
    cache_time: Duration,
) -> Result<bool, StoreError> {
    if !is_stale(record, cache_time) {
        return Ok(false);
    }
    tracing::info!(job_id = %record.meta.id, job_type = %record.job_type, "Removing stale job");
    store.delete(&record.job_type, record.meta.id).await?;
    Ok(true)
}

/// Delete the stale jobs of one type. Returns how many were removed.
pub async fn clean_up_jobs(
    store: &dyn JobStore,
    job_type: &str,
    cache_time: Duration,
) -> Result<usize, StoreError> {
    let mut removed = 0;
    for record in store.list(job_type).await? {
        if clean_up_job(store, &record, cache_time).await? {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Clean up the jobs related to each molecule of `kind`, then delete every
/// molecule left without a related job. Returns how many molecules were removed.
pub async fn clean_up_molecules(
    jobs: &dyn JobStore,
    molecules: &dyn MoleculeStore,
    kind: MoleculeKind,
    cache_time: Duration,
) -> Result<usize, StoreError> {
    let relations = relations_for(kind);

    let mut records: HashMap<&str, Vec<JobRecord>> = HashMap::new();
    for relation in relations {
        if !records.contains_key(relation.job_type) {
            records.insert(relation.job_type, jobs.list(relation.job_type).await?);
        }
    }

    let mut deleted_jobs: HashSet<Uuid> = HashSet::new();
    let mut removed = 0;

    for id in molecules.molecule_ids(kind).await? {
        let mut remaining = 0;
        for relation in relations {
            let related = records
                .get(relation.job_type)
                .into_iter()
                .flatten()
                .filter(|record| relation.references(record, id));

            for record in related {
                if deleted_jobs.contains(&record.meta.id) {
                    continue;
                }
                tracing::debug!(
                    molecule_id = %id,
                    job_id = %record.meta.id,
                    role = ?relation.role,
                    "Checking related job"
                );
                if clean_up_job(jobs, record, cache_time).await? {
                    deleted_jobs.insert(record.meta.id);
                } else {
                    remaining += 1;
                }
            }
        }

        if remaining == 0 {
            tracing::info!(molecule_id = %id, kind = %kind, "Removing unreferenced molecule");
            if molecules.delete_molecule(kind, id).await? {
                removed += 1;
            }
        }
    }

    Ok(removed)
}

/// Totals from one cleanup sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub jobs_removed: usize,
    pub molecules_removed: usize,
}

/// Expire stale jobs of every type, then unreferenced molecules of every kind.
pub async fn run_cleanup(
    jobs: &dyn JobStore,
    molecules: &dyn MoleculeStore,
    cache_time: Duration,
) -> Result<CleanupReport, StoreError> {
    let mut report = CleanupReport::default();
    for job_type in JOB_TYPES {
        report.jobs_removed += clean_up_jobs(jobs, job_type, cache_time).await?;
    }
    for kind in MOLECULE_KINDS {
        report.molecules_removed += clean_up_molecules(jobs, molecules, *kind, cache_time).await?;
    }
    tracing::info!(
        jobs_removed = report.jobs_removed,
        molecules_removed = report.molecules_removed,
        "Cleanup sweep finished"
    );
    Ok(report)
}

/// Run [`run_cleanup`] every `every` on a background task.
pub fn spawn_cleanup<S>(
    store: Arc<S>,
    cache_time: Duration,
    every: std::time::Duration,
) -> JoinHandle<()>
where
    S: JobStore + MoleculeStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = run_cleanup(store.as_ref(), store.as_ref(), cache_time).await {
                tracing::error!(error = %e, "Cleanup sweep failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::molecule::{save_molecule, ElectronDensityMap, Ligand, Protein, ProteinSite};
    use serde_json::json;

    fn days(n: i64) -> Duration {
        Duration::days(n)
    }

    async fn store_job<J: Job>(store: &MemoryStore, job: &J, age: Duration) -> JobRecord {
        let mut record = job.to_record().unwrap();
        record.meta.date_last_accessed = Utc::now() - age;
        store.save(&record).await.unwrap();
        record
    }

    #[tokio::test]
    async fn test_fresh_job_is_kept() {
        let store = MemoryStore::new();
        let record = store_job(&store, &ProtossJob::new(Protein::new("p", "ATOM")), days(1)).await;
        assert!(!clean_up_job(&store, &record, days(7)).await.unwrap());
        assert_eq!(store.job_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_job_is_removed() {
        let store = MemoryStore::new();
        let record = store_job(&store, &ProtossJob::new(Protein::new("p", "ATOM")), days(8)).await;
        assert!(clean_up_job(&store, &record, days(7)).await.unwrap());
        assert_eq!(store.job_count(), 0);
    }

    #[tokio::test]
    async fn test_clean_up_jobs_counts_removals() {
        let store = MemoryStore::new();
        store_job(&store, &GeoMineJob::new("a"), days(10)).await;
        store_job(&store, &GeoMineJob::new("b"), days(10)).await;
        store_job(&store, &GeoMineJob::new("c"), Duration::zero()).await;
        assert_eq!(clean_up_jobs(&store, "geomine", days(7)).await.unwrap(), 2);
        assert_eq!(store.job_count(), 1);
    }

    #[tokio::test]
    async fn test_molecule_with_fresh_job_survives() {
        let store = MemoryStore::new();
        let protein = Protein::new("p", "ATOM");
        save_molecule(&store, &protein).await.unwrap();
        store_job(&store, &DoGSiteJob::new(protein.clone()), days(1)).await;

        let removed = clean_up_molecules(&store, &store, MoleculeKind::Protein, days(7))
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(store.molecule_ids(MoleculeKind::Protein).await.unwrap(), vec![protein.id]);
    }

    #[tokio::test]
    async fn test_molecule_removed_with_its_stale_jobs() {
        let store = MemoryStore::new();
        let protein = Protein::new("p", "ATOM");
        save_molecule(&store, &protein).await.unwrap();
        store_job(&store, &DoGSiteJob::new(protein.clone()), days(30)).await;
        store_job(&store, &SienaJob::new(protein.clone()), days(30)).await;

        let removed = clean_up_molecules(&store, &store, MoleculeKind::Protein, days(7))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.job_count(), 0);
    }

    #[tokio::test]
    async fn test_output_molecule_counts_parent_job() {
        let store = MemoryStore::new();
        let output = Protein::new("ensemble", "ATOM");
        save_molecule(&store, &output).await.unwrap();

        let mut siena = SienaJob::new(Protein::new("query", "ATOM"));
        siena.output_proteins.push(output.clone());
        store_job(&store, &siena, days(1)).await;

        let removed = clean_up_molecules(&store, &store, MoleculeKind::Protein, days(7))
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn test_unreferenced_molecules_are_removed() {
        let store = MemoryStore::new();
        let ligand = Ligand::new("NAG", "sdf");
        save_molecule(&store, &ligand).await.unwrap();
        let site = ProteinSite::new(json!({"residue_ids": []}));
        save_molecule(&store, &site).await.unwrap();

        let report = run_cleanup(&store, &store, days(7)).await.unwrap();
        assert_eq!(report.molecules_removed, 2);
        assert!(store.molecule_ids(MoleculeKind::Ligand).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_density_map_kept_by_fresh_edia_job() {
        let store = MemoryStore::new();
        let map = ElectronDensityMap::new("/data/4agm.ccp4");
        save_molecule(&store, &map).await.unwrap();

        let mut job = EdiaJob::new(Protein::new("4agm", "ATOM"));
        job.electron_density_map = Some(map.clone());
        store_job(&store, &job, days(1)).await;

        let removed = clean_up_molecules(&store, &store, MoleculeKind::ElectronDensityMap, days(7))
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_relation_matching() {
        let protein = Protein::new("p", "ATOM");
        let record = DoGSiteJob::new(protein.clone()).to_record().unwrap();
        let relation = relations_for(MoleculeKind::Protein)[0];
        assert!(relation.references(&record, protein.id));
        assert!(!relation.references(&record, Uuid::new_v4()));
    }

    #[test]
    fn test_every_job_type_appears_in_registry() {
        for job_type in JOB_TYPES {
            if *job_type == GeoMineJob::JOB_TYPE {
                continue;
            }
            let related = MOLECULE_KINDS
                .iter()
                .any(|kind| relations_for(*kind).iter().any(|r| r.job_type == *job_type));
            assert!(related, "{} has no molecule relation", job_type);
        }
    }
}
