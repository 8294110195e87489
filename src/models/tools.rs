//! Job types of the wrapped scientific tools.
//!
//! Each job declares, in order, which of its inputs feed the fingerprint.
//! Outputs never do.

use garde::Validate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::hashable::{Fingerprint, HashAttr};
use crate::models::job::{Job, JobMeta};
use crate::models::molecule::{ElectronDensityMap, Ligand, Protein, ProteinSite};

/// Pocket detection with DoGSite.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DoGSiteJob {
    #[serde(skip)]
    #[garde(skip)]
    pub meta: JobMeta,

    #[garde(dive)]
    pub input_protein: Protein,
    #[garde(dive)]
    pub input_ligand: Option<Ligand>,
    /// Limits pocket detection to one chain; empty for all chains.
    #[garde(length(max = 2))]
    pub chain_id: String,
    #[garde(skip)]
    pub calc_subpockets: bool,
    /// Use the ligand position to bias pocket detection.
    #[garde(skip)]
    pub ligand_bias: bool,

    #[garde(skip)]
    #[serde(default)]
    pub output_pockets: Vec<ProteinSite>,
    #[garde(skip)]
    #[serde(default)]
    pub output_densities: Vec<ElectronDensityMap>,
    #[garde(skip)]
    pub dogsite_info: Option<serde_json::Value>,
}

impl DoGSiteJob {
    pub fn new(input_protein: Protein) -> Self {
        Self {
            meta: JobMeta::default(),
            input_protein,
            input_ligand: None,
            chain_id: String::new(),
            calc_subpockets: false,
            ligand_bias: false,
            output_pockets: Vec::new(),
            output_densities: Vec::new(),
            dogsite_info: None,
        }
    }
}

impl Fingerprint for DoGSiteJob {
    fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
        vec![
            ("input_protein", HashAttr::entity(&self.input_protein)),
            ("input_ligand", HashAttr::optional_entity(self.input_ligand.as_ref())),
            ("chain_id", HashAttr::text(&self.chain_id)),
            ("calc_subpockets", HashAttr::text(self.calc_subpockets)),
            ("ligand_bias", HashAttr::text(self.ligand_bias)),
        ]
    }
}

impl Job for DoGSiteJob {
    const JOB_TYPE: &'static str = "dogsite";
    const TOOL_NAME: &'static str = "DoGSite";

    fn meta(&self) -> &JobMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut JobMeta {
        &mut self.meta
    }
}

/// Hydrogen placement with Protoss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtossJob {
    #[serde(skip)]
    pub meta: JobMeta,
    pub input_protein: Protein,
    pub output_protein: Option<Protein>,
}

impl ProtossJob {
    pub fn new(input_protein: Protein) -> Self {
        Self {
            meta: JobMeta::default(),
            input_protein,
            output_protein: None,
        }
    }
}

impl Fingerprint for ProtossJob {
    fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
        vec![("input_protein", HashAttr::entity(&self.input_protein))]
    }
}

impl Job for ProtossJob {
    const JOB_TYPE: &'static str = "protoss";
    const TOOL_NAME: &'static str = "Protoss";

    fn meta(&self) -> &JobMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut JobMeta {
        &mut self.meta
    }
}

/// Metal placement with Metalizer.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MetalizerJob {
    #[serde(skip)]
    #[garde(skip)]
    pub meta: JobMeta,

    #[garde(dive)]
    pub input_protein: Protein,
    #[garde(skip)]
    pub residue_id: i32,
    #[garde(length(min = 1, max = 2))]
    pub chain_id: String,
    /// Element symbol of the metal.
    #[garde(length(min = 1, max = 2))]
    pub name: String,
    #[garde(range(min = 0.0))]
    pub distance_threshold: f64,

    #[garde(skip)]
    pub output_protein: Option<Protein>,
    #[garde(skip)]
    pub metalizer_result: Option<serde_json::Value>,
}

impl MetalizerJob {
    pub fn new(
        input_protein: Protein,
        residue_id: i32,
        chain_id: impl Into<String>,
        name: impl Into<String>,
        distance_threshold: f64,
    ) -> Self {
        Self {
            meta: JobMeta::default(),
            input_protein,
            residue_id,
            chain_id: chain_id.into(),
            name: name.into(),
            distance_threshold,
            output_protein: None,
            metalizer_result: None,
        }
    }
}

impl Fingerprint for MetalizerJob {
    fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
        vec![
            ("input_protein", HashAttr::entity(&self.input_protein)),
            ("residue_id", HashAttr::text(self.residue_id)),
            ("chain_id", HashAttr::text(&self.chain_id)),
            ("name", HashAttr::text(&self.name)),
            ("distance_threshold", HashAttr::text(self.distance_threshold)),
        ]
    }
}

impl Job for MetalizerJob {
    const JOB_TYPE: &'static str = "metalizer";
    const TOOL_NAME: &'static str = "Metalizer";

    fn meta(&self) -> &JobMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut JobMeta {
        &mut self.meta
    }
}

/// Geometric pattern search with GeoMine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoMineJob {
    #[serde(skip)]
    pub meta: JobMeta,
    /// Serialized query filter.
    pub filter_file: String,
    pub geomine_result: Option<serde_json::Value>,
    pub geomine_info: Option<serde_json::Value>,
}

impl GeoMineJob {
    pub fn new(filter_file: impl Into<String>) -> Self {
        Self {
            meta: JobMeta::default(),
            filter_file: filter_file.into(),
            geomine_result: None,
            geomine_info: None,
        }
    }
}

impl Fingerprint for GeoMineJob {
    fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
        vec![("filter_file", HashAttr::text(&self.filter_file))]
    }
}

impl Job for GeoMineJob {
    const JOB_TYPE: &'static str = "geomine";
    const TOOL_NAME: &'static str = "GeoMine";

    fn meta(&self) -> &JobMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut JobMeta {
        &mut self.meta
    }
}

/// 2D interaction diagrams with Poseview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseviewJob {
    #[serde(skip)]
    pub meta: JobMeta,
    pub input_protein: Protein,
    pub input_ligand: Ligand,
    pub image: Option<PathBuf>,
}

impl PoseviewJob {
    pub fn new(input_protein: Protein, input_ligand: Ligand) -> Self {
        Self {
            meta: JobMeta::default(),
            input_protein,
            input_ligand,
            image: None,
        }
    }
}

impl Fingerprint for PoseviewJob {
    fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
        vec![
            ("input_protein", HashAttr::entity(&self.input_protein)),
            ("input_ligand", HashAttr::entity(&self.input_ligand)),
        ]
    }
}

impl Job for PoseviewJob {
    const JOB_TYPE: &'static str = "poseview";
    const TOOL_NAME: &'static str = "Poseview";

    fn meta(&self) -> &JobMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut JobMeta {
        &mut self.meta
    }
}

/// Binding site ensemble search with SIENA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SienaJob {
    #[serde(skip)]
    pub meta: JobMeta,
    pub input_protein: Protein,
    pub input_ligand: Option<Ligand>,
    pub input_site: Option<ProteinSite>,
    /// Result statistics and the binding site alignment.
    pub output_info: Option<serde_json::Value>,
    /// Ensemble structures superposed on the input protein.
    #[serde(default)]
    pub output_proteins: Vec<Protein>,
}

impl SienaJob {
    pub fn new(input_protein: Protein) -> Self {
        Self {
            meta: JobMeta::default(),
            input_protein,
            input_ligand: None,
            input_site: None,
            output_info: None,
            output_proteins: Vec::new(),
        }
    }
}

impl Fingerprint for SienaJob {
    fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
        vec![
            ("input_protein", HashAttr::entity(&self.input_protein)),
            ("input_ligand", HashAttr::optional_entity(self.input_ligand.as_ref())),
            ("input_site", HashAttr::optional_entity(self.input_site.as_ref())),
        ]
    }
}

impl Job for SienaJob {
    const JOB_TYPE: &'static str = "siena";
    const TOOL_NAME: &'static str = "SIENA";

    fn meta(&self) -> &JobMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut JobMeta {
        &mut self.meta
    }
}

/// Structure quality profiling with StructureProfiler.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StructureProfilerJob {
    #[serde(skip)]
    #[garde(skip)]
    pub meta: JobMeta,

    #[garde(dive)]
    pub input_protein: Protein,
    #[garde(dive)]
    pub input_ligand: Option<Ligand>,
    #[garde(length(min = 4, max = 4))]
    pub density_file_pdb_code: Option<String>,
    #[garde(skip)]
    pub electron_density_map: Option<ElectronDensityMap>,

    #[garde(skip)]
    pub output_data: Option<serde_json::Value>,
}

impl StructureProfilerJob {
    pub fn new(input_protein: Protein) -> Self {
        Self {
            meta: JobMeta::default(),
            input_protein,
            input_ligand: None,
            density_file_pdb_code: None,
            electron_density_map: None,
            output_data: None,
        }
    }
}

impl Fingerprint for StructureProfilerJob {
    fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
        vec![
            ("input_protein", HashAttr::entity(&self.input_protein)),
            ("input_ligand", HashAttr::optional_entity(self.input_ligand.as_ref())),
            (
                "density_file_pdb_code",
                HashAttr::optional_text(self.density_file_pdb_code.as_ref()),
            ),
            (
                "electron_density_map",
                HashAttr::optional_entity(self.electron_density_map.as_ref()),
            ),
        ]
    }
}

impl Job for StructureProfilerJob {
    const JOB_TYPE: &'static str = "structureprofiler";
    const TOOL_NAME: &'static str = "StructureProfiler";

    fn meta(&self) -> &JobMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut JobMeta {
        &mut self.meta
    }
}

/// Per-atom electron density support scores with EDIAscorer. Scores are
/// always recomputed, so it declares no hash attributes.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EdiaJob {
    #[serde(skip)]
    #[garde(skip)]
    pub meta: JobMeta,

    #[garde(dive)]
    pub input_protein: Protein,
    #[garde(length(min = 4, max = 4))]
    pub density_file_pdb_code: Option<String>,
    #[garde(skip)]
    pub electron_density_map: Option<ElectronDensityMap>,

    #[garde(skip)]
    pub atom_scores: Option<serde_json::Value>,
    #[garde(skip)]
    pub output_protein: Option<Protein>,
}

impl EdiaJob {
    pub fn new(input_protein: Protein) -> Self {
        Self {
            meta: JobMeta::default(),
            input_protein,
            density_file_pdb_code: None,
            electron_density_map: None,
            atom_scores: None,
            output_protein: None,
        }
    }
}

impl Fingerprint for EdiaJob {
    fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
        Vec::new()
    }
}

impl Job for EdiaJob {
    const JOB_TYPE: &'static str = "ediascorer";
    const TOOL_NAME: &'static str = "EDIAscorer";

    fn meta(&self) -> &JobMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut JobMeta {
        &mut self.meta
    }
}

/// Upload preprocessing. Always recomputed, so it declares no hash attributes.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PreprocessorJob {
    #[serde(skip)]
    #[garde(skip)]
    pub meta: JobMeta,

    #[garde(length(max = 255))]
    pub protein_name: String,
    #[garde(length(min = 4, max = 4))]
    pub pdb_code: Option<String>,
    #[garde(length(max = 10))]
    pub uniprot_code: Option<String>,
    #[garde(skip)]
    pub protein_string: Option<String>,
    #[garde(length(max = 3))]
    pub protein_file_type: String,
    #[garde(skip)]
    pub ligand_string: Option<String>,
    #[garde(length(max = 3))]
    pub ligand_file_type: String,

    #[garde(skip)]
    pub output_protein: Option<Protein>,
}

impl PreprocessorJob {
    pub fn from_pdb_code(pdb_code: impl Into<String>) -> Self {
        let pdb_code = pdb_code.into();
        Self {
            meta: JobMeta::default(),
            protein_name: pdb_code.clone(),
            pdb_code: Some(pdb_code),
            uniprot_code: None,
            protein_string: None,
            protein_file_type: "pdb".to_string(),
            ligand_string: None,
            ligand_file_type: "sdf".to_string(),
            output_protein: None,
        }
    }
}

impl Fingerprint for PreprocessorJob {
    fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
        Vec::new()
    }
}

impl Job for PreprocessorJob {
    const JOB_TYPE: &'static str = "preprocessor";
    const TOOL_NAME: &'static str = "the preprocessor";

    fn meta(&self) -> &JobMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut JobMeta {
        &mut self.meta
    }
}
