use garde::Validate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::db::store::{MoleculeStore, StoreError};
use crate::models::hashable::{Fingerprint, HashAttr};

/// Kinds of molecule entities that jobs reference as inputs or outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MoleculeKind {
    Protein,
    Ligand,
    ProteinSite,
    ElectronDensityMap,
}

/// A persisted molecule entity.
pub trait Molecule: Serialize {
    const KIND: MoleculeKind;

    fn id(&self) -> Uuid;
}

pub async fn save_molecule<M: Molecule>(
    store: &dyn MoleculeStore,
    molecule: &M,
) -> Result<(), StoreError> {
    let payload = serde_json::to_value(molecule)
        .map_err(|e| StoreError::Decode(format!("failed to encode {}: {}", M::KIND, e)))?;
    store.save_molecule(M::KIND, molecule.id(), &payload).await
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct Protein {
    #[garde(skip)]
    pub id: Uuid,
    #[garde(length(max = 255))]
    pub name: String,
    #[garde(length(min = 4, max = 4))]
    pub pdb_code: Option<String>,
    #[garde(length(max = 10))]
    pub uniprot_code: Option<String>,
    #[garde(length(max = 3))]
    pub file_type: String,
    #[garde(skip)]
    pub file_string: String,
}

impl Protein {
    pub fn new(name: impl Into<String>, file_string: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            pdb_code: None,
            uniprot_code: None,
            file_type: "pdb".to_string(),
            file_string: file_string.into(),
        }
    }
}

impl Fingerprint for Protein {
    fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
        vec![
            ("name", HashAttr::text(&self.name)),
            ("pdb_code", HashAttr::optional_text(self.pdb_code.as_ref())),
            ("uniprot_code", HashAttr::optional_text(self.uniprot_code.as_ref())),
            ("file_type", HashAttr::text(&self.file_type)),
            ("file_string", HashAttr::text(&self.file_string)),
        ]
    }
}

impl Molecule for Protein {
    const KIND: MoleculeKind = MoleculeKind::Protein;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct Ligand {
    #[garde(skip)]
    pub id: Uuid,
    #[garde(skip)]
    pub protein_id: Option<Uuid>,
    #[garde(length(max = 255))]
    pub name: String,
    #[garde(length(max = 3))]
    pub file_type: String,
    #[garde(skip)]
    pub file_string: String,
}

impl Ligand {
    pub fn new(name: impl Into<String>, file_string: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            protein_id: None,
            name: name.into(),
            file_type: "sdf".to_string(),
            file_string: file_string.into(),
        }
    }
}

impl Fingerprint for Ligand {
    fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
        vec![
            ("name", HashAttr::text(&self.name)),
            ("file_type", HashAttr::text(&self.file_type)),
            ("file_string", HashAttr::text(&self.file_string)),
        ]
    }
}

impl Molecule for Ligand {
    const KIND: MoleculeKind = MoleculeKind::Ligand;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// A binding site given by its residues, e.g.
/// `{"residue_ids": [{"name": "ALA", "position": "1", "chain": "A"}]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProteinSite {
    pub id: Uuid,
    pub site_description: serde_json::Value,
}

impl ProteinSite {
    pub fn new(site_description: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_description,
        }
    }
}

impl Fingerprint for ProteinSite {
    fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
        vec![("site_description", HashAttr::Json(&self.site_description))]
    }
}

impl Molecule for ProteinSite {
    const KIND: MoleculeKind = MoleculeKind::ProteinSite;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Electron density map stored on disk, fingerprinted by its raw bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElectronDensityMap {
    pub id: Uuid,
    pub file: PathBuf,
}

impl ElectronDensityMap {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file: file.into(),
        }
    }
}

impl Fingerprint for ElectronDensityMap {
    fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
        vec![("file", HashAttr::File(&self.file))]
    }
}

impl Molecule for ElectronDensityMap {
    const KIND: MoleculeKind = MoleculeKind::ElectronDensityMap;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_protein_identity_is_content_not_id() {
        let a = Protein::new("4agm", "ATOM 1");
        let b = Protein::new("4agm", "ATOM 1");
        assert_ne!(a.id, b.id);
        assert_eq!(
            a.generate_hashable_bytes().unwrap(),
            b.generate_hashable_bytes().unwrap()
        );
    }

    #[test]
    fn test_protein_validation() {
        let mut protein = Protein::new("4agm", "ATOM 1");
        protein.pdb_code = Some("4agm".to_string());
        assert!(protein.validate().is_ok());

        protein.pdb_code = Some("4agmx".to_string());
        assert!(protein.validate().is_err());
    }

    #[test]
    fn test_site_residue_order_is_irrelevant() {
        let a = ProteinSite::new(json!({"residue_ids": [
            {"name": "ALA", "position": "1", "chain": "A"},
            {"name": "THR", "position": "2", "chain": "A"},
        ]}));
        let b = ProteinSite::new(json!({"residue_ids": [
            {"chain": "A", "name": "THR", "position": "2"},
            {"name": "ALA", "position": "1", "chain": "A"},
        ]}));
        assert_eq!(
            a.generate_hashable_bytes().unwrap(),
            b.generate_hashable_bytes().unwrap()
        );
    }

    #[test]
    fn test_density_map_hashes_file_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"density").unwrap();
        let map = ElectronDensityMap::new(file.path());
        assert_eq!(map.generate_hashable_bytes().unwrap(), b"density".to_vec());
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(MoleculeKind::ElectronDensityMap.to_string(), "electron_density_map");
    }
}
