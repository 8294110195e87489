use serde_json::Value;
use std::fmt::Display;
use std::io;
use std::path::PathBuf;

use crate::services::canonical::{canonicalize, CanonicalError};

/// Separator placed between the encoded hash attributes.
pub const HASH_SEPARATOR: &[u8] = b"_";

/// Encoding of an unset attribute. 0xFF never occurs in UTF-8, so no text,
/// JSON or text-only entity value encodes to it.
pub const NULL_MARKER: &[u8] = &[0xFF];

/// The value of one declared hash attribute.
pub enum HashAttr<'a> {
    /// Another fingerprintable entity, hashed recursively.
    Entity(&'a dyn Fingerprint),
    /// File-like content, hashed by its raw bytes.
    File(&'a dyn FileContent),
    /// A JSON-like document, hashed through its canonical string.
    Json(&'a Value),
    /// Any other value, hashed through its string form.
    Text(String),
    /// An unset optional attribute.
    Null,
}

impl<'a> HashAttr<'a> {
    pub fn text(value: impl Display) -> Self {
        HashAttr::Text(value.to_string())
    }

    pub fn entity<E: Fingerprint>(entity: &'a E) -> Self {
        HashAttr::Entity(entity)
    }

    pub fn optional_entity<E: Fingerprint>(entity: Option<&'a E>) -> Self {
        entity.map_or(HashAttr::Null, |e| HashAttr::Entity(e))
    }

    pub fn optional_text<T: Display>(value: Option<&T>) -> Self {
        value.map_or(HashAttr::Null, |v| HashAttr::text(v))
    }

    fn to_bytes(&self) -> Result<Vec<u8>, HashError> {
        match self {
            HashAttr::Entity(entity) => entity.generate_hashable_bytes(),
            HashAttr::File(file) => Ok(file.read_bytes()?),
            HashAttr::Json(value) => Ok(canonicalize(value)?.into_bytes()),
            HashAttr::Text(text) => Ok(text.clone().into_bytes()),
            HashAttr::Null => Ok(NULL_MARKER.to_vec()),
        }
    }
}

/// Anything that can produce a stable fingerprint from a declared, ordered
/// subset of its own fields.
pub trait Fingerprint {
    /// The `(name, value)` pairs that participate in fingerprinting. The list
    /// of names is fixed per implementing type and returned in the same order
    /// on every call.
    fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)>;

    /// Concatenate the encoded hash attributes, separated by [`HASH_SEPARATOR`].
    fn generate_hashable_bytes(&self) -> Result<Vec<u8>, HashError> {
        let mut bytes = Vec::new();
        for (index, (_, attr)) in self.hash_attributes().iter().enumerate() {
            if index > 0 {
                bytes.extend_from_slice(HASH_SEPARATOR);
            }
            bytes.extend(attr.to_bytes()?);
        }
        Ok(bytes)
    }
}

/// File-like content exposing a byte read.
pub trait FileContent {
    fn read_bytes(&self) -> io::Result<Vec<u8>>;
}

impl FileContent for PathBuf {
    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        std::fs::read(self)
    }
}

impl FileContent for Vec<u8> {
    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        Ok(self.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("Failed to read file attribute: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to canonicalize JSON attribute: {0}")]
    Canonical(#[from] CanonicalError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Residue {
        chain: String,
        position: i32,
    }

    impl Fingerprint for Residue {
        fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
            vec![
                ("chain", HashAttr::text(&self.chain)),
                ("position", HashAttr::text(self.position)),
            ]
        }
    }

    struct Site {
        residue: Residue,
        extra: Option<Residue>,
        info: Value,
        raw: Vec<u8>,
    }

    impl Fingerprint for Site {
        fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
            vec![
                ("residue", HashAttr::entity(&self.residue)),
                ("extra", HashAttr::optional_entity(self.extra.as_ref())),
                ("info", HashAttr::Json(&self.info)),
                ("raw", HashAttr::File(&self.raw)),
            ]
        }
    }

    #[test]
    fn test_scalar_attributes_are_joined() {
        let residue = Residue { chain: "A".to_string(), position: 12 };
        assert_eq!(residue.generate_hashable_bytes().unwrap(), b"A_12".to_vec());
    }

    #[test]
    fn test_nested_attributes_are_encoded() {
        let site = Site {
            residue: Residue { chain: "B".to_string(), position: 3 },
            extra: None,
            info: json!({"z": [2, 1], "a": true}),
            raw: b"HETATM".to_vec(),
        };
        let mut expected = b"B_3_".to_vec();
        expected.extend_from_slice(NULL_MARKER);
        expected.extend_from_slice(br#"_{"a":true,"z":[1,2]}_HETATM"#);
        assert_eq!(site.generate_hashable_bytes().unwrap(), expected);
    }

    #[test]
    fn test_unset_attribute_differs_from_null_text() {
        let unset = HashAttr::optional_text(None::<&String>).to_bytes().unwrap();
        let text = HashAttr::text("null").to_bytes().unwrap();
        assert_ne!(unset, text);
        assert!(std::str::from_utf8(&unset).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        struct Density(PathBuf);
        impl Fingerprint for Density {
            fn hash_attributes(&self) -> Vec<(&'static str, HashAttr<'_>)> {
                vec![("file", HashAttr::File(&self.0))]
            }
        }

        let density = Density(PathBuf::from("/nonexistent/density.ccp4"));
        assert!(matches!(density.generate_hashable_bytes(), Err(HashError::Io(_))));
    }
}
