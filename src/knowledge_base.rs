//! Loading the historical component collection.
//!
//! The collection is a JSON file holding either a bare array of components
//! or an object with a `components` array (other keys such as `metadata`
//! are ignored). Its SHA-256 digest identifies the file for the vector cache.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

use crate::error::IndexError;
use crate::models::HistoricalComponent;

#[derive(Deserialize)]
#[serde(untagged)]
enum CollectionFile {
    Wrapped { components: Vec<HistoricalComponent> },
    Bare(Vec<HistoricalComponent>),
}

/// Immutable historical data for one session.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    components: Vec<HistoricalComponent>,
    source_digest: String,
}

impl KnowledgeBase {
    /// Load from disk. Missing or unreadable files are [`IndexError::DataUnavailable`].
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let bytes = std::fs::read(path).map_err(|e| {
            IndexError::DataUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let parsed: CollectionFile = serde_json::from_slice(&bytes).map_err(|e| {
            IndexError::DataUnavailable(format!("cannot parse {}: {}", path.display(), e))
        })?;
        let components = match parsed {
            CollectionFile::Wrapped { components } => components,
            CollectionFile::Bare(components) => components,
        };

        info!(
            path = %path.display(),
            components = components.len(),
            "loaded historical components"
        );

        Ok(Self {
            components,
            source_digest: digest(&bytes),
        })
    }

    /// Build from records already in memory. The digest covers their JSON form.
    pub fn from_components(components: Vec<HistoricalComponent>) -> Self {
        let bytes = serde_json::to_vec(&components).unwrap_or_default();
        Self {
            source_digest: digest(&bytes),
            components,
        }
    }

    pub fn components(&self) -> &[HistoricalComponent] {
        &self.components
    }

    pub fn get(&self, index: usize) -> Option<&HistoricalComponent> {
        self.components.get(index)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Hex SHA-256 of the originating bytes.
    pub fn source_digest(&self) -> &str {
        &self.source_digest
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_wrapped_collection() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kb.json");
        fs::write(
            &path,
            r#"{"metadata": {"total_files_processed": 2},
                "components": [{"Opgave": "a"}, {"task_text": "b"}]}"#,
        )
        .unwrap();

        let kb = KnowledgeBase::load(&path).unwrap();
        assert_eq!(kb.len(), 2);
        assert_eq!(kb.components()[0].task_text, "a");
        assert_eq!(kb.source_digest().len(), 64);
    }

    #[test]
    fn test_load_bare_array() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kb.json");
        fs::write(&path, r#"[{"task_text": "x"}]"#).unwrap();
        assert_eq!(KnowledgeBase::load(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_numeric_strings_do_not_fail_the_collection() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kb.json");
        fs::write(
            &path,
            r#"[{"Opgave": "a", "Tilbud": "4000", "Timer": " 8 "},
                {"Opgave": "b", "Tilbud": "ask the foreman"},
                {"Opgave": "c", "Tilbud": 2500}]"#,
        )
        .unwrap();

        let kb = KnowledgeBase::load(&path).unwrap();
        assert_eq!(kb.len(), 3);
        assert_eq!(kb.components()[0].total_price, Some(4000.0));
        assert_eq!(kb.components()[0].labor_hours, Some(8.0));
        assert_eq!(kb.components()[1].total_price, None);
        assert_eq!(kb.components()[2].total_price, Some(2500.0));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let err = KnowledgeBase::load(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, IndexError::DataUnavailable(_)));
    }

    #[test]
    fn test_corrupt_file_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kb.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            KnowledgeBase::load(&path),
            Err(IndexError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_digest_tracks_content() {
        let a = KnowledgeBase::from_components(vec![HistoricalComponent::new("a", "", "")]);
        let b = KnowledgeBase::from_components(vec![HistoricalComponent::new("b", "", "")]);
        assert_ne!(a.source_digest(), b.source_digest());
    }
}
