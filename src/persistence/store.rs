//! File-backed fact document store
//!
//! A single JSON document accumulates the facts discovered by the pipeline
//! so later steps (and the rollback path) can read what earlier steps
//! found. Every write rewrites the whole document through a temp file and
//! an atomic rename, so an external reader always sees a complete,
//! self-consistent document.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised by the fact store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access fact document {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store exists but is unreadable; never silently defaulted
    #[error("fact document {} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("fact '{0}' has not been recorded yet")]
    Missing(String),

    #[error("fact '{key}' has an unexpected shape: {source}")]
    Shape {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The shared document store
pub struct FactStore {
    path: PathBuf,
}

impl FactStore {
    /// Open a store at an explicit path; the file need not exist yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open the store at the default per-user data location
    pub fn with_default_path() -> Result<Self, StoreError> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        let store_dir = data_dir.join("vcd-preflight");
        std::fs::create_dir_all(&store_dir).map_err(|source| StoreError::Io {
            path: store_dir.clone(),
            source,
        })?;
        Ok(Self::new(store_dir.join("facts.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document; an absent file is an empty document
    pub fn read_all(&self) -> Result<Map<String, Value>, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Map::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        let document: Map<String, Value> =
            serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(document)
    }

    /// Read one fact, failing loudly when it was never recorded
    pub fn read(&self, key: &str) -> Result<Value, StoreError> {
        self.read_all()?
            .remove(key)
            .ok_or_else(|| StoreError::Missing(key.to_string()))
    }

    /// Read one fact and decode it into a typed view
    pub fn fact<T: DeserializeOwned>(&self, key: &str) -> Result<T, StoreError> {
        let value = self.read(key)?;
        serde_json::from_value(value).map_err(|source| StoreError::Shape {
            key: key.to_string(),
            source,
        })
    }

    /// True when the fact has already been recorded this run
    pub fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.read_all()?.contains_key(key))
    }

    /// Merge one fact into the document and persist it
    ///
    /// Read-modify-write: the existing document is loaded, the key merged
    /// in, and the complete document swapped into place.
    pub fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut document = self.read_all()?;
        document.insert(key.to_string(), value);
        self.persist(&document)
    }

    fn persist(&self, document: &Map<String, Value>) -> Result<(), StoreError> {
        let serialized = serde_json::to_string_pretty(&Value::Object(document.clone()))
            .expect("fact document serializes");
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serialized).map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "fact document persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_in(dir: &tempfile::TempDir) -> FactStore {
        FactStore::new(dir.path().join("facts.json"))
    }

    #[test]
    fn test_absent_store_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_bootstrap_write_equals_initialized_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.write("sourceOrgVDC", json!({"name": "v-CokeOVDC"})).unwrap();

        let document = store.read_all().unwrap();
        assert_eq!(document.len(), 1);
        assert_eq!(document["sourceOrgVDC"]["name"], "v-CokeOVDC");
    }

    #[test]
    fn test_write_preserves_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.write("Organization", json!({"name": "ACME"})).unwrap();
        store.write("sourceOrgVDC", json!({"name": "vdc"})).unwrap();

        let document = store.read_all().unwrap();
        assert_eq!(document.len(), 2);
        assert_eq!(document["Organization"]["name"], "ACME");
    }

    #[test]
    fn test_corrupt_store_fails_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FactStore::new(&path);
        assert!(matches!(
            store.read_all().unwrap_err(),
            StoreError::Corrupt { .. }
        ));
    }

    #[test]
    fn test_missing_fact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(matches!(
            store.read("sourceEdgeGateway").unwrap_err(),
            StoreError::Missing(_)
        ));
    }

    #[test]
    fn test_no_partial_document_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.write("a", json!(1)).unwrap();
        store.write("b", json!(2)).unwrap();
        // The temp file is always renamed away
        assert!(!dir.path().join("facts.json.tmp").exists());
    }
}
