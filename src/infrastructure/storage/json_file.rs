//! JSON file document store

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::storage::{DocumentStore, StorageDocument};
use crate::domain::DomainError;

use super::fs::{atomic_write, read_optional};

/// Persists a whole document as one pretty-printed JSON file
#[derive(Debug)]
pub struct JsonFileStore<D> {
    path: PathBuf,
    _document: PhantomData<fn() -> D>,
}

impl<D> JsonFileStore<D> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _document: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<D> DocumentStore<D> for JsonFileStore<D>
where
    D: StorageDocument + 'static,
{
    async fn load(&self) -> Result<Option<D>, DomainError> {
        let Some(bytes) = read_optional(&self.path).await? else {
            debug!(path = %self.path.display(), "No index file yet");
            return Ok(None);
        };

        let document =
            serde_json::from_slice(&bytes).map_err(|e| DomainError::serde(&self.path, e))?;

        Ok(Some(document))
    }

    async fn save(&self, document: &D) -> Result<(), DomainError> {
        let bytes =
            serde_json::to_vec_pretty(document).map_err(|e| DomainError::serde(&self.path, e))?;

        atomic_write(&self.path, &bytes).await
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Index {
        names: Vec<String>,
    }

    impl StorageDocument for Index {
        fn empty() -> Self {
            Self { names: Vec::new() }
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store: JsonFileStore<Index> = JsonFileStore::new(dir.path().join("index.json"));

        assert!(store.load().await.unwrap().is_none());
        assert_eq!(store.load_or_empty().await.unwrap(), Index::empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store: JsonFileStore<Index> = JsonFileStore::new(dir.path().join("index.json"));
        let index = Index {
            names: vec!["risk_model".to_string()],
        };

        store.save(&index).await.unwrap();

        let reopened: JsonFileStore<Index> = JsonFileStore::new(dir.path().join("index.json"));
        assert_eq!(reopened.load().await.unwrap(), Some(index));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store: JsonFileStore<Index> = JsonFileStore::new(&path);
        let error = store.load().await.unwrap_err();

        assert!(error.is_storage());
        assert!(error.to_string().contains("index.json"));
    }
}
