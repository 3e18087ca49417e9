//! Document store trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

use super::entity::StorageDocument;

/// Whole-document persistence for an index.
///
/// `save` must be atomic: after it returns an error the previously persisted
/// document is still the one `load` returns.
#[async_trait]
pub trait DocumentStore<D>: Send + Sync + Debug
where
    D: StorageDocument + 'static,
{
    /// Loads the persisted document, `None` if nothing was ever written
    async fn load(&self) -> Result<Option<D>, DomainError>;

    /// Atomically replaces the persisted document
    async fn save(&self, document: &D) -> Result<(), DomainError>;

    /// Human-readable location used in log lines
    fn location(&self) -> String;

    /// Loads the persisted document or starts an empty one
    async fn load_or_empty(&self) -> Result<D, DomainError> {
        Ok(self.load().await?.unwrap_or_else(D::empty))
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Mock document store for testing persistence failure paths
    #[derive(Debug)]
    pub struct MockDocumentStore<D>
    where
        D: StorageDocument,
    {
        document: Mutex<Option<D>>,
        save_error: Mutex<Option<String>>,
        saves: Mutex<usize>,
    }

    impl<D> Default for MockDocumentStore<D>
    where
        D: StorageDocument,
    {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<D> MockDocumentStore<D>
    where
        D: StorageDocument,
    {
        pub fn new() -> Self {
            Self {
                document: Mutex::new(None),
                save_error: Mutex::new(None),
                saves: Mutex::new(0),
            }
        }

        pub fn with_document(self, document: D) -> Self {
            *self.document.lock().unwrap() = Some(document);
            self
        }

        pub fn with_save_error(self, error: impl Into<String>) -> Self {
            self.set_save_error(Some(error.into()));
            self
        }

        /// Toggle save failures after construction
        pub fn set_save_error(&self, error: Option<String>) {
            *self.save_error.lock().unwrap() = error;
        }

        pub fn document(&self) -> Option<D> {
            self.document.lock().unwrap().clone()
        }

        pub fn save_count(&self) -> usize {
            *self.saves.lock().unwrap()
        }
    }

    #[async_trait]
    impl<D> DocumentStore<D> for MockDocumentStore<D>
    where
        D: StorageDocument + 'static,
    {
        async fn load(&self) -> Result<Option<D>, DomainError> {
            Ok(self.document.lock().unwrap().clone())
        }

        async fn save(&self, document: &D) -> Result<(), DomainError> {
            if let Some(error) = self.save_error.lock().unwrap().clone() {
                return Err(DomainError::storage(error));
            }

            *self.document.lock().unwrap() = Some(document.clone());
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }

        fn location(&self) -> String {
            "mock".to_string()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde::{Deserialize, Serialize};

        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct TestDoc {
            entries: Vec<String>,
        }

        impl StorageDocument for TestDoc {
            fn empty() -> Self {
                Self {
                    entries: Vec::new(),
                }
            }
        }

        #[tokio::test]
        async fn test_mock_store_starts_empty() {
            let store: MockDocumentStore<TestDoc> = MockDocumentStore::new();

            assert!(store.load().await.unwrap().is_none());
            assert!(store.load_or_empty().await.unwrap().entries.is_empty());
        }

        #[tokio::test]
        async fn test_mock_store_save_and_load() {
            let store: MockDocumentStore<TestDoc> = MockDocumentStore::new();
            let doc = TestDoc {
                entries: vec!["a".to_string()],
            };

            store.save(&doc).await.unwrap();

            assert_eq!(store.load().await.unwrap(), Some(doc));
            assert_eq!(store.save_count(), 1);
        }

        #[tokio::test]
        async fn test_mock_store_save_error_keeps_previous_document() {
            let previous = TestDoc {
                entries: vec!["kept".to_string()],
            };
            let store = MockDocumentStore::new()
                .with_document(previous.clone())
                .with_save_error("disk full");

            let result = store.save(&TestDoc::empty()).await;

            assert!(result.unwrap_err().is_storage());
            assert_eq!(store.document(), Some(previous));
        }
    }
}
