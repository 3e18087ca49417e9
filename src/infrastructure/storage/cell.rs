//! In-memory copy of a persisted document with copy-on-write commits

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::debug;

use crate::domain::storage::{DocumentStore, StorageDocument};
use crate::domain::DomainError;

/// Holds the current document and the store it is persisted to.
///
/// Readers see the last successfully persisted state. A commit mutates a
/// copy, saves it, and only swaps it in once the save succeeded.
#[derive(Debug)]
pub struct DocumentCell<D>
where
    D: StorageDocument + 'static,
{
    store: Arc<dyn DocumentStore<D>>,
    current: RwLock<D>,
}

impl<D> DocumentCell<D>
where
    D: StorageDocument + 'static,
{
    /// Load the document, writing an empty one if the store has none yet
    pub async fn open(store: Arc<dyn DocumentStore<D>>) -> Result<Self, DomainError> {
        let document = match store.load().await? {
            Some(document) => document,
            None => {
                debug!(location = %store.location(), "Initializing empty index");
                let document = D::empty();
                store.save(&document).await?;
                document
            }
        };

        Ok(Self {
            store,
            current: RwLock::new(document),
        })
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, D> {
        self.current.read().await
    }

    pub async fn snapshot(&self) -> D {
        self.current.read().await.clone()
    }

    pub fn location(&self) -> String {
        self.store.location()
    }

    /// Apply `mutate` to a copy, persist it, then make it current
    pub async fn commit<F, T>(&self, mutate: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut D) -> Result<T, DomainError>,
    {
        let mut current = self.current.write().await;

        let mut next = current.clone();
        let value = mutate(&mut next)?;
        next.touch();

        self.store.save(&next).await?;
        *current = next;

        Ok(value)
    }

    /// Persist the current document again
    pub async fn flush(&self) -> Result<(), DomainError> {
        let current = self.current.read().await;
        self.store.save(&current).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::storage::mock::MockDocumentStore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: u32,
    }

    impl StorageDocument for Counter {
        fn empty() -> Self {
            Self { value: 0 }
        }
    }

    #[tokio::test]
    async fn test_open_persists_empty_document() {
        let store = Arc::new(MockDocumentStore::<Counter>::new());
        let cell = DocumentCell::<Counter>::open(store.clone()).await.unwrap();

        assert_eq!(cell.snapshot().await, Counter::empty());
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_commit_swaps_after_save() {
        let store = Arc::new(MockDocumentStore::<Counter>::new());
        let cell = DocumentCell::<Counter>::open(store.clone()).await.unwrap();

        let value = cell
            .commit(|doc| {
                doc.value += 1;
                Ok(doc.value)
            })
            .await
            .unwrap();

        assert_eq!(value, 1);
        assert_eq!(cell.read().await.value, 1);
        assert_eq!(store.document(), Some(Counter { value: 1 }));
    }

    #[tokio::test]
    async fn test_failed_save_keeps_current() {
        let store = Arc::new(MockDocumentStore::new().with_document(Counter { value: 7 }));
        let cell = DocumentCell::<Counter>::open(store.clone()).await.unwrap();
        store.set_save_error(Some("disk full".to_string()));

        let result = cell
            .commit(|doc| {
                doc.value = 99;
                Ok(())
            })
            .await;

        assert!(result.unwrap_err().is_storage());
        assert_eq!(cell.read().await.value, 7);
    }

    #[tokio::test]
    async fn test_failed_mutation_skips_save() {
        let store = Arc::new(MockDocumentStore::new().with_document(Counter { value: 3 }));
        let cell = DocumentCell::<Counter>::open(store.clone()).await.unwrap();

        let result: Result<(), _> = cell
            .commit(|_| Err(DomainError::validation("rejected")))
            .await;

        assert!(result.unwrap_err().is_validation());
        assert_eq!(store.save_count(), 0);
    }
}
