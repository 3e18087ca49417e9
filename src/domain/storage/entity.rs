//! Storage document trait

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

/// A document persisted as a single unit (an index file)
pub trait StorageDocument: Clone + Debug + Send + Sync + Serialize + DeserializeOwned {
    /// Document used when nothing has been persisted yet
    fn empty() -> Self;

    /// Called right before the document is written
    fn touch(&mut self) {}
}
