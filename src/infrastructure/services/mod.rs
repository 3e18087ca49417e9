//! Infrastructure services

mod versioning_manager;

pub use versioning_manager::{create_versioning_manager, EndRunRequest, VersioningManager};
