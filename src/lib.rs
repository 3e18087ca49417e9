//! Model Registry
//!
//! A local, file-backed store for trained model artifacts and the experiments
//! that produced them:
//! - Semantic versioning per model name with lineage (`parent_version`)
//! - A single production version per model, with promotion and rollback
//! - Experiment runs with live metrics, typed artifacts and terminal status
//! - Crash-consistent persistence (temp file + rename) and per-key locking

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{
    ArtifactCodec, ArtifactPayload, BinaryCodec, BumpType, DomainError, ExperimentId,
    ExperimentQuery, ExperimentRecord, ExperimentStatus, JsonCodec, LoadedModel, ModelMetadata,
    RegisterModelRequest, SemanticVersion, StartExperimentRequest,
};
pub use infrastructure::experiment::ExperimentTracker;
pub use infrastructure::registry::ModelRegistry;
pub use infrastructure::services::{create_versioning_manager, EndRunRequest, VersioningManager};

/// Open the registry and experiment stores described by `config`
pub async fn create_manager(config: &AppConfig) -> Result<VersioningManager<BinaryCodec>, DomainError> {
    VersioningManager::from_config(&config.registry, BinaryCodec).await
}
