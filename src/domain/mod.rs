//! Domain layer - Core entities and rules for model versions and experiments

pub mod error;
pub mod experiment;
pub mod registry;
pub mod storage;
pub mod version;

pub use error::DomainError;
pub use experiment::{
    ArtifactPayload, ExperimentComparison, ExperimentId, ExperimentIndex, ExperimentQuery,
    ExperimentRecord, ExperimentStatus, MetricGoal, StartExperimentRequest,
};
pub use registry::{
    ArtifactCodec, BinaryCodec, JsonCodec, LoadedModel, ModelMetadata, ModelSummary,
    RegisterModelRequest, RegistryIndex, VersionComparison, VersionSummary,
};
pub use storage::{DocumentStore, StorageDocument};
pub use version::{BumpType, SemanticVersion};
