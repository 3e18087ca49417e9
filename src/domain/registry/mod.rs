//! Registry domain module
//!
//! Types for versioned model artifacts: per-version metadata, the persisted
//! registry index, artifact codecs and version comparisons.

mod codec;
mod comparison;
mod entity;
mod request;
mod validation;

pub use codec::{ArtifactCodec, BinaryCodec, JsonCodec};
pub use comparison::{MetricDelta, ParameterComparison, VersionComparison};
pub use entity::{ModelEntry, ModelMetadata, ModelSummary, RegistryIndex, VersionSummary};
pub use request::{LoadedModel, RegisterModelRequest};
pub use validation::{
    validate_artifact_name, validate_metrics, validate_model_name, RegistryValidationError, MAX_MODEL_NAME_LENGTH,
};
