//! Experiment domain module
//!
//! Types for tracking training runs: the run record and its status lifecycle,
//! artifact payloads, listing queries and cross-run comparisons.

mod payload;
mod query;
mod record;
mod validation;

pub use payload::ArtifactPayload;
pub use query::{
    ExperimentComparison, ExperimentOverview, ExperimentQuery, MetricGoal,
    StartExperimentRequest, DEFAULT_LIST_LIMIT,
};
pub use record::{ExperimentId, ExperimentIndex, ExperimentRecord, ExperimentStatus};
pub use validation::{
    validate_artifact_name, validate_experiment_id, ExperimentValidationError,
    MAX_ARTIFACT_NAME_LENGTH, MAX_EXPERIMENT_ID_LENGTH,
};
