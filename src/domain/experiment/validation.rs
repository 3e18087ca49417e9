//! Experiment validation utilities

use thiserror::Error;

use crate::domain::DomainError;

/// Maximum length for experiment IDs
pub const MAX_EXPERIMENT_ID_LENGTH: usize = 64;

/// Maximum length for artifact names
pub const MAX_ARTIFACT_NAME_LENGTH: usize = 128;

/// Validation errors for experiments and their artifacts
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExperimentValidationError {
    #[error("Experiment ID cannot be empty")]
    EmptyId,

    #[error("Experiment ID exceeds maximum length of {0} characters")]
    IdTooLong(usize),

    #[error("Experiment ID contains invalid character: '{0}'")]
    InvalidIdCharacter(char),

    #[error("Experiment name cannot be empty")]
    EmptyName,

    #[error("Artifact name cannot be empty")]
    EmptyArtifactName,

    #[error("Artifact name exceeds maximum length of {0} characters")]
    ArtifactNameTooLong(usize),

    #[error("Artifact name '{0}' must not contain path separators or start with '.'")]
    InvalidArtifactName(String),

    #[error("Metric '{0}' must be a finite number")]
    NonFiniteMetric(String),

    #[error("Invalid experiment status transition from {0} to {1}")]
    InvalidStatusTransition(String, String),

    #[error("Experiment '{0}' is {1} and can no longer be modified")]
    Terminal(String, String),
}

impl From<ExperimentValidationError> for DomainError {
    fn from(error: ExperimentValidationError) -> Self {
        DomainError::validation(error.to_string())
    }
}

/// Validate an experiment ID (it doubles as a directory name)
pub fn validate_experiment_id(id: &str) -> Result<(), ExperimentValidationError> {
    if id.is_empty() {
        return Err(ExperimentValidationError::EmptyId);
    }

    if id.len() > MAX_EXPERIMENT_ID_LENGTH {
        return Err(ExperimentValidationError::IdTooLong(
            MAX_EXPERIMENT_ID_LENGTH,
        ));
    }

    if let Some(ch) = id
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '_' || *ch == '-'))
    {
        return Err(ExperimentValidationError::InvalidIdCharacter(ch));
    }

    Ok(())
}

/// Validate an artifact name (the stem of a file under the experiment directory)
pub fn validate_artifact_name(name: &str) -> Result<(), ExperimentValidationError> {
    if name.is_empty() {
        return Err(ExperimentValidationError::EmptyArtifactName);
    }

    if name.len() > MAX_ARTIFACT_NAME_LENGTH {
        return Err(ExperimentValidationError::ArtifactNameTooLong(
            MAX_ARTIFACT_NAME_LENGTH,
        ));
    }

    if name.starts_with('.') || name.contains(['/', '\\']) || name.contains("..") {
        return Err(ExperimentValidationError::InvalidArtifactName(
            name.to_string(),
        ));
    }

    Ok(())
}
