//! Registry validation utilities

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::domain::DomainError;

/// Maximum length for model names
pub const MAX_MODEL_NAME_LENGTH: usize = 128;

/// Model names become directory names under `models/`
static MODEL_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").unwrap());

/// Validation errors for registry inputs
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryValidationError {
    #[error("Model name cannot be empty")]
    EmptyName,

    #[error("Model name exceeds maximum length of {0} characters")]
    NameTooLong(usize),

    #[error(
        "Invalid model name '{0}': must start with a letter or number and contain only letters, numbers, '_', '-' or '.'"
    )]
    InvalidNameFormat(String),

    #[error("Model name '{0}' cannot contain '..'")]
    ParentTraversal(String),

    #[error("Metric '{0}' must be a finite number")]
    NonFiniteMetric(String),

    #[error("Invalid artifact name '{0}': must be a plain file stem")]
    InvalidArtifactName(String),
}

impl From<RegistryValidationError> for DomainError {
    fn from(error: RegistryValidationError) -> Self {
        DomainError::validation(error.to_string())
    }
}

/// Validate a model name
pub fn validate_model_name(name: &str) -> Result<(), RegistryValidationError> {
    if name.is_empty() {
        return Err(RegistryValidationError::EmptyName);
    }

    if name.len() > MAX_MODEL_NAME_LENGTH {
        return Err(RegistryValidationError::NameTooLong(MAX_MODEL_NAME_LENGTH));
    }

    if !MODEL_NAME_PATTERN.is_match(name) {
        return Err(RegistryValidationError::InvalidNameFormat(name.to_string()));
    }

    if name.contains("..") {
        return Err(RegistryValidationError::ParentTraversal(name.to_string()));
    }

    Ok(())
}

/// Validate the name of a side artifact stored next to the model
pub fn validate_artifact_name(name: &str) -> Result<(), RegistryValidationError> {
    if name.len() > MAX_MODEL_NAME_LENGTH || !MODEL_NAME_PATTERN.is_match(name) || name.contains("..") {
        return Err(RegistryValidationError::InvalidArtifactName(name.to_string()));
    }
    Ok(())
}

/// Every metric must survive a JSON round trip
pub fn validate_metrics(metrics: &BTreeMap<String, f64>) -> Result<(), RegistryValidationError> {
    match metrics.iter().find(|(_, value)| !value.is_finite()) {
        Some((name, _)) => Err(RegistryValidationError::NonFiniteMetric(name.clone())),
        None => Ok(()),
    }
}
