use std::path::Path;

use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Production protection: {message}")]
    ProductionProtected { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("No active run: {message}")]
    NoActiveRun { message: String },

    #[error("Concurrency error: {message}")]
    Concurrency { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn production_protected(message: impl Into<String>) -> Self {
        Self::ProductionProtected {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn no_active_run(message: impl Into<String>) -> Self {
        Self::NoActiveRun {
            message: message.into(),
        }
    }

    pub fn concurrency(message: impl Into<String>) -> Self {
        Self::Concurrency {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wrap an I/O failure on `path` as a storage error
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::storage(format!("{}: {}", path.display(), source))
    }

    /// Wrap a (de)serialization failure on `path` as a storage error
    pub fn serde(path: &Path, source: serde_json::Error) -> Self {
        Self::storage(format!("{}: {}", path.display(), source))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_production_protected(&self) -> bool {
        matches!(self, Self::ProductionProtected { .. })
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::not_found("Model 'risk_model' not found");
        assert_eq!(error.to_string(), "Not found: Model 'risk_model' not found");
        assert!(error.is_not_found());
    }

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation("Invalid input");
        assert_eq!(error.to_string(), "Validation error: Invalid input");
    }

    #[test]
    fn test_production_protected_error() {
        let error = DomainError::production_protected("risk_model v1.0.1 is in production");
        assert!(error.is_production_protected());
        assert!(error.to_string().starts_with("Production protection:"));
    }

    #[test]
    fn test_io_error_carries_path() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = DomainError::io(Path::new("/tmp/registry.json"), source);
        assert!(error.is_storage());
        assert!(error.to_string().contains("/tmp/registry.json"));
    }
}
