//! Artifact payloads attached to experiments

use serde::Serialize;
use serde_json::Value;

use crate::domain::DomainError;

/// Content of an experiment artifact; the variant decides the file format
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactPayload {
    /// Maps and lists, written as pretty JSON
    Structured(Value),
    /// Plain text, written as-is
    Text(String),
    /// Anything else, written as opaque bytes
    Binary(Vec<u8>),
}

impl ArtifactPayload {
    /// Serialize any value and classify the result
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, DomainError> {
        let value = serde_json::to_value(value).map_err(|e| {
            DomainError::validation(format!("Artifact is not serializable: {}", e))
        })?;
        Ok(Self::from(value))
    }

    /// File extension for this payload kind
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Structured(_) => "json",
            Self::Text(_) => "txt",
            Self::Binary(_) => "bin",
        }
    }

    /// Bytes written to disk
    pub fn to_bytes(&self) -> Result<Vec<u8>, DomainError> {
        match self {
            Self::Structured(value) => serde_json::to_vec_pretty(value).map_err(|e| {
                DomainError::validation(format!("Failed to encode artifact: {}", e))
            }),
            Self::Text(text) => Ok(text.as_bytes().to_vec()),
            Self::Binary(bytes) => Ok(bytes.clone()),
        }
    }

    /// Stored file name for an artifact called `name`
    pub fn file_name(&self, name: &str) -> String {
        format!("{}.{}", name, self.extension())
    }
}

impl From<Value> for ArtifactPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(_) | Value::Array(_) => Self::Structured(value),
            Value::String(text) => Self::Text(text),
            other => Self::Binary(other.to_string().into_bytes()),
        }
    }
}

impl From<String> for ArtifactPayload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ArtifactPayload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for ArtifactPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}
