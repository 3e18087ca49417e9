//! Pluggable artifact serialization
//!
//! The registry never looks inside an artifact. A codec turns the caller's
//! artifact type into bytes for `model.<ext>` and back.

use std::fmt;
use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};

use crate::domain::DomainError;

/// Serialize/deserialize capability for stored artifacts
pub trait ArtifactCodec: Send + Sync + fmt::Debug + 'static {
    type Artifact: Send + Sync + 'static;

    /// File extension (without dot) used for `model.<ext>` and `scaler.<ext>`
    fn extension(&self) -> &str;

    fn encode(&self, artifact: &Self::Artifact) -> Result<Vec<u8>, DomainError>;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Artifact, DomainError>;
}

/// Stores raw bytes unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl ArtifactCodec for BinaryCodec {
    type Artifact = Vec<u8>;

    fn extension(&self) -> &str {
        "bin"
    }

    fn encode(&self, artifact: &Self::Artifact) -> Result<Vec<u8>, DomainError> {
        Ok(artifact.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Self::Artifact, DomainError> {
        Ok(bytes.to_vec())
    }
}

/// Stores any serde type as pretty-printed JSON
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> ArtifactCodec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Artifact = T;

    fn extension(&self) -> &str {
        "json"
    }

    fn encode(&self, artifact: &Self::Artifact) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec_pretty(artifact)
            .map_err(|e| DomainError::storage(format!("Failed to encode artifact: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Self::Artifact, DomainError> {
        serde_json::from_slice(bytes)
            .map_err(|e| DomainError::storage(format!("Failed to decode artifact: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Weights {
        coefficients: Vec<f64>,
        intercept: f64,
    }

    #[test]
    fn test_binary_codec_is_identity() {
        let codec = BinaryCodec;
        let bytes = vec![0u8, 159, 146, 150];

        assert_eq!(codec.extension(), "bin");
        assert_eq!(codec.encode(&bytes).unwrap(), bytes);
        assert_eq!(codec.decode(&bytes).unwrap(), bytes);
    }

    #[test]
    fn test_json_codec_decodes_what_it_encodes() {
        let codec = JsonCodec::<Weights>::new();
        let weights = Weights {
            coefficients: vec![0.5, -1.25],
            intercept: 0.1,
        };

        let bytes = codec.encode(&weights).unwrap();

        assert_eq!(codec.extension(), "json");
        assert_eq!(codec.decode(&bytes).unwrap(), weights);
    }

    #[test]
    fn test_json_codec_rejects_foreign_bytes() {
        let codec = JsonCodec::<Weights>::new();
        let err = codec.decode(b"not json").unwrap_err();
        assert!(err.is_storage());
    }
}
