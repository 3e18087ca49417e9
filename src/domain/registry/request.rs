//! Registry request and response types

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::entity::ModelMetadata;
use crate::domain::version::BumpType;

/// Request to register a new model version
#[derive(Debug, Clone)]
pub struct RegisterModelRequest<A> {
    pub name: String,
    pub artifact: A,
    pub scaler: Option<A>,
    pub additional_artifacts: BTreeMap<String, A>,
    pub description: String,
    pub model_type: Option<String>,
    pub framework: Option<String>,
    pub metrics: BTreeMap<String, f64>,
    pub parameters: BTreeMap<String, Value>,
    pub feature_names: Vec<String>,
    pub class_names: Vec<String>,
    pub tags: BTreeSet<String>,
    pub training_data_info: BTreeMap<String, Value>,
    pub bump_type: BumpType,
    pub notes: String,
}

impl<A> RegisterModelRequest<A> {
    pub fn new(name: impl Into<String>, artifact: A) -> Self {
        Self {
            name: name.into(),
            artifact,
            scaler: None,
            additional_artifacts: BTreeMap::new(),
            description: String::new(),
            model_type: None,
            framework: None,
            metrics: BTreeMap::new(),
            parameters: BTreeMap::new(),
            feature_names: Vec::new(),
            class_names: Vec::new(),
            tags: BTreeSet::new(),
            training_data_info: BTreeMap::new(),
            bump_type: BumpType::default(),
            notes: String::new(),
        }
    }

    pub fn with_scaler(mut self, scaler: A) -> Self {
        self.scaler = Some(scaler);
        self
    }

    /// Store `artifact` next to the model under `name`
    pub fn with_additional_artifact(mut self, name: impl Into<String>, artifact: A) -> Self {
        self.additional_artifacts.insert(name.into(), artifact);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = Some(model_type.into());
        self
    }

    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = Some(framework.into());
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_metrics(mut self, metrics: BTreeMap<String, f64>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_feature_names(mut self, feature_names: Vec<String>) -> Self {
        self.feature_names = feature_names;
        self
    }

    pub fn with_class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = class_names;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_training_data_info(mut self, info: BTreeMap<String, Value>) -> Self {
        self.training_data_info = info;
        self
    }

    pub fn with_bump_type(mut self, bump_type: BumpType) -> Self {
        self.bump_type = bump_type;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// A model loaded back from the registry
#[derive(Debug, Clone)]
pub struct LoadedModel<A> {
    pub model: A,
    pub scaler: Option<A>,
    pub additional_artifacts: BTreeMap<String, A>,
    pub metadata: ModelMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = RegisterModelRequest::new("risk_model", vec![1u8, 2, 3]);

        assert_eq!(request.bump_type, BumpType::Patch);
        assert!(request.scaler.is_none());
        assert!(request.additional_artifacts.is_empty());
        assert!(request.model_type.is_none());
        assert!(request.metrics.is_empty());
    }

    #[test]
    fn test_request_builder_chain() {
        let request = RegisterModelRequest::new("risk_model", vec![1u8])
            .with_metric("accuracy", 0.85)
            .with_parameter("n_estimators", 100)
            .with_tag("baseline")
            .with_tag("baseline")
            .with_bump_type(BumpType::Minor)
            .with_scaler(vec![9u8])
            .with_additional_artifact("encoder", vec![7u8]);

        assert_eq!(request.metrics["accuracy"], 0.85);
        assert_eq!(request.parameters["n_estimators"], 100);
        assert_eq!(request.tags.len(), 1);
        assert_eq!(request.bump_type, BumpType::Minor);
        assert_eq!(request.scaler, Some(vec![9u8]));
        assert_eq!(request.additional_artifacts["encoder"], vec![7u8]);
    }
}
