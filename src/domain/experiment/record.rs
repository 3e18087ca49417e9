//! Experiment run records

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validation::{validate_experiment_id, ExperimentValidationError};
use crate::domain::storage::StorageDocument;
use crate::domain::version::SemanticVersion;
use crate::domain::DomainError;

// ============================================================================
// ExperimentId
// ============================================================================

/// Unique identifier for an experiment run
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExperimentId(String);

impl ExperimentId {
    /// Create an experiment ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ExperimentValidationError> {
        let id = id.into();
        validate_experiment_id(&id)?;
        Ok(Self(id))
    }

    /// Generate a new unique ID of the form `exp_<12 hex>`
    pub fn generate() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("exp_{}", &hex[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ExperimentId {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExperimentId> for String {
    fn from(id: ExperimentId) -> Self {
        id.0
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ExperimentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// ExperimentStatus
// ============================================================================

/// Status of an experiment run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    /// Accepting metrics and artifacts
    #[default]
    Running,
    /// Finished; read-only
    Completed,
    /// Aborted; read-only
    Failed,
}

impl ExperimentStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_running()
    }

    pub fn can_transition_to(&self, target: ExperimentStatus) -> bool {
        matches!(
            (self, target),
            (Self::Running, Self::Completed) | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ExperimentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(DomainError::validation(format!(
                "Invalid experiment status '{}': expected running, completed or failed",
                other
            ))),
        }
    }
}

// ============================================================================
// ExperimentRecord
// ============================================================================

/// One training run: hyperparameters, logged metrics and artifacts, outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    experiment_id: ExperimentId,
    name: String,
    #[serde(default)]
    description: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    model_version: Option<SemanticVersion>,
    #[serde(default)]
    dataset_info: BTreeMap<String, Value>,
    #[serde(default)]
    hyperparameters: BTreeMap<String, Value>,
    #[serde(default)]
    metrics: BTreeMap<String, f64>,
    #[serde(default)]
    artifacts: Vec<String>,
    status: ExperimentStatus,
    #[serde(default)]
    duration_seconds: f64,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    tags: Vec<String>,
}

impl ExperimentRecord {
    /// Create a new `Running` record
    pub fn new(experiment_id: ExperimentId, name: impl Into<String>) -> Self {
        Self {
            experiment_id,
            name: name.into(),
            description: String::new(),
            timestamp: Utc::now(),
            model_version: None,
            dataset_info: BTreeMap::new(),
            hyperparameters: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
            status: ExperimentStatus::Running,
            duration_seconds: 0.0,
            notes: String::new(),
            tags: Vec::new(),
        }
    }

    // Builder methods

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_hyperparameters(mut self, hyperparameters: BTreeMap<String, Value>) -> Self {
        self.hyperparameters = hyperparameters;
        self
    }

    pub fn with_dataset_info(mut self, dataset_info: BTreeMap<String, Value>) -> Self {
        self.dataset_info = dataset_info;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    // Getters

    pub fn experiment_id(&self) -> &ExperimentId {
        &self.experiment_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn model_version(&self) -> Option<SemanticVersion> {
        self.model_version
    }

    pub fn dataset_info(&self) -> &BTreeMap<String, Value> {
        &self.dataset_info
    }

    pub fn hyperparameters(&self) -> &BTreeMap<String, Value> {
        &self.hyperparameters
    }

    pub fn metrics(&self) -> &BTreeMap<String, f64> {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    pub fn status(&self) -> ExperimentStatus {
        self.status
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|tag| self.tags.contains(tag))
    }

    // Mutators (Running only)

    /// Merge metrics, last write wins per key
    pub fn log_metrics(&mut self, metrics: BTreeMap<String, f64>) -> Result<(), ExperimentValidationError> {
        self.ensure_running()?;

        // NaN and infinities have no JSON form
        if let Some((name, _)) = metrics.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ExperimentValidationError::NonFiniteMetric(name.clone()));
        }
        self.metrics.extend(metrics);
        Ok(())
    }

    /// Record an artifact file name
    pub fn add_artifact(&mut self, file_name: impl Into<String>) -> Result<(), ExperimentValidationError> {
        self.ensure_running()?;
        let file_name = file_name.into();

        // re-logging an artifact overwrites the file; list it once
        if !self.artifacts.contains(&file_name) {
            self.artifacts.push(file_name);
        }
        Ok(())
    }

    // Status transitions

    /// `Running -> Completed`
    pub fn complete(
        &mut self,
        model_version: Option<SemanticVersion>,
        duration_seconds: f64,
        notes: impl Into<String>,
    ) -> Result<(), ExperimentValidationError> {
        if !duration_seconds.is_finite() {
            return Err(ExperimentValidationError::NonFiniteMetric(
                "duration_seconds".to_string(),
            ));
        }
        self.transition(ExperimentStatus::Completed)?;
        self.model_version = model_version;
        self.duration_seconds = duration_seconds;
        self.notes = notes.into();
        Ok(())
    }

    /// `Running -> Failed`, recording the error in the notes
    pub fn fail(&mut self, error_message: &str) -> Result<(), ExperimentValidationError> {
        self.transition(ExperimentStatus::Failed)?;
        self.notes = format!("Failed: {}", error_message);
        Ok(())
    }

    fn transition(&mut self, target: ExperimentStatus) -> Result<(), ExperimentValidationError> {
        if !self.status.can_transition_to(target) {
            return Err(ExperimentValidationError::InvalidStatusTransition(
                self.status.to_string(),
                target.to_string(),
            ));
        }
        self.status = target;
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), ExperimentValidationError> {
        if self.status.is_terminal() {
            return Err(ExperimentValidationError::Terminal(
                self.experiment_id.to_string(),
                self.status.to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// ExperimentIndex
// ============================================================================

/// Persisted experiment state (`experiments.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentIndex {
    #[serde(default)]
    experiments: BTreeMap<ExperimentId, ExperimentRecord>,
    created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

impl ExperimentIndex {
    pub fn get(&self, id: &ExperimentId) -> Option<&ExperimentRecord> {
        self.experiments.get(id)
    }

    pub fn get_mut(&mut self, id: &ExperimentId) -> Option<&mut ExperimentRecord> {
        self.experiments.get_mut(id)
    }

    pub fn insert(&mut self, record: ExperimentRecord) -> Result<(), DomainError> {
        if self.experiments.contains_key(record.experiment_id()) {
            return Err(DomainError::conflict(format!(
                "Experiment '{}' already exists",
                record.experiment_id()
            )));
        }
        self.experiments
            .insert(record.experiment_id().clone(), record);
        Ok(())
    }

    pub fn records(&self) -> impl Iterator<Item = &ExperimentRecord> {
        self.experiments.values()
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}

impl StorageDocument for ExperimentIndex {
    fn empty() -> Self {
        let now = Utc::now();
        Self {
            experiments: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
