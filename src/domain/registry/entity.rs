//! Registry domain entities

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::storage::StorageDocument;
use crate::domain::version::{BumpType, SemanticVersion};
use crate::domain::DomainError;

// ============================================================================
// ModelMetadata
// ============================================================================

/// Metadata for one registered version of a model.
///
/// Immutable once written, except for the production flag which only the
/// registry flips through [`RegistryIndex::promote`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    model_id: String,
    version: SemanticVersion,
    name: String,
    #[serde(default)]
    description: String,
    created_at: DateTime<Utc>,
    model_type: String,
    framework: String,
    #[serde(default)]
    metrics: BTreeMap<String, f64>,
    #[serde(default)]
    parameters: BTreeMap<String, Value>,
    #[serde(default)]
    feature_names: Vec<String>,
    #[serde(default)]
    class_names: Vec<String>,
    #[serde(default)]
    tags: BTreeSet<String>,
    parent_version: Option<SemanticVersion>,
    #[serde(default)]
    is_production: bool,
    #[serde(default)]
    file_hash: String,
    #[serde(default)]
    file_size_bytes: u64,
    #[serde(default)]
    training_data_info: BTreeMap<String, Value>,
    #[serde(default)]
    additional_artifacts: BTreeSet<String>,
    #[serde(default)]
    notes: String,
}

impl ModelMetadata {
    /// Create metadata for `name` at `version` with a fresh model id
    pub fn new(name: impl Into<String>, version: SemanticVersion) -> Self {
        let name = name.into();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let model_id = format!("{}_v{}_{}", name, version, &suffix[..8]);

        Self {
            model_id,
            version,
            name,
            description: String::new(),
            created_at: Utc::now(),
            model_type: "classifier".to_string(),
            framework: "sklearn".to_string(),
            metrics: BTreeMap::new(),
            parameters: BTreeMap::new(),
            feature_names: Vec::new(),
            class_names: Vec::new(),
            tags: BTreeSet::new(),
            parent_version: None,
            is_production: false,
            file_hash: String::new(),
            file_size_bytes: 0,
            training_data_info: BTreeMap::new(),
            additional_artifacts: BTreeSet::new(),
            notes: String::new(),
        }
    }

    // Builder methods

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = model_type.into();
        self
    }

    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = framework.into();
        self
    }

    pub fn with_metrics(mut self, metrics: BTreeMap<String, f64>) -> Self {
        self.metrics = metrics;
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

    pub fn with_tags(mut self, tags: BTreeSet<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_parent_version(mut self, parent_version: Option<SemanticVersion>) -> Self {
        self.parent_version = parent_version;
        self
    }

    pub fn with_file_info(mut self, file_hash: impl Into<String>, file_size_bytes: u64) -> Self {
        self.file_hash = file_hash.into();
        self.file_size_bytes = file_size_bytes;
        self
    }

    pub fn with_training_data_info(mut self, info: BTreeMap<String, Value>) -> Self {
        self.training_data_info = info;
        self
    }

    pub fn with_additional_artifacts(mut self, names: BTreeSet<String>) -> Self {
        self.additional_artifacts = names;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    // Getters

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn version(&self) -> SemanticVersion {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    pub fn framework(&self) -> &str {
        &self.framework
    }

    pub fn metrics(&self) -> &BTreeMap<String, f64> {
        &self.metrics
    }

    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn parent_version(&self) -> Option<SemanticVersion> {
        self.parent_version
    }

    /// Names of the side artifacts stored under `artifacts/`
    pub fn additional_artifacts(&self) -> &BTreeSet<String> {
        &self.additional_artifacts
    }

    pub fn is_production(&self) -> bool {
        self.is_production
    }

    pub fn file_hash(&self) -> &str {
        &self.file_hash
    }

    pub fn file_size_bytes(&self) -> u64 {
        self.file_size_bytes
    }

    pub fn training_data_info(&self) -> &BTreeMap<String, Value> {
        &self.training_data_info
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// `"name:version"` as stored in the production pointer
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.name, self.version)
    }

    fn set_production(&mut self, is_production: bool) {
        self.is_production = is_production;
    }
}

pub(crate) fn qualified_name(name: &str, version: SemanticVersion) -> String {
    format!("{}:{}", name, version)
}

// ============================================================================
// ModelEntry
// ============================================================================

/// All versions registered under one model name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    created_at: DateTime<Utc>,
    #[serde(default)]
    versions: BTreeMap<SemanticVersion, ModelMetadata>,
}

impl ModelEntry {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            versions: BTreeMap::new(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn versions(&self) -> &BTreeMap<SemanticVersion, ModelMetadata> {
        &self.versions
    }

    pub fn get(&self, version: SemanticVersion) -> Option<&ModelMetadata> {
        self.versions.get(&version)
    }

    pub fn latest_version(&self) -> Option<SemanticVersion> {
        self.versions.keys().next_back().copied()
    }

    pub fn latest(&self) -> Option<&ModelMetadata> {
        self.versions.values().next_back()
    }

    pub fn production(&self) -> Option<&ModelMetadata> {
        self.versions.values().find(|m| m.is_production())
    }

    /// The version a new registration receives, and its parent
    pub fn next_version(&self, bump_type: BumpType) -> (SemanticVersion, Option<SemanticVersion>) {
        match self.latest_version() {
            Some(latest) => (latest.bump(bump_type), Some(latest)),
            None => (SemanticVersion::INITIAL, None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }
}

impl Default for ModelEntry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// RegistryIndex
// ============================================================================

/// Persisted registry state (`registry.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryIndex {
    #[serde(default)]
    models: BTreeMap<String, ModelEntry>,
    #[serde(default)]
    production_model: Option<String>,
    #[serde(default)]
    staging_model: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RegistryIndex {
    pub fn models(&self) -> &BTreeMap<String, ModelEntry> {
        &self.models
    }

    pub fn entry(&self, name: &str) -> Option<&ModelEntry> {
        self.models.get(name)
    }

    pub fn production_model(&self) -> Option<&str> {
        self.production_model.as_deref()
    }

    pub fn staging_model(&self) -> Option<&str> {
        self.staging_model.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Look up a version, failing with `NotFound` for unknown names or versions
    pub fn metadata(&self, name: &str, version: SemanticVersion) -> Result<&ModelMetadata, DomainError> {
        self.entry(name)
            .ok_or_else(|| DomainError::not_found(format!("Model '{}' not found in registry", name)))?
            .get(version)
            .ok_or_else(|| {
                DomainError::not_found(format!(
                    "Version '{}' not found for model '{}'",
                    version, name
                ))
            })
    }

    /// Resolve `None` to the latest version of `name`
    pub fn resolve(&self, name: &str, version: Option<SemanticVersion>) -> Result<&ModelMetadata, DomainError> {
        match version {
            Some(version) => self.metadata(name, version),
            None => self
                .entry(name)
                .ok_or_else(|| DomainError::not_found(format!("Model '{}' not found in registry", name)))?
                .latest()
                .ok_or_else(|| {
                    DomainError::not_found(format!("No versions found for model '{}'", name))
                }),
        }
    }

    /// Version and parent a new registration of `name` would receive
    pub fn next_version(&self, name: &str, bump_type: BumpType) -> (SemanticVersion, Option<SemanticVersion>) {
        self.entry(name)
            .map(|entry| entry.next_version(bump_type))
            .unwrap_or((SemanticVersion::INITIAL, None))
    }

    /// Merge a freshly registered version into the index
    pub fn insert_version(&mut self, metadata: ModelMetadata) -> Result<(), DomainError> {
        let entry = self.models.entry(metadata.name().to_string()).or_default();

        if entry.versions.contains_key(&metadata.version()) {
            return Err(DomainError::conflict(format!(
                "Version '{}' already exists for model '{}'",
                metadata.version(),
                metadata.name()
            )));
        }

        entry.versions.insert(metadata.version(), metadata);
        Ok(())
    }

    /// Mark `version` as the only production version of `name`
    pub fn promote(&mut self, name: &str, version: SemanticVersion) -> Result<(), DomainError> {
        self.metadata(name, version)?;

        if let Some(entry) = self.models.get_mut(name) {
            for (candidate, metadata) in entry.versions.iter_mut() {
                metadata.set_production(*candidate == version);
            }
        }

        self.production_model = Some(qualified_name(name, version));
        Ok(())
    }

    /// Remove a version; production versions need `force`
    pub fn remove_version(
        &mut self,
        name: &str,
        version: SemanticVersion,
        force: bool,
    ) -> Result<ModelMetadata, DomainError> {
        let metadata = self.metadata(name, version)?;

        if metadata.is_production() && !force {
            return Err(DomainError::production_protected(format!(
                "Cannot delete production model {} v{}. Use force or promote another version first.",
                name, version
            )));
        }

        let removed = self
            .models
            .get_mut(name)
            .and_then(|entry| entry.versions.remove(&version))
            .ok_or_else(|| DomainError::not_found(format!("Version '{}' not found", version)))?;

        let pointer = qualified_name(name, version);

        if self.production_model.as_deref() == Some(pointer.as_str()) {
            self.production_model = None;
        }

        if self.staging_model.as_deref() == Some(pointer.as_str()) {
            self.staging_model = None;
        }

        Ok(removed)
    }
}

impl StorageDocument for RegistryIndex {
    fn empty() -> Self {
        let now = Utc::now();
        Self {
            models: BTreeMap::new(),
            production_model: None,
            staging_model: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Listings
// ============================================================================

/// One row of `list_models`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub latest_version: Option<SemanticVersion>,
    pub version_count: usize,
    pub created_at: DateTime<Utc>,
}

impl ModelSummary {
    pub fn from_entry(name: &str, entry: &ModelEntry) -> Self {
        Self {
            name: name.to_string(),
            latest_version: entry.latest_version(),
            version_count: entry.len(),
            created_at: entry.created_at(),
        }
    }
}

/// One row of `list_versions`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionSummary {
    pub version: SemanticVersion,
    pub created_at: DateTime<Utc>,
    pub is_production: bool,
    pub metrics: BTreeMap<String, f64>,
}

impl From<&ModelMetadata> for VersionSummary {
    fn from(metadata: &ModelMetadata) -> Self {
        Self {
            version: metadata.version(),
            created_at: metadata.created_at(),
            is_production: metadata.is_production(),
            metrics: metadata.metrics().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        s.parse().unwrap()
    }

    fn index_with(name: &str, versions: &[&str]) -> RegistryIndex {
        let mut index = RegistryIndex::empty();
        for version in versions {
            index
                .insert_version(ModelMetadata::new(name, v(version)))
                .unwrap();
        }
        index
    }

    fn production_count(index: &RegistryIndex, name: &str) -> usize {
        index
            .entry(name)
            .unwrap()
            .versions()
            .values()
            .filter(|m| m.is_production())
            .count()
    }

    #[test]
    fn test_model_id_format() {
        let metadata = ModelMetadata::new("risk_model", v("1.0.0"));
        assert!(metadata.model_id().starts_with("risk_model_v1.0.0_"));
        assert_eq!(metadata.model_id().len(), "risk_model_v1.0.0_".len() + 8);
    }

    #[test]
    fn test_first_version_is_initial() {
        let index = RegistryIndex::empty();
        assert_eq!(
            index.next_version("risk_model", BumpType::Major),
            (SemanticVersion::INITIAL, None)
        );
    }

    #[test]
    fn test_next_version_bumps_the_maximum() {
        let index = index_with("m", &["1.0.0", "1.10.0", "1.2.0"]);
        assert_eq!(
            index.next_version("m", BumpType::Patch),
            (v("1.10.1"), Some(v("1.10.0")))
        );
    }

    #[test]
    fn test_resolve_latest() {
        let index = index_with("m", &["1.0.0", "2.0.0", "1.5.0"]);
        assert_eq!(index.resolve("m", None).unwrap().version(), v("2.0.0"));
        assert!(index.resolve("other", None).unwrap_err().is_not_found());
        assert!(index.resolve("m", Some(v("3.0.0"))).unwrap_err().is_not_found());
    }

    #[test]
    fn test_insert_duplicate_version_conflicts() {
        let mut index = index_with("m", &["1.0.0"]);
        let result = index.insert_version(ModelMetadata::new("m", v("1.0.0")));
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[test]
    fn test_promote_keeps_single_production() {
        let mut index = index_with("m", &["1.0.0", "1.0.1", "1.0.2"]);

        index.promote("m", v("1.0.0")).unwrap();
        index.promote("m", v("1.0.2")).unwrap();
        index.promote("m", v("1.0.1")).unwrap();

        assert_eq!(production_count(&index, "m"), 1);
        assert_eq!(index.entry("m").unwrap().production().unwrap().version(), v("1.0.1"));
        assert_eq!(index.production_model(), Some("m:1.0.1"));
    }

    #[test]
    fn test_promote_unknown_version_leaves_state() {
        let mut index = index_with("m", &["1.0.0"]);
        index.promote("m", v("1.0.0")).unwrap();

        assert!(index.promote("m", v("9.9.9")).unwrap_err().is_not_found());
        assert_eq!(index.production_model(), Some("m:1.0.0"));
        assert_eq!(production_count(&index, "m"), 1);
    }

    #[test]
    fn test_remove_production_requires_force() {
        let mut index = index_with("m", &["1.0.0", "1.0.1"]);
        index.promote("m", v("1.0.1")).unwrap();

        let err = index.remove_version("m", v("1.0.1"), false).unwrap_err();
        assert!(err.is_production_protected());

        index.remove_version("m", v("1.0.1"), true).unwrap();
        assert_eq!(index.production_model(), None);
        assert_eq!(index.entry("m").unwrap().len(), 1);
    }

    #[test]
    fn test_remove_non_production_keeps_pointer() {
        let mut index = index_with("m", &["1.0.0", "1.0.1"]);
        index.promote("m", v("1.0.1")).unwrap();

        index.remove_version("m", v("1.0.0"), false).unwrap();
        assert_eq!(index.production_model(), Some("m:1.0.1"));
    }

    #[test]
    fn test_index_json_uses_version_string_keys() {
        let index = index_with("risk_model", &["1.0.0"]);
        let json = serde_json::to_value(&index).unwrap();

        let metadata = &json["models"]["risk_model"]["versions"]["1.0.0"];
        assert_eq!(metadata["version"], "1.0.0");
        assert_eq!(metadata["is_production"], false);
        assert!(metadata["parent_version"].is_null());
        assert!(json["production_model"].is_null());
        assert!(json["staging_model"].is_null());

        let back: RegistryIndex = serde_json::from_value(json).unwrap();
        assert_eq!(back, index);
    }
}
