//! File-backed model registry

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::registry::{
    validate_artifact_name, validate_metrics, validate_model_name, ArtifactCodec, LoadedModel,
    ModelMetadata, ModelSummary, RegisterModelRequest, RegistryIndex, VersionComparison,
    VersionSummary,
};
use crate::domain::storage::DocumentStore;
use crate::domain::version::SemanticVersion;
use crate::domain::DomainError;
use crate::infrastructure::locks::{KeyedLocks, DEFAULT_LOCK_TIMEOUT};
use crate::infrastructure::storage::fs::{read_optional, remove_dir_quietly, temp_sibling};
use crate::infrastructure::storage::{sha256_hex, DocumentCell, JsonFileStore};

/// Index file name under the registry root
pub const REGISTRY_INDEX_FILE: &str = "registry.json";

/// Directory holding one sub-directory per model name
pub const MODELS_DIR: &str = "models";

/// Per-version metadata copy
pub const METADATA_FILE: &str = "metadata.json";

/// Sub-directory of a version holding named side artifacts
pub const ARTIFACTS_DIR: &str = "artifacts";

/// Encoded files of one version, written together into its directory
struct VersionFiles<'a> {
    model: &'a [u8],
    scaler: Option<&'a [u8]>,
    additional: &'a BTreeMap<String, Vec<u8>>,
}

/// Versioned store of model artifacts and their metadata.
///
/// Layout under `root`:
/// - `registry.json`
/// - `models/<name>/<version>/model.<ext>` (+ optional `scaler.<ext>`)
/// - `models/<name>/<version>/artifacts/<artifact>.<ext>`
/// - `models/<name>/<version>/metadata.json`
///
/// Mutations of one model name are serialized by a per-name lock. Every index
/// change is written to a copy, persisted atomically, then swapped in.
#[derive(Debug)]
pub struct ModelRegistry<C>
where
    C: ArtifactCodec,
{
    root: PathBuf,
    codec: C,
    index: DocumentCell<RegistryIndex>,
    locks: KeyedLocks,
}

impl<C> ModelRegistry<C>
where
    C: ArtifactCodec,
{
    /// Open (or create) a registry rooted at `root`
    pub async fn open(root: impl Into<PathBuf>, codec: C) -> Result<Self, DomainError> {
        let root = root.into();
        let store = Arc::new(JsonFileStore::new(root.join(REGISTRY_INDEX_FILE)));
        Self::with_store(root, codec, store).await
    }

    /// Open a registry whose index lives in `store`; artifacts still go under `root`
    pub async fn with_store(
        root: impl Into<PathBuf>,
        codec: C,
        store: Arc<dyn DocumentStore<RegistryIndex>>,
    ) -> Result<Self, DomainError> {
        let root = root.into();

        tokio::fs::create_dir_all(root.join(MODELS_DIR))
            .await
            .map_err(|e| DomainError::io(&root, e))?;

        let index = DocumentCell::open(store).await?;

        info!(
            root = %root.display(),
            index = %index.location(),
            models = index.read().await.models().len(),
            "Opened model registry"
        );

        Ok(Self {
            root,
            codec,
            index,
            locks: KeyedLocks::new("model", DEFAULT_LOCK_TIMEOUT),
        })
    }

    /// Bound how long a mutation waits for its model-name lock
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.locks = KeyedLocks::new("model", timeout);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Consistent copy of the current index
    pub async fn snapshot(&self) -> RegistryIndex {
        self.index.snapshot().await
    }

    /// Directory holding one version's files
    pub fn version_dir(&self, name: &str, version: SemanticVersion) -> PathBuf {
        self.root
            .join(MODELS_DIR)
            .join(name)
            .join(version.to_string())
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Store a new version of `request.name` and return its metadata
    pub async fn register_model(
        &self,
        request: RegisterModelRequest<C::Artifact>,
    ) -> Result<ModelMetadata, DomainError> {
        validate_model_name(&request.name)?;
        validate_metrics(&request.metrics)?;
        for artifact_name in request.additional_artifacts.keys() {
            validate_artifact_name(artifact_name)?;
        }

        let _guard = self.locks.acquire(&request.name).await?;

        let (version, parent_version) = self
            .index
            .read()
            .await
            .next_version(&request.name, request.bump_type);

        let model_bytes = self.codec.encode(&request.artifact)?;
        let scaler_bytes = match &request.scaler {
            Some(scaler) => Some(self.codec.encode(scaler)?),
            None => None,
        };
        let additional_bytes = request
            .additional_artifacts
            .iter()
            .map(|(artifact_name, artifact)| {
                Ok((artifact_name.clone(), self.codec.encode(artifact)?))
            })
            .collect::<Result<BTreeMap<_, _>, DomainError>>()?;

        let mut metadata = ModelMetadata::new(&request.name, version)
            .with_description(request.description)
            .with_metrics(request.metrics)
            .with_parameters(request.parameters)
            .with_feature_names(request.feature_names)
            .with_class_names(request.class_names)
            .with_tags(request.tags)
            .with_parent_version(parent_version)
            .with_file_info(sha256_hex(&model_bytes), model_bytes.len() as u64)
            .with_training_data_info(request.training_data_info)
            .with_additional_artifacts(additional_bytes.keys().cloned().collect())
            .with_notes(request.notes);

        if let Some(model_type) = request.model_type {
            metadata = metadata.with_model_type(model_type);
        }
        if let Some(framework) = request.framework {
            metadata = metadata.with_framework(framework);
        }

        let version_dir = self.version_dir(&request.name, version);
        let files = VersionFiles {
            model: &model_bytes,
            scaler: scaler_bytes.as_deref(),
            additional: &additional_bytes,
        };
        self.write_version_dir(&version_dir, &metadata, &files).await?;

        let inserted = metadata.clone();
        if let Err(error) = self.index.commit(move |index| index.insert_version(inserted)).await {
            remove_dir_quietly(&version_dir).await;
            return Err(error);
        }

        info!(
            model = %request.name,
            version = %version,
            parent = ?parent_version.map(|v| v.to_string()),
            bytes = model_bytes.len(),
            "Registered model version"
        );

        Ok(metadata)
    }

    /// Write all files of a version into a staging directory, then rename it into place
    async fn write_version_dir(
        &self,
        version_dir: &Path,
        metadata: &ModelMetadata,
        files: &VersionFiles<'_>,
    ) -> Result<(), DomainError> {
        let name_dir = version_dir
            .parent()
            .ok_or_else(|| DomainError::storage("Version directory has no parent"))?;

        tokio::fs::create_dir_all(name_dir)
            .await
            .map_err(|e| DomainError::io(name_dir, e))?;

        let staging = temp_sibling(version_dir, "staging");

        let written = self
            .write_staging(&staging, metadata, files)
            .await;
        if let Err(error) = written {
            remove_dir_quietly(&staging).await;
            return Err(error);
        }

        // Left behind by an interrupted registration that never reached the index
        if tokio::fs::try_exists(version_dir).await.unwrap_or(false) {
            warn!(path = %version_dir.display(), "Removing stale version directory");
            if let Err(e) = tokio::fs::remove_dir_all(version_dir).await {
                remove_dir_quietly(&staging).await;
                return Err(DomainError::io(version_dir, e));
            }
        }

        if let Err(e) = tokio::fs::rename(&staging, version_dir).await {
            remove_dir_quietly(&staging).await;
            return Err(DomainError::io(version_dir, e));
        }

        debug!(path = %version_dir.display(), "Wrote version directory");
        Ok(())
    }

    async fn write_staging(
        &self,
        staging: &Path,
        metadata: &ModelMetadata,
        files: &VersionFiles<'_>,
    ) -> Result<(), DomainError> {
        tokio::fs::create_dir_all(staging)
            .await
            .map_err(|e| DomainError::io(staging, e))?;

        let model_path = staging.join(self.artifact_file("model"));
        tokio::fs::write(&model_path, files.model)
            .await
            .map_err(|e| DomainError::io(&model_path, e))?;

        if let Some(scaler_bytes) = files.scaler {
            let scaler_path = staging.join(self.artifact_file("scaler"));
            tokio::fs::write(&scaler_path, scaler_bytes)
                .await
                .map_err(|e| DomainError::io(&scaler_path, e))?;
        }

        if !files.additional.is_empty() {
            let artifacts_dir = staging.join(ARTIFACTS_DIR);
            tokio::fs::create_dir_all(&artifacts_dir)
                .await
                .map_err(|e| DomainError::io(&artifacts_dir, e))?;

            for (artifact_name, bytes) in files.additional {
                let path = artifacts_dir.join(self.artifact_file(artifact_name));
                tokio::fs::write(&path, bytes)
                    .await
                    .map_err(|e| DomainError::io(&path, e))?;
            }
        }

        let metadata_path = staging.join(METADATA_FILE);
        let metadata_json = serde_json::to_vec_pretty(metadata)
            .map_err(|e| DomainError::serde(&metadata_path, e))?;
        tokio::fs::write(&metadata_path, metadata_json)
            .await
            .map_err(|e| DomainError::io(&metadata_path, e))?;

        Ok(())
    }

    fn artifact_file(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.codec.extension())
    }

    // ========================================================================
    // Retrieval
    // ========================================================================

    /// Metadata of a version (latest when `version` is `None`) without reading the artifact
    pub async fn get_metadata(
        &self,
        name: &str,
        version: Option<SemanticVersion>,
    ) -> Result<ModelMetadata, DomainError> {
        Ok(self.index.read().await.resolve(name, version)?.clone())
    }

    /// Load a version (latest when `version` is `None`)
    pub async fn get_model(
        &self,
        name: &str,
        version: Option<SemanticVersion>,
    ) -> Result<LoadedModel<C::Artifact>, DomainError> {
        let metadata = self.index.read().await.resolve(name, version)?.clone();
        let version_dir = self.version_dir(name, metadata.version());

        let model_path = version_dir.join(self.artifact_file("model"));
        let model_bytes = tokio::fs::read(&model_path)
            .await
            .map_err(|e| DomainError::io(&model_path, e))?;

        let actual_hash = sha256_hex(&model_bytes);
        if actual_hash != metadata.file_hash() {
            return Err(DomainError::storage(format!(
                "{}: content hash {} does not match recorded {}",
                model_path.display(),
                actual_hash,
                metadata.file_hash()
            )));
        }

        let model = self.codec.decode(&model_bytes)?;

        let scaler_path = version_dir.join(self.artifact_file("scaler"));
        let scaler = match read_optional(&scaler_path).await? {
            Some(bytes) => Some(self.codec.decode(&bytes)?),
            None => None,
        };

        let mut additional_artifacts = BTreeMap::new();
        for artifact_name in metadata.additional_artifacts() {
            let path = version_dir
                .join(ARTIFACTS_DIR)
                .join(self.artifact_file(artifact_name));
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| DomainError::io(&path, e))?;
            additional_artifacts.insert(artifact_name.clone(), self.codec.decode(&bytes)?);
        }

        debug!(model = %name, version = %metadata.version(), "Loaded model version");

        Ok(LoadedModel {
            model,
            scaler,
            additional_artifacts,
            metadata,
        })
    }

    /// Alias of [`get_model`](Self::get_model)
    pub async fn load_model(
        &self,
        name: &str,
        version: Option<SemanticVersion>,
    ) -> Result<LoadedModel<C::Artifact>, DomainError> {
        self.get_model(name, version).await
    }

    /// Load the production version of `name`, if one is marked
    pub async fn get_production_model(
        &self,
        name: &str,
    ) -> Result<Option<LoadedModel<C::Artifact>>, DomainError> {
        let production = self
            .index
            .read()
            .await
            .entry(name)
            .and_then(|entry| entry.production())
            .map(|metadata| metadata.version());

        match production {
            Some(version) => self.get_model(name, Some(version)).await.map(Some),
            None => {
                debug!(model = %name, "No production version");
                Ok(None)
            }
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Make `version` the only production version of `name`
    pub async fn promote_to_production(
        &self,
        name: &str,
        version: SemanticVersion,
    ) -> Result<bool, DomainError> {
        let _guard = self.locks.acquire(name).await?;

        self.index.commit(|index| index.promote(name, version)).await?;

        info!(model = %name, version = %version, "Promoted model to production");
        Ok(true)
    }

    /// Re-promote an existing earlier version
    pub async fn rollback(&self, name: &str, version: SemanticVersion) -> Result<bool, DomainError> {
        let promoted = self.promote_to_production(name, version).await?;
        info!(model = %name, version = %version, "Rolled back production model");
        Ok(promoted)
    }

    /// Remove a version's files and index entry
    pub async fn delete_version(
        &self,
        name: &str,
        version: SemanticVersion,
        force: bool,
    ) -> Result<bool, DomainError> {
        let _guard = self.locks.acquire(name).await?;

        {
            let index = self.index.read().await;
            let metadata = index.metadata(name, version)?;
            if metadata.is_production() && !force {
                return Err(DomainError::production_protected(format!(
                    "Cannot delete production model {} v{}. Use force or promote another version first.",
                    name, version
                )));
            }
        }

        let version_dir = self.version_dir(name, version);
        let trash = temp_sibling(&version_dir, "trash");

        let moved = match tokio::fs::rename(&version_dir, &trash).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %version_dir.display(), "Version directory already missing");
                false
            }
            Err(e) => return Err(DomainError::io(&version_dir, e)),
        };

        let committed = self
            .index
            .commit(|index| index.remove_version(name, version, force).map(|_| ()))
            .await;

        if let Err(error) = committed {
            if moved {
                if let Err(e) = tokio::fs::rename(&trash, &version_dir).await {
                    warn!(path = %trash.display(), error = %e, "Failed to restore version directory");
                }
            }
            return Err(error);
        }

        if moved {
            remove_dir_quietly(&trash).await;
        }

        info!(model = %name, version = %version, force, "Deleted model version");
        Ok(true)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Diff metrics and parameters of two versions (`diff = v2 - v1`)
    pub async fn compare_versions(
        &self,
        name: &str,
        version1: SemanticVersion,
        version2: SemanticVersion,
    ) -> Result<VersionComparison, DomainError> {
        let index = self.index.read().await;
        let first = index.metadata(name, version1)?;
        let second = index.metadata(name, version2)?;

        Ok(VersionComparison::between(first, second))
    }

    pub async fn list_models(&self) -> Vec<ModelSummary> {
        self.index
            .read()
            .await
            .models()
            .iter()
            .map(|(name, entry)| ModelSummary::from_entry(name, entry))
            .collect()
    }

    /// Versions of `name`, newest first; empty for unknown names
    pub async fn list_versions(&self, name: &str) -> Vec<VersionSummary> {
        self.index
            .read()
            .await
            .entry(name)
            .map(|entry| {
                entry
                    .versions()
                    .values()
                    .rev()
                    .map(VersionSummary::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `"name:version"` of the most recently promoted version, if any
    pub async fn production_pointer(&self) -> Option<String> {
        self.index
            .read()
            .await
            .production_model()
            .map(str::to_string)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Persist the in-memory index again
    pub async fn flush(&self) -> Result<(), DomainError> {
        self.index.flush().await
    }

    /// Flush and release the registry
    pub async fn close(self) -> Result<(), DomainError> {
        self.flush().await?;
        info!(root = %self.root.display(), "Closed model registry");
        Ok(())
    }
}
