//! Versioning manager
//!
//! Binds one experiment run at a time to the model version it produces.
//! Training code talks to this facade; serving code reads the registry
//! directly.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::RegistryConfig;
use crate::domain::experiment::{
    ArtifactPayload, ExperimentId, ExperimentQuery, ExperimentStatus, StartExperimentRequest,
};
use crate::domain::registry::{
    ArtifactCodec, BinaryCodec, LoadedModel, ModelMetadata, RegisterModelRequest,
};
use crate::domain::version::{BumpType, SemanticVersion};
use crate::domain::DomainError;
use crate::infrastructure::experiment::ExperimentTracker;
use crate::infrastructure::registry::ModelRegistry;

/// Experiments shown in the system summary
const SUMMARY_EXPERIMENTS: usize = 10;

/// Metrics shown per experiment in the system summary
const SUMMARY_METRICS: usize = 3;

// ============================================================================
// Request Types
// ============================================================================

/// How to finish the active run
#[derive(Debug, Clone)]
pub struct EndRunRequest<A> {
    pub artifact: Option<A>,
    pub model_name: Option<String>,
    pub scaler: Option<A>,
    pub additional_artifacts: BTreeMap<String, A>,
    pub feature_names: Vec<String>,
    pub class_names: Vec<String>,
    pub bump_type: BumpType,
    pub notes: String,
}

impl<A> Default for EndRunRequest<A> {
    fn default() -> Self {
        Self {
            artifact: None,
            model_name: None,
            scaler: None,
            additional_artifacts: BTreeMap::new(),
            feature_names: Vec::new(),
            class_names: Vec::new(),
            bump_type: BumpType::default(),
            notes: String::new(),
        }
    }
}

impl<A> EndRunRequest<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `artifact` as a new version of `model_name`
    pub fn with_model(mut self, model_name: impl Into<String>, artifact: A) -> Self {
        self.model_name = Some(model_name.into());
        self.artifact = Some(artifact);
        self
    }

    pub fn with_scaler(mut self, scaler: A) -> Self {
        self.scaler = Some(scaler);
        self
    }

    pub fn with_additional_artifact(mut self, name: impl Into<String>, artifact: A) -> Self {
        self.additional_artifacts.insert(name.into(), artifact);
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

    pub fn with_bump_type(mut self, bump_type: BumpType) -> Self {
        self.bump_type = bump_type;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

#[derive(Debug)]
struct ActiveRun {
    id: ExperimentId,
    started: Instant,
}

// ============================================================================
// Versioning Manager
// ============================================================================

/// Facade holding at most one active run per instance
#[derive(Debug)]
pub struct VersioningManager<C>
where
    C: ArtifactCodec,
{
    registry: Arc<ModelRegistry<C>>,
    tracker: Arc<ExperimentTracker>,
    active: Mutex<Option<ActiveRun>>,
}

impl<C> VersioningManager<C>
where
    C: ArtifactCodec,
{
    pub fn new(registry: Arc<ModelRegistry<C>>, tracker: Arc<ExperimentTracker>) -> Self {
        Self {
            registry,
            tracker,
            active: Mutex::new(None),
        }
    }

    /// Open both stores from configuration
    pub async fn from_config(config: &RegistryConfig, codec: C) -> Result<Self, DomainError> {
        let registry = ModelRegistry::open(&config.registry_root, codec)
            .await?
            .with_lock_timeout(config.lock_timeout());
        let tracker = ExperimentTracker::open(&config.experiments_root)
            .await?
            .with_lock_timeout(config.lock_timeout());

        Ok(Self::new(Arc::new(registry), Arc::new(tracker)))
    }

    pub fn registry(&self) -> &Arc<ModelRegistry<C>> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<ExperimentTracker> {
        &self.tracker
    }

    // ========================================================================
    // Run lifecycle
    // ========================================================================

    /// Begin a run; fails with `Conflict` while another run is active
    pub async fn start_run(
        &self,
        request: StartExperimentRequest,
    ) -> Result<ExperimentId, DomainError> {
        let mut active = self.active.lock().await;

        if let Some(run) = active.as_ref() {
            return Err(DomainError::conflict(format!(
                "Run '{}' is still active; end or fail it before starting another",
                run.id
            )));
        }

        let id = self.tracker.start_experiment(request).await?;
        *active = Some(ActiveRun {
            id: id.clone(),
            started: Instant::now(),
        });

        info!(experiment_id = %id, "Started run");
        Ok(id)
    }

    pub async fn has_active_run(&self) -> bool {
        self.active.lock().await.is_some()
    }

    pub async fn current_run_id(&self) -> Option<ExperimentId> {
        self.active.lock().await.as_ref().map(|run| run.id.clone())
    }

    pub async fn log_metrics(&self, metrics: BTreeMap<String, f64>) -> Result<(), DomainError> {
        let id = self.require_active().await?;
        self.tracker.log_metrics(&id, metrics).await
    }

    pub async fn log_artifact(
        &self,
        name: &str,
        payload: impl Into<ArtifactPayload>,
    ) -> Result<String, DomainError> {
        let id = self.require_active().await?;
        self.tracker.log_artifact(&id, name, payload).await
    }

    /// Complete the active run, registering a model version when one is given.
    ///
    /// The run is no longer active afterwards, whatever the outcome. If the
    /// registration fails the experiment is marked failed with that error.
    pub async fn end_run(
        &self,
        request: EndRunRequest<C::Artifact>,
    ) -> Result<Option<ModelMetadata>, DomainError> {
        let run = self
            .active
            .lock()
            .await
            .take()
            .ok_or_else(no_active_run)?;

        let duration_seconds = run.started.elapsed().as_secs_f64();

        let EndRunRequest {
            artifact,
            model_name,
            scaler,
            additional_artifacts,
            feature_names,
            class_names,
            bump_type,
            notes,
        } = request;

        let registered = match (artifact, model_name) {
            (Some(artifact), Some(model_name)) if !model_name.is_empty() => {
                let mut registration = RegisterModelRequest::new(model_name, artifact)
                    .with_feature_names(feature_names)
                    .with_class_names(class_names)
                    .with_bump_type(bump_type)
                    .with_notes(&notes);
                if let Some(scaler) = scaler {
                    registration = registration.with_scaler(scaler);
                }
                registration.additional_artifacts = additional_artifacts;

                match self.register_from_run(&run.id, registration).await {
                    Ok(metadata) => Some(metadata),
                    Err(error) => {
                        if let Err(fail_error) = self
                            .tracker
                            .fail_experiment(&run.id, &error.to_string())
                            .await
                        {
                            warn!(
                                experiment_id = %run.id,
                                error = %fail_error,
                                "Failed to mark run as failed"
                            );
                        }
                        return Err(error);
                    }
                }
            }
            _ => None,
        };

        self.tracker
            .complete_experiment(
                &run.id,
                registered.as_ref().map(|m| m.version()),
                duration_seconds,
                &notes,
            )
            .await?;

        info!(
            experiment_id = %run.id,
            model = ?registered.as_ref().map(|m| m.qualified_name()),
            duration_seconds,
            "Ended run"
        );

        Ok(registered)
    }

    /// Copy the run's description, metrics, hyperparameters and dataset info onto the registration
    async fn register_from_run(
        &self,
        id: &ExperimentId,
        request: RegisterModelRequest<C::Artifact>,
    ) -> Result<ModelMetadata, DomainError> {
        let record = self
            .tracker
            .get_experiment(id)
            .await
            .ok_or_else(|| DomainError::not_found(format!("Experiment '{}' not found", id)))?;

        let request = request
            .with_description(record.description())
            .with_metrics(record.metrics().clone())
            .with_parameters(record.hyperparameters().clone())
            .with_training_data_info(record.dataset_info().clone());

        self.registry.register_model(request).await
    }

    /// Mark the active run failed
    pub async fn fail_run(&self, message: &str) -> Result<(), DomainError> {
        let run = self
            .active
            .lock()
            .await
            .take()
            .ok_or_else(no_active_run)?;

        self.tracker.fail_experiment(&run.id, message).await?;

        info!(experiment_id = %run.id, "Failed run");
        Ok(())
    }

    async fn require_active(&self) -> Result<ExperimentId, DomainError> {
        self.current_run_id().await.ok_or_else(no_active_run)
    }

    // ========================================================================
    // Registry pass-through
    // ========================================================================

    pub async fn promote_model(&self, name: &str, version: SemanticVersion) -> Result<bool, DomainError> {
        self.registry.promote_to_production(name, version).await
    }

    pub async fn get_production_model(
        &self,
        name: &str,
    ) -> Result<Option<LoadedModel<C::Artifact>>, DomainError> {
        self.registry.get_production_model(name).await
    }

    // ========================================================================
    // Summary
    // ========================================================================

    /// Registered models and the most recent experiments as plain text
    pub async fn generate_summary(&self) -> String {
        let models = self.registry.list_models().await;
        let experiments = self
            .tracker
            .list_experiments(&ExperimentQuery::new().with_limit(SUMMARY_EXPERIMENTS))
            .await;

        let mut out = String::new();

        // writing into a String cannot fail
        let _ = writeln!(out, "MODEL VERSIONING SYSTEM SUMMARY");
        let _ = writeln!(out, "===============================");
        let _ = writeln!(out);
        let _ = writeln!(out, "REGISTERED MODELS");
        let _ = writeln!(out, "-----------------");

        if models.is_empty() {
            let _ = writeln!(out, "  No models registered yet.");
        }
        for model in &models {
            let latest = model
                .latest_version
                .map(|v| format!("v{}", v))
                .unwrap_or_else(|| "no versions".to_string());
            let _ = writeln!(
                out,
                "  * {} ({}) - {} versions",
                model.name, latest, model.version_count
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "RECENT EXPERIMENTS");
        let _ = writeln!(out, "------------------");

        if experiments.is_empty() {
            let _ = writeln!(out, "  No experiments recorded yet.");
        }
        for record in &experiments {
            let marker = match record.status() {
                ExperimentStatus::Completed => "[ok]",
                ExperimentStatus::Running => "[..]",
                ExperimentStatus::Failed => "[!!]",
            };
            let _ = writeln!(out, "  {} {} ({})", marker, record.name(), record.experiment_id());

            if !record.metrics().is_empty() {
                let metrics: Vec<String> = record
                    .metrics()
                    .iter()
                    .take(SUMMARY_METRICS)
                    .map(|(name, value)| format!("{}: {:.4}", name, value))
                    .collect();
                let _ = writeln!(out, "       {}", metrics.join(", "));
            }
        }

        out
    }
}

fn no_active_run() -> DomainError {
    DomainError::no_active_run("No active run. Call start_run first.")
}

/// Manager over raw-byte artifacts rooted at the given directories
pub async fn create_versioning_manager(
    registry_root: impl Into<PathBuf>,
    experiments_root: impl Into<PathBuf>,
) -> Result<VersioningManager<BinaryCodec>, DomainError> {
    let registry = ModelRegistry::open(registry_root, BinaryCodec).await?;
    let tracker = ExperimentTracker::open(experiments_root).await?;

    Ok(VersioningManager::new(Arc::new(registry), Arc::new(tracker)))
}
