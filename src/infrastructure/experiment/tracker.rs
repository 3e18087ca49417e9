//! File-backed experiment tracker

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::experiment::{
    validate_artifact_name, ArtifactPayload, ExperimentComparison, ExperimentId, ExperimentIndex,
    ExperimentQuery, ExperimentRecord, ExperimentValidationError, MetricGoal,
    StartExperimentRequest,
};
use crate::domain::storage::DocumentStore;
use crate::domain::version::SemanticVersion;
use crate::domain::DomainError;
use crate::infrastructure::locks::{KeyedLocks, DEFAULT_LOCK_TIMEOUT};
use crate::infrastructure::storage::fs::{read_optional, remove_dir_quietly, remove_file_quietly};
use crate::infrastructure::storage::{atomic_write, DocumentCell, JsonFileStore};

use super::report::render_report;

/// Index file name under the experiments root
pub const EXPERIMENTS_INDEX_FILE: &str = "experiments.json";

/// Persistent store of experiment runs.
///
/// Layout under `root`:
/// - `experiments.json`
/// - `<experiment_id>/<artifact>.{json|txt|bin}`
#[derive(Debug)]
pub struct ExperimentTracker {
    root: PathBuf,
    index: DocumentCell<ExperimentIndex>,
    locks: KeyedLocks,
}

impl ExperimentTracker {
    /// Open (or create) a tracker rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let root = root.into();
        let store = Arc::new(JsonFileStore::new(root.join(EXPERIMENTS_INDEX_FILE)));
        Self::with_store(root, store).await
    }

    /// Open a tracker whose index lives in `store`; artifacts still go under `root`
    pub async fn with_store(
        root: impl Into<PathBuf>,
        store: Arc<dyn DocumentStore<ExperimentIndex>>,
    ) -> Result<Self, DomainError> {
        let root = root.into();

        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| DomainError::io(&root, e))?;

        let index = DocumentCell::open(store).await?;

        info!(
            root = %root.display(),
            index = %index.location(),
            experiments = index.read().await.len(),
            "Opened experiment tracker"
        );

        Ok(Self {
            root,
            index,
            locks: KeyedLocks::new("experiment", DEFAULT_LOCK_TIMEOUT),
        })
    }

    /// Bound how long a mutation waits for its experiment lock
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.locks = KeyedLocks::new("experiment", timeout);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn experiment_dir(&self, id: &ExperimentId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Create a `Running` experiment and its artifact directory
    pub async fn start_experiment(
        &self,
        request: StartExperimentRequest,
    ) -> Result<ExperimentId, DomainError> {
        if request.name.trim().is_empty() {
            return Err(ExperimentValidationError::EmptyName.into());
        }

        let id = ExperimentId::generate();
        let _guard = self.locks.acquire(id.as_str()).await?;

        let dir = self.experiment_dir(&id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DomainError::io(&dir, e))?;

        let record = ExperimentRecord::new(id.clone(), &request.name)
            .with_description(request.description)
            .with_hyperparameters(request.hyperparameters)
            .with_dataset_info(request.dataset_info)
            .with_tags(request.tags);

        if let Err(error) = self.index.commit(move |index| index.insert(record)).await {
            remove_dir_quietly(&dir).await;
            return Err(error);
        }

        info!(experiment_id = %id, name = %request.name, "Started experiment");
        Ok(id)
    }

    /// Merge metrics into a running experiment
    pub async fn log_metrics(
        &self,
        id: &ExperimentId,
        metrics: BTreeMap<String, f64>,
    ) -> Result<(), DomainError> {
        let _guard = self.locks.acquire(id.as_str()).await?;
        let count = metrics.len();

        self.index
            .commit(|index| {
                record_mut(index, id)?.log_metrics(metrics)?;
                Ok(())
            })
            .await?;

        debug!(experiment_id = %id, metrics = count, "Logged metrics");
        Ok(())
    }

    /// Store an artifact file and list it on the experiment; returns the file name
    pub async fn log_artifact(
        &self,
        id: &ExperimentId,
        artifact_name: &str,
        payload: impl Into<ArtifactPayload>,
    ) -> Result<String, DomainError> {
        validate_artifact_name(artifact_name)?;
        let payload = payload.into();

        let _guard = self.locks.acquire(id.as_str()).await?;

        {
            let index = self.index.read().await;
            let record = index
                .get(id)
                .ok_or_else(|| experiment_not_found(id))?;
            if record.status().is_terminal() {
                return Err(ExperimentValidationError::Terminal(
                    id.to_string(),
                    record.status().to_string(),
                )
                .into());
            }
        }

        let file_name = payload.file_name(artifact_name);
        let path = self.experiment_dir(id).join(&file_name);
        let bytes = payload.to_bytes()?;
        let previous = read_optional(&path).await?;

        atomic_write(&path, &bytes).await?;

        let listed = file_name.clone();
        let committed = self
            .index
            .commit(move |index| {
                record_mut(index, id)?.add_artifact(listed)?;
                Ok(())
            })
            .await;

        if let Err(error) = committed {
            self.restore_artifact(&path, previous).await;
            return Err(error);
        }

        debug!(experiment_id = %id, artifact = %file_name, "Logged artifact");
        Ok(file_name)
    }

    /// Put back the content an artifact file had before a failed log
    async fn restore_artifact(&self, path: &Path, previous: Option<Vec<u8>>) {
        match previous {
            Some(bytes) => {
                if let Err(error) = atomic_write(path, &bytes).await {
                    warn!(path = %path.display(), error = %error, "Failed to restore artifact");
                }
            }
            None => remove_file_quietly(path).await,
        }
    }

    /// `Running -> Completed`, linking the registered model version if any
    pub async fn complete_experiment(
        &self,
        id: &ExperimentId,
        model_version: Option<SemanticVersion>,
        duration_seconds: f64,
        notes: &str,
    ) -> Result<(), DomainError> {
        let _guard = self.locks.acquire(id.as_str()).await?;

        self.index
            .commit(|index| {
                record_mut(index, id)?.complete(model_version, duration_seconds, notes)?;
                Ok(())
            })
            .await?;

        info!(
            experiment_id = %id,
            model_version = ?model_version.map(|v| v.to_string()),
            "Completed experiment"
        );
        Ok(())
    }

    /// `Running -> Failed`, recording the error in the notes
    pub async fn fail_experiment(&self, id: &ExperimentId, error_message: &str) -> Result<(), DomainError> {
        let _guard = self.locks.acquire(id.as_str()).await?;

        self.index
            .commit(|index| {
                record_mut(index, id)?.fail(error_message)?;
                Ok(())
            })
            .await?;

        info!(experiment_id = %id, error = %error_message, "Experiment failed");
        Ok(())
    }

    pub async fn get_experiment(&self, id: &ExperimentId) -> Option<ExperimentRecord> {
        self.index.read().await.get(id).cloned()
    }

    /// Filtered listing, newest first
    pub async fn list_experiments(&self, query: &ExperimentQuery) -> Vec<ExperimentRecord> {
        query.apply(self.index.read().await.records())
    }

    /// Side-by-side metrics of the known experiments among `ids`
    pub async fn compare_experiments(&self, ids: &[ExperimentId]) -> ExperimentComparison {
        let index = self.index.read().await;
        let records: Vec<&ExperimentRecord> = ids.iter().filter_map(|id| index.get(id)).collect();

        ExperimentComparison::from_records(&records)
    }

    /// Completed experiment with the best value of `metric`
    pub async fn get_best_experiment(&self, metric: &str, maximize: bool) -> Option<ExperimentRecord> {
        let index = self.index.read().await;

        MetricGoal::from_maximize(maximize)
            .best(metric, index.records())
            .cloned()
    }

    /// Plain-text report of one experiment
    pub async fn generate_report(&self, id: &ExperimentId) -> Result<String, DomainError> {
        let index = self.index.read().await;
        let record = index.get(id).ok_or_else(|| experiment_not_found(id))?;

        Ok(render_report(record))
    }

    /// Persist the in-memory index again
    pub async fn flush(&self) -> Result<(), DomainError> {
        self.index.flush().await
    }

    /// Flush and release the tracker
    pub async fn close(self) -> Result<(), DomainError> {
        self.flush().await?;
        info!(root = %self.root.display(), "Closed experiment tracker");
        Ok(())
    }
}

fn experiment_not_found(id: &ExperimentId) -> DomainError {
    DomainError::not_found(format!("Experiment '{}' not found", id))
}

fn record_mut<'a>(
    index: &'a mut ExperimentIndex,
    id: &ExperimentId,
) -> Result<&'a mut ExperimentRecord, DomainError> {
    index.get_mut(id).ok_or_else(|| experiment_not_found(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::ExperimentStatus;
    use crate::domain::storage::mock::MockDocumentStore;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    async fn create_tracker(dir: &TempDir) -> ExperimentTracker {
        ExperimentTracker::open(dir.path().join("experiments"))
            .await
            .unwrap()
    }

    fn metrics(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    async fn completed_run(tracker: &ExperimentTracker, name: &str, accuracy: f64) -> ExperimentId {
        let id = tracker
            .start_experiment(StartExperimentRequest::new(name))
            .await
            .unwrap();
        tracker
            .log_metrics(&id, metrics(&[("accuracy", accuracy)]))
            .await
            .unwrap();
        tracker.complete_experiment(&id, None, 1.0, "").await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_start_experiment_creates_running_record() {
        let dir = TempDir::new().unwrap();
        let tracker = create_tracker(&dir).await;

        let id = tracker
            .start_experiment(
                StartExperimentRequest::new("baseline")
                    .with_description("first try")
                    .with_hyperparameter("max_depth", 5)
                    .with_tag("baseline"),
            )
            .await
            .unwrap();

        let record = tracker.get_experiment(&id).await.unwrap();
        assert_eq!(record.status(), ExperimentStatus::Running);
        assert_eq!(record.hyperparameters()["max_depth"], json!(5));
        assert!(tracker.experiment_dir(&id).is_dir());
        assert!(tracker.root().join(EXPERIMENTS_INDEX_FILE).exists());
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let tracker = create_tracker(&dir).await;

        let error = tracker
            .start_experiment(StartExperimentRequest::new("  "))
            .await
            .unwrap_err();
        assert!(error.is_validation());
    }

    #[tokio::test]
    async fn test_log_metrics_merges() {
        let dir = TempDir::new().unwrap();
        let tracker = create_tracker(&dir).await;
        let id = tracker
            .start_experiment(StartExperimentRequest::new("baseline"))
            .await
            .unwrap();

        tracker
            .log_metrics(&id, metrics(&[("accuracy", 0.8), ("loss", 0.4)]))
            .await
            .unwrap();
        tracker
            .log_metrics(&id, metrics(&[("accuracy", 0.85)]))
            .await
            .unwrap();

        let record = tracker.get_experiment(&id).await.unwrap();
        assert_eq!(record.metric("accuracy"), Some(0.85));
        assert_eq!(record.metric("loss"), Some(0.4));
    }

    #[tokio::test]
    async fn test_log_artifact_types_by_content() {
        let dir = TempDir::new().unwrap();
        let tracker = create_tracker(&dir).await;
        let id = tracker
            .start_experiment(StartExperimentRequest::new("baseline"))
            .await
            .unwrap();

        let config = tracker
            .log_artifact(&id, "config", json!({"lr": 0.01}))
            .await
            .unwrap();
        let report = tracker
            .log_artifact(&id, "report", "precision 0.9")
            .await
            .unwrap();
        let blob = tracker
            .log_artifact(&id, "weights", vec![0u8, 1, 2])
            .await
            .unwrap();

        assert_eq!(config, "config.json");
        assert_eq!(report, "report.txt");
        assert_eq!(blob, "weights.bin");

        let dir = tracker.experiment_dir(&id);
        assert_eq!(
            tokio::fs::read_to_string(dir.join("report.txt")).await.unwrap(),
            "precision 0.9"
        );
        assert_eq!(tokio::fs::read(dir.join("weights.bin")).await.unwrap(), vec![0u8, 1, 2]);

        let record = tracker.get_experiment(&id).await.unwrap();
        assert_eq!(record.artifacts(), ["config.json", "report.txt", "weights.bin"]);
    }

    #[tokio::test]
    async fn test_invalid_artifact_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let tracker = create_tracker(&dir).await;
        let id = tracker
            .start_experiment(StartExperimentRequest::new("baseline"))
            .await
            .unwrap();

        let error = tracker
            .log_artifact(&id, "../outside", "x")
            .await
            .unwrap_err();
        assert!(error.is_validation());
    }

    #[tokio::test]
    async fn test_terminal_experiment_rejects_logging() {
        let dir = TempDir::new().unwrap();
        let tracker = create_tracker(&dir).await;
        let id = completed_run(&tracker, "baseline", 0.8).await;

        assert!(tracker
            .log_metrics(&id, metrics(&[("accuracy", 1.0)]))
            .await
            .unwrap_err()
            .is_validation());
        assert!(tracker
            .log_artifact(&id, "late", "text")
            .await
            .unwrap_err()
            .is_validation());
        assert!(!tracker.experiment_dir(&id).join("late.txt").exists());

        let record = tracker.get_experiment(&id).await.unwrap();
        assert_eq!(record.metric("accuracy"), Some(0.8));
    }

    #[tokio::test]
    async fn test_failed_experiment_rejects_logging() {
        let dir = TempDir::new().unwrap();
        let tracker = create_tracker(&dir).await;
        let id = tracker
            .start_experiment(StartExperimentRequest::new("diverged"))
            .await
            .unwrap();
        tracker
            .log_metrics(&id, metrics(&[("loss", 0.7)]))
            .await
            .unwrap();
        tracker.fail_experiment(&id, "loss exploded").await.unwrap();

        assert!(tracker
            .log_metrics(&id, metrics(&[("loss", 0.1)]))
            .await
            .unwrap_err()
            .is_validation());
        assert!(tracker
            .log_artifact(&id, "late", json!({"epoch": 3}))
            .await
            .unwrap_err()
            .is_validation());
        assert!(!tracker.experiment_dir(&id).join("late.json").exists());

        let record = tracker.get_experiment(&id).await.unwrap();
        assert_eq!(record.status(), ExperimentStatus::Failed);
        assert_eq!(record.metric("loss"), Some(0.7));
        assert!(record.artifacts().is_empty());
    }

    #[tokio::test]
    async fn test_non_finite_metrics_keep_index_readable() {
        let dir = TempDir::new().unwrap();
        let id = {
            let tracker = create_tracker(&dir).await;
            let id = tracker
                .start_experiment(StartExperimentRequest::new("baseline"))
                .await
                .unwrap();
            tracker
                .log_metrics(&id, metrics(&[("loss", 0.4)]))
                .await
                .unwrap();

            for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
                assert!(tracker
                    .log_metrics(&id, metrics(&[("loss", value)]))
                    .await
                    .unwrap_err()
                    .is_validation());
            }
            tracker.close().await.unwrap();
            id
        };

        let reopened = create_tracker(&dir).await;
        let record = reopened.get_experiment(&id).await.unwrap();
        assert_eq!(record.metric("loss"), Some(0.4));
    }

    #[tokio::test]
    async fn test_fail_experiment_records_message() {
        let dir = TempDir::new().unwrap();
        let tracker = create_tracker(&dir).await;
        let id = tracker
            .start_experiment(StartExperimentRequest::new("baseline"))
            .await
            .unwrap();

        tracker.fail_experiment(&id, "out of memory").await.unwrap();

        let record = tracker.get_experiment(&id).await.unwrap();
        assert_eq!(record.status(), ExperimentStatus::Failed);
        assert_eq!(record.notes(), "Failed: out of memory");
        assert!(tracker
            .complete_experiment(&id, None, 0.0, "")
            .await
            .unwrap_err()
            .is_validation());
    }

    #[tokio::test]
    async fn test_unknown_experiment_is_not_found() {
        let dir = TempDir::new().unwrap();
        let tracker = create_tracker(&dir).await;
        let id = ExperimentId::new("exp_000000000000").unwrap();

        assert!(tracker.get_experiment(&id).await.is_none());
        assert!(tracker
            .log_metrics(&id, metrics(&[("accuracy", 1.0)]))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(tracker
            .log_artifact(&id, "config", "x")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(tracker.generate_report(&id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_complete_links_model_version() {
        let dir = TempDir::new().unwrap();
        let tracker = create_tracker(&dir).await;
        let id = tracker
            .start_experiment(StartExperimentRequest::new("baseline"))
            .await
            .unwrap();

        tracker
            .complete_experiment(&id, Some("1.0.1".parse().unwrap()), 42.0, "shipped")
            .await
            .unwrap();

        let record = tracker.get_experiment(&id).await.unwrap();
        assert_eq!(record.status(), ExperimentStatus::Completed);
        assert_eq!(record.model_version().unwrap().to_string(), "1.0.1");
        assert_eq!(record.duration_seconds(), 42.0);
    }

    #[tokio::test]
    async fn test_list_filters_and_limits() {
        let dir = TempDir::new().unwrap();
        let tracker = create_tracker(&dir).await;
        completed_run(&tracker, "a", 0.7).await;
        completed_run(&tracker, "b", 0.8).await;
        tracker
            .start_experiment(StartExperimentRequest::new("c").with_tag("gpu"))
            .await
            .unwrap();

        assert_eq!(tracker.list_experiments(&ExperimentQuery::new()).await.len(), 3);
        assert_eq!(
            tracker
                .list_experiments(&ExperimentQuery::new().with_status(ExperimentStatus::Completed))
                .await
                .len(),
            2
        );
        assert_eq!(
            tracker
                .list_experiments(&ExperimentQuery::new().with_tag("gpu"))
                .await[0]
                .name(),
            "c"
        );
        assert_eq!(
            tracker
                .list_experiments(&ExperimentQuery::new().with_limit(1))
                .await
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_best_experiment() {
        let dir = TempDir::new().unwrap();
        let tracker = create_tracker(&dir).await;
        completed_run(&tracker, "weak", 0.7).await;
        let strong = completed_run(&tracker, "strong", 0.9).await;

        let best = tracker.get_best_experiment("accuracy", true).await.unwrap();
        assert_eq!(best.experiment_id(), &strong);

        let worst = tracker.get_best_experiment("accuracy", false).await.unwrap();
        assert_eq!(worst.name(), "weak");

        assert!(tracker.get_best_experiment("f1", true).await.is_none());
    }

    #[tokio::test]
    async fn test_compare_experiments_skips_unknown_ids() {
        let dir = TempDir::new().unwrap();
        let tracker = create_tracker(&dir).await;
        let a = completed_run(&tracker, "a", 0.7).await;
        let b = completed_run(&tracker, "b", 0.9).await;
        let unknown = ExperimentId::new("exp_ffffffffffff").unwrap();

        let comparison = tracker.compare_experiments(&[a.clone(), unknown, b.clone()]).await;

        assert_eq!(comparison.experiments.len(), 2);
        assert_eq!(comparison.metrics_comparison["accuracy"][&a], Some(0.7));
        assert_eq!(comparison.metrics_comparison["accuracy"][&b], Some(0.9));
    }

    #[tokio::test]
    async fn test_tracker_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let id = {
            let tracker = create_tracker(&dir).await;
            let id = completed_run(&tracker, "baseline", 0.8).await;
            tracker.close().await.unwrap();
            id
        };

        let reopened = create_tracker(&dir).await;
        let record = reopened.get_experiment(&id).await.unwrap();
        assert_eq!(record.status(), ExperimentStatus::Completed);
        assert!(record.timestamp() <= Utc::now());
    }

    #[tokio::test]
    async fn test_failed_index_write_rolls_back_artifact() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MockDocumentStore::<ExperimentIndex>::new());
        let tracker = ExperimentTracker::with_store(dir.path(), store.clone())
            .await
            .unwrap();
        let id = tracker
            .start_experiment(StartExperimentRequest::new("baseline"))
            .await
            .unwrap();

        store.set_save_error(Some("disk full".to_string()));
        assert!(tracker
            .log_artifact(&id, "config", json!({"a": 1}))
            .await
            .unwrap_err()
            .is_storage());

        assert!(!tracker.experiment_dir(&id).join("config.json").exists());
        assert!(tracker.get_experiment(&id).await.unwrap().artifacts().is_empty());
    }

    #[tokio::test]
    async fn test_failed_relog_keeps_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MockDocumentStore::<ExperimentIndex>::new());
        let tracker = ExperimentTracker::with_store(dir.path(), store.clone())
            .await
            .unwrap();
        let id = tracker
            .start_experiment(StartExperimentRequest::new("baseline"))
            .await
            .unwrap();
        tracker.log_artifact(&id, "notes", "original").await.unwrap();

        store.set_save_error(Some("disk full".to_string()));
        assert!(tracker
            .log_artifact(&id, "notes", "replacement")
            .await
            .unwrap_err()
            .is_storage());

        let path = tracker.experiment_dir(&id).join("notes.txt");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "original");
        assert_eq!(
            tracker.get_experiment(&id).await.unwrap().artifacts(),
            ["notes.txt"]
        );
    }

    #[tokio::test]
    async fn test_failed_start_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MockDocumentStore::<ExperimentIndex>::new());
        let tracker = ExperimentTracker::with_store(dir.path(), store.clone())
            .await
            .unwrap();

        store.set_save_error(Some("disk full".to_string()));
        assert!(tracker
            .start_experiment(StartExperimentRequest::new("baseline"))
            .await
            .is_err());

        assert!(tracker.list_experiments(&ExperimentQuery::new()).await.is_empty());
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 0);
    }
}
