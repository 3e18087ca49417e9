//! Experiment requests, queries and comparisons

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::record::{ExperimentId, ExperimentRecord, ExperimentStatus};
use crate::domain::version::SemanticVersion;

/// Default number of experiments returned by a listing
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Request to start a new experiment
#[derive(Debug, Clone, Default)]
pub struct StartExperimentRequest {
    pub name: String,
    pub description: String,
    pub hyperparameters: BTreeMap<String, Value>,
    pub dataset_info: BTreeMap<String, Value>,
    pub tags: Vec<String>,
}

impl StartExperimentRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_hyperparameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.hyperparameters.insert(name.into(), value.into());
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

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Filter for `list_experiments`
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentQuery {
    pub status: Option<ExperimentStatus>,
    /// Matches records carrying any of these tags
    pub tags: Vec<String>,
    pub limit: usize,
}

impl Default for ExperimentQuery {
    fn default() -> Self {
        Self {
            status: None,
            tags: Vec::new(),
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl ExperimentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: ExperimentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn matches(&self, record: &ExperimentRecord) -> bool {
        if let Some(status) = self.status {
            if record.status() != status {
                return false;
            }
        }

        self.tags.is_empty() || record.has_any_tag(&self.tags)
    }

    /// Filter, sort newest first and truncate
    pub fn apply<'a, I>(&self, records: I) -> Vec<ExperimentRecord>
    where
        I: IntoIterator<Item = &'a ExperimentRecord>,
    {
        let mut matching: Vec<&ExperimentRecord> =
            records.into_iter().filter(|r| self.matches(r)).collect();

        matching.sort_by(|a, b| {
            b.timestamp()
                .cmp(&a.timestamp())
                .then_with(|| a.experiment_id().cmp(b.experiment_id()))
        });

        matching
            .into_iter()
            .take(self.limit)
            .cloned()
            .collect()
    }
}

/// Whether a larger or smaller metric value wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricGoal {
    #[default]
    Maximize,
    Minimize,
}

impl MetricGoal {
    pub fn from_maximize(maximize: bool) -> Self {
        if maximize {
            Self::Maximize
        } else {
            Self::Minimize
        }
    }

    /// Pick the best completed record carrying `metric`
    ///
    /// Ties go to the earliest timestamp, then the smallest ID.
    pub fn best<'a, I>(&self, metric: &str, records: I) -> Option<&'a ExperimentRecord>
    where
        I: IntoIterator<Item = &'a ExperimentRecord>,
    {
        records
            .into_iter()
            .filter(|r| r.status() == ExperimentStatus::Completed)
            .filter_map(|r| r.metric(metric).map(|value| (value, r)))
            .min_by(|(va, a), (vb, b)| {
                let by_value = match self {
                    Self::Maximize => vb.total_cmp(va),
                    Self::Minimize => va.total_cmp(vb),
                };

                by_value
                    .then_with(|| a.timestamp().cmp(&b.timestamp()))
                    .then_with(|| a.experiment_id().cmp(b.experiment_id()))
            })
            .map(|(_, record)| record)
    }
}

/// One experiment's row in a comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentOverview {
    pub id: ExperimentId,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub status: ExperimentStatus,
    pub model_version: Option<SemanticVersion>,
    pub duration_seconds: f64,
}

impl From<&ExperimentRecord> for ExperimentOverview {
    fn from(record: &ExperimentRecord) -> Self {
        Self {
            id: record.experiment_id().clone(),
            name: record.name().to_string(),
            timestamp: record.timestamp(),
            status: record.status(),
            model_version: record.model_version(),
            duration_seconds: record.duration_seconds(),
        }
    }
}

/// Result of `compare_experiments`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ExperimentComparison {
    pub experiments: Vec<ExperimentOverview>,
    /// metric -> experiment ID -> value (`None` when that run lacks it)
    pub metrics_comparison: BTreeMap<String, BTreeMap<ExperimentId, Option<f64>>>,
}

impl ExperimentComparison {
    pub fn from_records(records: &[&ExperimentRecord]) -> Self {
        let metric_names: std::collections::BTreeSet<&String> = records
            .iter()
            .flat_map(|r| r.metrics().keys())
            .collect();

        let metrics_comparison = metric_names
            .into_iter()
            .map(|metric| {
                let per_run = records
                    .iter()
                    .map(|r| (r.experiment_id().clone(), r.metric(metric)))
                    .collect();
                (metric.clone(), per_run)
            })
            .collect();

        Self {
            experiments: records.iter().map(|r| ExperimentOverview::from(*r)).collect(),
            metrics_comparison,
        }
    }
}
