//! Version comparison results

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::entity::ModelMetadata;
use crate::domain::version::SemanticVersion;

/// Change of one metric between two versions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDelta {
    pub v1_value: f64,
    pub v2_value: f64,
    /// `v2_value - v1_value`
    pub diff: f64,
    pub improved: bool,
}

impl MetricDelta {
    pub fn new(v1_value: f64, v2_value: f64) -> Self {
        let diff = v2_value - v1_value;
        Self {
            v1_value,
            v2_value,
            diff,
            improved: diff > 0.0,
        }
    }
}

/// Hyperparameters of both versions side by side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterComparison {
    pub v1: BTreeMap<String, Value>,
    pub v2: BTreeMap<String, Value>,
}

/// Result of `compare_versions`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionComparison {
    pub name: String,
    pub version1: SemanticVersion,
    pub version2: SemanticVersion,
    /// Only metrics present in both versions
    pub metrics: BTreeMap<String, MetricDelta>,
    pub parameters: ParameterComparison,
}

impl VersionComparison {
    pub fn between(first: &ModelMetadata, second: &ModelMetadata) -> Self {
        let metrics = first
            .metrics()
            .iter()
            .filter_map(|(metric, v1)| {
                second
                    .metrics()
                    .get(metric)
                    .map(|v2| (metric.clone(), MetricDelta::new(*v1, *v2)))
            })
            .collect();

        Self {
            name: first.name().to_string(),
            version1: first.version(),
            version2: second.version(),
            metrics,
            parameters: ParameterComparison {
                v1: first.parameters().clone(),
                v2: second.parameters().clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(version: &str, metrics: &[(&str, f64)]) -> ModelMetadata {
        ModelMetadata::new("risk_model", version.parse().unwrap()).with_metrics(
            metrics
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        )
    }

    #[test]
    fn test_improvement_is_positive_diff() {
        let first = metadata("1.0.0", &[("accuracy", 0.80)]);
        let second = metadata("1.0.1", &[("accuracy", 0.85)]);

        let comparison = VersionComparison::between(&first, &second);
        let accuracy = &comparison.metrics["accuracy"];

        assert!((accuracy.diff - 0.05).abs() < 1e-9);
        assert!(accuracy.improved);
    }

    #[test]
    fn test_comparison_is_antisymmetric() {
        let first = metadata("1.0.0", &[("accuracy", 0.80), ("loss", 0.4)]);
        let second = metadata("1.0.1", &[("accuracy", 0.85), ("loss", 0.5)]);

        let forward = VersionComparison::between(&first, &second);
        let backward = VersionComparison::between(&second, &first);

        for (metric, delta) in &forward.metrics {
            assert_eq!(delta.diff, -backward.metrics[metric].diff);
        }
        assert!(!forward.metrics["loss"].improved);
        assert!(backward.metrics["loss"].improved);
    }

    #[test]
    fn test_only_shared_metrics_are_compared() {
        let first = metadata("1.0.0", &[("accuracy", 0.8), ("f1", 0.7)]);
        let second = metadata("1.0.1", &[("accuracy", 0.9), ("recall", 0.6)]);

        let comparison = VersionComparison::between(&first, &second);

        assert_eq!(comparison.metrics.len(), 1);
        assert!(comparison.metrics.contains_key("accuracy"));
    }

    #[test]
    fn test_equal_values_are_not_improvements() {
        let first = metadata("1.0.0", &[("accuracy", 0.8)]);
        let second = metadata("1.0.1", &[("accuracy", 0.8)]);

        let comparison = VersionComparison::between(&first, &second);
        assert!(!comparison.metrics["accuracy"].improved);
    }
}
