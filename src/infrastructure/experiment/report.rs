//! Plain-text experiment report

use std::fmt::Write;

use crate::domain::experiment::ExperimentRecord;

const RULE: &str = "==============================================================";
const THIN_RULE: &str = "--------------------------------------------------------------";

/// Render the identity, hyperparameters, metrics and artifacts of a run
pub fn render_report(record: &ExperimentRecord) -> String {
    let mut out = String::new();

    // writing into a String cannot fail
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "EXPERIMENT REPORT");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "ID:        {}", record.experiment_id());
    let _ = writeln!(out, "Name:      {}", record.name());
    let _ = writeln!(out, "Status:    {}", record.status());
    let _ = writeln!(out, "Timestamp: {}", record.timestamp().to_rfc3339());
    if let Some(version) = record.model_version() {
        let _ = writeln!(out, "Model:     v{}", version);
    }
    if record.duration_seconds() > 0.0 {
        let _ = writeln!(out, "Duration:  {:.1}s", record.duration_seconds());
    }

    section(&mut out, "HYPERPARAMETERS");
    for (key, value) in record.hyperparameters() {
        let _ = writeln!(out, "  {}: {}", key, value);
    }

    section(&mut out, "METRICS");
    for (key, value) in record.metrics() {
        let _ = writeln!(out, "  {}: {:.4}", key, value);
    }

    section(&mut out, "ARTIFACTS");
    for artifact in record.artifacts() {
        let _ = writeln!(out, "  - {}", artifact);
    }

    let _ = writeln!(out, "{}", RULE);

    if !record.notes().is_empty() {
        let _ = writeln!(out, "\nNotes: {}", record.notes());
    }

    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}", THIN_RULE);
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", THIN_RULE);
}
