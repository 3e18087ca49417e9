//! Experiment infrastructure - File-backed run tracking

mod report;
mod tracker;

pub use report::render_report;
pub use tracker::{ExperimentTracker, EXPERIMENTS_INDEX_FILE};
