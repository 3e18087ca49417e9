//! CLI module for the model registry
//!
//! Operator commands over a local registry and experiment store:
//! - model commands: `models`, `versions`, `show`, `compare`, `promote`,
//!   `rollback`, `delete`
//! - experiment commands: `experiments`, `experiment`, `compare-experiments`,
//!   `best`
//! - `summary`: models and recent experiments at a glance

pub mod experiments;
pub mod models;
pub mod summary;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::config::AppConfig;
use crate::domain::BinaryCodec;
use crate::infrastructure::logging;
use crate::infrastructure::services::VersioningManager;

/// Model Registry - versioned model artifacts and experiment tracking
#[derive(Parser)]
#[command(name = "model-registry")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Store locations (override configuration)
#[derive(Args, Clone, Debug, Default)]
pub struct StoreArgs {
    /// Registry root directory
    #[arg(long, global = true)]
    pub registry_root: Option<String>,

    /// Experiments root directory
    #[arg(long, global = true)]
    pub experiments_root: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List registered models
    Models,

    /// List versions of a model, newest first
    Versions(models::VersionsArgs),

    /// Show metadata of a model version
    Show(models::ShowArgs),

    /// Compare metrics and parameters of two versions
    Compare(models::CompareArgs),

    /// Promote a version to production
    Promote(models::PromoteArgs),

    /// Re-promote an earlier version
    Rollback(models::PromoteArgs),

    /// Delete a version
    Delete(models::DeleteArgs),

    /// List experiments, newest first
    Experiments(experiments::ListArgs),

    /// Print the report of one experiment
    Experiment(experiments::ReportArgs),

    /// Compare metrics across experiments
    CompareExperiments(experiments::CompareArgs),

    /// Show the completed experiment with the best metric value
    Best(experiments::BestArgs),

    /// Print a summary of models and recent experiments
    Summary,
}

/// Load configuration, initialize logging and open both stores
pub async fn open_manager(store: &StoreArgs) -> anyhow::Result<VersioningManager<BinaryCodec>> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    if let Some(root) = &store.registry_root {
        config.registry.registry_root = root.clone();
    }
    if let Some(root) = &store.experiments_root {
        config.registry.experiments_root = root.clone();
    }

    Ok(crate::create_manager(&config).await?)
}

/// Write a value to stdout as pretty JSON
pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
