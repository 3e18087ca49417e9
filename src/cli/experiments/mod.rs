//! Experiment commands - list, report and compare runs

use clap::Args;

use crate::domain::experiment::{ExperimentId, ExperimentQuery, ExperimentStatus, DEFAULT_LIST_LIMIT};

use super::{open_manager, print_json, StoreArgs};

#[derive(Args, Clone, Debug)]
pub struct ListArgs {
    /// Only experiments with this status (running, completed, failed)
    #[arg(long)]
    pub status: Option<ExperimentStatus>,

    /// Only experiments carrying any of these tags
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Maximum number of experiments
    #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
    pub limit: usize,
}

#[derive(Args, Clone, Debug)]
pub struct ReportArgs {
    /// Experiment ID
    pub id: String,
}

#[derive(Args, Clone, Debug)]
pub struct CompareArgs {
    /// Experiment IDs
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args, Clone, Debug)]
pub struct BestArgs {
    /// Metric to rank by
    pub metric: String,

    /// Prefer the smallest value instead of the largest
    #[arg(long)]
    pub minimize: bool,
}

impl ListArgs {
    fn query(&self) -> ExperimentQuery {
        ExperimentQuery {
            status: self.status,
            tags: self.tags.clone(),
            limit: self.limit,
        }
    }
}

pub async fn list(store: &StoreArgs, args: ListArgs) -> anyhow::Result<()> {
    let manager = open_manager(store).await?;
    print_json(&manager.tracker().list_experiments(&args.query()).await)
}

pub async fn report(store: &StoreArgs, args: ReportArgs) -> anyhow::Result<()> {
    let id = ExperimentId::new(args.id)?;
    let manager = open_manager(store).await?;

    print!("{}", manager.tracker().generate_report(&id).await?);
    Ok(())
}

pub async fn compare(store: &StoreArgs, args: CompareArgs) -> anyhow::Result<()> {
    let ids = args
        .ids
        .into_iter()
        .map(ExperimentId::new)
        .collect::<Result<Vec<_>, _>>()?;
    let manager = open_manager(store).await?;

    print_json(&manager.tracker().compare_experiments(&ids).await)
}

pub async fn best(store: &StoreArgs, args: BestArgs) -> anyhow::Result<()> {
    let manager = open_manager(store).await?;
    let best = manager
        .tracker()
        .get_best_experiment(&args.metric, !args.minimize)
        .await;

    print_json(&best)
}
