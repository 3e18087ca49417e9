use clap::Parser;
use model_registry::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let store = &cli.store;

    match cli.command {
        Command::Models => cli::models::list(store).await,
        Command::Versions(args) => cli::models::versions(store, args).await,
        Command::Show(args) => cli::models::show(store, args).await,
        Command::Compare(args) => cli::models::compare(store, args).await,
        Command::Promote(args) => cli::models::promote(store, args).await,
        Command::Rollback(args) => cli::models::rollback(store, args).await,
        Command::Delete(args) => cli::models::delete(store, args).await,
        Command::Experiments(args) => cli::experiments::list(store, args).await,
        Command::Experiment(args) => cli::experiments::report(store, args).await,
        Command::CompareExperiments(args) => cli::experiments::compare(store, args).await,
        Command::Best(args) => cli::experiments::best(store, args).await,
        Command::Summary => cli::summary::run(store).await,
    }
}
