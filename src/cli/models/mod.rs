//! Model commands - inspect and manage registered versions

use clap::Args;
use serde_json::json;
use tracing::info;

use crate::domain::version::SemanticVersion;

use super::{open_manager, print_json, StoreArgs};

#[derive(Args, Clone, Debug)]
pub struct VersionsArgs {
    /// Model name
    pub name: String,
}

#[derive(Args, Clone, Debug)]
pub struct ShowArgs {
    /// Model name
    pub name: String,

    /// Version to show (latest if omitted)
    #[arg(long)]
    pub version: Option<SemanticVersion>,
}

#[derive(Args, Clone, Debug)]
pub struct CompareArgs {
    /// Model name
    pub name: String,

    /// Baseline version
    pub version1: SemanticVersion,

    /// Candidate version
    pub version2: SemanticVersion,
}

#[derive(Args, Clone, Debug)]
pub struct PromoteArgs {
    /// Model name
    pub name: String,

    /// Version to put in production
    pub version: SemanticVersion,
}

#[derive(Args, Clone, Debug)]
pub struct DeleteArgs {
    /// Model name
    pub name: String,

    /// Version to delete
    pub version: SemanticVersion,

    /// Delete even if the version is in production
    #[arg(long)]
    pub force: bool,
}

pub async fn list(store: &StoreArgs) -> anyhow::Result<()> {
    let manager = open_manager(store).await?;
    print_json(&manager.registry().list_models().await)
}

pub async fn versions(store: &StoreArgs, args: VersionsArgs) -> anyhow::Result<()> {
    let manager = open_manager(store).await?;
    print_json(&manager.registry().list_versions(&args.name).await)
}

pub async fn show(store: &StoreArgs, args: ShowArgs) -> anyhow::Result<()> {
    let manager = open_manager(store).await?;
    let metadata = manager
        .registry()
        .get_metadata(&args.name, args.version)
        .await?;
    print_json(&metadata)
}

pub async fn compare(store: &StoreArgs, args: CompareArgs) -> anyhow::Result<()> {
    let manager = open_manager(store).await?;
    let comparison = manager
        .registry()
        .compare_versions(&args.name, args.version1, args.version2)
        .await?;
    print_json(&comparison)
}

pub async fn promote(store: &StoreArgs, args: PromoteArgs) -> anyhow::Result<()> {
    let manager = open_manager(store).await?;
    manager.promote_model(&args.name, args.version).await?;

    info!(model = %args.name, version = %args.version, "Promotion complete");
    print_json(&json!({ "production": format!("{}:{}", args.name, args.version) }))
}

pub async fn rollback(store: &StoreArgs, args: PromoteArgs) -> anyhow::Result<()> {
    let manager = open_manager(store).await?;
    manager.registry().rollback(&args.name, args.version).await?;

    print_json(&json!({ "production": format!("{}:{}", args.name, args.version) }))
}

pub async fn delete(store: &StoreArgs, args: DeleteArgs) -> anyhow::Result<()> {
    let manager = open_manager(store).await?;
    let deleted = manager
        .registry()
        .delete_version(&args.name, args.version, args.force)
        .await?;

    print_json(&json!({ "deleted": deleted, "model": args.name, "version": args.version }))
}
