//! Summary command - models and recent experiments at a glance

use super::{open_manager, StoreArgs};

pub async fn run(store: &StoreArgs) -> anyhow::Result<()> {
    let manager = open_manager(store).await?;
    print!("{}", manager.generate_summary().await);
    Ok(())
}
