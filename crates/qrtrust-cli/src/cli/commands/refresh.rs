use anyhow::Context;
use qrtrust_core::Refresher;
use tracing::info;

use crate::cli::args::{GlobalArgs, RefreshArgs};
use crate::cli::helpers::{build_client, load_config, print_json};
use crate::exit_codes;

/// Drain the stale set once and print the cycle report.
pub async fn run_once(global: &GlobalArgs, args: RefreshArgs) -> anyhow::Result<i32> {
    let config = load_config(global)?;
    let client = build_client(&config)?;
    if args.all {
        client.cache().mark_all_stale()?;
    }

    let refresher = Refresher::new(client, config.refresh.clone());
    let report = refresher
        .run_until_drained()
        .await
        .context("refreshing trust cache")?;
    print_json(&report)?;
    Ok(exit_codes::SUCCESS)
}

/// Run the scheduler until Ctrl+C.
pub async fn run_scheduler(global: &GlobalArgs) -> anyhow::Result<i32> {
    let config = load_config(global)?;
    let client = build_client(&config)?;

    info!(
        registry = %client.base_url(),
        period_secs = config.refresh.period_secs,
        batch_size = config.refresh.batch_size,
        "starting refresher; press Ctrl+C to stop"
    );
    let handle = Refresher::new(client, config.refresh.clone()).spawn();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl+C")?;
    info!("stopping refresher");
    handle.shutdown().await;
    Ok(exit_codes::SUCCESS)
}
