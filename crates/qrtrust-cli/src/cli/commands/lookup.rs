use anyhow::Context;
use qrtrust_core::CacheSource;
use serde_json::json;

use crate::cli::args::{GlobalArgs, LookupArgs};
use crate::cli::helpers::{build_client, load_config, print_json};
use crate::exit_codes;

pub async fn run(global: &GlobalArgs, args: LookupArgs) -> anyhow::Result<i32> {
    let config = load_config(global)?;
    let client = build_client(&config)?;

    let outcome = client
        .lookup_entry(&args.thumbprint, args.force, CacheSource::Upload)
        .await
        .context("looking up thumbprint")?;

    print_json(&json!({
        "found": outcome.found(),
        "fromCache": outcome.from_cache,
        "failure": outcome.failure,
        "entry": outcome.entry,
    }))?;

    Ok(if outcome.found() {
        exit_codes::SUCCESS
    } else {
        exit_codes::UNVERIFIED
    })
}
