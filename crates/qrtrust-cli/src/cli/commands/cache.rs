use serde_json::json;

use crate::cli::args::{CacheSub, GlobalArgs};
use crate::cli::helpers::{load_config, open_cache, print_json};
use crate::exit_codes;

pub fn run(global: &GlobalArgs, cmd: CacheSub) -> anyhow::Result<i32> {
    let config = load_config(global)?;
    let cache = open_cache(&config)?;

    match cmd {
        CacheSub::Stats => print_json(&cache.stats()?)?,
        CacheSub::Stale { limit } => print_json(&cache.list_stale(limit)?)?,
        CacheSub::List { limit } => print_json(&cache.list(limit)?)?,
        CacheSub::MarkStale => print_json(&json!({ "marked": cache.mark_all_stale()? }))?,
        CacheSub::Clear => print_json(&json!({ "cleared": cache.clear()? }))?,
    }
    Ok(exit_codes::SUCCESS)
}
