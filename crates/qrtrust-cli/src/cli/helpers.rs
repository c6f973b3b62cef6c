use anyhow::Context;
use qrtrust_core::{TrustCache, TrustConfig, TrustRegistryClient};
use serde::Serialize;

use super::args::GlobalArgs;

/// Layer config: file (or defaults), then `QRTRUST_*` env, then flags.
pub fn load_config(global: &GlobalArgs) -> anyhow::Result<TrustConfig> {
    let base = match &global.config {
        Some(path) => TrustConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TrustConfig::default(),
    };

    let mut config = base.with_env_overrides();
    if let Some(url) = &global.registry_url {
        config = config.with_registry_url(url.clone());
    }
    if let Some(path) = &global.cache_path {
        config = config.with_cache_path(path.clone());
    }
    if let Some(ms) = global.timeout_ms {
        config.timeout_ms = ms;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

pub fn open_cache(config: &TrustConfig) -> anyhow::Result<TrustCache> {
    let path = config.resolved_cache_path()?;
    TrustCache::open(&path).with_context(|| format!("opening trust cache {}", path.display()))
}

pub fn build_client(config: &TrustConfig) -> anyhow::Result<TrustRegistryClient> {
    let cache = open_cache(config)?;
    TrustRegistryClient::new(config, cache).context("creating registry client")
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_flags_override_env_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("qrtrust.yaml");
        std::fs::write(
            &file,
            "registry_url: https://file.example/api\ntimeout_ms: 1000\nmin_call_interval_ms: 7\n",
        )
        .unwrap();

        std::env::set_var("QRTRUST_REGISTRY_TIMEOUT_MS", "2000");
        std::env::set_var("QRTRUST_REGISTRY_URL", "https://env.example/api");
        let global = GlobalArgs {
            config: Some(file),
            registry_url: Some("https://flag.example/api".into()),
            ..GlobalArgs::default()
        };
        let config = load_config(&global);
        std::env::remove_var("QRTRUST_REGISTRY_TIMEOUT_MS");
        std::env::remove_var("QRTRUST_REGISTRY_URL");

        let config = config.unwrap();
        assert_eq!(config.registry_url, "https://flag.example/api");
        assert_eq!(config.timeout_ms, 2000);
        assert_eq!(config.min_call_interval_ms, 7);
    }

    #[test]
    #[serial]
    fn test_invalid_flag_value_rejected() {
        let global = GlobalArgs {
            timeout_ms: Some(0),
            ..GlobalArgs::default()
        };
        assert!(load_config(&global).is_err());
    }
}
