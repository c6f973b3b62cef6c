//! Runtime configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Trust registry and cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Base URL of the trust registry (without `/issuers`).
    #[serde(default = "default_registry_url")]
    pub registry_url: String,

    /// Hard per-call timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Minimum spacing between registry calls in milliseconds.
    #[serde(default = "default_min_call_interval_ms")]
    pub min_call_interval_ms: u64,

    /// SQLite cache file. `None` uses the platform cache directory.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,

    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// Background refresh scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Entries older than this are considered stale at startup.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Maximum entries refreshed per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between registry calls within a batch.
    #[serde(default = "default_call_delay_ms")]
    pub call_delay_ms: u64,

    /// Pause before the next batch while stale entries remain.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Period of the re-flag-everything timer.
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
}

fn default_registry_url() -> String {
    "https://trust-bridge.example.org/api".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_min_call_interval_ms() -> u64 {
    100
}

fn default_stale_after_secs() -> u64 {
    24 * 60 * 60
}

fn default_batch_size() -> usize {
    50
}

fn default_call_delay_ms() -> u64 {
    100
}

fn default_batch_delay_ms() -> u64 {
    5_000
}

fn default_period_secs() -> u64 {
    24 * 60 * 60
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            registry_url: default_registry_url(),
            timeout_ms: default_timeout_ms(),
            min_call_interval_ms: default_min_call_interval_ms(),
            cache_path: None,
            refresh: RefreshConfig::default(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
            batch_size: default_batch_size(),
            call_delay_ms: default_call_delay_ms(),
            batch_delay_ms: default_batch_delay_ms(),
            period_secs: default_period_secs(),
        }
    }
}

impl TrustConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `QRTRUST_REGISTRY_URL` | Registry base URL |
    /// | `QRTRUST_REGISTRY_TIMEOUT_MS` | Per-call timeout |
    /// | `QRTRUST_REGISTRY_MIN_INTERVAL_MS` | Spacing between registry calls |
    /// | `QRTRUST_CACHE_PATH` | SQLite cache file |
    /// | `QRTRUST_STALE_AFTER_SECS` | Staleness window |
    /// | `QRTRUST_REFRESH_BATCH_SIZE` | Entries per refresh batch |
    /// | `QRTRUST_REFRESH_CALL_DELAY_MS` | Delay between calls in a batch |
    /// | `QRTRUST_REFRESH_BATCH_DELAY_MS` | Delay between batches |
    /// | `QRTRUST_REFRESH_PERIOD_SECS` | Re-flag period |
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load a YAML file. Missing fields take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_yaml::from_str(&text).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Apply any `QRTRUST_*` variables that are set, keeping other values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("QRTRUST_REGISTRY_URL") {
            self.registry_url = url;
        }
        if let Some(v) = env_parse("QRTRUST_REGISTRY_TIMEOUT_MS") {
            self.timeout_ms = v;
        }
        if let Some(v) = env_parse("QRTRUST_REGISTRY_MIN_INTERVAL_MS") {
            self.min_call_interval_ms = v;
        }
        if let Ok(path) = std::env::var("QRTRUST_CACHE_PATH") {
            if !path.is_empty() {
                self.cache_path = Some(PathBuf::from(path));
            }
        }
        if let Some(v) = env_parse("QRTRUST_STALE_AFTER_SECS") {
            self.refresh.stale_after_secs = v;
        }
        if let Some(v) = env_parse("QRTRUST_REFRESH_BATCH_SIZE") {
            self.refresh.batch_size = v;
        }
        if let Some(v) = env_parse("QRTRUST_REFRESH_CALL_DELAY_MS") {
            self.refresh.call_delay_ms = v;
        }
        if let Some(v) = env_parse("QRTRUST_REFRESH_BATCH_DELAY_MS") {
            self.refresh.batch_delay_ms = v;
        }
        if let Some(v) = env_parse("QRTRUST_REFRESH_PERIOD_SECS") {
            self.refresh.period_secs = v;
        }
        self
    }

    /// Set the registry base URL.
    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into();
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the minimum spacing between registry calls.
    pub fn with_min_call_interval(mut self, interval: Duration) -> Self {
        self.min_call_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the cache file.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn with_refresh(mut self, refresh: RefreshConfig) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_call_interval(&self) -> Duration {
        Duration::from_millis(self.min_call_interval_ms)
    }

    /// Registry base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.registry_url.trim_end_matches('/')
    }

    /// Cache file to open: the configured path or the platform default.
    pub fn resolved_cache_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.cache_path {
            Some(path) => Ok(path.clone()),
            None => default_cache_path(),
        }
    }

    /// Reject configurations the client cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.registry_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.registry_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: self.registry_url.clone(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        self.refresh.validate()
    }
}

impl RefreshConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period_secs = period.as_secs();
        self
    }

    pub fn with_stale_after(mut self, window: Duration) -> Self {
        self.stale_after_secs = window.as_secs();
        self
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn call_delay(&self) -> Duration {
        Duration::from_millis(self.call_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh.batch_size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.period_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh.period_secs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// `<platform cache dir>/qrtrust/trust-cache.db`.
pub fn default_cache_path() -> Result<PathBuf, ConfigError> {
    dirs::cache_dir()
        .map(|dir| dir.join("qrtrust").join("trust-cache.db"))
        .ok_or_else(|| ConfigError::InvalidValue {
            field: "cache_path".into(),
            reason: "no platform cache directory; set QRTRUST_CACHE_PATH".into(),
        })
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
