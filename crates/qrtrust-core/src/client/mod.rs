//! Trust registry client with a cache in front.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use tracing::{debug, info};

use crate::cache::{CacheEntry, RegistryUpdate, TrustCache};
use crate::config::TrustConfig;
use crate::error::{CacheResult, ConfigError, StageError};
use crate::thumbprint;
use crate::types::CacheSource;

mod helpers;
mod http;

use http::{HttpBackend, IssuerOutcome, Pacer};

/// `User-Agent` sent with every registry request.
pub const REGISTRY_USER_AGENT: &str = concat!("qrtrust/", env!("CARGO_PKG_VERSION"));

/// Result of a lookup, with the cache entry it left behind.
#[derive(Debug, Clone)]
pub struct LookupOutcome {
    pub entry: CacheEntry,
    /// True when the answer came from the cache without a registry call.
    pub from_cache: bool,
    /// Registry failure of this attempt, if one was made and failed.
    pub failure: Option<StageError>,
}

impl LookupOutcome {
    pub fn found(&self) -> bool {
        self.entry.found
    }
}

/// Registry client. Cheap to clone; clones share the cache and pacing.
#[derive(Debug, Clone)]
pub struct TrustRegistryClient {
    http: HttpBackend,
    cache: TrustCache,
}

impl TrustRegistryClient {
    pub fn new(config: &TrustConfig, cache: TrustCache) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(REGISTRY_USER_AGENT));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers)
            .build()
            .map_err(|e| ConfigError::HttpClient {
                message: e.to_string(),
            })?;

        Ok(Self {
            http: HttpBackend {
                client,
                base_url: config.base_url().to_string(),
                pacer: Arc::new(Pacer::new(config.min_call_interval())),
            },
            cache,
        })
    }

    pub fn cache(&self) -> &TrustCache {
        &self.cache
    }

    pub fn base_url(&self) -> &str {
        &self.http.base_url
    }

    /// Whether the registry knows an issuer for `thumbprint`.
    ///
    /// Registry failures downgrade to `false`; only cache errors surface.
    pub async fn lookup(&self, thumbprint: &str, force_refresh: bool) -> CacheResult<bool> {
        self.lookup_entry(thumbprint, force_refresh, CacheSource::Verification)
            .await
            .map(|outcome| outcome.found())
    }

    /// Look `thumbprint` up, consulting the cache first unless forced.
    pub async fn lookup_entry(
        &self,
        thumbprint: &str,
        force_refresh: bool,
        source: CacheSource,
    ) -> CacheResult<LookupOutcome> {
        let key = thumbprint::normalize(thumbprint).value;

        if !force_refresh {
            let entry = self.cache.get(&key, source)?;
            if entry.is_answered() {
                debug!(thumbprint = %key, found = entry.found, "trust cache hit");
                return Ok(LookupOutcome {
                    entry,
                    from_cache: true,
                    failure: None,
                });
            }
            debug!(thumbprint = %key, "trust cache miss");
        }

        let (entry, failure) = match self.http.fetch_issuers(&key).await {
            IssuerOutcome::Answered { status, body } => {
                let entry = self.cache.upsert(
                    &key,
                    RegistryUpdate {
                        response: Some(&body),
                        status: Some(status),
                        error: None,
                        source,
                    },
                )?;
                (entry, None)
            }
            IssuerOutcome::Failed {
                status,
                body,
                error,
            } => {
                let message = error.to_string();
                let entry = self.cache.upsert(
                    &key,
                    RegistryUpdate {
                        response: body.as_ref(),
                        status,
                        error: Some(&message),
                        source,
                    },
                )?;
                (entry, Some(error))
            }
        };

        if failure.is_none() {
            info!(thumbprint = %key, found = entry.found, source = source.as_str(), "registry lookup complete");
        }

        Ok(LookupOutcome {
            entry,
            from_cache: false,
            failure,
        })
    }
}
