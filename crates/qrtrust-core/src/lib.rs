//! Verification core for QR-encoded signed credentials.
//!
//! This crate provides:
//!
//! - Decode pipeline (BASE45 → zlib → `header.payload.signature`) with a per-stage trace
//! - Issuer key resolution from registry JWKs or X.509 certificates
//! - RS256 signature validation
//! - SQLite trust cache in front of the trust registry
//! - Rate-limited registry client and background refresher
//!
//! # Quick Start
//!
//! ```no_run
//! use qrtrust_core::{TrustCache, TrustConfig, TrustRegistryClient, Verifier};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = TrustConfig::from_env();
//! let cache = TrustCache::open(&config.resolved_cache_path()?)?;
//! let client = TrustRegistryClient::new(&config, cache)?;
//!
//! let result = Verifier::new(client).verify("HC1:6BF...").await;
//! if let Some(error) = &result.error {
//!     println!("failed at {}: {}", error.stage, error.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `QRTRUST_REGISTRY_URL` | Registry base URL (default: `https://trust-bridge.example.org/api`) |
//! | `QRTRUST_REGISTRY_TIMEOUT_MS` | Per-call timeout (default: 10000) |
//! | `QRTRUST_REGISTRY_MIN_INTERVAL_MS` | Minimum spacing between registry calls (default: 100) |
//! | `QRTRUST_CACHE_PATH` | SQLite cache file (default: platform cache dir) |
//! | `QRTRUST_STALE_AFTER_SECS` | Staleness window (default: 86400) |
//! | `QRTRUST_REFRESH_BATCH_SIZE` | Entries per refresh batch (default: 50) |
//! | `QRTRUST_REFRESH_CALL_DELAY_MS` | Delay between refresh calls (default: 100) |
//! | `QRTRUST_REFRESH_BATCH_DELAY_MS` | Delay between refresh batches (default: 5000) |
//! | `QRTRUST_REFRESH_PERIOD_SECS` | Re-flag-all period (default: 86400) |

pub mod cache;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod progress;
pub mod refresher;
pub mod resolver;
pub mod thumbprint;
pub mod types;
pub mod validate;
pub mod verify;

// Re-export main types
pub use cache::{CacheEntry, CacheStats, RegistryUpdate, TrustCache};
pub use client::{LookupOutcome, TrustRegistryClient, REGISTRY_USER_AGENT};
pub use config::{RefreshConfig, TrustConfig};
pub use decode::{decode, DecodeOutcome, DecodeTrace, ParsedToken, StageRecord, TokenHeader};
pub use error::{CacheError, CacheResult, ConfigError, Stage, StageError, StageResult};
pub use progress::{BroadcastSink, NoopSink, ProgressEvent, ProgressSink};
pub use refresher::{BatchReport, CycleReport, Refresher, RefresherHandle};
pub use resolver::{KeySource, ResolvedKey};
pub use thumbprint::{diagnose, normalize, Conversion, Normalized, ThumbprintDiagnostics};
pub use types::{CacheSource, IssuerInfo, IssuerRecord, Jwk};
pub use validate::{validate_signature, SignatureReport};
pub use verify::{VerificationResult, Verifier};
