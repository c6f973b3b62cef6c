//! Error types for the verification core.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage that produced a failure.
///
/// Every error surfaced by the core carries exactly one of these tags so
/// callers can attribute a failure without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Base45Decode,
    Inflate,
    TokenParse,
    UnsupportedAlgorithm,
    UnsupportedKeyType,
    NoKeyMaterial,
    InvalidRegistryResponse,
    RegistryUnreachable,
    RegistryTimeout,
    SignatureVerify,
}

impl Stage {
    /// Wire tag for the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base45Decode => "base45-decode",
            Self::Inflate => "inflate",
            Self::TokenParse => "token-parse",
            Self::UnsupportedAlgorithm => "unsupported-algorithm",
            Self::UnsupportedKeyType => "unsupported-key-type",
            Self::NoKeyMaterial => "no-key-material",
            Self::InvalidRegistryResponse => "invalid-registry-response",
            Self::RegistryUnreachable => "registry-unreachable",
            Self::RegistryTimeout => "registry-timeout",
            Self::SignatureVerify => "signature-verify",
        }
    }

    /// Whether the stage is a registry transport failure.
    pub fn is_registry_failure(&self) -> bool {
        matches!(self, Self::RegistryUnreachable | Self::RegistryTimeout)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure tagged with the stage it originated in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{stage}: {message}")]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }
}

impl From<reqwest::Error> for StageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(Stage::RegistryTimeout, err.to_string())
        } else {
            Self::new(Stage::RegistryUnreachable, err.to_string())
        }
    }
}

/// Result type for stage-tagged operations.
pub type StageResult<T> = Result<T, StageError>;

/// Trust cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// SQLite failure.
    #[error("database error: {0}")]
    Database(String),

    /// Stored value could not be (de)serialized.
    #[error("corrupt cache value in column {column}: {message}")]
    Corrupt { column: String, message: String },

    /// Connection lock poisoned by a panicking holder.
    #[error("cache connection lock poisoned")]
    Poisoned,

    /// Cache location could not be prepared.
    #[error("cache location error: {message}")]
    Location { message: String },
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Database(e.to_string())
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid registry url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to build HTTP client: {message}")]
    HttpClient { message: String },
}
