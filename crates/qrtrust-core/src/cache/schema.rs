//! SQLite schema for the trust cache.
//!
//! Tables:
//! - `trust_cache`: one row per normalized thumbprint

/// DDL for the trust cache.
///
/// Timestamps are RFC 3339 UTC with millisecond precision so they order
/// lexicographically.
pub const TRUST_CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS trust_cache (
    thumbprint        TEXT PRIMARY KEY,
    found             INTEGER NOT NULL DEFAULT 0,
    registry_response TEXT,
    resolved_key      TEXT,
    issuer_info       TEXT,
    last_checked      TEXT,
    hit_count         INTEGER NOT NULL DEFAULT 1,
    needs_refresh     INTEGER NOT NULL DEFAULT 1,
    source            TEXT NOT NULL,
    last_status       INTEGER,
    last_error        TEXT,
    created_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_trust_cache_refresh
    ON trust_cache(needs_refresh, last_checked);
"#;

/// Column list shared by every query that maps rows to entries.
pub(crate) const ENTRY_COLUMNS: &str = "thumbprint, found, registry_response, resolved_key, \
     issuer_info, last_checked, hit_count, needs_refresh, source, last_status, last_error, \
     created_at";
