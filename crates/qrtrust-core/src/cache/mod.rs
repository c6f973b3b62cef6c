//! TrustCache: SQLite-backed thumbprint → registry response cache.
//!
//! Guarantees:
//! - At most one entry per normalized thumbprint; every keyed call
//!   normalizes its argument, so either base64 spelling reaches the same row
//! - `hit_count` is bumped by every `get` and `upsert`, inside the same statement
//! - `needs_refresh` is cleared exactly when a registry answer is recorded

mod entry;
mod schema;
mod stats;

pub use entry::CacheEntry;
pub use schema::TRUST_CACHE_SCHEMA;
pub use stats::CacheStats;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{CacheError, CacheResult};
use crate::resolver;
use crate::thumbprint::normalize;
use crate::types::{CacheSource, IssuerInfo};
use entry::{format_timestamp, parse_timestamp, RawEntry};
use schema::ENTRY_COLUMNS;

/// Outcome of one registry query, as recorded by [`TrustCache::upsert`].
#[derive(Debug, Clone, Copy)]
pub struct RegistryUpdate<'a> {
    /// Parsed response body, if one was received.
    pub response: Option<&'a serde_json::Value>,
    /// HTTP status, `None` for transport failures.
    pub status: Option<u16>,
    pub error: Option<&'a str>,
    pub source: CacheSource,
}

/// SQLite-backed trust cache.
#[derive(Clone)]
pub struct TrustCache {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for TrustCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustCache").finish_non_exhaustive()
    }
}

impl TrustCache {
    /// Open a file-backed cache, creating parent directories.
    pub fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Location {
                message: format!("{}: {}", parent.display(), e),
            })?;
        }
        let conn = Connection::open(path)?;
        Self::init_connection(&conn)?;
        debug!(path = %path.display(), "opened trust cache");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory cache (for testing).
    pub fn memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> CacheResult<()> {
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL");
        conn.execute_batch(TRUST_CACHE_SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }

    /// Find or create the entry for `thumbprint`, counting the read.
    ///
    /// A new entry starts unchecked, not found and flagged for refresh.
    pub fn get(&self, thumbprint: &str, source: CacheSource) -> CacheResult<CacheEntry> {
        let thumbprint = normalize(thumbprint).value;
        let now = format_timestamp(Utc::now());
        let conn = self.lock()?;
        let raw = conn.query_row(
            &format!(
                "INSERT INTO trust_cache (thumbprint, found, hit_count, needs_refresh, source, created_at)
                 VALUES (?1, 0, 1, 1, ?2, ?3)
                 ON CONFLICT(thumbprint) DO UPDATE SET hit_count = hit_count + 1
                 RETURNING {ENTRY_COLUMNS}"
            ),
            params![thumbprint, source.as_str(), now],
            RawEntry::from_row,
        )?;
        drop(conn);

        let entry = raw.into_entry()?;
        debug!(
            thumbprint = %thumbprint,
            hits = entry.hit_count,
            answered = entry.is_answered(),
            "trust cache read"
        );
        Ok(entry)
    }

    /// Read an entry without counting a hit.
    pub fn peek(&self, thumbprint: &str) -> CacheResult<Option<CacheEntry>> {
        let thumbprint = normalize(thumbprint).value;
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM trust_cache WHERE thumbprint = ?1"),
                [&thumbprint],
                RawEntry::from_row,
            )
            .optional()?;
        drop(conn);
        raw.map(RawEntry::into_entry).transpose()
    }

    /// Record a registry answer (or failure) for `thumbprint`.
    ///
    /// `found` is true iff the response lists at least one issuer. When found,
    /// the issuer key and metadata are resolved once here so readers do not
    /// re-parse the response.
    pub fn upsert(&self, thumbprint: &str, update: RegistryUpdate<'_>) -> CacheResult<CacheEntry> {
        let thumbprint = normalize(thumbprint).value;
        let found = update.response.is_some_and(lists_issuers);
        let (resolved_key, issuer_info) = match update.response {
            Some(response) if found => derive_key_material(&thumbprint, response),
            _ => (None, None),
        };

        let response_json = update
            .response
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| CacheError::Corrupt {
                column: "registry_response".into(),
                message: e.to_string(),
            })?;
        let issuer_json = issuer_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| CacheError::Corrupt {
                column: "issuer_info".into(),
                message: e.to_string(),
            })?;
        let now = format_timestamp(Utc::now());

        let conn = self.lock()?;
        let raw = conn.query_row(
            &format!(
                "INSERT INTO trust_cache (
                    thumbprint, found, registry_response, resolved_key, issuer_info,
                    last_checked, hit_count, needs_refresh, source, last_status, last_error,
                    created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, 0, ?7, ?8, ?9, ?6)
                 ON CONFLICT(thumbprint) DO UPDATE SET
                    found = excluded.found,
                    registry_response = excluded.registry_response,
                    resolved_key = excluded.resolved_key,
                    issuer_info = excluded.issuer_info,
                    last_checked = excluded.last_checked,
                    hit_count = hit_count + 1,
                    needs_refresh = 0,
                    source = excluded.source,
                    last_status = excluded.last_status,
                    last_error = excluded.last_error
                 RETURNING {ENTRY_COLUMNS}"
            ),
            params![
                thumbprint,
                found as i64,
                response_json,
                resolved_key,
                issuer_json,
                now,
                update.source.as_str(),
                update.status.map(i64::from),
                update.error,
            ],
            RawEntry::from_row,
        )?;
        drop(conn);

        let entry = raw.into_entry()?;
        debug!(
            thumbprint = %thumbprint,
            found = entry.found,
            status = ?entry.last_status,
            source = update.source.as_str(),
            "trust cache updated"
        );
        Ok(entry)
    }

    /// Flag every entry for refresh. Returns the number of entries.
    pub fn mark_all_stale(&self) -> CacheResult<usize> {
        let conn = self.lock()?;
        let n = conn.execute("UPDATE trust_cache SET needs_refresh = 1", [])?;
        info!(entries = n, "marked trust cache stale");
        Ok(n)
    }

    /// Delete every entry. Returns the number removed.
    pub fn clear(&self) -> CacheResult<usize> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM trust_cache", [])?;
        info!(entries = n, "cleared trust cache");
        Ok(n)
    }

    /// Entries flagged for refresh, least recently checked first.
    pub fn list_stale(&self, limit: usize) -> CacheResult<Vec<CacheEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM trust_cache WHERE needs_refresh = 1
                 ORDER BY last_checked ASC, thumbprint ASC LIMIT ?1"
            ),
            limit,
        )
    }

    /// All entries, most recently checked first.
    pub fn list(&self, limit: usize) -> CacheResult<Vec<CacheEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM trust_cache
                 ORDER BY last_checked DESC, thumbprint ASC LIMIT ?1"
            ),
            limit,
        )
    }

    fn query_entries(&self, sql: &str, limit: usize) -> CacheResult<Vec<CacheEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([limit], RawEntry::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);
        rows.into_iter().map(RawEntry::into_entry).collect()
    }

    /// Number of entries flagged for refresh.
    pub fn count_stale(&self) -> CacheResult<u64> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM trust_cache WHERE needs_refresh = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    /// Number of entries never checked or last checked before `cutoff`.
    pub fn count_older_than(&self, cutoff: DateTime<Utc>) -> CacheResult<u64> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM trust_cache WHERE last_checked IS NULL OR last_checked < ?1",
            [format_timestamp(cutoff)],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    /// Aggregate counters for the statistics query.
    pub fn stats(&self) -> CacheResult<CacheStats> {
        let conn = self.lock()?;
        let (total, found, stale, last): (i64, Option<i64>, Option<i64>, Option<String>) = conn
            .query_row(
                "SELECT COUNT(*), SUM(found), SUM(needs_refresh), MAX(last_checked) FROM trust_cache",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        drop(conn);

        let last_refresh = last
            .as_deref()
            .map(|t| parse_timestamp("last_checked", t))
            .transpose()?;
        Ok(CacheStats::new(
            total as u64,
            found.unwrap_or(0) as u64,
            stale.unwrap_or(0) as u64,
            last_refresh,
        ))
    }
}

fn lists_issuers(response: &serde_json::Value) -> bool {
    resolver::issuer_list(response).is_ok_and(|items| !items.is_empty())
}

fn derive_key_material(
    thumbprint: &str,
    response: &serde_json::Value,
) -> (Option<String>, Option<IssuerInfo>) {
    let issuer = resolver::first_issuer(response)
        .ok()
        .map(|record| record.issuer_info());

    let key = match resolver::resolve_key(response).and_then(|k| k.to_pem()) {
        Ok(pem) => Some(pem),
        Err(e) => {
            warn!(thumbprint = %thumbprint, stage = %e.stage, error = %e.message, "could not resolve issuer key");
            None
        }
    };

    (key, issuer)
}
