//! Cache entry model and row mapping.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use serde::Serialize;

use crate::error::{CacheError, CacheResult};
use crate::types::{CacheSource, IssuerInfo};

/// Last-known registry state for one thumbprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub thumbprint: String,
    pub found: bool,
    pub registry_response: Option<serde_json::Value>,
    /// SPKI PEM of the resolved issuer key.
    pub resolved_key: Option<String>,
    pub issuer_info: Option<IssuerInfo>,
    pub last_checked: Option<DateTime<Utc>>,
    pub hit_count: u64,
    pub needs_refresh: bool,
    pub source: CacheSource,
    pub last_status: Option<u16>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether the entry holds a usable registry answer.
    ///
    /// Placeholders that were never checked, and entries whose last check
    /// failed, are not answers and send the caller to the registry.
    pub fn is_answered(&self) -> bool {
        self.last_checked.is_some() && self.last_error.is_none()
    }
}

/// Row as stored, before JSON and timestamp columns are decoded.
pub(crate) struct RawEntry {
    thumbprint: String,
    found: bool,
    registry_response: Option<String>,
    resolved_key: Option<String>,
    issuer_info: Option<String>,
    last_checked: Option<String>,
    hit_count: i64,
    needs_refresh: bool,
    source: String,
    last_status: Option<i64>,
    last_error: Option<String>,
    created_at: String,
}

impl RawEntry {
    /// Map a row selected with `ENTRY_COLUMNS`.
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            thumbprint: row.get(0)?,
            found: row.get::<_, i64>(1)? != 0,
            registry_response: row.get(2)?,
            resolved_key: row.get(3)?,
            issuer_info: row.get(4)?,
            last_checked: row.get(5)?,
            hit_count: row.get(6)?,
            needs_refresh: row.get::<_, i64>(7)? != 0,
            source: row.get(8)?,
            last_status: row.get(9)?,
            last_error: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    pub(crate) fn into_entry(self) -> CacheResult<CacheEntry> {
        let registry_response = self
            .registry_response
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| corrupt("registry_response", e))?;
        let issuer_info = self
            .issuer_info
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| corrupt("issuer_info", e))?;
        let last_checked = self
            .last_checked
            .as_deref()
            .map(|t| parse_timestamp("last_checked", t))
            .transpose()?;
        let source = CacheSource::parse(&self.source)
            .ok_or_else(|| corrupt("source", format!("unknown source {:?}", self.source)))?;
        let last_status = self
            .last_status
            .map(u16::try_from)
            .transpose()
            .map_err(|e| corrupt("last_status", e))?;

        Ok(CacheEntry {
            thumbprint: self.thumbprint,
            found: self.found,
            registry_response,
            resolved_key: self.resolved_key,
            issuer_info,
            last_checked,
            hit_count: self.hit_count.max(0) as u64,
            needs_refresh: self.needs_refresh,
            source,
            last_status,
            last_error: self.last_error,
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}

/// Stored timestamp format.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> CacheResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(column, e))
}

fn corrupt(column: &str, err: impl std::fmt::Display) -> CacheError {
    CacheError::Corrupt {
        column: column.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format_sorts() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 11, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(earlier), "2024-01-02T03:04:05.000Z");
        assert!(format_timestamp(earlier) < format_timestamp(later));
        assert_eq!(
            parse_timestamp("t", &format_timestamp(later)).unwrap(),
            later
        );
    }

    #[test]
    fn test_bad_timestamp_is_corrupt() {
        let err = parse_timestamp("last_checked", "yesterday").unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { ref column, .. } if column == "last_checked"));
    }
}
