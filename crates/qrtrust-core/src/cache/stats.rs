//! Cache statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summary returned by the statistics query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total: u64,
    pub found: u64,
    pub missing: u64,
    pub needs_refresh: u64,
    /// `found / total` as a rounded percentage, 0 for an empty cache.
    pub hit_rate: u32,
    /// Most recent registry check across all entries.
    pub last_refresh: Option<DateTime<Utc>>,
}

impl CacheStats {
    pub(crate) fn new(
        total: u64,
        found: u64,
        needs_refresh: u64,
        last_refresh: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            total,
            found,
            missing: total.saturating_sub(found),
            needs_refresh,
            hit_rate: hit_rate(found, total),
            last_refresh,
        }
    }
}

fn hit_rate(found: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((found as f64 / total as f64) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_rounding() {
        assert_eq!(hit_rate(0, 0), 0);
        assert_eq!(hit_rate(1, 3), 33);
        assert_eq!(hit_rate(2, 3), 67);
        assert_eq!(hit_rate(1, 8), 13);
        assert_eq!(hit_rate(5, 5), 100);
    }

    #[test]
    fn test_missing_derived() {
        let stats = CacheStats::new(10, 4, 2, None);
        assert_eq!(stats.missing, 6);
        assert_eq!(stats.hit_rate, 40);
    }
}
