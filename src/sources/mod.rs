//! Source adapters for external evidence providers
//!
//! Each adapter turns provider search hits into [`EvidenceRecord`]s for a
//! given period. The trait is the explicit seam between the aggregator and
//! the two known providers; adding a third source means adding a third
//! implementation, not branching on type.

pub mod confluence;
pub mod jira;

use crate::error::Result;
use crate::period::Period;
use crate::types::{EvidenceRecord, QueryFailure, Source};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

/// Provider-side page size for search requests
pub(crate) const PAGE_SIZE: usize = 100;

/// Safety cap on results per (period, source) query; prevents unbounded
/// pagination on noisy accounts.
pub(crate) const MAX_RESULTS: usize = 500;

/// Timeout applied to every provider HTTP call
pub(crate) const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// One adapter query's records plus any scope-level failures it absorbed
/// while still producing results (e.g. one inaccessible content space out of
/// several).
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub records: Vec<EvidenceRecord>,
    pub scope_failures: Vec<QueryFailure>,
}

impl SearchOutcome {
    pub fn from_records(records: Vec<EvidenceRecord>) -> Self {
        Self {
            records,
            scope_failures: Vec::new(),
        }
    }
}

/// A search adapter over one external evidence provider
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    /// Which source this adapter represents
    fn source(&self) -> Source;

    /// Search for work authored by `author` within `period` and normalize
    /// the hits into evidence records.
    ///
    /// A fully failed query surfaces as [`DossierError::SourceQuery`]
    /// (crate::error::DossierError::SourceQuery); the caller treats it as
    /// zero results and keeps going. Partial failures ride along in
    /// [`SearchOutcome::scope_failures`] next to whatever was found.
    async fn search(&self, author: &str, period: &Period) -> Result<SearchOutcome>;
}

/// Parse a provider timestamp, falling back to the period start when the
/// provider hands back something unparseable. Evidence records must always
/// carry a timestamp for chronological ordering.
pub(crate) fn parse_timestamp(raw: &str, fallback_date: NaiveDate) -> DateTime<Utc> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.with_timezone(&Utc);
    }
    // Atlassian's "+0000" offset style is not strict RFC 3339.
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return ts.with_timezone(&Utc);
    }
    if let Some(prefix) = raw.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc();
        }
    }

    warn!(raw, "Unparseable provider timestamp, using period start");
    fallback_date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is valid")
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_parse_rfc3339() {
        let ts = parse_timestamp("2024-02-10T09:30:00+00:00", fallback());
        assert_eq!(ts.to_rfc3339(), "2024-02-10T09:30:00+00:00");
    }

    #[test]
    fn test_parse_atlassian_offset_style() {
        let ts = parse_timestamp("2024-02-10T09:30:00.000+0000", fallback());
        assert_eq!(ts.date_naive(), NaiveDate::from_ymd_opt(2024, 2, 10).unwrap());
    }

    #[test]
    fn test_parse_date_only() {
        let ts = parse_timestamp("2024-03-05", fallback());
        assert_eq!(ts.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }

    #[test]
    fn test_garbage_falls_back_to_period_start() {
        let ts = parse_timestamp("not a date", fallback());
        assert_eq!(ts.date_naive(), fallback());
    }
}
