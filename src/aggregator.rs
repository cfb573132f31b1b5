//! Evidence aggregation across periods and sources
//!
//! For each period (oldest first) the two source adapters are queried
//! concurrently; their results merge into the run-wide deduplication set
//! only after both complete, tickets before content, so artifact content
//! and ordering are deterministic. Surviving records per (period, source)
//! form a bundle handed to the persistence sink as soon as it is complete,
//! so evidence is durable even if a later phase fails.
//!
//! Aggregation is best-effort and additive: a failed query is logged once,
//! recorded for the run summary, and contributes zero records. The gather
//! always completes with whatever was collected.

use crate::error::Result;
use crate::period::Period;
use crate::sources::{EvidenceSource, SearchOutcome};
use crate::types::{EvidenceBundle, EvidenceRecord, QueryFailure, Source};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Persistence boundary for finished bundles
#[async_trait]
pub trait BundleSink: Send + Sync {
    async fn persist(&self, bundle: &EvidenceBundle) -> Result<()>;
}

/// Everything a gather run produced
#[derive(Debug, Default)]
pub struct GatherOutcome {
    /// All deduplicated records across periods and sources, in gathering order
    pub records: Vec<EvidenceRecord>,

    /// Query failures: one per fully failed (period, source) combination,
    /// plus one per failed content scope within an otherwise usable query
    pub failures: Vec<QueryFailure>,

    /// Bundles handed to the sink (empty bundles are skipped)
    pub bundles_written: usize,

    /// Records dropped because their (source, identifier) was already seen
    pub duplicates_dropped: usize,
}

pub struct Aggregator<'a> {
    ticket: &'a dyn EvidenceSource,
    content: &'a dyn EvidenceSource,
    sink: &'a dyn BundleSink,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        ticket: &'a dyn EvidenceSource,
        content: &'a dyn EvidenceSource,
        sink: &'a dyn BundleSink,
    ) -> Self {
        Self {
            ticket,
            content,
            sink,
        }
    }

    /// Gather evidence for `author` across all `periods`.
    pub async fn gather(&self, author: &str, periods: &[Period]) -> GatherOutcome {
        let mut outcome = GatherOutcome::default();
        let mut seen: HashSet<(Source, String)> = HashSet::new();

        for period in periods {
            info!(period = %period.label, "Gathering evidence");

            // The adapters hit different services and share no state; only
            // the dedup merge below is single-writer.
            let (ticket_result, content_result) = tokio::join!(
                self.ticket.search(author, period),
                self.content.search(author, period),
            );

            // Tickets merge before content within a period.
            for (source, result) in [
                (self.ticket.source(), ticket_result),
                (self.content.source(), content_result),
            ] {
                match result {
                    Ok(SearchOutcome {
                        records,
                        scope_failures,
                    }) => {
                        // Scope failures were already warned inside the
                        // adapter; the ledger keeps them for the summary.
                        outcome.failures.extend(scope_failures);
                        let bundle =
                            self.merge(records, period, source, &mut seen, &mut outcome);
                        if !bundle.is_empty() {
                            self.persist(&bundle, &mut outcome).await;
                        } else {
                            debug!(period = %period.label, %source, "No evidence found");
                        }
                    }
                    Err(e) => {
                        warn!(period = %period.label, %source, error = %e, "Source query failed");
                        outcome.failures.push(QueryFailure {
                            source,
                            period_label: period.label.clone(),
                            scope: None,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            records = outcome.records.len(),
            bundles = outcome.bundles_written,
            duplicates = outcome.duplicates_dropped,
            failures = outcome.failures.len(),
            "Evidence gathering complete"
        );
        outcome
    }

    /// Merge one adapter's results into the run state, dropping records whose
    /// (source, identifier) was already seen. First-seen period wins.
    fn merge(
        &self,
        records: Vec<EvidenceRecord>,
        period: &Period,
        source: Source,
        seen: &mut HashSet<(Source, String)>,
        outcome: &mut GatherOutcome,
    ) -> EvidenceBundle {
        let mut bundle = EvidenceBundle::new(period.label.clone(), source);

        for record in records {
            if seen.insert(record.dedup_key()) {
                bundle.records.push(record.clone());
                outcome.records.push(record);
            } else {
                debug!(identifier = %record.identifier, %source, "Duplicate record dropped");
                outcome.duplicates_dropped += 1;
            }
        }

        bundle
    }

    async fn persist(&self, bundle: &EvidenceBundle, outcome: &mut GatherOutcome) {
        match self.sink.persist(bundle).await {
            Ok(()) => {
                outcome.bundles_written += 1;
                debug!(
                    artifact = %bundle.artifact_name(),
                    records = bundle.records.len(),
                    "Evidence bundle persisted"
                );
            }
            // Keep the records in memory even when the artifact write fails;
            // the generation phase can still use them.
            Err(e) => {
                error!(artifact = %bundle.artifact_name(), error = %e, "Failed to persist bundle");
            }
        }
    }
}
