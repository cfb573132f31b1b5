//! Core data types for the dossier pipeline
//!
//! This module defines the fundamental data structures used throughout
//! dossier: evidence records gathered from external sources, the bundles
//! they are persisted in, the question template, and the generated
//! assessment response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External source a piece of evidence was gathered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Issue-tracking ticket (Jira)
    Ticket,

    /// Wiki page or blog post (Confluence)
    ContentPage,
}

impl Source {
    /// Stable lowercase name used in artifact filenames and log fields
    pub fn name(&self) -> &'static str {
        match self {
            Source::Ticket => "ticket",
            Source::ContentPage => "content",
        }
    }

    /// Human-readable source name for artifact headers
    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Ticket => "Ticket tracker",
            Source::ContentPage => "Content pages",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// thiserror treats the spec-mandated `source` field of
// `DossierError::SourceQuery` as the error source, which requires this impl.
impl std::error::Error for Source {}

/// One citable unit of work or content gathered from an external source
///
/// Records are immutable after creation: an adapter builds one from a raw
/// search hit and the aggregator owns it until it is serialized. The pair
/// `(source, identifier)` is unique within a run; duplicates from
/// overlapping period or scope queries collapse to the first-seen record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    /// Which external source produced this record
    pub source: Source,

    /// Source-native stable identifier (ticket key, page id)
    pub identifier: String,

    /// Short human label
    pub title: String,

    /// Canonical deep link back to the source, used for citation
    pub url: String,

    /// Creation or last-relevant-activity time
    pub timestamp: DateTime<Utc>,

    /// Extracted description of the work (status, type, body excerpt)
    pub summary: String,

    /// Sub-period this record was gathered under (e.g. "2024-Q1")
    pub period_label: String,
}

impl EvidenceRecord {
    /// Deduplication key: unique per run
    pub fn dedup_key(&self) -> (Source, String) {
        (self.source, self.identifier.clone())
    }
}

/// Ordered evidence records for one (period, source) pair
///
/// The unit of persistence: one bundle becomes one evidence artifact file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub period_label: String,
    pub source: Source,
    pub records: Vec<EvidenceRecord>,
}

impl EvidenceBundle {
    pub fn new(period_label: impl Into<String>, source: Source) -> Self {
        Self {
            period_label: period_label.into(),
            source,
            records: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stable artifact filename for this bundle
    pub fn artifact_name(&self) -> String {
        format!("{}_{}.md", self.period_label, self.source.name())
    }
}

/// Ordered self-assessment questions, loaded once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentTemplate {
    questions: Vec<String>,
}

impl AssessmentTemplate {
    /// Build a template from parsed questions; empty question lists are rejected
    /// at the loader boundary, not here.
    pub fn new(questions: Vec<String>) -> Self {
        Self { questions }
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// One generated answer, paired with its question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub text: String,

    /// URLs cited in the answer that do not appear in the supplied evidence.
    /// Non-empty means the answer needs a human look.
    pub unknown_citations: Vec<String>,
}

/// Final output of the generation step
///
/// `Answered` holds one answer per template question, in template order.
/// `NeedsReview` is the degraded form used when the raw response could not
/// be decomposed into the expected number of answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssessmentResponse {
    Answered(Vec<Answer>),
    NeedsReview { raw: String, reason: String },
}

impl AssessmentResponse {
    pub fn is_degraded(&self) -> bool {
        matches!(self, AssessmentResponse::NeedsReview { .. })
    }
}

/// Record of one failed (period, source, scope) query, kept for the run
/// summary
///
/// Distinguishes "the query failed" from "the query found nothing". `scope`
/// names the failed space for content queries that partially succeeded;
/// `None` means the whole (period, source) query failed.
#[derive(Debug, Clone)]
pub struct QueryFailure {
    pub source: Source,
    pub period_label: String,
    pub scope: Option<String>,
    pub message: String,
}
