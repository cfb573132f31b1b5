//! Error types for the dossier pipeline
//!
//! This module provides structured error handling using thiserror for
//! error definitions and anyhow for error propagation in the CLI glue.
//!
//! The taxonomy separates fatal pre-run failures (configuration, template)
//! from failures the pipeline recovers from locally (a single source query,
//! an unparseable generation response).

use crate::types::Source;
use thiserror::Error;

/// Main error type for dossier operations
#[derive(Error, Debug)]
pub enum DossierError {
    /// Invalid or missing configuration (fatal, detected before any network call)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// One scope/period search failed; recovered locally as an empty result
    #[error("Source query failed ({source} {period}{}): {message}", .scope.as_deref().map(|s| format!(" scope {}", s)).unwrap_or_default())]
    SourceQuery {
        source: Source,
        period: String,
        /// Space scope for content queries; `None` when the whole query failed
        scope: Option<String>,
        message: String,
    },

    /// No usable question template could be resolved (fatal)
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// The generation call never succeeded within the retry budget (fatal)
    #[error("Generation error: {0}")]
    Generation(String),

    /// Generated response could not be split per question (recovered, degraded)
    #[error("Response parse error: {0}")]
    ResponseParse(String),

    /// The run was cancelled by the user
    #[error("Run cancelled")]
    Cancelled,

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for dossier operations
pub type Result<T> = std::result::Result<T, DossierError>;

/// Convert anyhow::Error to DossierError
impl From<anyhow::Error> for DossierError {
    fn from(err: anyhow::Error) -> Self {
        DossierError::Other(err.to_string())
    }
}

impl DossierError {
    /// Whether the pipeline recovers from this error without aborting the run
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DossierError::SourceQuery { .. } | DossierError::ResponseParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DossierError::TemplateNotFound("no local path or secret".to_string());
        assert_eq!(err.to_string(), "Template not found: no local path or secret");
    }

    #[test]
    fn test_source_query_display_names_source_and_period() {
        let err = DossierError::SourceQuery {
            source: Source::Ticket,
            period: "2024-Q2".to_string(),
            scope: None,
            message: "HTTP 429".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("ticket"));
        assert!(rendered.contains("2024-Q2"));
        assert!(!rendered.contains("scope"));
    }

    #[test]
    fn test_source_query_display_includes_scope_when_present() {
        let err = DossierError::SourceQuery {
            source: Source::ContentPage,
            period: "2024-Q2".to_string(),
            scope: Some("RD".to_string()),
            message: "HTTP 500".to_string(),
        };
        assert!(err.to_string().contains("scope RD"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(DossierError::ResponseParse("misaligned".into()).is_recoverable());
        assert!(!DossierError::Generation("exhausted retries".into()).is_recoverable());
        assert!(!DossierError::Configuration("bad year".into()).is_recoverable());
    }
}
