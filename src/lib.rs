//! Dossier - Evidence-Grounded Self-Assessment Generator
//!
//! A batch pipeline that aggregates a person's work activity from two
//! tracking services and drafts self-assessment answers grounded in that
//! evidence:
//! - Quarter-by-quarter evidence gathering from Jira and Confluence
//! - Deduplicated, citable evidence records persisted as markdown artifacts
//! - Grounded generation: answers cite only the gathered evidence
//! - Evidence-first durability: artifacts survive a failed generation phase
//!
//! # Architecture
//!
//! The pipeline is organized leaf-first:
//! - **Types**: evidence records, bundles, templates, responses
//! - **Sources**: the two search adapters behind one trait
//! - **Aggregator**: period-by-period gathering with run-wide deduplication
//! - **Assessment**: prompt construction, bounded retry, citation validation
//! - **Orchestrator**: sequencing, durability, cancellation
//!
//! # Example
//!
//! ```ignore
//! use dossier::{config::{Overrides, RunConfig}, orchestrator, secrets::SecretsStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let secrets = SecretsStore::new()?;
//!     let config = RunConfig::resolve(&secrets, Overrides::default())?;
//!     let summary = orchestrator::run(&config, &secrets).await?;
//!     println!("gathered {} evidence records", summary.records);
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod artifacts;
pub mod assessment;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod period;
pub mod secrets;
pub mod services;
pub mod sources;
pub mod template;
pub mod types;

// Re-export commonly used types
pub use aggregator::{Aggregator, BundleSink, GatherOutcome};
pub use artifacts::ArtifactStore;
pub use assessment::AssessmentGenerator;
pub use config::{Overrides, RunConfig};
pub use error::{DossierError, Result};
pub use orchestrator::{AssessmentOutcome, RunSummary};
pub use period::{partition_year, Granularity, Period};
pub use secrets::SecretsStore;
pub use services::{Generator, LlmClient};
pub use sources::{EvidenceSource, SearchOutcome};
pub use template::{TemplateLoader, TemplateSource};
pub use types::{
    Answer, AssessmentResponse, AssessmentTemplate, EvidenceBundle, EvidenceRecord, QueryFailure,
    Source,
};
