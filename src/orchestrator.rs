//! Run orchestration
//!
//! Sequences the pipeline: load the template (fatal before any network cost
//! is spent), gather evidence (bundles become durable as they finish),
//! generate the assessment, persist the final artifact. Evidence written
//! before a generation failure stays on disk.
//!
//! The whole run races against ctrl-c: cancellation drops in-flight network
//! calls promptly while already-persisted bundles remain durable.

use crate::aggregator::Aggregator;
use crate::artifacts::ArtifactStore;
use crate::assessment::AssessmentGenerator;
use crate::config::RunConfig;
use crate::error::{DossierError, Result};
use crate::period::{partition_year, Period};
use crate::secrets::SecretsStore;
use crate::services::LlmClient;
use crate::sources::{confluence::ConfluenceAdapter, jira::JiraAdapter};
use crate::template::TemplateLoader;
use crate::types::{AssessmentTemplate, QueryFailure};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// How the generation phase ended
#[derive(Debug)]
pub enum AssessmentOutcome {
    /// Answers generated and persisted
    Written(PathBuf),

    /// Response needed manual review; raw text persisted
    Degraded(PathBuf),

    /// Generation failed outright after the retry budget
    Failed(String),
}

/// What a run produced, for the final summary and the exit code
#[derive(Debug)]
pub struct RunSummary {
    pub records: usize,
    pub bundles_written: usize,
    pub duplicates_dropped: usize,
    pub failures: Vec<QueryFailure>,
    pub assessment: AssessmentOutcome,
}

impl RunSummary {
    /// Full success: evidence gathered without query failures and an
    /// assessment artifact written.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && matches!(self.assessment, AssessmentOutcome::Written(_))
    }
}

/// Run the full pipeline with real collaborators, racing against ctrl-c.
pub async fn run(config: &RunConfig, secrets: &SecretsStore) -> Result<RunSummary> {
    tokio::select! {
        result = run_pipeline(config, secrets) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupt received, aborting run; persisted evidence is kept");
            Err(DossierError::Cancelled)
        }
    }
}

async fn run_pipeline(config: &RunConfig, secrets: &SecretsStore) -> Result<RunSummary> {
    // Template first: a missing template must fail before any network cost.
    let template = TemplateLoader::new(&config.template_source, secrets).load()?;

    let periods = partition_year(
        config.target_year,
        config.granularity,
        Utc::now().date_naive(),
    )?;
    info!(
        year = config.target_year,
        periods = periods.len(),
        "Starting evidence gathering"
    );

    let artifacts = ArtifactStore::new(&config.output_dir).await?;
    let jira = JiraAdapter::new(&config.jira)?;
    let confluence = ConfluenceAdapter::new(
        &config.confluence,
        &config.default_space_key,
        &config.extra_space_keys,
    )?;
    let llm = LlmClient::new(&config.llm)?;

    let aggregator = Aggregator::new(&jira, &confluence, &artifacts);
    let generator = AssessmentGenerator::new(&llm);

    execute(
        &template,
        &aggregator,
        &config.jira.email,
        &periods,
        &generator,
        &artifacts,
    )
    .await
}

/// Core sequencing, independent of how the collaborators were constructed.
pub async fn execute(
    template: &AssessmentTemplate,
    aggregator: &Aggregator<'_>,
    author: &str,
    periods: &[Period],
    generator: &AssessmentGenerator<'_>,
    artifacts: &ArtifactStore,
) -> Result<RunSummary> {
    // Each query failure was already logged once by the aggregator; here it
    // only shapes the summary.
    let outcome = aggregator.gather(author, periods).await;

    // Evidence is already durable; generation failures cannot lose it.
    let assessment = match generator.generate(template, &outcome.records).await {
        Ok(response) => {
            let path = artifacts.write_assessment(&response, Utc::now()).await?;
            if response.is_degraded() {
                AssessmentOutcome::Degraded(path)
            } else {
                AssessmentOutcome::Written(path)
            }
        }
        Err(e) => {
            error!(error = %e, "Generation phase failed; gathered evidence remains on disk");
            if outcome.records.is_empty() {
                // Nothing gathered and nothing generated: the run produced
                // no artifact at all.
                return Err(e);
            }
            AssessmentOutcome::Failed(e.to_string())
        }
    };

    let summary = RunSummary {
        records: outcome.records.len(),
        bundles_written: outcome.bundles_written,
        duplicates_dropped: outcome.duplicates_dropped,
        failures: outcome.failures,
        assessment,
    };

    info!(
        records = summary.records,
        bundles = summary.bundles_written,
        duplicates = summary.duplicates_dropped,
        failures = summary.failures.len(),
        "Run complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::RetryPolicy;
    use crate::services::Generator;
    use crate::sources::{EvidenceSource, SearchOutcome};
    use crate::types::{EvidenceBundle, EvidenceRecord, Source};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use std::time::Duration;
    use tempfile::TempDir;

    struct StaticSource {
        source: Source,
        records: Vec<EvidenceRecord>,
        fail: bool,
    }

    #[async_trait]
    impl EvidenceSource for StaticSource {
        fn source(&self) -> Source {
            self.source
        }

        async fn search(&self, _author: &str, period: &Period) -> Result<SearchOutcome> {
            if self.fail {
                return Err(DossierError::SourceQuery {
                    source: self.source,
                    period: period.label.clone(),
                    scope: None,
                    message: "boom".to_string(),
                });
            }
            Ok(SearchOutcome::from_records(
                self.records
                    .iter()
                    .filter(|r| r.period_label == period.label)
                    .cloned()
                    .collect(),
            ))
        }
    }

    struct StaticGenerator {
        response: Option<String>,
    }

    #[async_trait]
    impl Generator for StaticGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.response
                .clone()
                .ok_or_else(|| DossierError::Generation("provider unreachable".to_string()))
        }
    }

    fn record(id: &str) -> EvidenceRecord {
        EvidenceRecord {
            source: Source::Ticket,
            identifier: id.to_string(),
            title: format!("Work item {}", id),
            url: format!("https://example.test/browse/{}", id),
            timestamp: Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap(),
            summary: "Story — status: Done".to_string(),
            period_label: "2024-Q1".to_string(),
        }
    }

    fn quarters() -> Vec<Period> {
        partition_year(
            2024,
            crate::period::Granularity::Quarter,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        )
        .unwrap()
    }

    fn no_delay() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(0),
        }
    }

    #[tokio::test]
    async fn test_full_run_writes_both_artifact_kinds() {
        let temp = TempDir::new().unwrap();
        let artifacts = ArtifactStore::new(temp.path()).await.unwrap();
        let ticket = StaticSource {
            source: Source::Ticket,
            records: vec![record("PROJ-1")],
            fail: false,
        };
        let content = StaticSource {
            source: Source::ContentPage,
            records: vec![],
            fail: false,
        };
        let llm = StaticGenerator {
            response: Some("ANSWER 1: Shipped, see https://example.test/browse/PROJ-1.".to_string()),
        };

        let aggregator = Aggregator::new(&ticket, &content, &artifacts);
        let generator = AssessmentGenerator::with_retry(&llm, no_delay());
        let template = AssessmentTemplate::new(vec!["What shipped?".to_string()]);

        let summary = execute(
            &template,
            &aggregator,
            "jane@example.com",
            &quarters(),
            &generator,
            &artifacts,
        )
        .await
        .unwrap();

        assert!(summary.is_clean());
        assert_eq!(summary.records, 1);
        assert!(temp.path().join("evidence/2024-Q1_ticket.md").exists());
        match summary.assessment {
            AssessmentOutcome::Written(path) => assert!(path.exists()),
            other => panic!("expected written assessment, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_evidence_artifacts() {
        let temp = TempDir::new().unwrap();
        let artifacts = ArtifactStore::new(temp.path()).await.unwrap();
        let ticket = StaticSource {
            source: Source::Ticket,
            records: vec![record("PROJ-1")],
            fail: false,
        };
        let content = StaticSource {
            source: Source::ContentPage,
            records: vec![],
            fail: false,
        };
        let llm = StaticGenerator { response: None };

        let aggregator = Aggregator::new(&ticket, &content, &artifacts);
        let generator = AssessmentGenerator::with_retry(&llm, no_delay());
        let template = AssessmentTemplate::new(vec!["What shipped?".to_string()]);

        let summary = execute(
            &template,
            &aggregator,
            "jane@example.com",
            &quarters(),
            &generator,
            &artifacts,
        )
        .await
        .unwrap();

        // Evidence-only partial success: not an error, evidence durable.
        assert!(matches!(summary.assessment, AssessmentOutcome::Failed(_)));
        assert!(temp.path().join("evidence/2024-Q1_ticket.md").exists());
    }

    #[tokio::test]
    async fn test_both_phases_failing_is_an_error() {
        let temp = TempDir::new().unwrap();
        let artifacts = ArtifactStore::new(temp.path()).await.unwrap();
        let ticket = StaticSource {
            source: Source::Ticket,
            records: vec![],
            fail: true,
        };
        let content = StaticSource {
            source: Source::ContentPage,
            records: vec![],
            fail: true,
        };
        let llm = StaticGenerator { response: None };

        let aggregator = Aggregator::new(&ticket, &content, &artifacts);
        let generator = AssessmentGenerator::with_retry(&llm, no_delay());
        let template = AssessmentTemplate::new(vec!["What shipped?".to_string()]);

        let result = execute(
            &template,
            &aggregator,
            "jane@example.com",
            &quarters(),
            &generator,
            &artifacts,
        )
        .await;

        assert!(matches!(result, Err(DossierError::Generation(_))));
    }

    #[tokio::test]
    async fn test_degraded_response_still_persisted() {
        let temp = TempDir::new().unwrap();
        let artifacts = ArtifactStore::new(temp.path()).await.unwrap();
        let ticket = StaticSource {
            source: Source::Ticket,
            records: vec![record("PROJ-1")],
            fail: false,
        };
        let content = StaticSource {
            source: Source::ContentPage,
            records: vec![],
            fail: false,
        };
        let llm = StaticGenerator {
            response: Some("a rambling answer with no markers".to_string()),
        };

        let aggregator = Aggregator::new(&ticket, &content, &artifacts);
        let generator = AssessmentGenerator::with_retry(&llm, no_delay());
        let template = AssessmentTemplate::new(vec!["One?".to_string(), "Two?".to_string()]);

        let summary = execute(
            &template,
            &aggregator,
            "jane@example.com",
            &quarters(),
            &generator,
            &artifacts,
        )
        .await
        .unwrap();

        match summary.assessment {
            AssessmentOutcome::Degraded(path) => {
                let content = std::fs::read_to_string(path).unwrap();
                assert!(content.contains("Needs manual review"));
            }
            other => panic!("expected degraded outcome, got {:?}", other),
        }
    }
}
