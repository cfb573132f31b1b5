//! Markdown artifact rendering and persistence
//!
//! Artifacts are the run's durable interface: one evidence file per
//! (period, source) bundle under `evidence/`, and one assessment file per
//! run under `assessment/`, its filename stamped with the generation time.

use crate::aggregator::BundleSink;
use crate::error::{DossierError, Result};
use crate::types::{AssessmentResponse, EvidenceBundle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

pub struct ArtifactStore {
    evidence_dir: PathBuf,
    assessment_dir: PathBuf,
}

impl ArtifactStore {
    /// Create the store and its directory layout under `base_path`.
    pub async fn new<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base = base_path.as_ref();
        let evidence_dir = base.join("evidence");
        let assessment_dir = base.join("assessment");

        for dir in [&evidence_dir, &assessment_dir] {
            fs::create_dir_all(dir).await.map_err(|e| {
                DossierError::Other(format!(
                    "Failed to create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(Self {
            evidence_dir,
            assessment_dir,
        })
    }

    /// Write one evidence bundle to its artifact file, returning the path.
    pub async fn write_evidence(&self, bundle: &EvidenceBundle) -> Result<PathBuf> {
        let path = self.evidence_dir.join(bundle.artifact_name());
        let content = render_evidence(bundle)?;

        fs::write(&path, content).await.map_err(|e| {
            DossierError::Other(format!("Failed to write artifact {}: {}", path.display(), e))
        })?;

        info!(artifact = %path.display(), records = bundle.records.len(), "Evidence artifact written");
        Ok(path)
    }

    /// Write the final assessment artifact, returning the path.
    pub async fn write_assessment(
        &self,
        response: &AssessmentResponse,
        generated_at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let filename = format!(
            "self_assessment_{}.md",
            generated_at.format("%Y%m%d_%H%M%S")
        );
        let path = self.assessment_dir.join(filename);
        let content = render_assessment(response, generated_at);

        fs::write(&path, content).await.map_err(|e| {
            DossierError::Other(format!("Failed to write artifact {}: {}", path.display(), e))
        })?;

        info!(artifact = %path.display(), "Assessment artifact written");
        Ok(path)
    }
}

#[async_trait]
impl BundleSink for ArtifactStore {
    async fn persist(&self, bundle: &EvidenceBundle) -> Result<()> {
        self.write_evidence(bundle).await.map(|_| ())
    }
}

/// Render one evidence bundle as markdown.
///
/// Refuses records with an empty URL or identifier: a record that cannot be
/// cited must never reach an artifact.
fn render_evidence(bundle: &EvidenceBundle) -> Result<String> {
    let mut out = format!(
        "# Evidence — {} — {}\n\n",
        bundle.period_label,
        bundle.source.display_name()
    );

    for record in &bundle.records {
        if record.url.is_empty() || record.identifier.is_empty() {
            return Err(DossierError::Other(format!(
                "record '{}' has no citable URL or identifier",
                record.title
            )));
        }
        let title = if record.title.is_empty() {
            record.identifier.as_str()
        } else {
            record.title.as_str()
        };
        out.push_str(&format!(
            "- [{}]({})\n  - {}\n  - {}\n",
            title,
            record.url,
            record.timestamp.format("%Y-%m-%d"),
            record.summary
        ));
    }

    Ok(out)
}

fn render_assessment(response: &AssessmentResponse, generated_at: DateTime<Utc>) -> String {
    let mut out = format!(
        "# Self Assessment\n\nGenerated: {}\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    match response {
        AssessmentResponse::Answered(answers) => {
            for answer in answers {
                out.push_str(&format!("## {}\n\n{}\n\n", answer.question, answer.text));
                if !answer.unknown_citations.is_empty() {
                    out.push_str(&format!(
                        "> Needs review: cites URLs not present in the gathered evidence: {}\n\n",
                        answer.unknown_citations.join(", ")
                    ));
                }
            }
        }
        AssessmentResponse::NeedsReview { raw, reason } => {
            out.push_str(&format!(
                "## Needs manual review\n\nThe generated response could not be split per \
                 question ({}). Raw output follows.\n\n---\n\n{}\n",
                reason, raw
            ));
        }
    }

    out
}
