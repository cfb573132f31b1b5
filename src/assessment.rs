//! Grounded assessment generation
//!
//! Builds one generation request from the question template and the full
//! deduplicated evidence collection, invokes the generation call with a
//! bounded retry budget, and parses the response into one answer per
//! question. Answers are post-validated: any cited URL that does not appear
//! in the supplied evidence is flagged for human review.

use crate::error::{DossierError, Result};
use crate::services::Generator;
use crate::types::{Answer, AssessmentResponse, AssessmentTemplate, EvidenceRecord};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bounded retry schedule for the single generation call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

pub struct AssessmentGenerator<'a> {
    generator: &'a dyn Generator,
    retry: RetryPolicy,
}

impl<'a> AssessmentGenerator<'a> {
    pub fn new(generator: &'a dyn Generator) -> Self {
        Self {
            generator,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(generator: &'a dyn Generator, retry: RetryPolicy) -> Self {
        Self { generator, retry }
    }

    /// Generate one grounded answer per template question.
    ///
    /// Fatal only when the generation call itself never succeeds; a response
    /// that cannot be decomposed per question degrades to
    /// [`AssessmentResponse::NeedsReview`] instead.
    pub async fn generate(
        &self,
        template: &AssessmentTemplate,
        evidence: &[EvidenceRecord],
    ) -> Result<AssessmentResponse> {
        let prompt = build_prompt(template, evidence);
        debug!(
            questions = template.len(),
            evidence = evidence.len(),
            prompt_chars = prompt.len(),
            "Built generation request"
        );

        let raw = self.call_with_retry(&prompt).await?;

        match parse_answers(&raw, template.questions()) {
            Ok(mut answers) => {
                let known: HashSet<&str> = evidence.iter().map(|r| r.url.as_str()).collect();
                for answer in &mut answers {
                    answer.unknown_citations = cited_urls(&answer.text)
                        .into_iter()
                        .filter(|url| !known.contains(url.as_str()))
                        .collect();
                    if !answer.unknown_citations.is_empty() {
                        warn!(
                            question = %answer.question.lines().next().unwrap_or(""),
                            unknown = answer.unknown_citations.len(),
                            "Answer cites URLs outside the supplied evidence"
                        );
                    }
                }
                info!(answers = answers.len(), "Assessment generated");
                Ok(AssessmentResponse::Answered(answers))
            }
            Err(e) => {
                warn!(error = %e, "Could not decompose response per question, needs manual review");
                Ok(AssessmentResponse::NeedsReview {
                    raw,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn call_with_retry(&self, prompt: &str) -> Result<String> {
        let mut delay = self.retry.base_delay;
        let mut last_error = String::new();

        for attempt in 1..=self.retry.attempts {
            match self.generator.generate(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(attempt, max = self.retry.attempts, error = %e, "Generation attempt failed");
                    last_error = e.to_string();
                    if attempt < self.retry.attempts {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        Err(DossierError::Generation(format!(
            "generation failed after {} attempts: {}",
            self.retry.attempts, last_error
        )))
    }
}

/// Serialize questions and evidence into one grounded-generation prompt.
///
/// Every record carries its URL, title, timestamp and summary; omitting any
/// would break the citation contract.
fn build_prompt(template: &AssessmentTemplate, evidence: &[EvidenceRecord]) -> String {
    let mut prompt = String::from(
        "You are drafting a professional self-assessment. Answer strictly from the \
         evidence records below. Do not use outside knowledge and do not fabricate \
         claims unsupported by a record. Cite the URL of every record you rely on \
         inline in the answer text. If the evidence does not support an answer, say \
         so explicitly.\n\nEVIDENCE RECORDS:\n",
    );

    if evidence.is_empty() {
        prompt.push_str("(no evidence was gathered)\n");
    }
    for (i, record) in evidence.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] {}\n    URL: {}\n    Date: {}\n    Period: {}\n    Summary: {}\n",
            i + 1,
            record.title,
            record.url,
            record.timestamp.format("%Y-%m-%d"),
            record.period_label,
            record.summary
        ));
    }

    prompt.push_str("\nQUESTIONS:\n");
    for (i, question) in template.questions().iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, question));
    }

    prompt.push_str(&format!(
        "\nRespond with exactly one answer per question, in order, formatted EXACTLY as:\n\
         ANSWER 1: <answer text>\n\
         ANSWER 2: <answer text>\n\
         ...\n\
         ANSWER {}: <answer text>\n",
        template.len()
    ));

    prompt
}

/// Split the raw response on `ANSWER <n>:` markers into per-question answers.
///
/// Strict: the response must contain exactly one marker per question, in
/// order. Anything else is a parse error the caller degrades from.
fn parse_answers(raw: &str, questions: &[String]) -> Result<Vec<Answer>> {
    let mut answers: Vec<(u32, String)> = Vec::new();

    for line in raw.lines() {
        if let Some((number, rest)) = answer_marker(line) {
            answers.push((number, rest.to_string()));
        } else if let Some((_, text)) = answers.last_mut() {
            text.push('\n');
            text.push_str(line);
        }
        // Preamble before the first marker is discarded.
    }

    if answers.len() != questions.len() {
        return Err(DossierError::ResponseParse(format!(
            "expected {} answers, found {}",
            questions.len(),
            answers.len()
        )));
    }
    for (i, (number, _)) in answers.iter().enumerate() {
        if *number as usize != i + 1 {
            return Err(DossierError::ResponseParse(format!(
                "answer markers out of order: found ANSWER {} at position {}",
                number,
                i + 1
            )));
        }
    }

    Ok(answers
        .into_iter()
        .zip(questions.iter())
        .map(|((_, text), question)| Answer {
            question: question.clone(),
            text: text.trim().to_string(),
            unknown_citations: Vec::new(),
        })
        .collect())
}

/// Recognize an `ANSWER <n>:` line and return the number and remainder
fn answer_marker(line: &str) -> Option<(u32, &str)> {
    let rest = line.trim_start().strip_prefix("ANSWER ")?;
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let number: u32 = rest[..digits].parse().ok()?;
    let after = rest[digits..].strip_prefix(':')?;
    Some((number, after.trim_start()))
}

/// Extract http(s) URLs cited in answer text
fn cited_urls(text: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for token in text.split(|c: char| c.is_whitespace() || c == '(' || c == '<') {
        if token.starts_with("http://") || token.starts_with("https://") {
            let trimmed = token.trim_end_matches(['.', ',', ';', ':', ')', ']', '>', '"', '\'']);
            if !trimmed.is_empty() && !urls.contains(&trimmed.to_string()) {
                urls.push(trimmed.to_string());
            }
        }
    }
    urls
}
