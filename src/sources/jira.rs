//! Ticket adapter: Jira issue search over the REST API
//!
//! Queries issues assigned to the author within the period's date range
//! (all projects visible to the credential) and normalizes each issue into
//! an evidence record. Pagination runs until the result set is exhausted or
//! the safety cap is reached.

use crate::config::ServiceConfig;
use crate::error::{DossierError, Result};
use crate::period::Period;
use crate::sources::{
    parse_timestamp, EvidenceSource, SearchOutcome, MAX_RESULTS, PAGE_SIZE, REQUEST_TIMEOUT,
};
use crate::types::{EvidenceRecord, Source};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, info};

pub struct JiraAdapter {
    client: reqwest::Client,
    server: String,
    email: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<Issue>,
    /// Some deployments omit `total`; pagination then relies on the page
    /// coming back short.
    total: Option<usize>,
}

fn exhausted(fetched: usize, start_at: usize, total: Option<usize>) -> bool {
    fetched < PAGE_SIZE || total.is_some_and(|t| start_at >= t)
}

#[derive(Debug, Deserialize)]
struct Issue {
    key: String,
    fields: IssueFields,
}

#[derive(Debug, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    created: String,
    status: Option<NamedField>,
    issuetype: Option<NamedField>,
    resolution: Option<NamedField>,
}

#[derive(Debug, Deserialize)]
struct NamedField {
    name: String,
}

impl JiraAdapter {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            server: config.server.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            api_token: config.api_token.expose_secret().to_string(),
        })
    }

    async fn fetch_page(&self, jql: &str, start_at: usize) -> Result<SearchResponse> {
        let url = format!("{}/rest/api/2/search", self.server);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.email, Some(&self.api_token))
            .query(&[
                ("jql", jql),
                ("startAt", &start_at.to_string()),
                ("maxResults", &PAGE_SIZE.to_string()),
                ("fields", "summary,created,status,issuetype,resolution"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DossierError::Other(format!(
                "Jira search failed with status {}: {}",
                status, body
            )));
        }

        Ok(response.json::<SearchResponse>().await?)
    }

    fn normalize(&self, issue: Issue, period: &Period) -> EvidenceRecord {
        let issue_type = issue
            .fields
            .issuetype
            .as_ref()
            .map(|t| t.name.as_str())
            .unwrap_or("Issue");
        let status = issue
            .fields
            .status
            .as_ref()
            .map(|s| s.name.as_str())
            .unwrap_or("Unknown");

        let mut summary = format!("{} — status: {}", issue_type, status);
        if let Some(resolution) = &issue.fields.resolution {
            summary.push_str(&format!(", resolution: {}", resolution.name));
        }

        EvidenceRecord {
            source: Source::Ticket,
            url: format!("{}/browse/{}", self.server, issue.key),
            identifier: issue.key,
            title: issue.fields.summary,
            timestamp: parse_timestamp(&issue.fields.created, period.start),
            summary,
            period_label: period.label.clone(),
        }
    }
}

#[async_trait]
impl EvidenceSource for JiraAdapter {
    fn source(&self) -> Source {
        Source::Ticket
    }

    async fn search(&self, author: &str, period: &Period) -> Result<SearchOutcome> {
        // Same query the provider UI uses for "my work in this window".
        let jql = format!(
            "assignee = '{}' AND created >= '{}' AND created <= '{}' ORDER BY created DESC",
            author,
            period.start_str(),
            period.end_str()
        );
        debug!(period = %period.label, %jql, "Searching Jira");

        let mut records = Vec::new();
        let mut start_at = 0;

        loop {
            let page = self
                .fetch_page(&jql, start_at)
                .await
                .map_err(|e| DossierError::SourceQuery {
                    source: Source::Ticket,
                    period: period.label.clone(),
                    scope: None,
                    message: e.to_string(),
                })?;

            let fetched = page.issues.len();
            let total = page.total;
            records.extend(page.issues.into_iter().map(|i| self.normalize(i, period)));

            start_at += fetched;
            if exhausted(fetched, start_at, total) {
                break;
            }
            if records.len() >= MAX_RESULTS {
                info!(
                    period = %period.label,
                    cap = MAX_RESULTS,
                    "Ticket search hit the safety cap, truncating"
                );
                records.truncate(MAX_RESULTS);
                break;
            }
        }

        debug!(period = %period.label, count = records.len(), "Ticket search complete");
        Ok(SearchOutcome::from_records(records))
    }
}
