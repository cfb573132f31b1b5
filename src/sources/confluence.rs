//! Content adapter: Confluence page/blog search over the REST API
//!
//! Searches the scope set for content created by the author in the period:
//! the author's personal space (key derived from their email localpart), one
//! always-included default space, and any configured extra spaces. Each
//! scope is queried independently so one inaccessible space never hides the
//! others; a missing personal space is simply an empty scope, while any
//! other failed scope is reported alongside the records it did not block.

use crate::config::ServiceConfig;
use crate::error::{DossierError, Result};
use crate::period::Period;
use crate::sources::{
    parse_timestamp, EvidenceSource, SearchOutcome, MAX_RESULTS, PAGE_SIZE, REQUEST_TIMEOUT,
};
use crate::types::{EvidenceRecord, QueryFailure, Source};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, warn};

pub struct ConfluenceAdapter {
    client: reqwest::Client,
    /// Base URL including the `/wiki` path for cloud instances
    base: String,
    /// Credential identity for basic auth; the searched author is passed per
    /// query and need not match it.
    email: String,
    api_token: String,
    default_space: String,
    extra_spaces: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default, rename = "type")]
    content_type: String,
    history: Option<History>,
    version: Option<Version>,
    space: Option<Space>,
    #[serde(rename = "_links")]
    links: Option<Links>,
    excerpt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct History {
    #[serde(default, rename = "createdDate")]
    created_date: String,
}

#[derive(Debug, Deserialize)]
struct Version {
    #[serde(default)]
    when: String,
}

#[derive(Debug, Deserialize)]
struct Space {
    #[serde(default)]
    key: String,
}

#[derive(Debug, Deserialize)]
struct Links {
    #[serde(default)]
    webui: String,
}

/// Outcome of querying one space scope
enum ScopeOutcome {
    Records(Vec<EvidenceRecord>),
    /// The space does not exist or is not visible to the credential
    Unavailable,
}

impl ConfluenceAdapter {
    pub fn new(config: &ServiceConfig, default_space: &str, extra_spaces: &[String]) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let base = normalize_server_url(&config.server);

        Ok(Self {
            client,
            base,
            email: config.email.clone(),
            api_token: config.api_token.expose_secret().to_string(),
            default_space: default_space.to_string(),
            extra_spaces: extra_spaces.to_vec(),
        })
    }

    /// Resolve the scope set for one author: their personal space first,
    /// then the default space, then configured extras, deduplicated.
    fn scopes_for(&self, author: &str) -> Vec<String> {
        let mut scopes = vec![personal_space_key(author)];
        for key in std::iter::once(&self.default_space).chain(self.extra_spaces.iter()) {
            if !scopes.contains(key) {
                scopes.push(key.clone());
            }
        }
        scopes
    }

    async fn fetch_page(&self, cql: &str, start: usize) -> Result<Option<SearchResponse>> {
        let url = format!("{}/rest/api/content/search", self.base);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.email, Some(&self.api_token))
            .query(&[
                ("cql", cql),
                ("start", &start.to_string()),
                ("limit", &PAGE_SIZE.to_string()),
                ("expand", "history,version,space"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // A space that does not exist or is not visible comes back as a
            // CQL error; the caller decides whether that is tolerable.
            if status == reqwest::StatusCode::BAD_REQUEST
                || status == reqwest::StatusCode::NOT_FOUND
            {
                return Ok(None);
            }
            let body = response.text().await.unwrap_or_default();
            return Err(DossierError::Other(format!(
                "Confluence search failed with status {}: {}",
                status, body
            )));
        }

        Ok(Some(response.json::<SearchResponse>().await?))
    }

    async fn search_space(
        &self,
        author: &str,
        space_key: &str,
        period: &Period,
    ) -> Result<ScopeOutcome> {
        let cql = build_cql(author, period, space_key);
        debug!(period = %period.label, space = space_key, %cql, "Searching Confluence");

        let mut records = Vec::new();
        let mut start = 0;

        loop {
            let page = match self.fetch_page(&cql, start).await? {
                Some(page) => page,
                None => return Ok(ScopeOutcome::Unavailable),
            };
            let fetched = page.results.len();
            records.extend(
                page.results
                    .into_iter()
                    .map(|c| self.normalize(c, space_key, period)),
            );

            start += fetched;
            if fetched < PAGE_SIZE || records.len() >= MAX_RESULTS {
                records.truncate(MAX_RESULTS);
                break;
            }
        }

        Ok(ScopeOutcome::Records(records))
    }

    fn normalize(&self, content: Content, space_key: &str, period: &Period) -> EvidenceRecord {
        let created = content
            .history
            .as_ref()
            .map(|h| h.created_date.as_str())
            .filter(|s| !s.is_empty())
            .or_else(|| content.version.as_ref().map(|v| v.when.as_str()))
            .unwrap_or("");

        let key = content
            .space
            .as_ref()
            .map(|s| s.key.as_str())
            .filter(|k| !k.is_empty())
            .unwrap_or(space_key);

        let kind = if content.content_type.is_empty() {
            "page"
        } else {
            content.content_type.as_str()
        };
        let mut summary = format!("{} in space {}", kind, key);
        if let Some(excerpt) = &content.excerpt {
            let excerpt: String = excerpt.chars().take(200).collect();
            if !excerpt.trim().is_empty() {
                summary.push_str(&format!(" — {}", excerpt.trim()));
            }
        }

        let url = match &content.links {
            Some(links) if !links.webui.is_empty() => format!("{}{}", self.base, links.webui),
            _ => format!("{}/pages/{}", self.base, content.id),
        };

        EvidenceRecord {
            source: Source::ContentPage,
            identifier: content.id,
            title: content.title,
            url,
            timestamp: parse_timestamp(created, period.start),
            summary,
            period_label: period.label.clone(),
        }
    }

    fn is_personal(&self, space_key: &str) -> bool {
        space_key.starts_with('~')
    }
}

#[async_trait]
impl EvidenceSource for ConfluenceAdapter {
    fn source(&self) -> Source {
        Source::ContentPage
    }

    async fn search(&self, author: &str, period: &Period) -> Result<SearchOutcome> {
        let scopes = self.scopes_for(author);
        let mut outcome = SearchOutcome::default();

        for space_key in &scopes {
            match self.search_space(author, space_key, period).await {
                Ok(ScopeOutcome::Records(found)) => {
                    debug!(
                        period = %period.label,
                        space = %space_key,
                        count = found.len(),
                        "Content scope searched"
                    );
                    outcome.records.extend(found);
                }
                // Not every account has a personal space provisioned.
                Ok(ScopeOutcome::Unavailable) if self.is_personal(space_key) => {
                    debug!(space = %space_key, "Personal space not provisioned, skipping");
                }
                Ok(ScopeOutcome::Unavailable) => {
                    warn!(
                        period = %period.label,
                        space = %space_key,
                        "Space not accessible, treating as empty"
                    );
                    outcome.scope_failures.push(QueryFailure {
                        source: Source::ContentPage,
                        period_label: period.label.clone(),
                        scope: Some(space_key.clone()),
                        message: "space not accessible".to_string(),
                    });
                }
                Err(e) => {
                    warn!(
                        period = %period.label,
                        space = %space_key,
                        error = %e,
                        "Content scope query failed, treating as empty"
                    );
                    outcome.scope_failures.push(QueryFailure {
                        source: Source::ContentPage,
                        period_label: period.label.clone(),
                        scope: Some(space_key.clone()),
                        message: e.to_string(),
                    });
                }
            }
        }

        // Only a full wipeout counts as a failed (period, source) query.
        if outcome.scope_failures.len() == scopes.len() {
            return Err(DossierError::SourceQuery {
                source: Source::ContentPage,
                period: period.label.clone(),
                scope: None,
                message: format!("all {} content scopes failed", scopes.len()),
            });
        }

        Ok(outcome)
    }
}

fn build_cql(author: &str, period: &Period, space_key: &str) -> String {
    format!(
        "creator = \"{}\" AND type in (\"page\", \"blogpost\") AND created >= \"{} 00:00\" \
         AND created <= \"{} 23:59\" AND space = \"{}\" ORDER BY created ASC",
        author,
        period.start_str(),
        period.end_str(),
        space_key
    )
}

/// Ensure the server URL carries a scheme and the `/wiki` endpoint used by
/// cloud instances.
fn normalize_server_url(server: &str) -> String {
    let mut url = if server.starts_with("http://") || server.starts_with("https://") {
        server.to_string()
    } else {
        format!("https://{}", server)
    };
    url = url.trim_end_matches('/').to_string();
    if !url.ends_with("/wiki") {
        url.push_str("/wiki");
    }
    url
}

/// Derive the personal space key from the author identity: `~` plus the
/// alphanumerics of the email localpart.
fn personal_space_key(email: &str) -> String {
    let localpart = email.split('@').next().unwrap_or(email);
    let cleaned: String = localpart.chars().filter(|c| c.is_alphanumeric()).collect();
    format!("~{}", cleaned.to_lowercase())
}
