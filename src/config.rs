//! Run configuration for the dossier pipeline
//!
//! Everything a run needs is resolved once at startup into an explicit
//! [`RunConfig`] and passed by reference into component constructors; no
//! component reads ambient environment state after this point.
//!
//! Credentials resolve through the [`SecretsStore`](crate::secrets::SecretsStore)
//! (environment variables win over the encrypted file). Confluence settings
//! fall back to their Jira counterparts, so a single Atlassian credential
//! covers both services.

use crate::error::{DossierError, Result};
use crate::period::Granularity;
use crate::secrets::{self, SecretsStore};
use crate::template::TemplateSource;
use chrono::{Datelike, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Connection settings for one Atlassian-style service
#[derive(Debug)]
pub struct ServiceConfig {
    /// Base server URL, e.g. `https://example.atlassian.net`
    pub server: String,

    /// Account email; doubles as the author identity searched for
    pub email: String,

    /// API token for basic auth
    pub api_token: SecretString,
}

/// Settings for the generation call
#[derive(Debug)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

/// CLI-level overrides applied on top of the environment
#[derive(Debug, Default)]
pub struct Overrides {
    pub target_year: Option<i32>,
    pub granularity: Option<Granularity>,
    pub template_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

/// Complete configuration for one pipeline run
#[derive(Debug)]
pub struct RunConfig {
    pub jira: ServiceConfig,
    pub confluence: ServiceConfig,

    pub target_year: i32,
    pub granularity: Granularity,

    /// Space always included in the content search scope
    pub default_space_key: String,

    /// Additional configured spaces for the content search scope
    pub extra_space_keys: Vec<String>,

    pub output_dir: PathBuf,
    pub template_source: TemplateSource,
    pub llm: LlmConfig,
}

impl RunConfig {
    /// Resolve the full run configuration from environment, secrets store,
    /// and CLI overrides. Fails with a configuration error before any
    /// network cost is spent.
    pub fn resolve(store: &SecretsStore, overrides: Overrides) -> Result<Self> {
        let jira_server = require_env("JIRA_SERVER")?;
        let jira_email = require_env("JIRA_EMAIL")?;
        let jira_token = store
            .get(secrets::JIRA_API_TOKEN)
            .map_err(|e| DossierError::Configuration(e.to_string()))?;

        // Confluence falls back to the Jira credential set.
        let confluence_server = optional_env("CONFLUENCE_SERVER").unwrap_or_else(|| {
            debug!("CONFLUENCE_SERVER not set, falling back to JIRA_SERVER");
            jira_server.clone()
        });
        let confluence_email =
            optional_env("CONFLUENCE_EMAIL").unwrap_or_else(|| jira_email.clone());
        let confluence_token = store
            .get_optional(secrets::CONFLUENCE_API_TOKEN)
            .unwrap_or_else(|| SecretString::new(jira_token.expose_secret().into()));

        let target_year = match overrides.target_year {
            Some(year) => year,
            None => match optional_env("TARGET_YEAR") {
                Some(raw) => raw.parse::<i32>().map_err(|_| {
                    DossierError::Configuration(format!("TARGET_YEAR is not a year: '{}'", raw))
                })?,
                None => Utc::now().year(),
            },
        };

        let extra_space_keys: Vec<String> = optional_env("CONFLUENCE_SPACE_KEYS")
            .map(|raw| {
                raw.split(',')
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let default_space_key =
            optional_env("CONFLUENCE_DEFAULT_SPACE").unwrap_or_else(|| "RD".to_string());

        let template_source = resolve_template_source(store, overrides.template_file)?;

        let output_dir = overrides
            .output_dir
            .or_else(|| optional_env("DOSSIER_OUTPUT_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("output"));

        let llm = LlmConfig {
            api_key: store
                .get(secrets::ANTHROPIC_API_KEY)
                .map_err(|e| DossierError::Configuration(e.to_string()))?,
            model: optional_env("DOSSIER_MODEL")
                .unwrap_or_else(|| "claude-3-5-haiku-20241022".to_string()),
            max_tokens: 4096,
            temperature: 0.7,
        };

        info!(
            target_year,
            default_space = %default_space_key,
            extra_spaces = extra_space_keys.len(),
            "Run configuration resolved"
        );

        Ok(Self {
            jira: ServiceConfig {
                server: jira_server,
                email: jira_email,
                api_token: jira_token,
            },
            confluence: ServiceConfig {
                server: confluence_server,
                email: confluence_email,
                api_token: confluence_token,
            },
            target_year,
            granularity: overrides.granularity.unwrap_or_default(),
            default_space_key,
            extra_space_keys,
            output_dir,
            template_source,
            llm,
        })
    }
}

/// Pick the template source, resolving the file-vs-secret ambiguity with an
/// explicit priority: a local file (CLI flag or ASSESSMENT_TEMPLATE_FILE)
/// wins over the ASSESSMENT_TEMPLATE secret.
fn resolve_template_source(
    store: &SecretsStore,
    cli_file: Option<PathBuf>,
) -> Result<TemplateSource> {
    let local = cli_file.or_else(|| optional_env("ASSESSMENT_TEMPLATE_FILE").map(PathBuf::from));
    let has_secret = store.get_optional(secrets::ASSESSMENT_TEMPLATE).is_some();

    match local {
        Some(path) => {
            if has_secret {
                warn!(
                    "Both a template file and the {} secret are configured; using the file {}",
                    secrets::ASSESSMENT_TEMPLATE,
                    path.display()
                );
            }
            Ok(TemplateSource::LocalFile(path))
        }
        None if has_secret => Ok(TemplateSource::RemoteSecret(
            secrets::ASSESSMENT_TEMPLATE.to_string(),
        )),
        None => Err(DossierError::Configuration(
            "no template source configured: set ASSESSMENT_TEMPLATE_FILE or store the \
             ASSESSMENT_TEMPLATE secret"
                .to_string(),
        )),
    }
}

fn require_env(name: &str) -> Result<String> {
    optional_env(name)
        .ok_or_else(|| DossierError::Configuration(format!("{} is not set", name)))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
