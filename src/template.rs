//! Question template loading and parsing
//!
//! The template backing store is decided once at startup into a
//! [`TemplateSource`]: a local file path or a named secret in the encrypted
//! store. The loader turns the resolved text into an ordered question list,
//! one question per recognizable top-level list item. Indented continuation
//! lines (bullet sub-prompts) stay attached to their question. Unstructured
//! text falls back to a single whole-text question.

use crate::error::{DossierError, Result};
use crate::secrets::SecretsStore;
use crate::types::AssessmentTemplate;
use secrecy::ExposeSecret;
use std::path::PathBuf;
use tracing::{debug, info};

/// Where the question template comes from, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Path to a local template file
    LocalFile(PathBuf),

    /// Name of a secret in the encrypted store holding the template text
    RemoteSecret(String),
}

/// Loads the assessment template from its resolved source
pub struct TemplateLoader<'a> {
    source: &'a TemplateSource,
    store: &'a SecretsStore,
}

impl<'a> TemplateLoader<'a> {
    pub fn new(source: &'a TemplateSource, store: &'a SecretsStore) -> Self {
        Self { source, store }
    }

    /// Load and parse the template. Fails with `TemplateNotFound` when the
    /// source cannot be read or resolves to empty content.
    pub fn load(&self) -> Result<AssessmentTemplate> {
        let raw = match self.source {
            TemplateSource::LocalFile(path) => {
                debug!("Loading template from file {}", path.display());
                std::fs::read_to_string(path).map_err(|e| {
                    DossierError::TemplateNotFound(format!(
                        "cannot read template file {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
            TemplateSource::RemoteSecret(name) => {
                debug!("Loading template from secret '{}'", name);
                self.store
                    .get(name)
                    .map_err(|e| DossierError::TemplateNotFound(e.to_string()))?
                    .expose_secret()
                    .to_string()
            }
        };

        if raw.trim().is_empty() {
            return Err(DossierError::TemplateNotFound(
                "template content is empty".to_string(),
            ));
        }

        let questions = parse_questions(&raw);
        info!("Loaded template with {} question(s)", questions.len());
        Ok(AssessmentTemplate::new(questions))
    }
}

/// Split template text into questions: one per top-level list item, with
/// indented continuation lines attached. Falls back to the whole text when
/// no list structure is recognized.
fn parse_questions(raw: &str) -> Vec<String> {
    let mut questions: Vec<String> = Vec::new();

    for line in raw.lines() {
        if let Some(item) = list_item_text(line) {
            questions.push(item.to_string());
        } else if let Some(current) = questions.last_mut() {
            // Continuation or sub-prompt: keep it with the question above.
            if !line.trim().is_empty() {
                current.push('\n');
                current.push_str(line.trim_end());
            }
        }
        // Preamble lines before the first list item are dropped.
    }

    if questions.is_empty() {
        vec![raw.trim().to_string()]
    } else {
        questions
    }
}

/// Recognize a top-level list item and return its text
///
/// Accepted markers: `- `, `* `, ordinals like `3.` / `3)`, and `Q3:` / `Q3.`
/// prefixes. Indented list items are continuations, not new questions.
fn list_item_text(line: &str) -> Option<&str> {
    if line.starts_with(' ') || line.starts_with('\t') {
        return None;
    }
    let trimmed = line.trim_end();

    if let Some(rest) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
        return Some(rest.trim());
    }

    // Ordinal markers: "12." / "12)" / "Q12:" / "Q12."
    let body = trimmed.strip_prefix(['Q', 'q']).unwrap_or(trimmed);
    let digits = body.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let after = &body[digits..];
        if let Some(rest) = after
            .strip_prefix('.')
            .or_else(|| after.strip_prefix(')'))
            .or_else(|| after.strip_prefix(':'))
        {
            let rest = rest.trim();
            if !rest.is_empty() {
                return Some(rest);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn store() -> (SecretsStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = SecretsStore::with_config_dir(temp.path().to_path_buf()).unwrap();
        (store, temp)
    }

    #[test]
    fn test_parse_numbered_questions() {
        let raw = "Self assessment for the year.\n\
                   1. What were your key achievements?\n\
                   2. Where did you demonstrate leadership?\n\
                   3. What are your growth areas?\n";
        let questions = parse_questions(raw);
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0], "What were your key achievements?");
        assert_eq!(questions[2], "What are your growth areas?");
    }

    #[test]
    fn test_sub_prompts_stay_attached() {
        let raw = "1. Describe your impact.\n\
                   \x20  - consider delivered projects\n\
                   \x20  - consider collaboration\n\
                   2. Describe your growth.\n";
        let questions = parse_questions(raw);
        assert_eq!(questions.len(), 2);
        assert!(questions[0].contains("delivered projects"));
        assert!(questions[0].contains("collaboration"));
        assert!(!questions[1].contains("consider"));
    }

    #[test]
    fn test_dash_and_q_markers() {
        let raw = "- First question?\nQ2: Second question?\n3) Third question?\n";
        let questions = parse_questions(raw);
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[1], "Second question?");
        assert_eq!(questions[2], "Third question?");
    }

    #[test]
    fn test_unstructured_text_is_one_question() {
        let raw = "Tell the story of your year in your own words.";
        let questions = parse_questions(raw);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0], raw);
    }

    #[test]
    fn test_load_from_file() {
        let (secrets, _temp) = store();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1. What went well?").unwrap();
        writeln!(file, "2. What could improve?").unwrap();

        let source = TemplateSource::LocalFile(file.path().to_path_buf());
        let template = TemplateLoader::new(&source, &secrets).load().unwrap();
        assert_eq!(template.len(), 2);
    }

    #[test]
    fn test_missing_file_is_template_not_found() {
        let (secrets, _temp) = store();
        let source = TemplateSource::LocalFile(PathBuf::from("/nonexistent/template.txt"));
        let err = TemplateLoader::new(&source, &secrets).load().unwrap_err();
        assert!(matches!(err, DossierError::TemplateNotFound(_)));
    }

    #[test]
    fn test_empty_content_is_template_not_found() {
        let (secrets, _temp) = store();
        let file = NamedTempFile::new().unwrap();

        let source = TemplateSource::LocalFile(file.path().to_path_buf());
        let err = TemplateLoader::new(&source, &secrets).load().unwrap_err();
        assert!(matches!(err, DossierError::TemplateNotFound(_)));
    }

    #[test]
    fn test_load_from_secret() {
        let (secrets, _temp) = store();
        secrets
            .set("ASSESSMENT_TEMPLATE", "1. One?\n2. Two?\n")
            .unwrap();

        let source = TemplateSource::RemoteSecret("ASSESSMENT_TEMPLATE".to_string());
        let template = TemplateLoader::new(&source, &secrets).load().unwrap();
        assert_eq!(template.len(), 2);
    }
}
