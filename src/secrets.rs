//! Built-in encrypted secrets management using age encryption
//!
//! Holds the service API tokens, the generation API key, and optionally the
//! remotely stored assessment template. Secrets live in
//! `~/.config/dossier/secrets.age`.
//!
//! Priority order:
//! 1. Environment variables
//! 2. Encrypted config file (~/.config/dossier/secrets.age)

use age::{
    armor::{ArmoredReader, ArmoredWriter, Format},
    Decryptor, Encryptor,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::debug;

/// Secret names the pipeline looks up
pub const JIRA_API_TOKEN: &str = "JIRA_API_TOKEN";
pub const CONFLUENCE_API_TOKEN: &str = "CONFLUENCE_API_TOKEN";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ASSESSMENT_TEMPLATE: &str = "ASSESSMENT_TEMPLATE";

/// Secrets store with age encryption
pub struct SecretsStore {
    identity_file: PathBuf,
    secrets_file: PathBuf,
}

impl SecretsStore {
    /// Initialize the store with the standard config directory
    pub fn new() -> Result<Self> {
        let dirs = ProjectDirs::from("com", "dossier", "dossier")
            .context("Failed to determine config directory")?;
        Self::with_config_dir(dirs.config_dir().to_path_buf())
    }

    /// Initialize with a custom config directory (for testing)
    pub fn with_config_dir(config_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&config_dir).with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;

        debug!("Secrets store initialized (config_dir: {})", config_dir.display());

        Ok(Self {
            identity_file: config_dir.join("identity.key"),
            secrets_file: config_dir.join("secrets.age"),
        })
    }

    /// Get a secret by name. Environment variables win over the encrypted file.
    pub fn get(&self, name: &str) -> Result<SecretString> {
        if let Ok(val) = std::env::var(name) {
            if !val.is_empty() {
                debug!("Retrieved secret '{}' from environment variable", name);
                return Ok(SecretString::new(val.into()));
            }
        }

        if self.secrets_file.exists() {
            let secrets = self.load_secrets()?;
            if let Some(value) = secrets.get(name) {
                debug!("Retrieved secret '{}' from encrypted config", name);
                return Ok(SecretString::new(value.clone().into()));
            }
        }

        anyhow::bail!(
            "Secret '{}' not found. Set it with: dossier secrets set {} <value>",
            name,
            name
        )
    }

    /// Like [`get`](Self::get), but absence is not an error
    pub fn get_optional(&self, name: &str) -> Option<SecretString> {
        self.get(name).ok()
    }

    /// Set a secret (encrypt and save). Generates the encryption keypair on
    /// first use.
    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            anyhow::bail!("Secret value cannot be empty");
        }

        let identity = self.load_or_generate_identity()?;
        let recipient = identity.to_public();

        let mut secrets = if self.secrets_file.exists() {
            self.load_secrets()?
        } else {
            HashMap::new()
        };
        secrets.insert(name.to_string(), value.to_string());

        self.save_secrets(&secrets, &recipient)?;
        debug!("Secret '{}' updated", name);
        Ok(())
    }

    /// List configured secret names (never values)
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.secrets_file.exists() {
            return Ok(vec![]);
        }

        let secrets = self.load_secrets()?;
        let mut names: Vec<String> = secrets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn load_or_generate_identity(&self) -> Result<age::x25519::Identity> {
        if self.identity_file.exists() {
            let identity_str = fs::read_to_string(&self.identity_file)
                .context("Failed to read identity file")?;
            return identity_str
                .parse::<age::x25519::Identity>()
                .map_err(|e| anyhow::anyhow!("Failed to parse identity: {}", e));
        }

        let key = age::x25519::Identity::generate();
        fs::write(&self.identity_file, key.to_string().expose_secret())
            .context("Failed to write identity file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.identity_file)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.identity_file, perms)?;
        }

        debug!("Generated new encryption key at {}", self.identity_file.display());
        Ok(key)
    }

    /// Load and decrypt secrets
    fn load_secrets(&self) -> Result<HashMap<String, String>> {
        let identity_str =
            fs::read_to_string(&self.identity_file).context("Failed to read identity file")?;
        let identity = identity_str
            .parse::<age::x25519::Identity>()
            .map_err(|e| anyhow::anyhow!("Failed to parse identity: {}", e))?;

        let encrypted = fs::read(&self.secrets_file).context("Failed to read secrets file")?;

        let decryptor = Decryptor::new(ArmoredReader::new(&encrypted[..]))
            .map_err(|e| anyhow::anyhow!("Failed to create decryptor: {}", e))?;

        let mut decrypted = vec![];
        let mut reader = decryptor
            .decrypt(std::iter::once(&identity as &dyn age::Identity))
            .context("Failed to decrypt secrets (wrong key?)")?;
        reader
            .read_to_end(&mut decrypted)
            .context("Failed to read decrypted data")?;

        let secrets_str =
            String::from_utf8(decrypted).context("Decrypted data is not valid UTF-8")?;
        let secrets: HashMap<String, String> =
            serde_json::from_str(&secrets_str).context("Failed to parse secrets JSON")?;

        debug!("Loaded {} secrets from encrypted file", secrets.len());
        Ok(secrets)
    }

    /// Encrypt and save secrets
    fn save_secrets(
        &self,
        secrets: &HashMap<String, String>,
        recipient: &age::x25519::Recipient,
    ) -> Result<()> {
        let secrets_json =
            serde_json::to_string_pretty(secrets).context("Failed to serialize secrets")?;

        let recipient_box: Box<dyn age::Recipient + Send> = Box::new(recipient.clone());
        let encryptor =
            Encryptor::with_recipients(std::iter::once(&*recipient_box as &dyn age::Recipient))
                .context("Failed to create encryptor")?;

        let mut encrypted = vec![];
        let mut writer = encryptor
            .wrap_output(
                ArmoredWriter::wrap_output(&mut encrypted, Format::AsciiArmor)
                    .context("Failed to create armored writer")?,
            )
            .context("Failed to wrap encryptor")?;

        writer
            .write_all(secrets_json.as_bytes())
            .context("Failed to write encrypted data")?;
        writer.finish().and_then(|armor| armor.finish())?;

        fs::write(&self.secrets_file, encrypted).context("Failed to write secrets file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.secrets_file)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.secrets_file, perms)?;
        }

        debug!("Saved {} secrets to encrypted file", secrets.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn create_test_store() -> (SecretsStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SecretsStore::with_config_dir(temp_dir.path().to_path_buf()).unwrap();
        (store, temp_dir)
    }

    #[test]
    #[serial]
    fn test_set_and_get_secret() {
        let (store, _temp) = create_test_store();
        std::env::remove_var("TEST_DOSSIER_KEY");

        store.set("TEST_DOSSIER_KEY", "test_value").unwrap();

        let retrieved = store.get("TEST_DOSSIER_KEY").unwrap();
        assert_eq!(retrieved.expose_secret(), "test_value");
    }

    #[test]
    #[serial]
    fn test_environment_variable_takes_precedence() {
        let (store, _temp) = create_test_store();

        store.set("TEST_DOSSIER_KEY", "file_value").unwrap();
        std::env::set_var("TEST_DOSSIER_KEY", "env_value");

        let retrieved = store.get("TEST_DOSSIER_KEY").unwrap();
        assert_eq!(retrieved.expose_secret(), "env_value");

        std::env::remove_var("TEST_DOSSIER_KEY");
    }

    #[test]
    #[serial]
    fn test_missing_secret_is_error_but_optional_is_none() {
        let (store, _temp) = create_test_store();
        std::env::remove_var("TEST_DOSSIER_ABSENT");

        assert!(store.get("TEST_DOSSIER_ABSENT").is_err());
        assert!(store.get_optional("TEST_DOSSIER_ABSENT").is_none());
    }

    #[test]
    #[serial]
    fn test_list_secrets() {
        let (store, _temp) = create_test_store();

        assert_eq!(store.list().unwrap().len(), 0);

        store.set("KEY1", "value1").unwrap();
        store.set("KEY2", "value2").unwrap();

        let secrets = store.list().unwrap();
        assert_eq!(secrets, vec!["KEY1".to_string(), "KEY2".to_string()]);
    }

    #[test]
    #[serial]
    fn test_empty_value_rejected() {
        let (store, _temp) = create_test_store();
        assert!(store.set("KEY", "").is_err());
    }
}
