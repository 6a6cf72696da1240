//! OAuth client credential loading
//!
//! Sources, first match wins:
//! 1. A file given on the command line or in settings
//! 2. `google-credentials.json` in the config directory
//! 3. `GMAIL_CLIENT_ID` / `GMAIL_CLIENT_SECRET`

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

const CREDENTIALS_FILE: &str = "google-credentials.json";
const CLIENT_ID_VAR: &str = "GMAIL_CLIENT_ID";
const CLIENT_SECRET_VAR: &str = "GMAIL_CLIENT_SECRET";

/// OAuth client id and secret of the installed app
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Where a set of credentials came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    File(PathBuf),
    Environment,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Environment => write!(f, "${} / ${}", CLIENT_ID_VAR, CLIENT_SECRET_VAR),
        }
    }
}

/// Client secret JSON as downloaded from the Google Cloud Console.
/// Desktop clients use `installed`, web clients `web`; both carry the same fields.
#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
}

#[derive(Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    /// Resolve credentials, preferring `explicit` when given
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let source = Self::locate(explicit);
        let credentials = match &source {
            CredentialSource::File(path) => Self::from_file(path)?,
            CredentialSource::Environment => Self::from_env()?,
        };
        debug!("Loaded OAuth client credentials from {}", source);
        Ok(credentials)
    }

    /// Pick the source [`Self::load`] reads from, without reading it
    pub fn locate(explicit: Option<&Path>) -> CredentialSource {
        if let Some(path) = explicit {
            return CredentialSource::File(path.to_path_buf());
        }
        match Self::default_credentials_path() {
            Some(path) if path.exists() => CredentialSource::File(path),
            _ => CredentialSource::Environment,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let file: ClientSecretFile = config::load_json_file(path)?;
        Self::from_client_secret(file)
            .with_context(|| format!("Invalid client secret file {}", path.display()))
    }

    /// Parse a client secret JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ClientSecretFile =
            serde_json::from_str(json).context("Failed to parse client secret JSON")?;
        Self::from_client_secret(file)
    }

    fn from_client_secret(file: ClientSecretFile) -> Result<Self> {
        let section = file
            .installed
            .or(file.web)
            .context("expected an 'installed' or 'web' client section")?;
        Self::new(section.client_id, section.client_secret)
    }

    pub fn from_env() -> Result<Self> {
        let read = |name: &str| {
            std::env::var(name).with_context(|| format!("{} is not set", name))
        };
        Self::new(read(CLIENT_ID_VAR)?, read(CLIENT_SECRET_VAR)?)
    }

    fn new(client_id: String, client_secret: String) -> Result<Self> {
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            anyhow::bail!("client id and client secret must not be empty");
        }
        Ok(Self {
            client_id,
            client_secret,
        })
    }

    /// `~/.config/mailsize/google-credentials.json`
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_client_secret() {
        let json = r#"{
            "installed": {
                "client_id": "1234.apps.googleusercontent.com",
                "client_secret": "shh",
                "redirect_uris": ["http://localhost"]
            }
        }"#;

        let creds = GmailCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "1234.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "shh");
    }

    #[test]
    fn test_web_client_secret() {
        let json = r#"{ "web": { "client_id": "web-id", "client_secret": "web-secret" } }"#;
        assert_eq!(GmailCredentials::from_json(json).unwrap().client_id, "web-id");
    }

    #[test]
    fn test_rejects_missing_section_and_blank_values() {
        assert!(GmailCredentials::from_json(r#"{ "other": {} }"#).is_err());
        assert!(
            GmailCredentials::from_json(
                r#"{ "installed": { "client_id": " ", "client_secret": "x" } }"#
            )
            .is_err()
        );
    }

    #[test]
    fn test_explicit_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(
            &path,
            r#"{ "installed": { "client_id": "file-id", "client_secret": "s" } }"#,
        )
        .unwrap();

        assert_eq!(
            GmailCredentials::locate(Some(&path)),
            CredentialSource::File(path.clone())
        );
        assert_eq!(GmailCredentials::load(Some(&path)).unwrap().client_id, "file-id");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GmailCredentials::load(Some(&dir.path().join("absent.json"))).is_err());
    }
}
