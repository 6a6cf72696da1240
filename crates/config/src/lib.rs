//! Configuration loading for mailsize
//!
//! Resolves the shared config directory (~/.config/mailsize/) and loads the
//! optional `settings.json` that supplies defaults for the command-line tool.
//!
//! Call [`init`] at application startup to bootstrap the config directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Name of the application directory inside the platform config dir
const APP_DIR: &str = "mailsize";

/// Settings filename in the config directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Initialize the config directory.
///
/// Creates ~/.config/mailsize/ if it doesn't exist.
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// Get the config directory (~/.config/mailsize/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a file within the config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Ensure the config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// User-tunable defaults for a scan run.
///
/// Every field is optional in the file; missing fields fall back to
/// [`Settings::default`]. Command-line flags take precedence over both.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Message ids requested per listing page (a checkpoint is written per page)
    pub page_size: u32,
    /// Number of messages fetched in parallel within a page
    pub concurrency: usize,
    /// Global timeout applied to every HTTP request, in seconds
    pub request_timeout_secs: u64,
    /// OAuth client credentials file (Google Cloud Console format)
    pub credentials_file: Option<PathBuf>,
    /// Where the OAuth token cache is stored
    pub token_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: 100,
            concurrency: 25,
            request_timeout_secs: 30,
            credentials_file: None,
            token_file: None,
        }
    }
}

impl Settings {
    /// Load settings from ~/.config/mailsize/settings.json, or defaults if absent
    pub fn load() -> Result<Self> {
        match config_path(SETTINGS_FILE) {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load settings from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings: Settings = load_json_file(path)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            anyhow::bail!("page_size must be at least 1");
        }
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        Ok(())
    }

    /// Token cache path, defaulting to ~/.config/mailsize/gmail-token.json
    pub fn token_path(&self) -> Option<PathBuf> {
        self.token_file
            .clone()
            .or_else(|| config_path("gmail-token.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_dir() {
        let dir = config_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().ends_with("mailsize"));
    }

    #[test]
    fn test_config_path() {
        let path = config_path("test.json").unwrap();
        assert!(path.ends_with("mailsize/test.json"));
    }

    #[test]
    fn test_partial_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "concurrency": 10 }}"#).unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.concurrency, 10);
        assert_eq!(settings.page_size, 100);
        assert_eq!(settings.request_timeout_secs, 30);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "concurrency": 0 }}"#).unwrap();

        assert!(Settings::from_file(file.path()).is_err());
    }

    #[test]
    fn test_explicit_token_path_wins() {
        let settings = Settings {
            token_file: Some(PathBuf::from("/tmp/token.json")),
            ..Settings::default()
        };
        assert_eq!(settings.token_path(), Some(PathBuf::from("/tmp/token.json")));
    }
}
