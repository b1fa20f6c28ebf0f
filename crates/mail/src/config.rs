//! Backend configuration loading
//!
//! The backend base URL is resolved in order of priority:
//! 1. JSON file in the Mailroom config directory (`backend.json`)
//! 2. Runtime environment variable (`MAILROOM_BACKEND_URL`)
//! 3. The built-in default (`http://localhost:9250/`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Backend config filename in the Mailroom config directory
const BACKEND_FILE: &str = "backend.json";

/// Environment variable overriding the backend base URL
pub const BACKEND_URL_ENV: &str = "MAILROOM_BACKEND_URL";

/// Base URL used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:9250/";

/// Where the REST backend lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl BackendConfig {
    /// Load the configuration using the following priority:
    /// 1. JSON file (~/.config/mailroom/backend.json)
    /// 2. Runtime environment variable
    /// 3. Default
    pub fn load() -> Result<Self> {
        if config::config_exists(BACKEND_FILE) {
            return config::load_json(BACKEND_FILE);
        }

        if let Some(config) = Self::from_env() {
            return Ok(config);
        }

        Ok(Self::default())
    }

    /// Load the configuration from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse the configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse backend config JSON")
    }

    /// Read the base URL from the environment, if set and non-empty
    pub fn from_env() -> Option<Self> {
        std::env::var(BACKEND_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|base_url| Self { base_url })
    }

    /// Persist the configuration to the Mailroom config directory, where
    /// the next [`BackendConfig::load`] picks it up
    pub fn save(&self) -> Result<()> {
        self.url()?;
        config::save_json(BACKEND_FILE, self)
    }

    /// Persist the configuration to a specific JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.url()?;
        config::save_json_file(path, self)
    }

    /// Get the default config file path (~/.config/mailroom/backend.json)
    pub fn default_config_path() -> Option<PathBuf> {
        config::config_path(BACKEND_FILE)
    }

    /// Parsed base URL. A trailing slash is added so endpoints join
    /// underneath it instead of replacing its last segment.
    pub fn url(&self) -> Result<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).with_context(|| format!("Invalid backend URL: {}", self.base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config = BackendConfig::from_json(r#"{ "base_url": "https://mail.example.com/api" }"#)
            .unwrap();
        assert_eq!(config.base_url, "https://mail.example.com/api");
        assert_eq!(config.url().unwrap().as_str(), "https://mail.example.com/api/");
    }

    #[test]
    fn test_invalid_json() {
        assert!(BackendConfig::from_json(r#"{ "other": 1 }"#).is_err());
    }

    #[test]
    fn test_invalid_url() {
        let config = BackendConfig {
            base_url: "not a url".to_string(),
        };
        let err = config.url().unwrap_err();
        assert!(err.to_string().contains("Invalid backend URL"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.json");
        std::fs::write(&path, r#"{ "base_url": "http://127.0.0.1:8080/" }"#).unwrap();

        let config = BackendConfig::from_file(&path).unwrap();
        assert_eq!(config.url().unwrap().port(), Some(8080));
    }

    #[test]
    fn test_save_to_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.json");
        let config = BackendConfig {
            base_url: "http://mail.internal:8080/api/".to_string(),
        };

        config.save_to_file(&path).unwrap();
        assert_eq!(BackendConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_save_refuses_invalid_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.json");
        let config = BackendConfig {
            base_url: "not a url".to_string(),
        };

        assert!(config.save_to_file(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_default() {
        assert_eq!(BackendConfig::default().url().unwrap().as_str(), DEFAULT_BASE_URL);
    }
}
