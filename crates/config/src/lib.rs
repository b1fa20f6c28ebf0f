//! On-disk settings for Mailroom
//!
//! Settings are JSON files kept under `mailroom/` in the platform config
//! root (`~/.config/mailroom/` on Linux). The client currently keeps one
//! file there, `backend.json`, naming the REST backend the mail and
//! mailbox sets talk to. Callers decide what a missing file means; every
//! helper here reports the path it touched when it fails.
//!
//! Call [`init`] once at startup so later saves have somewhere to go.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Directory name below the platform config root
const APP_DIR: &str = "mailroom";

/// Create the settings directory if needed and return it
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// `~/.config/mailroom/`, or `None` when the platform has no config root
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|root| root.join(APP_DIR))
}

/// Full path of a settings file such as `backend.json`
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(filename))
}

/// Whether a settings file has been written
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|path| path.is_file())
}

/// Read a settings file from the settings directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("No config directory on this platform")?;
    load_json_file(&path)
}

/// Read settings from an explicit path, for example one given on the
/// command line
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("No config directory on this platform")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// Write a settings file into the settings directory, creating it first
pub fn save_json<T: Serialize>(filename: &str, value: &T) -> Result<()> {
    let dir = ensure_config_dir()?;
    save_json_file(&dir.join(filename), value)
}

/// Write settings as pretty JSON to an explicit path.
///
/// The content goes to a sibling `.tmp` file first and is renamed over the
/// target, so an interrupted save leaves the previous settings readable.
pub fn save_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to encode settings")?;
    let staging = staging_path(path);
    std::fs::write(&staging, content)
        .with_context(|| format!("Failed to write config file: {}", staging.display()))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("Failed to replace config file: {}", path.display()))?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Backend {
        base_url: String,
    }

    fn backend(url: &str) -> Backend {
        Backend {
            base_url: url.to_string(),
        }
    }

    #[test]
    fn test_backend_file_location() {
        let dir = config_dir().unwrap();
        assert!(dir.ends_with("mailroom"));
        assert!(config_path("backend.json").unwrap().ends_with("mailroom/backend.json"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.json");

        save_json_file(&path, &backend("http://localhost:9250/")).unwrap();
        let loaded: Backend = load_json_file(&path).unwrap();
        assert_eq!(loaded, backend("http://localhost:9250/"));
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn test_save_replaces_previous_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.json");
        save_json_file(&path, &backend("http://old.example/")).unwrap();
        save_json_file(&path, &backend("http://new.example/")).unwrap();

        let loaded: Backend = load_json_file(&path).unwrap();
        assert_eq!(loaded.base_url, "http://new.example/");
        assert_eq!(staging_path(&path).file_name().unwrap(), "backend.json.tmp");
    }

    #[test]
    fn test_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_json_file::<Backend>(&dir.path().join("backend.json")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Failed to read config file"));
        assert!(message.contains("backend.json"));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_json_file::<Backend>(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
