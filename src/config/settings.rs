//! Engine settings.
//!
//! Loaded from `~/.fieldsync/config.json` (or the file named by
//! `FIELDSYNC_CONFIG`), then overridden by environment variables:
//! `FIELDSYNC_ENDPOINT`, `FIELDSYNC_TOKEN`, `FIELDSYNC_MAX_ATTEMPTS`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::{atomic_write, RetryPolicy, UploadConfig};

/// Contents of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retry: RetryPolicy,
    pub upload: UploadConfig,
}

impl Settings {
    /// Reject settings the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.base_delay_ms == 0 {
            return Err(Error::Config("retry.base_delay_ms must be positive".into()));
        }
        if self.retry.cap_delay_ms < self.retry.base_delay_ms {
            return Err(Error::Config(
                "retry.cap_delay_ms must not be below retry.base_delay_ms".into(),
            ));
        }
        if self.upload.timeout_ms == 0 {
            return Err(Error::Config("upload.timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Get the settings file path.
///
/// # Errors
///
/// Returns `Config` if the home directory cannot be determined.
pub fn settings_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("FIELDSYNC_CONFIG") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    directories::BaseDirs::new()
        .map(|b| b.home_dir().join(".fieldsync").join("config.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Load settings from the default file, with environment overrides.
///
/// # Errors
///
/// Returns `Config` if the file exists but cannot be read or parsed, or
/// an override is malformed.
pub fn load_settings() -> Result<Settings> {
    let settings = load_settings_from(&settings_path()?)?;
    let settings = apply_env_overrides(settings, |key| std::env::var(key).ok())?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from `path`; a missing file yields defaults.
///
/// # Errors
///
/// Returns `Config` if the file cannot be read or parsed.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Save settings to the default file.
///
/// # Errors
///
/// Returns `Config` if the file cannot be written.
pub fn save_settings(settings: &Settings) -> Result<PathBuf> {
    let path = settings_path()?;
    save_settings_to(&path, settings)?;
    Ok(path)
}

/// Save settings to `path`, creating parent directories.
///
/// # Errors
///
/// Returns `Config` if the file cannot be written.
pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    atomic_write(path, &content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))
}

/// Apply `FIELDSYNC_*` overrides read through `lookup`.
///
/// Empty values are ignored.
///
/// # Errors
///
/// Returns `Config` if `FIELDSYNC_MAX_ATTEMPTS` is not a number.
pub fn apply_env_overrides<F>(mut settings: Settings, lookup: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(endpoint) = get("FIELDSYNC_ENDPOINT") {
        settings.upload.endpoint = Some(endpoint);
    }
    if let Some(token) = get("FIELDSYNC_TOKEN") {
        settings.upload.token = Some(token);
    }
    if let Some(raw) = get("FIELDSYNC_MAX_ATTEMPTS") {
        settings.retry.max_attempts = raw.trim().parse().map_err(|_| {
            Error::Config(format!("FIELDSYNC_MAX_ATTEMPTS must be a number, got '{raw}'"))
        })?;
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.retry.max_attempts, 3);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"retry": {"max_attempts": 5}, "upload": {"endpoint": "http://localhost:8080"}}"#,
        )
        .unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.base_delay_ms, 1_000);
        assert_eq!(settings.upload.endpoint.as_deref(), Some("http://localhost:8080"));
        assert_eq!(settings.upload.timeout_ms, 10_000);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut settings = Settings::default();
        settings.upload.endpoint = Some("https://sync.example.net".into());
        settings.retry.cap_delay_ms = 60_000;
        save_settings_to(&path, &settings).unwrap();

        assert_eq!(load_settings_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_settings_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let settings = apply_env_overrides(
            Settings::default(),
            env(&[
                ("FIELDSYNC_ENDPOINT", "https://sync.example.net"),
                ("FIELDSYNC_TOKEN", ""),
                ("FIELDSYNC_MAX_ATTEMPTS", "7"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.upload.endpoint.as_deref(), Some("https://sync.example.net"));
        assert!(settings.upload.token.is_none());
        assert_eq!(settings.retry.max_attempts, 7);

        let lots = env(&[("FIELDSYNC_MAX_ATTEMPTS", "lots")]);
        let bad = apply_env_overrides(Settings::default(), lots);
        assert!(matches!(bad, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate() {
        assert!(Settings::default().validate().is_ok());

        let mut settings = Settings::default();
        settings.retry.max_attempts = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.retry.cap_delay_ms = 10;
        assert!(settings.validate().is_err());
    }
}
