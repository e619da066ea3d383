//! # Settings
//!
//! Persistent configuration for the policy editor, stored as pretty JSON.
//!
//! The default location is `<config dir>/gpm/settings.json`, where the
//! config directory comes from [`dirs::config_dir`]. A missing file yields
//! [`Settings::default`]; unknown keys are ignored and missing keys take
//! their defaults, so older files keep loading.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GpmError, GpmResult};

const APP_DIR: &str = "gpm";
const SETTINGS_FILE: &str = "settings.json";

/// Everything the command line can also override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Directory holding `*.admx` files and per-language ADML folders.
    pub definitions_dir: PathBuf,
    /// Preferred ADML language, e.g. `en-US`.
    pub language: String,
    /// Machine-class `Registry.pol`.
    pub machine_pol: PathBuf,
    /// User-class `Registry.pol`.
    pub user_pol: PathBuf,
    /// Log writes instead of performing them.
    pub dry_run: bool,
    /// Abort a batch at the first failing command.
    pub stop_on_first_failure: bool,
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub log_level: String,
    /// Emit log lines as JSON.
    pub json_logs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let group_policy = default_group_policy_dir();
        Self {
            definitions_dir: default_definitions_dir(),
            language: gpm_admx::loader::FALLBACK_LANGUAGE.to_string(),
            machine_pol: group_policy.join("Machine").join("Registry.pol"),
            user_pol: group_policy.join("User").join("Registry.pol"),
            dry_run: false,
            stop_on_first_failure: true,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[cfg(windows)]
fn default_definitions_dir() -> PathBuf {
    PathBuf::from(r"C:\Windows\PolicyDefinitions")
}

#[cfg(not(windows))]
fn default_definitions_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR).join("PolicyDefinitions"))
        .unwrap_or_else(|| PathBuf::from("PolicyDefinitions"))
}

#[cfg(windows)]
fn default_group_policy_dir() -> PathBuf {
    PathBuf::from(r"C:\Windows\System32\GroupPolicy")
}

#[cfg(not(windows))]
fn default_group_policy_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR).join("GroupPolicy"))
        .unwrap_or_else(|| PathBuf::from("GroupPolicy"))
}

impl Settings {
    /// Default settings file location, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Load settings from `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - JSON settings file; a missing file is not an error
    ///
    /// # Returns
    ///
    /// The parsed settings, or the defaults when the file does not exist.
    pub fn load(path: &Path) -> GpmResult<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings at {}; using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(GpmError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| GpmError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write settings to `path` as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> GpmResult<()> {
        let io_err = |source: std::io::Error| GpmError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| GpmError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.language, "en-US");
        assert!(settings.stop_on_first_failure);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            language: "de-DE".into(),
            dry_run: true,
            json_logs: true,
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "language": "fr-FR", "somethingElse": 1 }"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.language, "fr-FR");
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(GpmError::Json { .. })));
    }
}
