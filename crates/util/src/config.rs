//! Host configuration file.
//!
//! The file lists the extensions known to the host together with their
//! stored preference values. It is looked up in this order:
//!
//! 1. `$LUMEN_CONFIG`
//! 2. `$XDG_CONFIG_HOME/lumen/config.json`
//! 3. `~/.config/lumen/config.json`
//!
//! A missing file is not an error; the default (empty) configuration is used.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs_next::home_dir;
use indexmap::IndexMap;
use lumen_types::{PayloadTransport, ValueMap};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{expand_tilde, resolve_relative_to};

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "LUMEN_CONFIG";

/// XDG base directory variable consulted after the override.
pub const XDG_CONFIG_HOME_ENV: &str = "XDG_CONFIG_HOME";

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Per-invocation timeout applied when the file does not set one.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

impl ConfigError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid { reason: reason.into() }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Editor command used by `edit` actions; `$VISUAL`/`$EDITOR` otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
    #[serde(default)]
    pub extensions: IndexMap<String, ExtensionConfig>,
    /// Directory the file was loaded from; relative origins resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            editor: None,
            extensions: IndexMap::new(),
            base_dir: PathBuf::from("."),
        }
    }
}

/// A configured extension. On the wire this is either a bare origin string or
/// an object with `origin`, `preferences`, and `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawExtensionConfig")]
pub struct ExtensionConfig {
    pub origin: String,
    pub preferences: ValueMap,
    /// Overrides the payload convention declared by the manifest.
    pub payload: Option<PayloadTransport>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawExtensionConfig {
    Origin(String),
    Detailed {
        origin: String,
        #[serde(default)]
        preferences: ValueMap,
        #[serde(default)]
        payload: Option<PayloadTransport>,
    },
}

impl From<RawExtensionConfig> for ExtensionConfig {
    fn from(raw: RawExtensionConfig) -> Self {
        match raw {
            RawExtensionConfig::Origin(origin) => Self {
                origin,
                preferences: ValueMap::new(),
                payload: None,
            },
            RawExtensionConfig::Detailed {
                origin,
                preferences,
                payload,
            } => Self {
                origin,
                preferences,
                payload,
            },
        }
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn extension(&self, name: &str) -> Option<&ExtensionConfig> {
        self.extensions.get(name)
    }

    /// Absolute path of a configured extension's executable.
    pub fn entrypoint(&self, name: &str) -> Option<PathBuf> {
        self.extension(name).map(|extension| resolve_relative_to(&extension.origin, &self.base_dir))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("timeoutMs must be greater than zero"));
        }
        for (name, extension) in &self.extensions {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid("extension names must not be empty"));
            }
            if extension.origin.trim().is_empty() {
                return Err(ConfigError::invalid(format!("extension '{name}' has an empty origin")));
            }
        }
        Ok(())
    }
}

/// Returns the configuration path following the override/XDG/home order.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    if let Ok(base) = env::var(XDG_CONFIG_HOME_ENV)
        && !base.trim().is_empty()
    {
        return expand_tilde(&base).join("lumen").join(CONFIG_FILE_NAME);
    }

    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("lumen")
        .join(CONFIG_FILE_NAME)
}

/// Loads the configuration from the default path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from_path(&default_config_path())
}

/// Loads the configuration from a specific path. A missing file yields the default.
pub fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found; using defaults");
            return Ok(Config {
                base_dir,
                ..Config::default()
            });
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut config: Config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.base_dir = base_dir;
    config.validate()?;
    debug!(path = %path.display(), extensions = config.extensions.len(), "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_variable_wins_over_xdg() {
        temp_env::with_vars(
            [(CONFIG_PATH_ENV, Some("/tmp/custom/lumen.json")), (XDG_CONFIG_HOME_ENV, Some("/tmp/xdg"))],
            || {
                assert_eq!(default_config_path(), PathBuf::from("/tmp/custom/lumen.json"));
            },
        );
    }

    #[test]
    fn xdg_base_is_used_without_override() {
        temp_env::with_vars([(CONFIG_PATH_ENV, None), (XDG_CONFIG_HOME_ENV, Some("/tmp/xdg"))], || {
            assert_eq!(default_config_path(), PathBuf::from("/tmp/xdg/lumen/config.json"));
        });
    }

    #[test]
    fn falls_back_to_home_directory() {
        temp_env::with_vars([(CONFIG_PATH_ENV, None::<&str>), (XDG_CONFIG_HOME_ENV, None)], || {
            let path = default_config_path();
            assert!(path.ends_with(".config/lumen/config.json"), "unexpected path: {}", path.display());
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from_path(&dir.path().join("absent.json")).expect("defaults");
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(config.extensions.is_empty());
    }

    #[test]
    fn parses_short_and_detailed_extension_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"{
                "timeoutMs": 2500,
                "extensions": {
                    "files": "exts/files.py",
                    "journal": {"origin": "/opt/journal", "preferences": {"dir": "~/notes"}, "payload": "stdin"}
                }
            }"#,
        )
        .unwrap();

        let config = load_config_from_path(&path).expect("load config");
        assert_eq!(config.timeout(), Duration::from_millis(2500));
        let names: Vec<&str> = config.extensions.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["files", "journal"]);
        assert_eq!(config.entrypoint("files"), Some(dir.path().join("exts/files.py")));

        let journal = config.extension("journal").expect("journal configured");
        assert_eq!(journal.payload, Some(PayloadTransport::Stdin));
        assert_eq!(journal.preferences["dir"], "~/notes");
    }

    #[test]
    fn rejects_zero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"timeoutMs": 0}"#).unwrap();
        let error = load_config_from_path(&path).expect_err("zero timeout");
        assert!(matches!(error, ConfigError::Invalid { .. }));
    }
}
