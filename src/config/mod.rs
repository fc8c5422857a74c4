//! Configuration management.
//!
//! Configuration comes from an optional TOML file:
//!
//! ```toml
//! database_path = "/var/lib/vitedb/links.db"
//!
//! [logging]
//! level = "info"        # tracing filter directive
//! format = "json"       # "pretty" (default) or "json"
//! file = "/var/log/vitedb.log"
//! ```
//!
//! Every key is optional. The library never reads the environment; the
//! binary decides which file to load.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application directory name under the platform config and data dirs.
const APP_DIR: &str = "vitedb";

/// File name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration for vitedb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VitedbConfig {
    /// Path of the links database file.
    pub database_path: PathBuf,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// `[logging]` section of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Filter directive such as `info` or `vitedb=debug`.
    pub level: Option<String>,
    /// Output format: `pretty` or `json`.
    pub format: Option<String>,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Database file path.
    pub database_path: Option<PathBuf>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

impl Default for VitedbConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            logging: LoggingSettings::default(),
        }
    }
}

impl VitedbConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::parse(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] for malformed TOML or unknown keys.
    pub fn parse(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/vitedb/` on macOS)
    /// 2. XDG config dir (`~/.config/vitedb/` for Unix compatibility)
    ///
    /// Returns the default configuration if neither file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be loaded.
    pub fn load_default() -> Result<Self> {
        default_config_paths()
            .into_iter()
            .find(|path| path.exists())
            .map_or_else(|| Ok(Self::default()), |path| Self::load_from_file(&path))
    }

    /// Converts a `ConfigFile` to `VitedbConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(database_path) = file.database_path {
            config.database_path = database_path;
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        config
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }
}

/// Candidate config file locations, in lookup order.
#[must_use]
pub fn default_config_paths() -> Vec<PathBuf> {
    let Some(base_dirs) = directories::BaseDirs::new() else {
        return Vec::new();
    };

    let platform = base_dirs.config_dir().join(APP_DIR).join(CONFIG_FILE_NAME);
    let xdg = base_dirs
        .home_dir()
        .join(".config")
        .join(APP_DIR)
        .join(CONFIG_FILE_NAME);

    if platform == xdg {
        vec![platform]
    } else {
        vec![platform, xdg]
    }
}

/// Default database location: `<data dir>/vitedb/links.db`.
///
/// Falls back to `links.db` in the working directory when no home directory
/// can be determined.
#[must_use]
pub fn default_database_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("links.db"),
        |b| b.data_local_dir().join(APP_DIR).join("links.db"),
    )
}
