//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Filter used when neither the environment, `--verbose` nor the config file
/// sets one.
pub const DEFAULT_FILTER: &str = "warn";

/// Filter used for `--verbose`.
pub const VERBOSE_FILTER: &str = "debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; anything but `json` means pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
    /// Log file; stderr when `None`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from config settings.
    ///
    /// Filter precedence, highest first: `env_filter` (the caller passes
    /// `RUST_LOG`), `verbose`, the configured level, [`DEFAULT_FILTER`].
    #[must_use]
    pub fn from_settings(
        settings: Option<&LoggingSettings>,
        verbose: bool,
        env_filter: Option<&str>,
    ) -> Self {
        let configured = settings
            .and_then(|s| s.level.as_deref())
            .filter(|level| !level.trim().is_empty());

        let filter = match env_filter.filter(|f| !f.trim().is_empty()) {
            Some(directive) => directive,
            None if verbose => VERBOSE_FILTER,
            None => configured.unwrap_or(DEFAULT_FILTER),
        };

        Self {
            filter: filter.to_string(),
            format: settings
                .and_then(|s| s.format.as_deref())
                .map(LogFormat::parse)
                .unwrap_or_default(),
            file: settings.and_then(|s| s.file.clone()),
        }
    }
}
