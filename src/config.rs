//! Recap configuration (`.recap/config.toml`).
//!
//! Defines where durable logs are written and read, and how the capture
//! recorder stamps and flushes operations.
//!
//! ```toml
//! [history]
//! dir = ".recap/history"
//! extension = "json"
//!
//! [capture]
//! author = "alice"
//! flush_on_save = true
//! flush_on_close = true
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Location of the configuration file, relative to the workspace root.
pub const CONFIG_FILE: &str = ".recap/config.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level recap configuration.
///
/// Missing fields use defaults. Missing file → all defaults (no error).
#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecapConfig {
    /// Durable log location.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Recorder settings.
    #[serde(default)]
    pub capture: CaptureConfig,
}

// ---------------------------------------------------------------------------
// HistoryConfig
// ---------------------------------------------------------------------------

/// Where durable log files live.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    /// History directory; relative paths are resolved against the workspace
    /// root (default: `".recap/history"`).
    #[serde(default = "default_history_dir")]
    pub dir: PathBuf,

    /// Extension of log files, without the dot (default: `"json"`).
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: default_history_dir(),
            extension: default_extension(),
        }
    }
}

fn default_history_dir() -> PathBuf {
    PathBuf::from(".recap/history")
}

fn default_extension() -> String {
    "json".to_owned()
}

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// How the recorder stamps and flushes.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureConfig {
    /// Author stamped on recorded operations (default: `$USER`, else
    /// `"unknown"`).
    #[serde(default = "default_author")]
    pub author: String,

    /// Flush the live log after a file is saved (default: `true`).
    #[serde(default = "default_true")]
    pub flush_on_save: bool,

    /// Flush the live log after a file is closed (default: `true`).
    #[serde(default = "default_true")]
    pub flush_on_close: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            author: default_author(),
            flush_on_save: true,
            flush_on_close: true,
        }
    }
}

fn default_author() -> String {
    std::env::var("USER")
        .ok()
        .filter(|user| !user.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_owned())
}

const fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a recap configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(p) => write!(
                f,
                "{}: {}\n  To fix: correct the file or delete it to use defaults.",
                p.display(),
                self.message
            ),
            None => write!(f, "config error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl RecapConfig {
    /// Default config file location for `workspace_root`.
    #[must_use]
    pub fn default_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_FILE)
    }

    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML or unknown fields,
    ///   returns a [`ConfigError`] with line-level detail.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields, or an empty
    /// log extension.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })?;

        if config.history.extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError {
                path: None,
                message: "history.extension must not be empty".to_owned(),
            });
        }
        Ok(config)
    }

    /// The history directory, resolved against `workspace_root`.
    #[must_use]
    pub fn history_dir(&self, workspace_root: &Path) -> PathBuf {
        if self.history.dir.is_absolute() {
            self.history.dir.clone()
        } else {
            workspace_root.join(&self.history.dir)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
