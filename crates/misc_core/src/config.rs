//! Environment-driven runtime configuration.
//!
//! # Responsibility
//! - Resolve database path, log settings and topic prefix from `MISC_*`
//!   variables, falling back to defaults.
//!
//! # Invariants
//! - Blank variables count as unset.
//! - A configured log directory is always absolute.

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_VAR: &str = "MISC_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "MISC_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "MISC_LOG_DIR";
pub const TOPIC_PREFIX_VAR: &str = "MISC_TOPIC_PREFIX";

/// Topic prefix used when `MISC_TOPIC_PREFIX` is unset.
pub const DEFAULT_TOPIC_PREFIX: &str = "misc";
const DEFAULT_DB_FILE_NAME: &str = "misc.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidLogLevel(String),
    RelativeLogDir(PathBuf),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLogLevel(message) => write!(f, "{LOG_LEVEL_VAR}: {message}"),
            Self::RelativeLogDir(path) => write!(
                f,
                "{LOG_DIR_VAR} must be an absolute path, got `{}`",
                path.display()
            ),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiscConfig {
    pub db_path: PathBuf,
    pub log_level: &'static str,
    /// File logging is disabled when `None`.
    pub log_dir: Option<PathBuf>,
    pub topic_prefix: String,
}

impl MiscConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, one call per variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let db_path = value(DB_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));

        let log_level = match value(LOG_LEVEL_VAR) {
            Some(raw) => normalize_level(&raw).map_err(ConfigError::InvalidLogLevel)?,
            None => default_log_level(),
        };

        let log_dir = match value(LOG_DIR_VAR).map(PathBuf::from) {
            Some(path) if !path.is_absolute() => return Err(ConfigError::RelativeLogDir(path)),
            other => other,
        };

        let topic_prefix = value(TOPIC_PREFIX_VAR)
            .map(|raw| raw.trim_matches('/').to_string())
            .filter(|raw| !raw.is_empty())
            .unwrap_or_else(|| DEFAULT_TOPIC_PREFIX.to_string());

        Ok(Self {
            db_path,
            log_level,
            log_dir,
            topic_prefix,
        })
    }
}
