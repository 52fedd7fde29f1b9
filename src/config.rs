use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{InvalidLoanError, Result};

/// environment variable naming a JSON config file
pub const CONFIG_PATH_ENV: &str = "LOAN_DESK_CONFIG";

/// environment variable overriding the database path
pub const DATABASE_PATH_ENV: &str = "LOAN_DESK_DB";

/// path understood as a private in-memory database
pub const IN_MEMORY_PATH: &str = ":memory:";

/// application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    /// tracing filter used when RUST_LOG is unset
    pub log_filter: String,
}

/// database connection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlite file, or ":memory:"
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
    pub enforce_foreign_keys: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            log_filter: "loan_desk_rs=info,loan_desk=info".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("loan_desk.db"),
            busy_timeout_ms: 5_000,
            enforce_foreign_keys: true,
        }
    }
}

impl DatabaseConfig {
    /// private database that disappears with the session
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(IN_MEMORY_PATH),
            ..Self::default()
        }
    }

    /// file-backed database at `path`
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_PATH
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(InvalidLoanError::InvalidConfiguration {
                message: "database path must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl AppConfig {
    /// parse a JSON config file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| InvalidLoanError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: AppConfig =
            serde_json::from_str(text).map_err(|e| InvalidLoanError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.database.validate()?;
        Ok(config)
    }

    /// Load from the environment.
    ///
    /// `LOAN_DESK_CONFIG` names a JSON file (defaults apply when unset) and
    /// `LOAN_DESK_DB` overrides the database path.
    pub fn load() -> Result<Self> {
        let mut config = match env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(PathBuf::from(path))?,
            None => Self::default(),
        };

        if let Some(db_path) = env::var_os(DATABASE_PATH_ENV) {
            config.database.path = PathBuf::from(db_path);
        }

        config.database.validate()?;
        Ok(config)
    }
}
