//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use study_tracker_core::{PageGoal, Worksheets, WriteMode};
use tracing::Level;

const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where the worksheets live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// A Google spreadsheet reached over the Sheets HTTP API.
    Sheets,
    /// Process memory; contents vanish on restart.
    Memory,
}

/// Static page settings handed to the presentation layer once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayConfig {
    pub site_title: String,
    pub book_title: String,
    pub book_author: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub store_backend: StoreBackend,
    pub spreadsheet_id: Option<String>,
    pub sheets_api_key: Option<String>,
    pub sheets_access_token: Option<String>,
    pub sheets_base_url: String,
    pub sheets_timeout: Duration,
    pub worksheets: Worksheets,
    pub goal: PageGoal,
    pub write_mode: WriteMode,
    pub admin_password: Option<String>,
    pub cors_origin: Option<String>,
    pub display: DisplayConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // --- Load Server Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = non_empty("CORS_ORIGIN");

        // --- Load Store Settings ---
        let store_backend = match var_or("STORE_BACKEND", "sheets").to_lowercase().as_str() {
            "sheets" => StoreBackend::Sheets,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORE_BACKEND".to_string(),
                    format!("'{}' is not one of: sheets, memory", other),
                ))
            }
        };

        let spreadsheet_id = non_empty("SHEETS_SPREADSHEET_ID");
        if store_backend == StoreBackend::Sheets && spreadsheet_id.is_none() {
            return Err(ConfigError::MissingVar("SHEETS_SPREADSHEET_ID".to_string()));
        }
        let sheets_api_key = non_empty("SHEETS_API_KEY");
        let sheets_access_token = non_empty("SHEETS_ACCESS_TOKEN");
        let sheets_base_url = var_or("SHEETS_BASE_URL", DEFAULT_SHEETS_BASE_URL);

        let timeout_str = var_or("SHEETS_TIMEOUT_SECS", "30");
        let sheets_timeout = timeout_str
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue("SHEETS_TIMEOUT_SECS".to_string(), e.to_string()))?;

        let defaults = Worksheets::default();
        let worksheets = Worksheets {
            study: non_empty("STUDY_WORKSHEET").unwrap_or(defaults.study),
            comments: non_empty("COMMENTS_WORKSHEET").unwrap_or(defaults.comments),
        };

        let write_mode = match var_or("WRITE_MODE", "overwrite").to_lowercase().as_str() {
            "overwrite" => WriteMode::Overwrite,
            "append" => WriteMode::Append,
            other => {
                return Err(ConfigError::InvalidValue(
                    "WRITE_MODE".to_string(),
                    format!("'{}' is not one of: overwrite, append", other),
                ))
            }
        };

        // --- Load Dashboard Settings ---
        let goal_str = var_or("GOAL_PAGES", &PageGoal::DEFAULT_PAGES.to_string());
        let goal = goal_str
            .parse::<f64>()
            .ok()
            .and_then(PageGoal::new)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "GOAL_PAGES".to_string(),
                    format!("'{}' is not a positive number", goal_str),
                )
            })?;

        let admin_password = non_empty("ADMIN_PASSWORD");

        let display = DisplayConfig {
            site_title: var_or("SITE_TITLE", "Study Tracker"),
            book_title: var_or("BOOK_TITLE", ""),
            book_author: var_or("BOOK_AUTHOR", ""),
        };

        Ok(Self {
            bind_address,
            log_level,
            store_backend,
            spreadsheet_id,
            sheets_api_key,
            sheets_access_token,
            sheets_base_url,
            sheets_timeout,
            worksheets,
            goal,
            write_mode,
            admin_password,
            cors_origin,
            display,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn memory_backend_needs_nothing_else() {
        let config = load(&[("STORE_BACKEND", "memory")]).unwrap();

        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.goal.pages(), 560.0);
        assert_eq!(config.write_mode, WriteMode::Overwrite);
        assert_eq!(config.worksheets, Worksheets::default());
        assert_eq!(config.bind_address.port(), 3000);
        assert!(config.admin_password.is_none());
    }

    #[test]
    fn sheets_backend_requires_spreadsheet_id() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(v) if v == "SHEETS_SPREADSHEET_ID"));
    }

    #[test]
    fn goal_must_be_positive() {
        for bad in ["0", "-3", "lots"] {
            let err = load(&[("STORE_BACKEND", "memory"), ("GOAL_PAGES", bad)]).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(v, _) if v == "GOAL_PAGES"));
        }
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("SHEETS_SPREADSHEET_ID", "abc123"),
            ("GOAL_PAGES", "526"),
            ("WRITE_MODE", "append"),
            ("STUDY_WORKSHEET", "Log"),
            ("ADMIN_PASSWORD", "hunter2"),
            ("BOOK_TITLE", "Stochastic Calculus for Finance II"),
        ])
        .unwrap();

        assert_eq!(config.spreadsheet_id.as_deref(), Some("abc123"));
        assert_eq!(config.goal.pages(), 526.0);
        assert_eq!(config.write_mode, WriteMode::Append);
        assert_eq!(config.worksheets.study, "Log");
        assert_eq!(config.worksheets.comments, "Comments");
        assert_eq!(config.admin_password.as_deref(), Some("hunter2"));
        assert_eq!(config.display.book_title, "Stochastic Calculus for Finance II");
    }

    #[test]
    fn unknown_write_mode_is_rejected() {
        let err = load(&[("STORE_BACKEND", "memory"), ("WRITE_MODE", "merge")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(v, _) if v == "WRITE_MODE"));
    }
}
