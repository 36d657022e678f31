//! Basketball statistics scraping and fantasy scoring
//!
//! Pulls tables from basketball-reference style pages, normalizes them into
//! typed records and derives per-game fantasy features.

pub mod data;
pub mod features;
pub mod league;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use data::scrapers::RetryPolicy;

/// Which part of the season a table row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeasonType {
    Regular,
    Playoff,
}

impl SeasonType {
    /// Column name used when regular and playoff tables are concatenated
    pub const COLUMN: &'static str = "Season Type";

    pub fn label(&self) -> &'static str {
        match self {
            SeasonType::Regular => "Regular",
            SeasonType::Playoff => "Playoff",
        }
    }

    /// Value of the `data-soc-sum-phase-type` attribute on summary tables
    pub fn phase_attr(&self) -> &'static str {
        match self {
            SeasonType::Regular => "reg",
            SeasonType::Playoff => "post",
        }
    }

    /// Suffix of the game log table id (`player_game_log_reg`)
    pub fn game_log_suffix(&self) -> &'static str {
        self.phase_attr()
    }
}

impl fmt::Display for SeasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum HoopsError {
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No table matched {selector}")]
    TableNotFound { selector: String },

    #[error("Malformed result string: {value:?}")]
    MalformedResult { value: String },

    #[error("Malformed duration: {value:?}")]
    MalformedDuration { value: String },

    #[error("Column {column} holds non-numeric value {value:?}")]
    TypeCoercion { column: String, value: String },

    #[error("Division by zero: {column} is 0")]
    DivisionByZero { column: String },

    #[error("Unknown team: {0}")]
    UnknownTeam(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl HoopsError {
    /// Transport-level failures that the retry loop may try again
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, HoopsError::Fetch { .. } | HoopsError::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, HoopsError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub scrape: ScrapeConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_secs: f64,
}

impl ScrapeConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            min_delay: Duration::from_millis(self.min_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms.max(self.min_delay_ms)),
            backoff_secs: self.backoff_secs,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub cache_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scrape: ScrapeConfig {
                base_url: "https://www.basketball-reference.com".to_string(),
                user_agent: "hoopstats/0.1".to_string(),
                timeout_secs: 30,
                max_attempts: 2,
                min_delay_ms: 500,
                max_delay_ms: 1000,
                backoff_secs: 0.8,
            },
            data: DataConfig {
                database_path: "data/nba.db".to_string(),
                cache_dir: None,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HoopsError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| HoopsError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HoopsError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
