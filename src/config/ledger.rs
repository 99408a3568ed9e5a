//! Application configuration loading from config.toml
//!
//! The `[ledger]` table carries the option lists (transaction types, account types)
//! that validation checks against. They are owned by the caller and passed into the
//! stores explicitly. A missing config file falls back to the defaults below.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Bookkeeping options
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// HTTP server settings
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address the REST API listens on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

/// Bookkeeping options injected into validation
#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Currency used when a record does not name one
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// Days between trade date and settlement date when a trade omits the latter
    #[serde(default = "default_settlement_lag_days")]
    pub settlement_lag_days: u64,
    /// Accepted values for `transaction_type`
    #[serde(default = "default_transaction_types")]
    pub transaction_types: Vec<String>,
    /// Accepted values for `account_type`
    #[serde(default = "default_account_types")]
    pub account_types: Vec<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_currency: default_currency(),
            settlement_lag_days: default_settlement_lag_days(),
            transaction_types: default_transaction_types(),
            account_types: default_account_types(),
        }
    }
}

impl LedgerConfig {
    /// Whether `transaction_type` is one of the configured trade actions.
    #[must_use]
    pub fn is_known_transaction_type(&self, transaction_type: &str) -> bool {
        self.transaction_types.iter().any(|t| t == transaction_type)
    }

    /// Whether `account_type` is one of the configured account kinds.
    #[must_use]
    pub fn is_known_account_type(&self, account_type: &str) -> bool {
        self.account_types.iter().any(|t| t == account_type)
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:3001".to_string()
}

fn default_currency() -> String {
    "TWD".to_string()
}

const fn default_settlement_lag_days() -> u64 {
    2
}

fn default_transaction_types() -> Vec<String> {
    [
        "buy",
        "sell",
        "margin_buy",
        "margin_sell",
        "short_sell",
        "short_cover",
        "day_trade_buy",
        "day_trade_sell",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_account_types() -> Vec<String> {
    ["savings", "checking", "settlement"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Loads application configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A field has the wrong type
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })
}

/// Loads configuration from `BROKERBOOK_CONFIG` (default `./config.toml`).
///
/// A missing file is not an error; the built-in defaults are used instead.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path =
        std::env::var("BROKERBOOK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    if !Path::new(&path).exists() {
        tracing::info!("No configuration file at {}, using defaults", path);
        return Ok(AppConfig::default());
    }

    let config = load_config(&path)?;
    tracing::info!(
        "Loaded configuration from {} ({} transaction types, {} account types)",
        path,
        config.ledger.transaction_types.len(),
        config.ledger.account_types.len()
    );
    Ok(config)
}
