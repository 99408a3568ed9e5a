/// Database configuration and connection management
pub mod database;

/// Application and ledger option configuration from config.toml
pub mod ledger;

pub use ledger::{AppConfig, LedgerConfig, ServerConfig};
