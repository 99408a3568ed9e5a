//! Unified error type for the ledger.
//!
//! Every fallible operation in the crate returns [`Result`]. Validation and
//! conflict errors are raised before anything is written; database errors are
//! wrapped as-is.

use sea_orm::DbErr;
use thiserror::Error;

/// All errors produced by the ledger.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field is missing or an input value cannot be normalized
    #[error("Validation error: {message}")]
    Validation {
        /// User-facing description of the problem
        message: String,
    },

    /// One or more proposed transactions are already linked to another settlement
    #[error("Transactions already linked to another settlement: {}", join_ids(.transaction_ids))]
    Conflict {
        /// Every conflicting transaction id, in proposal order
        transaction_ids: Vec<i64>,
    },

    /// No settlement with this id
    #[error("Settlement not found: {id}")]
    SettlementNotFound {
        /// Requested settlement id
        id: i64,
    },

    /// No transaction with this id
    #[error("Transaction not found: {id}")]
    TransactionNotFound {
        /// Requested transaction id
        id: i64,
    },

    /// No bank account with this id
    #[error("Bank account not found: {id}")]
    BankAccountNotFound {
        /// Requested bank account id
        id: i64,
    },

    /// A stored link list could not be parsed; recovered from by reading the legacy column
    #[error("Unreadable stored link list {raw:?}: {reason}")]
    LegacyFormat {
        /// Raw column contents
        raw: String,
        /// Parser message
        reason: String,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_names_every_id() {
        let err = Error::Conflict {
            transaction_ids: vec![55, 56],
        };
        assert_eq!(
            err.to_string(),
            "Transactions already linked to another settlement: 55, 56"
        );
    }
}
