//! Persisted representation of a settlement's linked transactions.
//!
//! Current rows store an ordered JSON array in `transaction_ids`. Rows from before
//! multi-select only have the singular `transaction_id`. [`StoredLinks`] captures
//! which of the two a row actually carries, and is resolved to a plain id list in
//! one place.

use crate::errors::{Error, Result};

/// Link data as found in a settlement row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredLinks {
    /// Ordered ids from the JSON list column
    List(Vec<i64>),
    /// Single id from the legacy column
    Legacy(i64),
    /// Nothing linked
    Unlinked,
}

impl StoredLinks {
    /// Builds the link data from the two settlement columns.
    ///
    /// The list column wins when it parses. An unparseable list is logged and the
    /// legacy column is used instead.
    #[must_use]
    pub fn from_columns(list: Option<&str>, legacy: Option<i64>) -> Self {
        let fallback = || legacy.map_or(Self::Unlinked, Self::Legacy);

        match list.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => match decode_links(raw) {
                Ok(ids) => Self::List(ids),
                Err(e) => {
                    tracing::warn!("{}; falling back to legacy transaction_id", e);
                    fallback()
                }
            },
            None => fallback(),
        }
    }

    /// Flattens to an ordered id list.
    #[must_use]
    pub fn into_ids(self) -> Vec<i64> {
        match self {
            Self::List(ids) => ids,
            Self::Legacy(id) => vec![id],
            Self::Unlinked => Vec::new(),
        }
    }
}

/// Parses the JSON list column.
pub fn decode_links(raw: &str) -> Result<Vec<i64>> {
    serde_json::from_str(raw).map_err(|e| Error::LegacyFormat {
        raw: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Encodes ids for the JSON list column. An empty list is stored as `NULL`.
#[must_use]
pub fn encode_links(ids: &[i64]) -> Option<String> {
    if ids.is_empty() {
        return None;
    }
    // Serializing a slice of integers cannot fail.
    serde_json::to_string(ids).ok()
}
