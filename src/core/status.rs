//! Settlement status taxonomy.
//!
//! Rows written by older versions of the application carry other spellings
//! (`pending`, `completed`, and the Chinese UI labels). Those are normalized
//! once, when a row is read, so everything above the entity layer only ever sees
//! [`SettlementStatus`].

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Lifecycle state of a settlement.
///
/// New settlements start in a state derived from the settlement date; every later
/// transition is an explicit user edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    /// Funds have not cleared yet
    #[default]
    Unsettled,
    /// Funds have cleared
    Settled,
    /// Settlement failed; no automatic recovery
    Failed,
}

impl SettlementStatus {
    /// Canonical string stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unsettled => "unsettled",
            Self::Settled => "settled",
            Self::Failed => "failed",
        }
    }

    /// Maps any known spelling, current or legacy, to a status.
    #[must_use]
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "unsettled" | "pending" => return Some(Self::Unsettled),
            "settled" | "completed" => return Some(Self::Settled),
            "failed" => return Some(Self::Failed),
            _ => {}
        }
        match trimmed {
            "未交割" | "待處理" => Some(Self::Unsettled),
            "已交割" | "已完成" => Some(Self::Settled),
            "失敗" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Reads a stored status column. Unknown or blank values read as
    /// [`SettlementStatus::Unsettled`].
    #[must_use]
    pub fn from_stored(raw: &str) -> Self {
        Self::normalize(raw).unwrap_or_else(|| {
            if !raw.trim().is_empty() {
                tracing::warn!("Unknown stored settlement status {:?}, reading as unsettled", raw);
            }
            Self::Unsettled
        })
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettlementStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::normalize(s).ok_or_else(|| Error::Validation {
            message: format!("Unknown settlement status: {s}"),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_current_taxonomy_round_trips() {
        for status in [
            SettlementStatus::Unsettled,
            SettlementStatus::Settled,
            SettlementStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<SettlementStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_legacy_spellings_normalize() {
        assert_eq!(
            SettlementStatus::normalize("pending"),
            Some(SettlementStatus::Unsettled)
        );
        assert_eq!(
            SettlementStatus::normalize("Completed"),
            Some(SettlementStatus::Settled)
        );
        assert_eq!(
            SettlementStatus::normalize("待處理"),
            Some(SettlementStatus::Unsettled)
        );
        assert_eq!(
            SettlementStatus::normalize("已完成"),
            Some(SettlementStatus::Settled)
        );
        assert_eq!(
            SettlementStatus::normalize("未交割"),
            Some(SettlementStatus::Unsettled)
        );
        assert_eq!(
            SettlementStatus::normalize("已交割"),
            Some(SettlementStatus::Settled)
        );
        assert_eq!(
            SettlementStatus::normalize(" 失敗 "),
            Some(SettlementStatus::Failed)
        );
    }

    #[test]
    fn test_unknown_stored_value_reads_as_unsettled() {
        assert_eq!(
            SettlementStatus::from_stored("garbage"),
            SettlementStatus::Unsettled
        );
        assert_eq!(SettlementStatus::from_stored(""), SettlementStatus::Unsettled);
    }

    #[test]
    fn test_unknown_input_is_validation_error() {
        let result = "archived".parse::<SettlementStatus>();
        assert!(matches!(result, Err(Error::Validation { message: _ })));
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&SettlementStatus::Settled).unwrap();
        assert_eq!(json, "\"settled\"");
    }
}
