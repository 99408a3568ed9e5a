//! Settlement entity - Funds clearing through a bank account.
//!
//! Linked transactions are stored as a JSON array in `transaction_ids`. Older rows
//! may only carry the singular `transaction_id`; see [`crate::core::links`] for how
//! the two are reconciled at read time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Settlement database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    /// Unique identifier for the settlement
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Legacy single linked transaction, kept for old rows
    pub transaction_id: Option<i64>,
    /// JSON array of linked transaction ids, `None` when nothing is linked
    pub transaction_ids: Option<String>,
    /// Bank account the money flows through
    pub bank_account_id: Option<i64>,
    /// Date funds clear
    pub settlement_date: Date,
    /// Trade date of the first linked transaction, or entered by hand
    pub trade_date: Option<Date>,
    /// Signed settlement total; non-negative is owed by the account
    pub settlement_amount: f64,
    /// Amount converted to the home currency, if known
    pub twd_amount: Option<f64>,
    /// Stored status string; normalized by [`crate::core::status::SettlementStatus`]
    pub status: String,
    /// Free text
    pub notes: Option<String>,
    /// When the settlement was created
    pub created_at: DateTimeUtc,
    /// When the settlement was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Settlement and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each settlement flows through one bank account
    #[sea_orm(
        belongs_to = "super::bank_account::Entity",
        from = "Column::BankAccountId",
        to = "super::bank_account::Column::Id"
    )]
    BankAccount,
}

impl Related<super::bank_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankAccount.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
