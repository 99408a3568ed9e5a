//! Bank account entity - The accounts settlement money flows through.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bank account database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_accounts")]
pub struct Model {
    /// Unique identifier for the bank account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the bank
    pub bank_name: String,
    /// Account number as printed by the bank
    pub account_number: String,
    /// Kind of account, one of the configured account types
    pub account_type: String,
    /// Current balance
    pub balance: f64,
    /// ISO-like currency code, e.g. `"TWD"`
    pub currency: String,
    /// When the account was registered
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `BankAccount` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One bank account has many settlements
    #[sea_orm(has_many = "super::settlement::Entity")]
    Settlements,
}

impl Related<super::settlement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Settlements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
