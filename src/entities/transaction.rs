//! Transaction entity - An immutable record of a single trade execution.
//!
//! Each transaction carries the instrument identity, the trade economics and the
//! itemized costs. Cost columns are zero when they do not apply. `net_amount` is
//! signed: positive when the customer receives money, negative when they pay.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Exchange ticker, e.g. `"2330"`
    pub stock_code: String,
    /// Display name of the instrument
    pub stock_name: String,
    /// Date the trade was executed
    pub trade_date: Date,
    /// Date the trade is due to clear
    pub settlement_date: Option<Date>,
    /// Trade action, one of the configured transaction types
    pub transaction_type: String,
    /// Number of shares
    pub quantity: i64,
    /// Price per share
    pub price: f64,
    /// Gross trade value
    pub transaction_amount: f64,
    /// Brokerage fee
    pub fee: f64,
    /// Transaction tax
    pub tax: f64,
    /// Securities transaction tax
    pub securities_tax: f64,
    /// Supplementary health insurance premium
    pub health_insurance: f64,
    /// Margin deposit
    pub margin: f64,
    /// Financed amount or short-sale collateral
    pub financing_amount: f64,
    /// Financing interest
    pub interest: f64,
    /// Securities borrowing fee
    pub borrowing_fee: f64,
    /// Signed amount settled to or from the account
    pub net_amount: f64,
    /// ISO-like currency code
    pub currency: String,
    /// When the record was entered
    pub created_at: DateTimeUtc,
}

/// Transactions are referenced from settlements through an encoded id list,
/// so there is no foreign-key relation to declare.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
