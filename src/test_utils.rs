//! Shared test utilities for `BrokerBook`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test records with sensible defaults.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use crate::{
    config::LedgerConfig,
    core::{
        bank_account,
        settlement::SettlementRecord,
        status::SettlementStatus,
        transaction::NewTransaction,
    },
    entities::{self, settlement, transaction},
    errors::Result,
};
use chrono::{NaiveDate, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Parses a `YYYY-MM-DD` literal.
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("test date literal")
}

/// Builds an unsaved transaction model.
///
/// # Defaults
/// * `stock_code`: "2330"
/// * `transaction_type`: "buy" (if `net_amount` is negative) or "sell"
/// * `quantity`: 1, every cost field 0
/// * `currency`: "TWD"
pub fn sample_transaction(id: i64, trade_date: &str, net_amount: f64) -> transaction::Model {
    let transaction_type = if net_amount < 0.0 { "buy" } else { "sell" };
    transaction::Model {
        id,
        stock_code: "2330".to_string(),
        stock_name: "TSMC".to_string(),
        trade_date: date(trade_date),
        settlement_date: None,
        transaction_type: transaction_type.to_string(),
        quantity: 1,
        price: 0.0,
        transaction_amount: 0.0,
        fee: 0.0,
        tax: 0.0,
        securities_tax: 0.0,
        health_insurance: 0.0,
        margin: 0.0,
        financing_amount: 0.0,
        interest: 0.0,
        borrowing_fee: 0.0,
        net_amount,
        currency: "TWD".to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    }
}

/// Builds an in-memory settlement record linking `transaction_ids`.
///
/// # Defaults
/// * `bank_account_id`: 1
/// * `settlement_date`: 2025-01-04
/// * `settlement_amount`: 0.0
/// * `status`: unsettled
pub fn sample_record(id: i64, transaction_ids: &[i64]) -> SettlementRecord {
    let created_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    SettlementRecord {
        id,
        transaction_ids: transaction_ids.to_vec(),
        bank_account_id: Some(1),
        settlement_date: date("2025-01-04"),
        trade_date: None,
        settlement_amount: 0.0,
        twd_amount: None,
        status: SettlementStatus::Unsettled,
        notes: None,
        created_at,
        updated_at: created_at,
    }
}

/// Builds a valid `NewTransaction` for `stock_code`.
pub fn test_new_transaction(stock_code: &str, trade_date: &str, net_amount: f64) -> NewTransaction {
    NewTransaction {
        stock_code: stock_code.to_string(),
        stock_name: format!("Stock {stock_code}"),
        trade_date: date(trade_date),
        transaction_type: "buy".to_string(),
        quantity: 1000,
        price: 10.0,
        net_amount,
        ..Default::default()
    }
}

/// Creates a savings account in TWD at `bank_name`.
pub async fn create_test_bank_account(
    db: &DatabaseConnection,
    bank_name: &str,
) -> Result<entities::bank_account::Model> {
    bank_account::create_bank_account(
        db,
        bank_name.to_string(),
        "000-123456".to_string(),
        "savings".to_string(),
        0.0,
        None,
        &LedgerConfig::default(),
    )
    .await
}

/// Sets up a complete test environment with a bank account.
/// Returns (db, bank account) for settlement tests.
pub async fn setup_with_bank_account()
-> Result<(DatabaseConnection, entities::bank_account::Model)> {
    let db = setup_test_db().await?;
    let bank = create_test_bank_account(&db, "Test Bank").await?;
    Ok((db, bank))
}

/// Inserts a transaction with a fixed id so tests can refer to it by number.
pub async fn create_transaction_with_id(
    db: &DatabaseConnection,
    id: i64,
    trade_date: &str,
    net_amount: f64,
) -> Result<transaction::Model> {
    let model: transaction::ActiveModel = sample_transaction(id, trade_date, net_amount).into();
    let mut model = model.reset_all();
    model.created_at = Set(Utc::now());
    Ok(model.insert(db).await?)
}

/// Inserts a settlement row as an older version of the application would have
/// written it, bypassing validation.
pub async fn insert_raw_settlement(
    db: &DatabaseConnection,
    bank_account_id: i64,
    settlement_date: &str,
    settlement_amount: f64,
    status: &str,
    legacy_transaction_id: Option<i64>,
    transaction_ids: Option<&str>,
) -> Result<settlement::Model> {
    let now = Utc::now();
    let model = settlement::ActiveModel {
        transaction_id: Set(legacy_transaction_id),
        transaction_ids: Set(transaction_ids.map(String::from)),
        bank_account_id: Set(Some(bank_account_id)),
        settlement_date: Set(date(settlement_date)),
        trade_date: Set(None),
        settlement_amount: Set(settlement_amount),
        twd_amount: Set(None),
        status: Set(status.to_string()),
        notes: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}
