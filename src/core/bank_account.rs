//! Bank account business logic.

use crate::{
    config::LedgerConfig,
    entities::{BankAccount, bank_account},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};

/// Creates a bank account.
///
/// `account_type` must be one of the configured account types. A blank currency falls
/// back to the configured default.
pub async fn create_bank_account(
    db: &DatabaseConnection,
    bank_name: String,
    account_number: String,
    account_type: String,
    balance: f64,
    currency: Option<String>,
    config: &LedgerConfig,
) -> Result<bank_account::Model> {
    let bank_name = bank_name.trim().to_string();
    let account_number = account_number.trim().to_string();
    if bank_name.is_empty() {
        return Err(Error::validation("bank name required"));
    }
    if account_number.is_empty() {
        return Err(Error::validation("account number required"));
    }
    if !config.is_known_account_type(&account_type) {
        return Err(Error::validation(format!(
            "unknown account type '{}', expected one of: {}",
            account_type,
            config.account_types.join(", ")
        )));
    }
    if !balance.is_finite() {
        return Err(Error::validation(format!(
            "balance must be a finite number, got {balance}"
        )));
    }

    let currency = currency
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| config.default_currency.clone());

    let model = bank_account::ActiveModel {
        bank_name: Set(bank_name),
        account_number: Set(account_number),
        account_type: Set(account_type),
        balance: Set(balance),
        currency: Set(currency),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let result = model.insert(db).await?;
    tracing::info!(
        "Created bank account {} ({} {})",
        result.id,
        result.bank_name,
        result.account_number
    );
    Ok(result)
}

/// Retrieves a bank account by id, returning None if it does not exist.
pub async fn get_bank_account_by_id(
    db: &DatabaseConnection,
    bank_account_id: i64,
) -> Result<Option<bank_account::Model>> {
    BankAccount::find_by_id(bank_account_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all bank accounts ordered by bank name.
pub async fn get_all_bank_accounts(db: &DatabaseConnection) -> Result<Vec<bank_account::Model>> {
    BankAccount::find()
        .order_by_asc(bank_account::Column::BankName)
        .order_by_asc(bank_account::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
