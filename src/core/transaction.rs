//! Transaction business logic - Records trade executions and looks them up for linking.
//!
//! Transactions are immutable once entered. Settlements only reference them by id,
//! so nothing here touches settlement rows.

use crate::{
    config::LedgerConfig,
    entities::{Transaction, transaction},
    errors::{Error, Result},
};
use chrono::{Days, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};

/// A trade to record. Cost fields default to zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTransaction {
    /// Exchange ticker
    pub stock_code: String,
    /// Display name of the instrument
    pub stock_name: String,
    /// Date the trade was executed
    pub trade_date: NaiveDate,
    /// Clearing date; trade date plus the configured lag when omitted
    pub settlement_date: Option<NaiveDate>,
    /// One of the configured transaction types
    pub transaction_type: String,
    /// Number of shares
    pub quantity: i64,
    /// Price per share
    pub price: f64,
    /// Gross trade value; quantity times price when omitted
    pub transaction_amount: Option<f64>,
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
    /// Signed amount settled to (positive) or from (negative) the account
    pub net_amount: f64,
    /// Currency code; the configured default when omitted
    pub currency: Option<String>,
}

impl NewTransaction {
    fn validate(&self, config: &LedgerConfig) -> Result<()> {
        if self.stock_code.trim().is_empty() {
            return Err(Error::validation("stock code required"));
        }
        if self.stock_name.trim().is_empty() {
            return Err(Error::validation("stock name required"));
        }
        if !config.is_known_transaction_type(&self.transaction_type) {
            return Err(Error::validation(format!(
                "unknown transaction type '{}', expected one of: {}",
                self.transaction_type,
                config.transaction_types.join(", ")
            )));
        }
        if self.quantity <= 0 {
            return Err(Error::validation(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }

        let costs = [
            ("price", Some(self.price)),
            ("transaction amount", self.transaction_amount),
            ("fee", Some(self.fee)),
            ("tax", Some(self.tax)),
            ("securities tax", Some(self.securities_tax)),
            ("health insurance", Some(self.health_insurance)),
            ("margin", Some(self.margin)),
            ("financing amount", Some(self.financing_amount)),
            ("interest", Some(self.interest)),
            ("borrowing fee", Some(self.borrowing_fee)),
        ];
        for (field, value) in costs {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(Error::validation(format!(
                        "{field} must be a non-negative number, got {v}"
                    )));
                }
            }
        }

        if !self.net_amount.is_finite() {
            return Err(Error::validation(format!(
                "net amount must be a finite number, got {}",
                self.net_amount
            )));
        }
        Ok(())
    }
}

/// Filter for [`list_transactions`]. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Trade date on or after
    pub start_date: Option<NaiveDate>,
    /// Trade date on or before
    pub end_date: Option<NaiveDate>,
    /// Substring of the stock code
    pub stock_code: Option<String>,
}

/// Records a trade.
///
/// # Errors
/// [`Error::Validation`] when a required field is blank, the type is not configured,
/// the quantity is not positive, or an amount is not a valid number.
pub async fn create_transaction(
    db: &DatabaseConnection,
    new: NewTransaction,
    config: &LedgerConfig,
) -> Result<transaction::Model> {
    new.validate(config)?;

    let settlement_date = match new.settlement_date {
        Some(date) => date,
        None => new
            .trade_date
            .checked_add_days(Days::new(config.settlement_lag_days))
            .ok_or_else(|| Error::validation("settlement date out of range"))?,
    };
    #[allow(clippy::cast_precision_loss)]
    let transaction_amount = new
        .transaction_amount
        .unwrap_or(new.quantity as f64 * new.price);
    let currency = new
        .currency
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| config.default_currency.clone());

    let model = transaction::ActiveModel {
        stock_code: Set(new.stock_code.trim().to_string()),
        stock_name: Set(new.stock_name.trim().to_string()),
        trade_date: Set(new.trade_date),
        settlement_date: Set(Some(settlement_date)),
        transaction_type: Set(new.transaction_type),
        quantity: Set(new.quantity),
        price: Set(new.price),
        transaction_amount: Set(transaction_amount),
        fee: Set(new.fee),
        tax: Set(new.tax),
        securities_tax: Set(new.securities_tax),
        health_insurance: Set(new.health_insurance),
        margin: Set(new.margin),
        financing_amount: Set(new.financing_amount),
        interest: Set(new.interest),
        borrowing_fee: Set(new.borrowing_fee),
        net_amount: Set(new.net_amount),
        currency: Set(currency),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let result = model.insert(db).await?;
    tracing::info!(
        "Recorded {} {} x{} on {} (net {})",
        result.transaction_type,
        result.stock_code,
        result.quantity,
        result.trade_date,
        result.net_amount
    );
    Ok(result)
}

/// Retrieves a transaction by id, returning None if it does not exist.
pub async fn get_transaction_by_id(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<Option<transaction::Model>> {
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves transactions in the order of `ids`. Unknown ids are skipped.
pub async fn get_transactions_by_ids<C>(db: &C, ids: &[i64]) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let found = Transaction::find()
        .filter(transaction::Column::Id.is_in(ids.to_vec()))
        .all(db)
        .await?;

    Ok(ids
        .iter()
        .filter_map(|id| found.iter().find(|t| t.id == *id).cloned())
        .collect())
}

/// Retrieves every transaction, ordered by id.
pub async fn get_all_transactions(db: &DatabaseConnection) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists transactions matching `filter`, newest trade first.
pub async fn list_transactions(
    db: &DatabaseConnection,
    filter: &TransactionFilter,
) -> Result<Vec<transaction::Model>> {
    let mut query = Transaction::find();
    if let Some(start) = filter.start_date {
        query = query.filter(transaction::Column::TradeDate.gte(start));
    }
    if let Some(end) = filter.end_date {
        query = query.filter(transaction::Column::TradeDate.lte(end));
    }
    if let Some(code) = filter
        .stock_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        query = query.filter(transaction::Column::StockCode.contains(code));
    }

    query
        .order_by_desc(transaction::Column::TradeDate)
        .order_by_desc(transaction::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}
