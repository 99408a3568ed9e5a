//! Settlement business logic - Persists settlements and enforces exclusive linking.
//!
//! Writes go through [`reconcile::validate_and_build_settlement`] twice in effect:
//! callers may pre-check against their own snapshot, and every create or update
//! here reloads the settlements inside a database transaction and re-runs the
//! check before committing. Any error drops the transaction, so nothing partial is
//! written.

use crate::{
    core::{
        links::StoredLinks,
        reconcile::{self, NewSettlement, SettlementForm, SettlementStats},
        status::SettlementStatus,
    },
    entities::{BankAccount, Settlement, Transaction, bank_account, settlement, transaction},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use std::collections::HashMap;

/// A settlement as seen above the entity layer: links resolved, status normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementRecord {
    /// Unique identifier
    pub id: i64,
    /// Linked transactions in link order
    pub transaction_ids: Vec<i64>,
    /// Bank account the money flows through
    pub bank_account_id: Option<i64>,
    /// Date funds clear
    pub settlement_date: NaiveDate,
    /// Trade date, if known
    pub trade_date: Option<NaiveDate>,
    /// Signed settlement total
    pub settlement_amount: f64,
    /// Amount in home currency
    pub twd_amount: Option<f64>,
    /// Normalized status
    pub status: SettlementStatus,
    /// Free text
    pub notes: Option<String>,
    /// When the settlement was created
    pub created_at: DateTime<Utc>,
    /// When the settlement was last modified
    pub updated_at: DateTime<Utc>,
}

impl From<settlement::Model> for SettlementRecord {
    fn from(model: settlement::Model) -> Self {
        let transaction_ids =
            StoredLinks::from_columns(model.transaction_ids.as_deref(), model.transaction_id)
                .into_ids();
        Self {
            id: model.id,
            transaction_ids,
            bank_account_id: model.bank_account_id,
            settlement_date: model.settlement_date,
            trade_date: model.trade_date,
            settlement_amount: model.settlement_amount,
            twd_amount: model.twd_amount,
            status: SettlementStatus::from_stored(&model.status),
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Criteria for [`list_settlements`]. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementFilter {
    /// Only settlements through this bank account
    pub bank_account_id: Option<i64>,
    /// Settlement date on or after
    pub start_date: Option<NaiveDate>,
    /// Settlement date on or before
    pub end_date: Option<NaiveDate>,
    /// Only settlements in this status (legacy spellings included)
    pub status: Option<SettlementStatus>,
}

/// A listed settlement joined with its bank account and first linked trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementRow {
    /// The settlement itself
    #[serde(flatten)]
    pub settlement: SettlementRecord,
    /// Name of the bank, if the account still exists
    pub bank_name: Option<String>,
    /// Bank account number, if the account still exists
    pub account_number: Option<String>,
    /// Ticker of the first linked transaction
    pub stock_code: Option<String>,
    /// Instrument name of the first linked transaction
    pub stock_name: Option<String>,
}

/// Filtered settlements with the statistics computed over them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementListing {
    /// Matching settlements, newest settlement date first
    pub settlements: Vec<SettlementRow>,
    /// Pending and completed totals over `settlements`
    pub stats: SettlementStats,
}

/// Loads every settlement as a normalized snapshot.
pub async fn load_settlement_snapshot<C>(db: &C) -> Result<Vec<SettlementRecord>>
where
    C: ConnectionTrait,
{
    let models = Settlement::find()
        .order_by_asc(settlement::Column::Id)
        .all(db)
        .await?;
    Ok(models.into_iter().map(SettlementRecord::from).collect())
}

/// Retrieves every settlement, ordered by id.
pub async fn get_all_settlements(db: &DatabaseConnection) -> Result<Vec<SettlementRecord>> {
    load_settlement_snapshot(db).await
}

/// Retrieves a settlement by id, returning None if it does not exist.
pub async fn get_settlement_by_id(
    db: &DatabaseConnection,
    settlement_id: i64,
) -> Result<Option<SettlementRecord>> {
    Ok(Settlement::find_by_id(settlement_id)
        .one(db)
        .await?
        .map(SettlementRecord::from))
}

/// Lists settlements matching `filter`, newest settlement date first, with the
/// pending/completed statistics over the result.
///
/// Each row carries its bank account's name and number and the ticker of its first
/// linked transaction. The status filter is applied after normalization so rows
/// stored with legacy spellings still match.
pub async fn list_settlements(
    db: &DatabaseConnection,
    filter: &SettlementFilter,
) -> Result<SettlementListing> {
    let mut query = Settlement::find();
    if let Some(bank_account_id) = filter.bank_account_id {
        query = query.filter(settlement::Column::BankAccountId.eq(bank_account_id));
    }
    if let Some(start) = filter.start_date {
        query = query.filter(settlement::Column::SettlementDate.gte(start));
    }
    if let Some(end) = filter.end_date {
        query = query.filter(settlement::Column::SettlementDate.lte(end));
    }

    let joined: Vec<(SettlementRecord, Option<bank_account::Model>)> = query
        .order_by_desc(settlement::Column::SettlementDate)
        .order_by_desc(settlement::Column::CreatedAt)
        .find_also_related(BankAccount)
        .all(db)
        .await?
        .into_iter()
        .map(|(model, bank)| (SettlementRecord::from(model), bank))
        .filter(|(s, _)| filter.status.is_none_or(|status| s.status == status))
        .collect();

    let first_ids: Vec<i64> = joined
        .iter()
        .filter_map(|(s, _)| s.transaction_ids.first().copied())
        .collect();
    let first_trades: HashMap<i64, transaction::Model> = if first_ids.is_empty() {
        HashMap::new()
    } else {
        Transaction::find()
            .filter(transaction::Column::Id.is_in(first_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect()
    };

    let records: Vec<SettlementRecord> = joined.iter().map(|(s, _)| s.clone()).collect();
    let stats = reconcile::aggregate_stats(&records);

    let settlements: Vec<SettlementRow> = joined
        .into_iter()
        .map(|(settlement, bank)| {
            let trade = settlement
                .transaction_ids
                .first()
                .and_then(|id| first_trades.get(id));
            SettlementRow {
                stock_code: trade.map(|t| t.stock_code.clone()),
                stock_name: trade.map(|t| t.stock_name.clone()),
                bank_name: bank.as_ref().map(|b| b.bank_name.clone()),
                account_number: bank.map(|b| b.account_number),
                settlement,
            }
        })
        .collect();

    tracing::debug!(
        "Listed {} settlements (pending {}, completed {})",
        settlements.len(),
        stats.pending_amount,
        stats.completed_amount
    );

    Ok(SettlementListing { settlements, stats })
}

/// Transactions not linked to any settlement other than `exclude_settlement_id`.
pub async fn available_transactions(
    db: &DatabaseConnection,
    exclude_settlement_id: Option<i64>,
) -> Result<Vec<transaction::Model>> {
    let transactions = crate::core::transaction::get_all_transactions(db).await?;
    let settlements = load_settlement_snapshot(db).await?;

    Ok(
        reconcile::list_available_transactions(&transactions, &settlements, exclude_settlement_id)
            .into_iter()
            .cloned()
            .collect(),
    )
}

/// Validates the bank account and linked transactions referenced by a built settlement,
/// and returns the linked transactions.
async fn check_references<C>(db: &C, built: &NewSettlement) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    if BankAccount::find_by_id(built.bank_account_id)
        .one(db)
        .await?
        .is_none()
    {
        return Err(Error::validation(format!(
            "bank account {} does not exist",
            built.bank_account_id
        )));
    }

    if built.transaction_ids.is_empty() {
        return Ok(Vec::new());
    }

    let linked = Transaction::find()
        .filter(transaction::Column::Id.is_in(built.transaction_ids.clone()))
        .all(db)
        .await?;

    if let Some(missing) = built
        .transaction_ids
        .iter()
        .find(|id| !linked.iter().any(|t| t.id == **id))
    {
        return Err(Error::validation(format!(
            "transaction {missing} does not exist"
        )));
    }

    Ok(linked)
}

/// Creates a settlement.
///
/// Status is derived from the settlement date unless the form sets one. When
/// transactions are linked, the trade date is taken from the first of them.
///
/// # Errors
/// * [`Error::Validation`] - a required field is missing, or a referenced bank account
///   or transaction does not exist
/// * [`Error::Conflict`] - a proposed transaction is already linked elsewhere
pub async fn create_settlement(
    db: &DatabaseConnection,
    form: &SettlementForm,
    today: NaiveDate,
) -> Result<SettlementRecord> {
    form.validate_required()?;

    let txn = db.begin().await?;

    let snapshot = load_settlement_snapshot(&txn).await?;
    let mut built = reconcile::validate_and_build_settlement(form, &snapshot, None, today)?;
    let linked = check_references(&txn, &built).await?;
    built.trade_date =
        reconcile::derive_trade_date(&built.transaction_ids, &linked, built.trade_date);

    let now = Utc::now();
    let model = settlement::ActiveModel {
        transaction_id: Set(None),
        transaction_ids: Set(built.encoded_links()),
        bank_account_id: Set(Some(built.bank_account_id)),
        settlement_date: Set(built.settlement_date),
        trade_date: Set(built.trade_date),
        settlement_amount: Set(built.settlement_amount),
        twd_amount: Set(built.twd_amount),
        status: Set(built.status.as_str().to_string()),
        notes: Set(built.notes),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let result = model.insert(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        "Created settlement {} ({} linked transactions, status {})",
        result.id,
        built.transaction_ids.len(),
        built.status
    );
    Ok(SettlementRecord::from(result))
}

/// Updates a settlement, re-validating exclusivity against every other settlement.
///
/// The stored status is kept unless the form sets one. The trade date is re-derived
/// only when the first linked transaction changes. The legacy single-link column is
/// cleared on every write.
///
/// # Errors
/// * [`Error::SettlementNotFound`] - no settlement with `settlement_id`
/// * [`Error::Validation`] / [`Error::Conflict`] - as for [`create_settlement`]
pub async fn update_settlement(
    db: &DatabaseConnection,
    settlement_id: i64,
    form: &SettlementForm,
    today: NaiveDate,
) -> Result<SettlementRecord> {
    form.validate_required()?;

    let txn = db.begin().await?;

    let existing = Settlement::find_by_id(settlement_id)
        .one(&txn)
        .await?
        .ok_or(Error::SettlementNotFound { id: settlement_id })?;
    let previous_first = SettlementRecord::from(existing.clone())
        .transaction_ids
        .first()
        .copied();

    let snapshot = load_settlement_snapshot(&txn).await?;
    let mut built =
        reconcile::validate_and_build_settlement(form, &snapshot, Some(settlement_id), today)?;
    let linked = check_references(&txn, &built).await?;
    if built.transaction_ids.first().copied() != previous_first {
        built.trade_date =
            reconcile::derive_trade_date(&built.transaction_ids, &linked, built.trade_date);
    }

    let mut model: settlement::ActiveModel = existing.into();
    model.transaction_id = Set(None);
    model.transaction_ids = Set(built.encoded_links());
    model.bank_account_id = Set(Some(built.bank_account_id));
    model.settlement_date = Set(built.settlement_date);
    model.trade_date = Set(built.trade_date);
    model.settlement_amount = Set(built.settlement_amount);
    model.twd_amount = Set(built.twd_amount);
    model.status = Set(built.status.as_str().to_string());
    model.notes = Set(built.notes);
    model.updated_at = Set(Utc::now());

    let result = model.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        "Updated settlement {} ({} linked transactions, status {})",
        result.id,
        built.transaction_ids.len(),
        built.status
    );
    Ok(SettlementRecord::from(result))
}

/// Deletes a settlement and returns it. Its linked transactions become available
/// again.
pub async fn delete_settlement(
    db: &DatabaseConnection,
    settlement_id: i64,
) -> Result<SettlementRecord> {
    let existing = Settlement::find_by_id(settlement_id)
        .one(db)
        .await?
        .ok_or(Error::SettlementNotFound { id: settlement_id })?;

    let record = SettlementRecord::from(existing.clone());
    existing.delete(db).await?;

    tracing::info!(
        "Deleted settlement {}, released transactions {:?}",
        settlement_id,
        record.transaction_ids
    );
    Ok(record)
}

/// Copies the legacy single `transaction_id` into the list column for rows that have
/// no list yet. Safe to run on every start; returns the number of rows migrated.
pub async fn migrate_legacy_links(db: &DatabaseConnection) -> Result<u64> {
    let candidates = Settlement::find()
        .filter(settlement::Column::TransactionId.is_not_null())
        .all(db)
        .await?;

    let mut migrated = 0;
    for model in candidates {
        let has_list = model
            .transaction_ids
            .as_deref()
            .is_some_and(|raw| !raw.trim().is_empty());
        let Some(legacy_id) = model.transaction_id else {
            continue;
        };
        if has_list {
            continue;
        }

        let mut active: settlement::ActiveModel = model.into();
        active.transaction_ids = Set(crate::core::links::encode_links(&[legacy_id]));
        active.update(db).await?;
        migrated += 1;
    }

    if migrated > 0 {
        tracing::info!(
            "Migrated {} settlements from transaction_id to transaction_ids",
            migrated
        );
    }
    Ok(migrated)
}
