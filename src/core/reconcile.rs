//! Reconciliation rules for linking trade transactions to settlements.
//!
//! Everything here is pure and synchronous: callers hand in a snapshot of the
//! transactions and settlements they loaded, and persist whatever comes back. The
//! exclusivity check is a check against that snapshot only; the repository in
//! [`crate::core::settlement`] re-runs it inside a database transaction before
//! committing.

use crate::{
    core::{links, settlement::SettlementRecord, status::SettlementStatus},
    entities::transaction,
    errors::{Error, Result},
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Proposed settlement fields after boundary parsing. `None` means the field was
/// left blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementForm {
    /// Transactions to link, in selection order
    pub transaction_ids: Vec<i64>,
    /// Bank account the money flows through (required)
    pub bank_account_id: Option<i64>,
    /// Date funds clear (required)
    pub settlement_date: Option<NaiveDate>,
    /// Trade date, entered by hand or derived from the first linked transaction
    pub trade_date: Option<NaiveDate>,
    /// Signed settlement total (required)
    pub settlement_amount: Option<f64>,
    /// Amount in home currency
    pub twd_amount: Option<f64>,
    /// Explicit status; derived or kept when absent
    pub status: Option<SettlementStatus>,
    /// Free text
    pub notes: Option<String>,
}

impl SettlementForm {
    /// Checks the fields that can be validated without looking at any other record.
    pub fn validate_required(&self) -> Result<()> {
        if self.bank_account_id.is_none() {
            return Err(Error::validation("bank account required"));
        }
        if self.settlement_date.is_none() {
            return Err(Error::validation("settlement date required"));
        }
        match self.settlement_amount {
            None => return Err(Error::validation("settlement amount required")),
            Some(amount) if !amount.is_finite() => {
                return Err(Error::validation(format!(
                    "settlement amount must be a finite number, got {amount}"
                )));
            }
            Some(_) => {}
        }
        if let Some(twd) = self.twd_amount {
            if !twd.is_finite() {
                return Err(Error::validation(format!(
                    "TWD amount must be a finite number, got {twd}"
                )));
            }
        }
        Ok(())
    }
}

/// A validated settlement ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSettlement {
    /// Linked transactions, deduplicated, in selection order
    pub transaction_ids: Vec<i64>,
    /// Bank account the money flows through
    pub bank_account_id: i64,
    /// Date funds clear
    pub settlement_date: NaiveDate,
    /// Trade date, if known
    pub trade_date: Option<NaiveDate>,
    /// Signed settlement total
    pub settlement_amount: f64,
    /// Amount in home currency
    pub twd_amount: Option<f64>,
    /// Resolved status
    pub status: SettlementStatus,
    /// Free text, `None` when blank
    pub notes: Option<String>,
}

impl NewSettlement {
    /// Value for the `transaction_ids` column.
    #[must_use]
    pub fn encoded_links(&self) -> Option<String> {
        links::encode_links(&self.transaction_ids)
    }
}

/// Which column an amount is displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountSide {
    /// Zero or positive
    Debit,
    /// Negative
    Credit,
}

impl AmountSide {
    /// Side for a signed amount.
    #[must_use]
    pub fn of(amount: f64) -> Self {
        if amount < 0.0 { Self::Credit } else { Self::Debit }
    }
}

/// Per-field subtotals over a set of linked transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedTotals {
    /// Sum of share counts
    pub quantity: i64,
    /// Sum of gross trade values
    pub transaction_amount: f64,
    /// Sum of brokerage fees
    pub fee: f64,
    /// Sum of transaction taxes
    pub tax: f64,
    /// Sum of securities transaction taxes
    pub securities_tax: f64,
    /// Sum of health insurance premiums
    pub health_insurance: f64,
    /// Sum of margin deposits
    pub margin: f64,
    /// Sum of financed amounts
    pub financing_amount: f64,
    /// Sum of financing interest
    pub interest: f64,
    /// Sum of borrowing fees
    pub borrowing_fee: f64,
    /// Sum of signed net amounts
    pub net_amount: f64,
    /// Display side of `net_amount`
    pub net_side: AmountSide,
    /// Distinct currencies seen, in first-seen order
    pub currencies: Vec<String>,
}

impl Default for LinkedTotals {
    fn default() -> Self {
        Self {
            quantity: 0,
            transaction_amount: 0.0,
            fee: 0.0,
            tax: 0.0,
            securities_tax: 0.0,
            health_insurance: 0.0,
            margin: 0.0,
            financing_amount: 0.0,
            interest: 0.0,
            borrowing_fee: 0.0,
            net_amount: 0.0,
            net_side: AmountSide::Debit,
            currencies: Vec::new(),
        }
    }
}

impl LinkedTotals {
    /// Whether the totals add up amounts in more than one currency.
    #[must_use]
    pub fn is_mixed_currency(&self) -> bool {
        self.currencies.len() > 1
    }
}

/// Amounts shown on the statistics panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementStats {
    /// Total of unsettled settlements
    pub pending_amount: f64,
    /// Total of settled settlements
    pub completed_amount: f64,
}

/// Maps every transaction id claimed by a settlement other than `exclude_settlement_id`
/// to the settlement claiming it.
#[must_use]
pub fn claimed_transaction_ids(
    all_settlements: &[SettlementRecord],
    exclude_settlement_id: Option<i64>,
) -> HashMap<i64, i64> {
    all_settlements
        .iter()
        .filter(|s| Some(s.id) != exclude_settlement_id)
        .flat_map(|s| s.transaction_ids.iter().map(move |&tx_id| (tx_id, s.id)))
        .collect()
}

/// Returns the transactions not claimed by any settlement other than
/// `exclude_settlement_id`.
///
/// Passing the id of the settlement being edited keeps its own links selectable.
#[must_use]
pub fn list_available_transactions<'a>(
    all_transactions: &'a [transaction::Model],
    all_settlements: &[SettlementRecord],
    exclude_settlement_id: Option<i64>,
) -> Vec<&'a transaction::Model> {
    let claimed = claimed_transaction_ids(all_settlements, exclude_settlement_id);
    all_transactions
        .iter()
        .filter(|t| !claimed.contains_key(&t.id))
        .collect()
}

/// Removes `transaction_id` from the link list if present, appends it otherwise.
///
/// Toggling the same id twice gives back the same set of ids. The order survives
/// only when the id was absent to begin with: a removed id that is added again
/// goes to the end, which can change what [`derive_trade_date`] picks.
#[must_use]
pub fn toggle_link(current: &[i64], transaction_id: i64) -> Vec<i64> {
    if current.contains(&transaction_id) {
        current
            .iter()
            .copied()
            .filter(|&id| id != transaction_id)
            .collect()
    } else {
        let mut ids = current.to_vec();
        ids.push(transaction_id);
        ids
    }
}

/// Trade date of the first linked transaction (by link order, not chronology).
///
/// Returns `current` unchanged when nothing is linked or the first id does not
/// resolve to a transaction.
#[must_use]
pub fn derive_trade_date(
    linked_ids: &[i64],
    all_transactions: &[transaction::Model],
    current: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let Some(first_id) = linked_ids.first() else {
        return current;
    };

    all_transactions
        .iter()
        .find(|t| t.id == *first_id)
        .map_or(current, |t| Some(t.trade_date))
}

/// Status for a settlement dated `settlement_date`.
///
/// An existing record keeps its stored status. A new one is settled when the date
/// is today or earlier, unsettled otherwise.
#[must_use]
pub fn derive_status(
    settlement_date: NaiveDate,
    today: NaiveDate,
    existing: Option<SettlementStatus>,
) -> SettlementStatus {
    if let Some(status) = existing {
        return status;
    }
    if settlement_date <= today {
        SettlementStatus::Settled
    } else {
        SettlementStatus::Unsettled
    }
}

/// Validates a proposed settlement against the snapshot and builds the record to
/// persist.
///
/// `editing_id` names the settlement being updated; its own links do not count as
/// conflicts and its stored status is kept unless the form sets one.
pub fn validate_and_build_settlement(
    form: &SettlementForm,
    all_settlements: &[SettlementRecord],
    editing_id: Option<i64>,
    today: NaiveDate,
) -> Result<NewSettlement> {
    form.validate_required()?;

    let (Some(bank_account_id), Some(settlement_date), Some(settlement_amount)) = (
        form.bank_account_id,
        form.settlement_date,
        form.settlement_amount,
    ) else {
        return Err(Error::validation("required settlement fields missing"));
    };

    let existing_status = match editing_id {
        Some(id) => Some(
            all_settlements
                .iter()
                .find(|s| s.id == id)
                .map(|s| s.status)
                .ok_or(Error::SettlementNotFound { id })?,
        ),
        None => None,
    };

    let mut seen = HashSet::new();
    let transaction_ids: Vec<i64> = form
        .transaction_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    let claimed = claimed_transaction_ids(all_settlements, editing_id);
    let conflicts: Vec<i64> = transaction_ids
        .iter()
        .copied()
        .filter(|id| claimed.contains_key(id))
        .collect();
    if !conflicts.is_empty() {
        return Err(Error::Conflict {
            transaction_ids: conflicts,
        });
    }

    let status = form
        .status
        .unwrap_or_else(|| derive_status(settlement_date, today, existing_status));

    let notes = form
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from);

    Ok(NewSettlement {
        transaction_ids,
        bank_account_id,
        settlement_date,
        trade_date: form.trade_date,
        settlement_amount,
        twd_amount: form.twd_amount,
        status,
        notes,
    })
}

/// Sums each itemized field across `transactions` independently.
///
/// No currency conversion is done; mixed currencies are summed nominally and show
/// up in [`LinkedTotals::currencies`]. The share count saturates at `i64::MAX`.
pub fn compute_linked_totals<'a, I>(transactions: I) -> LinkedTotals
where
    I: IntoIterator<Item = &'a transaction::Model>,
{
    let mut totals = transactions
        .into_iter()
        .fold(LinkedTotals::default(), |mut acc, t| {
            acc.quantity = acc.quantity.saturating_add(t.quantity);
            acc.transaction_amount += t.transaction_amount;
            acc.fee += t.fee;
            acc.tax += t.tax;
            acc.securities_tax += t.securities_tax;
            acc.health_insurance += t.health_insurance;
            acc.margin += t.margin;
            acc.financing_amount += t.financing_amount;
            acc.interest += t.interest;
            acc.borrowing_fee += t.borrowing_fee;
            acc.net_amount += t.net_amount;
            if !acc.currencies.contains(&t.currency) {
                acc.currencies.push(t.currency.clone());
            }
            acc
        });

    totals.net_side = AmountSide::of(totals.net_amount);
    if totals.is_mixed_currency() {
        tracing::warn!(
            "Summing linked transactions across currencies {:?} without conversion",
            totals.currencies
        );
    }
    totals
}

/// Totals unsettled and settled amounts; failed settlements are not counted.
#[must_use]
pub fn aggregate_stats(settlements: &[SettlementRecord]) -> SettlementStats {
    settlements
        .iter()
        .fold(SettlementStats::default(), |mut stats, s| {
            match s.status {
                SettlementStatus::Unsettled => stats.pending_amount += s.settlement_amount,
                SettlementStatus::Settled => stats.completed_amount += s.settlement_amount,
                SettlementStatus::Failed => {}
            }
            stats
        })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::{date, sample_record, sample_transaction};

    fn form(bank: i64, day: &str, amount: f64, ids: &[i64]) -> SettlementForm {
        SettlementForm {
            transaction_ids: ids.to_vec(),
            bank_account_id: Some(bank),
            settlement_date: Some(date(day)),
            settlement_amount: Some(amount),
            ..Default::default()
        }
    }

    #[test]
    fn test_available_excludes_other_settlements_links() {
        let transactions = vec![
            sample_transaction(1, "2025-01-02", -1000.0),
            sample_transaction(2, "2025-01-03", 500.0),
            sample_transaction(3, "2025-01-04", 700.0),
        ];
        let settlements = vec![sample_record(10, &[1]), sample_record(11, &[3])];

        let available = list_available_transactions(&transactions, &settlements, Some(11));
        let ids: Vec<i64> = available.iter().map(|t| t.id).collect();
        // 1 is claimed by 10; 3 belongs to the settlement being edited
        assert_eq!(ids, vec![2, 3]);

        let available = list_available_transactions(&transactions, &settlements, Some(99));
        let ids: Vec<i64> = available.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2]);

        let available = list_available_transactions(&transactions, &settlements, None);
        assert_eq!(available.len(), 1);
    }

    #[test]
    fn test_toggle_link_adds_and_removes() {
        let linked = toggle_link(&[3], 7);
        assert_eq!(linked, vec![3, 7]);
        let linked = toggle_link(&linked, 3);
        assert_eq!(linked, vec![7]);
    }

    #[test]
    fn test_toggle_link_twice_restores_the_set() {
        for start in [vec![], vec![1], vec![4, 2, 9]] {
            for id in [1, 2, 5] {
                let twice = toggle_link(&toggle_link(&start, id), id);
                let mut sorted = twice.clone();
                sorted.sort_unstable();
                let mut expected = start.clone();
                expected.sort_unstable();
                assert_eq!(sorted, expected);

                if !start.contains(&id) {
                    assert_eq!(twice, start);
                }
            }
        }
    }

    #[test]
    fn test_toggle_link_readd_moves_to_end_and_changes_trade_date() {
        let transactions = vec![
            sample_transaction(4, "2025-01-02", 0.0),
            sample_transaction(2, "2025-01-09", 0.0),
        ];
        let start = vec![4, 2];
        assert_eq!(
            derive_trade_date(&start, &transactions, None),
            Some(date("2025-01-02"))
        );

        let twice = toggle_link(&toggle_link(&start, 4), 4);
        assert_eq!(twice, vec![2, 4]);
        assert_eq!(
            derive_trade_date(&twice, &transactions, None),
            Some(date("2025-01-09"))
        );
    }

    #[test]
    fn test_derive_trade_date_uses_first_linked_not_earliest() {
        let transactions = vec![
            sample_transaction(1, "2025-01-02", 0.0),
            sample_transaction(2, "2025-03-05", 0.0),
        ];
        let derived = derive_trade_date(&[2, 1], &transactions, None);
        assert_eq!(derived, Some(date("2025-03-05")));
    }

    #[test]
    fn test_derive_trade_date_leaves_field_untouched() {
        let transactions = vec![sample_transaction(1, "2025-01-02", 0.0)];
        let manual = Some(date("2024-12-31"));

        assert_eq!(derive_trade_date(&[], &transactions, manual), manual);
        // Dangling first id
        assert_eq!(derive_trade_date(&[42, 1], &transactions, manual), manual);
    }

    #[test]
    fn test_derive_status_boundary() {
        let today = date("2025-06-01");
        assert_eq!(
            derive_status(today, today, None),
            SettlementStatus::Settled
        );
        assert_eq!(
            derive_status(date("2025-06-02"), today, None),
            SettlementStatus::Unsettled
        );
        assert_eq!(
            derive_status(date("2025-01-01"), today, Some(SettlementStatus::Failed)),
            SettlementStatus::Failed
        );
        assert_eq!(
            derive_status(date("2030-01-01"), today, Some(SettlementStatus::Settled)),
            SettlementStatus::Settled
        );
    }

    #[test]
    fn test_build_requires_bank_account() {
        let mut f = form(1, "2025-01-01", 5000.0, &[]);
        f.bank_account_id = None;
        let err = validate_and_build_settlement(&f, &[], None, date("2025-06-01")).unwrap_err();
        assert!(
            matches!(err, Error::Validation { ref message } if message == "bank account required")
        );
    }

    #[test]
    fn test_build_requires_date_and_amount() {
        let today = date("2025-06-01");

        let mut f = form(1, "2025-01-01", 5000.0, &[]);
        f.settlement_date = None;
        assert!(matches!(
            validate_and_build_settlement(&f, &[], None, today),
            Err(Error::Validation { .. })
        ));

        let mut f = form(1, "2025-01-01", 5000.0, &[]);
        f.settlement_amount = None;
        assert!(matches!(
            validate_and_build_settlement(&f, &[], None, today),
            Err(Error::Validation { .. })
        ));

        let f = form(1, "2025-01-01", f64::NAN, &[]);
        assert!(matches!(
            validate_and_build_settlement(&f, &[], None, today),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_build_past_date_is_settled() {
        let built = validate_and_build_settlement(
            &form(1, "2025-01-01", 5000.0, &[101]),
            &[],
            None,
            date("2025-06-01"),
        )
        .unwrap();

        assert_eq!(built.status, SettlementStatus::Settled);
        assert_eq!(built.transaction_ids, vec![101]);
        assert_eq!(built.encoded_links().as_deref(), Some("[101]"));
    }

    #[test]
    fn test_build_conflict_names_claimed_ids() {
        let settlements = vec![sample_record(1, &[55, 60])];
        let err = validate_and_build_settlement(
            &form(1, "2025-01-01", 100.0, &[54, 55, 60]),
            &settlements,
            None,
            date("2025-06-01"),
        )
        .unwrap_err();

        match err {
            Error::Conflict { transaction_ids } => assert_eq!(transaction_ids, vec![55, 60]),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_build_edit_keeps_own_links_and_status() {
        let mut own = sample_record(1, &[55]);
        own.status = SettlementStatus::Failed;
        let settlements = vec![own, sample_record(2, &[70])];

        let built = validate_and_build_settlement(
            &form(1, "2025-01-01", 100.0, &[55, 56]),
            &settlements,
            Some(1),
            date("2025-06-01"),
        )
        .unwrap();

        assert_eq!(built.transaction_ids, vec![55, 56]);
        assert_eq!(built.status, SettlementStatus::Failed);
    }

    #[test]
    fn test_build_edit_unknown_settlement() {
        let err = validate_and_build_settlement(
            &form(1, "2025-01-01", 100.0, &[]),
            &[],
            Some(9),
            date("2025-06-01"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::SettlementNotFound { id: 9 }));
    }

    #[test]
    fn test_build_explicit_status_wins() {
        let mut f = form(1, "2025-01-01", 100.0, &[]);
        f.status = Some(SettlementStatus::Failed);
        let built = validate_and_build_settlement(&f, &[], None, date("2025-06-01")).unwrap();
        assert_eq!(built.status, SettlementStatus::Failed);
    }

    #[test]
    fn test_build_dedupes_and_normalizes_blanks() {
        let mut f = form(1, "2025-07-01", -250.0, &[3, 7, 3]);
        f.notes = Some("   ".to_string());
        let built = validate_and_build_settlement(&f, &[], None, date("2025-06-01")).unwrap();

        assert_eq!(built.transaction_ids, vec![3, 7]);
        assert_eq!(built.notes, None);
        assert_eq!(built.twd_amount, None);
        assert_eq!(built.trade_date, None);
        assert_eq!(built.status, SettlementStatus::Unsettled);
    }

    #[test]
    fn test_build_empty_links_encode_as_none() {
        let built = validate_and_build_settlement(
            &form(1, "2025-01-01", 1.0, &[]),
            &[],
            None,
            date("2025-06-01"),
        )
        .unwrap();
        assert_eq!(built.encoded_links(), None);
    }

    #[test]
    fn test_totals_over_empty_set_are_zero() {
        let none: [transaction::Model; 0] = [];
        let totals = compute_linked_totals(&none);
        assert_eq!(totals, LinkedTotals::default());
        assert_eq!(totals.quantity, 0);
        assert_eq!(totals.net_amount, 0.0);
        assert_eq!(totals.net_side, AmountSide::Debit);
    }

    #[test]
    fn test_totals_sum_fields_independently() {
        let mut buy = sample_transaction(1, "2025-01-02", -100_142.0);
        buy.quantity = 1000;
        buy.transaction_amount = 100_000.0;
        buy.fee = 142.0;
        let mut sell = sample_transaction(2, "2025-01-03", 49_780.0);
        sell.quantity = 500;
        sell.transaction_amount = 50_000.0;
        sell.fee = 70.0;
        sell.securities_tax = 150.0;

        let totals = compute_linked_totals(&[buy, sell]);
        assert_eq!(totals.quantity, 1500);
        assert_eq!(totals.transaction_amount, 150_000.0);
        assert_eq!(totals.fee, 212.0);
        assert_eq!(totals.securities_tax, 150.0);
        assert_eq!(totals.tax, 0.0);
        assert_eq!(totals.net_amount, -50_362.0);
        assert_eq!(totals.net_side, AmountSide::Credit);
        assert!(!totals.is_mixed_currency());
    }

    #[test]
    fn test_totals_flag_mixed_currency() {
        let twd = sample_transaction(1, "2025-01-02", 100.0);
        let mut usd = sample_transaction(2, "2025-01-02", 10.0);
        usd.currency = "USD".to_string();

        let totals = compute_linked_totals([&twd, &usd]);
        assert_eq!(totals.net_amount, 110.0);
        assert_eq!(totals.currencies, vec!["TWD".to_string(), "USD".to_string()]);
        assert!(totals.is_mixed_currency());
    }

    #[test]
    fn test_totals_quantity_saturates_instead_of_overflowing() {
        let mut huge = sample_transaction(1, "2025-01-02", -1.0);
        huge.quantity = i64::MAX;
        let mut one = sample_transaction(2, "2025-01-03", -1.0);
        one.quantity = 1;

        let totals = compute_linked_totals(&[huge, one]);
        assert_eq!(totals.quantity, i64::MAX);
        assert_eq!(totals.net_amount, -2.0);
    }

    #[test]
    fn test_aggregate_stats_partitions_by_status() {
        let mut pending = sample_record(1, &[]);
        pending.settlement_amount = 300.0;
        let mut pending2 = sample_record(2, &[]);
        pending2.settlement_amount = -100.0;
        let mut done = sample_record(3, &[]);
        done.status = SettlementStatus::Settled;
        done.settlement_amount = 1000.0;
        let mut failed = sample_record(4, &[]);
        failed.status = SettlementStatus::Failed;
        failed.settlement_amount = 9999.0;

        let stats = aggregate_stats(&[pending, pending2, done, failed]);
        assert_eq!(stats.pending_amount, 200.0);
        assert_eq!(stats.completed_amount, 1000.0);
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let json = serde_json::to_value(SettlementStats {
            pending_amount: 1.0,
            completed_amount: 2.0,
        })
        .unwrap();
        assert_eq!(json["pendingAmount"], 1.0);
        assert_eq!(json["completedAmount"], 2.0);
    }
}
