//! Settlement detail reports.
//!
//! Builds the expanded view of one settlement (its linked transactions with
//! subtotals) and the display helpers the totals row uses. Functions return
//! structured data; rendering is left to the caller.

use crate::{
    core::{
        reconcile::{self, AmountSide, LinkedTotals},
        settlement::{self, SettlementRecord},
    },
    entities::{bank_account, transaction},
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use serde::Serialize;

/// A settlement expanded with everything it links to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementDetail {
    /// The settlement being reported on
    pub settlement: SettlementRecord,
    /// Bank account, if it still exists
    pub bank_account: Option<bank_account::Model>,
    /// Linked transactions in link order; dangling ids are skipped
    pub transactions: Vec<transaction::Model>,
    /// Ids that no longer resolve to a transaction
    pub missing_transaction_ids: Vec<i64>,
    /// Subtotals over `transactions`
    pub totals: LinkedTotals,
    /// Display side of the settlement amount
    pub amount_side: AmountSide,
    /// Formatted cells for the totals row
    pub cells: DetailCells,
}

/// Formatted cells of a settlement's totals row. Zero subtotals are blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailCells {
    /// One-line summary of the settlement
    pub summary: String,
    /// Signed settlement amount
    pub settlement_amount: String,
    /// Share count
    pub quantity: String,
    /// Gross trade value
    pub transaction_amount: String,
    /// Brokerage fees
    pub fee: String,
    /// Transaction tax
    pub tax: String,
    /// Securities transaction tax
    pub securities_tax: String,
    /// Health insurance premium
    pub health_insurance: String,
    /// Margin deposit
    pub margin: String,
    /// Financed amount
    pub financing_amount: String,
    /// Financing interest
    pub interest: String,
    /// Borrowing fee
    pub borrowing_fee: String,
    /// Net amount when the customer receives money
    pub net_receivable: String,
    /// Net amount when the customer pays
    pub net_payable: String,
}

impl DetailCells {
    /// Formats the totals row of `settlement`.
    #[must_use]
    pub fn new(settlement: &SettlementRecord, totals: &LinkedTotals) -> Self {
        let (net_receivable, net_payable) = format_net_columns(totals.net_amount);
        Self {
            summary: format_settlement_summary(settlement),
            settlement_amount: format_amount(settlement.settlement_amount),
            quantity: format_quantity(totals.quantity),
            transaction_amount: format_total(totals.transaction_amount),
            fee: format_total(totals.fee),
            tax: format_total(totals.tax),
            securities_tax: format_total(totals.securities_tax),
            health_insurance: format_total(totals.health_insurance),
            margin: format_total(totals.margin),
            financing_amount: format_total(totals.financing_amount),
            interest: format_total(totals.interest),
            borrowing_fee: format_total(totals.borrowing_fee),
            net_receivable,
            net_payable,
        }
    }
}

/// Generates the detail view for a settlement.
///
/// # Errors
/// [`Error::SettlementNotFound`] if no settlement has `settlement_id`.
pub async fn generate_settlement_detail(
    db: &DatabaseConnection,
    settlement_id: i64,
) -> Result<SettlementDetail> {
    let settlement = settlement::get_settlement_by_id(db, settlement_id)
        .await?
        .ok_or(Error::SettlementNotFound { id: settlement_id })?;

    let transactions =
        crate::core::transaction::get_transactions_by_ids(db, &settlement.transaction_ids).await?;
    let missing_transaction_ids: Vec<i64> = settlement
        .transaction_ids
        .iter()
        .copied()
        .filter(|id| !transactions.iter().any(|t| t.id == *id))
        .collect();
    if !missing_transaction_ids.is_empty() {
        tracing::warn!(
            "Settlement {} links missing transactions {:?}",
            settlement_id,
            missing_transaction_ids
        );
    }

    let bank_account = match settlement.bank_account_id {
        Some(id) => crate::core::bank_account::get_bank_account_by_id(db, id).await?,
        None => None,
    };

    let totals = reconcile::compute_linked_totals(&transactions);
    let amount_side = AmountSide::of(settlement.settlement_amount);
    let cells = DetailCells::new(&settlement, &totals);

    Ok(SettlementDetail {
        settlement,
        bank_account,
        transactions,
        missing_transaction_ids,
        totals,
        amount_side,
        cells,
    })
}

/// Formats a signed amount with two decimals, e.g. "+5000.00" or "-250.50".
#[must_use]
pub fn format_amount(amount: f64) -> String {
    if amount >= 0.0 {
        format!("+{amount:.2}")
    } else {
        format!("-{:.2}", amount.abs())
    }
}

/// Formats a subtotal cell: blank for zero, two decimals otherwise.
#[must_use]
pub fn format_total(value: f64) -> String {
    if value == 0.0 {
        String::new()
    } else {
        format!("{value:.2}")
    }
}

/// Formats a share count cell: blank for zero.
#[must_use]
pub fn format_quantity(quantity: i64) -> String {
    if quantity == 0 {
        String::new()
    } else {
        quantity.to_string()
    }
}

/// Splits a net amount into its (receivable, payable) cells. Only the cell on the
/// amount's side is filled, with the magnitude.
#[must_use]
pub fn format_net_columns(net_amount: f64) -> (String, String) {
    match AmountSide::of(net_amount) {
        AmountSide::Debit => (format_total(net_amount), String::new()),
        AmountSide::Credit => (String::new(), format_total(net_amount.abs())),
    }
}

/// One-line summary of a settlement.
#[must_use]
pub fn format_settlement_summary(settlement: &SettlementRecord) -> String {
    format!(
        "{} | {} | {} | {} linked",
        settlement.settlement_date,
        format_amount(settlement.settlement_amount),
        settlement.status,
        settlement.transaction_ids.len()
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::{reconcile::SettlementForm, settlement::create_settlement};
    use crate::test_utils::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(5000.0), "+5000.00");
        assert_eq!(format_amount(-250.5), "-250.50");
        assert_eq!(format_amount(0.0), "+0.00");
    }

    #[test]
    fn test_format_total_blank_for_zero() {
        assert_eq!(format_total(0.0), "");
        assert_eq!(format_total(142.0), "142.00");
        assert_eq!(format_total(-3.456), "-3.46");
    }

    #[test]
    fn test_format_quantity_blank_for_zero() {
        assert_eq!(format_quantity(0), "");
        assert_eq!(format_quantity(1500), "1500");
    }

    #[test]
    fn test_format_net_columns_by_side() {
        assert_eq!(
            format_net_columns(49_780.0),
            ("49780.00".to_string(), String::new())
        );
        assert_eq!(
            format_net_columns(-100_142.0),
            (String::new(), "100142.00".to_string())
        );
        assert_eq!(format_net_columns(0.0), (String::new(), String::new()));
    }

    #[test]
    fn test_format_settlement_summary() {
        let mut record = sample_record(1, &[3, 7]);
        record.settlement_date = date("2025-01-04");
        record.settlement_amount = -50.0;
        assert_eq!(
            format_settlement_summary(&record),
            "2025-01-04 | -50.00 | unsettled | 2 linked"
        );
    }

    #[tokio::test]
    async fn test_generate_settlement_detail_integration() -> Result<()> {
        let (db, bank) = setup_with_bank_account().await?;
        create_transaction_with_id(&db, 3, "2025-01-02", 49_780.0).await?;
        create_transaction_with_id(&db, 7, "2025-01-01", -100_142.0).await?;

        let form = SettlementForm {
            transaction_ids: vec![7, 3],
            bank_account_id: Some(bank.id),
            settlement_date: Some(date("2025-01-04")),
            settlement_amount: Some(-50_362.0),
            ..Default::default()
        };
        let created = create_settlement(&db, &form, date("2025-06-01")).await?;

        let detail = generate_settlement_detail(&db, created.id).await?;
        let ids: Vec<i64> = detail.transactions.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![7, 3]);
        assert!(detail.missing_transaction_ids.is_empty());
        assert_eq!(detail.totals.net_amount, -50_362.0);
        assert_eq!(detail.totals.net_side, AmountSide::Credit);
        assert_eq!(detail.amount_side, AmountSide::Credit);
        assert_eq!(detail.bank_account.map(|b| b.id), Some(bank.id));

        assert_eq!(detail.cells.settlement_amount, "-50362.00");
        assert_eq!(detail.cells.net_receivable, "");
        assert_eq!(detail.cells.net_payable, "50362.00");
        assert_eq!(detail.cells.quantity, "2");
        // No fees on either trade
        assert_eq!(detail.cells.fee, "");
        assert_eq!(detail.cells.summary, "2025-01-04 | -50362.00 | settled | 2 linked");

        Ok(())
    }

    #[tokio::test]
    async fn test_generate_settlement_detail_skips_dangling_ids() -> Result<()> {
        let (db, bank) = setup_with_bank_account().await?;
        create_transaction_with_id(&db, 1, "2025-01-02", 100.0).await?;
        let raw = insert_raw_settlement(
            &db,
            bank.id,
            "2025-01-04",
            100.0,
            "settled",
            None,
            Some("[1,404]"),
        )
        .await?;

        let detail = generate_settlement_detail(&db, raw.id).await?;
        assert_eq!(detail.transactions.len(), 1);
        assert_eq!(detail.missing_transaction_ids, vec![404]);
        assert_eq!(detail.totals.net_amount, 100.0);

        let result = generate_settlement_detail(&db, 999).await;
        assert!(matches!(result, Err(Error::SettlementNotFound { id: 999 })));
        Ok(())
    }
}
