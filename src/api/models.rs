//! API models for the REST endpoints.
//!
//! Request bodies are loose: amounts and ids may arrive as JSON numbers or numeric
//! strings, and blank strings or `null` mean the field was left empty. Everything is
//! converted into the typed forms of [`crate::core`] here, so a malformed value
//! becomes a [`Error::Validation`] rather than a body rejection.

use crate::{
    core::{
        reconcile::{SettlementForm, SettlementStats},
        settlement::SettlementFilter,
        status::SettlementStatus,
        transaction::{NewTransaction, TransactionFilter},
    },
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always true
    pub success: bool,
    /// Payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable outcome
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Settlement statistics (list endpoint only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SettlementStats>,
}

impl<T> ApiResponse<T> {
    /// Wraps a payload.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            stats: None,
        }
    }

    /// Attaches a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches settlement statistics.
    #[must_use]
    pub fn with_stats(mut self, stats: SettlementStats) -> Self {
        self.stats = Some(stats);
        self
    }
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,
    /// What went wrong
    pub error: ErrorDetail,
}

/// Error detail
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Extra structured data, e.g. conflicting transaction ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Wrapper that turns a crate [`Error`] into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::validation(format!(
            "malformed request body: {}",
            rejection.body_text()
        )))
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            Error::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Error::Conflict { .. } => (StatusCode::CONFLICT, "TRANSACTIONS_ALREADY_LINKED"),
            Error::SettlementNotFound { .. } => (StatusCode::NOT_FOUND, "SETTLEMENT_NOT_FOUND"),
            Error::TransactionNotFound { .. } => (StatusCode::NOT_FOUND, "TRANSACTION_NOT_FOUND"),
            Error::BankAccountNotFound { .. } => {
                (StatusCode::NOT_FOUND, "BANK_ACCOUNT_NOT_FOUND")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self.0);
        }

        let details = match &self.0 {
            Error::Conflict { transaction_ids } => {
                Some(serde_json::json!({ "transaction_ids": transaction_ids }))
            }
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message: self.0.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Returns the trimmed text of a string value, `None` for blank or null.
fn non_blank(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Parses a loose number: a JSON number or a numeric string. Blank and null are `None`.
pub fn parse_number(field: &str, value: Option<&Value>) -> Result<Option<f64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| Error::validation(format!("{field} is not a valid number"))),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            match trimmed.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(v)),
                _ => Err(Error::validation(format!(
                    "{field} is not a valid number: {trimmed:?}"
                ))),
            }
        }
        Some(other) => Err(Error::validation(format!(
            "{field} must be a number, got {other}"
        ))),
    }
}

/// Parses a loose integer id. Blank and null are `None`.
pub fn parse_id(field: &str, value: Option<&Value>) -> Result<Option<i64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| Error::validation(format!("{field} must be an integer, got {n}"))),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed.parse::<i64>().map(Some).map_err(|_| {
                Error::validation(format!("{field} must be an integer, got {trimmed:?}"))
            })
        }
        Some(other) => Err(Error::validation(format!(
            "{field} must be an integer, got {other}"
        ))),
    }
}

/// Parses a `YYYY-MM-DD` date. Blank and null are `None`.
pub fn parse_date(field: &str, value: Option<&Value>) -> Result<Option<NaiveDate>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => parse_date_str(field, s),
        Some(other) => Err(Error::validation(format!(
            "{field} must be a YYYY-MM-DD string, got {other}"
        ))),
    }
}

fn parse_date_str(field: &str, raw: &str) -> Result<Option<NaiveDate>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| Error::validation(format!("{field} must be YYYY-MM-DD, got {trimmed:?}")))
}

/// Parses a list of ids. A single id is accepted as a one-element list.
fn parse_id_list(field: &str, value: Option<&Value>) -> Result<Vec<i64>> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| parse_id(field, Some(item)).transpose())
            .collect(),
        other => Ok(parse_id(field, other)?.into_iter().collect()),
    }
}

fn parse_status(value: Option<&str>) -> Result<Option<SettlementStatus>> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<SettlementStatus>)
        .transpose()
}

/// Parses an optional text field. Anything but a string or null is rejected.
fn parse_text(field: &str, value: Option<&Value>) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::validation(format!(
            "{field} must be a string, got {other}"
        ))),
    }
}

/// Body of `POST /api/settlements` and `PUT /api/settlements/:id`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SettlementRequest {
    /// Ordered ids of the transactions to link
    pub transaction_ids: Option<Value>,
    /// Single id sent by older clients; used when `transaction_ids` is absent
    pub transaction_id: Option<Value>,
    /// Bank account id
    pub bank_account_id: Option<Value>,
    /// `YYYY-MM-DD`
    pub settlement_date: Option<Value>,
    /// `YYYY-MM-DD`
    pub trade_date: Option<Value>,
    /// Signed settlement total
    pub settlement_amount: Option<Value>,
    /// Amount in home currency
    pub twd_amount: Option<Value>,
    /// Status label, current or legacy spelling
    pub status: Option<Value>,
    /// Free text
    pub notes: Option<Value>,
}

impl TryFrom<SettlementRequest> for SettlementForm {
    type Error = Error;

    fn try_from(req: SettlementRequest) -> Result<Self> {
        let transaction_ids = if req.transaction_ids.is_some() {
            parse_id_list("transaction_ids", req.transaction_ids.as_ref())?
        } else {
            parse_id_list("transaction_id", req.transaction_id.as_ref())?
        };

        Ok(Self {
            transaction_ids,
            bank_account_id: parse_id("bank_account_id", req.bank_account_id.as_ref())?,
            settlement_date: parse_date("settlement_date", req.settlement_date.as_ref())?,
            trade_date: parse_date("trade_date", req.trade_date.as_ref())?,
            settlement_amount: parse_number("settlement_amount", req.settlement_amount.as_ref())?,
            twd_amount: parse_number("twd_amount", req.twd_amount.as_ref())?,
            status: parse_status(parse_text("status", req.status.as_ref())?.as_deref())?,
            notes: parse_text("notes", req.notes.as_ref())?,
        })
    }
}

/// Body of `POST /api/transactions`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TransactionRequest {
    /// Exchange ticker
    pub stock_code: Option<Value>,
    /// Instrument name
    pub stock_name: Option<String>,
    /// `YYYY-MM-DD`
    pub trade_date: Option<Value>,
    /// `YYYY-MM-DD`; defaults from the trade date
    pub settlement_date: Option<Value>,
    /// One of the configured transaction types
    pub transaction_type: Option<String>,
    /// Share count
    pub quantity: Option<Value>,
    /// Price per share
    pub price: Option<Value>,
    /// Gross trade value
    pub transaction_amount: Option<Value>,
    /// Brokerage fee
    pub fee: Option<Value>,
    /// Transaction tax
    pub tax: Option<Value>,
    /// Securities transaction tax
    pub securities_tax: Option<Value>,
    /// Health insurance premium
    pub health_insurance: Option<Value>,
    /// Margin deposit
    pub margin: Option<Value>,
    /// Financed amount
    pub financing_amount: Option<Value>,
    /// Financing interest
    pub interest: Option<Value>,
    /// Borrowing fee
    pub borrowing_fee: Option<Value>,
    /// Signed net amount
    pub net_amount: Option<Value>,
    /// Currency code
    pub currency: Option<String>,
}

impl TryFrom<TransactionRequest> for NewTransaction {
    type Error = Error;

    fn try_from(req: TransactionRequest) -> Result<Self> {
        let cost = |field: &str, value: &Option<Value>| -> Result<f64> {
            Ok(parse_number(field, value.as_ref())?.unwrap_or(0.0))
        };

        // Leading zeros are significant ("0050"); numbers are taken as sent.
        let stock_code = match &req.stock_code {
            Some(Value::Number(n)) => n.to_string(),
            other => non_blank(other.as_ref()).unwrap_or_default(),
        };
        let trade_date = parse_date("trade_date", req.trade_date.as_ref())?
            .ok_or_else(|| Error::validation("trade date required"))?;
        let quantity = parse_id("quantity", req.quantity.as_ref())?
            .ok_or_else(|| Error::validation("quantity required"))?;
        let price = parse_number("price", req.price.as_ref())?
            .ok_or_else(|| Error::validation("price required"))?;
        let net_amount = parse_number("net_amount", req.net_amount.as_ref())?
            .ok_or_else(|| Error::validation("net amount required"))?;

        Ok(Self {
            stock_code,
            stock_name: req.stock_name.unwrap_or_default(),
            trade_date,
            settlement_date: parse_date("settlement_date", req.settlement_date.as_ref())?,
            transaction_type: req.transaction_type.unwrap_or_default(),
            quantity,
            price,
            transaction_amount: parse_number(
                "transaction_amount",
                req.transaction_amount.as_ref(),
            )?,
            fee: cost("fee", &req.fee)?,
            tax: cost("tax", &req.tax)?,
            securities_tax: cost("securities_tax", &req.securities_tax)?,
            health_insurance: cost("health_insurance", &req.health_insurance)?,
            margin: cost("margin", &req.margin)?,
            financing_amount: cost("financing_amount", &req.financing_amount)?,
            interest: cost("interest", &req.interest)?,
            borrowing_fee: cost("borrowing_fee", &req.borrowing_fee)?,
            net_amount,
            currency: req.currency,
        })
    }
}

/// Body of `POST /api/bank-accounts`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BankAccountRequest {
    /// Name of the bank
    pub bank_name: String,
    /// Account number
    pub account_number: String,
    /// One of the configured account types
    pub account_type: String,
    /// Opening balance, zero when blank
    pub balance: Option<Value>,
    /// Currency code
    pub currency: Option<String>,
}

/// Query of `GET /api/settlements`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettlementQuery {
    /// Bank account id
    pub bank_account_id: Option<String>,
    /// Settlement date on or after
    pub start_date: Option<String>,
    /// Settlement date on or before
    pub end_date: Option<String>,
    /// Status label
    pub status: Option<String>,
}

impl TryFrom<SettlementQuery> for SettlementFilter {
    type Error = Error;

    fn try_from(query: SettlementQuery) -> Result<Self> {
        Ok(Self {
            bank_account_id: query
                .bank_account_id
                .map(|raw| parse_id("bankAccountId", Some(&Value::String(raw))))
                .transpose()?
                .flatten(),
            start_date: query
                .start_date
                .map(|raw| parse_date_str("startDate", &raw))
                .transpose()?
                .flatten(),
            end_date: query
                .end_date
                .map(|raw| parse_date_str("endDate", &raw))
                .transpose()?
                .flatten(),
            status: parse_status(query.status.as_deref())?,
        })
    }
}

/// Query of `GET /api/transactions`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransactionQuery {
    /// Trade date on or after
    pub start_date: Option<String>,
    /// Trade date on or before
    pub end_date: Option<String>,
    /// Substring of the stock code
    pub stock_code: Option<String>,
}

impl TryFrom<TransactionQuery> for TransactionFilter {
    type Error = Error;

    fn try_from(query: TransactionQuery) -> Result<Self> {
        Ok(Self {
            start_date: query
                .start_date
                .map(|raw| parse_date_str("startDate", &raw))
                .transpose()?
                .flatten(),
            end_date: query
                .end_date
                .map(|raw| parse_date_str("endDate", &raw))
                .transpose()?
                .flatten(),
            stock_code: query.stock_code,
        })
    }
}

/// Query of `GET /api/transactions/available`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AvailableQuery {
    /// Settlement whose own links stay selectable
    pub exclude_settlement_id: Option<String>,
}

impl AvailableQuery {
    /// Parsed `excludeSettlementId`.
    pub fn exclude_settlement_id(&self) -> Result<Option<i64>> {
        match &self.exclude_settlement_id {
            Some(raw) => parse_id("excludeSettlementId", Some(&Value::String(raw.clone()))),
            None => Ok(None),
        }
    }
}

/// Result of `DELETE /api/settlements/:id`.
#[derive(Debug, Serialize)]
pub struct DeletedSettlement {
    /// Deleted settlement id
    pub id: i64,
    /// Transactions returned to the available pool
    pub released_transaction_ids: Vec<i64>,
}

/// Health check payload
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy"
    pub status: String,
    /// Service name
    pub service: String,
}
