//! API handlers for the REST endpoints

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::{Local, NaiveDate};

use crate::api::AppState;
use crate::api::models::{
    ApiError, ApiResponse, AvailableQuery, BankAccountRequest, DeletedSettlement, HealthResponse,
    SettlementQuery, SettlementRequest, TransactionQuery, TransactionRequest, parse_number,
};
use crate::core::{
    bank_account,
    reconcile::SettlementForm,
    report::{self, SettlementDetail},
    settlement::{self, SettlementFilter, SettlementRecord, SettlementRow},
    transaction::{self as trades, NewTransaction, TransactionFilter},
};
use crate::entities::{bank_account as bank_account_entity, transaction};
use crate::errors::Error;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;
type Body<T> = std::result::Result<Json<T>, JsonRejection>;

/// Unwraps a request body, turning a rejected one into the error envelope.
fn body<T>(payload: Body<T>) -> Result<T, ApiError> {
    payload.map(|Json(req)| req).map_err(ApiError::from)
}

/// Settlement status derivation compares against the local calendar date.
fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Health check handler
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "brokerbook".to_string(),
    })
}

/// `GET /api/settlements`
pub async fn list_settlements(
    State(state): State<AppState>,
    Query(query): Query<SettlementQuery>,
) -> ApiResult<Vec<SettlementRow>> {
    let filter = SettlementFilter::try_from(query)?;
    let listing = settlement::list_settlements(&state.db, &filter).await?;
    Ok(Json(ApiResponse::ok(listing.settlements).with_stats(listing.stats)))
}

/// `POST /api/settlements`
pub async fn create_settlement(
    State(state): State<AppState>,
    payload: Body<SettlementRequest>,
) -> Created<SettlementRecord> {
    let form = SettlementForm::try_from(body(payload)?)?;
    let created = settlement::create_settlement(&state.db, &form, today()).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(created).with_message("Settlement created")),
    ))
}

/// `GET /api/settlements/:id`
pub async fn get_settlement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<SettlementDetail> {
    let detail = report::generate_settlement_detail(&state.db, id).await?;
    Ok(Json(ApiResponse::ok(detail)))
}

/// `PUT /api/settlements/:id`
pub async fn update_settlement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Body<SettlementRequest>,
) -> ApiResult<SettlementRecord> {
    let form = SettlementForm::try_from(body(payload)?)?;
    let updated = settlement::update_settlement(&state.db, id, &form, today()).await?;
    Ok(Json(ApiResponse::ok(updated).with_message("Settlement updated")))
}

/// `DELETE /api/settlements/:id`
pub async fn delete_settlement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<DeletedSettlement> {
    let deleted = settlement::delete_settlement(&state.db, id).await?;
    Ok(Json(
        ApiResponse::ok(DeletedSettlement {
            id: deleted.id,
            released_transaction_ids: deleted.transaction_ids,
        })
        .with_message("Settlement deleted"),
    ))
}

/// `GET /api/transactions`
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> ApiResult<Vec<transaction::Model>> {
    let filter = TransactionFilter::try_from(query)?;
    let transactions = trades::list_transactions(&state.db, &filter).await?;
    Ok(Json(ApiResponse::ok(transactions)))
}

/// `POST /api/transactions`
pub async fn create_transaction(
    State(state): State<AppState>,
    payload: Body<TransactionRequest>,
) -> Created<transaction::Model> {
    let new = NewTransaction::try_from(body(payload)?)?;
    let created = trades::create_transaction(&state.db, new, &state.ledger).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(created).with_message("Transaction recorded")),
    ))
}

/// `GET /api/transactions/:id`
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<transaction::Model> {
    let found = trades::get_transaction_by_id(&state.db, id)
        .await?
        .ok_or(Error::TransactionNotFound { id })?;
    Ok(Json(ApiResponse::ok(found)))
}

/// `GET /api/transactions/available`
pub async fn available_transactions(
    State(state): State<AppState>,
    Query(query): Query<AvailableQuery>,
) -> ApiResult<Vec<transaction::Model>> {
    let exclude = query.exclude_settlement_id()?;
    let available = settlement::available_transactions(&state.db, exclude).await?;
    Ok(Json(ApiResponse::ok(available)))
}

/// `GET /api/bank-accounts`
pub async fn list_bank_accounts(
    State(state): State<AppState>,
) -> ApiResult<Vec<bank_account_entity::Model>> {
    let accounts = bank_account::get_all_bank_accounts(&state.db).await?;
    Ok(Json(ApiResponse::ok(accounts)))
}

/// `GET /api/bank-accounts/:id`
pub async fn get_bank_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<bank_account_entity::Model> {
    let found = bank_account::get_bank_account_by_id(&state.db, id)
        .await?
        .ok_or(Error::BankAccountNotFound { id })?;
    Ok(Json(ApiResponse::ok(found)))
}

/// `POST /api/bank-accounts`
pub async fn create_bank_account(
    State(state): State<AppState>,
    payload: Body<BankAccountRequest>,
) -> Created<bank_account_entity::Model> {
    let req = body(payload)?;
    let balance = parse_number("balance", req.balance.as_ref())?.unwrap_or(0.0);
    let created = bank_account::create_bank_account(
        &state.db,
        req.bank_name,
        req.account_number,
        req.account_type,
        balance,
        req.currency,
        &state.ledger,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(created).with_message("Bank account created")),
    ))
}
