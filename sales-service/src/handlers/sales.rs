use crate::dtos::{
    ResyncParams, SalesEntryResponse, SalesListParams, SalesListResponse, SetPaidAmountRequest,
    UpdateSalesRequest,
};
use crate::models::DocumentNumber;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

const DEFAULT_RESYNC_LIMIT: usize = 100;

pub async fn list_sales(
    State(state): State<AppState>,
    Query(params): Query<SalesListParams>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;
    let (filter, page) = params.to_query()?;

    let entries = state.ledger.list(&filter, page).await?;
    Ok(Json(SalesListResponse::from(entries)))
}

pub async fn sales_summary(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.ledger.summary().await?))
}

pub async fn get_sales_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entry = state.ledger.get(&id).await?;
    Ok(Json(SalesEntryResponse::from(entry)))
}

pub async fn get_sales_by_document(
    State(state): State<AppState>,
    Path(document_number): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let number = DocumentNumber::parse(&document_number)?;
    let entry = state.ledger.get_by_number(&number).await?;
    Ok(Json(SalesEntryResponse::from(entry)))
}

pub async fn update_sales_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateSalesRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let entry = state.ledger.update(&id, &req.into()).await?;
    Ok(Json(SalesEntryResponse::from(entry)))
}

/// Manual correction of the paid accumulator.
pub async fn set_paid_amount(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetPaidAmountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let entry = state.ledger.set_paid_amount(&id, req.paid_amount).await?;
    Ok(Json(SalesEntryResponse::from(entry)))
}

/// Replay dead-lettered ledger syncs.
pub async fn resync_ledger(
    State(state): State<AppState>,
    Query(params): Query<ResyncParams>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;

    let report = state
        .records
        .resync(params.limit.unwrap_or(DEFAULT_RESYNC_LIMIT))
        .await?;
    Ok(Json(report))
}
