use crate::dtos::{
    CreateRecordRequest, RecordListParams, RecordListResponse, RecordResponse,
    UpdateRecordRequest,
};
use crate::middleware::ActingUser;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use validator::Validate;

fn record_not_found(id: &str) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Record {} not found", id))
}

/// 201 for a new record, 200 when the document number was already recorded.
pub async fn create_record(
    State(state): State<AppState>,
    user: ActingUser,
    Json(req): Json<CreateRecordRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let (record, created) = state
        .records
        .create(req.into_input(user.into_inner()))
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(RecordResponse::from(record))))
}

pub async fn list_records(
    State(state): State<AppState>,
    Query(params): Query<RecordListParams>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;
    let (filter, page) = params.to_query()?;

    let records = state.records.list(&filter, page).await?;
    Ok(Json(RecordListResponse::from(records)))
}

pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .records
        .get(&id)
        .await?
        .ok_or_else(|| record_not_found(&id))?;
    Ok(Json(RecordResponse::from(record)))
}

pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRecordRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let record = state
        .records
        .update(&id, req.into())
        .await?
        .ok_or_else(|| record_not_found(&id))?;
    Ok(Json(RecordResponse::from(record)))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .records
        .delete(&id)
        .await?
        .ok_or_else(|| record_not_found(&id))?;
    Ok(Json(RecordResponse::from(record)))
}

pub async fn record_summary(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let summary = state.records.summary(Utc::now()).await?;
    Ok(Json(summary))
}
