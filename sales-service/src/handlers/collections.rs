use crate::dtos::{
    CollectionListParams, CollectionListResponse, CollectionResponse, CreateCollectionRequest,
    UpdateCollectionRequest, VerifyCollectionRequest,
};
use crate::dtos::blank_to_none;
use crate::middleware::ActingUser;
use crate::models::collection::AUTO_VERIFIER;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn create_collection(
    State(state): State<AppState>,
    user: ActingUser,
    Json(req): Json<CreateCollectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let input = req.into_input(user.into_inner())?;
    let collection = state.collections.apply_payment(input).await?;
    Ok((StatusCode::CREATED, Json(CollectionResponse::from(collection))))
}

pub async fn list_collections(
    State(state): State<AppState>,
    Query(params): Query<CollectionListParams>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;
    let (filter, page) = params.to_query()?;

    let collections = state.collections.list(&filter, page).await?;
    Ok(Json(CollectionListResponse::from(collections)))
}

pub async fn get_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let collection = state.collections.get(&id).await?;
    Ok(Json(CollectionResponse::from(collection)))
}

pub async fn update_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCollectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let collection = state
        .collections
        .amend_payment(&id, req.into_patch()?)
        .await?;
    Ok(Json(CollectionResponse::from(collection)))
}

/// Deletes the collection and reverses its ledger contribution.
pub async fn delete_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let collection = state.collections.reverse_payment(&id).await?;
    Ok(Json(CollectionResponse::from(collection)))
}

/// The body is optional; `verifiedBy` falls back to `X-User-ID`.
pub async fn verify_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: ActingUser,
    body: Option<Json<VerifyCollectionRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let verified_by = body
        .and_then(|Json(req)| blank_to_none(req.verified_by))
        .or(user.into_inner())
        .unwrap_or_else(|| AUTO_VERIFIER.to_string());

    let collection = state.collections.verify(&id, &verified_by).await?;
    Ok(Json(CollectionResponse::from(collection)))
}

pub async fn deposit_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let collection = state.collections.deposit(&id).await?;
    Ok(Json(CollectionResponse::from(collection)))
}

pub async fn cancel_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let collection = state.collections.cancel(&id).await?;
    Ok(Json(CollectionResponse::from(collection)))
}
