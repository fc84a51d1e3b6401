//! Basket operation handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::measurement::MeasurementInput;
use shared::types::PaginatedResponse;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Operation;
use crate::services::operation::{
    CreateOperationInput, OperationFilter, OperationPreview, OperationService,
};
use crate::AppState;

pub async fn list_operations(
    State(state): State<AppState>,
    Query(filter): Query<OperationFilter>,
) -> AppResult<Json<PaginatedResponse<Operation>>> {
    let service = OperationService::new(state.db.clone());
    Ok(Json(service.list(&filter).await?))
}

pub async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Operation>> {
    let service = OperationService::new(state.db.clone());
    Ok(Json(service.get(id).await?))
}

/// Register an operation and apply its cycle, basket and lot side effects
pub async fn create_operation(
    State(state): State<AppState>,
    Json(input): Json<CreateOperationInput>,
) -> AppResult<impl IntoResponse> {
    let service = OperationService::new(state.db.clone());
    let operation = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(operation)))
}

/// Derived measurement figures for a form, nothing is stored
pub async fn preview_operation(
    State(state): State<AppState>,
    Json(input): Json<MeasurementInput>,
) -> AppResult<Json<OperationPreview>> {
    let service = OperationService::new(state.db.clone());
    Ok(Json(service.preview(input).await?))
}
