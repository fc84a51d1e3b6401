//! Screening (vagliatura) handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use shared::types::PaginatedResponse;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Screening, ScreeningDetail};
use crate::services::screening::{CreateScreeningInput, ScreeningFilter, ScreeningService};
use crate::AppState;

pub async fn list_screenings(
    State(state): State<AppState>,
    Query(filter): Query<ScreeningFilter>,
) -> AppResult<Json<PaginatedResponse<Screening>>> {
    let service = ScreeningService::new(state.db.clone());
    Ok(Json(service.list(&filter).await?))
}

pub async fn get_screening(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ScreeningDetail>> {
    let service = ScreeningService::new(state.db.clone());
    Ok(Json(service.get(id).await?))
}

pub async fn get_next_screening_number(
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let service = ScreeningService::new(state.db.clone());
    let next_number = service.next_number().await?;
    Ok(Json(json!({ "nextNumber": next_number })))
}

/// Close the source cycles and fill the destination baskets
pub async fn create_screening(
    State(state): State<AppState>,
    Json(input): Json<CreateScreeningInput>,
) -> AppResult<impl IntoResponse> {
    let service = ScreeningService::new(state.db.clone());
    let screening = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(screening)))
}
