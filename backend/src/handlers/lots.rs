//! Lot management HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Lot;
use crate::services::lot::{CreateLotInput, LotFilter, LotService, UpdateLotInput};
use crate::AppState;

/// List lots, optionally filtered by supplier, state and arrival window
pub async fn list_lots(
    State(state): State<AppState>,
    Query(filter): Query<LotFilter>,
) -> AppResult<Json<Vec<Lot>>> {
    let service = LotService::new(state.db.clone());
    Ok(Json(service.list(&filter).await?))
}

pub async fn get_lot(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Lot>> {
    let service = LotService::new(state.db.clone());
    Ok(Json(service.get(id).await?))
}

/// Register a lot on arrival; sample fields fill in count and size
pub async fn create_lot(
    State(state): State<AppState>,
    Json(input): Json<CreateLotInput>,
) -> AppResult<impl IntoResponse> {
    let service = LotService::new(state.db.clone());
    let created = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_lot(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateLotInput>,
) -> AppResult<Json<Lot>> {
    let service = LotService::new(state.db.clone());
    Ok(Json(service.update(id, input).await?))
}
