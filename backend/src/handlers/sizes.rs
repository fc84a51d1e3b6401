//! Commercial size table handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Size;
use crate::services::size::{CreateSizeInput, SizeService, UpdateSizeInput};
use crate::AppState;

pub async fn list_sizes(State(state): State<AppState>) -> AppResult<Json<Vec<Size>>> {
    let service = SizeService::new(state.db.clone());
    Ok(Json(service.list().await?))
}

pub async fn get_size(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Size>> {
    let service = SizeService::new(state.db.clone());
    Ok(Json(service.get(id).await?))
}

pub async fn create_size(
    State(state): State<AppState>,
    Json(input): Json<CreateSizeInput>,
) -> AppResult<impl IntoResponse> {
    let service = SizeService::new(state.db.clone());
    let size = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(size)))
}

pub async fn update_size(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateSizeInput>,
) -> AppResult<Json<Size>> {
    let service = SizeService::new(state.db.clone());
    Ok(Json(service.update(id, input).await?))
}
