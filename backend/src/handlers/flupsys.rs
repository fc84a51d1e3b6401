//! FLUPSY unit handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Flupsy;
use crate::services::flupsy::{CreateFlupsyInput, FlupsyService, UpdateFlupsyInput};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlupsyQuery {
    #[serde(default)]
    pub active_only: bool,
}

pub async fn list_flupsys(
    State(state): State<AppState>,
    Query(query): Query<FlupsyQuery>,
) -> AppResult<Json<Vec<Flupsy>>> {
    let service = FlupsyService::new(state.db.clone());
    Ok(Json(service.list(query.active_only).await?))
}

pub async fn get_flupsy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Flupsy>> {
    let service = FlupsyService::new(state.db.clone());
    Ok(Json(service.get(id).await?))
}

pub async fn create_flupsy(
    State(state): State<AppState>,
    Json(input): Json<CreateFlupsyInput>,
) -> AppResult<impl IntoResponse> {
    let service = FlupsyService::new(state.db.clone());
    let flupsy = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(flupsy)))
}

pub async fn update_flupsy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateFlupsyInput>,
) -> AppResult<Json<Flupsy>> {
    let service = FlupsyService::new(state.db.clone());
    Ok(Json(service.update(id, input).await?))
}
