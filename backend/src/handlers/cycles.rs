//! Rearing cycle handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Cycle;
use crate::services::cycle::{CycleComposition, CycleFilter, CycleService, SetCompositionInput};
use crate::AppState;

pub async fn list_cycles(
    State(state): State<AppState>,
    Query(filter): Query<CycleFilter>,
) -> AppResult<Json<Vec<Cycle>>> {
    let service = CycleService::new(state.db.clone());
    Ok(Json(service.list(&filter).await?))
}

pub async fn get_cycle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Cycle>> {
    let service = CycleService::new(state.db.clone());
    Ok(Json(service.get(id).await?))
}

pub async fn get_cycle_composition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CycleComposition>> {
    let service = CycleService::new(state.db.clone());
    Ok(Json(service.composition(id).await?))
}

/// Replace a cycle's lot mix from percentages
pub async fn set_cycle_composition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<SetCompositionInput>,
) -> AppResult<Json<CycleComposition>> {
    let service = CycleService::new(state.db.clone());
    Ok(Json(service.set_composition(id, input).await?))
}
