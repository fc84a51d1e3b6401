//! Basket handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Basket;
use crate::services::basket::{
    BasketFilter, BasketService, CreateBasketInput, MoveBasketInput, MoveBasketResult,
    UpdateBasketInput,
};
use crate::AppState;

pub async fn list_baskets(
    State(state): State<AppState>,
    Query(filter): Query<BasketFilter>,
) -> AppResult<Json<Vec<Basket>>> {
    let service = BasketService::new(state.db.clone());
    Ok(Json(service.list(&filter).await?))
}

pub async fn get_basket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Basket>> {
    let service = BasketService::new(state.db.clone());
    Ok(Json(service.get(id).await?))
}

pub async fn create_basket(
    State(state): State<AppState>,
    Json(input): Json<CreateBasketInput>,
) -> AppResult<impl IntoResponse> {
    let service = BasketService::new(state.db.clone());
    let basket = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(basket)))
}

pub async fn update_basket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateBasketInput>,
) -> AppResult<Json<Basket>> {
    let service = BasketService::new(state.db.clone());
    Ok(Json(service.update(id, input).await?))
}

/// Move a basket to a new row/position, optionally swapping with the occupant
pub async fn move_basket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<MoveBasketInput>,
) -> AppResult<Json<MoveBasketResult>> {
    let service = BasketService::new(state.db.clone());
    Ok(Json(service.move_basket(id, input).await?))
}
