//! Route definitions for the FLUPSY Management Platform

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/flupsys", flupsy_routes())
        .nest("/lots", lot_routes())
        .nest("/sizes", size_routes())
        .nest("/baskets", basket_routes())
        .nest("/cycles", cycle_routes())
        .nest("/operations", operation_routes())
        .nest("/screenings", screening_routes())
        .nest("/analytics", analytics_routes())
}

fn flupsy_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_flupsys).post(handlers::create_flupsy),
        )
        .route(
            "/:id",
            get(handlers::get_flupsy).patch(handlers::update_flupsy),
        )
}

fn lot_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_lots).post(handlers::create_lot))
        .route("/:id", get(handlers::get_lot).patch(handlers::update_lot))
}

fn size_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sizes).post(handlers::create_size))
        .route("/:id", get(handlers::get_size).patch(handlers::update_size))
}

fn basket_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_baskets).post(handlers::create_basket),
        )
        .route(
            "/:id",
            get(handlers::get_basket).patch(handlers::update_basket),
        )
        .route("/:id/move", post(handlers::move_basket))
}

fn cycle_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_cycles))
        .route("/:id", get(handlers::get_cycle))
        .route(
            "/:id/composition",
            get(handlers::get_cycle_composition).put(handlers::set_cycle_composition),
        )
}

fn operation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_operations).post(handlers::create_operation),
        )
        .route("/preview", post(handlers::preview_operation))
        .route("/:id", get(handlers::get_operation))
}

fn screening_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_screenings).post(handlers::create_screening),
        )
        .route("/next-number", get(handlers::get_next_screening_number))
        .route("/:id", get(handlers::get_screening))
}

/// Read-only reports
fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/lots", get(handlers::get_lots_analytics))
        .route("/lots/:id", get(handlers::get_single_lot_analytics))
        .route("/suppliers", get(handlers::get_suppliers))
        .route("/inventory-live", get(handlers::get_live_inventory))
        .route("/mortality-trends", get(handlers::get_mortality_trends))
        .route("/sizes-distribution", get(handlers::get_sizes_distribution))
        .route(
            "/mixed-lots-composition",
            get(handlers::get_mixed_lots_composition),
        )
        .route(
            "/lot-traceability/:lot_id",
            get(handlers::get_lot_traceability),
        )
}
