//! Analytics handlers for lots, mortality and inventory reports

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::analytics::{
    LiveInventoryReport, MixedCompositionReport, MortalityTrendReport, SizeDistributionReport,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::analytics::{
    export_lots_csv, parse_days, resolve_date_range, AnalyticsService, LotAnalyticsQuery,
};
use crate::AppState;

/// `{ "success": true, ...report }`
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> SuccessResponse<T> {
    fn new(body: T) -> Self {
        Self {
            success: true,
            body,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlupsyFilterQuery {
    pub flupsy_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendQuery {
    pub days: Option<String>,
}

/// `all` and blank select every FLUPSY
fn parse_flupsy_filter(raw: Option<&str>) -> AppResult<Option<Uuid>> {
    match raw.map(str::trim).filter(|s| !s.is_empty() && *s != "all") {
        None => Ok(None),
        Some(text) => Uuid::parse_str(text).map(Some).map_err(|_| {
            AppError::validation(
                "flupsyId",
                "Invalid FLUPSY identifier",
                "Identificativo FLUPSY non valido",
            )
        }),
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn service(state: &AppState) -> AnalyticsService {
    AnalyticsService::new(state.db.clone(), state.config.analytics.thresholds())
}

/// Lots report, as JSON or as an Italian-labelled CSV download
pub async fn get_lots_analytics(
    State(state): State<AppState>,
    Query(query): Query<LotAnalyticsQuery>,
) -> AppResult<impl IntoResponse> {
    let today = today();
    let range = resolve_date_range(
        query.period.as_deref(),
        query.date_from.as_deref(),
        query.date_to.as_deref(),
        today,
        state.config.analytics.default_period_days,
    )?;

    tracing::debug!(
        start = %range.start,
        end = %range.end,
        supplier = ?query.supplier_filter(),
        "Lot analytics requested"
    );

    let lots = service(&state)
        .lots(range, query.supplier_filter(), today)
        .await?;

    if query.wants_csv() {
        let csv = export_lots_csv(&lots)?;
        let disposition = format!("attachment; filename=\"analytics_lotti_{}.csv\"", today);
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(lots).into_response())
    }
}

pub async fn get_single_lot_analytics(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let lot = service(&state).single_lot(lot_id, today()).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "lotAnalytics": lot,
    })))
}

pub async fn get_suppliers(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(service(&state).suppliers().await?))
}

pub async fn get_live_inventory(
    State(state): State<AppState>,
    Query(query): Query<FlupsyFilterQuery>,
) -> AppResult<Json<SuccessResponse<LiveInventoryReport>>> {
    let flupsy_id = parse_flupsy_filter(query.flupsy_id.as_deref())?;
    let report = service(&state).live_inventory(flupsy_id, today()).await?;
    Ok(Json(SuccessResponse::new(report)))
}

pub async fn get_mortality_trends(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> AppResult<Json<SuccessResponse<MortalityTrendReport>>> {
    let days = parse_days(
        query.days.as_deref(),
        state.config.analytics.default_period_days,
    )?;
    let report = service(&state).mortality_trends(days, today()).await?;
    Ok(Json(SuccessResponse::new(report)))
}

pub async fn get_sizes_distribution(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<SizeDistributionReport>>> {
    let report = service(&state).sizes_distribution(today()).await?;
    Ok(Json(SuccessResponse::new(report)))
}

pub async fn get_mixed_lots_composition(
    State(state): State<AppState>,
    Query(query): Query<FlupsyFilterQuery>,
) -> AppResult<Json<SuccessResponse<MixedCompositionReport>>> {
    let flupsy_id = parse_flupsy_filter(query.flupsy_id.as_deref())?;
    let report = service(&state).mixed_lots_composition(flupsy_id).await?;
    Ok(Json(SuccessResponse::new(report)))
}

pub async fn get_lot_traceability(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let traceability = service(&state).lot_traceability(lot_id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "traceability": traceability,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flupsy_filter() {
        assert_eq!(parse_flupsy_filter(None).unwrap(), None);
        assert_eq!(parse_flupsy_filter(Some("all")).unwrap(), None);
        let id = Uuid::new_v4();
        assert_eq!(
            parse_flupsy_filter(Some(&id.to_string())).unwrap(),
            Some(id)
        );
        assert!(parse_flupsy_filter(Some("12")).is_err());
    }

    #[test]
    fn test_success_envelope_flattens_report() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Report {
            total_days: i64,
        }
        let json = serde_json::to_value(SuccessResponse::new(Report { total_days: 3 })).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "totalDays": 3 }));
    }
}
