//! Lot, mortality and inventory analytics
//!
//! SQL here only loads raw facts; every derived figure and classification
//! comes from `shared::analytics`.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::analytics::{
    build_live_inventory, build_lot_analytics, build_mixed_composition, build_mortality_trends,
    build_single_lot_analytics, build_size_distribution, percentage, round1, AnalyticsThresholds,
    CompositionEntry, DistributionStats, InventoryRecord, LiveInventoryReport, LotAnalytics,
    LotFacts, MixedBasketFacts, MixedComponent, MixedCompositionReport, MortalityRecord,
    MortalityTrendReport, SingleLotAnalytics, SingleLotFacts, SizeAggregate,
    SizeDistributionReport,
};
use shared::types::DateRange;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{BasketRow, OperationType};

/// Window used for recent weight averages and growth series
const RECENT_WINDOW_DAYS: i64 = 30;

const SALE_TYPES: &str = "('vendita', 'selezione-vendita')";

/// Which measurements feed a lot's weight averages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WeightWindow {
    /// Every measurement recorded on the lot's cycles
    AllTime,
    /// Measurements from the last `RECENT_WINDOW_DAYS`
    Recent,
}

impl WeightWindow {
    fn since(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            WeightWindow::AllTime => None,
            WeightWindow::Recent => Some(today - Duration::days(RECENT_WINDOW_DAYS)),
        }
    }
}

/// The lots report averages a lot's whole measurement history
const LOTS_REPORT_WEIGHTS: WeightWindow = WeightWindow::AllTime;

/// Growth in the single-lot view compares against recent measurements
const SINGLE_LOT_WEIGHTS: WeightWindow = WeightWindow::Recent;

#[derive(Clone)]
pub struct AnalyticsService {
    db: PgPool,
    thresholds: AnalyticsThresholds,
}

/// Query parameters of the lots report
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotAnalyticsQuery {
    pub period: Option<String>,
    pub supplier: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub format: Option<String>,
}

impl LotAnalyticsQuery {
    /// `all` and blank mean no supplier filter
    pub fn supplier_filter(&self) -> Option<&str> {
        self.supplier
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "all")
    }

    pub fn wants_csv(&self) -> bool {
        self.format.as_deref() == Some("csv")
    }
}

fn parse_date(field: &str, raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::InvalidDate(format!("{}: '{}' (expected YYYY-MM-DD)", field, raw)))
}

/// Parse a positive day count, falling back to `default_days` when absent
pub fn parse_days(raw: Option<&str>, default_days: i64) -> AppResult<i64> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default_days),
        Some(text) => match text.parse::<i64>() {
            Ok(days) if days > 0 => Ok(days),
            _ => Err(AppError::validation(
                "period",
                "The period must be a positive number of days",
                "Il periodo deve essere un numero di giorni positivo",
            )),
        },
    }
}

/// Resolve the report window.
///
/// Explicit dates win over `period`; a single explicit bound is paired with
/// a window of `period` days on the other side.
pub fn resolve_date_range(
    period: Option<&str>,
    date_from: Option<&str>,
    date_to: Option<&str>,
    today: NaiveDate,
    default_days: i64,
) -> AppResult<DateRange> {
    let days = parse_days(period, default_days)?;
    let from = date_from
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_date("dateFrom", s))
        .transpose()?;
    let to = date_to
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_date("dateTo", s))
        .transpose()?;

    let range = match (from, to) {
        (Some(start), Some(end)) => DateRange { start, end },
        (Some(start), None) => DateRange { start, end: today },
        (None, Some(end)) => DateRange {
            start: end - Duration::days(days),
            end,
        },
        (None, None) => DateRange::from_period(days, today),
    };

    if range.start > range.end {
        return Err(AppError::InvalidDate(format!(
            "dateFrom {} is after dateTo {}",
            range.start, range.end
        )));
    }
    Ok(range)
}

/// Render the lots report with Italian column headers
pub fn export_lots_csv(lots: &[LotAnalytics]) -> AppResult<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let csv_error = |e: csv::Error| AppError::Internal(format!("CSV serialization error: {}", e));

    wtr.write_record([
        "ID",
        "Fornitore",
        "Numero Lotto",
        "Data Arrivo",
        "Animali Iniziali",
        "Animali Attuali",
        "Animali Venduti",
        "Mortalità",
        "Mortalità %",
        "Stato",
        "Giorni nel Sistema",
        "Cestelli Utilizzati",
    ])
    .map_err(csv_error)?;

    for lot in lots {
        wtr.write_record([
            lot.id.to_string(),
            lot.supplier.clone(),
            lot.supplier_lot_number.clone(),
            lot.arrival_date.format("%Y-%m-%d").to_string(),
            lot.initial_count.to_string(),
            lot.current_count.to_string(),
            lot.sold_count.to_string(),
            lot.mortality_count.to_string(),
            format!("{:.2}", lot.mortality_percentage),
            lot.status.label_it().to_string(),
            lot.days_in_system.to_string(),
            lot.baskets_used.to_string(),
        ])
        .map_err(csv_error)?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct LotRow {
    id: Uuid,
    supplier: String,
    supplier_lot_number: Option<String>,
    arrival_date: NaiveDate,
    initial_count: i64,
    weight_grams: Option<Decimal>,
    total_mortality: i64,
    notes: Option<String>,
}

const LOT_ROW_COLUMNS: &str = "id, supplier, supplier_lot_number, arrival_date, \
    COALESCE(animal_count, 0) AS initial_count, weight_grams, total_mortality, notes";

#[derive(Debug, FromRow)]
struct CompositionRow {
    lot_id: Uuid,
    basket_id: Uuid,
    animal_count: i64,
    percentage: Decimal,
    active: bool,
}

#[derive(Debug, FromRow)]
struct SalesRow {
    lot_id: Uuid,
    sold_count: i64,
    sold_weight_grams: Decimal,
}

#[derive(Debug, FromRow)]
struct LastOperationRow {
    lot_id: Uuid,
    operation_type: String,
    date: NaiveDate,
}

#[derive(Debug, FromRow)]
struct WeightRow {
    lot_id: Uuid,
    average_weight_mg: Option<Decimal>,
    average_animals_per_kg: Option<Decimal>,
}

#[derive(Debug, FromRow)]
struct InventoryRow {
    lot_id: Uuid,
    supplier: String,
    lot_number: Option<String>,
    arrival_date: NaiveDate,
    basket_id: Uuid,
    physical_number: i32,
    flupsy_name: Option<String>,
    #[sqlx(rename = "row")]
    basket_row: Option<String>,
    position: Option<i32>,
    animal_count: i64,
    percentage: Decimal,
}

#[derive(Debug, FromRow)]
struct MixedRow {
    basket_id: Uuid,
    cycle_id: Uuid,
    physical_number: i32,
    flupsy_id: Uuid,
    flupsy_name: String,
    lot_id: Uuid,
    supplier: String,
    lot_number: Option<String>,
    percentage: Decimal,
    animal_count: i64,
    total_mortality: i64,
}

// ============================================================================
// Traceability
// ============================================================================

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TraceLotInfo {
    pub id: Uuid,
    pub supplier: String,
    pub supplier_lot_number: Option<String>,
    pub arrival_date: NaiveDate,
    pub initial_animal_count: i64,
    pub initial_weight_grams: Option<Decimal>,
    pub total_mortality: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TraceComposition {
    pub basket_id: Uuid,
    pub basket_physical: i32,
    pub cycle_id: Uuid,
    pub cycle_state: String,
    pub animal_count: i64,
    pub percentage: Decimal,
    pub flupsy_name: String,
    pub position: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TraceOperation {
    pub id: Uuid,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub operation_type: String,
    pub basket_id: Uuid,
    pub basket_physical: i32,
    pub animal_count: Option<i64>,
    pub total_weight_grams: Option<Decimal>,
    pub dead_count: Option<i64>,
    pub notes: Option<String>,
    pub flupsy_name: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    pub total_operations: i64,
    pub baskets_used_historically: i64,
    pub current_active_baskets_count: i64,
    pub current_total_animals: i64,
    /// Share of the initial count still in active baskets
    pub distribution_efficiency: Decimal,
}

impl TraceSummary {
    fn new(initial_count: i64, history: &[TraceComposition], operations: usize) -> Self {
        let basket_ids: std::collections::HashSet<Uuid> =
            history.iter().map(|c| c.basket_id).collect();
        let current: Vec<&TraceComposition> =
            history.iter().filter(|c| c.cycle_state == "active").collect();
        let current_total_animals: i64 = current.iter().map(|c| c.animal_count).sum();

        Self {
            total_operations: operations as i64,
            baskets_used_historically: basket_ids.len() as i64,
            current_active_baskets_count: current.len() as i64,
            current_total_animals,
            distribution_efficiency: round1(percentage(current_total_animals, initial_count)),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotTraceability {
    pub lot_info: TraceLotInfo,
    pub composition_history: Vec<TraceComposition>,
    pub operations_history: Vec<TraceOperation>,
    pub current_distribution: Vec<TraceComposition>,
    pub summary: TraceSummary,
}

fn parse_operation_type(raw: &str) -> AppResult<OperationType> {
    OperationType::parse(raw)
        .ok_or_else(|| AppError::Internal(format!("unknown operation type '{}'", raw)))
}

impl AnalyticsService {
    pub fn new(db: PgPool, thresholds: AnalyticsThresholds) -> Self {
        Self { db, thresholds }
    }

    /// Per-lot report for lots that arrived within `range`
    pub async fn lots(
        &self,
        range: DateRange,
        supplier: Option<&str>,
        today: NaiveDate,
    ) -> AppResult<Vec<LotAnalytics>> {
        let started = Instant::now();

        let sql = format!(
            r#"
            SELECT {} FROM lots
            WHERE arrival_date >= $1 AND arrival_date <= $2
              AND ($3::TEXT IS NULL OR supplier = $3)
            ORDER BY arrival_date DESC, created_at DESC
            "#,
            LOT_ROW_COLUMNS
        );
        let lots = sqlx::query_as::<_, LotRow>(&sql)
            .bind(range.start)
            .bind(range.end)
            .bind(supplier)
            .fetch_all(&self.db)
            .await?;

        if lots.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = lots.iter().map(|l| l.id).collect();

        let mut compositions = self.compositions_by_lot(&ids).await?;
        let sales = self.sales_by_lot(&ids).await?;
        let last_operations = self.last_operation_by_lot(&ids).await?;
        let weights = self
            .weights_by_lot(&ids, LOTS_REPORT_WEIGHTS.since(today))
            .await?;

        let mut report = Vec::with_capacity(lots.len());
        for lot in lots {
            let (sold_count, sold_weight_grams) = sales
                .get(&lot.id)
                .copied()
                .unwrap_or((0, Decimal::ZERO));
            let facts = LotFacts {
                id: lot.id,
                supplier: lot.supplier,
                supplier_lot_number: lot.supplier_lot_number,
                arrival_date: lot.arrival_date,
                initial_count: lot.initial_count,
                total_mortality: lot.total_mortality,
                compositions: compositions.remove(&lot.id).unwrap_or_default(),
                sold_count,
                sold_weight_grams,
                average_weight_mg: weights.get(&lot.id).and_then(|w| w.average_weight_mg),
                last_operation: last_operations.get(&lot.id).copied(),
            };
            report.push(build_lot_analytics(&facts, today, &self.thresholds));
        }

        tracing::info!(
            lots = report.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Lot analytics computed"
        );
        Ok(report)
    }

    pub async fn single_lot(&self, lot_id: Uuid, today: NaiveDate) -> AppResult<SingleLotAnalytics> {
        let sql = format!("SELECT {} FROM lots WHERE id = $1", LOT_ROW_COLUMNS);
        let lot = sqlx::query_as::<_, LotRow>(&sql)
            .bind(lot_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Lot".to_string()))?;

        let ids = [lot_id];
        let compositions = self
            .compositions_by_lot(&ids)
            .await?
            .remove(&lot_id)
            .unwrap_or_default();
        let distribution = DistributionStats::from_compositions(&compositions);
        let (sold_count, _) = self
            .sales_by_lot(&ids)
            .await?
            .get(&lot_id)
            .copied()
            .unwrap_or((0, Decimal::ZERO));
        let last_operation = self.last_operation_by_lot(&ids).await?.get(&lot_id).copied();
        let recent_animals_per_kg = self
            .weights_by_lot(&ids, SINGLE_LOT_WEIGHTS.since(today))
            .await?
            .get(&lot_id)
            .and_then(|w| w.average_animals_per_kg);

        let facts = SingleLotFacts {
            id: lot.id,
            supplier: lot.supplier,
            supplier_lot_number: lot.supplier_lot_number,
            arrival_date: lot.arrival_date,
            initial_count: lot.initial_count,
            initial_weight_grams: lot.weight_grams,
            total_mortality: lot.total_mortality,
            sold_count,
            current_count: distribution.current_count,
            baskets_used: distribution.baskets_used,
            active_baskets_count: distribution.active_baskets_used,
            recent_animals_per_kg,
            last_operation,
            notes: lot.notes,
        };
        Ok(build_single_lot_analytics(&facts, today))
    }

    pub async fn suppliers(&self) -> AppResult<Vec<String>> {
        let suppliers = sqlx::query_scalar("SELECT DISTINCT supplier FROM lots ORDER BY supplier")
            .fetch_all(&self.db)
            .await?;
        Ok(suppliers)
    }

    pub async fn live_inventory(
        &self,
        flupsy_id: Option<Uuid>,
        today: NaiveDate,
    ) -> AppResult<LiveInventoryReport> {
        let started = Instant::now();

        let rows = sqlx::query_as::<_, InventoryRow>(
            r#"
            SELECT c.lot_id, l.supplier, l.supplier_lot_number AS lot_number, l.arrival_date,
                   c.basket_id, b.physical_number, f.name AS flupsy_name,
                   b."row", b."position",
                   c.animal_count, c.percentage
            FROM basket_lot_composition c
            JOIN lots l ON l.id = c.lot_id
            JOIN baskets b ON b.id = c.basket_id
            JOIN cycles cy ON cy.id = c.cycle_id
            LEFT JOIN flupsys f ON f.id = b.flupsy_id
            WHERE cy.state = 'active'
              AND ($1::UUID IS NULL OR b.flupsy_id = $1)
            ORDER BY l.arrival_date, b.physical_number
            "#,
        )
        .bind(flupsy_id)
        .fetch_all(&self.db)
        .await?;

        let records: Vec<InventoryRecord> = rows
            .into_iter()
            .map(|r| InventoryRecord {
                lot_id: r.lot_id,
                supplier: r.supplier,
                lot_number: r.lot_number,
                arrival_date: r.arrival_date,
                basket_id: r.basket_id,
                physical_number: r.physical_number,
                flupsy_name: r.flupsy_name,
                row: r.basket_row.as_deref().and_then(BasketRow::parse),
                position: r.position,
                animal_count: r.animal_count,
                percentage: r.percentage,
            })
            .collect();

        let mut report = build_live_inventory(&records, today);
        report.summary.calculation_time_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    pub async fn mortality_trends(&self, days: i64, today: NaiveDate) -> AppResult<MortalityTrendReport> {
        let since = today - Duration::days(days);
        let rows = sqlx::query_as::<_, (NaiveDate, Uuid, String, Option<String>, i64, Option<i64>)>(
            r#"
            SELECT o.date, o.lot_id, l.supplier, l.supplier_lot_number, o.dead_count, o.animal_count
            FROM operations o
            JOIN lots l ON l.id = o.lot_id
            WHERE o.date >= $1 AND o.dead_count IS NOT NULL AND o.dead_count > 0
            ORDER BY o.date ASC, o.created_at ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        let records: Vec<MortalityRecord> = rows
            .into_iter()
            .map(
                |(date, lot_id, supplier, lot_number, dead_count, animal_count)| MortalityRecord {
                    date,
                    lot_id,
                    supplier,
                    lot_number,
                    dead_count,
                    animal_count,
                },
            )
            .collect();

        Ok(build_mortality_trends(&records, days))
    }

    pub async fn sizes_distribution(&self, today: NaiveDate) -> AppResult<SizeDistributionReport> {
        let aggregates = sqlx::query_as::<
            _,
            (Uuid, String, String, i64, i64, Option<Decimal>, Option<NaiveDate>),
        >(
            r#"
            SELECT o.size_id, s.code, s.name,
                   COUNT(DISTINCT o.basket_id)::BIGINT,
                   COALESCE(SUM(o.animal_count), 0)::BIGINT,
                   AVG(o.average_weight_mg),
                   MAX(o.date)
            FROM operations o
            JOIN sizes s ON s.id = o.size_id
            JOIN cycles cy ON cy.id = o.cycle_id
            WHERE cy.state = 'active'
            GROUP BY o.size_id, s.code, s.name
            ORDER BY COALESCE(SUM(o.animal_count), 0) DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(
            |(size_id, size_code, size_name, basket_count, total_animals, average_weight_mg, last_update)| {
                SizeAggregate {
                    size_id,
                    size_code,
                    size_name,
                    basket_count,
                    total_animals,
                    average_weight_mg,
                    last_update,
                }
            },
        )
        .collect::<Vec<_>>();

        let growth = sqlx::query_as::<_, (Uuid, NaiveDate, Decimal)>(
            r#"
            SELECT size_id, date, average_weight_mg FROM operations
            WHERE date >= $1 AND size_id IS NOT NULL AND average_weight_mg IS NOT NULL
            ORDER BY date ASC
            "#,
        )
        .bind(today - Duration::days(RECENT_WINDOW_DAYS))
        .fetch_all(&self.db)
        .await?;

        Ok(build_size_distribution(&aggregates, &growth))
    }

    pub async fn mixed_lots_composition(&self, flupsy_id: Option<Uuid>) -> AppResult<MixedCompositionReport> {
        let rows = sqlx::query_as::<_, MixedRow>(
            r#"
            SELECT c.basket_id, c.cycle_id, b.physical_number, b.flupsy_id, f.name AS flupsy_name,
                   c.lot_id, l.supplier, l.supplier_lot_number AS lot_number,
                   c.percentage, c.animal_count, l.total_mortality
            FROM basket_lot_composition c
            JOIN baskets b ON b.id = c.basket_id
            JOIN flupsys f ON f.id = b.flupsy_id
            JOIN cycles cy ON cy.id = c.cycle_id
            JOIN lots l ON l.id = c.lot_id
            WHERE cy.state = 'active'
              AND ($1::UUID IS NULL OR b.flupsy_id = $1)
            ORDER BY b.physical_number, c.percentage DESC
            "#,
        )
        .bind(flupsy_id)
        .fetch_all(&self.db)
        .await?;

        let mut order: Vec<(Uuid, Uuid)> = Vec::new();
        let mut grouped: HashMap<(Uuid, Uuid), MixedBasketFacts> = HashMap::new();
        for row in rows {
            let key = (row.basket_id, row.cycle_id);
            let entry = grouped.entry(key).or_insert_with(|| {
                order.push(key);
                MixedBasketFacts {
                    basket_id: row.basket_id,
                    cycle_id: row.cycle_id,
                    physical_number: row.physical_number,
                    flupsy_id: row.flupsy_id,
                    flupsy_name: row.flupsy_name.clone(),
                    components: Vec::new(),
                }
            });
            entry.components.push(MixedComponent {
                lot_id: row.lot_id,
                supplier: row.supplier,
                lot_number: row.lot_number,
                percentage: row.percentage,
                animal_count: row.animal_count,
                total_mortality: row.total_mortality,
            });
        }

        let baskets = order
            .into_iter()
            .filter_map(|key| grouped.remove(&key))
            .collect();
        Ok(build_mixed_composition(baskets, &self.thresholds))
    }

    pub async fn lot_traceability(&self, lot_id: Uuid) -> AppResult<LotTraceability> {
        let lot_info = sqlx::query_as::<_, TraceLotInfo>(
            r#"
            SELECT id, supplier, supplier_lot_number, arrival_date,
                   COALESCE(animal_count, 0) AS initial_animal_count,
                   weight_grams AS initial_weight_grams, total_mortality
            FROM lots WHERE id = $1
            "#,
        )
        .bind(lot_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Lot".to_string()))?;

        let composition_history = sqlx::query_as::<_, TraceComposition>(
            r#"
            SELECT c.basket_id, b.physical_number AS basket_physical, c.cycle_id,
                   cy.state AS cycle_state, c.animal_count, c.percentage,
                   f.name AS flupsy_name,
                   COALESCE(b."row", '') || COALESCE(b."position"::TEXT, '') AS "position",
                   c.created_at, c.notes
            FROM basket_lot_composition c
            JOIN baskets b ON b.id = c.basket_id
            JOIN flupsys f ON f.id = b.flupsy_id
            JOIN cycles cy ON cy.id = c.cycle_id
            WHERE c.lot_id = $1
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(lot_id)
        .fetch_all(&self.db)
        .await?;

        let operations_history = sqlx::query_as::<_, TraceOperation>(
            r#"
            SELECT o.id, o.date, o.type, o.basket_id, b.physical_number AS basket_physical,
                   o.animal_count, o.total_weight_grams, o.dead_count, o.notes,
                   f.name AS flupsy_name
            FROM operations o
            JOIN baskets b ON b.id = o.basket_id
            JOIN flupsys f ON f.id = b.flupsy_id
            WHERE o.lot_id = $1
            ORDER BY o.date DESC, o.created_at DESC
            "#,
        )
        .bind(lot_id)
        .fetch_all(&self.db)
        .await?;

        let summary = TraceSummary::new(
            lot_info.initial_animal_count,
            &composition_history,
            operations_history.len(),
        );
        let current_distribution = composition_history
            .iter()
            .filter(|c| c.cycle_state == "active")
            .cloned()
            .collect();

        Ok(LotTraceability {
            lot_info,
            composition_history,
            operations_history,
            current_distribution,
            summary,
        })
    }

    // ------------------------------------------------------------------------
    // Batched fact loaders
    // ------------------------------------------------------------------------

    async fn compositions_by_lot(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<CompositionEntry>>> {
        let rows = sqlx::query_as::<_, CompositionRow>(
            r#"
            SELECT c.lot_id, c.basket_id, c.animal_count, c.percentage,
                   (cy.state = 'active') AS active
            FROM basket_lot_composition c
            JOIN cycles cy ON cy.id = c.cycle_id
            WHERE c.lot_id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?;

        let mut by_lot: HashMap<Uuid, Vec<CompositionEntry>> = HashMap::new();
        for row in rows {
            by_lot.entry(row.lot_id).or_default().push(CompositionEntry {
                basket_id: row.basket_id,
                animal_count: row.animal_count,
                percentage: row.percentage,
                active: row.active,
            });
        }
        Ok(by_lot)
    }

    async fn sales_by_lot(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, (i64, Decimal)>> {
        let sql = format!(
            r#"
            SELECT lot_id,
                   COALESCE(SUM(animal_count), 0)::BIGINT AS sold_count,
                   COALESCE(SUM(total_weight_grams), 0) AS sold_weight_grams
            FROM operations
            WHERE lot_id = ANY($1) AND type IN {}
            GROUP BY lot_id
            "#,
            SALE_TYPES
        );
        let rows = sqlx::query_as::<_, SalesRow>(&sql)
            .bind(ids)
            .fetch_all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.lot_id, (r.sold_count, r.sold_weight_grams)))
            .collect())
    }

    /// Latest operation on any cycle holding the lot
    async fn last_operation_by_lot(
        &self,
        ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, (OperationType, NaiveDate)>> {
        let rows = sqlx::query_as::<_, LastOperationRow>(
            r#"
            SELECT DISTINCT ON (c.lot_id) c.lot_id, o.type AS operation_type, o.date
            FROM operations o
            JOIN basket_lot_composition c ON c.cycle_id = o.cycle_id
            WHERE c.lot_id = ANY($1)
            ORDER BY c.lot_id, o.date DESC, o.created_at DESC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|r| Ok((r.lot_id, (parse_operation_type(&r.operation_type)?, r.date))))
            .collect()
    }

    /// Mean weight figures of the measurements on each lot's cycles,
    /// restricted to `since` onwards when given
    async fn weights_by_lot(
        &self,
        ids: &[Uuid],
        since: Option<NaiveDate>,
    ) -> AppResult<HashMap<Uuid, WeightRow>> {
        let rows = sqlx::query_as::<_, WeightRow>(
            r#"
            SELECT c.lot_id,
                   AVG(o.average_weight_mg) AS average_weight_mg,
                   AVG(o.animals_per_kg) AS average_animals_per_kg
            FROM operations o
            JOIN basket_lot_composition c ON c.cycle_id = o.cycle_id
            WHERE c.lot_id = ANY($1)
              AND ($2::DATE IS NULL OR o.date >= $2)
              AND (o.average_weight_mg IS NOT NULL OR o.animals_per_kg IS NOT NULL)
            GROUP BY c.lot_id
            "#,
        )
        .bind(ids)
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|r| (r.lot_id, r)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::analytics::{LotStatus, RiskLevel};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_lots_report_weights_are_unwindowed() {
        let today = date("2024-06-30");
        assert_eq!(LOTS_REPORT_WEIGHTS.since(today), None);
        assert_eq!(SINGLE_LOT_WEIGHTS.since(today), Some(date("2024-05-31")));
    }

    #[test]
    fn test_default_period_window() {
        let range = resolve_date_range(None, None, None, date("2024-06-30"), 30).unwrap();
        assert_eq!(range.start, date("2024-05-31"));
        assert_eq!(range.end, date("2024-06-30"));
    }

    #[test]
    fn test_explicit_dates_win_over_period() {
        let range = resolve_date_range(
            Some("7"),
            Some("2024-01-01"),
            Some("2024-03-31"),
            date("2024-06-30"),
            30,
        )
        .unwrap();
        assert_eq!(range.start, date("2024-01-01"));
        assert_eq!(range.end, date("2024-03-31"));
    }

    #[test]
    fn test_single_bound() {
        let today = date("2024-06-30");
        let from_only = resolve_date_range(None, Some("2024-06-01"), None, today, 30).unwrap();
        assert_eq!(from_only.end, today);

        let to_only = resolve_date_range(Some("10"), None, Some("2024-06-20"), today, 30).unwrap();
        assert_eq!(to_only.start, date("2024-06-10"));
    }

    #[test]
    fn test_malformed_dates_are_rejected() {
        let today = date("2024-06-30");
        assert!(matches!(
            resolve_date_range(None, Some("01/06/2024"), Some("2024-06-30"), today, 30),
            Err(AppError::InvalidDate(_))
        ));
        assert!(matches!(
            resolve_date_range(None, Some("2024-07-01"), Some("2024-06-01"), today, 30),
            Err(AppError::InvalidDate(_))
        ));
        assert!(matches!(
            resolve_date_range(Some("abc"), None, None, today, 30),
            Err(AppError::Validation { .. })
        ));
        assert!(parse_days(Some("0"), 30).is_err());
    }

    #[test]
    fn test_supplier_filter() {
        let mut query = LotAnalyticsQuery::default();
        assert_eq!(query.supplier_filter(), None);
        query.supplier = Some("all".to_string());
        assert_eq!(query.supplier_filter(), None);
        query.supplier = Some(" Ecotapes ".to_string());
        assert_eq!(query.supplier_filter(), Some("Ecotapes"));
    }

    fn lot_row() -> LotAnalytics {
        LotAnalytics {
            id: Uuid::nil(),
            supplier: "Ecotapes".to_string(),
            supplier_lot_number: "L-12".to_string(),
            arrival_date: date("2024-05-01"),
            initial_count: 12_000_000,
            current_count: 500_000,
            sold_count: 11_000_000,
            mortality_count: 120_000,
            mortality_percentage: Decimal::ONE,
            average_weight_mg: Decimal::ZERO,
            total_weight_grams: Decimal::ZERO,
            status: LotStatus::Sold,
            days_in_system: 60,
            baskets_used: 4,
            active_baskets_used: 1,
            last_operation: "vendita (2024-06-20)".to_string(),
            mixed_baskets_count: 0,
            pure_baskets_count: 4,
            average_distribution_percentage: Decimal::ONE_HUNDRED,
            fragmentation_level: Decimal::ZERO,
            is_mixed_lot: false,
            risk_level: RiskLevel::Basso,
            sold_weight_grams: Decimal::ZERO,
        }
    }

    #[test]
    fn test_csv_export_headers_and_rows() {
        let csv = export_lots_csv(&[lot_row()]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ID,Fornitore,Numero Lotto,Data Arrivo,Animali Iniziali,Animali Attuali,\
             Animali Venduti,Mortalità,Mortalità %,Stato,Giorni nel Sistema,Cestelli Utilizzati"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("Ecotapes,L-12,2024-05-01,12000000,500000,11000000,120000,1.00"));
        assert!(row.ends_with(",60,4"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_trace_summary() {
        let active = TraceComposition {
            basket_id: Uuid::new_v4(),
            basket_physical: 3,
            cycle_id: Uuid::new_v4(),
            cycle_state: "active".to_string(),
            animal_count: 250,
            percentage: Decimal::ONE_HUNDRED,
            flupsy_name: "Flupsy 1".to_string(),
            position: "DX3".to_string(),
            created_at: chrono::Utc::now(),
            notes: None,
        };
        let closed = TraceComposition {
            cycle_state: "closed".to_string(),
            animal_count: 700,
            ..active.clone()
        };

        let summary = TraceSummary::new(1_000, &[active, closed], 5);
        assert_eq!(summary.total_operations, 5);
        assert_eq!(summary.baskets_used_historically, 1);
        assert_eq!(summary.current_active_baskets_count, 1);
        assert_eq!(summary.current_total_animals, 250);
        assert_eq!(summary.distribution_efficiency, Decimal::from(25));
    }
}
