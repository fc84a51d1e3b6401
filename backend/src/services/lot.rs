//! Lot intake and management service

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::measurement::{calculate, DerivedMeasurement, MeasurementInput};
use shared::sizing::{suggest_size, SizeSuggestion};
use shared::validation::validate_supplier;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{Lot, LotQuality, LotRecord, LotState, LOT_COLUMNS};
use crate::services::size::SizeService;

/// Lot service for supplier intake and lot bookkeeping
#[derive(Clone)]
pub struct LotService {
    db: PgPool,
}

/// Filters for listing lots
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotFilter {
    pub supplier: Option<String>,
    pub state: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Input for registering a lot on arrival.
///
/// When `animal_count` is missing, the count (and weight) are derived from
/// the sample fields with the measurement calculator.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLotInput {
    pub arrival_date: NaiveDate,
    #[validate(length(min = 1, max = 200))]
    pub supplier: String,
    #[validate(length(max = 100))]
    pub supplier_lot_number: Option<String>,
    pub quality: Option<LotQuality>,
    #[validate(range(min = 0))]
    pub animal_count: Option<i64>,
    pub weight_grams: Option<Decimal>,
    pub size_id: Option<Uuid>,
    pub sample_weight_grams: Option<Decimal>,
    #[validate(range(min = 0))]
    pub sample_count: Option<i64>,
    pub total_weight_kg: Option<Decimal>,
    pub notes: Option<String>,
}

impl CreateLotInput {
    fn has_sample(&self) -> bool {
        self.sample_weight_grams.is_some() || self.sample_count.is_some()
    }

    fn measurement_input(&self) -> MeasurementInput {
        MeasurementInput {
            sample_weight_grams: self.sample_weight_grams,
            sample_count: self.sample_count,
            total_weight_kg: self
                .total_weight_kg
                .or_else(|| self.weight_grams.map(|g| g / Decimal::ONE_THOUSAND)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLotInput {
    #[validate(length(min = 1, max = 200))]
    pub supplier: Option<String>,
    #[validate(length(max = 100))]
    pub supplier_lot_number: Option<String>,
    pub quality: Option<LotQuality>,
    pub size_id: Option<Uuid>,
    pub state: Option<LotState>,
    pub mortality_notes: Option<String>,
    pub notes: Option<String>,
}

/// A created lot plus the derived figures used to fill it in
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedLot {
    #[serde(flatten)]
    pub lot: Lot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<DerivedMeasurement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_suggestion: Option<SizeSuggestion>,
}

impl LotService {
    /// Create a new LotService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &LotFilter) -> AppResult<Vec<Lot>> {
        let sql = format!(
            r#"
            SELECT {} FROM lots
            WHERE ($1::TEXT IS NULL OR supplier = $1)
              AND ($2::TEXT IS NULL OR state = $2)
              AND ($3::DATE IS NULL OR arrival_date >= $3)
              AND ($4::DATE IS NULL OR arrival_date <= $4)
            ORDER BY arrival_date DESC, created_at DESC
            "#,
            LOT_COLUMNS
        );
        let rows = sqlx::query_as::<_, LotRecord>(&sql)
            .bind(&filter.supplier)
            .bind(&filter.state)
            .bind(filter.date_from)
            .bind(filter.date_to)
            .fetch_all(&self.db)
            .await?;

        rows.into_iter().map(LotRecord::into_model).collect()
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Lot> {
        let sql = format!("SELECT {} FROM lots WHERE id = $1", LOT_COLUMNS);
        sqlx::query_as::<_, LotRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Lot".to_string()))?
            .into_model()
    }

    pub async fn create(&self, input: CreateLotInput) -> AppResult<CreatedLot> {
        input.validate()?;
        validate_supplier(&input.supplier).map_err(|msg| {
            AppError::validation("supplier", msg, "Il fornitore è obbligatorio")
        })?;

        let measurement = if input.has_sample() {
            Some(calculate(&input.measurement_input())?)
        } else {
            None
        };

        let animal_count = input
            .animal_count
            .or_else(|| measurement.as_ref().map(|m| m.total_population));
        let weight_grams = input
            .weight_grams
            .or_else(|| measurement.as_ref().and_then(|m| m.total_weight_grams()));

        let size_suggestion = match (input.size_id, &measurement) {
            (None, Some(m)) => {
                let sizes = SizeService::new(self.db.clone()).list().await?;
                suggest_size(m.animals_per_kg, &sizes)
            }
            _ => None,
        };
        let size_id = input
            .size_id
            .or_else(|| size_suggestion.as_ref().map(|s| s.size_id));

        let sql = format!(
            r#"
            INSERT INTO lots (id, arrival_date, supplier, supplier_lot_number, quality,
                              animal_count, weight_grams, size_id, total_mortality, notes, state)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, 'active')
            RETURNING {}
            "#,
            LOT_COLUMNS
        );
        let lot = sqlx::query_as::<_, LotRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.arrival_date)
            .bind(input.supplier.trim())
            .bind(&input.supplier_lot_number)
            .bind(input.quality.map(|q| q.as_str()))
            .bind(animal_count)
            .bind(weight_grams)
            .bind(size_id)
            .bind(&input.notes)
            .fetch_one(&self.db)
            .await?
            .into_model()?;

        tracing::info!(
            lot_id = %lot.id,
            supplier = %lot.supplier,
            animal_count = ?lot.animal_count,
            "Lot registered"
        );

        Ok(CreatedLot {
            lot,
            measurement,
            size_suggestion,
        })
    }

    pub async fn update(&self, id: Uuid, input: UpdateLotInput) -> AppResult<Lot> {
        input.validate()?;

        let sql = format!(
            r#"
            UPDATE lots SET
                supplier = COALESCE($2, supplier),
                supplier_lot_number = COALESCE($3, supplier_lot_number),
                quality = COALESCE($4, quality),
                size_id = COALESCE($5, size_id),
                state = COALESCE($6, state),
                mortality_notes = COALESCE($7, mortality_notes),
                notes = COALESCE($8, notes)
            WHERE id = $1
            RETURNING {}
            "#,
            LOT_COLUMNS
        );
        sqlx::query_as::<_, LotRecord>(&sql)
            .bind(id)
            .bind(input.supplier.as_deref().map(str::trim))
            .bind(&input.supplier_lot_number)
            .bind(input.quality.map(|q| q.as_str()))
            .bind(input.size_id)
            .bind(input.state.map(|s| s.as_str()))
            .bind(&input.mortality_notes)
            .bind(&input.notes)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Lot".to_string()))?
            .into_model()
    }
}
