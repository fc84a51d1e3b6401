//! Basket operation registration service
//!
//! Registering an operation re-derives its measurement fields with the
//! shared calculator and applies its side effects (cycle opening/closing,
//! basket state, lot composition and lot mortality) in one transaction.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::allocation::{balanced_rounding, AllocationError, LotAllocation};
use shared::analytics::{percentage, round1};
use shared::measurement::{
    average_weight_mg, calculate, DerivedMeasurement, MeasurementError, MeasurementInput,
};
use shared::sizing::{suggest_size, SizeSuggestion};
use shared::types::{PaginatedResponse, Pagination, PaginationMeta};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    generate_cycle_code, Basket, BasketState, Operation, OperationRecord, OperationType,
    OPERATION_COLUMNS,
};
use crate::services::basket::BasketService;
use crate::services::cycle::CycleService;
use crate::services::size::SizeService;

#[derive(Clone)]
pub struct OperationService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationFilter {
    pub basket_id: Option<Uuid>,
    pub cycle_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub operation_type: Option<OperationType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOperationInput {
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    pub date: NaiveDate,
    pub basket_id: Uuid,
    /// Must match the basket's active cycle when given
    pub cycle_id: Option<Uuid>,
    pub lot_id: Option<Uuid>,
    pub size_id: Option<Uuid>,
    #[validate(range(min = 0, max = 1_000_000_000_000))]
    pub animal_count: Option<i64>,
    pub total_weight_grams: Option<Decimal>,
    #[validate(range(min = 1, max = 1_000_000_000))]
    pub animals_per_kg: Option<i64>,
    #[validate(range(min = 0, max = 1_000_000_000_000))]
    pub dead_count: Option<i64>,
    /// Raw sample; when present every derived field comes from it
    pub measurement: Option<MeasurementInput>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Upper bound for a weighed basket, 1000 t
const MAX_TOTAL_WEIGHT_GRAMS: i64 = 1_000_000_000_000;

/// Fields persisted on the operation after derivation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedFields {
    pub animal_count: Option<i64>,
    pub total_weight_grams: Option<Decimal>,
    pub animals_per_kg: Option<i64>,
    pub average_weight_mg: Option<Decimal>,
    pub dead_count: Option<i64>,
    pub mortality_rate: Option<Decimal>,
}

/// Derive the stored fields from an operation payload.
///
/// Explicit counts and weights win over calculator output; dead counts from
/// a sample are always extrapolated to the whole basket.
pub fn derive_fields(input: &CreateOperationInput) -> Result<DerivedFields, MeasurementError> {
    if let Some(grams) = input.total_weight_grams {
        if grams < Decimal::ZERO {
            return Err(MeasurementError::NegativeValue {
                field: "totalWeightGrams",
            });
        }
        if grams > Decimal::from(MAX_TOTAL_WEIGHT_GRAMS) {
            return Err(MeasurementError::OutOfRange {
                field: "totalWeightGrams",
            });
        }
    }

    if let Some(sample) = &input.measurement {
        let derived = calculate(sample)?;
        return Ok(DerivedFields {
            animal_count: input.animal_count.or(Some(derived.total_population)),
            total_weight_grams: input
                .total_weight_grams
                .or_else(|| derived.total_weight_grams()),
            animals_per_kg: Some(derived.animals_per_kg),
            average_weight_mg: Some(derived.average_weight_mg),
            dead_count: derived.total_dead_count.or(input.dead_count),
            mortality_rate: derived.mortality_rate,
        });
    }

    let animals_per_kg = input.animals_per_kg;
    let animal_count = match (input.animal_count, animals_per_kg, input.total_weight_grams) {
        (Some(count), _, _) => Some(count),
        (None, Some(apk), Some(grams)) if grams > Decimal::ZERO => Some(
            Decimal::from(apk)
                .checked_mul(grams)
                .and_then(|v| v.checked_div(Decimal::ONE_THOUSAND))
                .and_then(|v| v.round().to_i64())
                .ok_or(MeasurementError::OutOfRange {
                    field: "animalCount",
                })?,
        ),
        _ => None,
    };

    let mortality_rate = match (input.dead_count, animal_count) {
        (Some(dead), Some(count)) => {
            let whole = dead.checked_add(count).ok_or(MeasurementError::OutOfRange {
                field: "deadCount",
            })?;
            (whole > 0).then(|| round1(percentage(dead, whole)))
        }
        _ => None,
    };

    Ok(DerivedFields {
        animal_count,
        total_weight_grams: input.total_weight_grams,
        animals_per_kg,
        average_weight_mg: animals_per_kg.and_then(average_weight_mg),
        dead_count: input.dead_count,
        mortality_rate,
    })
}

/// Row written to `operations`
pub(crate) struct NewOperation<'a> {
    pub date: NaiveDate,
    pub operation_type: OperationType,
    pub basket_id: Uuid,
    pub cycle_id: Uuid,
    pub size_id: Option<Uuid>,
    pub lot_id: Option<Uuid>,
    pub fields: &'a DerivedFields,
    pub notes: Option<&'a str>,
}

/// Calculator output for a form preview
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPreview {
    pub measurement: DerivedMeasurement,
    pub size_suggestion: Option<SizeSuggestion>,
}

impl OperationService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &OperationFilter) -> AppResult<PaginatedResponse<Operation>> {
        let pagination = Pagination::from_query(filter.page, filter.page_size);
        let where_clause = r#"
            WHERE ($1::UUID IS NULL OR basket_id = $1)
              AND ($2::UUID IS NULL OR cycle_id = $2)
              AND ($3::TEXT IS NULL OR type = $3)
              AND ($4::DATE IS NULL OR date >= $4)
              AND ($5::DATE IS NULL OR date <= $5)
        "#;
        let operation_type = filter.operation_type.map(|t| t.as_str());

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM operations {}",
            where_clause
        ))
        .bind(filter.basket_id)
        .bind(filter.cycle_id)
        .bind(operation_type)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_one(&self.db)
        .await?;

        let sql = format!(
            "SELECT {} FROM operations {} ORDER BY date DESC, created_at DESC LIMIT $6 OFFSET $7",
            OPERATION_COLUMNS, where_clause
        );
        let rows = sqlx::query_as::<_, OperationRecord>(&sql)
            .bind(filter.basket_id)
            .bind(filter.cycle_id)
            .bind(operation_type)
            .bind(filter.date_from)
            .bind(filter.date_to)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.db)
            .await?;

        let data = rows
            .into_iter()
            .map(OperationRecord::into_model)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(pagination, total.max(0) as u64),
        })
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Operation> {
        let sql = format!("SELECT {} FROM operations WHERE id = $1", OPERATION_COLUMNS);
        sqlx::query_as::<_, OperationRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Operation".to_string()))?
            .into_model()
    }

    /// Run the calculator and size suggestion without persisting anything
    pub async fn preview(&self, input: MeasurementInput) -> AppResult<OperationPreview> {
        let measurement = calculate(&input)?;
        let sizes = SizeService::new(self.db.clone()).list().await?;
        let size_suggestion = suggest_size(measurement.animals_per_kg, &sizes);
        Ok(OperationPreview {
            measurement,
            size_suggestion,
        })
    }

    pub async fn create(&self, input: CreateOperationInput) -> AppResult<Operation> {
        input.validate()?;
        let derived = derive_fields(&input)?;

        let size_id = match (input.size_id, derived.animals_per_kg) {
            (Some(id), _) => Some(id),
            (None, Some(apk)) => {
                let sizes = SizeService::new(self.db.clone()).list().await?;
                suggest_size(apk, &sizes).map(|s| s.size_id)
            }
            (None, None) => None,
        };

        let kind = input.operation_type;
        let mut tx = self.db.begin().await?;
        let basket = BasketService::lock_basket(&mut tx, input.basket_id).await?;

        let (cycle_id, lot_id) = if kind.opens_cycle() {
            if basket.state != BasketState::Available {
                return Err(AppError::InvalidStateTransition(format!(
                    "basket #{} already has an active cycle",
                    basket.physical_number
                )));
            }
            let lot_id = input.lot_id.ok_or_else(|| {
                AppError::validation(
                    "lotId",
                    "A lot is required to activate a basket",
                    "Per la prima attivazione è necessario indicare il lotto",
                )
            })?;
            Self::ensure_lot_exists(&mut tx, lot_id).await?;

            let cycle_id = Self::open_cycle(&mut tx, &basket, input.date).await?;

            CycleService::insert_composition(
                &mut tx,
                basket.id,
                cycle_id,
                lot_id,
                derived.animal_count.unwrap_or(0),
                Decimal::ONE_HUNDRED,
                None,
            )
            .await?;

            (cycle_id, Some(lot_id))
        } else {
            let active_cycle = basket
                .current_cycle_id
                .filter(|_| basket.state == BasketState::Active)
                .ok_or_else(|| {
                    AppError::InvalidStateTransition(format!(
                        "basket #{} has no active cycle",
                        basket.physical_number
                    ))
                })?;
            if input.cycle_id.is_some_and(|requested| requested != active_cycle) {
                return Err(AppError::validation(
                    "cycleId",
                    "The cycle is not the basket's active cycle",
                    "Il ciclo indicato non è il ciclo attivo del cestello",
                ));
            }
            let lot_id = match input.lot_id {
                Some(id) => Some(id),
                None => Self::dominant_lot(&mut tx, active_cycle).await?,
            };
            (active_cycle, lot_id)
        };

        let operation = Self::insert_operation(
            &mut tx,
            &NewOperation {
                date: input.date,
                operation_type: kind,
                basket_id: basket.id,
                cycle_id,
                size_id,
                lot_id,
                fields: &derived,
                notes: input.notes.as_deref(),
            },
        )
        .await?;

        if let Some(dead) = derived.dead_count.filter(|d| *d > 0) {
            Self::distribute_mortality(&mut tx, cycle_id, dead).await?;
        }

        if !kind.opens_cycle() && !kind.closes_cycle() {
            if let Some(count) = derived.animal_count.filter(|c| *c > 0) {
                Self::rescale_composition(&mut tx, cycle_id, count).await?;
            }
        }

        if kind.closes_cycle() {
            Self::close_cycle(&mut tx, cycle_id, basket.id, input.date).await?;
        }

        tx.commit().await?;

        tracing::info!(
            operation_id = %operation.id,
            operation_type = %kind,
            basket = basket.physical_number,
            cycle_id = %cycle_id,
            "Operation registered"
        );

        Ok(operation)
    }

    /// Start an active cycle on an available basket and stamp its cycle code
    pub(crate) async fn open_cycle(
        tx: &mut Transaction<'_, Postgres>,
        basket: &Basket,
        date: NaiveDate,
    ) -> AppResult<Uuid> {
        let cycle_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO cycles (id, basket_id, start_date, state) VALUES ($1, $2, $3, 'active')",
        )
        .bind(cycle_id)
        .bind(basket.id)
        .bind(date)
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            "UPDATE baskets SET state = 'active', current_cycle_id = $2, cycle_code = $3 WHERE id = $1",
        )
        .bind(basket.id)
        .bind(cycle_id)
        .bind(generate_cycle_code(basket.physical_number, date))
        .execute(&mut **tx)
        .await?;

        Ok(cycle_id)
    }

    /// Close a cycle on `date` and make its basket available again
    pub(crate) async fn close_cycle(
        tx: &mut Transaction<'_, Postgres>,
        cycle_id: Uuid,
        basket_id: Uuid,
        date: NaiveDate,
    ) -> AppResult<()> {
        sqlx::query("UPDATE cycles SET state = 'closed', end_date = $2 WHERE id = $1")
            .bind(cycle_id)
            .bind(date)
            .execute(&mut **tx)
            .await?;
        sqlx::query(
            "UPDATE baskets SET state = 'available', current_cycle_id = NULL, cycle_code = NULL WHERE id = $1",
        )
        .bind(basket_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub(crate) async fn insert_operation(
        tx: &mut Transaction<'_, Postgres>,
        op: &NewOperation<'_>,
    ) -> AppResult<Operation> {
        let sql = format!(
            r#"
            INSERT INTO operations (id, date, type, basket_id, cycle_id, size_id, lot_id,
                                    animal_count, total_weight_grams, animals_per_kg,
                                    average_weight_mg, dead_count, mortality_rate, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            OPERATION_COLUMNS
        );
        sqlx::query_as::<_, OperationRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(op.date)
            .bind(op.operation_type.as_str())
            .bind(op.basket_id)
            .bind(op.cycle_id)
            .bind(op.size_id)
            .bind(op.lot_id)
            .bind(op.fields.animal_count)
            .bind(op.fields.total_weight_grams)
            .bind(op.fields.animals_per_kg)
            .bind(op.fields.average_weight_mg)
            .bind(op.fields.dead_count)
            .bind(op.fields.mortality_rate)
            .bind(op.notes)
            .fetch_one(&mut **tx)
            .await?
            .into_model()
    }

    /// Add per-lot dead counts to the lots' running mortality
    pub(crate) async fn add_lot_mortality(
        tx: &mut Transaction<'_, Postgres>,
        shares: &[LotAllocation],
    ) -> AppResult<()> {
        for share in shares.iter().filter(|a| a.allocated > 0) {
            sqlx::query("UPDATE lots SET total_mortality = total_mortality + $2 WHERE id = $1")
                .bind(share.lot_id)
                .bind(share.allocated)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn ensure_lot_exists(tx: &mut Transaction<'_, Postgres>, lot_id: Uuid) -> AppResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM lots WHERE id = $1)")
            .bind(lot_id)
            .fetch_one(&mut **tx)
            .await?;
        if exists {
            Ok(())
        } else {
            Err(AppError::NotFound("Lot".to_string()))
        }
    }

    /// Lot with the largest share of the cycle
    async fn dominant_lot(
        tx: &mut Transaction<'_, Postgres>,
        cycle_id: Uuid,
    ) -> AppResult<Option<Uuid>> {
        let lot_id = sqlx::query_scalar(
            r#"
            SELECT lot_id FROM basket_lot_composition
            WHERE cycle_id = $1
            ORDER BY percentage DESC, created_at ASC
            LIMIT 1
            "#,
        )
        .bind(cycle_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(lot_id)
    }

    async fn composition_shares(
        tx: &mut Transaction<'_, Postgres>,
        cycle_id: Uuid,
    ) -> AppResult<Vec<(Uuid, i64, Decimal)>> {
        let rows = sqlx::query_as::<_, (Uuid, i64, Decimal)>(
            r#"
            SELECT lot_id, animal_count, percentage FROM basket_lot_composition
            WHERE cycle_id = $1
            ORDER BY percentage DESC, created_at ASC
            "#,
        )
        .bind(cycle_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows)
    }

    /// Add a basket's dead count to its lots, split by their animal counts
    async fn distribute_mortality(
        tx: &mut Transaction<'_, Postgres>,
        cycle_id: Uuid,
        dead: i64,
    ) -> AppResult<()> {
        let rows = Self::composition_shares(tx, cycle_id).await?;
        if rows.is_empty() {
            tracing::warn!(cycle_id = %cycle_id, dead, "No lot composition, mortality not distributed");
            return Ok(());
        }

        let by_count: Vec<(Uuid, Decimal)> = rows
            .iter()
            .map(|(lot, count, _)| (*lot, Decimal::from(*count)))
            .collect();
        let allocation = match balanced_rounding(dead, &by_count) {
            Err(AllocationError::ZeroShareSum) => {
                let by_percentage: Vec<(Uuid, Decimal)> =
                    rows.iter().map(|(lot, _, pct)| (*lot, *pct)).collect();
                balanced_rounding(dead, &by_percentage)?
            }
            other => other?,
        };

        Self::add_lot_mortality(tx, &allocation.allocations).await?;

        tracing::debug!(cycle_id = %cycle_id, dead, lots = allocation.allocations.len(), "Mortality distributed");
        Ok(())
    }

    /// Re-split a newly counted basket population over the cycle's lots
    async fn rescale_composition(
        tx: &mut Transaction<'_, Postgres>,
        cycle_id: Uuid,
        population: i64,
    ) -> AppResult<()> {
        let rows = Self::composition_shares(tx, cycle_id).await?;
        if rows.is_empty() {
            return Ok(());
        }

        let shares: Vec<(Uuid, Decimal)> =
            rows.iter().map(|(lot, _, pct)| (*lot, *pct)).collect();
        let allocation = match balanced_rounding(population, &shares) {
            Ok(allocation) => allocation,
            Err(err) => {
                tracing::warn!(cycle_id = %cycle_id, error = %err, "Composition not rescaled");
                return Ok(());
            }
        };

        for share in &allocation.allocations {
            sqlx::query(
                "UPDATE basket_lot_composition SET animal_count = $3 WHERE cycle_id = $1 AND lot_id = $2",
            )
            .bind(cycle_id)
            .bind(share.lot_id)
            .bind(share.allocated)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}
