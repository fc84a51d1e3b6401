//! Screening (vagliatura) service
//!
//! A screening closes every source cycle, refills the destination baskets
//! with new cycles whose lot mix follows the pooled sources, and books the
//! shortfall as lot mortality, all in one transaction.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::measurement::{calculate, DerivedMeasurement, MeasurementInput};
use shared::screening::plan_screening;
use shared::sizing::suggest_size;
use shared::types::{PaginatedResponse, Pagination, PaginationMeta};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    BasketRow, BasketState, DestinationKind, OperationType, Screening, ScreeningDestinationBasket,
    ScreeningDestinationRecord, ScreeningDetail, ScreeningRecord, ScreeningSourceBasket,
    ScreeningSourceRecord, SCREENING_COLUMNS, SCREENING_DESTINATION_COLUMNS,
    SCREENING_SOURCE_COLUMNS,
};
use crate::services::basket::BasketService;
use crate::services::cycle::CycleService;
use crate::services::operation::{DerivedFields, NewOperation, OperationService};
use crate::services::size::SizeService;

#[derive(Clone)]
pub struct ScreeningService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningFilter {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningDestinationInput {
    pub basket_id: Uuid,
    #[serde(default)]
    pub kind: DestinationKind,
    /// Only used together with `row` and `position`; defaults to the basket's FLUPSY
    pub flupsy_id: Option<Uuid>,
    pub row: Option<BasketRow>,
    #[validate(range(min = 1))]
    pub position: Option<i32>,
    pub measurement: MeasurementInput,
    pub size_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateScreeningInput {
    pub date: NaiveDate,
    pub reference_size_id: Option<Uuid>,
    #[validate(length(min = 1))]
    pub source_basket_ids: Vec<Uuid>,
    #[validate(length(min = 1))]
    pub destinations: Vec<ScreeningDestinationInput>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Source basket as found when the screening starts
struct SourceBasket {
    basket_id: Uuid,
    cycle_id: Uuid,
    /// `(lot, animals)` ordered by share, largest first
    lots: Vec<(Uuid, i64)>,
}

impl SourceBasket {
    fn animal_count(&self) -> i64 {
        self.lots.iter().map(|(_, count)| *count).sum()
    }
}

/// No basket twice among the sources, nor among the destinations.
/// A source may be refilled as a destination since sources close first.
fn ensure_distinct_baskets(input: &CreateScreeningInput) -> AppResult<()> {
    let mut sources = HashSet::new();
    let mut destinations = HashSet::new();
    let all_distinct = input.source_basket_ids.iter().all(|id| sources.insert(*id))
        && input.destinations.iter().all(|d| destinations.insert(d.basket_id));
    if all_distinct {
        Ok(())
    } else {
        Err(AppError::validation(
            "destinations",
            "A basket is listed more than once",
            "Un cestello è indicato più volte",
        ))
    }
}

/// Operation fields of a measured destination basket
fn destination_fields(measured: &DerivedMeasurement) -> DerivedFields {
    DerivedFields {
        animal_count: Some(measured.total_population),
        total_weight_grams: measured.total_weight_grams(),
        animals_per_kg: Some(measured.animals_per_kg),
        average_weight_mg: Some(measured.average_weight_mg),
        dead_count: measured.total_dead_count,
        mortality_rate: measured.mortality_rate,
    }
}

impl ScreeningService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &ScreeningFilter) -> AppResult<PaginatedResponse<Screening>> {
        let pagination = Pagination::from_query(filter.page, filter.page_size);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM screenings")
            .fetch_one(&self.db)
            .await?;

        let sql = format!(
            "SELECT {} FROM screenings ORDER BY screening_number DESC LIMIT $1 OFFSET $2",
            SCREENING_COLUMNS
        );
        let data = sqlx::query_as::<_, ScreeningRecord>(&sql)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(Screening::from)
            .collect();

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(pagination, total.max(0) as u64),
        })
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ScreeningDetail> {
        let sql = format!("SELECT {} FROM screenings WHERE id = $1", SCREENING_COLUMNS);
        let screening: Screening = sqlx::query_as::<_, ScreeningRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Screening".to_string()))?
            .into();

        let sql = format!(
            "SELECT {} FROM screening_source_baskets WHERE screening_id = $1",
            SCREENING_SOURCE_COLUMNS
        );
        let source_baskets: Vec<ScreeningSourceBasket> =
            sqlx::query_as::<_, ScreeningSourceRecord>(&sql)
                .bind(id)
                .fetch_all(&self.db)
                .await?
                .into_iter()
                .map(ScreeningSourceBasket::from)
                .collect();

        let sql = format!(
            "SELECT {} FROM screening_destination_baskets WHERE screening_id = $1",
            SCREENING_DESTINATION_COLUMNS
        );
        let destination_baskets = sqlx::query_as::<_, ScreeningDestinationRecord>(&sql)
            .bind(id)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(ScreeningDestinationRecord::into_model)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(ScreeningDetail {
            screening,
            source_baskets,
            destination_baskets,
        })
    }

    /// Number the next screening will get
    pub async fn next_number(&self) -> AppResult<i32> {
        let number: i32 =
            sqlx::query_scalar("SELECT COALESCE(MAX(screening_number), 0) + 1 FROM screenings")
                .fetch_one(&self.db)
                .await?;
        Ok(number)
    }

    pub async fn create(&self, input: CreateScreeningInput) -> AppResult<ScreeningDetail> {
        input.validate()?;
        for destination in &input.destinations {
            destination.validate()?;
        }
        ensure_distinct_baskets(&input)?;

        let measured = input
            .destinations
            .iter()
            .map(|d| calculate(&d.measurement))
            .collect::<Result<Vec<_>, _>>()?;
        let sizes = SizeService::new(self.db.clone()).list().await?;

        let mut tx = self.db.begin().await?;

        let mut sources = Vec::with_capacity(input.source_basket_ids.len());
        for basket_id in &input.source_basket_ids {
            sources.push(Self::load_source(&mut tx, *basket_id).await?);
        }

        let source_lots: Vec<(Uuid, i64)> = sources
            .iter()
            .flat_map(|s| s.lots.iter().copied())
            .collect();
        let destination_counts: Vec<i64> = measured.iter().map(|m| m.total_population).collect();
        let plan = plan_screening(&source_lots, &destination_counts)?;

        let number: i32 =
            sqlx::query_scalar("SELECT COALESCE(MAX(screening_number), 0) + 1 FROM screenings")
                .fetch_one(&mut *tx)
                .await?;

        let sql = format!(
            r#"
            INSERT INTO screenings (id, screening_number, date, reference_size_id,
                                    total_source_animals, total_destination_animals,
                                    mortality, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            SCREENING_COLUMNS
        );
        let screening: Screening = sqlx::query_as::<_, ScreeningRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(number)
            .bind(input.date)
            .bind(input.reference_size_id)
            .bind(plan.total_source_animals)
            .bind(plan.total_destination_animals)
            .bind(plan.mortality)
            .bind(input.notes.as_deref())
            .fetch_one(&mut *tx)
            .await?
            .into();

        let close_note = format!("Chiusura per vagliatura #{}", number);
        for source in &sources {
            let fields = DerivedFields {
                animal_count: Some(source.animal_count()),
                ..DerivedFields::default()
            };
            OperationService::insert_operation(
                &mut tx,
                &NewOperation {
                    date: input.date,
                    operation_type: OperationType::ChiusuraCicloVagliatura,
                    basket_id: source.basket_id,
                    cycle_id: source.cycle_id,
                    size_id: None,
                    lot_id: source.lots.first().map(|(lot, _)| *lot),
                    fields: &fields,
                    notes: Some(close_note.as_str()),
                },
            )
            .await?;
            OperationService::close_cycle(&mut tx, source.cycle_id, source.basket_id, input.date)
                .await?;

            sqlx::query(
                r#"
                INSERT INTO screening_source_baskets (id, screening_id, basket_id, cycle_id, animal_count)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(screening.id)
            .bind(source.basket_id)
            .bind(source.cycle_id)
            .bind(source.animal_count())
            .execute(&mut *tx)
            .await?;
        }

        let origin_note = format!("Da vagliatura #{}", number);
        for ((destination, measurement), split) in input
            .destinations
            .iter()
            .zip(&measured)
            .zip(&plan.destinations)
        {
            let basket = BasketService::lock_basket(&mut tx, destination.basket_id).await?;
            if basket.state != BasketState::Available {
                return Err(AppError::InvalidStateTransition(format!(
                    "basket #{} already has an active cycle",
                    basket.physical_number
                )));
            }

            let basket = match (destination.row, destination.position) {
                (Some(row), Some(position)) => {
                    let flupsy_id = destination.flupsy_id.unwrap_or(basket.flupsy_id);
                    BasketService::place(&mut tx, &basket, flupsy_id, row, position).await?
                }
                (None, None) => basket,
                _ => {
                    return Err(AppError::validation(
                        "position",
                        "Row and position must be given together",
                        "Fila e posizione vanno indicate insieme",
                    ))
                }
            };

            let cycle_id = OperationService::open_cycle(&mut tx, &basket, input.date).await?;
            for share in split.allocations.iter().filter(|a| a.allocated > 0) {
                CycleService::insert_composition(
                    &mut tx,
                    basket.id,
                    cycle_id,
                    share.lot_id,
                    share.allocated,
                    share.percentage,
                    Some(origin_note.as_str()),
                )
                .await?;
            }

            let fields = destination_fields(measurement);
            let size_id = destination
                .size_id
                .or_else(|| suggest_size(measurement.animals_per_kg, &sizes).map(|s| s.size_id));
            let activation = NewOperation {
                date: input.date,
                operation_type: OperationType::PrimaAttivazione,
                basket_id: basket.id,
                cycle_id,
                size_id,
                lot_id: Some(plan.dominant_lot),
                fields: &fields,
                notes: Some(origin_note.as_str()),
            };
            OperationService::insert_operation(&mut tx, &activation).await?;

            if destination.kind == DestinationKind::Sold {
                OperationService::insert_operation(
                    &mut tx,
                    &NewOperation {
                        operation_type: OperationType::Vendita,
                        ..activation
                    },
                )
                .await?;
                OperationService::close_cycle(&mut tx, cycle_id, basket.id, input.date).await?;
            }

            Self::insert_destination(
                &mut tx,
                &ScreeningDestinationBasket {
                    id: Uuid::new_v4(),
                    screening_id: screening.id,
                    basket_id: basket.id,
                    cycle_id,
                    kind: destination.kind,
                    flupsy_id: basket.flupsy_id,
                    row: basket.row,
                    position: basket.position,
                    animal_count: measurement.total_population,
                    total_weight_grams: fields.total_weight_grams,
                    animals_per_kg: measurement.animals_per_kg,
                    average_weight_mg: measurement.average_weight_mg,
                    dead_count: fields.dead_count,
                    mortality_rate: fields.mortality_rate,
                    size_id,
                },
            )
            .await?;
        }

        OperationService::add_lot_mortality(&mut tx, &plan.lot_mortality).await?;

        tx.commit().await?;

        tracing::info!(
            screening_id = %screening.id,
            screening_number = number,
            sources = sources.len(),
            destinations = plan.destinations.len(),
            mortality = plan.mortality,
            mixed = plan.is_mixed,
            "Screening completed"
        );

        self.get(screening.id).await
    }

    /// Lock an active source basket and read its lot mix
    async fn load_source(
        tx: &mut Transaction<'_, Postgres>,
        basket_id: Uuid,
    ) -> AppResult<SourceBasket> {
        let basket = BasketService::lock_basket(tx, basket_id).await?;
        let cycle_id = basket
            .current_cycle_id
            .filter(|_| basket.state == BasketState::Active)
            .ok_or_else(|| {
                AppError::InvalidStateTransition(format!(
                    "basket #{} has no active cycle",
                    basket.physical_number
                ))
            })?;

        let lots: Vec<(Uuid, i64)> = sqlx::query_as(
            r#"
            SELECT lot_id, animal_count FROM basket_lot_composition
            WHERE cycle_id = $1 AND animal_count > 0
            ORDER BY animal_count DESC, created_at ASC
            "#,
        )
        .bind(cycle_id)
        .fetch_all(&mut **tx)
        .await?;

        if lots.is_empty() {
            return Err(AppError::InvalidStateTransition(format!(
                "basket #{} has no lot composition",
                basket.physical_number
            )));
        }

        Ok(SourceBasket {
            basket_id: basket.id,
            cycle_id,
            lots,
        })
    }

    async fn insert_destination(
        tx: &mut Transaction<'_, Postgres>,
        d: &ScreeningDestinationBasket,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO screening_destination_baskets
                (id, screening_id, basket_id, cycle_id, kind, flupsy_id, "row", "position",
                 animal_count, total_weight_grams, animals_per_kg, average_weight_mg,
                 dead_count, mortality_rate, size_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(d.id)
        .bind(d.screening_id)
        .bind(d.basket_id)
        .bind(d.cycle_id)
        .bind(d.kind.as_str())
        .bind(d.flupsy_id)
        .bind(d.row.map(|r| r.as_str()))
        .bind(d.position)
        .bind(d.animal_count)
        .bind(d.total_weight_grams)
        .bind(d.animals_per_kg)
        .bind(d.average_weight_mg)
        .bind(d.dead_count)
        .bind(d.mortality_rate)
        .bind(d.size_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
