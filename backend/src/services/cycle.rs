//! Rearing cycle and mixed-lot composition service

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::allocation::balanced_rounding;
use shared::validation::validate_composition_percentages;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    BasketLotComposition, CompositionRecord, Cycle, CycleRecord, CycleState, COMPOSITION_COLUMNS,
    CYCLE_COLUMNS,
};

#[derive(Clone)]
pub struct CycleService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleFilter {
    pub state: Option<CycleState>,
    pub basket_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionShareInput {
    pub lot_id: Uuid,
    pub percentage: Decimal,
    pub notes: Option<String>,
}

/// Replace a cycle's lot composition from percentages
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetCompositionInput {
    /// Basket population to split; defaults to the latest counted population
    #[validate(range(min = 1))]
    pub total_animals: Option<i64>,
    #[validate(length(min = 1))]
    pub lots: Vec<CompositionShareInput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleComposition {
    pub cycle_id: Uuid,
    pub total_animals: i64,
    pub is_mixed: bool,
    pub lots: Vec<BasketLotComposition>,
}

impl CycleComposition {
    fn new(cycle_id: Uuid, lots: Vec<BasketLotComposition>) -> Self {
        let distinct = lots
            .iter()
            .map(|c| c.lot_id)
            .collect::<std::collections::HashSet<_>>()
            .len();
        Self {
            cycle_id,
            total_animals: lots.iter().map(|c| c.animal_count).sum(),
            is_mixed: distinct > 1,
            lots,
        }
    }
}

impl CycleService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &CycleFilter) -> AppResult<Vec<Cycle>> {
        let sql = format!(
            r#"
            SELECT {} FROM cycles
            WHERE ($1::TEXT IS NULL OR state = $1)
              AND ($2::UUID IS NULL OR basket_id = $2)
            ORDER BY start_date DESC
            "#,
            CYCLE_COLUMNS
        );
        let rows = sqlx::query_as::<_, CycleRecord>(&sql)
            .bind(filter.state.map(|s| s.as_str()))
            .bind(filter.basket_id)
            .fetch_all(&self.db)
            .await?;

        rows.into_iter().map(CycleRecord::into_model).collect()
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Cycle> {
        let sql = format!("SELECT {} FROM cycles WHERE id = $1", CYCLE_COLUMNS);
        sqlx::query_as::<_, CycleRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Cycle".to_string()))?
            .into_model()
    }

    pub async fn composition(&self, cycle_id: Uuid) -> AppResult<CycleComposition> {
        self.get(cycle_id).await?;

        let sql = format!(
            "SELECT {} FROM basket_lot_composition WHERE cycle_id = $1 ORDER BY percentage DESC",
            COMPOSITION_COLUMNS
        );
        let rows = sqlx::query_as::<_, CompositionRecord>(&sql)
            .bind(cycle_id)
            .fetch_all(&self.db)
            .await?;

        Ok(CycleComposition::new(
            cycle_id,
            rows.into_iter().map(BasketLotComposition::from).collect(),
        ))
    }

    /// Replace the composition of an active cycle.
    ///
    /// Animal counts come from balanced rounding of the percentages, so they
    /// always add up to the basket population.
    pub async fn set_composition(
        &self,
        cycle_id: Uuid,
        input: SetCompositionInput,
    ) -> AppResult<CycleComposition> {
        input.validate()?;

        let percentages: Vec<Decimal> = input.lots.iter().map(|l| l.percentage).collect();
        validate_composition_percentages(&percentages).map_err(|msg| {
            AppError::validation(
                "lots",
                msg,
                "Le percentuali di composizione devono sommare a 100%",
            )
        })?;

        let cycle = self.get(cycle_id).await?;
        if cycle.state != CycleState::Active {
            return Err(AppError::InvalidStateTransition(
                "composition can only be changed on an active cycle".to_string(),
            ));
        }

        let total = match input.total_animals {
            Some(total) => total,
            None => self.current_population(cycle_id).await?.ok_or_else(|| {
                AppError::validation(
                    "totalAnimals",
                    "No counted population for this cycle; totalAnimals is required",
                    "Nessuna popolazione registrata per questo ciclo: indicare totalAnimals",
                )
            })?,
        };

        let shares: Vec<(Uuid, Decimal)> =
            input.lots.iter().map(|l| (l.lot_id, l.percentage)).collect();
        let allocation = balanced_rounding(total, &shares)?;

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM basket_lot_composition WHERE cycle_id = $1")
            .bind(cycle_id)
            .execute(&mut *tx)
            .await?;

        for (share, input_lot) in allocation.allocations.iter().zip(&input.lots) {
            Self::insert_composition(
                &mut tx,
                cycle.basket_id,
                cycle_id,
                share.lot_id,
                share.allocated,
                share.percentage,
                input_lot.notes.as_deref(),
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            cycle_id = %cycle_id,
            lots = allocation.allocations.len(),
            total,
            "Cycle composition updated"
        );

        self.composition(cycle_id).await
    }

    /// Most recent counted population recorded on the cycle
    async fn current_population(&self, cycle_id: Uuid) -> AppResult<Option<i64>> {
        let latest: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT animal_count FROM operations
            WHERE cycle_id = $1 AND animal_count IS NOT NULL AND animal_count > 0
            ORDER BY date DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(cycle_id)
        .fetch_optional(&self.db)
        .await?;

        if latest.is_some() {
            return Ok(latest);
        }

        let from_composition: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(animal_count)::BIGINT FROM basket_lot_composition WHERE cycle_id = $1",
        )
        .bind(cycle_id)
        .fetch_one(&self.db)
        .await?;

        Ok(from_composition.filter(|n| *n > 0))
    }

    pub(crate) async fn insert_composition(
        tx: &mut Transaction<'_, Postgres>,
        basket_id: Uuid,
        cycle_id: Uuid,
        lot_id: Uuid,
        animal_count: i64,
        percentage: Decimal,
        notes: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO basket_lot_composition
                (id, basket_id, cycle_id, lot_id, animal_count, percentage, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(basket_id)
        .bind(cycle_id)
        .bind(lot_id)
        .bind(animal_count)
        .bind(percentage)
        .bind(notes)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composition_payload_requires_lots() {
        let input: SetCompositionInput =
            serde_json::from_value(serde_json::json!({ "totalAnimals": 1000, "lots": [] }))
                .unwrap();
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("lots"));
    }

    #[test]
    fn test_composition_payload_with_lots_is_valid() {
        let lot = Uuid::new_v4();
        let input: SetCompositionInput = serde_json::from_value(serde_json::json!({
            "lots": [{ "lotId": lot, "percentage": "100" }]
        }))
        .unwrap();
        assert!(input.validate().is_ok());
        assert_eq!(input.total_animals, None);
        assert_eq!(input.lots[0].lot_id, lot);
    }

    #[test]
    fn test_composition_counts_distinct_lots() {
        let cycle_id = Uuid::new_v4();
        let entry = |lot_id, animal_count| BasketLotComposition {
            id: Uuid::new_v4(),
            basket_id: Uuid::new_v4(),
            cycle_id,
            lot_id,
            animal_count,
            percentage: Decimal::from(50),
            notes: None,
            created_at: chrono::Utc::now(),
        };
        let composition =
            CycleComposition::new(cycle_id, vec![entry(Uuid::new_v4(), 600), entry(Uuid::new_v4(), 400)]);
        assert!(composition.is_mixed);
        assert_eq!(composition.total_animals, 1_000);
    }
}
