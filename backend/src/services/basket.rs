//! Basket and FLUPSY position service

use serde::{Deserialize, Serialize};
use shared::validation::validate_physical_number;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{position_label, Basket, BasketRecord, BasketRow, BasketState, BASKET_COLUMNS};

#[derive(Clone)]
pub struct BasketService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketFilter {
    pub flupsy_id: Option<Uuid>,
    pub state: Option<BasketState>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBasketInput {
    #[validate(range(min = 1))]
    pub physical_number: i32,
    pub flupsy_id: Uuid,
    pub row: Option<BasketRow>,
    #[validate(range(min = 1))]
    pub position: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBasketInput {
    #[validate(range(min = 1))]
    pub physical_number: Option<i32>,
}

/// Move a basket to another slot
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MoveBasketInput {
    /// Target FLUPSY, defaults to the basket's current one
    pub flupsy_id: Option<Uuid>,
    pub row: BasketRow,
    #[validate(range(min = 1))]
    pub position: i32,
    /// Swap with the occupant instead of failing
    #[serde(default)]
    pub swap: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveBasketResult {
    pub basket: Basket,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swapped_with: Option<Basket>,
}

impl BasketService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &BasketFilter) -> AppResult<Vec<Basket>> {
        let sql = format!(
            r#"
            SELECT {} FROM baskets
            WHERE ($1::UUID IS NULL OR flupsy_id = $1)
              AND ($2::TEXT IS NULL OR state = $2)
            ORDER BY flupsy_id, physical_number
            "#,
            BASKET_COLUMNS
        );
        let rows = sqlx::query_as::<_, BasketRecord>(&sql)
            .bind(filter.flupsy_id)
            .bind(filter.state.map(|s| s.as_str()))
            .fetch_all(&self.db)
            .await?;

        rows.into_iter().map(BasketRecord::into_model).collect()
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Basket> {
        let sql = format!("SELECT {} FROM baskets WHERE id = $1", BASKET_COLUMNS);
        sqlx::query_as::<_, BasketRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Basket".to_string()))?
            .into_model()
    }

    pub async fn create(&self, input: CreateBasketInput) -> AppResult<Basket> {
        input.validate()?;
        validate_physical_number(input.physical_number).map_err(|msg| {
            AppError::validation("physicalNumber", msg, "Il numero del cestello deve essere almeno 1")
        })?;

        let flupsy_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM flupsys WHERE id = $1)")
                .bind(input.flupsy_id)
                .fetch_one(&self.db)
                .await?;
        if !flupsy_exists {
            return Err(AppError::NotFound("FLUPSY".to_string()));
        }

        let sql = format!(
            r#"
            INSERT INTO baskets (id, physical_number, flupsy_id, "row", "position", state)
            VALUES ($1, $2, $3, $4, $5, 'available')
            RETURNING {}
            "#,
            BASKET_COLUMNS
        );
        let basket = sqlx::query_as::<_, BasketRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.physical_number)
            .bind(input.flupsy_id)
            .bind(input.row.map(|r| r.as_str()))
            .bind(input.position)
            .fetch_one(&self.db)
            .await?
            .into_model()?;

        tracing::info!(
            basket_id = %basket.id,
            physical_number = basket.physical_number,
            "Basket created"
        );
        Ok(basket)
    }

    pub async fn update(&self, id: Uuid, input: UpdateBasketInput) -> AppResult<Basket> {
        input.validate()?;

        let sql = format!(
            "UPDATE baskets SET physical_number = COALESCE($2, physical_number) \
             WHERE id = $1 RETURNING {}",
            BASKET_COLUMNS
        );
        sqlx::query_as::<_, BasketRecord>(&sql)
            .bind(id)
            .bind(input.physical_number)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Basket".to_string()))?
            .into_model()
    }

    /// Move a basket to a slot; an active basket already there is a conflict
    /// unless `swap` is set, in which case it takes the mover's old slot.
    pub async fn move_basket(&self, id: Uuid, input: MoveBasketInput) -> AppResult<MoveBasketResult> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let basket = Self::lock_basket(&mut tx, id).await?;
        let target_flupsy = input.flupsy_id.unwrap_or(basket.flupsy_id);

        let occupant =
            Self::find_occupant(&mut tx, id, target_flupsy, input.row, input.position).await?;

        let swapped_with = match occupant {
            Some(other) if !input.swap => {
                return Err(occupied(input.row, input.position, &other));
            }
            Some(other) => Some(
                Self::set_slot(
                    &mut tx,
                    other.id,
                    basket.flupsy_id,
                    basket.row,
                    basket.position,
                )
                .await?,
            ),
            None => None,
        };

        let moved = Self::set_slot(
            &mut tx,
            id,
            target_flupsy,
            Some(input.row),
            Some(input.position),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            basket_id = %id,
            to = %position_label(moved.row, moved.position),
            swapped = swapped_with.is_some(),
            "Basket moved"
        );

        Ok(MoveBasketResult {
            basket: moved,
            swapped_with,
        })
    }

    pub(crate) async fn lock_basket(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> AppResult<Basket> {
        let sql = format!("SELECT {} FROM baskets WHERE id = $1 FOR UPDATE", BASKET_COLUMNS);
        sqlx::query_as::<_, BasketRecord>(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Basket".to_string()))?
            .into_model()
    }

    /// Put a basket in a slot inside an open transaction; an active
    /// basket already there is a conflict
    pub(crate) async fn place(
        tx: &mut Transaction<'_, Postgres>,
        basket: &Basket,
        flupsy_id: Uuid,
        row: BasketRow,
        position: i32,
    ) -> AppResult<Basket> {
        if let Some(other) = Self::find_occupant(tx, basket.id, flupsy_id, row, position).await? {
            return Err(occupied(row, position, &other));
        }
        Self::set_slot(tx, basket.id, flupsy_id, Some(row), Some(position)).await
    }

    async fn find_occupant(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        flupsy_id: Uuid,
        row: BasketRow,
        position: i32,
    ) -> AppResult<Option<Basket>> {
        let sql = format!(
            r#"
            SELECT {} FROM baskets
            WHERE flupsy_id = $1 AND "row" = $2 AND "position" = $3
              AND state = 'active' AND id <> $4
            FOR UPDATE
            "#,
            BASKET_COLUMNS
        );
        sqlx::query_as::<_, BasketRecord>(&sql)
            .bind(flupsy_id)
            .bind(row.as_str())
            .bind(position)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .map(BasketRecord::into_model)
            .transpose()
    }

    async fn set_slot(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        flupsy_id: Uuid,
        row: Option<BasketRow>,
        position: Option<i32>,
    ) -> AppResult<Basket> {
        let sql = format!(
            r#"UPDATE baskets SET flupsy_id = $2, "row" = $3, "position" = $4 WHERE id = $1 RETURNING {}"#,
            BASKET_COLUMNS
        );
        sqlx::query_as::<_, BasketRecord>(&sql)
            .bind(id)
            .bind(flupsy_id)
            .bind(row.map(|r| r.as_str()))
            .bind(position)
            .fetch_one(&mut **tx)
            .await?
            .into_model()
    }
}

fn occupied(row: BasketRow, position: i32, other: &Basket) -> AppError {
    let slot = position_label(Some(row), Some(position));
    AppError::Conflict {
        resource: "position".to_string(),
        message: format!(
            "Position {} is occupied by basket #{}",
            slot, other.physical_number
        ),
        message_it: format!(
            "La posizione {} è occupata dal cestello #{}",
            slot, other.physical_number
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupied_slot_conflict_names_both_sides() {
        let other = Basket {
            id: Uuid::new_v4(),
            physical_number: 12,
            flupsy_id: Uuid::new_v4(),
            row: Some(BasketRow::Dx),
            position: Some(4),
            state: BasketState::Active,
            current_cycle_id: None,
            cycle_code: None,
        };
        match occupied(BasketRow::Dx, 4, &other) {
            AppError::Conflict {
                resource,
                message,
                message_it,
            } => {
                assert_eq!(resource, "position");
                assert_eq!(message, "Position DX4 is occupied by basket #12");
                assert!(message_it.contains("DX4"));
            }
            err => panic!("unexpected error {:?}", err),
        }
    }
}
