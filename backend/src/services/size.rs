//! Commercial size table service

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::validation::{sizes_overlap, validate_size_range};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{Size, SizeRecord, SIZE_COLUMNS};

#[derive(Clone)]
pub struct SizeService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSizeInput {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub size_mm: Option<Decimal>,
    pub min_animals_per_kg: Option<i64>,
    pub max_animals_per_kg: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSizeInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub size_mm: Option<Decimal>,
    pub min_animals_per_kg: Option<i64>,
    pub max_animals_per_kg: Option<i64>,
    pub notes: Option<String>,
}

fn range_error(message: &'static str) -> AppError {
    AppError::validation(
        "minAnimalsPerKg",
        message,
        "Intervallo animali/kg non valido: il minimo non può superare il massimo",
    )
}

impl SizeService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// All sizes ordered by their lower bound, open-ended sizes last
    pub async fn list(&self) -> AppResult<Vec<Size>> {
        let sql = format!(
            "SELECT {} FROM sizes ORDER BY min_animals_per_kg ASC NULLS LAST, code",
            SIZE_COLUMNS
        );
        let rows = sqlx::query_as::<_, SizeRecord>(&sql)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Size::from).collect())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Size> {
        let sql = format!("SELECT {} FROM sizes WHERE id = $1", SIZE_COLUMNS);
        sqlx::query_as::<_, SizeRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(Size::from)
            .ok_or_else(|| AppError::NotFound("Size".to_string()))
    }

    pub async fn create(&self, input: CreateSizeInput) -> AppResult<Size> {
        input.validate()?;
        validate_size_range(input.min_animals_per_kg, input.max_animals_per_kg)
            .map_err(range_error)?;

        let candidate = Size {
            id: Uuid::new_v4(),
            code: input.code.trim().to_string(),
            name: input.name.trim().to_string(),
            size_mm: input.size_mm,
            min_animals_per_kg: input.min_animals_per_kg,
            max_animals_per_kg: input.max_animals_per_kg,
            notes: input.notes,
        };
        self.warn_on_overlap(&candidate).await?;

        let sql = format!(
            r#"
            INSERT INTO sizes (id, code, name, size_mm, min_animals_per_kg, max_animals_per_kg, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            SIZE_COLUMNS
        );
        let row = sqlx::query_as::<_, SizeRecord>(&sql)
            .bind(candidate.id)
            .bind(&candidate.code)
            .bind(&candidate.name)
            .bind(candidate.size_mm)
            .bind(candidate.min_animals_per_kg)
            .bind(candidate.max_animals_per_kg)
            .bind(&candidate.notes)
            .fetch_one(&self.db)
            .await?;

        tracing::info!(size = %row.code, "Size created");
        Ok(row.into())
    }

    pub async fn update(&self, id: Uuid, input: UpdateSizeInput) -> AppResult<Size> {
        input.validate()?;
        let current = self.get(id).await?;

        let min = input.min_animals_per_kg.or(current.min_animals_per_kg);
        let max = input.max_animals_per_kg.or(current.max_animals_per_kg);
        validate_size_range(min, max).map_err(range_error)?;

        let sql = format!(
            r#"
            UPDATE sizes SET
                name = COALESCE($2, name),
                size_mm = COALESCE($3, size_mm),
                min_animals_per_kg = $4,
                max_animals_per_kg = $5,
                notes = COALESCE($6, notes)
            WHERE id = $1
            RETURNING {}
            "#,
            SIZE_COLUMNS
        );
        let row = sqlx::query_as::<_, SizeRecord>(&sql)
            .bind(id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(input.size_mm)
            .bind(min)
            .bind(max)
            .bind(&input.notes)
            .fetch_one(&self.db)
            .await?;

        let updated = Size::from(row);
        self.warn_on_overlap(&updated).await?;
        Ok(updated)
    }

    async fn warn_on_overlap(&self, candidate: &Size) -> AppResult<()> {
        let existing = self.list().await?;
        for other in existing.iter().filter(|s| s.id != candidate.id) {
            if sizes_overlap(candidate, other) {
                // First range match wins in size suggestion, so overlaps are tolerated.
                tracing::warn!(
                    size = %candidate.code,
                    overlaps = %other.code,
                    "Size ranges overlap"
                );
            }
        }
        Ok(())
    }
}
