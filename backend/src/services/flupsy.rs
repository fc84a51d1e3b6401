//! FLUPSY unit service

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{Flupsy, FlupsyRecord, FLUPSY_COLUMNS};

/// Service for managing FLUPSY units
#[derive(Clone)]
pub struct FlupsyService {
    db: PgPool,
}

/// Input for creating a FLUPSY
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlupsyInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub description: Option<String>,
}

/// Input for updating a FLUPSY
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFlupsyInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

impl FlupsyService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List FLUPSY units, optionally only the active ones
    pub async fn list(&self, active_only: bool) -> AppResult<Vec<Flupsy>> {
        let sql = format!(
            "SELECT {} FROM flupsys WHERE ($1 = FALSE OR active = TRUE) ORDER BY name",
            FLUPSY_COLUMNS
        );
        let rows = sqlx::query_as::<_, FlupsyRecord>(&sql)
            .bind(active_only)
            .fetch_all(&self.db)
            .await?;

        Ok(rows.into_iter().map(Flupsy::from).collect())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Flupsy> {
        let sql = format!("SELECT {} FROM flupsys WHERE id = $1", FLUPSY_COLUMNS);
        sqlx::query_as::<_, FlupsyRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(Flupsy::from)
            .ok_or_else(|| AppError::NotFound("FLUPSY".to_string()))
    }

    pub async fn create(&self, input: CreateFlupsyInput) -> AppResult<Flupsy> {
        input.validate()?;

        let sql = format!(
            "INSERT INTO flupsys (id, name, location, description, active) \
             VALUES ($1, $2, $3, $4, TRUE) RETURNING {}",
            FLUPSY_COLUMNS
        );
        let row = sqlx::query_as::<_, FlupsyRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.name.trim())
            .bind(&input.location)
            .bind(&input.description)
            .fetch_one(&self.db)
            .await?;

        tracing::info!(flupsy_id = %row.id, name = %row.name, "FLUPSY created");
        Ok(row.into())
    }

    pub async fn update(&self, id: Uuid, input: UpdateFlupsyInput) -> AppResult<Flupsy> {
        input.validate()?;

        let sql = format!(
            r#"
            UPDATE flupsys SET
                name = COALESCE($2, name),
                location = COALESCE($3, location),
                description = COALESCE($4, description),
                active = COALESCE($5, active)
            WHERE id = $1
            RETURNING {}
            "#,
            FLUPSY_COLUMNS
        );
        sqlx::query_as::<_, FlupsyRecord>(&sql)
            .bind(id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(&input.location)
            .bind(&input.description)
            .bind(input.active)
            .fetch_optional(&self.db)
            .await?
            .map(Flupsy::from)
            .ok_or_else(|| AppError::NotFound("FLUPSY".to_string()))
    }
}
