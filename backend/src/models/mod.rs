//! Database models for the FLUPSY Management Platform
//!
//! Re-exports models from the shared crate and adds the records that map
//! table rows onto them. Enum columns are stored as VARCHAR.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

pub use shared::models::*;

use crate::error::{AppError, AppResult};

fn parse_column<T>(value: &str, column: &str, parse: fn(&str) -> Option<T>) -> AppResult<T> {
    parse(value).ok_or_else(|| {
        AppError::Internal(format!("Unexpected value '{}' in column {}", value, column))
    })
}

fn parse_optional_column<T>(
    value: Option<&str>,
    column: &str,
    parse: fn(&str) -> Option<T>,
) -> AppResult<Option<T>> {
    value.map(|v| parse_column(v, column, parse)).transpose()
}

pub const FLUPSY_COLUMNS: &str = "id, name, location, description, active";

#[derive(Debug, sqlx::FromRow)]
pub struct FlupsyRecord {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub active: bool,
}

impl From<FlupsyRecord> for Flupsy {
    fn from(r: FlupsyRecord) -> Self {
        Flupsy {
            id: r.id,
            name: r.name,
            location: r.location,
            description: r.description,
            active: r.active,
        }
    }
}

pub const LOT_COLUMNS: &str = "id, arrival_date, supplier, supplier_lot_number, quality, \
     animal_count, weight_grams, size_id, total_mortality, mortality_notes, notes, state, created_at";

#[derive(Debug, sqlx::FromRow)]
pub struct LotRecord {
    pub id: Uuid,
    pub arrival_date: NaiveDate,
    pub supplier: String,
    pub supplier_lot_number: Option<String>,
    pub quality: Option<String>,
    pub animal_count: Option<i64>,
    pub weight_grams: Option<Decimal>,
    pub size_id: Option<Uuid>,
    pub total_mortality: i64,
    pub mortality_notes: Option<String>,
    pub notes: Option<String>,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

impl LotRecord {
    pub fn into_model(self) -> AppResult<Lot> {
        Ok(Lot {
            id: self.id,
            arrival_date: self.arrival_date,
            supplier: self.supplier,
            supplier_lot_number: self.supplier_lot_number,
            quality: parse_optional_column(
                self.quality.as_deref(),
                "lots.quality",
                LotQuality::parse,
            )?,
            animal_count: self.animal_count,
            weight_grams: self.weight_grams,
            size_id: self.size_id,
            total_mortality: self.total_mortality,
            mortality_notes: self.mortality_notes,
            notes: self.notes,
            state: parse_column(&self.state, "lots.state", LotState::parse)?,
            created_at: self.created_at,
        })
    }
}

pub const BASKET_COLUMNS: &str =
    r#"id, physical_number, flupsy_id, "row", "position", state, current_cycle_id, cycle_code"#;

#[derive(Debug, sqlx::FromRow)]
pub struct BasketRecord {
    pub id: Uuid,
    pub physical_number: i32,
    pub flupsy_id: Uuid,
    #[sqlx(rename = "row")]
    pub basket_row: Option<String>,
    pub position: Option<i32>,
    pub state: String,
    pub current_cycle_id: Option<Uuid>,
    pub cycle_code: Option<String>,
}

impl BasketRecord {
    pub fn into_model(self) -> AppResult<Basket> {
        Ok(Basket {
            id: self.id,
            physical_number: self.physical_number,
            flupsy_id: self.flupsy_id,
            row: parse_optional_column(self.basket_row.as_deref(), "baskets.row", BasketRow::parse)?,
            position: self.position,
            state: parse_column(&self.state, "baskets.state", BasketState::parse)?,
            current_cycle_id: self.current_cycle_id,
            cycle_code: self.cycle_code,
        })
    }
}

pub const CYCLE_COLUMNS: &str = "id, basket_id, start_date, end_date, state";

#[derive(Debug, sqlx::FromRow)]
pub struct CycleRecord {
    pub id: Uuid,
    pub basket_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub state: String,
}

impl CycleRecord {
    pub fn into_model(self) -> AppResult<Cycle> {
        Ok(Cycle {
            id: self.id,
            basket_id: self.basket_id,
            start_date: self.start_date,
            end_date: self.end_date,
            state: parse_column(&self.state, "cycles.state", CycleState::parse)?,
        })
    }
}

pub const OPERATION_COLUMNS: &str = "id, date, type, basket_id, cycle_id, size_id, lot_id, \
     animal_count, total_weight_grams, animals_per_kg, average_weight_mg, dead_count, \
     mortality_rate, notes, created_at";

#[derive(Debug, sqlx::FromRow)]
pub struct OperationRecord {
    pub id: Uuid,
    pub date: NaiveDate,
    #[sqlx(rename = "type")]
    pub operation_type: String,
    pub basket_id: Uuid,
    pub cycle_id: Uuid,
    pub size_id: Option<Uuid>,
    pub lot_id: Option<Uuid>,
    pub animal_count: Option<i64>,
    pub total_weight_grams: Option<Decimal>,
    pub animals_per_kg: Option<i64>,
    pub average_weight_mg: Option<Decimal>,
    pub dead_count: Option<i64>,
    pub mortality_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OperationRecord {
    pub fn into_model(self) -> AppResult<Operation> {
        Ok(Operation {
            id: self.id,
            date: self.date,
            operation_type: parse_column(
                &self.operation_type,
                "operations.type",
                OperationType::parse,
            )?,
            basket_id: self.basket_id,
            cycle_id: self.cycle_id,
            size_id: self.size_id,
            lot_id: self.lot_id,
            animal_count: self.animal_count,
            total_weight_grams: self.total_weight_grams,
            animals_per_kg: self.animals_per_kg,
            average_weight_mg: self.average_weight_mg,
            dead_count: self.dead_count,
            mortality_rate: self.mortality_rate,
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

pub const SIZE_COLUMNS: &str =
    "id, code, name, size_mm, min_animals_per_kg, max_animals_per_kg, notes";

#[derive(Debug, sqlx::FromRow)]
pub struct SizeRecord {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub size_mm: Option<Decimal>,
    pub min_animals_per_kg: Option<i64>,
    pub max_animals_per_kg: Option<i64>,
    pub notes: Option<String>,
}

impl From<SizeRecord> for Size {
    fn from(r: SizeRecord) -> Self {
        Size {
            id: r.id,
            code: r.code,
            name: r.name,
            size_mm: r.size_mm,
            min_animals_per_kg: r.min_animals_per_kg,
            max_animals_per_kg: r.max_animals_per_kg,
            notes: r.notes,
        }
    }
}

pub const COMPOSITION_COLUMNS: &str =
    "id, basket_id, cycle_id, lot_id, animal_count, percentage, notes, created_at";

#[derive(Debug, sqlx::FromRow)]
pub struct CompositionRecord {
    pub id: Uuid,
    pub basket_id: Uuid,
    pub cycle_id: Uuid,
    pub lot_id: Uuid,
    pub animal_count: i64,
    pub percentage: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CompositionRecord> for BasketLotComposition {
    fn from(r: CompositionRecord) -> Self {
        BasketLotComposition {
            id: r.id,
            basket_id: r.basket_id,
            cycle_id: r.cycle_id,
            lot_id: r.lot_id,
            animal_count: r.animal_count,
            percentage: r.percentage,
            notes: r.notes,
            created_at: r.created_at,
        }
    }
}

pub const SCREENING_COLUMNS: &str = "id, screening_number, date, reference_size_id, \
     total_source_animals, total_destination_animals, mortality, notes, created_at";

#[derive(Debug, sqlx::FromRow)]
pub struct ScreeningRecord {
    pub id: Uuid,
    pub screening_number: i32,
    pub date: NaiveDate,
    pub reference_size_id: Option<Uuid>,
    pub total_source_animals: i64,
    pub total_destination_animals: i64,
    pub mortality: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ScreeningRecord> for Screening {
    fn from(r: ScreeningRecord) -> Self {
        Screening {
            id: r.id,
            screening_number: r.screening_number,
            date: r.date,
            reference_size_id: r.reference_size_id,
            total_source_animals: r.total_source_animals,
            total_destination_animals: r.total_destination_animals,
            mortality: r.mortality,
            notes: r.notes,
            created_at: r.created_at,
        }
    }
}

pub const SCREENING_SOURCE_COLUMNS: &str = "id, screening_id, basket_id, cycle_id, animal_count";

#[derive(Debug, sqlx::FromRow)]
pub struct ScreeningSourceRecord {
    pub id: Uuid,
    pub screening_id: Uuid,
    pub basket_id: Uuid,
    pub cycle_id: Uuid,
    pub animal_count: i64,
}

impl From<ScreeningSourceRecord> for ScreeningSourceBasket {
    fn from(r: ScreeningSourceRecord) -> Self {
        ScreeningSourceBasket {
            id: r.id,
            screening_id: r.screening_id,
            basket_id: r.basket_id,
            cycle_id: r.cycle_id,
            animal_count: r.animal_count,
        }
    }
}

pub const SCREENING_DESTINATION_COLUMNS: &str = r#"id, screening_id, basket_id, cycle_id, kind, flupsy_id, "row", "position", animal_count, total_weight_grams, animals_per_kg, average_weight_mg, dead_count, mortality_rate, size_id"#;

#[derive(Debug, sqlx::FromRow)]
pub struct ScreeningDestinationRecord {
    pub id: Uuid,
    pub screening_id: Uuid,
    pub basket_id: Uuid,
    pub cycle_id: Uuid,
    pub kind: String,
    pub flupsy_id: Uuid,
    #[sqlx(rename = "row")]
    pub basket_row: Option<String>,
    pub position: Option<i32>,
    pub animal_count: i64,
    pub total_weight_grams: Option<Decimal>,
    pub animals_per_kg: i64,
    pub average_weight_mg: Decimal,
    pub dead_count: Option<i64>,
    pub mortality_rate: Option<Decimal>,
    pub size_id: Option<Uuid>,
}

impl ScreeningDestinationRecord {
    pub fn into_model(self) -> AppResult<ScreeningDestinationBasket> {
        Ok(ScreeningDestinationBasket {
            id: self.id,
            screening_id: self.screening_id,
            basket_id: self.basket_id,
            cycle_id: self.cycle_id,
            kind: parse_column(
                &self.kind,
                "screening_destination_baskets.kind",
                DestinationKind::parse,
            )?,
            flupsy_id: self.flupsy_id,
            row: parse_optional_column(
                self.basket_row.as_deref(),
                "screening_destination_baskets.row",
                BasketRow::parse,
            )?,
            position: self.position,
            animal_count: self.animal_count,
            total_weight_grams: self.total_weight_grams,
            animals_per_kg: self.animals_per_kg,
            average_weight_mg: self.average_weight_mg,
            dead_count: self.dead_count,
            mortality_rate: self.mortality_rate,
            size_id: self.size_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basket_record_parses_enum_columns() {
        let record = BasketRecord {
            id: Uuid::new_v4(),
            physical_number: 7,
            flupsy_id: Uuid::new_v4(),
            basket_row: Some("dx".to_string()),
            position: Some(3),
            state: "active".to_string(),
            current_cycle_id: None,
            cycle_code: None,
        };
        let basket = record.into_model().unwrap();
        assert_eq!(basket.row, Some(BasketRow::Dx));
        assert_eq!(basket.state, BasketState::Active);
    }

    #[test]
    fn test_unknown_enum_value_is_internal_error() {
        let record = CycleRecord {
            id: Uuid::new_v4(),
            basket_id: Uuid::new_v4(),
            start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            end_date: None,
            state: "archived".to_string(),
        };
        assert!(matches!(record.into_model(), Err(AppError::Internal(_))));
    }
}
