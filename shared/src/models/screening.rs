//! Screening (vagliatura) models
//!
//! A screening empties one or more source baskets through a sieve and
//! refills destination baskets, each with its own measured population.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BasketRow;

/// A completed screening with its population totals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screening {
    pub id: Uuid,
    pub screening_number: i32,
    pub date: NaiveDate,
    pub reference_size_id: Option<Uuid>,
    pub total_source_animals: i64,
    pub total_destination_animals: i64,
    /// Source minus destination animals; negative when the recount is higher
    pub mortality: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Where a destination basket ends up after screening
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    /// Stays in a FLUPSY with a new active cycle
    #[default]
    Placed,
    /// Sold straight away; the new cycle is closed by a sale
    Sold,
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::Placed => "placed",
            DestinationKind::Sold => "sold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "placed" => Some(DestinationKind::Placed),
            "sold" => Some(DestinationKind::Sold),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningSourceBasket {
    pub id: Uuid,
    pub screening_id: Uuid,
    pub basket_id: Uuid,
    /// Cycle closed by the screening
    pub cycle_id: Uuid,
    pub animal_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningDestinationBasket {
    pub id: Uuid,
    pub screening_id: Uuid,
    pub basket_id: Uuid,
    /// Cycle opened by the screening
    pub cycle_id: Uuid,
    pub kind: DestinationKind,
    pub flupsy_id: Uuid,
    pub row: Option<BasketRow>,
    pub position: Option<i32>,
    pub animal_count: i64,
    pub total_weight_grams: Option<Decimal>,
    pub animals_per_kg: i64,
    pub average_weight_mg: Decimal,
    pub dead_count: Option<i64>,
    pub mortality_rate: Option<Decimal>,
    pub size_id: Option<Uuid>,
}

/// A screening with the baskets it emptied and filled
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningDetail {
    #[serde(flatten)]
    pub screening: Screening,
    pub source_baskets: Vec<ScreeningSourceBasket>,
    pub destination_baskets: Vec<ScreeningDestinationBasket>,
}
