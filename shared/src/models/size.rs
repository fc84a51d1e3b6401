//! Commercial size buckets

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A commercial size classified by an animals-per-kg range
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Size {
    pub id: Uuid,
    /// Size code, e.g. "TP-600"
    pub code: String,
    pub name: String,
    pub size_mm: Option<Decimal>,
    pub min_animals_per_kg: Option<i64>,
    pub max_animals_per_kg: Option<i64>,
    pub notes: Option<String>,
}

impl Size {
    /// Inclusive range check; open-ended sizes never match here
    pub fn contains(&self, animals_per_kg: i64) -> bool {
        match (self.min_animals_per_kg, self.max_animals_per_kg) {
            (Some(min), Some(max)) => animals_per_kg >= min && animals_per_kg <= max,
            _ => false,
        }
    }
}
