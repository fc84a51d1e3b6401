//! Lot and intake models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A batch of animals received from a supplier on a given date
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    pub id: Uuid,
    pub arrival_date: NaiveDate,
    pub supplier: String,
    pub supplier_lot_number: Option<String>,
    pub quality: Option<LotQuality>,
    /// Initial animal count at intake
    pub animal_count: Option<i64>,
    /// Initial weight in grams
    pub weight_grams: Option<Decimal>,
    pub size_id: Option<Uuid>,
    /// Cumulative mortality distributed onto this lot
    pub total_mortality: i64,
    pub mortality_notes: Option<String>,
    pub notes: Option<String>,
    pub state: LotState,
    pub created_at: DateTime<Utc>,
}

/// Supplier quality grade assigned at intake
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LotQuality {
    Teste,
    Normali,
    Code,
}

impl LotQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotQuality::Teste => "teste",
            LotQuality::Normali => "normali",
            LotQuality::Code => "code",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "teste" => Some(LotQuality::Teste),
            "normali" => Some(LotQuality::Normali),
            "code" => Some(LotQuality::Code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LotState {
    #[default]
    Active,
    Exhausted,
}

impl LotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotState::Active => "active",
            LotState::Exhausted => "exhausted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(LotState::Active),
            "exhausted" => Some(LotState::Exhausted),
            _ => None,
        }
    }
}

impl std::fmt::Display for LotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
