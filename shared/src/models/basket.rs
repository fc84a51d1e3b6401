//! Basket and physical position models

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A mesh container placed in a FLUPSY row/position slot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Basket {
    pub id: Uuid,
    pub physical_number: i32,
    pub flupsy_id: Uuid,
    pub row: Option<BasketRow>,
    pub position: Option<i32>,
    pub state: BasketState,
    pub current_cycle_id: Option<Uuid>,
    pub cycle_code: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BasketState {
    #[default]
    Available,
    Active,
}

impl BasketState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BasketState::Available => "available",
            BasketState::Active => "active",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(BasketState::Available),
            "active" => Some(BasketState::Active),
            _ => None,
        }
    }
}

/// Row side of a FLUPSY (right / left)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BasketRow {
    #[serde(rename = "DX")]
    Dx,
    #[serde(rename = "SX")]
    Sx,
}

impl BasketRow {
    pub fn as_str(&self) -> &'static str {
        match self {
            BasketRow::Dx => "DX",
            BasketRow::Sx => "SX",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DX" => Some(BasketRow::Dx),
            "SX" => Some(BasketRow::Sx),
            _ => None,
        }
    }
}

/// Display label for a slot, e.g. "DX3"
pub fn position_label(row: Option<BasketRow>, position: Option<i32>) -> String {
    match (row, position) {
        (Some(r), Some(p)) => format!("{}{}", r.as_str(), p),
        (Some(r), None) => r.as_str().to_string(),
        (None, Some(p)) => p.to_string(),
        (None, None) => String::new(),
    }
}

/// Cycle code stamped on a basket when a cycle opens: basket-YYMM
pub fn generate_cycle_code(physical_number: i32, start_date: NaiveDate) -> String {
    format!(
        "{}-{:02}{:02}",
        physical_number,
        start_date.year() % 100,
        start_date.month()
    )
}
