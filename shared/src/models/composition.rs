//! Mixed-lot basket composition

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Share of one lot inside a basket's cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketLotComposition {
    pub id: Uuid,
    pub basket_id: Uuid,
    pub cycle_id: Uuid,
    pub lot_id: Uuid,
    pub animal_count: i64,
    /// Share of the basket population (0-100)
    pub percentage: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
