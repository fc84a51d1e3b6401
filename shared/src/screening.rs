//! Screening (vagliatura) planning
//!
//! Pools the lots of the source baskets and splits every destination
//! population over that pool with balanced rounding, so each destination's
//! lot counts add up to its measured population. The difference between
//! source and destination totals is the screening mortality, spread over
//! the lots the same way.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::allocation::{balanced_rounding, composition_percentages, AllocationError, LotAllocation};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScreeningError {
    #[error("At least one source basket is required")]
    NoSources,

    #[error("At least one destination basket is required")]
    NoDestinations,

    #[error("Source baskets hold no animals")]
    EmptySources,

    #[error("Destination {0} has no animals")]
    EmptyDestination(usize),

    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

impl ScreeningError {
    /// Italian message shown on the screening form
    pub fn message_it(&self) -> String {
        match self {
            ScreeningError::NoSources => "Indicare almeno un cestello di origine".to_string(),
            ScreeningError::NoDestinations => {
                "Indicare almeno un cestello di destinazione".to_string()
            }
            ScreeningError::EmptySources => {
                "I cestelli di origine non contengono animali".to_string()
            }
            ScreeningError::EmptyDestination(index) => {
                format!("Il cestello di destinazione {} non contiene animali", index + 1)
            }
            ScreeningError::Allocation(_) => {
                "Impossibile ripartire gli animali tra i lotti".to_string()
            }
        }
    }
}

/// Lot split of one destination basket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationPlan {
    pub animal_count: i64,
    pub allocations: Vec<LotAllocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningPlan {
    /// Animals per lot over all source baskets, in first-seen order
    pub lot_pool: Vec<(Uuid, i64)>,
    /// Share of each pooled lot, percent (2 dp)
    pub lot_percentages: Vec<(Uuid, Decimal)>,
    pub dominant_lot: Uuid,
    pub is_mixed: bool,
    pub total_source_animals: i64,
    pub total_destination_animals: i64,
    pub mortality: i64,
    /// Same order as the destination counts passed in
    pub destinations: Vec<DestinationPlan>,
    /// Mortality per lot; empty unless `mortality > 0`
    pub lot_mortality: Vec<LotAllocation>,
}

/// Sum animal counts per lot, keeping the order lots first appear in
pub fn pool_lots(source_lots: &[(Uuid, i64)]) -> Vec<(Uuid, i64)> {
    let mut pool: Vec<(Uuid, i64)> = Vec::new();
    for (lot_id, count) in source_lots {
        match pool.iter_mut().find(|(id, _)| id == lot_id) {
            Some((_, total)) => *total += (*count).max(0),
            None => pool.push((*lot_id, (*count).max(0))),
        }
    }
    pool
}

/// Plan a screening from the source lot counts and the destination populations.
///
/// `source_lots` holds one `(lot, animals)` entry per lot of every source
/// basket; the same lot may appear for several baskets.
pub fn plan_screening(
    source_lots: &[(Uuid, i64)],
    destination_counts: &[i64],
) -> Result<ScreeningPlan, ScreeningError> {
    if source_lots.is_empty() {
        return Err(ScreeningError::NoSources);
    }
    if destination_counts.is_empty() {
        return Err(ScreeningError::NoDestinations);
    }
    if let Some(index) = destination_counts.iter().position(|c| *c <= 0) {
        return Err(ScreeningError::EmptyDestination(index));
    }

    let lot_pool = pool_lots(source_lots);
    let total_source_animals: i64 = lot_pool.iter().map(|(_, c)| *c).sum();
    if total_source_animals <= 0 {
        return Err(ScreeningError::EmptySources);
    }

    // Earliest lot wins ties.
    let dominant_lot = lot_pool
        .iter()
        .fold(None::<(Uuid, i64)>, |best, (lot, count)| match best {
            Some((_, top)) if top >= *count => best,
            _ => Some((*lot, *count)),
        })
        .map(|(lot, _)| lot)
        .ok_or(ScreeningError::EmptySources)?;

    let shares: Vec<(Uuid, Decimal)> = lot_pool
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(lot, count)| (*lot, Decimal::from(*count)))
        .collect();

    let destinations = destination_counts
        .iter()
        .map(|count| {
            let allocation = balanced_rounding(*count, &shares)?;
            Ok(DestinationPlan {
                animal_count: *count,
                allocations: allocation.allocations,
            })
        })
        .collect::<Result<Vec<_>, AllocationError>>()?;

    let total_destination_animals = destination_counts
        .iter()
        .try_fold(0i64, |acc, c| acc.checked_add(*c))
        .ok_or(AllocationError::Overflow)?;
    let mortality = total_source_animals - total_destination_animals;

    let lot_mortality = if mortality > 0 {
        balanced_rounding(mortality, &shares)?.allocations
    } else {
        Vec::new()
    };

    Ok(ScreeningPlan {
        lot_percentages: composition_percentages(&lot_pool),
        is_mixed: shares.len() > 1,
        lot_pool,
        dominant_lot,
        total_source_animals,
        total_destination_animals,
        mortality,
        destinations,
        lot_mortality,
    })
}
