//! Largest-remainder allocation of animal counts across lots
//!
//! Used to spread recorded mortality over the lots of a mixed basket and to
//! turn a percentage composition into whole animal counts. The allocated
//! counts always sum to the requested total.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::measurement::round_half_up;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("Total to allocate must be greater than zero")]
    NonPositiveTotal,

    #[error("At least one share is required")]
    NoShares,

    #[error("Share for lot {0} cannot be negative")]
    NegativeShare(Uuid),

    #[error("Shares sum to zero")]
    ZeroShareSum,

    #[error("Allocation overflowed")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotAllocation {
    pub lot_id: Uuid,
    /// Share of the total, normalised to percent (2 dp)
    pub percentage: Decimal,
    pub allocated: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResult {
    pub total: i64,
    pub allocations: Vec<LotAllocation>,
}

impl AllocationResult {
    pub fn allocated_sum(&self) -> i64 {
        self.allocations.iter().map(|a| a.allocated).sum()
    }
}

/// Split `total` proportionally to `shares`, preserving the sum.
///
/// Each lot first receives the floor of its exact share; the remainder goes
/// one unit at a time to the lots with the largest fractional parts, earlier
/// lots winning ties.
pub fn balanced_rounding(
    total: i64,
    shares: &[(Uuid, Decimal)],
) -> Result<AllocationResult, AllocationError> {
    if total <= 0 {
        return Err(AllocationError::NonPositiveTotal);
    }
    if shares.is_empty() {
        return Err(AllocationError::NoShares);
    }
    if let Some((lot_id, _)) = shares.iter().find(|(_, s)| *s < Decimal::ZERO) {
        return Err(AllocationError::NegativeShare(*lot_id));
    }

    let share_sum: Decimal = shares.iter().map(|(_, s)| *s).sum();
    if share_sum.is_zero() {
        return Err(AllocationError::ZeroShareSum);
    }

    let total_dec = Decimal::from(total);
    let mut allocations = Vec::with_capacity(shares.len());
    let mut fractions = Vec::with_capacity(shares.len());

    for (index, (lot_id, share)) in shares.iter().enumerate() {
        let exact = total_dec
            .checked_mul(*share)
            .and_then(|v| v.checked_div(share_sum))
            .ok_or(AllocationError::Overflow)?;
        let floor = exact.floor();
        let allocated = floor.to_i64().ok_or(AllocationError::Overflow)?;
        let percentage = round_half_up(*share * Decimal::ONE_HUNDRED / share_sum, 2);

        fractions.push((index, exact - floor));
        allocations.push(LotAllocation {
            lot_id: *lot_id,
            percentage,
            allocated,
        });
    }

    let floor_sum: i64 = allocations.iter().map(|a| a.allocated).sum();
    let remainder = total - floor_sum;

    // Stable sort keeps input order among equal fractions.
    fractions.sort_by(|a, b| b.1.cmp(&a.1));
    for (index, _) in fractions.into_iter().take(remainder.max(0) as usize) {
        allocations[index].allocated += 1;
    }

    Ok(AllocationResult { total, allocations })
}

/// Percentage share of each lot from its animal count (2 dp)
pub fn composition_percentages(counts: &[(Uuid, i64)]) -> Vec<(Uuid, Decimal)> {
    let total: i64 = counts.iter().map(|(_, c)| *c).sum();
    counts
        .iter()
        .map(|(lot_id, count)| {
            let pct = if total > 0 {
                round_half_up(
                    Decimal::from(*count) * Decimal::ONE_HUNDRED / Decimal::from(total),
                    2,
                )
            } else {
                Decimal::ZERO
            };
            (*lot_id, pct)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_even_split_with_remainder() {
        let lots = ids(3);
        let shares: Vec<_> = lots.iter().map(|id| (*id, Decimal::ONE)).collect();
        let result = balanced_rounding(10, &shares).unwrap();

        let counts: Vec<i64> = result.allocations.iter().map(|a| a.allocated).collect();
        // equal fractions: earlier lots take the remainder
        assert_eq!(counts, vec![4, 3, 3]);
        assert_eq!(result.allocated_sum(), 10);
    }

    #[test]
    fn test_largest_fraction_gets_remainder() {
        let lots = ids(2);
        let shares = vec![(lots[0], Decimal::from(30)), (lots[1], Decimal::from(70))];
        let result = balanced_rounding(7, &shares).unwrap();
        // exact 2.1 and 4.9
        assert_eq!(result.allocations[0].allocated, 2);
        assert_eq!(result.allocations[1].allocated, 5);
        assert_eq!(result.allocations[1].percentage, Decimal::from(70));
    }

    #[test]
    fn test_zero_share_receives_nothing() {
        let lots = ids(2);
        let shares = vec![(lots[0], Decimal::ZERO), (lots[1], Decimal::ONE)];
        let result = balanced_rounding(5, &shares).unwrap();
        assert_eq!(result.allocations[0].allocated, 0);
        assert_eq!(result.allocations[1].allocated, 5);
    }

    #[test]
    fn test_errors() {
        let lot = Uuid::new_v4();
        assert_eq!(
            balanced_rounding(0, &[(lot, Decimal::ONE)]),
            Err(AllocationError::NonPositiveTotal)
        );
        assert_eq!(balanced_rounding(10, &[]), Err(AllocationError::NoShares));
        assert_eq!(
            balanced_rounding(10, &[(lot, Decimal::NEGATIVE_ONE)]),
            Err(AllocationError::NegativeShare(lot))
        );
        assert_eq!(
            balanced_rounding(10, &[(lot, Decimal::ZERO)]),
            Err(AllocationError::ZeroShareSum)
        );
    }

    #[test]
    fn test_composition_percentages() {
        let lots = ids(2);
        let pcts = composition_percentages(&[(lots[0], 1), (lots[1], 2)]);
        assert_eq!(pcts[0].1, Decimal::new(3333, 2));
        assert_eq!(pcts[1].1, Decimal::new(6667, 2));

        let empty = composition_percentages(&[(lots[0], 0)]);
        assert_eq!(empty[0].1, Decimal::ZERO);
    }

    proptest! {
        #[test]
        fn prop_allocation_preserves_total(
            total in 1i64..=10_000_000,
            raw_shares in proptest::collection::vec(0u32..=1_000, 1..8)
        ) {
            prop_assume!(raw_shares.iter().any(|s| *s > 0));
            let shares: Vec<_> = raw_shares
                .iter()
                .map(|s| (Uuid::new_v4(), Decimal::from(*s)))
                .collect();
            let result = balanced_rounding(total, &shares).unwrap();
            prop_assert_eq!(result.allocated_sum(), total);
            for a in &result.allocations {
                prop_assert!(a.allocated >= 0);
            }
        }
    }
}
