//! Balanced lot allocation tests

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::allocation::{balanced_rounding, composition_percentages, AllocationError};
use uuid::Uuid;

#[test]
fn test_three_way_split_preserves_total() {
    let lots: Vec<(Uuid, Decimal)> = (0..3).map(|_| (Uuid::new_v4(), Decimal::ONE)).collect();
    let result = balanced_rounding(100, &lots).unwrap();
    let counts: Vec<i64> = result.allocations.iter().map(|a| a.allocated).collect();
    assert_eq!(counts, vec![34, 33, 33]);
    assert_eq!(result.allocated_sum(), 100);
}

#[test]
fn test_dead_count_split_by_animal_counts() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let shares = vec![(a, Decimal::from(7_000)), (b, Decimal::from(3_000))];
    let result = balanced_rounding(25, &shares).unwrap();
    assert_eq!(result.allocations[0].allocated, 18);
    assert_eq!(result.allocations[1].allocated, 7);
    assert_eq!(result.allocations[0].percentage, Decimal::from(70));
}

#[test]
fn test_invalid_inputs() {
    let lot = Uuid::new_v4();
    assert_eq!(
        balanced_rounding(0, &[(lot, Decimal::ONE)]),
        Err(AllocationError::NonPositiveTotal)
    );
    assert_eq!(balanced_rounding(10, &[]), Err(AllocationError::NoShares));
    assert_eq!(
        balanced_rounding(10, &[(lot, Decimal::ZERO)]),
        Err(AllocationError::ZeroShareSum)
    );
    assert_eq!(
        balanced_rounding(10, &[(lot, Decimal::NEGATIVE_ONE)]),
        Err(AllocationError::NegativeShare(lot))
    );
}

#[test]
fn test_composition_percentages() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let pct = composition_percentages(&[(a, 1), (b, 3)]);
    assert_eq!(pct, vec![(a, Decimal::from(25)), (b, Decimal::from(75))]);
}

proptest! {
    #[test]
    fn prop_balanced_rounding_preserves_total(
        total in 1i64..=50_000_000,
        shares in prop::collection::vec(0u32..=10_000, 1..8)
    ) {
        prop_assume!(shares.iter().any(|s| *s > 0));
        let input: Vec<(Uuid, Decimal)> = shares
            .iter()
            .map(|s| (Uuid::new_v4(), Decimal::from(*s)))
            .collect();

        let result = balanced_rounding(total, &input).unwrap();
        prop_assert_eq!(result.allocated_sum(), total);

        let share_sum: u32 = shares.iter().sum();
        for (allocation, share) in result.allocations.iter().zip(&shares) {
            prop_assert!(allocation.allocated >= 0);
            // Never more than one unit away from the exact share
            let exact = Decimal::from(total) * Decimal::from(*share) / Decimal::from(share_sum);
            prop_assert!((Decimal::from(allocation.allocated) - exact).abs() < Decimal::ONE);
        }
    }
}
