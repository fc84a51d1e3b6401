//! Screening split tests

use proptest::prelude::*;
use shared::screening::{plan_screening, pool_lots, ScreeningError};
use uuid::Uuid;

#[test]
fn test_three_sources_into_two_destinations() {
    let a = Uuid::from_u128(1);
    let b = Uuid::from_u128(2);
    // Basket 12 holds A only, basket 14 a 50/50 mix, basket 15 B only
    let sources = [(a, 60_000), (a, 20_000), (b, 20_000), (b, 100_000)];
    let plan = plan_screening(&sources, &[120_000, 70_000]).unwrap();

    assert_eq!(plan.total_source_animals, 200_000);
    assert_eq!(plan.mortality, 10_000);
    assert_eq!(plan.dominant_lot, b);
    // Pool is 40% A, 60% B
    assert_eq!(plan.destinations[0].allocations[0].allocated, 48_000);
    assert_eq!(plan.destinations[0].allocations[1].allocated, 72_000);
    assert_eq!(plan.lot_mortality[0].allocated, 4_000);
    assert_eq!(plan.lot_mortality[1].allocated, 6_000);
}

#[test]
fn test_lot_with_no_animals_gets_nothing() {
    let a = Uuid::from_u128(1);
    let b = Uuid::from_u128(2);
    let plan = plan_screening(&[(a, 5_000), (b, 0)], &[4_000]).unwrap();

    assert!(!plan.is_mixed);
    assert_eq!(plan.destinations[0].allocations.len(), 1);
    assert_eq!(plan.destinations[0].allocations[0].lot_id, a);
}

#[test]
fn test_negative_destination_is_rejected() {
    let a = Uuid::from_u128(1);
    assert_eq!(
        plan_screening(&[(a, 5_000)], &[-1]),
        Err(ScreeningError::EmptyDestination(0))
    );
}

proptest! {
    #[test]
    fn prop_destination_lots_add_up(
        sources in prop::collection::vec((0u128..5, 0i64..=2_000_000), 1..10),
        destinations in prop::collection::vec(1i64..=3_000_000, 1..6)
    ) {
        let sources: Vec<(Uuid, i64)> = sources
            .into_iter()
            .map(|(lot, count)| (Uuid::from_u128(lot), count))
            .collect();
        prop_assume!(sources.iter().any(|(_, c)| *c > 0));

        let plan = plan_screening(&sources, &destinations).unwrap();
        for (dest, count) in plan.destinations.iter().zip(&destinations) {
            let sum: i64 = dest.allocations.iter().map(|a| a.allocated).sum();
            prop_assert_eq!(sum, *count);
            prop_assert!(dest.allocations.iter().all(|a| a.allocated >= 0));
        }

        let pooled: i64 = pool_lots(&sources).iter().map(|(_, c)| *c).sum();
        prop_assert_eq!(plan.total_source_animals, pooled);
        prop_assert_eq!(plan.mortality, pooled - destinations.iter().sum::<i64>());

        let dead: i64 = plan.lot_mortality.iter().map(|a| a.allocated).sum();
        prop_assert_eq!(dead, plan.mortality.max(0));
    }
}
