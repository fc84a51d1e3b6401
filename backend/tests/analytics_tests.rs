//! Lot analytics roll-up tests
//!
//! Exercises the report builders of `shared::analytics` with facts shaped
//! like the rows the analytics service loads.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::analytics::{
    build_live_inventory, build_lot_analytics, build_mixed_composition, build_mortality_trends,
    classify_lot_status, AnalyticsThresholds, CompositionEntry, InventoryRecord, LotFacts,
    LotStatus, MixedBasketFacts, MixedComponent, MortalityRecord, RiskLevel,
};
use shared::models::{BasketRow, OperationType};
use uuid::Uuid;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn facts(initial: i64, mortality: i64, sold: i64, compositions: Vec<CompositionEntry>) -> LotFacts {
    LotFacts {
        id: Uuid::new_v4(),
        supplier: "Ecotapes".to_string(),
        supplier_lot_number: Some("L-7".to_string()),
        arrival_date: date("2024-04-01"),
        initial_count: initial,
        total_mortality: mortality,
        compositions,
        sold_count: sold,
        sold_weight_grams: Decimal::ZERO,
        average_weight_mg: Some(Decimal::from(2)),
        last_operation: Some((OperationType::Misura, date("2024-05-20"))),
    }
}

fn entry(animals: i64, pct: i64, active: bool) -> CompositionEntry {
    CompositionEntry {
        basket_id: Uuid::new_v4(),
        animal_count: animals,
        percentage: Decimal::from(pct),
        active,
    }
}

#[test]
fn test_weight_from_old_measurements_is_reported() {
    let t = AnalyticsThresholds::default();
    let mut lot = facts(1_000_000, 0, 0, vec![entry(800_000, 100, true)]);
    lot.last_operation = Some((OperationType::Misura, date("2024-01-10")));
    lot.average_weight_mg = Some(Decimal::new(125, 1));
    let report = build_lot_analytics(&lot, date("2024-06-01"), &t);

    assert_eq!(report.average_weight_mg, Decimal::new(125, 1));
    // 800 000 animals at 12.5 mg
    assert_eq!(report.total_weight_grams, Decimal::from(10_000));
}

#[test]
fn test_largely_sold_lot() {
    let t = AnalyticsThresholds::default();
    let lot = facts(12_000_000, 120_000, 11_000_000, vec![entry(500_000, 100, true)]);
    let report = build_lot_analytics(&lot, date("2024-06-01"), &t);

    assert_eq!(report.status, LotStatus::Sold);
    assert_eq!(report.current_count, 500_000);
    assert_eq!(report.mortality_percentage, Decimal::ONE);
    assert_eq!(report.risk_level, RiskLevel::Basso);
    assert_eq!(report.days_in_system, 61);
    assert_eq!(report.last_operation, "misura (2024-05-20)");
    // 500 000 animals at 2 mg
    assert_eq!(report.total_weight_grams, Decimal::from(1_000));
}

#[test]
fn test_completed_and_high_risk_lot() {
    let t = AnalyticsThresholds::default();
    let lot = facts(100_000, 12_000, 0, vec![entry(88_000, 100, false)]);
    let report = build_lot_analytics(&lot, date("2024-06-01"), &t);

    assert_eq!(report.status, LotStatus::Completed);
    assert_eq!(report.current_count, 0);
    assert_eq!(report.risk_level, RiskLevel::Alto);
    assert_eq!(report.baskets_used, 1);
    assert_eq!(report.active_baskets_used, 0);
}

#[test]
fn test_lot_without_operations() {
    let t = AnalyticsThresholds::default();
    let mut lot = facts(1_000, 0, 0, vec![]);
    lot.last_operation = None;
    lot.supplier_lot_number = None;
    let report = build_lot_analytics(&lot, date("2024-04-01"), &t);
    assert_eq!(report.last_operation, "Nessuna");
    assert_eq!(report.supplier_lot_number, "");
    assert_eq!(report.mortality_percentage, Decimal::ZERO);
}

#[test]
fn test_mortality_trends_grouped_per_day() {
    let lot = Uuid::new_v4();
    let record = |d: &str, dead: i64, animals: i64| MortalityRecord {
        date: date(d),
        lot_id: lot,
        supplier: "Ecotapes".to_string(),
        lot_number: None,
        dead_count: dead,
        animal_count: Some(animals),
    };
    let records = vec![
        record("2024-05-02", 10, 1_000),
        record("2024-05-01", 5, 500),
        record("2024-05-02", 30, 1_000),
    ];

    let report = build_mortality_trends(&records, 30);
    assert_eq!(report.period, "30 giorni");
    assert_eq!(report.trends.len(), 2);
    assert_eq!(report.trends[0].date, date("2024-05-01"));
    assert_eq!(report.trends[1].total_mortality, 40);
    assert_eq!(report.trends[1].lot_count, 2);
    assert_eq!(report.trends[1].mortality_percentage, Decimal::from(2));
    assert_eq!(report.summary.total_mortality, 45);
    assert_eq!(report.summary.average_mortality_rate, Decimal::new(15, 1));
}

#[test]
fn test_live_inventory_groups_baskets_per_lot() {
    let lot = Uuid::new_v4();
    let record = |number: i32, position: i32, animals: i64, flupsy: &str| InventoryRecord {
        lot_id: lot,
        supplier: "Ecotapes".to_string(),
        lot_number: Some("L-7".to_string()),
        arrival_date: date("2024-05-01"),
        basket_id: Uuid::new_v4(),
        physical_number: number,
        flupsy_name: Some(flupsy.to_string()),
        row: Some(BasketRow::Dx),
        position: Some(position),
        animal_count: animals,
        percentage: Decimal::ONE_HUNDRED,
    };
    let records = vec![
        record(1, 1, 1_000, "Flupsy 2"),
        record(2, 2, 2_000, "Flupsy 1"),
        record(3, 3, 3_001, "Flupsy 1"),
    ];

    let report = build_live_inventory(&records, date("2024-05-11"));
    assert_eq!(report.inventory.len(), 1);
    let lot = &report.inventory[0];
    assert_eq!(lot.total_animals, 6_001);
    assert_eq!(lot.basket_count, 3);
    assert_eq!(lot.flupsys, vec!["Flupsy 1".to_string(), "Flupsy 2".to_string()]);
    assert_eq!(lot.average_animals_per_basket, Decimal::new(20003, 1));
    assert_eq!(lot.days_in_system, 10);
    assert_eq!(lot.baskets[0].position, "DX1");
    assert_eq!(report.summary.total_baskets, 3);
}

#[test]
fn test_mixed_composition_skips_single_lot_baskets() {
    let component = |pct: i64, animals: i64, mortality: i64| MixedComponent {
        lot_id: Uuid::new_v4(),
        supplier: "Ecotapes".to_string(),
        lot_number: None,
        percentage: Decimal::from(pct),
        animal_count: animals,
        total_mortality: mortality,
    };
    let basket = |components: Vec<MixedComponent>| MixedBasketFacts {
        basket_id: Uuid::new_v4(),
        cycle_id: Uuid::new_v4(),
        physical_number: 4,
        flupsy_id: Uuid::new_v4(),
        flupsy_name: "Flupsy 1".to_string(),
        components,
    };

    let report = build_mixed_composition(
        vec![
            basket(vec![component(100, 1_000, 10)]),
            basket(vec![component(40, 400, 30), component(60, 600, 50)]),
        ],
        &AnalyticsThresholds::default(),
    );

    assert_eq!(report.mixed_baskets.len(), 1);
    let mixed = &report.mixed_baskets[0];
    assert_eq!(mixed.lot_count, 2);
    assert_eq!(mixed.total_animals, 1_000);
    assert_eq!(mixed.compositions[0].percentage, Decimal::from(60));
    assert_eq!(report.summary.total_mixed_baskets, 1);
}

proptest! {
    #[test]
    fn prop_sold_status_at_threshold(initial in 1i64..=100_000_000) {
        let t = AnalyticsThresholds::default();
        let sold = (initial * 9 + 9) / 10;
        prop_assert_eq!(classify_lot_status(initial, 1, sold, &t), LotStatus::Sold);
    }

    #[test]
    fn prop_unsold_empty_lot_is_completed(initial in 0i64..=100_000_000) {
        let t = AnalyticsThresholds::default();
        prop_assert_eq!(classify_lot_status(initial, 0, 0, &t), LotStatus::Completed);
    }
}
