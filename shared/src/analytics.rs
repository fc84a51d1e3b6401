//! Lot, mortality and inventory roll-ups
//!
//! The backend loads raw facts with SQL and hands them to the builders in
//! this module, which own every classification rule and derived figure of
//! the analytics reports.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::measurement::round_half_up;
use crate::models::{position_label, BasketRow, OperationType};

// ============================================================================
// Thresholds and classifications
// ============================================================================

/// Tunable classification thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsThresholds {
    /// Fraction of the initial count that marks a lot as sold
    pub sold_threshold: Decimal,
    /// Mortality percentage above which risk is `medio`
    pub risk_medium_percent: Decimal,
    /// Mortality percentage above which risk is `alto`
    pub risk_high_percent: Decimal,
}

impl Default for AnalyticsThresholds {
    fn default() -> Self {
        Self {
            sold_threshold: Decimal::new(9, 1),
            risk_medium_percent: Decimal::from(5),
            risk_high_percent: Decimal::from(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LotStatus {
    Active,
    Sold,
    Completed,
}

impl LotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Active => "active",
            LotStatus::Sold => "sold",
            LotStatus::Completed => "completed",
        }
    }

    /// Label used in exported reports
    pub fn label_it(&self) -> &'static str {
        match self {
            LotStatus::Active => "Attivo",
            LotStatus::Sold => "Venduto",
            LotStatus::Completed => "Completato",
        }
    }
}

/// Lifecycle status of a lot from its counts.
///
/// A lot with no recorded initial count is never considered sold.
pub fn classify_lot_status(
    initial_count: i64,
    current_count: i64,
    sold_count: i64,
    thresholds: &AnalyticsThresholds,
) -> LotStatus {
    if initial_count > 0
        && Decimal::from(sold_count) >= Decimal::from(initial_count) * thresholds.sold_threshold
    {
        LotStatus::Sold
    } else if current_count == 0 && sold_count == 0 {
        LotStatus::Completed
    } else {
        LotStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Basso,
    Medio,
    Alto,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Basso => "basso",
            RiskLevel::Medio => "medio",
            RiskLevel::Alto => "alto",
        }
    }
}

pub fn classify_risk(mortality_percentage: Decimal, thresholds: &AnalyticsThresholds) -> RiskLevel {
    if mortality_percentage > thresholds.risk_high_percent {
        RiskLevel::Alto
    } else if mortality_percentage > thresholds.risk_medium_percent {
        RiskLevel::Medio
    } else {
        RiskLevel::Basso
    }
}

/// Health of a single lot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LotHealth {
    Active,
    Warning,
    Critical,
}

pub fn classify_lot_health(
    mortality_percentage: Decimal,
    initial_count: i64,
    current_count: i64,
) -> LotHealth {
    if mortality_percentage > Decimal::from(15) {
        LotHealth::Critical
    } else if mortality_percentage > Decimal::from(8)
        || Decimal::from(current_count) < Decimal::from(initial_count) * Decimal::new(1, 1)
    {
        LotHealth::Warning
    } else {
        LotHealth::Active
    }
}

/// Quality label for a mortality percentage
pub fn quality_label(mortality_percentage: Decimal) -> &'static str {
    if mortality_percentage < Decimal::from(5) {
        "Ottima"
    } else if mortality_percentage < Decimal::from(8) {
        "Buona"
    } else if mortality_percentage < Decimal::from(15) {
        "Accettabile"
    } else {
        "Problematica"
    }
}

// ============================================================================
// Numeric helpers
// ============================================================================

/// `part / whole * 100`, zero when `whole` is not positive
pub fn percentage(part: i64, whole: i64) -> Decimal {
    if whole <= 0 {
        return Decimal::ZERO;
    }
    Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(whole)
}

pub fn round1(value: Decimal) -> Decimal {
    round_half_up(value, 1)
}

pub fn days_in_system(arrival_date: NaiveDate, today: NaiveDate) -> i64 {
    (today - arrival_date).num_days()
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len() as i64)
}

// ============================================================================
// Lot analytics
// ============================================================================

/// One composition row of a lot
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionEntry {
    pub basket_id: Uuid,
    pub animal_count: i64,
    pub percentage: Decimal,
    /// Whether the owning cycle is active
    pub active: bool,
}

/// How a lot is spread over baskets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionStats {
    pub current_count: i64,
    pub baskets_used: i64,
    pub active_baskets_used: i64,
    pub mixed_baskets: i64,
    pub pure_baskets: i64,
    pub average_distribution_percentage: Decimal,
    pub fragmentation_level: Decimal,
    pub is_mixed: bool,
}

impl DistributionStats {
    pub fn from_compositions(entries: &[CompositionEntry]) -> Self {
        let baskets_used = entries
            .iter()
            .map(|e| e.basket_id)
            .collect::<HashSet<_>>()
            .len() as i64;
        let active_baskets_used = entries
            .iter()
            .filter(|e| e.active)
            .map(|e| e.basket_id)
            .collect::<HashSet<_>>()
            .len() as i64;
        let current_count = entries
            .iter()
            .filter(|e| e.active)
            .map(|e| e.animal_count)
            .sum();
        let mixed_baskets = entries
            .iter()
            .filter(|e| e.percentage < Decimal::ONE_HUNDRED)
            .count() as i64;
        let pure_baskets = entries.len() as i64 - mixed_baskets;
        let percentages: Vec<Decimal> = entries.iter().map(|e| e.percentage).collect();

        Self {
            current_count,
            baskets_used,
            active_baskets_used,
            mixed_baskets,
            pure_baskets,
            average_distribution_percentage: round1(mean(&percentages)),
            fragmentation_level: round1(percentage(mixed_baskets, baskets_used)),
            is_mixed: mixed_baskets > 0,
        }
    }
}

/// Facts loaded for one lot of the lots report
#[derive(Debug, Clone)]
pub struct LotFacts {
    pub id: Uuid,
    pub supplier: String,
    pub supplier_lot_number: Option<String>,
    pub arrival_date: NaiveDate,
    pub initial_count: i64,
    pub total_mortality: i64,
    pub compositions: Vec<CompositionEntry>,
    pub sold_count: i64,
    pub sold_weight_grams: Decimal,
    pub average_weight_mg: Option<Decimal>,
    pub last_operation: Option<(OperationType, NaiveDate)>,
}

/// One row of the lots report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotAnalytics {
    pub id: Uuid,
    pub supplier: String,
    pub supplier_lot_number: String,
    pub arrival_date: NaiveDate,
    pub initial_count: i64,
    pub current_count: i64,
    pub sold_count: i64,
    pub mortality_count: i64,
    pub mortality_percentage: Decimal,
    pub average_weight_mg: Decimal,
    pub total_weight_grams: Decimal,
    pub status: LotStatus,
    pub days_in_system: i64,
    pub baskets_used: i64,
    pub active_baskets_used: i64,
    pub last_operation: String,
    pub mixed_baskets_count: i64,
    pub pure_baskets_count: i64,
    pub average_distribution_percentage: Decimal,
    pub fragmentation_level: Decimal,
    pub is_mixed_lot: bool,
    pub risk_level: RiskLevel,
    pub sold_weight_grams: Decimal,
}

pub fn build_lot_analytics(
    facts: &LotFacts,
    today: NaiveDate,
    thresholds: &AnalyticsThresholds,
) -> LotAnalytics {
    let distribution = DistributionStats::from_compositions(&facts.compositions);
    let mortality_percentage = percentage(facts.total_mortality, facts.initial_count);
    let average_weight_mg = facts.average_weight_mg.unwrap_or(Decimal::ZERO);

    let last_operation = match &facts.last_operation {
        Some((kind, date)) => format!("{} ({})", kind, date),
        None => "Nessuna".to_string(),
    };

    LotAnalytics {
        id: facts.id,
        supplier: facts.supplier.clone(),
        supplier_lot_number: facts.supplier_lot_number.clone().unwrap_or_default(),
        arrival_date: facts.arrival_date,
        initial_count: facts.initial_count,
        current_count: distribution.current_count,
        sold_count: facts.sold_count,
        mortality_count: facts.total_mortality,
        mortality_percentage: round_half_up(mortality_percentage, 2),
        average_weight_mg: round_half_up(average_weight_mg, 4),
        total_weight_grams: round_half_up(
            Decimal::from(distribution.current_count) * average_weight_mg / Decimal::ONE_THOUSAND,
            1,
        ),
        status: classify_lot_status(
            facts.initial_count,
            distribution.current_count,
            facts.sold_count,
            thresholds,
        ),
        days_in_system: days_in_system(facts.arrival_date, today),
        baskets_used: distribution.baskets_used,
        active_baskets_used: distribution.active_baskets_used,
        last_operation,
        mixed_baskets_count: distribution.mixed_baskets,
        pure_baskets_count: distribution.pure_baskets,
        average_distribution_percentage: distribution.average_distribution_percentage,
        fragmentation_level: distribution.fragmentation_level,
        is_mixed_lot: distribution.is_mixed,
        risk_level: classify_risk(mortality_percentage, thresholds),
        sold_weight_grams: round_half_up(facts.sold_weight_grams, 0),
    }
}

// ============================================================================
// Single lot analytics
// ============================================================================

#[derive(Debug, Clone)]
pub struct SingleLotFacts {
    pub id: Uuid,
    pub supplier: String,
    pub supplier_lot_number: Option<String>,
    pub arrival_date: NaiveDate,
    pub initial_count: i64,
    pub initial_weight_grams: Option<Decimal>,
    pub total_mortality: i64,
    pub sold_count: i64,
    pub current_count: i64,
    pub baskets_used: i64,
    pub active_baskets_count: i64,
    /// Mean animals/kg over the recent measurement window
    pub recent_animals_per_kg: Option<Decimal>,
    pub last_operation: Option<(OperationType, NaiveDate)>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleLotAnalytics {
    pub id: Uuid,
    pub supplier: String,
    pub supplier_lot_number: String,
    pub arrival_date: NaiveDate,
    pub initial_count: i64,
    pub current_count: i64,
    pub sold_count: i64,
    pub mortality_count: i64,
    pub mortality_percentage: Decimal,
    pub current_weight_grams: Decimal,
    pub initial_weight_grams: Decimal,
    pub weight_growth: Decimal,
    pub active_baskets_count: i64,
    pub last_operation_date: NaiveDate,
    pub last_operation_type: OperationType,
    pub quality: String,
    pub status: LotHealth,
    pub days_in_system: i64,
    pub baskets_used: i64,
    pub notes: Option<String>,
}

pub fn build_single_lot_analytics(facts: &SingleLotFacts, today: NaiveDate) -> SingleLotAnalytics {
    let mortality_percentage = percentage(facts.total_mortality, facts.initial_count);

    let average_weight_mg = match facts.recent_animals_per_kg {
        Some(apk) if apk > Decimal::ZERO => Decimal::from(1_000_000) / apk,
        _ => Decimal::ZERO,
    };
    let initial_weight = facts.initial_weight_grams.unwrap_or(Decimal::ZERO);
    let current_weight =
        Decimal::from(facts.current_count) * average_weight_mg / Decimal::ONE_THOUSAND;
    let weight_growth = if initial_weight > Decimal::ZERO {
        (current_weight - initial_weight) / initial_weight * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    let (last_operation_type, last_operation_date) = facts
        .last_operation
        .unwrap_or((OperationType::PrimaAttivazione, facts.arrival_date));

    SingleLotAnalytics {
        id: facts.id,
        supplier: facts.supplier.clone(),
        supplier_lot_number: facts.supplier_lot_number.clone().unwrap_or_default(),
        arrival_date: facts.arrival_date,
        initial_count: facts.initial_count,
        current_count: facts.current_count,
        sold_count: facts.sold_count,
        mortality_count: facts.total_mortality,
        mortality_percentage: round1(mortality_percentage),
        current_weight_grams: round_half_up(current_weight, 0),
        initial_weight_grams: round_half_up(initial_weight, 0),
        weight_growth: round1(weight_growth),
        active_baskets_count: facts.active_baskets_count,
        last_operation_date,
        last_operation_type,
        quality: quality_label(mortality_percentage).to_string(),
        status: classify_lot_health(mortality_percentage, facts.initial_count, facts.current_count),
        days_in_system: days_in_system(facts.arrival_date, today),
        baskets_used: facts.baskets_used,
        notes: facts.notes.clone(),
    }
}

// ============================================================================
// Mortality trend
// ============================================================================

/// An operation that recorded dead animals
#[derive(Debug, Clone)]
pub struct MortalityRecord {
    pub date: NaiveDate,
    pub lot_id: Uuid,
    pub supplier: String,
    pub lot_number: Option<String>,
    pub dead_count: i64,
    pub animal_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MortalityLotEntry {
    pub lot_id: Uuid,
    pub supplier: String,
    pub lot_number: Option<String>,
    pub mortality: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MortalityDay {
    pub date: NaiveDate,
    pub total_mortality: i64,
    pub total_animals: i64,
    pub mortality_percentage: Decimal,
    pub lot_count: i64,
    pub lots: Vec<MortalityLotEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MortalityTrendSummary {
    pub total_days: i64,
    pub total_mortality: i64,
    pub average_mortality_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MortalityTrendReport {
    pub trends: Vec<MortalityDay>,
    pub period: String,
    pub summary: MortalityTrendSummary,
}

/// Group mortality records per day, oldest first
pub fn build_mortality_trends(records: &[MortalityRecord], days: i64) -> MortalityTrendReport {
    let mut by_date: BTreeMap<NaiveDate, MortalityDay> = BTreeMap::new();

    for record in records {
        let day = by_date.entry(record.date).or_insert_with(|| MortalityDay {
            date: record.date,
            total_mortality: 0,
            total_animals: 0,
            mortality_percentage: Decimal::ZERO,
            lot_count: 0,
            lots: Vec::new(),
        });
        day.total_mortality += record.dead_count;
        day.total_animals += record.animal_count.unwrap_or(0);
        day.lots.push(MortalityLotEntry {
            lot_id: record.lot_id,
            supplier: record.supplier.clone(),
            lot_number: record.lot_number.clone(),
            mortality: record.dead_count,
        });
    }

    let trends: Vec<MortalityDay> = by_date
        .into_values()
        .map(|mut day| {
            day.mortality_percentage =
                round_half_up(percentage(day.total_mortality, day.total_animals), 2);
            day.lot_count = day.lots.len() as i64;
            day
        })
        .collect();

    let rates: Vec<Decimal> = trends.iter().map(|d| d.mortality_percentage).collect();
    let summary = MortalityTrendSummary {
        total_days: trends.len() as i64,
        total_mortality: trends.iter().map(|d| d.total_mortality).sum(),
        average_mortality_rate: round_half_up(mean(&rates), 2),
    };

    MortalityTrendReport {
        trends,
        period: format!("{} giorni", days),
        summary,
    }
}

// ============================================================================
// Live inventory
// ============================================================================

/// One active-cycle composition row joined with its basket and FLUPSY
#[derive(Debug, Clone)]
pub struct InventoryRecord {
    pub lot_id: Uuid,
    pub supplier: String,
    pub lot_number: Option<String>,
    pub arrival_date: NaiveDate,
    pub basket_id: Uuid,
    pub physical_number: i32,
    pub flupsy_name: Option<String>,
    pub row: Option<BasketRow>,
    pub position: Option<i32>,
    pub animal_count: i64,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryBasket {
    pub basket_id: Uuid,
    pub physical_number: i32,
    pub flupsy_name: Option<String>,
    pub position: String,
    pub animal_count: i64,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotInventory {
    pub lot_id: Uuid,
    pub supplier: String,
    pub lot_number: Option<String>,
    pub arrival_date: NaiveDate,
    pub total_animals: i64,
    pub baskets: Vec<InventoryBasket>,
    pub flupsys: Vec<String>,
    pub basket_count: i64,
    pub average_animals_per_basket: Decimal,
    pub days_in_system: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub total_lots: i64,
    pub total_animals: i64,
    pub total_baskets: i64,
    pub calculation_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveInventoryReport {
    pub inventory: Vec<LotInventory>,
    pub summary: InventorySummary,
}

/// Group active compositions per lot, in first-seen order
pub fn build_live_inventory(records: &[InventoryRecord], today: NaiveDate) -> LiveInventoryReport {
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    let mut lots: Vec<(LotInventory, BTreeSet<String>)> = Vec::new();

    for record in records {
        let slot = *index.entry(record.lot_id).or_insert_with(|| {
            lots.push((
                LotInventory {
                    lot_id: record.lot_id,
                    supplier: record.supplier.clone(),
                    lot_number: record.lot_number.clone(),
                    arrival_date: record.arrival_date,
                    total_animals: 0,
                    baskets: Vec::new(),
                    flupsys: Vec::new(),
                    basket_count: 0,
                    average_animals_per_basket: Decimal::ZERO,
                    days_in_system: days_in_system(record.arrival_date, today),
                },
                BTreeSet::new(),
            ));
            lots.len() - 1
        });

        let (lot, flupsys) = &mut lots[slot];
        lot.total_animals += record.animal_count;
        lot.baskets.push(InventoryBasket {
            basket_id: record.basket_id,
            physical_number: record.physical_number,
            flupsy_name: record.flupsy_name.clone(),
            position: position_label(record.row, record.position),
            animal_count: record.animal_count,
            percentage: record.percentage,
        });
        if let Some(name) = &record.flupsy_name {
            flupsys.insert(name.clone());
        }
    }

    let inventory: Vec<LotInventory> = lots
        .into_iter()
        .map(|(mut lot, flupsys)| {
            lot.flupsys = flupsys.into_iter().collect();
            lot.basket_count = lot.baskets.len() as i64;
            if lot.basket_count > 0 {
                lot.average_animals_per_basket = round_half_up(
                    Decimal::from(lot.total_animals) / Decimal::from(lot.basket_count),
                    1,
                );
            }
            lot
        })
        .collect();

    let summary = InventorySummary {
        total_lots: inventory.len() as i64,
        total_animals: inventory.iter().map(|l| l.total_animals).sum(),
        total_baskets: inventory.iter().map(|l| l.basket_count).sum(),
        calculation_time_ms: 0,
    };

    LiveInventoryReport { inventory, summary }
}

// ============================================================================
// Size distribution
// ============================================================================

/// Active-cycle operations aggregated for one size
#[derive(Debug, Clone)]
pub struct SizeAggregate {
    pub size_id: Uuid,
    pub size_code: String,
    pub size_name: String,
    pub basket_count: i64,
    pub total_animals: i64,
    pub average_weight_mg: Option<Decimal>,
    pub last_update: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthPoint {
    pub date: NaiveDate,
    pub weight_mg: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeDistributionEntry {
    pub size_id: Uuid,
    pub size_code: String,
    pub size_name: String,
    pub basket_count: i64,
    pub total_animals: i64,
    pub average_weight_mg: Option<Decimal>,
    pub last_update: Option<NaiveDate>,
    pub percentage: Decimal,
    pub growth_data: Vec<GrowthPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeDistributionSummary {
    pub total_sizes: i64,
    pub total_animals: i64,
    pub total_baskets: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeDistributionReport {
    pub distribution: Vec<SizeDistributionEntry>,
    pub summary: SizeDistributionSummary,
}

/// Attach population shares and growth series to per-size aggregates.
///
/// `growth` holds `(size_id, date, average_weight_mg)` points sorted by date.
pub fn build_size_distribution(
    aggregates: &[SizeAggregate],
    growth: &[(Uuid, NaiveDate, Decimal)],
) -> SizeDistributionReport {
    let mut growth_by_size: HashMap<Uuid, Vec<GrowthPoint>> = HashMap::new();
    for (size_id, date, weight_mg) in growth {
        growth_by_size.entry(*size_id).or_default().push(GrowthPoint {
            date: *date,
            weight_mg: *weight_mg,
        });
    }

    let total_animals: i64 = aggregates.iter().map(|a| a.total_animals).sum();

    let distribution: Vec<SizeDistributionEntry> = aggregates
        .iter()
        .map(|a| SizeDistributionEntry {
            size_id: a.size_id,
            size_code: a.size_code.clone(),
            size_name: a.size_name.clone(),
            basket_count: a.basket_count,
            total_animals: a.total_animals,
            average_weight_mg: a.average_weight_mg.map(|w| round_half_up(w, 4)),
            last_update: a.last_update,
            percentage: round_half_up(percentage(a.total_animals, total_animals), 2),
            growth_data: growth_by_size.remove(&a.size_id).unwrap_or_default(),
        })
        .collect();

    let summary = SizeDistributionSummary {
        total_sizes: distribution.len() as i64,
        total_animals,
        total_baskets: distribution.iter().map(|d| d.basket_count).sum(),
    };

    SizeDistributionReport {
        distribution,
        summary,
    }
}

// ============================================================================
// Mixed-lot baskets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixedComponent {
    pub lot_id: Uuid,
    pub supplier: String,
    pub lot_number: Option<String>,
    pub percentage: Decimal,
    pub animal_count: i64,
    pub total_mortality: i64,
}

/// An active basket and the lots it holds
#[derive(Debug, Clone)]
pub struct MixedBasketFacts {
    pub basket_id: Uuid,
    pub cycle_id: Uuid,
    pub physical_number: i32,
    pub flupsy_id: Uuid,
    pub flupsy_name: String,
    pub components: Vec<MixedComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixedBasket {
    pub basket_id: Uuid,
    pub cycle_id: Uuid,
    pub physical_number: i32,
    pub flupsy_id: Uuid,
    pub flupsy_name: String,
    pub lot_count: i64,
    pub total_animals: i64,
    /// e.g. "Supplier A (60%); Supplier B (40%)"
    pub composition_label: String,
    pub compositions: Vec<MixedComponent>,
    pub estimated_mortality_rate: Decimal,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixedCompositionSummary {
    pub total_mixed_baskets: i64,
    pub average_lots_per_basket: Decimal,
    pub total_animals_in_mixed_baskets: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixedCompositionReport {
    pub mixed_baskets: Vec<MixedBasket>,
    pub summary: MixedCompositionSummary,
}

/// Keep baskets holding more than one lot and estimate their mortality risk.
///
/// A component's lot mortality counts toward the basket only when the
/// component still holds animals.
pub fn build_mixed_composition(
    baskets: Vec<MixedBasketFacts>,
    thresholds: &AnalyticsThresholds,
) -> MixedCompositionReport {
    let mixed_baskets: Vec<MixedBasket> = baskets
        .into_iter()
        .filter_map(|facts| {
            let lot_count = facts
                .components
                .iter()
                .map(|c| c.lot_id)
                .collect::<HashSet<_>>()
                .len() as i64;
            if lot_count <= 1 {
                return None;
            }

            let mut components = facts.components;
            components.sort_by(|a, b| b.percentage.cmp(&a.percentage));

            let total_animals: i64 = components.iter().map(|c| c.animal_count).sum();
            let estimated_mortality: i64 = components
                .iter()
                .filter(|c| c.animal_count > 0)
                .map(|c| c.total_mortality)
                .sum();
            let rate = percentage(estimated_mortality, total_animals);

            let composition_label = components
                .iter()
                .map(|c| format!("{} ({}%)", c.supplier, c.percentage.normalize()))
                .collect::<Vec<_>>()
                .join("; ");

            Some(MixedBasket {
                basket_id: facts.basket_id,
                cycle_id: facts.cycle_id,
                physical_number: facts.physical_number,
                flupsy_id: facts.flupsy_id,
                flupsy_name: facts.flupsy_name,
                lot_count,
                total_animals,
                composition_label,
                compositions: components,
                estimated_mortality_rate: round_half_up(rate, 2),
                risk_level: classify_risk(rate, thresholds),
            })
        })
        .collect();

    let total_mixed = mixed_baskets.len() as i64;
    let average_lots_per_basket = if total_mixed > 0 {
        round_half_up(
            Decimal::from(mixed_baskets.iter().map(|b| b.lot_count).sum::<i64>())
                / Decimal::from(total_mixed),
            2,
        )
    } else {
        Decimal::ZERO
    };

    let summary = MixedCompositionSummary {
        total_mixed_baskets: total_mixed,
        average_lots_per_basket,
        total_animals_in_mixed_baskets: mixed_baskets.iter().map(|b| b.total_animals).sum(),
    };

    MixedCompositionReport {
        mixed_baskets,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_lot_status_sold_at_ninety_percent() {
        let t = AnalyticsThresholds::default();
        assert_eq!(
            classify_lot_status(12_000_000, 500_000, 11_000_000, &t),
            LotStatus::Sold
        );
        assert_eq!(classify_lot_status(1_000, 0, 900, &t), LotStatus::Sold);
        assert_eq!(classify_lot_status(1_000, 200, 899, &t), LotStatus::Active);
    }

    #[test]
    fn test_lot_status_completed_and_unknown_initial() {
        let t = AnalyticsThresholds::default();
        assert_eq!(classify_lot_status(1_000, 0, 0, &t), LotStatus::Completed);
        assert_eq!(classify_lot_status(0, 0, 0, &t), LotStatus::Completed);
        assert_eq!(classify_lot_status(0, 10, 0, &t), LotStatus::Active);
    }

    #[test]
    fn test_risk_levels() {
        let t = AnalyticsThresholds::default();
        assert_eq!(classify_risk(Decimal::from(5), &t), RiskLevel::Basso);
        assert_eq!(classify_risk(Decimal::new(51, 1), &t), RiskLevel::Medio);
        assert_eq!(classify_risk(Decimal::from(10), &t), RiskLevel::Medio);
        assert_eq!(classify_risk(Decimal::new(101, 1), &t), RiskLevel::Alto);
    }

    #[test]
    fn test_lot_health_and_quality() {
        assert_eq!(
            classify_lot_health(Decimal::from(16), 100, 90),
            LotHealth::Critical
        );
        assert_eq!(classify_lot_health(Decimal::from(9), 100, 90), LotHealth::Warning);
        assert_eq!(classify_lot_health(Decimal::ONE, 100, 5), LotHealth::Warning);
        assert_eq!(classify_lot_health(Decimal::ONE, 100, 50), LotHealth::Active);

        assert_eq!(quality_label(Decimal::from(4)), "Ottima");
        assert_eq!(quality_label(Decimal::from(5)), "Buona");
        assert_eq!(quality_label(Decimal::from(8)), "Accettabile");
        assert_eq!(quality_label(Decimal::from(15)), "Problematica");
    }

    #[test]
    fn test_distribution_stats() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let entries = vec![
            CompositionEntry {
                basket_id: a,
                animal_count: 600,
                percentage: Decimal::from(60),
                active: true,
            },
            CompositionEntry {
                basket_id: b,
                animal_count: 1_000,
                percentage: Decimal::ONE_HUNDRED,
                active: false,
            },
        ];
        let stats = DistributionStats::from_compositions(&entries);
        assert_eq!(stats.current_count, 600);
        assert_eq!(stats.baskets_used, 2);
        assert_eq!(stats.active_baskets_used, 1);
        assert_eq!(stats.mixed_baskets, 1);
        assert_eq!(stats.pure_baskets, 1);
        assert_eq!(stats.average_distribution_percentage, Decimal::from(80));
        assert_eq!(stats.fragmentation_level, Decimal::from(50));
        assert!(stats.is_mixed);
    }

    #[test]
    fn test_build_lot_analytics() {
        let facts = LotFacts {
            id: Uuid::new_v4(),
            supplier: "Ecotapes".to_string(),
            supplier_lot_number: None,
            arrival_date: date("2024-05-01"),
            initial_count: 10_000,
            total_mortality: 600,
            compositions: vec![CompositionEntry {
                basket_id: Uuid::new_v4(),
                animal_count: 8_000,
                percentage: Decimal::ONE_HUNDRED,
                active: true,
            }],
            sold_count: 0,
            sold_weight_grams: Decimal::ZERO,
            average_weight_mg: Some(Decimal::from(250)),
            last_operation: Some((OperationType::Misura, date("2024-05-20"))),
        };

        let row = build_lot_analytics(&facts, date("2024-05-31"), &AnalyticsThresholds::default());
        assert_eq!(row.current_count, 8_000);
        assert_eq!(row.mortality_percentage, Decimal::from(6));
        assert_eq!(row.risk_level, RiskLevel::Medio);
        assert_eq!(row.status, LotStatus::Active);
        assert_eq!(row.total_weight_grams, Decimal::from(2_000));
        assert_eq!(row.days_in_system, 30);
        assert_eq!(row.last_operation, "misura (2024-05-20)");
        assert_eq!(row.supplier_lot_number, "");
        assert!(!row.is_mixed_lot);
    }

    #[test]
    fn test_build_single_lot_defaults_last_operation() {
        let facts = SingleLotFacts {
            id: Uuid::new_v4(),
            supplier: "Ecotapes".to_string(),
            supplier_lot_number: Some("L-1".to_string()),
            arrival_date: date("2024-05-01"),
            initial_count: 1_000,
            initial_weight_grams: Some(Decimal::from(100)),
            total_mortality: 20,
            sold_count: 0,
            current_count: 800,
            baskets_used: 1,
            active_baskets_count: 1,
            recent_animals_per_kg: Some(Decimal::from(4_000)),
            last_operation: None,
            notes: None,
        };
        let result = build_single_lot_analytics(&facts, date("2024-05-11"));
        assert_eq!(result.last_operation_type, OperationType::PrimaAttivazione);
        assert_eq!(result.last_operation_date, date("2024-05-01"));
        // 800 animals at 250 mg = 200 g, +100% over the initial 100 g
        assert_eq!(result.current_weight_grams, Decimal::from(200));
        assert_eq!(result.weight_growth, Decimal::from(100));
        assert_eq!(result.quality, "Ottima");
        assert_eq!(result.status, LotHealth::Active);
        assert_eq!(result.days_in_system, 10);
    }

    #[test]
    fn test_mortality_trends_grouped_by_date() {
        let lot = Uuid::new_v4();
        let record = |d: &str, dead: i64, animals: Option<i64>| MortalityRecord {
            date: date(d),
            lot_id: lot,
            supplier: "Ecotapes".to_string(),
            lot_number: None,
            dead_count: dead,
            animal_count: animals,
        };
        let records = vec![
            record("2024-05-02", 10, Some(100)),
            record("2024-05-01", 5, Some(100)),
            record("2024-05-02", 10, Some(100)),
        ];

        let report = build_mortality_trends(&records, 30);
        assert_eq!(report.period, "30 giorni");
        assert_eq!(report.trends.len(), 2);
        assert_eq!(report.trends[0].date, date("2024-05-01"));
        assert_eq!(report.trends[1].total_mortality, 20);
        assert_eq!(report.trends[1].lot_count, 2);
        assert_eq!(report.trends[1].mortality_percentage, Decimal::from(10));
        assert_eq!(report.summary.total_mortality, 25);
        assert_eq!(report.summary.average_mortality_rate, Decimal::new(75, 1));
    }

    #[test]
    fn test_live_inventory_grouping() {
        let lot = Uuid::new_v4();
        let record = |basket: i32, flupsy: &str, count: i64| InventoryRecord {
            lot_id: lot,
            supplier: "Ecotapes".to_string(),
            lot_number: None,
            arrival_date: date("2024-05-01"),
            basket_id: Uuid::new_v4(),
            physical_number: basket,
            flupsy_name: Some(flupsy.to_string()),
            row: Some(BasketRow::Dx),
            position: Some(basket),
            animal_count: count,
            percentage: Decimal::ONE_HUNDRED,
        };
        let records = vec![record(1, "Nord", 100), record(2, "Sud", 200), record(3, "Nord", 0)];

        let report = build_live_inventory(&records, date("2024-05-03"));
        assert_eq!(report.inventory.len(), 1);
        let lot = &report.inventory[0];
        assert_eq!(lot.total_animals, 300);
        assert_eq!(lot.basket_count, 3);
        assert_eq!(lot.flupsys, vec!["Nord".to_string(), "Sud".to_string()]);
        assert_eq!(lot.baskets[1].position, "DX2");
        assert_eq!(lot.average_animals_per_basket, Decimal::from(100));
        assert_eq!(lot.days_in_system, 2);
        assert_eq!(report.summary.total_baskets, 3);
    }

    #[test]
    fn test_size_distribution_shares() {
        let small = Uuid::new_v4();
        let large = Uuid::new_v4();
        let aggregate = |id, code: &str, animals| SizeAggregate {
            size_id: id,
            size_code: code.to_string(),
            size_name: code.to_string(),
            basket_count: 2,
            total_animals: animals,
            average_weight_mg: None,
            last_update: None,
        };
        let report = build_size_distribution(
            &[aggregate(small, "TP-3000", 750), aggregate(large, "TP-500", 250)],
            &[(small, date("2024-05-01"), Decimal::from(3))],
        );
        assert_eq!(report.distribution[0].percentage, Decimal::from(75));
        assert_eq!(report.distribution[0].growth_data.len(), 1);
        assert!(report.distribution[1].growth_data.is_empty());
        assert_eq!(report.summary.total_animals, 1_000);
        assert_eq!(report.summary.total_baskets, 4);
    }

    #[test]
    fn test_mixed_composition_filters_single_lot_baskets() {
        let component = |supplier: &str, pct: i64, count: i64, mortality: i64| MixedComponent {
            lot_id: Uuid::new_v4(),
            supplier: supplier.to_string(),
            lot_number: None,
            percentage: Decimal::from(pct),
            animal_count: count,
            total_mortality: mortality,
        };
        let basket = |components| MixedBasketFacts {
            basket_id: Uuid::new_v4(),
            cycle_id: Uuid::new_v4(),
            physical_number: 1,
            flupsy_id: Uuid::new_v4(),
            flupsy_name: "Nord".to_string(),
            components,
        };

        let report = build_mixed_composition(
            vec![
                basket(vec![component("A", 40, 400, 30), component("B", 60, 600, 50)]),
                basket(vec![component("C", 100, 1_000, 10)]),
            ],
            &AnalyticsThresholds::default(),
        );

        assert_eq!(report.mixed_baskets.len(), 1);
        let mixed = &report.mixed_baskets[0];
        assert_eq!(mixed.lot_count, 2);
        assert_eq!(mixed.composition_label, "B (60%); A (40%)");
        assert_eq!(mixed.estimated_mortality_rate, Decimal::from(8));
        assert_eq!(mixed.risk_level, RiskLevel::Medio);
        assert_eq!(report.summary.average_lots_per_basket, Decimal::from(2));
        assert_eq!(report.summary.total_animals_in_mixed_baskets, 1_000);
    }
}
