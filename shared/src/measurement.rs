//! Derived measurement calculator
//!
//! Converts a raw sample (weight and animal count, optionally a dead count,
//! a sampled percentage and a measured total weight) into the population
//! statistics stored on operations and shown on intake/measurement forms.
//!
//! All arithmetic is done on `Decimal` with half-away-from-zero rounding.
//! Missing or zero sample data yields `MeasurementError::InsufficientData`
//! instead of a division.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::{parse_count_input, parse_decimal_input, validate_sample_percentage};

/// Errors reported by the calculator
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum MeasurementError {
    #[error("Insufficient data: sample weight and sample count must both be greater than zero")]
    InsufficientData,

    #[error("{field} cannot be negative")]
    NegativeValue { field: &'static str },

    #[error("Sample percentage must be greater than 0 and at most 100")]
    InvalidSamplePercentage,

    #[error("{field} is outside the representable range")]
    OutOfRange { field: &'static str },
}

impl MeasurementError {
    /// Italian message shown on the forms
    pub fn message_it(&self) -> String {
        match self {
            MeasurementError::InsufficientData => {
                "Dati insufficienti: inserisci peso del campione e numero di animali".to_string()
            }
            MeasurementError::NegativeValue { field } => {
                format!("Il campo {} non può essere negativo", field)
            }
            MeasurementError::InvalidSamplePercentage => {
                "La percentuale del campione deve essere compresa tra 0 e 100".to_string()
            }
            MeasurementError::OutOfRange { field } => {
                format!("Il valore di {} è fuori dall'intervallo consentito", field)
            }
        }
    }
}

/// Which total-population estimate wins when both can be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationBasis {
    /// Use `animals_per_kg * total_weight_kg` when a total weight was entered
    #[default]
    PreferMeasuredWeight,
    /// Always extrapolate from the sampled percentage
    SampleExtrapolation,
}

/// Raw measurement as entered on a form; every field may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeasurementInput {
    /// Sample weight in grams
    pub sample_weight_grams: Option<Decimal>,
    /// Animals counted in the sample
    pub sample_count: Option<i64>,
    /// Measured total weight in kilograms
    pub total_weight_kg: Option<Decimal>,
    /// Dead animals counted in the sample
    pub dead_count: Option<i64>,
    /// Share of the population that was sampled (0-100], defaults to 100
    pub sample_percentage: Option<Decimal>,
    pub population_basis: PopulationBasis,
}

/// Full set of derived population statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMeasurement {
    pub animals_per_kg: i64,
    /// Average animal weight in milligrams, 4 decimal places
    pub average_weight_mg: Decimal,
    /// Population selected according to the population basis
    pub total_population: i64,
    /// Population extrapolated from the sample percentage
    pub sample_population: i64,
    /// Population back-calculated from the measured total weight
    pub weight_population: Option<i64>,
    /// Absolute difference between the two estimates when both exist
    pub population_discrepancy: Option<i64>,
    pub total_dead_count: Option<i64>,
    /// Mortality percentage, 1 decimal place, within [0, 100]
    pub mortality_rate: Option<Decimal>,
    /// Total weight in kilograms, measured or derived (1 decimal place)
    pub total_weight_kg: Option<Decimal>,
}

impl DerivedMeasurement {
    /// Total weight converted to grams for persistence
    pub fn total_weight_grams(&self) -> Option<Decimal> {
        self.total_weight_kg
            .and_then(|kg| kg.checked_mul(Decimal::ONE_THOUSAND))
    }
}

/// Compute every derived field from a raw measurement
pub fn calculate(input: &MeasurementInput) -> Result<DerivedMeasurement, MeasurementError> {
    check_non_negative_decimal(input.sample_weight_grams, "sampleWeightGrams")?;
    check_non_negative_count(input.sample_count, "sampleCount")?;
    check_non_negative_decimal(input.total_weight_kg, "totalWeightKg")?;
    check_non_negative_count(input.dead_count, "deadCount")?;

    let sample_weight = match input.sample_weight_grams {
        Some(w) if w > Decimal::ZERO => w,
        _ => return Err(MeasurementError::InsufficientData),
    };
    let sample_count = match input.sample_count {
        Some(c) if c > 0 => Decimal::from(c),
        _ => return Err(MeasurementError::InsufficientData),
    };

    let sample_percentage = input.sample_percentage.unwrap_or(Decimal::ONE_HUNDRED);
    validate_sample_percentage(sample_percentage)
        .map_err(|_| MeasurementError::InvalidSamplePercentage)?;
    let sampled_fraction = sample_percentage / Decimal::ONE_HUNDRED;

    let animals_per_kg = to_count(
        checked_div(
            checked_mul(sample_count, Decimal::ONE_THOUSAND, "animalsPerKg")?,
            sample_weight,
            "animalsPerKg",
        )?,
        "animalsPerKg",
    )?;
    // A sample heavier than 2 kg per animal rounds to zero animals/kg.
    if animals_per_kg == 0 {
        return Err(MeasurementError::InsufficientData);
    }
    let apk = Decimal::from(animals_per_kg);

    let average_weight_mg = round_half_up(
        checked_div(Decimal::from(1_000_000), apk, "averageWeightMg")?,
        4,
    );

    let sample_population = to_count(
        checked_div(sample_count, sampled_fraction, "samplePopulation")?,
        "samplePopulation",
    )?;

    let measured_weight = input.total_weight_kg.filter(|kg| *kg > Decimal::ZERO);
    let weight_population = match measured_weight {
        Some(kg) => Some(to_count(
            checked_mul(apk, kg, "weightPopulation")?,
            "weightPopulation",
        )?),
        None => None,
    };

    let total_population = match (input.population_basis, weight_population) {
        (PopulationBasis::PreferMeasuredWeight, Some(p)) if p > 0 => p,
        _ => sample_population,
    };

    let population_discrepancy = weight_population.map(|p| (p - sample_population).abs());

    let total_weight_kg = match measured_weight {
        Some(kg) => Some(kg),
        None if total_population > 0 => Some(round_half_up(
            checked_div(Decimal::from(total_population), apk, "totalWeightKg")?,
            1,
        )),
        None => None,
    };

    let (total_dead_count, mortality_rate) = match input.dead_count {
        Some(dead) if total_population > 0 => {
            let total_dead = if sample_percentage < Decimal::ONE_HUNDRED {
                to_count(
                    checked_div(Decimal::from(dead), sampled_fraction, "totalDeadCount")?,
                    "totalDeadCount",
                )?
            } else {
                dead
            };
            let denominator = Decimal::from(total_population) + Decimal::from(total_dead);
            let rate = round_half_up(
                checked_div(
                    checked_mul(Decimal::from(total_dead), Decimal::ONE_HUNDRED, "mortalityRate")?,
                    denominator,
                    "mortalityRate",
                )?,
                1,
            );
            (Some(total_dead), Some(rate))
        }
        _ => (None, None),
    };

    Ok(DerivedMeasurement {
        animals_per_kg,
        average_weight_mg,
        total_population,
        sample_population,
        weight_population,
        population_discrepancy,
        total_dead_count,
        mortality_rate,
        total_weight_kg,
    })
}

/// Animals per kg from a sample, `None` when the sample is unusable
pub fn animals_per_kg(sample_weight_grams: Decimal, sample_count: i64) -> Option<i64> {
    if sample_weight_grams <= Decimal::ZERO || sample_count <= 0 {
        return None;
    }
    let apk = Decimal::from(sample_count)
        .checked_mul(Decimal::ONE_THOUSAND)?
        .checked_div(sample_weight_grams)?;
    round_half_up(apk, 0).to_i64().filter(|v| *v > 0)
}

/// Average weight in mg for a given animals-per-kg value
pub fn average_weight_mg(animals_per_kg: i64) -> Option<Decimal> {
    if animals_per_kg <= 0 {
        return None;
    }
    Some(round_half_up(
        Decimal::from(1_000_000) / Decimal::from(animals_per_kg),
        4,
    ))
}

/// Form fields that feed the calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementField {
    SampleWeightGrams,
    SampleCount,
    TotalWeightKg,
    DeadCount,
    SamplePercentage,
}

impl MeasurementField {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sampleWeightGrams" | "sampleWeight" => Some(MeasurementField::SampleWeightGrams),
            "sampleCount" => Some(MeasurementField::SampleCount),
            "totalWeightKg" | "totalWeight" => Some(MeasurementField::TotalWeightKg),
            "deadCount" => Some(MeasurementField::DeadCount),
            "samplePercentage" => Some(MeasurementField::SamplePercentage),
            _ => None,
        }
    }
}

/// Form state: raw inputs plus the outcome derived from them.
///
/// Every `apply` sanitises one field and recomputes all derived values in a
/// single step, so dependent fields never observe a stale intermediate state.
#[derive(Debug, Clone)]
pub struct MeasurementForm {
    input: MeasurementInput,
    outcome: Result<DerivedMeasurement, MeasurementError>,
}

impl MeasurementForm {
    pub fn new(input: MeasurementInput) -> Self {
        let outcome = calculate(&input);
        Self { input, outcome }
    }

    /// Update one field from raw text and recompute
    pub fn apply(
        &mut self,
        field: MeasurementField,
        raw: &str,
    ) -> Result<&DerivedMeasurement, &MeasurementError> {
        match field {
            MeasurementField::SampleWeightGrams => {
                self.input.sample_weight_grams = parse_decimal_input(raw)
            }
            MeasurementField::SampleCount => self.input.sample_count = parse_count_input(raw),
            MeasurementField::TotalWeightKg => self.input.total_weight_kg = parse_decimal_input(raw),
            MeasurementField::DeadCount => self.input.dead_count = parse_count_input(raw),
            MeasurementField::SamplePercentage => {
                self.input.sample_percentage = parse_decimal_input(raw)
            }
        }
        self.recompute()
    }

    pub fn set_population_basis(
        &mut self,
        basis: PopulationBasis,
    ) -> Result<&DerivedMeasurement, &MeasurementError> {
        self.input.population_basis = basis;
        self.recompute()
    }

    pub fn input(&self) -> &MeasurementInput {
        &self.input
    }

    pub fn outcome(&self) -> Result<&DerivedMeasurement, &MeasurementError> {
        self.outcome.as_ref()
    }

    fn recompute(&mut self) -> Result<&DerivedMeasurement, &MeasurementError> {
        self.outcome = calculate(&self.input);
        self.outcome.as_ref()
    }
}

impl Default for MeasurementForm {
    fn default() -> Self {
        Self::new(MeasurementInput::default())
    }
}

pub(crate) fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

fn to_count(value: Decimal, field: &'static str) -> Result<i64, MeasurementError> {
    round_half_up(value, 0)
        .to_i64()
        .ok_or(MeasurementError::OutOfRange { field })
}

fn checked_mul(a: Decimal, b: Decimal, field: &'static str) -> Result<Decimal, MeasurementError> {
    a.checked_mul(b).ok_or(MeasurementError::OutOfRange { field })
}

fn checked_div(a: Decimal, b: Decimal, field: &'static str) -> Result<Decimal, MeasurementError> {
    a.checked_div(b).ok_or(MeasurementError::OutOfRange { field })
}

fn check_non_negative_decimal(
    value: Option<Decimal>,
    field: &'static str,
) -> Result<(), MeasurementError> {
    match value {
        Some(v) if v < Decimal::ZERO => Err(MeasurementError::NegativeValue { field }),
        _ => Ok(()),
    }
}

fn check_non_negative_count(value: Option<i64>, field: &'static str) -> Result<(), MeasurementError> {
    match value {
        Some(v) if v < 0 => Err(MeasurementError::NegativeValue { field }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sample(weight: &str, count: i64) -> MeasurementInput {
        MeasurementInput {
            sample_weight_grams: Some(dec(weight)),
            sample_count: Some(count),
            ..Default::default()
        }
    }

    #[test]
    fn test_ten_grams_one_hundred_fifty_animals() {
        let result = calculate(&sample("10", 150)).unwrap();
        assert_eq!(result.animals_per_kg, 15_000);
        assert_eq!(result.average_weight_mg, dec("66.6667"));
        assert_eq!(result.total_population, 150);
        assert_eq!(result.total_weight_kg, Some(dec("0.0")));
    }

    #[test]
    fn test_zero_or_missing_sample_is_insufficient() {
        assert_eq!(
            calculate(&sample("0", 150)),
            Err(MeasurementError::InsufficientData)
        );
        assert_eq!(
            calculate(&sample("10", 0)),
            Err(MeasurementError::InsufficientData)
        );
        assert_eq!(
            calculate(&MeasurementInput::default()),
            Err(MeasurementError::InsufficientData)
        );
    }

    #[test]
    fn test_negative_values_rejected() {
        let mut input = sample("10", 150);
        input.dead_count = Some(-1);
        assert_eq!(
            calculate(&input),
            Err(MeasurementError::NegativeValue { field: "deadCount" })
        );
    }

    #[test]
    fn test_sample_percentage_out_of_range() {
        let mut input = sample("10", 150);
        input.sample_percentage = Some(Decimal::ZERO);
        assert_eq!(calculate(&input), Err(MeasurementError::InvalidSamplePercentage));
        input.sample_percentage = Some(dec("100.5"));
        assert_eq!(calculate(&input), Err(MeasurementError::InvalidSamplePercentage));
    }

    #[test]
    fn test_dead_count_extrapolated_from_ten_percent_sample() {
        let mut input = sample("10", 150);
        input.sample_percentage = Some(dec("10"));
        input.dead_count = Some(50);

        let result = calculate(&input).unwrap();
        assert_eq!(result.sample_population, 1_500);
        assert_eq!(result.total_dead_count, Some(500));
        // 500 / (1500 + 500) = 25%
        assert_eq!(result.mortality_rate, Some(dec("25.0")));
    }

    #[test]
    fn test_dead_count_used_directly_at_full_sampling() {
        let mut input = sample("10", 150);
        input.dead_count = Some(50);
        let result = calculate(&input).unwrap();
        assert_eq!(result.total_dead_count, Some(50));
        assert_eq!(result.mortality_rate, Some(dec("25.0")));
    }

    #[test]
    fn test_measured_weight_takes_precedence_by_default() {
        let mut input = sample("10", 150);
        input.sample_percentage = Some(dec("10"));
        input.total_weight_kg = Some(dec("2"));

        let result = calculate(&input).unwrap();
        assert_eq!(result.weight_population, Some(30_000));
        assert_eq!(result.sample_population, 1_500);
        assert_eq!(result.total_population, 30_000);
        assert_eq!(result.population_discrepancy, Some(28_500));
        assert_eq!(result.total_weight_kg, Some(dec("2")));
    }

    #[test]
    fn test_sample_extrapolation_basis_ignores_measured_weight_for_population() {
        let mut input = sample("10", 150);
        input.sample_percentage = Some(dec("10"));
        input.total_weight_kg = Some(dec("2"));
        input.population_basis = PopulationBasis::SampleExtrapolation;

        let result = calculate(&input).unwrap();
        assert_eq!(result.total_population, 1_500);
        assert_eq!(result.weight_population, Some(30_000));
    }

    #[test]
    fn test_total_weight_derived_when_not_measured() {
        let mut input = sample("20", 100);
        input.sample_percentage = Some(dec("1"));
        let result = calculate(&input).unwrap();
        // 5000 animals/kg, population 10000 -> 2.0 kg
        assert_eq!(result.animals_per_kg, 5_000);
        assert_eq!(result.total_population, 10_000);
        assert_eq!(result.total_weight_kg, Some(dec("2.0")));
        assert_eq!(result.total_weight_grams(), Some(dec("2000.0")));
    }

    #[test]
    fn test_heavy_animals_below_resolution() {
        assert_eq!(
            calculate(&sample("5000", 1)),
            Err(MeasurementError::InsufficientData)
        );
    }

    #[test]
    fn test_form_apply_sanitises_and_recomputes() {
        let mut form = MeasurementForm::default();
        assert!(form.outcome().is_err());

        form.apply(MeasurementField::SampleWeightGrams, "10g").ok();
        let result = form.apply(MeasurementField::SampleCount, "1a50").unwrap();
        assert_eq!(result.animals_per_kg, 15_000);

        form.apply(MeasurementField::SamplePercentage, "10").ok();
        let result = form.apply(MeasurementField::DeadCount, "50").unwrap();
        assert_eq!(result.total_dead_count, Some(500));

        let err = form.apply(MeasurementField::SampleCount, "").unwrap_err();
        assert_eq!(*err, MeasurementError::InsufficientData);
    }

    #[test]
    fn test_field_names() {
        assert_eq!(
            MeasurementField::parse("sampleWeight"),
            Some(MeasurementField::SampleWeightGrams)
        );
        assert_eq!(MeasurementField::parse("unknown"), None);
    }

    proptest! {
        #[test]
        fn prop_animals_per_kg_matches_formula(
            weight_cg in 1i64..=100_000,
            count in 1i64..=100_000
        ) {
            let weight = Decimal::new(weight_cg, 2);
            let input = MeasurementInput {
                sample_weight_grams: Some(weight),
                sample_count: Some(count),
                ..Default::default()
            };
            let expected = round_half_up(Decimal::from(count) * Decimal::ONE_THOUSAND / weight, 0);
            match calculate(&input) {
                Ok(result) => {
                    prop_assert_eq!(Decimal::from(result.animals_per_kg), expected);
                    let approx = Decimal::from(1_000_000) / Decimal::from(result.animals_per_kg);
                    prop_assert!((result.average_weight_mg - approx).abs() <= dec("0.00005"));
                }
                Err(e) => {
                    prop_assert_eq!(e, MeasurementError::InsufficientData);
                    prop_assert_eq!(expected, Decimal::ZERO);
                }
            }
        }

        #[test]
        fn prop_calculation_is_idempotent(
            weight_cg in 1i64..=100_000,
            count in 1i64..=10_000,
            dead in proptest::option::of(0i64..=10_000),
            pct in 1i64..=100
        ) {
            let input = MeasurementInput {
                sample_weight_grams: Some(Decimal::new(weight_cg, 2)),
                sample_count: Some(count),
                dead_count: dead,
                sample_percentage: Some(Decimal::from(pct)),
                ..Default::default()
            };
            prop_assert_eq!(calculate(&input), calculate(&input));
        }

        #[test]
        fn prop_mortality_rate_bounded(
            weight_cg in 1i64..=10_000,
            count in 1i64..=10_000,
            dead in 0i64..=100_000,
            pct in 1i64..=100
        ) {
            let input = MeasurementInput {
                sample_weight_grams: Some(Decimal::new(weight_cg, 2)),
                sample_count: Some(count),
                dead_count: Some(dead),
                sample_percentage: Some(Decimal::from(pct)),
                ..Default::default()
            };
            if let Ok(result) = calculate(&input) {
                let rate = result.mortality_rate.unwrap();
                prop_assert!(rate >= Decimal::ZERO && rate <= Decimal::ONE_HUNDRED);
                let total_dead = result.total_dead_count.unwrap();
                prop_assert!(total_dead <= result.total_population + total_dead);
            }
        }
    }
}
