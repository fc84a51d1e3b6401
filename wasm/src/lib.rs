//! WebAssembly module for the FLUPSY Management Platform
//!
//! Runs the same calculator as the backend inside the browser forms:
//! - Derived measurement figures
//! - Size suggestion
//! - Numeric input sanitising
//! - Lot status classification

use serde::Serialize;
use shared::analytics::{self, AnalyticsThresholds};
use shared::measurement::{
    calculate, DerivedMeasurement, MeasurementError, MeasurementField, MeasurementForm,
    MeasurementInput, PopulationBasis,
};
use shared::sizing::suggest_size;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;

fn to_js(message: String) -> JsValue {
    let value = JsValue::from_str(&message);
    #[cfg(target_arch = "wasm32")]
    web_sys::console::warn_1(&value);
    value
}

/// Calculator outcome as seen by the forms
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Outcome<'a> {
    measurement: Option<&'a DerivedMeasurement>,
    error: Option<&'a MeasurementError>,
    message: Option<String>,
    message_it: Option<String>,
}

impl<'a> Outcome<'a> {
    fn from_result(result: Result<&'a DerivedMeasurement, &'a MeasurementError>) -> Self {
        match result {
            Ok(measurement) => Self {
                measurement: Some(measurement),
                error: None,
                message: None,
                message_it: None,
            },
            Err(error) => Self {
                measurement: None,
                error: Some(error),
                message: Some(error.to_string()),
                message_it: Some(error.message_it()),
            },
        }
    }
}

fn measurement_json(input_json: &str) -> Result<String, String> {
    let input: MeasurementInput = serde_json::from_str(input_json)
        .map_err(|e| format!("Invalid measurement JSON: {}", e))?;
    let result = calculate(&input);
    serde_json::to_string(&Outcome::from_result(result.as_ref()))
        .map_err(|e| format!("Serialization error: {}", e))
}

fn size_id_for(animals_per_kg: i64, sizes_json: &str) -> Result<Option<String>, String> {
    let sizes: Vec<Size> =
        serde_json::from_str(sizes_json).map_err(|e| format!("Invalid sizes JSON: {}", e))?;
    Ok(suggest_size(animals_per_kg, &sizes).map(|s| s.size_id.to_string()))
}

/// Derive measurement figures from a JSON `MeasurementInput`.
///
/// Returns `{ measurement, error, message, messageIt }` as JSON.
#[wasm_bindgen]
pub fn calculate_measurement(input_json: &str) -> Result<String, JsValue> {
    measurement_json(input_json).map_err(to_js)
}

/// Suggested size id for an animals-per-kg value, or `undefined`
#[wasm_bindgen]
pub fn suggest_size_id(animals_per_kg: i64, sizes_json: &str) -> Result<Option<String>, JsValue> {
    size_id_for(animals_per_kg, sizes_json).map_err(to_js)
}

/// Strip anything that is not part of a decimal number; `,` becomes `.`
#[wasm_bindgen]
pub fn sanitize_numeric_input(raw: &str) -> String {
    shared::validation::sanitize_numeric_input(raw)
}

/// `active`, `sold` or `completed` with the default thresholds
#[wasm_bindgen]
pub fn classify_lot_status(initial_count: i64, current_count: i64, sold_count: i64) -> String {
    analytics::classify_lot_status(
        initial_count,
        current_count,
        sold_count,
        &AnalyticsThresholds::default(),
    )
    .as_str()
    .to_string()
}

/// Stateful measurement form: each field change recomputes everything once
#[wasm_bindgen]
pub struct MeasurementFormState {
    form: MeasurementForm,
}

#[wasm_bindgen]
impl MeasurementFormState {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            form: MeasurementForm::default(),
        }
    }

    /// Apply raw text to a field (`sampleWeightGrams`, `sampleCount`,
    /// `totalWeightKg`, `deadCount`, `samplePercentage`)
    pub fn apply(&mut self, field: &str, raw: &str) -> Result<String, JsValue> {
        self.apply_field(field, raw).map_err(to_js)
    }

    /// `prefer_measured_weight` or `sample_extrapolation`
    pub fn set_population_basis(&mut self, basis: &str) -> Result<String, JsValue> {
        self.apply_basis(basis).map_err(to_js)
    }

    pub fn snapshot(&self) -> Result<String, JsValue> {
        self.snapshot_json().map_err(to_js)
    }
}

impl Default for MeasurementFormState {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementFormState {
    fn apply_field(&mut self, field: &str, raw: &str) -> Result<String, String> {
        let field =
            MeasurementField::parse(field).ok_or_else(|| format!("Unknown field '{}'", field))?;
        self.form.apply(field, raw).ok();
        self.snapshot_json()
    }

    fn apply_basis(&mut self, basis: &str) -> Result<String, String> {
        let basis: PopulationBasis =
            serde_json::from_value(serde_json::Value::String(basis.to_string()))
                .map_err(|_| format!("Unknown population basis '{}'", basis))?;
        self.form.set_population_basis(basis).ok();
        self.snapshot_json()
    }

    fn snapshot_json(&self) -> Result<String, String> {
        serde_json::to_string(&Outcome::from_result(self.form.outcome()))
            .map_err(|e| format!("Serialization error: {}", e))
    }
}
