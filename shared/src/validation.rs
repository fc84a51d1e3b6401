//! Input sanitising and validation for the FLUPSY Management Platform

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::measurement::round_half_up;
use crate::models::Size;

// ============================================================================
// Numeric form input
// ============================================================================

/// Strip everything but digits and a single decimal point.
///
/// A comma is accepted as decimal separator; characters after a second
/// separator are kept only if they are digits.
pub fn sanitize_numeric_input(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut seen_point = false;
    for c in raw.trim().chars() {
        match c {
            '0'..='9' => out.push(c),
            '.' | ',' if !seen_point => {
                seen_point = true;
                out.push('.');
            }
            _ => {}
        }
    }
    out
}

/// Parse free text as a non-negative decimal, `None` when nothing numeric remains
pub fn parse_decimal_input(raw: &str) -> Option<Decimal> {
    let cleaned = sanitize_numeric_input(raw);
    if cleaned.is_empty() || cleaned == "." {
        return None;
    }
    let trimmed = cleaned.trim_end_matches('.');
    let normalized = if trimmed.starts_with('.') {
        format!("0{}", trimmed)
    } else {
        trimmed.to_string()
    };
    Decimal::from_str(&normalized).ok()
}

/// Parse free text as a whole count (rounded half away from zero)
pub fn parse_count_input(raw: &str) -> Option<i64> {
    parse_decimal_input(raw).and_then(|d| round_half_up(d, 0).to_i64())
}

// ============================================================================
// Domain validations
// ============================================================================

/// Sample percentage must lie in (0, 100]
pub fn validate_sample_percentage(percentage: Decimal) -> Result<(), &'static str> {
    if percentage <= Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
        return Err("Sample percentage must be greater than 0 and at most 100");
    }
    Ok(())
}

/// Size range bounds must be positive with min <= max
pub fn validate_size_range(min: Option<i64>, max: Option<i64>) -> Result<(), &'static str> {
    if min.is_some_and(|v| v < 0) || max.is_some_and(|v| v < 0) {
        return Err("Animals per kg bounds cannot be negative");
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err("Minimum animals per kg cannot exceed the maximum");
        }
    }
    Ok(())
}

/// Ranges of two sizes must not overlap
pub fn sizes_overlap(a: &Size, b: &Size) -> bool {
    match (
        a.min_animals_per_kg,
        a.max_animals_per_kg,
        b.min_animals_per_kg,
        b.max_animals_per_kg,
    ) {
        (Some(a_min), Some(a_max), Some(b_min), Some(b_max)) => a_min <= b_max && b_min <= a_max,
        _ => false,
    }
}

/// Composition percentages must be non-negative and sum to 100 (±0.01)
pub fn validate_composition_percentages(percentages: &[Decimal]) -> Result<(), &'static str> {
    if percentages.is_empty() {
        return Err("Composition requires at least one lot");
    }
    if percentages.iter().any(|p| *p < Decimal::ZERO) {
        return Err("Composition percentages cannot be negative");
    }
    let total: Decimal = percentages.iter().sum();
    if (total - Decimal::ONE_HUNDRED).abs() > Decimal::new(1, 2) {
        return Err("Composition percentages must sum to 100%");
    }
    Ok(())
}

/// Supplier name must be non-blank and reasonably short
pub fn validate_supplier(supplier: &str) -> Result<(), &'static str> {
    let trimmed = supplier.trim();
    if trimmed.is_empty() {
        return Err("Supplier is required");
    }
    if trimmed.chars().count() > 200 {
        return Err("Supplier name is too long");
    }
    Ok(())
}

/// Physical basket numbers start at 1
pub fn validate_physical_number(number: i32) -> Result<(), &'static str> {
    if number < 1 {
        return Err("Basket number must be at least 1");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    // ========================================================================
    // Numeric Input Tests
    // ========================================================================

    #[test]
    fn test_sanitize_strips_non_numeric() {
        assert_eq!(sanitize_numeric_input("12a3"), "123");
        assert_eq!(sanitize_numeric_input(" 10 g "), "10");
        assert_eq!(sanitize_numeric_input("-5"), "5");
        assert_eq!(sanitize_numeric_input("abc"), "");
    }

    #[test]
    fn test_sanitize_accepts_comma_separator() {
        assert_eq!(sanitize_numeric_input("12,5"), "12.5");
        assert_eq!(sanitize_numeric_input("1.2.3"), "1.23");
        assert_eq!(sanitize_numeric_input("1,2,3"), "1.23");
    }

    #[test]
    fn test_parse_decimal_input() {
        assert_eq!(parse_decimal_input("12,5"), Some(Decimal::new(125, 1)));
        assert_eq!(parse_decimal_input(",5"), Some(Decimal::new(5, 1)));
        assert_eq!(parse_decimal_input("7."), Some(Decimal::from(7)));
        assert_eq!(parse_decimal_input(""), None);
        assert_eq!(parse_decimal_input("."), None);
    }

    #[test]
    fn test_parse_count_input() {
        assert_eq!(parse_count_input("1a50"), Some(150));
        assert_eq!(parse_count_input("2,5"), Some(3));
        assert_eq!(parse_count_input("x"), None);
    }

    // ========================================================================
    // Domain Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_sample_percentage() {
        assert!(validate_sample_percentage(Decimal::from(10)).is_ok());
        assert!(validate_sample_percentage(Decimal::ONE_HUNDRED).is_ok());
        assert!(validate_sample_percentage(Decimal::ZERO).is_err());
        assert!(validate_sample_percentage(Decimal::from(101)).is_err());
    }

    #[test]
    fn test_validate_size_range() {
        assert!(validate_size_range(Some(100), Some(200)).is_ok());
        assert!(validate_size_range(Some(200), Some(200)).is_ok());
        assert!(validate_size_range(None, Some(200)).is_ok());
        assert!(validate_size_range(Some(300), Some(200)).is_err());
        assert!(validate_size_range(Some(-1), None).is_err());
    }

    #[test]
    fn test_sizes_overlap() {
        let size = |min, max| Size {
            id: Uuid::new_v4(),
            code: "TP".to_string(),
            name: "TP".to_string(),
            size_mm: None,
            min_animals_per_kg: min,
            max_animals_per_kg: max,
            notes: None,
        };
        assert!(sizes_overlap(&size(Some(1), Some(10)), &size(Some(10), Some(20))));
        assert!(!sizes_overlap(&size(Some(1), Some(10)), &size(Some(11), Some(20))));
        assert!(!sizes_overlap(&size(None, Some(10)), &size(Some(1), Some(20))));
    }

    #[test]
    fn test_validate_composition_percentages() {
        let valid = vec![Decimal::from(60), Decimal::from(40)];
        assert!(validate_composition_percentages(&valid).is_ok());

        let thirds = vec![Decimal::new(3333, 2), Decimal::new(3333, 2), Decimal::new(3334, 2)];
        assert!(validate_composition_percentages(&thirds).is_ok());

        assert!(validate_composition_percentages(&[]).is_err());
        assert!(validate_composition_percentages(&[Decimal::from(60), Decimal::from(50)]).is_err());
        assert!(
            validate_composition_percentages(&[Decimal::from(110), Decimal::from(-10)]).is_err()
        );
    }

    #[test]
    fn test_validate_supplier() {
        assert!(validate_supplier("Ecotapes").is_ok());
        assert!(validate_supplier("   ").is_err());
        assert!(validate_supplier(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_physical_number() {
        assert!(validate_physical_number(1).is_ok());
        assert!(validate_physical_number(0).is_err());
    }
}
