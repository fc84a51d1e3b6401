//! Size suggestion from an animals-per-kg measurement

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Size;

/// Tolerance (percent) around a size code's embedded number
pub const CODE_TOLERANCE_PERCENT: i64 = 15;

/// How a suggested size was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// `animals_per_kg` falls inside `[min, max]`
    Range,
    /// Within the tolerance of the number embedded in the size code
    CodeTolerance,
    /// Nearest available size, outside any range or tolerance
    Closest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeSuggestion {
    pub size_id: Uuid,
    pub code: String,
    pub match_kind: MatchKind,
}

impl SizeSuggestion {
    fn from_size(size: &Size, match_kind: MatchKind) -> Self {
        Self {
            size_id: size.id,
            code: size.code.clone(),
            match_kind,
        }
    }
}

/// Suggest the size for a measured animals-per-kg value.
///
/// Range matches win; otherwise the size whose code number is nearest is
/// used, and if no code carries a number the nearest finite range boundary
/// decides. Returns `None` for non-positive input or an empty size table.
pub fn suggest_size(animals_per_kg: i64, sizes: &[Size]) -> Option<SizeSuggestion> {
    if animals_per_kg <= 0 || sizes.is_empty() {
        return None;
    }

    if let Some(size) = sizes.iter().find(|s| s.contains(animals_per_kg)) {
        return Some(SizeSuggestion::from_size(size, MatchKind::Range));
    }

    let nearest_by_code = sizes
        .iter()
        .filter_map(|s| code_number(&s.code).map(|n| (s, n)))
        .min_by_key(|(_, n)| (animals_per_kg - n).abs());

    if let Some((size, n)) = nearest_by_code {
        let distance = (animals_per_kg - n).abs();
        if distance.saturating_mul(100) <= CODE_TOLERANCE_PERCENT.saturating_mul(n) {
            return Some(SizeSuggestion::from_size(size, MatchKind::CodeTolerance));
        }
        tracing::warn!(
            animals_per_kg,
            size = %size.code,
            "No size within tolerance, using closest size code"
        );
        return Some(SizeSuggestion::from_size(size, MatchKind::Closest));
    }

    let nearest_by_boundary = sizes
        .iter()
        .filter_map(|s| boundary_distance(s, animals_per_kg).map(|d| (s, d)))
        .min_by_key(|(_, d)| *d)?;

    tracing::warn!(
        animals_per_kg,
        size = %nearest_by_boundary.0.code,
        "Measurement falls between size ranges, using nearest boundary"
    );
    Some(SizeSuggestion::from_size(
        nearest_by_boundary.0,
        MatchKind::Closest,
    ))
}

/// Number embedded in a size code, e.g. `TP-600` -> 600
pub fn code_number(code: &str) -> Option<i64> {
    let digits: String = code
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<i64>().ok().filter(|n| *n > 0)
}

fn boundary_distance(size: &Size, animals_per_kg: i64) -> Option<i64> {
    [size.min_animals_per_kg, size.max_animals_per_kg]
        .into_iter()
        .flatten()
        .map(|bound| (animals_per_kg - bound).abs())
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(code: &str, min: Option<i64>, max: Option<i64>) -> Size {
        Size {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: code.to_string(),
            size_mm: None,
            min_animals_per_kg: min,
            max_animals_per_kg: max,
            notes: None,
        }
    }

    fn table() -> Vec<Size> {
        vec![
            size("TP-500", Some(400_001), Some(600_000)),
            size("TP-1000", Some(600_001), Some(1_200_000)),
            size("TP-3000", Some(2_500_001), Some(3_500_000)),
        ]
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let sizes = table();
        let low = suggest_size(600_001, &sizes).unwrap();
        assert_eq!(low.code, "TP-1000");
        assert_eq!(low.match_kind, MatchKind::Range);

        let high = suggest_size(1_200_000, &sizes).unwrap();
        assert_eq!(high.code, "TP-1000");
        assert_eq!(high.match_kind, MatchKind::Range);
    }

    #[test]
    fn test_first_matching_range_wins() {
        let sizes = vec![
            size("TP-A", Some(100), Some(200)),
            size("TP-B", Some(150), Some(250)),
        ];
        assert_eq!(suggest_size(175, &sizes).unwrap().code, "TP-A");
    }

    #[test]
    fn test_code_tolerance_fallback() {
        let sizes = vec![size("TP-600", None, None), size("TP-1000", None, None)];
        let s = suggest_size(680, &sizes).unwrap();
        assert_eq!(s.code, "TP-600");
        assert_eq!(s.match_kind, MatchKind::CodeTolerance);

        // exactly 15% away is still within tolerance
        let s = suggest_size(690, &sizes).unwrap();
        assert_eq!(s.match_kind, MatchKind::CodeTolerance);
    }

    #[test]
    fn test_closest_when_outside_tolerance() {
        let sizes = vec![size("TP-600", None, None), size("TP-1000", None, None)];
        let s = suggest_size(2_000, &sizes).unwrap();
        assert_eq!(s.code, "TP-1000");
        assert_eq!(s.match_kind, MatchKind::Closest);
    }

    #[test]
    fn test_gap_between_ranges_uses_code_numbers() {
        let s = suggest_size(2_000_000, &table()).unwrap();
        assert_eq!(s.code, "TP-3000");
        assert_eq!(s.match_kind, MatchKind::Closest);
    }

    #[test]
    fn test_boundary_fallback_without_code_numbers() {
        let sizes = vec![
            size("SMALL", Some(1_000), Some(2_000)),
            size("LARGE", Some(5_000), Some(8_000)),
        ];
        let s = suggest_size(4_000, &sizes).unwrap();
        assert_eq!(s.code, "LARGE");
        assert_eq!(s.match_kind, MatchKind::Closest);
    }

    #[test]
    fn test_no_suggestion_for_invalid_input() {
        assert_eq!(suggest_size(0, &table()), None);
        assert_eq!(suggest_size(-5, &table()), None);
        assert_eq!(suggest_size(1_000, &[]), None);
        assert_eq!(suggest_size(1_000, &[size("NONE", None, None)]), None);
    }

    #[test]
    fn test_code_number() {
        assert_eq!(code_number("TP-600"), Some(600));
        assert_eq!(code_number("TP-10000"), Some(10_000));
        assert_eq!(code_number("T1 extra 22"), Some(1));
        assert_eq!(code_number("NONE"), None);
        assert_eq!(code_number("TP-0"), None);
    }
}
