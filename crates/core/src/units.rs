//! Activity unit canonicalisation and same-dimension conversion.
//!
//! Units arrive from clients and importers in many spellings (`km`, `KM`,
//! `kilometres`). Every lookup in the conversion table and every challenge
//! eligibility check works on the canonical spelling returned by
//! [`canonical_unit`].

// ---------------------------------------------------------------------------
// Canonical unit names
// ---------------------------------------------------------------------------

pub const UNIT_KILOMETERS: &str = "kilometers";
pub const UNIT_MILES: &str = "miles";
pub const UNIT_METERS: &str = "meters";
pub const UNIT_YARDS: &str = "yards";
pub const UNIT_MINUTES: &str = "minutes";
pub const UNIT_HOURS: &str = "hours";
pub const UNIT_SECONDS: &str = "seconds";
pub const UNIT_STEPS: &str = "steps";
pub const UNIT_REPS: &str = "reps";
pub const UNIT_CALORIES: &str = "calories";

/// Alias table: `(alias, canonical)`. Matching is case-insensitive.
const UNIT_ALIASES: &[(&str, &str)] = &[
    ("km", UNIT_KILOMETERS),
    ("kms", UNIT_KILOMETERS),
    ("kilometer", UNIT_KILOMETERS),
    ("kilometre", UNIT_KILOMETERS),
    ("kilometres", UNIT_KILOMETERS),
    ("mi", UNIT_MILES),
    ("mile", UNIT_MILES),
    ("m", UNIT_METERS),
    ("meter", UNIT_METERS),
    ("metre", UNIT_METERS),
    ("metres", UNIT_METERS),
    ("yd", UNIT_YARDS),
    ("yds", UNIT_YARDS),
    ("yard", UNIT_YARDS),
    ("min", UNIT_MINUTES),
    ("mins", UNIT_MINUTES),
    ("minute", UNIT_MINUTES),
    ("h", UNIT_HOURS),
    ("hr", UNIT_HOURS),
    ("hrs", UNIT_HOURS),
    ("hour", UNIT_HOURS),
    ("s", UNIT_SECONDS),
    ("sec", UNIT_SECONDS),
    ("secs", UNIT_SECONDS),
    ("second", UNIT_SECONDS),
    ("step", UNIT_STEPS),
    ("rep", UNIT_REPS),
    ("repetitions", UNIT_REPS),
    ("kcal", UNIT_CALORIES),
    ("cal", UNIT_CALORIES),
    ("calorie", UNIT_CALORIES),
];

/// Return the canonical spelling of a unit.
///
/// Unknown units are trimmed and lower-cased but otherwise passed through,
/// so a custom unit still compares equal to itself regardless of case.
pub fn canonical_unit(unit: &str) -> String {
    let lowered = unit.trim().to_lowercase();
    UNIT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(lowered)
}

/// Canonical spelling of an activity type (`"Run "` -> `"run"`).
pub fn canonical_activity_type(activity_type: &str) -> String {
    activity_type.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// Physical dimension of a canonical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitDimension {
    Distance,
    Duration,
}

/// Scale factor of a canonical unit relative to its dimension's base unit
/// (meters for distance, seconds for duration).
fn base_factor(canonical: &str) -> Option<(UnitDimension, f64)> {
    match canonical {
        UNIT_KILOMETERS => Some((UnitDimension::Distance, 1000.0)),
        UNIT_MILES => Some((UnitDimension::Distance, 1609.344)),
        UNIT_METERS => Some((UnitDimension::Distance, 1.0)),
        UNIT_YARDS => Some((UnitDimension::Distance, 0.9144)),
        UNIT_HOURS => Some((UnitDimension::Duration, 3600.0)),
        UNIT_MINUTES => Some((UnitDimension::Duration, 60.0)),
        UNIT_SECONDS => Some((UnitDimension::Duration, 1.0)),
        _ => None,
    }
}

/// Convert `value` from one unit to another.
///
/// Identical canonical units always convert (factor 1), including units
/// with no known dimension. Units of different dimensions, or unknown
/// distinct units, return `None`.
pub fn convert(value: f64, from: &str, to: &str) -> Option<f64> {
    let from = canonical_unit(from);
    let to = canonical_unit(to);
    if from == to {
        return Some(value);
    }
    let (from_dim, from_factor) = base_factor(&from)?;
    let (to_dim, to_factor) = base_factor(&to)?;
    if from_dim != to_dim {
        return None;
    }
    Some(value * from_factor / to_factor)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_map_to_canonical() {
        assert_eq!(canonical_unit("km"), UNIT_KILOMETERS);
        assert_eq!(canonical_unit(" KM "), UNIT_KILOMETERS);
        assert_eq!(canonical_unit("Kilometres"), UNIT_KILOMETERS);
        assert_eq!(canonical_unit("hr"), UNIT_HOURS);
    }

    #[test]
    fn unknown_unit_is_lowercased_passthrough() {
        assert_eq!(canonical_unit("Laps"), "laps");
    }

    #[test]
    fn activity_type_is_trimmed_and_lowercased() {
        assert_eq!(canonical_activity_type(" Run"), "run");
    }

    #[test]
    fn convert_same_unit_is_identity() {
        assert_eq!(convert(3.5, "laps", "LAPS"), Some(3.5));
    }

    #[test]
    fn convert_miles_to_kilometers() {
        let km = convert(1.0, "mi", "km").unwrap();
        assert!((km - 1.609344).abs() < 1e-9);
    }

    #[test]
    fn convert_minutes_to_hours() {
        assert_eq!(convert(90.0, "min", "hours"), Some(1.5));
    }

    #[test]
    fn convert_across_dimensions_is_none() {
        assert_eq!(convert(1.0, "km", "minutes"), None);
        assert_eq!(convert(1.0, "steps", "km"), None);
    }

    #[test]
    fn convert_yards_to_meters() {
        let meters = convert(100.0, "yd", "m").unwrap();
        assert!((meters - 91.44).abs() < 1e-9);
    }
}
