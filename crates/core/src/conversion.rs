//! Point conversion table.
//!
//! A [`RateTable`] maps `(activity_type, unit)` to a scalar multiplier for
//! one scope: the scope's own overrides plus the global defaults. Lookup
//! always tries the override first. An activity whose pair resolves in
//! neither set contributes zero points; it is never an error.

use serde::{Deserialize, Serialize};

use crate::types::DbId;
use crate::units::{canonical_activity_type, canonical_unit};

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// The scope a set of conversion rates applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RateScope {
    Global,
    Club(DbId),
    Challenge(DbId),
}

impl RateScope {
    /// Stored `scope_kind` column value.
    pub fn kind_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Club(_) => "club",
            Self::Challenge(_) => "challenge",
        }
    }

    /// Stored `scope_id` column value (`NULL` for global rates).
    pub fn scope_id(self) -> Option<DbId> {
        match self {
            Self::Global => None,
            Self::Club(id) | Self::Challenge(id) => Some(id),
        }
    }
}

// ---------------------------------------------------------------------------
// Rates
// ---------------------------------------------------------------------------

/// One conversion rate: `points = value * rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRate {
    pub activity_type: String,
    pub unit: String,
    pub rate: f64,
}

impl ConversionRate {
    /// Build a rate with canonicalised type and unit.
    pub fn new(activity_type: &str, unit: &str, rate: f64) -> Self {
        Self {
            activity_type: canonical_activity_type(activity_type),
            unit: canonical_unit(unit),
            rate,
        }
    }

    fn matches(&self, activity_type: &str, unit: &str) -> bool {
        self.activity_type == activity_type && self.unit == unit
    }
}

/// Rates resolvable within one scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    overrides: Vec<ConversionRate>,
    defaults: Vec<ConversionRate>,
}

impl RateTable {
    /// Build a table from scope overrides and global defaults.
    ///
    /// Entries are canonicalised on the way in. When the same pair appears
    /// twice in one list the first entry wins.
    pub fn new(overrides: Vec<ConversionRate>, defaults: Vec<ConversionRate>) -> Self {
        Self {
            overrides: canonicalise(overrides),
            defaults: canonicalise(defaults),
        }
    }

    /// Resolve the rate for `(activity_type, unit)`: override, then default.
    pub fn resolve(&self, activity_type: &str, unit: &str) -> Option<&ConversionRate> {
        let activity_type = canonical_activity_type(activity_type);
        let unit = canonical_unit(unit);
        self.overrides
            .iter()
            .find(|r| r.matches(&activity_type, &unit))
            .or_else(|| self.defaults.iter().find(|r| r.matches(&activity_type, &unit)))
    }

    /// Point contribution of one activity. Zero when no rate resolves.
    pub fn points_for(&self, activity_type: &str, value: f64, unit: &str) -> f64 {
        self.resolve(activity_type, unit)
            .map(|r| value * r.rate)
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty() && self.defaults.is_empty()
    }
}

fn canonicalise(rates: Vec<ConversionRate>) -> Vec<ConversionRate> {
    let mut out: Vec<ConversionRate> = Vec::with_capacity(rates.len());
    for r in rates {
        let r = ConversionRate::new(&r.activity_type, &r.unit, r.rate);
        if !out.iter().any(|e| e.matches(&r.activity_type, &r.unit)) {
            out.push(r);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
