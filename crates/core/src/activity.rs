//! Activities and the profile records used for leaderboard display.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};
use crate::units::{canonical_activity_type, canonical_unit};

/// Maximum length of an activity type or unit label.
pub const MAX_LABEL_LEN: usize = 64;

/// A durably recorded activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: DbId,
    pub user_id: DbId,
    pub activity_type: String,
    pub value: f64,
    pub unit: String,
    pub recorded_at: Timestamp,
}

/// A validated, canonicalised activity that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub user_id: DbId,
    pub activity_type: String,
    pub value: f64,
    pub unit: String,
    pub recorded_at: Timestamp,
}

impl NewActivity {
    /// Validate raw input and canonicalise type and unit.
    pub fn new(
        user_id: DbId,
        activity_type: &str,
        value: f64,
        unit: &str,
        recorded_at: Timestamp,
    ) -> Result<Self, CoreError> {
        let activity_type = canonical_activity_type(activity_type);
        let unit = canonical_unit(unit);
        validate_label("activity_type", &activity_type)?;
        validate_label("unit", &unit)?;
        if !value.is_finite() || value < 0.0 {
            return Err(CoreError::Validation(format!(
                "value must be a finite, non-negative number, got {value}"
            )));
        }
        Ok(Self {
            user_id,
            activity_type,
            value,
            unit,
            recorded_at,
        })
    }

    /// Attach the id assigned by the store.
    pub fn into_activity(self, id: DbId) -> Activity {
        Activity {
            id,
            user_id: self.user_id,
            activity_type: self.activity_type,
            value: self.value,
            unit: self.unit,
            recorded_at: self.recorded_at,
        }
    }
}

fn validate_label(field: &str, label: &str) -> Result<(), CoreError> {
    if label.is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(CoreError::Validation(format!(
            "{field} must be at most {MAX_LABEL_LEN} characters"
        )));
    }
    Ok(())
}

/// Display metadata for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: DbId,
    pub name: String,
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    #[test]
    fn new_activity_canonicalises_labels() {
        let a = NewActivity::new(1, " Run", 5.0, "KM", Utc::now()).unwrap();
        assert_eq!(a.activity_type, "run");
        assert_eq!(a.unit, "kilometers");
    }

    #[test]
    fn rejects_negative_value() {
        let err = NewActivity::new(1, "run", -1.0, "km", Utc::now()).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn rejects_nan_value() {
        assert!(NewActivity::new(1, "run", f64::NAN, "km", Utc::now()).is_err());
    }

    #[test]
    fn rejects_empty_type() {
        assert!(NewActivity::new(1, "  ", 1.0, "km", Utc::now()).is_err());
    }

    #[test]
    fn into_activity_keeps_fields() {
        let now = Utc::now();
        let a = NewActivity::new(4, "swim", 800.0, "m", now)
            .unwrap()
            .into_activity(11);
        assert_eq!(a.id, 11);
        assert_eq!(a.user_id, 4);
        assert_eq!(a.unit, "meters");
        assert_eq!(a.recorded_at, now);
    }
}
