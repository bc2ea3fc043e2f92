//! Challenge eligibility gate and progress/completion state machine.
//!
//! Challenge progress accumulates the raw activity value in the
//! challenge's declared unit (not points) and is compared against a
//! literal target. Completion is terminal: once a participation is
//! completed it stays completed, and `completed_at` is stamped only on
//! the transition.

use serde::{Deserialize, Serialize};

use crate::activity::Activity;
use crate::error::CoreError;
use crate::leaderboard::OVERALL_ACTIVITY_TYPE;
use crate::types::{DbId, Timestamp};
use crate::units::{self, canonical_activity_type, canonical_unit};

// ---------------------------------------------------------------------------
// Challenge
// ---------------------------------------------------------------------------

/// Lifecycle status of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Draft,
    Active,
    Completed,
    Cancelled,
}

impl ChallengeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse a stored status value (case-insensitive).
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value.trim().to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CoreError::Validation(format!(
                "Unknown challenge status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: DbId,
    pub name: String,
    /// Canonical activity type, or `"overall"` for any type.
    pub activity_type: String,
    /// Canonical unit the target is expressed in.
    pub unit: String,
    pub target_value: f64,
    pub status: ChallengeStatus,
    pub start_date: Timestamp,
    /// Open-ended when `None`.
    pub end_date: Option<Timestamp>,
}

/// One user's participation in a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeParticipation {
    pub id: DbId,
    pub challenge_id: DbId,
    pub user_id: DbId,
    pub current_value: f64,
    pub progress_percentage: f64,
    pub completed: bool,
    pub completed_at: Option<Timestamp>,
    pub joined_at: Timestamp,
    pub last_activity_date: Option<Timestamp>,
}

/// State of a participation in the `NotStarted -> Active -> Completed`
/// machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationState {
    NotStarted,
    Active,
    Completed,
}

impl ChallengeParticipation {
    pub fn state(&self) -> ParticipationState {
        if self.completed {
            ParticipationState::Completed
        } else if self.current_value == 0.0 && self.last_activity_date.is_none() {
            ParticipationState::NotStarted
        } else {
            ParticipationState::Active
        }
    }
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// How an activity's unit is matched against the challenge unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitPolicy {
    /// Canonical units must be equal; mismatches are skipped.
    #[default]
    Exact,
    /// Units of the same dimension are converted into the challenge unit.
    Convert,
}

impl UnitPolicy {
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value.trim().to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "convert" => Ok(Self::Convert),
            other => Err(CoreError::Validation(format!(
                "Unknown unit policy '{other}'. Must be one of: exact, convert"
            ))),
        }
    }
}

/// Why a challenge was skipped for an activity. Not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ineligible {
    NotActive,
    NotStarted,
    Ended,
    ActivityTypeMismatch,
    UnitMismatch,
}

/// Apply the admission filter and return the progress delta expressed in
/// the challenge unit.
///
/// Filters, in order: status is active; `now` lies within
/// `[start_date, end_date]`; challenge type is `overall` or equals the
/// activity type; units match under `policy`.
pub fn check_eligibility(
    challenge: &Challenge,
    activity: &Activity,
    now: Timestamp,
    policy: UnitPolicy,
) -> Result<f64, Ineligible> {
    if challenge.status != ChallengeStatus::Active {
        return Err(Ineligible::NotActive);
    }
    if now < challenge.start_date {
        return Err(Ineligible::NotStarted);
    }
    if challenge.end_date.is_some_and(|end| now > end) {
        return Err(Ineligible::Ended);
    }

    let challenge_type = canonical_activity_type(&challenge.activity_type);
    if challenge_type != OVERALL_ACTIVITY_TYPE
        && challenge_type != canonical_activity_type(&activity.activity_type)
    {
        return Err(Ineligible::ActivityTypeMismatch);
    }

    let challenge_unit = canonical_unit(&challenge.unit);
    let activity_unit = canonical_unit(&activity.unit);
    if challenge_unit == activity_unit {
        return Ok(activity.value);
    }
    match policy {
        UnitPolicy::Exact => Err(Ineligible::UnitMismatch),
        UnitPolicy::Convert => units::convert(activity.value, &activity_unit, &challenge_unit)
            .ok_or(Ineligible::UnitMismatch),
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// `clamp(current / target * 100, 0, 100)`; zero for a non-positive target.
pub fn progress_percentage(current_value: f64, target_value: f64) -> f64 {
    if target_value <= 0.0 {
        return 0.0;
    }
    (current_value / target_value * 100.0).clamp(0.0, 100.0)
}

/// Result of applying one delta to a participation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressChange {
    pub participation: ChallengeParticipation,
    /// True only for the update that crossed the target.
    pub newly_completed: bool,
}

/// Outcome of persisting one activity's progress against a participation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressApplication {
    /// The delta was applied; carries the updated row.
    Applied(ProgressChange),
    /// This activity was already applied to the participation; the row is
    /// returned unchanged.
    AlreadyApplied(ChallengeParticipation),
}

impl ProgressApplication {
    pub fn participation(&self) -> &ChallengeParticipation {
        match self {
            Self::Applied(change) => &change.participation,
            Self::AlreadyApplied(p) => p,
        }
    }
}

/// Apply `delta` (in the challenge unit) to a participation.
///
/// Negative deltas (corrected activities) lower `current_value` but never
/// revert completion.
pub fn apply_progress(
    participation: &ChallengeParticipation,
    delta: f64,
    target_value: f64,
    now: Timestamp,
) -> ProgressChange {
    let mut next = participation.clone();
    next.current_value += delta;
    next.progress_percentage = progress_percentage(next.current_value, target_value);
    next.last_activity_date = Some(now);

    let reached = target_value > 0.0 && next.current_value >= target_value;
    let newly_completed = !participation.completed && reached;
    if newly_completed {
        next.completed = true;
        next.completed_at = Some(now);
    }

    ProgressChange {
        participation: next,
        newly_completed,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
