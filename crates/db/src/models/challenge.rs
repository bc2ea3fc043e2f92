//! Challenge and participation models.

use sqlx::FromRow;
use stride_core::challenge::{Challenge, ChallengeParticipation, ChallengeStatus};
use stride_core::error::CoreError;
use stride_core::types::{DbId, Timestamp};

/// A row from the `challenges` table.
#[derive(Debug, Clone, FromRow)]
pub struct ChallengeRow {
    pub id: DbId,
    pub name: String,
    pub activity_type: String,
    pub unit: String,
    pub target_value: f64,
    pub status: String,
    pub start_date: Timestamp,
    pub end_date: Option<Timestamp>,
}

impl TryFrom<ChallengeRow> for Challenge {
    type Error = CoreError;

    fn try_from(row: ChallengeRow) -> Result<Self, Self::Error> {
        Ok(Challenge {
            id: row.id,
            name: row.name,
            activity_type: row.activity_type,
            unit: row.unit,
            target_value: row.target_value,
            status: ChallengeStatus::parse(&row.status)?,
            start_date: row.start_date,
            end_date: row.end_date,
        })
    }
}

/// A row from the `challenge_participations` table.
#[derive(Debug, Clone, FromRow)]
pub struct ParticipationRow {
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

impl From<ParticipationRow> for ChallengeParticipation {
    fn from(row: ParticipationRow) -> Self {
        ChallengeParticipation {
            id: row.id,
            challenge_id: row.challenge_id,
            user_id: row.user_id,
            current_value: row.current_value,
            progress_percentage: row.progress_percentage,
            completed: row.completed,
            completed_at: row.completed_at,
            joined_at: row.joined_at,
            last_activity_date: row.last_activity_date,
        }
    }
}

/// A challenge row joined with one of its participations.
#[derive(Debug, Clone, FromRow)]
pub struct ChallengeWithParticipationRow {
    #[sqlx(flatten)]
    pub challenge: ChallengeRow,
    pub participation_id: DbId,
    pub user_id: DbId,
    pub current_value: f64,
    pub progress_percentage: f64,
    pub completed: bool,
    pub completed_at: Option<Timestamp>,
    pub joined_at: Timestamp,
    pub last_activity_date: Option<Timestamp>,
}

impl ChallengeWithParticipationRow {
    /// Split into the domain challenge and participation.
    pub fn into_domain(self) -> Result<(Challenge, ChallengeParticipation), CoreError> {
        let participation = ChallengeParticipation {
            id: self.participation_id,
            challenge_id: self.challenge.id,
            user_id: self.user_id,
            current_value: self.current_value,
            progress_percentage: self.progress_percentage,
            completed: self.completed,
            completed_at: self.completed_at,
            joined_at: self.joined_at,
            last_activity_date: self.last_activity_date,
        };
        Ok((Challenge::try_from(self.challenge)?, participation))
    }
}
