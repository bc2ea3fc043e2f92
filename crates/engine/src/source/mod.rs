//! Boundary to the authoritative relational store.
//!
//! The engine never talks to Postgres directly; it goes through
//! [`SourceStore`], implemented by [`PgSourceStore`] in production and
//! [`MemorySourceStore`] for tests and local runs.

use async_trait::async_trait;
use stride_core::activity::{Activity, NewActivity, Profile};
use stride_core::challenge::{Challenge, ChallengeParticipation, ProgressApplication};
use stride_core::conversion::{RateScope, RateTable};
use stride_core::types::{DbId, Timestamp};

use crate::error::SourceResult;

pub mod memory;
pub mod postgres;

pub use memory::MemorySourceStore;
pub use postgres::PgSourceStore;

/// A challenge's participations as of one read, with the ids of every
/// activity whose progress they already contain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChallengeStandings {
    pub participations: Vec<ChallengeParticipation>,
    pub applied_activity_ids: Vec<DbId>,
}

#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn ping(&self) -> SourceResult<()>;

    /// User ids of every member of a club (empty for an unknown club).
    async fn club_member_ids(&self, club_id: DbId) -> SourceResult<Vec<DbId>>;

    /// Ids of every club a user belongs to.
    async fn club_ids_for_user(&self, user_id: DbId) -> SourceResult<Vec<DbId>>;

    /// Activities authored by `user_ids`, optionally of one canonical type,
    /// ordered by activity id.
    async fn activities_for_users(
        &self,
        user_ids: &[DbId],
        activity_type: Option<&str>,
    ) -> SourceResult<Vec<Activity>>;

    /// Scope overrides plus global defaults.
    async fn rate_table(&self, scope: RateScope) -> SourceResult<RateTable>;

    /// Batch profile lookup; unknown ids are absent from the result.
    async fn profiles(&self, user_ids: &[DbId]) -> SourceResult<Vec<Profile>>;

    async fn challenge(&self, challenge_id: DbId) -> SourceResult<Option<Challenge>>;

    /// Every participation in a challenge and the activities already
    /// applied to them, read consistently.
    async fn challenge_standings(&self, challenge_id: DbId) -> SourceResult<ChallengeStandings>;

    /// A user's participations in challenges with status `active`.
    async fn active_participations_for_user(
        &self,
        user_id: DbId,
    ) -> SourceResult<Vec<(Challenge, ChallengeParticipation)>>;

    /// Durably write a new activity.
    async fn insert_activity(&self, activity: NewActivity) -> SourceResult<Activity>;

    /// Atomically apply one activity's progress to a participation.
    ///
    /// Idempotent per `(participation_id, activity_id)`. Concurrent calls
    /// for the same participation must both land; implementations retry
    /// internally and report [`SourceError::Conflict`](crate::SourceError::Conflict)
    /// only when retries are exhausted.
    async fn apply_challenge_progress(
        &self,
        participation_id: DbId,
        activity_id: DbId,
        delta: f64,
        target_value: f64,
        now: Timestamp,
    ) -> SourceResult<ProgressApplication>;
}
