//! In-process [`SourceStore`] with the same semantics as the Postgres one.
//!
//! Backs local runs without a database and the engine's integration tests.
//! Seeding helpers stand in for the admin surfaces that populate clubs,
//! challenges and rates in production.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use stride_core::activity::{Activity, NewActivity, Profile};
use stride_core::challenge::{
    apply_progress, Challenge, ChallengeParticipation, ChallengeStatus, ProgressApplication,
};
use stride_core::conversion::{ConversionRate, RateScope, RateTable};
use stride_core::types::{DbId, Timestamp};
use tokio::sync::RwLock;

use crate::error::{SourceError, SourceResult};
use crate::source::{ChallengeStandings, SourceStore};

#[derive(Default)]
struct Tables {
    profiles: BTreeMap<DbId, Profile>,
    /// club id -> member user ids
    club_members: BTreeMap<DbId, Vec<DbId>>,
    activities: Vec<Activity>,
    rates: HashMap<RateScope, Vec<ConversionRate>>,
    challenges: BTreeMap<DbId, Challenge>,
    participations: BTreeMap<DbId, ChallengeParticipation>,
    /// (participation id, activity id) pairs already applied
    applications: HashSet<(DbId, DbId)>,
    failing_progress: HashSet<DbId>,
}

pub struct MemorySourceStore {
    tables: RwLock<Tables>,
    next_id: AtomicI64,
    available: AtomicBool,
}

impl Default for MemorySourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySourceStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_id: AtomicI64::new(1),
            available: AtomicBool::new(true),
        }
    }

    fn next_id(&self) -> DbId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn check_available(&self) -> SourceResult<()> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(SourceError::query("source store unavailable"))
        }
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// Make progress updates for one participation fail.
    pub async fn fail_progress_for(&self, participation_id: DbId) {
        self.tables.write().await.failing_progress.insert(participation_id);
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    pub async fn add_profile(&self, id: DbId, name: &str, avatar_url: Option<&str>) {
        self.tables.write().await.profiles.insert(
            id,
            Profile {
                id,
                name: name.to_string(),
                avatar_url: avatar_url.map(str::to_string),
            },
        );
    }

    pub async fn add_club_member(&self, club_id: DbId, user_id: DbId) {
        let mut tables = self.tables.write().await;
        let members = tables.club_members.entry(club_id).or_default();
        if !members.contains(&user_id) {
            members.push(user_id);
        }
    }

    /// Insert or replace a conversion rate for a scope.
    pub async fn set_rate(&self, scope: RateScope, activity_type: &str, unit: &str, rate: f64) {
        let rate = ConversionRate::new(activity_type, unit, rate);
        let mut tables = self.tables.write().await;
        let rates = tables.rates.entry(scope).or_default();
        rates.retain(|r| !(r.activity_type == rate.activity_type && r.unit == rate.unit));
        rates.push(rate);
    }

    /// Insert a challenge, assigning its id.
    pub async fn add_challenge(&self, mut challenge: Challenge) -> Challenge {
        challenge.id = self.next_id();
        self.tables
            .write()
            .await
            .challenges
            .insert(challenge.id, challenge.clone());
        challenge
    }

    pub async fn set_challenge_status(&self, challenge_id: DbId, status: ChallengeStatus) {
        if let Some(c) = self.tables.write().await.challenges.get_mut(&challenge_id) {
            c.status = status;
        }
    }

    /// Join a user to a challenge. Joining twice returns the existing row.
    pub async fn join_challenge(
        &self,
        challenge_id: DbId,
        user_id: DbId,
    ) -> ChallengeParticipation {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .participations
            .values()
            .find(|p| p.challenge_id == challenge_id && p.user_id == user_id)
        {
            return existing.clone();
        }
        let participation = ChallengeParticipation {
            id: self.next_id(),
            challenge_id,
            user_id,
            current_value: 0.0,
            progress_percentage: 0.0,
            completed: false,
            completed_at: None,
            joined_at: Utc::now(),
            last_activity_date: None,
        };
        tables
            .participations
            .insert(participation.id, participation.clone());
        participation
    }

    pub async fn participation(&self, participation_id: DbId) -> Option<ChallengeParticipation> {
        self.tables
            .read()
            .await
            .participations
            .get(&participation_id)
            .cloned()
    }

    /// Every activity written so far, in insertion order.
    pub async fn activities(&self) -> Vec<Activity> {
        self.tables.read().await.activities.clone()
    }
}

#[async_trait]
impl SourceStore for MemorySourceStore {
    async fn ping(&self) -> SourceResult<()> {
        self.check_available()
    }

    async fn club_member_ids(&self, club_id: DbId) -> SourceResult<Vec<DbId>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.club_members.get(&club_id).cloned().unwrap_or_default())
    }

    async fn club_ids_for_user(&self, user_id: DbId) -> SourceResult<Vec<DbId>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .club_members
            .iter()
            .filter(|(_, members)| members.contains(&user_id))
            .map(|(club_id, _)| *club_id)
            .collect())
    }

    async fn activities_for_users(
        &self,
        user_ids: &[DbId],
        activity_type: Option<&str>,
    ) -> SourceResult<Vec<Activity>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .activities
            .iter()
            .filter(|a| user_ids.contains(&a.user_id))
            .filter(|a| activity_type.is_none_or(|t| a.activity_type == t))
            .cloned()
            .collect())
    }

    async fn rate_table(&self, scope: RateScope) -> SourceResult<RateTable> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let overrides = match scope {
            RateScope::Global => Vec::new(),
            scoped => tables.rates.get(&scoped).cloned().unwrap_or_default(),
        };
        let defaults = tables
            .rates
            .get(&RateScope::Global)
            .cloned()
            .unwrap_or_default();
        Ok(RateTable::new(overrides, defaults))
    }

    async fn profiles(&self, user_ids: &[DbId]) -> SourceResult<Vec<Profile>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| tables.profiles.get(id).cloned())
            .collect())
    }

    async fn challenge(&self, challenge_id: DbId) -> SourceResult<Option<Challenge>> {
        self.check_available()?;
        Ok(self.tables.read().await.challenges.get(&challenge_id).cloned())
    }

    async fn challenge_standings(&self, challenge_id: DbId) -> SourceResult<ChallengeStandings> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let participations: Vec<ChallengeParticipation> = tables
            .participations
            .values()
            .filter(|p| p.challenge_id == challenge_id)
            .cloned()
            .collect();
        let mut applied_activity_ids: Vec<DbId> = tables
            .applications
            .iter()
            .filter(|(pid, _)| participations.iter().any(|p| p.id == *pid))
            .map(|(_, activity_id)| *activity_id)
            .collect();
        applied_activity_ids.sort_unstable();
        Ok(ChallengeStandings {
            participations,
            applied_activity_ids,
        })
    }

    async fn active_participations_for_user(
        &self,
        user_id: DbId,
    ) -> SourceResult<Vec<(Challenge, ChallengeParticipation)>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .participations
            .values()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| {
                let challenge = tables.challenges.get(&p.challenge_id)?;
                (challenge.status == ChallengeStatus::Active)
                    .then(|| (challenge.clone(), p.clone()))
            })
            .collect())
    }

    async fn insert_activity(&self, activity: NewActivity) -> SourceResult<Activity> {
        self.check_available()?;
        let activity = activity.into_activity(self.next_id());
        self.tables.write().await.activities.push(activity.clone());
        Ok(activity)
    }

    async fn apply_challenge_progress(
        &self,
        participation_id: DbId,
        activity_id: DbId,
        delta: f64,
        target_value: f64,
        now: Timestamp,
    ) -> SourceResult<ProgressApplication> {
        self.check_available()?;
        // The write lock plays the role of the row lock.
        let mut tables = self.tables.write().await;
        if tables.failing_progress.contains(&participation_id) {
            return Err(SourceError::query(format!(
                "progress update rejected for participation {participation_id}"
            )));
        }
        let Some(current) = tables.participations.get(&participation_id).cloned() else {
            return Err(SourceError::Missing {
                entity: "ChallengeParticipation",
                id: participation_id,
            });
        };
        if !tables.applications.insert((participation_id, activity_id)) {
            return Ok(ProgressApplication::AlreadyApplied(current));
        }
        let change = apply_progress(&current, delta, target_value, now);
        tables
            .participations
            .insert(participation_id, change.participation.clone());
        Ok(ProgressApplication::Applied(change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn challenge() -> Challenge {
        Challenge {
            id: 0,
            name: "Spring".into(),
            activity_type: "run".into(),
            unit: "kilometers".into(),
            target_value: 10.0,
            status: ChallengeStatus::Active,
            start_date: Utc::now() - chrono::Duration::days(1),
            end_date: None,
        }
    }

    #[tokio::test]
    async fn progress_is_idempotent_per_activity() {
        let store = MemorySourceStore::new();
        let c = store.add_challenge(challenge()).await;
        let p = store.join_challenge(c.id, 7).await;

        let first = store
            .apply_challenge_progress(p.id, 100, 4.0, 10.0, Utc::now())
            .await
            .unwrap();
        assert_matches!(first, ProgressApplication::Applied(_));

        let again = store
            .apply_challenge_progress(p.id, 100, 4.0, 10.0, Utc::now())
            .await
            .unwrap();
        assert_matches!(
            again,
            ProgressApplication::AlreadyApplied(ref row) if row.current_value == 4.0
        );
    }

    #[tokio::test]
    async fn standings_list_applied_activities_of_that_challenge() {
        let store = MemorySourceStore::new();
        let spring = store.add_challenge(challenge()).await;
        let autumn = store.add_challenge(challenge()).await;
        let a = store.join_challenge(spring.id, 7).await;
        let b = store.join_challenge(spring.id, 8).await;
        let other = store.join_challenge(autumn.id, 7).await;
        for (participation, activity) in [(b.id, 12), (a.id, 11), (other.id, 13)] {
            store
                .apply_challenge_progress(participation, activity, 1.0, 10.0, Utc::now())
                .await
                .unwrap();
        }

        let standings = store.challenge_standings(spring.id).await.unwrap();
        assert_eq!(standings.participations.len(), 2);
        assert_eq!(standings.applied_activity_ids, vec![11, 12]);
    }

    #[tokio::test]
    async fn joining_twice_returns_same_participation() {
        let store = MemorySourceStore::new();
        let c = store.add_challenge(challenge()).await;
        let a = store.join_challenge(c.id, 7).await;
        let b = store.join_challenge(c.id, 7).await;
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn scoped_rates_override_defaults() {
        let store = MemorySourceStore::new();
        store.set_rate(RateScope::Global, "run", "km", 10.0).await;
        store.set_rate(RateScope::Club(3), "run", "km", 12.0).await;

        let table = store.rate_table(RateScope::Club(3)).await.unwrap();
        assert_eq!(table.points_for("run", 1.0, "kilometers"), 12.0);

        let other = store.rate_table(RateScope::Club(4)).await.unwrap();
        assert_eq!(other.points_for("run", 1.0, "kilometers"), 10.0);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = MemorySourceStore::new();
        store.set_available(false);
        assert_matches!(store.club_member_ids(1).await, Err(SourceError::Query(_)));
        store.set_available(true);
        assert!(store.club_member_ids(1).await.unwrap().is_empty());
    }
}
