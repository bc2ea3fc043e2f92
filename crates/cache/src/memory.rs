//! In-process Score Store.
//!
//! Mirrors the Redis adapter's observable behaviour: sorted-set ordering
//! (score descending, member descending on ties), empty sets do not exist,
//! keys expire after their TTL, and hash and set keys share the keyspace.
//! [`MemoryScoreStore::set_available`] simulates a backend outage.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use stride_core::leaderboard::{CachedScore, GroundTruthScore};
use tokio::sync::RwLock;

use crate::{CacheError, CacheResult, ScoreStore, Snapshot};

#[derive(Debug, Clone)]
enum Value {
    Sorted(HashMap<String, f64>),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn expiring(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Some(Instant::now() + ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

pub struct MemoryScoreStore {
    slots: RwLock<HashMap<String, Slot>>,
    available: AtomicBool,
}

impl Default for MemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle simulated availability. While unavailable every operation
    /// fails with [`CacheError::BackendUnavailable`]; data is retained.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Drop every key, as if the backend restarted empty.
    pub async fn flush(&self) {
        self.slots.write().await.clear();
    }

    /// Snapshot of a sorted set in descending order.
    pub async fn snapshot(&self, key: &str) -> Vec<(String, f64)> {
        let slots = self.slots.read().await;
        match slots.get(key) {
            Some(slot) if !slot.is_expired(Instant::now()) => match &slot.value {
                Value::Sorted(set) => sorted_desc(set),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn check(&self) -> CacheResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::BackendUnavailable(
                "in-memory store marked unavailable".into(),
            ))
        }
    }
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::BackendUnavailable(format!("WRONGTYPE operation against key '{key}'"))
}

fn sorted_desc(set: &HashMap<String, f64>) -> Vec<(String, f64)> {
    let mut rows: Vec<(String, f64)> = set.iter().map(|(m, s)| (m.clone(), *s)).collect();
    rows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
    rows
}

/// Remove `key` if it has expired, then return the live slot.
fn live<'a>(slots: &'a mut HashMap<String, Slot>, key: &str) -> Option<&'a mut Slot> {
    if slots.get(key).is_some_and(|s| s.is_expired(Instant::now())) {
        slots.remove(key);
    }
    slots.get_mut(key)
}

fn live_sorted<'a>(
    slots: &'a mut HashMap<String, Slot>,
    key: &str,
) -> CacheResult<Option<&'a mut HashMap<String, f64>>> {
    match live(slots, key) {
        None => Ok(None),
        Some(Slot {
            value: Value::Sorted(set),
            ..
        }) => Ok(Some(set)),
        Some(_) => Err(wrong_type(key)),
    }
}

fn sorted_entry<'a>(
    slots: &'a mut HashMap<String, Slot>,
    key: &str,
) -> CacheResult<&'a mut HashMap<String, f64>> {
    if live(slots, key).is_none() {
        slots.insert(key.to_string(), Slot::new(Value::Sorted(HashMap::new())));
    }
    match live_sorted(slots, key)? {
        Some(set) => Ok(set),
        None => Err(wrong_type(key)),
    }
}

fn hash_entry<'a>(
    slots: &'a mut HashMap<String, Slot>,
    key: &str,
) -> CacheResult<&'a mut HashMap<String, String>> {
    if live(slots, key).is_none() {
        slots.insert(key.to_string(), Slot::new(Value::Hash(HashMap::new())));
    }
    match live(slots, key) {
        Some(Slot {
            value: Value::Hash(hash),
            ..
        }) => Ok(hash),
        _ => Err(wrong_type(key)),
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn ping(&self) -> CacheResult<()> {
        self.check()
    }

    async fn increment(&self, key: &str, member: &str, delta: f64) -> CacheResult<CachedScore> {
        self.check()?;
        let mut slots = self.slots.write().await;
        let set = sorted_entry(&mut slots, key)?;
        let score = set.entry(member.to_string()).or_insert(0.0);
        *score += delta;
        Ok(CachedScore::from_cache(*score))
    }

    async fn set_score(&self, key: &str, member: &str, score: GroundTruthScore) -> CacheResult<()> {
        self.check()?;
        let mut slots = self.slots.write().await;
        sorted_entry(&mut slots, key)?.insert(member.to_string(), score.value());
        Ok(())
    }

    async fn set_scores(
        &self,
        key: &str,
        scores: &[(String, GroundTruthScore)],
    ) -> CacheResult<()> {
        self.check()?;
        if scores.is_empty() {
            return Ok(());
        }
        let mut slots = self.slots.write().await;
        let set = sorted_entry(&mut slots, key)?;
        for (member, score) in scores {
            set.insert(member.clone(), score.value());
        }
        Ok(())
    }

    async fn replace_snapshot(&self, snapshot: &Snapshot, ttl: Duration) -> CacheResult<()> {
        self.check()?;
        let mut slots = self.slots.write().await;
        for key in snapshot.keys() {
            slots.remove(key);
        }
        if snapshot.scores.is_empty() {
            return Ok(());
        }
        let set = snapshot
            .scores
            .iter()
            .map(|(member, score)| (member.clone(), score.value()))
            .collect();
        slots.insert(snapshot.key.clone(), Slot::expiring(Value::Sorted(set), ttl));
        if let Some((key, fields)) = snapshot.details.as_ref().filter(|(_, f)| !f.is_empty()) {
            let hash = fields.iter().cloned().collect();
            slots.insert(key.clone(), Slot::expiring(Value::Hash(hash), ttl));
        }
        if let Some((key, members)) = snapshot.applied.as_ref().filter(|(_, m)| !m.is_empty()) {
            let set = members.iter().cloned().collect();
            slots.insert(key.clone(), Slot::expiring(Value::Set(set), ttl));
        }
        Ok(())
    }

    async fn range_descending(
        &self,
        key: &str,
        offset: u64,
        limit: u64,
    ) -> CacheResult<Vec<(String, CachedScore)>> {
        self.check()?;
        let mut slots = self.slots.write().await;
        let Some(set) = live_sorted(&mut slots, key)? else {
            return Ok(Vec::new());
        };
        Ok(sorted_desc(set)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(member, score)| (member, CachedScore::from_cache(score)))
            .collect())
    }

    async fn count(&self, key: &str) -> CacheResult<u64> {
        self.check()?;
        let mut slots = self.slots.write().await;
        Ok(live_sorted(&mut slots, key)?.map_or(0, |set| set.len() as u64))
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.check()?;
        let mut slots = self.slots.write().await;
        Ok(live(&mut slots, key).is_some())
    }

    async fn clear(&self, key: &str) -> CacheResult<()> {
        self.check()?;
        self.slots.write().await.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<()> {
        self.check()?;
        let mut slots = self.slots.write().await;
        if let Some(slot) = live(&mut slots, key) {
            slot.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn rank_of(&self, key: &str, member: &str) -> CacheResult<Option<u64>> {
        self.check()?;
        let mut slots = self.slots.write().await;
        let Some(set) = live_sorted(&mut slots, key)? else {
            return Ok(None);
        };
        Ok(sorted_desc(set)
            .iter()
            .position(|(m, _)| m == member)
            .map(|index| index as u64 + 1))
    }

    async fn score_of(&self, key: &str, member: &str) -> CacheResult<Option<CachedScore>> {
        self.check()?;
        let mut slots = self.slots.write().await;
        Ok(live_sorted(&mut slots, key)?
            .and_then(|set| set.get(member).copied())
            .map(CachedScore::from_cache))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        self.check()?;
        let mut slots = self.slots.write().await;
        hash_entry(&mut slots, key)?.insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> CacheResult<bool> {
        self.check()?;
        let mut slots = self.slots.write().await;
        let hash = hash_entry(&mut slots, key)?;
        if hash.contains_key(field) {
            return Ok(false);
        }
        hash.insert(field.to_string(), value.to_string());
        Ok(true)
    }

    async fn hash_get_all(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        self.check()?;
        let mut slots = self.slots.write().await;
        match live(&mut slots, key) {
            None => Ok(HashMap::new()),
            Some(Slot {
                value: Value::Hash(hash),
                ..
            }) => Ok(hash.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn claim_member(&self, key: &str, member: &str, ttl: Duration) -> CacheResult<bool> {
        self.check()?;
        let mut slots = self.slots.write().await;
        if live(&mut slots, key).is_none() {
            slots.insert(key.to_string(), Slot::new(Value::Set(HashSet::new())));
        }
        match live(&mut slots, key) {
            Some(Slot {
                value: Value::Set(set),
                expires_at,
            }) => {
                *expires_at = Some(Instant::now() + ttl);
                Ok(set.insert(member.to_string()))
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn release_member(&self, key: &str, member: &str) -> CacheResult<()> {
        self.check()?;
        let mut slots = self.slots.write().await;
        let now_empty = match live(&mut slots, key) {
            None => return Ok(()),
            Some(Slot {
                value: Value::Set(set),
                ..
            }) => {
                set.remove(member);
                set.is_empty()
            }
            Some(_) => return Err(wrong_type(key)),
        };
        if now_empty {
            slots.remove(key);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "leaderboard:club:1:run";

    fn gt(v: f64) -> GroundTruthScore {
        GroundTruthScore::from_source(v)
    }

    #[tokio::test]
    async fn increment_creates_then_adds() {
        let store = MemoryScoreStore::new();
        assert_eq!(store.increment(KEY, "a", 5.0).await.unwrap().value(), 5.0);
        assert_eq!(store.increment(KEY, "a", 2.5).await.unwrap().value(), 7.5);
        assert_eq!(store.count(KEY).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn range_is_descending_with_member_tiebreak() {
        let store = MemoryScoreStore::new();
        store
            .set_scores(
                KEY,
                &[
                    ("01".into(), gt(10.0)),
                    ("02".into(), gt(30.0)),
                    ("03".into(), gt(10.0)),
                ],
            )
            .await
            .unwrap();
        let page = store.range_descending(KEY, 0, 10).await.unwrap();
        let members: Vec<&str> = page.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(members, vec!["02", "03", "01"]);

        let second = store.range_descending(KEY, 1, 1).await.unwrap();
        assert_eq!(second[0].0, "03");
    }

    #[tokio::test]
    async fn rank_and_score_lookup() {
        let store = MemoryScoreStore::new();
        store.set_score(KEY, "a", gt(1.0)).await.unwrap();
        store.set_score(KEY, "b", gt(9.0)).await.unwrap();
        assert_eq!(store.rank_of(KEY, "b").await.unwrap(), Some(1));
        assert_eq!(store.rank_of(KEY, "a").await.unwrap(), Some(2));
        assert_eq!(store.rank_of(KEY, "zz").await.unwrap(), None);
        assert_eq!(store.score_of(KEY, "a").await.unwrap().map(|s| s.value()), Some(1.0));
    }

    #[tokio::test]
    async fn empty_batch_does_not_create_key() {
        let store = MemoryScoreStore::new();
        store.set_scores(KEY, &[]).await.unwrap();
        assert!(!store.exists(KEY).await.unwrap());
    }

    #[tokio::test]
    async fn replace_drops_stale_members() {
        let store = MemoryScoreStore::new();
        store.increment(KEY, "stale", 5.0).await.unwrap();
        let snapshot = Snapshot::new(KEY, vec![("fresh".into(), gt(2.0))]);
        store.replace_snapshot(&snapshot, Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.snapshot(KEY).await, vec![("fresh".to_string(), 2.0)]);

        let empty = Snapshot::new(KEY, Vec::new());
        store.replace_snapshot(&empty, Duration::from_secs(60)).await.unwrap();
        assert!(!store.exists(KEY).await.unwrap());
    }

    #[tokio::test]
    async fn replace_snapshot_rewrites_companion_keys() {
        let store = MemoryScoreStore::new();
        let details = "leaderboard:challenge:1:all:progress";
        let applied = "leaderboard:challenge:1:all:applied";
        store.hash_set(details, "gone", "{}").await.unwrap();
        store.claim_member(applied, "99", Duration::from_secs(60)).await.unwrap();

        let snapshot = Snapshot::new("leaderboard:challenge:1:all", vec![("a".into(), gt(3.0))])
            .with_details(details, vec![("a".into(), "{}".into())])
            .with_applied(applied, vec!["7".into()]);
        store.replace_snapshot(&snapshot, Duration::from_secs(60)).await.unwrap();

        let fields = store.hash_get_all(details).await.unwrap();
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("a"));
        assert!(store.claim_member(applied, "99", Duration::from_secs(60)).await.unwrap());
        assert!(!store.claim_member(applied, "7", Duration::from_secs(60)).await.unwrap());

        let empty = Snapshot::new("leaderboard:challenge:1:all", Vec::new())
            .with_details(details, Vec::new())
            .with_applied(applied, Vec::new());
        store.replace_snapshot(&empty, Duration::from_secs(60)).await.unwrap();
        assert!(!store.exists(details).await.unwrap());
        assert!(!store.exists(applied).await.unwrap());
    }

    #[tokio::test]
    async fn clear_removes_key() {
        let store = MemoryScoreStore::new();
        store.increment(KEY, "a", 1.0).await.unwrap();
        store.clear(KEY).await.unwrap();
        assert!(!store.exists(KEY).await.unwrap());
        assert_eq!(store.count(KEY).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expired_key_behaves_as_absent() {
        let store = MemoryScoreStore::new();
        store.increment(KEY, "a", 1.0).await.unwrap();
        store.expire(KEY, Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!store.exists(KEY).await.unwrap());
        assert!(store.range_descending(KEY, 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let store = MemoryScoreStore::new();
        store.increment(KEY, "a", 1.0).await.unwrap();
        store.set_available(false);
        assert!(matches!(
            store.exists(KEY).await,
            Err(CacheError::BackendUnavailable(_))
        ));
        assert!(store.increment(KEY, "a", 1.0).await.is_err());
        store.set_available(true);
        assert_eq!(store.score_of(KEY, "a").await.unwrap().map(|s| s.value()), Some(1.0));
    }

    #[tokio::test]
    async fn claim_member_is_add_if_absent() {
        let store = MemoryScoreStore::new();
        let applied = "leaderboard:club:1:run:applied";
        let ttl = Duration::from_secs(60);
        assert!(store.claim_member(applied, "7", ttl).await.unwrap());
        assert!(!store.claim_member(applied, "7", ttl).await.unwrap());
        assert!(store.claim_member(applied, "8", ttl).await.unwrap());

        store.release_member(applied, "7").await.unwrap();
        assert!(store.claim_member(applied, "7", ttl).await.unwrap());
        assert!(store.increment(applied, "7", 1.0).await.is_err());
    }

    #[tokio::test]
    async fn claim_member_refreshes_ttl() {
        let store = MemoryScoreStore::new();
        let applied = "leaderboard:club:1:run:applied";
        store.claim_member(applied, "1", Duration::from_millis(20)).await.unwrap();
        store.claim_member(applied, "2", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!store.claim_member(applied, "1", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn hash_set_if_absent_keeps_first_value() {
        let store = MemoryScoreStore::new();
        let key = "leaderboard:challenge:1:all:progress";
        assert!(store.hash_set_if_absent(key, "a", "first").await.unwrap());
        assert!(!store.hash_set_if_absent(key, "a", "second").await.unwrap());
        assert_eq!(store.hash_get_all(key).await.unwrap()["a"], "first");
    }

    #[tokio::test]
    async fn hash_round_trip_and_wrong_type() {
        let store = MemoryScoreStore::new();
        let key = "leaderboard:challenge:1:all:progress";
        store.hash_set(key, "a", "x").await.unwrap();
        store.hash_set(key, "b", "y").await.unwrap();
        let all = store.hash_get_all(key).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["a"], "x");
        assert!(store.increment(key, "a", 1.0).await.is_err());
    }
}
