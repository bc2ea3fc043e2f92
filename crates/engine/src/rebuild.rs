//! Rebuild Orchestrator: reconstructs one cache key from the source of
//! truth.

use std::sync::Arc;
use std::time::Duration;

use stride_cache::{CacheResult, ScoreStore, Snapshot};
use stride_core::leaderboard::{member_key, LeaderboardKey, ScopeKind};

use crate::error::EngineResult;
use crate::reader::{GroundTruth, SourceReader};

/// What a rebuild produced.
#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    /// The standings that were (or would have been) written.
    pub ground_truth: GroundTruth,
    /// False when the cache backend could not be written.
    pub cache_warmed: bool,
}

#[derive(Clone)]
pub struct RebuildOrchestrator {
    reader: SourceReader,
    scores: Arc<dyn ScoreStore>,
    ttl: Duration,
}

impl RebuildOrchestrator {
    pub fn new(reader: SourceReader, scores: Arc<dyn ScoreStore>, ttl: Duration) -> Self {
        Self {
            reader,
            scores,
            ttl,
        }
    }

    /// Recompute `key` from source and overwrite the cached copy.
    ///
    /// Source failures propagate. A cache outage is not an error: the
    /// outcome reports `cache_warmed: false` and still carries the ground
    /// truth for the caller to serve directly.
    pub async fn rebuild(&self, key: &LeaderboardKey) -> EngineResult<RebuildOutcome> {
        let ground_truth = self.reader.ground_truth(key).await?;

        let cache_warmed = match self.write(key, &ground_truth).await {
            Ok(()) => {
                tracing::info!(key = %key, members = ground_truth.len(), "Leaderboard rebuilt");
                true
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Leaderboard rebuild could not write cache");
                false
            }
        };

        Ok(RebuildOutcome {
            ground_truth,
            cache_warmed,
        })
    }

    async fn write(&self, key: &LeaderboardKey, ground_truth: &GroundTruth) -> CacheResult<()> {
        self.scores.replace_snapshot(&snapshot(key, ground_truth), self.ttl).await
    }
}

/// The standings, their applied activity ids and, for challenges, the
/// progress details, as one unit for the store to replace.
fn snapshot(key: &LeaderboardKey, ground_truth: &GroundTruth) -> Snapshot {
    let members = ground_truth
        .standings
        .iter()
        .map(|(user_id, score)| (member_key(*user_id), *score))
        .collect();
    let applied = ground_truth
        .applied_activity_ids
        .iter()
        .map(ToString::to_string)
        .collect();
    let snapshot = Snapshot::new(key.cache_key(), members).with_applied(key.applied_key(), applied);
    if key.kind != ScopeKind::Challenge {
        return snapshot;
    }

    let details = ground_truth
        .details
        .iter()
        .filter_map(|(user_id, detail)| {
            let encoded = serde_json::to_string(detail).ok()?;
            Some((member_key(*user_id), encoded))
        })
        .collect();
    snapshot.with_details(key.progress_key(), details)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use stride_core::leaderboard::{Dimension, GroundTruthScore};

    use super::*;
    use crate::reader::ProgressDetail;

    #[test]
    fn club_snapshot_carries_applied_ids_but_no_details() {
        let key = LeaderboardKey::club(4, Dimension::All);
        let ground_truth = GroundTruth {
            standings: vec![(1, GroundTruthScore::from_source(20.0))],
            details: HashMap::new(),
            applied_activity_ids: vec![10, 11],
        };

        let snapshot = snapshot(&key, &ground_truth);

        assert_eq!(snapshot.key, "leaderboard:club:4:all");
        assert_eq!(snapshot.details, None);
        assert_eq!(
            snapshot.applied,
            Some((key.applied_key(), vec!["10".to_string(), "11".to_string()]))
        );
    }

    #[test]
    fn challenge_snapshot_encodes_details_per_member() {
        let key = LeaderboardKey::challenge(9);
        let detail = ProgressDetail {
            target_value: 8.0,
            completed: false,
            last_activity_date: None,
        };
        let ground_truth = GroundTruth {
            standings: vec![(3, GroundTruthScore::from_source(2.0))],
            details: HashMap::from([(3, detail)]),
            applied_activity_ids: vec![7],
        };

        let snapshot = snapshot(&key, &ground_truth);

        let (details_key, fields) = snapshot.details.unwrap();
        assert_eq!(details_key, key.progress_key());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].0, member_key(3));
        assert!(fields[0].1.contains(r#""target_value":8.0"#));
    }
}
