mod common;

use assert_matches::assert_matches;
use common::*;
use stride_cache::ScoreStore;
use stride_engine::incremental::{ClubUpdate, KeyOutcome};
use stride_core::leaderboard::{member_key, Dimension, GroundTruthScore, LeaderboardKey};

fn all_key() -> LeaderboardKey {
    LeaderboardKey::club(CLUB, Dimension::All)
}

#[tokio::test]
async fn rebuild_twice_yields_identical_cache() {
    let h = harness();
    h.seed_club().await;
    h.insert_only(ALICE, "run", 5.5, "km").await;
    h.insert_only(BOB, "walk", 3.0, "km").await;
    let key = all_key().cache_key();

    let first = h.engine.rebuild(&all_key()).await.unwrap();
    let first_snapshot = h.scores.snapshot(&key).await;
    let second = h.engine.rebuild(&all_key()).await.unwrap();
    let second_snapshot = h.scores.snapshot(&key).await;

    assert!(first.cache_warmed && second.cache_warmed);
    assert_eq!(first.ground_truth, second.ground_truth);
    assert_eq!(first_snapshot, second_snapshot);
    assert_eq!(
        first_snapshot,
        vec![(member_key(ALICE), 55.0), (member_key(BOB), 15.0)]
    );
}

#[tokio::test]
async fn rebuild_drops_members_no_longer_in_source() {
    let h = harness();
    h.seed_club().await;
    let key = all_key().cache_key();
    h.scores
        .set_score(&key, &member_key(99), GroundTruthScore::from_source(1000.0))
        .await
        .unwrap();

    h.engine.rebuild(&all_key()).await.unwrap();

    let members: Vec<String> = h
        .scores
        .snapshot(&key)
        .await
        .into_iter()
        .map(|(m, _)| m)
        .collect();
    assert_eq!(members, vec![member_key(BOB), member_key(ALICE)]);
}

#[tokio::test]
async fn rebuild_with_cache_down_still_returns_ground_truth() {
    let h = harness();
    h.seed_club().await;
    h.insert_only(ALICE, "run", 1.0, "km").await;
    h.scores.set_available(false);

    let outcome = h.engine.rebuild(&all_key()).await.unwrap();

    assert!(!outcome.cache_warmed);
    assert_eq!(
        outcome.ground_truth.standings,
        vec![
            (ALICE, GroundTruthScore::from_source(10.0)),
            (BOB, GroundTruthScore::from_source(0.0)),
        ]
    );
}

#[tokio::test]
async fn type_dimension_only_counts_that_type() {
    let h = harness();
    h.seed_club().await;
    h.insert_only(ALICE, "run", 1.0, "km").await;
    h.insert_only(ALICE, "walk", 4.0, "km").await;
    h.insert_only(BOB, "Walk", 1.0, "KM").await;

    let walk = h
        .engine
        .rebuild(&LeaderboardKey::club(CLUB, Dimension::from_filter(Some("walk"))))
        .await
        .unwrap();

    assert_eq!(
        walk.ground_truth.standings,
        vec![
            (ALICE, GroundTruthScore::from_source(20.0)),
            (BOB, GroundTruthScore::from_source(5.0)),
        ]
    );
}

#[tokio::test]
async fn club_rate_overrides_global_default() {
    let h = harness();
    h.seed_club().await;
    h.source
        .set_rate(stride_core::conversion::RateScope::Club(CLUB), "run", "km", 12.0)
        .await;
    h.insert_only(ALICE, "run", 2.0, "kilometers").await;

    let outcome = h.engine.rebuild(&all_key()).await.unwrap();

    assert_eq!(
        outcome.ground_truth.standing_of(ALICE),
        Some((1, GroundTruthScore::from_source(24.0)))
    );
}

#[tokio::test]
async fn challenge_rebuild_writes_progress_details() {
    let h = harness();
    h.seed_club().await;
    let challenge = h.add_challenge("run", "kilometers", 8.0).await;
    h.source.join_challenge(challenge.id, ALICE).await;
    h.source.join_challenge(challenge.id, BOB).await;
    h.record(ALICE, "run", 4.0, "km").await;

    let key = LeaderboardKey::challenge(challenge.id);
    let outcome = h.engine.rebuild(&key).await.unwrap();
    assert!(outcome.cache_warmed);

    assert_eq!(
        h.scores.snapshot(&key.cache_key()).await,
        vec![(member_key(ALICE), 4.0), (member_key(BOB), 0.0)]
    );
    let details = h.scores.hash_get_all(&key.progress_key()).await.unwrap();
    assert_eq!(details.len(), 2);
    assert!(details[&member_key(ALICE)].contains(r#""target_value":8.0"#));
    assert!(details[&member_key(ALICE)].contains(r#""completed":false"#));
}

#[tokio::test]
async fn increment_arriving_after_rebuild_is_not_counted_twice() {
    let h = harness();
    h.seed_club().await;
    let late = h.insert_only(ALICE, "run", 5.0, "km").await;
    h.engine.rebuild(&all_key()).await.unwrap();

    let update = h.engine.on_activity_recorded(&late).await;

    let all = all_key().cache_key();
    assert_matches!(
        &update.report.clubs[0],
        ClubUpdate::Updated { keys, .. }
            if keys.iter().any(|k| k.key == all && k.outcome == KeyOutcome::AlreadyApplied)
    );
    assert_eq!(
        h.scores.snapshot(&all_key().cache_key()).await,
        vec![(member_key(ALICE), 50.0), (member_key(BOB), 0.0)]
    );
}

#[tokio::test]
async fn mirror_landing_after_rebuild_is_not_counted_twice() {
    let h = harness();
    let challenge = h.add_challenge("run", "kilometers", 8.0).await;
    h.source.join_challenge(challenge.id, ALICE).await;
    let key = LeaderboardKey::challenge(challenge.id);
    h.engine.rebuild(&key).await.unwrap();

    let (_, update) = h
        .engine
        .record_activity(activity(ALICE, "run", 4.0, "km"))
        .await
        .unwrap();
    h.engine.rebuild(&key).await.unwrap();
    update.mirror.wait().await;

    assert_eq!(
        h.scores.snapshot(&key.cache_key()).await,
        vec![(member_key(ALICE), 4.0)]
    );
}

#[tokio::test]
async fn challenge_rebuild_drops_stale_progress_details() {
    let h = harness();
    let challenge = h.add_challenge("run", "kilometers", 8.0).await;
    h.source.join_challenge(challenge.id, ALICE).await;
    let key = LeaderboardKey::challenge(challenge.id);
    h.scores
        .hash_set(&key.progress_key(), &member_key(99), "{}")
        .await
        .unwrap();

    h.engine.rebuild(&key).await.unwrap();

    let details = h.scores.hash_get_all(&key.progress_key()).await.unwrap();
    assert_eq!(details.keys().cloned().collect::<Vec<_>>(), vec![member_key(ALICE)]);
    assert!(!h.scores.exists(&key.applied_key()).await.unwrap());
}
