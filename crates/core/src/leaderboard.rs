//! Leaderboard keys, score provenance, ranking and read-model types.
//!
//! Every cache key the engine touches is derived from a [`LeaderboardKey`]
//! through the functions in this module; no other code formats key strings.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};
use crate::units::canonical_activity_type;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default lifetime of every cache representation (24 hours).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Display name used when a ranked member has no profile row.
pub const UNKNOWN_USER_NAME: &str = "Unknown User";

/// Dimension segment for the all-activities leaderboard.
pub const DIMENSION_ALL: &str = "all";

/// Challenge activity type that accepts every activity type.
pub const OVERALL_ACTIVITY_TYPE: &str = "overall";

/// Default page size for leaderboard reads.
pub const DEFAULT_PAGE_LIMIT: i64 = 25;

/// Maximum page size for leaderboard reads.
pub const MAX_PAGE_LIMIT: i64 = 100;

const KEY_PREFIX: &str = "leaderboard";

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Kind of scope a leaderboard is computed within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Club,
    Challenge,
}

impl ScopeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Club => "club",
            Self::Challenge => "challenge",
        }
    }
}

/// Activity-type slice of a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Every activity type summed.
    All,
    /// A single canonical activity type.
    ActivityType(String),
}

impl Dimension {
    /// Parse an optional activity type filter. `None`, empty, `"all"` and
    /// `"overall"` all mean [`Dimension::All`].
    pub fn from_filter(activity_type: Option<&str>) -> Self {
        match activity_type.map(canonical_activity_type) {
            None => Self::All,
            Some(t) if t.is_empty() || t == DIMENSION_ALL || t == OVERALL_ACTIVITY_TYPE => {
                Self::All
            }
            Some(t) => Self::ActivityType(t),
        }
    }

    /// Whether an activity of `activity_type` contributes to this dimension.
    pub fn admits(&self, activity_type: &str) -> bool {
        match self {
            Self::All => true,
            Self::ActivityType(t) => *t == canonical_activity_type(activity_type),
        }
    }

    /// The activity-type filter to push down to the store.
    pub fn activity_type(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::ActivityType(t) => Some(t),
        }
    }

    fn segment(&self) -> &str {
        match self {
            Self::All => DIMENSION_ALL,
            Self::ActivityType(t) => t,
        }
    }
}

/// Identity of one ranked set: `(scope kind, scope id, dimension)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaderboardKey {
    pub kind: ScopeKind,
    pub scope_id: DbId,
    pub dimension: Dimension,
}

impl LeaderboardKey {
    pub fn club(club_id: DbId, dimension: Dimension) -> Self {
        Self {
            kind: ScopeKind::Club,
            scope_id: club_id,
            dimension,
        }
    }

    /// Challenges rank a single progress value, so their dimension is `All`.
    pub fn challenge(challenge_id: DbId) -> Self {
        Self {
            kind: ScopeKind::Challenge,
            scope_id: challenge_id,
            dimension: Dimension::All,
        }
    }

    /// Sorted-set key: `leaderboard:{kind}:{id}:{dimension}`.
    pub fn cache_key(&self) -> String {
        format!(
            "{KEY_PREFIX}:{}:{}:{}",
            self.kind.as_str(),
            self.scope_id,
            self.dimension.segment()
        )
    }

    /// Per-member auxiliary hash holding challenge progress details.
    pub fn progress_key(&self) -> String {
        format!("{}:progress", self.cache_key())
    }

    /// Set of activity ids whose points are already in this key.
    pub fn applied_key(&self) -> String {
        format!("{}:applied", self.cache_key())
    }
}

impl fmt::Display for LeaderboardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// Encode a user id as a sorted-set member.
///
/// Zero-padded to 20 digits so lexicographic member order equals numeric
/// id order; the cache backend breaks score ties by member order.
pub fn member_key(user_id: DbId) -> String {
    format!("{user_id:020}")
}

/// Decode a sorted-set member produced by [`member_key`].
pub fn parse_member(member: &str) -> Option<DbId> {
    member.parse().ok()
}

// ---------------------------------------------------------------------------
// Score provenance
// ---------------------------------------------------------------------------

/// A score computed from the source of truth. The only kind of score that
/// may be written into the cache.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct GroundTruthScore(f64);

impl GroundTruthScore {
    pub fn from_source(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Fold one more contribution into the total.
    pub fn add(self, contribution: f64) -> Self {
        Self(self.0 + contribution)
    }
}

/// A score read back from the cache. Read-through only; nothing accepts it
/// as input for a write.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct CachedScore(f64);

impl CachedScore {
    pub fn from_cache(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Standing order: score descending, then user id descending.
///
/// The id tie-break matches the cache backend's reverse member order for
/// [`member_key`]-encoded members, so direct computation and a warm cache
/// rank ties identically.
pub fn standing_order(a: (DbId, f64), b: (DbId, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| b.0.cmp(&a.0))
}

/// Sort `(user_id, score)` pairs into standing order.
pub fn sort_standings(scores: &mut [(DbId, GroundTruthScore)]) {
    scores.sort_by(|a, b| standing_order((a.0, a.1.value()), (b.0, b.1.value())));
}

/// 1-based rank of the item at `index` within a page starting at `offset`.
pub fn rank_at(offset: i64, index: usize) -> i64 {
    offset + index as i64 + 1
}

/// Clamp a requested page size to `1..=MAX_PAGE_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
}

/// Clamp a requested offset to be non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

// ---------------------------------------------------------------------------
// Read model
// ---------------------------------------------------------------------------

/// One ranked row as returned to clients. Built per read, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: DbId,
    pub name: String,
    pub avatar_url: Option<String>,
    pub score: f64,
    pub rank: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_date: Option<Timestamp>,
}

/// Which path produced a leaderboard page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServedFrom {
    /// Warm cache hit.
    Cache,
    /// Cache was cold, rebuilt, then read.
    Rebuilt,
    /// Computed directly from the source of truth.
    Direct,
}

/// A page of ranked entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardPage {
    pub entries: Vec<LeaderboardEntry>,
    pub total_members: i64,
    pub served_from: ServedFrom,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
