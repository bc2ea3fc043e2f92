use std::time::Duration;

use stride_core::challenge::UnitPolicy;
use stride_core::leaderboard::DEFAULT_CACHE_TTL_SECS;

/// Engine tuning loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Lifetime of every rebuilt or incremented cache key.
    pub cache_ttl: Duration,
    /// How activity units are matched against challenge units.
    pub unit_policy: UnitPolicy,
    /// Attempts per participation before a conflicting progress update
    /// is given up.
    pub progress_max_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            unit_policy: UnitPolicy::default(),
            progress_max_attempts: 3,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default  |
    /// |-------------------------|----------|
    /// | `CACHE_TTL_SECS`        | `86400`  |
    /// | `CHALLENGE_UNIT_POLICY` | `exact`  |
    /// | `PROGRESS_MAX_ATTEMPTS` | `3`      |
    pub fn from_env() -> Self {
        let cache_ttl_secs: u64 = std::env::var("CACHE_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_CACHE_TTL_SECS.to_string())
            .parse()
            .expect("CACHE_TTL_SECS must be a valid u64");

        let unit_policy = std::env::var("CHALLENGE_UNIT_POLICY")
            .map(|v| UnitPolicy::parse(&v).expect("CHALLENGE_UNIT_POLICY must be exact or convert"))
            .unwrap_or_default();

        let progress_max_attempts: u32 = std::env::var("PROGRESS_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("PROGRESS_MAX_ATTEMPTS must be a valid u32");

        Self {
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            unit_policy,
            progress_max_attempts: progress_max_attempts.max(1),
        }
    }

    pub fn with_unit_policy(mut self, unit_policy: UnitPolicy) -> Self {
        self.unit_policy = unit_policy;
        self
    }
}
