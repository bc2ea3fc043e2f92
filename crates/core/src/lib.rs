//! Stride domain core.
//!
//! Pure types and logic shared by the cache, database, engine and API
//! crates. Nothing in here performs I/O.

pub mod activity;
pub mod challenge;
pub mod conversion;
pub mod error;
pub mod leaderboard;
pub mod types;
pub mod units;
