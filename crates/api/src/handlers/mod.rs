pub mod activities;
pub mod leaderboards;
