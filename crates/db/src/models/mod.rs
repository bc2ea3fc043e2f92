pub mod activity;
pub mod challenge;
pub mod club;
pub mod conversion_rate;
pub mod profile;
