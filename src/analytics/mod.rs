//! Enrollment landscape, measure resolution and leaderboard ranking.

pub mod buckets;
pub mod landscape;
pub mod leaderboard;
pub mod measures;
pub mod statistics;
