pub mod candidates;
pub mod centroids;
pub mod circuit_breaker;
pub mod leaderboard;
pub mod rate_limiter;
pub mod retry;
pub mod rounds;
pub mod scoring;
pub mod snap;

pub use crate::domain::model::{ArtworkCandidate, Coordinate, RoundResult};
pub use crate::domain::ports::{Geocoder, LeaderboardStore, MuseumApi};
pub use crate::utils::error::Result;
