use crate::config::toml_config::RoundsConfig;
use crate::core::candidates::accept_object;
use crate::core::scoring::{distance_km, score_from_distance};
use crate::domain::model::{ArtworkCandidate, Coordinate, RoundResult, RoundSessionEntry};
use crate::domain::ports::MuseumApi;
use crate::utils::error::{GameError, Result};
use chrono::{DateTime, Utc};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 回合狀態：每個 object id 最多計分一次
pub struct RoundStore {
    museum: Arc<dyn MuseumApi>,
    entries: Mutex<HashMap<u64, RoundSessionEntry>>,
    scored: Mutex<LruCache<u64, ()>>,
    catalogue: HashMap<u64, ArtworkCandidate>,
    max_age: chrono::Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RoundStore {
    pub fn new(museum: Arc<dyn MuseumApi>, max_age: chrono::Duration, scored_memory: usize) -> Self {
        let capacity = NonZeroUsize::new(scored_memory).unwrap_or(NonZeroUsize::MIN);
        Self {
            museum,
            entries: Mutex::new(HashMap::new()),
            scored: Mutex::new(LruCache::new(capacity)),
            catalogue: HashMap::new(),
            max_age,
        }
    }

    /// 重建回合時先查固定清單，找不到才問上游
    pub fn with_catalogue(mut self, catalogue: HashMap<u64, ArtworkCandidate>) -> Self {
        self.catalogue = catalogue;
        self
    }

    pub fn from_config(config: &RoundsConfig, museum: Arc<dyn MuseumApi>) -> Self {
        Self::new(
            museum,
            chrono::Duration::minutes(config.max_age_minutes),
            config.scored_memory,
        )
    }

    #[cfg(test)]
    fn active_rounds(&self) -> usize {
        lock(&self.entries).len()
    }

    /// 開始新回合；同一 id 重新出題時覆寫舊的回合
    pub fn start_round(&self, candidate: &ArtworkCandidate) {
        self.start_round_at(candidate, Utc::now());
    }

    fn start_round_at(&self, candidate: &ArtworkCandidate, now: DateTime<Utc>) {
        let object_id = candidate.object_id();
        lock(&self.scored).pop(&object_id);

        let mut entries = lock(&self.entries);
        let cutoff = now - self.max_age;
        let before = entries.len();
        entries.retain(|_, entry| entry.started_at >= cutoff);
        if entries.len() < before {
            tracing::debug!("Purged {} stale rounds", before - entries.len());
        }

        entries.insert(
            object_id,
            RoundSessionEntry {
                target: candidate.target,
                details: candidate.details.clone(),
                started_at: now,
            },
        );
    }

    /// 取出並計分；找不到回合時嘗試從上游重建
    pub async fn score_round(&self, object_id: u64, guess: Coordinate) -> Result<RoundResult> {
        let taken = lock(&self.entries).remove(&object_id);

        let (target, details) = match taken {
            Some(entry) => {
                lock(&self.scored).put(object_id, ());
                (entry.target, entry.details)
            }
            None => {
                {
                    let mut scored = lock(&self.scored);
                    if scored.contains(&object_id) {
                        return Err(GameError::RoundNotFound { object_id });
                    }
                    // 重建期間先佔住這個 id
                    scored.put(object_id, ());
                }

                match self.reconstruct(object_id).await {
                    Ok(candidate) => (candidate.target, candidate.details),
                    Err(e) => {
                        lock(&self.scored).pop(&object_id);
                        tracing::debug!("Round {} could not be reconstructed: {}", object_id, e);
                        return Err(GameError::RoundNotFound { object_id });
                    }
                }
            }
        };

        let distance = distance_km(guess, target);
        let score = score_from_distance(distance);
        tracing::info!(
            "🎯 Round {} scored {} ({:.0} km from {})",
            object_id,
            score,
            distance,
            details.country
        );

        Ok(RoundResult {
            score,
            distance_km: distance.round() as u64,
            target,
            object: details,
        })
    }

    async fn reconstruct(&self, object_id: u64) -> Result<ArtworkCandidate> {
        if let Some(known) = self.catalogue.get(&object_id) {
            tracing::debug!("Round {} rebuilt from the fallback catalogue", object_id);
            return Ok(known.clone());
        }
        let object = self.museum.fetch_object(object_id).await?;
        accept_object(&object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scoring::MAX_SCORE;
    use crate::domain::model::{ArtworkDetails, MuseumObject, SearchQuery};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OneObjectMuseum {
        object: Option<MuseumObject>,
        fetches: AtomicUsize,
    }

    impl OneObjectMuseum {
        fn empty() -> Self {
            Self {
                object: None,
                fetches: AtomicUsize::new(0),
            }
        }

        fn with(object: MuseumObject) -> Self {
            Self {
                object: Some(object),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MuseumApi for OneObjectMuseum {
        async fn search(&self, _query: &SearchQuery) -> Result<Vec<u64>> {
            Ok(Vec::new())
        }

        async fn fetch_object(&self, object_id: u64) -> Result<MuseumObject> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.object
                .clone()
                .filter(|object| object.object_id == object_id)
                .ok_or(GameError::UpstreamStatus {
                    status: 404,
                    url: format!("fake://objects/{}", object_id),
                })
        }
    }

    fn candidate(object_id: u64, target: Coordinate) -> ArtworkCandidate {
        ArtworkCandidate {
            details: ArtworkDetails {
                object_id,
                image_url: "https://images.example.org/a.jpg".to_string(),
                title: "Study".to_string(),
                artist: "Unknown Artist".to_string(),
                year: "1890".to_string(),
                country: "France".to_string(),
                medium: None,
            },
            target,
        }
    }

    fn store(museum: OneObjectMuseum) -> RoundStore {
        RoundStore::new(Arc::new(museum), chrono::Duration::minutes(120), 16)
    }

    #[tokio::test]
    async fn test_exact_guess_scores_max() {
        let rounds = store(OneObjectMuseum::empty());
        let target = Coordinate::new(48.8, 2.3);
        rounds.start_round(&candidate(42, target));

        let result = rounds.score_round(42, target).await.unwrap();
        assert_eq!(result.score, MAX_SCORE);
        assert_eq!(result.distance_km, 0);
        assert_eq!(result.object.object_id, 42);
        assert_eq!(rounds.active_rounds(), 0);
    }

    #[tokio::test]
    async fn test_round_scores_at_most_once() {
        let museum = OneObjectMuseum::empty();
        let rounds = store(museum);
        rounds.start_round(&candidate(42, Coordinate::new(48.8, 2.3)));

        rounds
            .score_round(42, Coordinate::new(40.0, -3.7))
            .await
            .unwrap();
        let second = rounds.score_round(42, Coordinate::new(48.8, 2.3)).await;
        assert!(matches!(second, Err(GameError::RoundNotFound { object_id: 42 })));
    }

    #[tokio::test]
    async fn test_scored_round_is_not_reconstructed() {
        let object = MuseumObject {
            object_id: 42,
            is_public_domain: true,
            primary_image: "https://images.example.org/42.jpg".to_string(),
            country: "France".to_string(),
            ..MuseumObject::default()
        };
        let rounds = RoundStore::new(
            Arc::new(OneObjectMuseum::with(object)),
            chrono::Duration::minutes(120),
            16,
        );
        rounds.start_round(&candidate(42, Coordinate::new(48.8, 2.3)));

        rounds.score_round(42, Coordinate::new(0.0, 0.0)).await.unwrap();
        assert!(rounds.score_round(42, Coordinate::new(0.0, 0.0)).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_round_is_reconstructed_from_museum() {
        let object = MuseumObject {
            object_id: 7,
            is_public_domain: true,
            primary_image: "https://images.example.org/7.jpg".to_string(),
            title: "Vase".to_string(),
            country: "Japan".to_string(),
            ..MuseumObject::default()
        };
        let museum = Arc::new(OneObjectMuseum::with(object));
        let rounds = RoundStore::new(museum.clone(), chrono::Duration::minutes(120), 16);
        let japan = crate::core::centroids::get_centroid("Japan").unwrap();

        let result = rounds.score_round(7, japan).await.unwrap();
        assert_eq!(result.score, MAX_SCORE);
        assert_eq!(result.object.title, "Vase");
        assert_eq!(result.object.artist, "Unknown Artist");

        // 重建後也只能計分一次
        assert!(rounds.score_round(7, japan).await.is_err());
        assert_eq!(museum.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_reconstruction_is_not_found() {
        let museum = Arc::new(OneObjectMuseum::empty());
        let rounds = RoundStore::new(museum.clone(), chrono::Duration::minutes(120), 16);

        for _ in 0..2 {
            let result = rounds.score_round(99, Coordinate::new(0.0, 0.0)).await;
            assert!(matches!(result, Err(GameError::RoundNotFound { object_id: 99 })));
        }
        // 失敗的重建不會留下已計分標記
        assert_eq!(museum.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_restarting_round_allows_scoring_again() {
        let rounds = store(OneObjectMuseum::empty());
        let target = Coordinate::new(35.0, 139.0);
        rounds.start_round(&candidate(5, target));
        rounds.score_round(5, target).await.unwrap();

        rounds.start_round(&candidate(5, target));
        assert!(rounds.score_round(5, target).await.is_ok());
    }

    #[test]
    fn test_stale_rounds_are_purged() {
        let rounds = store(OneObjectMuseum::empty());
        let now = Utc::now();
        rounds.start_round_at(
            &candidate(1, Coordinate::new(0.0, 0.0)),
            now - chrono::Duration::minutes(121),
        );
        rounds.start_round_at(
            &candidate(2, Coordinate::new(0.0, 0.0)),
            now - chrono::Duration::minutes(30),
        );
        assert_eq!(rounds.active_rounds(), 2);

        rounds.start_round_at(&candidate(3, Coordinate::new(0.0, 0.0)), now);
        assert_eq!(rounds.active_rounds(), 2);
        assert!(!lock(&rounds.entries).contains_key(&1));
    }

    #[tokio::test]
    async fn test_emergency_rounds_rebuild_to_their_own_country() {
        use crate::core::candidates::{CandidateProvider, EmergencySource};

        let catalogue = CandidateProvider::new(Vec::new(), EmergencySource::builtin()).catalogue();
        assert!(!catalogue.is_empty());

        let museum = Arc::new(OneObjectMuseum::empty());
        let rounds = RoundStore::new(museum.clone(), chrono::Duration::minutes(120), 16)
            .with_catalogue(catalogue.clone());

        for (object_id, known) in &catalogue {
            let result = rounds.score_round(*object_id, known.target).await.unwrap();
            assert_eq!(result.score, MAX_SCORE);
            assert_eq!(result.object.country, known.details.country);
            assert_eq!(Some(result.target), crate::core::centroids::get_centroid(&known.details.country));
        }
        // 全部由固定清單重建，沒有呼叫上游
        assert_eq!(museum.fetches.load(Ordering::SeqCst), 0);
    }
}
