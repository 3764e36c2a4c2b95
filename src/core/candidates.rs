use crate::config::toml_config::{FallbackConfig, MuseumConfig};
use crate::core::centroids::get_centroid;
use crate::domain::model::{ArtworkCandidate, ArtworkDetails, MuseumObject, SearchQuery};
use crate::domain::ports::MuseumApi;
use crate::utils::error::{GameError, Result};
use async_trait::async_trait;
use lru::LruCache;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

fn reject(object: &MuseumObject, reason: impl Into<String>) -> GameError {
    GameError::Rejected {
        object_id: object.object_id,
        reason: reason.into(),
    }
}

fn or_default(value: &str, default: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

/// 驗證上游作品：公有領域、有圖片、有國家、國家可對應到座標
pub fn accept_object(object: &MuseumObject) -> Result<ArtworkCandidate> {
    if !object.is_public_domain {
        return Err(reject(object, "not public domain"));
    }

    let image_url = [&object.primary_image_small, &object.primary_image]
        .into_iter()
        .map(|url| url.trim())
        .find(|url| !url.is_empty())
        .ok_or_else(|| reject(object, "no image"))?;

    let country = object.country.trim();
    if country.is_empty() {
        return Err(reject(object, "no country"));
    }

    let target = get_centroid(country)
        .ok_or_else(|| reject(object, format!("no country centroid for \"{}\"", country)))?;

    let medium = object.medium.trim();
    Ok(ArtworkCandidate {
        details: ArtworkDetails {
            object_id: object.object_id,
            image_url: image_url.to_string(),
            title: or_default(&object.title, "Untitled"),
            artist: or_default(&object.artist_display_name, "Unknown Artist"),
            year: or_default(&object.object_date, "Unknown Date"),
            country: country.to_string(),
            medium: (!medium.is_empty()).then(|| medium.to_string()),
        },
        target,
    })
}

fn pick<T: Clone>(items: &[T]) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    let index = rand::rng().random_range(0..items.len());
    Some(items[index].clone())
}

/// 已接受的作品快取 (依 object id)，live 與 pool 來源共用
pub struct CandidateCache {
    inner: Mutex<LruCache<u64, ArtworkCandidate>>,
}

impl CandidateCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, object_id: u64) -> Option<ArtworkCandidate> {
        self.lock().get(&object_id).cloned()
    }

    pub fn insert(&self, candidate: ArtworkCandidate) {
        self.lock().put(candidate.object_id(), candidate);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<u64, ArtworkCandidate>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
pub trait CandidateSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn next_candidate(&self) -> Result<ArtworkCandidate>;

    /// 固定清單來源的全部項目；回合重建時優先查這裡
    fn catalogue(&self) -> &[ArtworkCandidate] {
        &[]
    }
}

struct CachedIds {
    ids: Arc<Vec<u64>>,
    fetched_at: Instant,
}

/// 即時來源：從上游 id 清單隨機挑選並驗證
pub struct LiveSource {
    museum: Arc<dyn MuseumApi>,
    memo: Arc<CandidateCache>,
    query: SearchQuery,
    id_ttl: Duration,
    attempts: u32,
    ids: tokio::sync::Mutex<Option<CachedIds>>,
}

impl LiveSource {
    pub fn new(
        museum: Arc<dyn MuseumApi>,
        memo: Arc<CandidateCache>,
        query: SearchQuery,
        id_ttl: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            museum,
            memo,
            query,
            id_ttl,
            attempts: attempts.max(1),
            ids: tokio::sync::Mutex::new(None),
        }
    }

    /// 取得 id 清單；過期才重新查詢，查詢失敗時沿用舊清單
    async fn object_ids(&self) -> Result<Arc<Vec<u64>>> {
        let mut cached = self.ids.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < self.id_ttl {
                return Ok(entry.ids.clone());
            }
        }

        match self.museum.search(&self.query).await {
            Ok(ids) if !ids.is_empty() => {
                tracing::info!("🔎 Cached {} object ids from museum search", ids.len());
                let ids = Arc::new(ids);
                *cached = Some(CachedIds {
                    ids: ids.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(ids)
            }
            result => {
                let error = match result {
                    Err(e) => e,
                    Ok(_) => GameError::NoCandidate {
                        message: format!("search '{}' returned no object ids", self.query.q),
                    },
                };
                match cached.as_ref() {
                    Some(stale) => {
                        tracing::warn!("Object id refresh failed ({}), reusing stale ids", error);
                        Ok(stale.ids.clone())
                    }
                    None => Err(error),
                }
            }
        }
    }
}

#[async_trait]
impl CandidateSource for LiveSource {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn next_candidate(&self) -> Result<ArtworkCandidate> {
        let ids = self.object_ids().await?;

        for attempt in 1..=self.attempts {
            let Some(object_id) = pick(&ids) else {
                break;
            };
            tracing::debug!("Attempt {}: trying object id {}", attempt, object_id);

            if let Some(cached) = self.memo.get(object_id) {
                tracing::debug!("Using cached object: {}", cached.details.title);
                return Ok(cached);
            }

            match self.museum.fetch_object(object_id).await {
                Ok(object) => match accept_object(&object) {
                    Ok(candidate) => {
                        self.memo.insert(candidate.clone());
                        return Ok(candidate);
                    }
                    Err(e) => tracing::debug!("Skipping: {}", e),
                },
                Err(e @ GameError::CircuitOpen { .. }) => return Err(e),
                Err(e) => tracing::warn!("Object {} fetch failed: {}", object_id, e),
            }
        }

        Err(GameError::NoCandidate {
            message: format!("no valid object after {} attempts", self.attempts),
        })
    }
}

/// 預先產生的靜態作品清單
pub struct StaticSource {
    entries: Vec<ArtworkCandidate>,
}

impl StaticSource {
    /// 從作品資訊建立；沒有國家座標的項目會被略過
    pub fn from_details(details: Vec<ArtworkDetails>) -> Self {
        let total = details.len();
        let entries: Vec<ArtworkCandidate> = details
            .into_iter()
            .filter_map(|details| {
                get_centroid(&details.country).map(|target| ArtworkCandidate { details, target })
            })
            .collect();

        if entries.len() < total {
            tracing::debug!(
                "Dropped {} static entries without a country centroid",
                total - entries.len()
            );
        }
        Self { entries }
    }

    /// 讀取 JSON 檔；檔案不存在或格式錯誤時回傳空清單
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let parsed = std::fs::read_to_string(path)
            .map_err(GameError::from)
            .and_then(|content| Ok(serde_json::from_str::<Vec<ArtworkDetails>>(&content)?));

        match parsed {
            Ok(details) => {
                let source = Self::from_details(details);
                tracing::info!(
                    "📚 Loaded {} static fallback artworks from {}",
                    source.entries.len(),
                    path.display()
                );
                source
            }
            Err(e) => {
                tracing::warn!(
                    "Static fallback list {} unavailable: {}",
                    path.display(),
                    e
                );
                Self {
                    entries: Vec::new(),
                }
            }
        }
    }

}

#[async_trait]
impl CandidateSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    fn catalogue(&self) -> &[ArtworkCandidate] {
        &self.entries
    }

    async fn next_candidate(&self) -> Result<ArtworkCandidate> {
        pick(&self.entries).ok_or_else(|| GameError::NoCandidate {
            message: "static fallback list is empty".to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub search_terms: Vec<String>,
    pub max_searches: usize,
    pub ids_per_search: usize,
    pub pool_size: usize,
    pub ttl: Duration,
}

impl From<&FallbackConfig> for PoolSettings {
    fn from(config: &FallbackConfig) -> Self {
        Self {
            search_terms: config.pool_search_terms.clone(),
            max_searches: config.pool_max_searches,
            ids_per_search: config.pool_ids_per_search,
            pool_size: config.pool_size,
            ttl: config.pool_ttl(),
        }
    }
}

struct BuiltPool {
    candidates: Vec<ArtworkCandidate>,
    built_at: Instant,
}

/// 動態候選池：每個 TTL 期間以一批有限的上游搜尋組出一次
pub struct DynamicPoolSource {
    museum: Arc<dyn MuseumApi>,
    memo: Arc<CandidateCache>,
    settings: PoolSettings,
    pool: tokio::sync::Mutex<Option<BuiltPool>>,
}

impl DynamicPoolSource {
    pub fn new(museum: Arc<dyn MuseumApi>, memo: Arc<CandidateCache>, settings: PoolSettings) -> Self {
        Self {
            museum,
            memo,
            settings,
            pool: tokio::sync::Mutex::new(None),
        }
    }

    async fn collect_ids(&self) -> Vec<u64> {
        let mut terms = self.settings.search_terms.clone();
        terms.shuffle(&mut rand::rng());

        let mut ids = Vec::new();
        for (index, term) in terms.iter().take(self.settings.max_searches).enumerate() {
            // 每五次搜尋有一次限定畫作
            let query = SearchQuery::new(term.as_str()).paintings(index % 5 == 4);
            match self.museum.search(&query).await {
                Ok(mut found) => {
                    found.shuffle(&mut rand::rng());
                    found.truncate(self.settings.ids_per_search);
                    ids.extend(found);
                }
                Err(e @ GameError::CircuitOpen { .. }) => {
                    tracing::warn!("Pool search stopped: {}", e);
                    break;
                }
                Err(e) => tracing::warn!("Pool search '{}' failed: {}", term, e),
            }
        }

        ids.sort_unstable();
        ids.dedup();
        ids.shuffle(&mut rand::rng());
        ids
    }

    async fn build(&self) -> Vec<ArtworkCandidate> {
        let ids = self.collect_ids().await;
        let budget = self.settings.pool_size.saturating_mul(3);
        let mut candidates = Vec::new();

        for object_id in ids.into_iter().take(budget) {
            if candidates.len() >= self.settings.pool_size {
                break;
            }
            if let Some(cached) = self.memo.get(object_id) {
                candidates.push(cached);
                continue;
            }
            match self.museum.fetch_object(object_id).await {
                Ok(object) => {
                    if let Ok(candidate) = accept_object(&object) {
                        self.memo.insert(candidate.clone());
                        candidates.push(candidate);
                    }
                }
                Err(e @ GameError::CircuitOpen { .. }) => {
                    tracing::warn!("Pool build stopped: {}", e);
                    break;
                }
                Err(e) => tracing::debug!("Pool object {} failed: {}", object_id, e),
            }
        }

        tracing::info!("🧺 Built dynamic candidate pool with {} artworks", candidates.len());
        candidates
    }
}

#[async_trait]
impl CandidateSource for DynamicPoolSource {
    fn name(&self) -> &'static str {
        "pool"
    }

    async fn next_candidate(&self) -> Result<ArtworkCandidate> {
        let mut pool = self.pool.lock().await;

        let fresh = pool
            .as_ref()
            .is_some_and(|built| built.built_at.elapsed() < self.settings.ttl);
        if !fresh {
            let candidates = self.build().await;
            if !candidates.is_empty() {
                *pool = Some(BuiltPool {
                    candidates,
                    built_at: Instant::now(),
                });
            }
        }

        pool.as_ref()
            .and_then(|built| pick(&built.candidates))
            .ok_or_else(|| GameError::NoCandidate {
                message: "dynamic pool is empty".to_string(),
            })
    }
}

const EMERGENCY_ARTWORKS: &[(u64, &str, &str, &str, &str, &str)] = &[
    (
        436535,
        "https://images.metmuseum.org/CRDImages/ep/original/DT1567.jpg",
        "Wheat Field with Cypresses",
        "Vincent van Gogh",
        "1889",
        "Netherlands",
    ),
    (
        436532,
        "https://images.metmuseum.org/CRDImages/ep/original/DT1502_cropped2.jpg",
        "Self-Portrait with a Straw Hat",
        "Vincent van Gogh",
        "1887",
        "Netherlands",
    ),
    (
        45434,
        "https://images.metmuseum.org/CRDImages/as/original/DP130155.jpg",
        "Under the Wave off Kanagawa",
        "Katsushika Hokusai",
        "ca. 1830–32",
        "Japan",
    ),
    (
        438754,
        "https://images.metmuseum.org/CRDImages/ep/original/DP-14286-001.jpg",
        "Madonna and Child",
        "Duccio di Buoninsegna",
        "ca. 1290–1300",
        "Italy",
    ),
    (
        437869,
        "https://images.metmuseum.org/CRDImages/ep/original/DT1590.jpg",
        "Juan de Pareja",
        "Velázquez",
        "1650",
        "Spain",
    ),
];

/// 寫死的緊急清單，永遠是最後一個來源
pub struct EmergencySource {
    entries: Vec<ArtworkCandidate>,
}

impl EmergencySource {
    pub fn builtin() -> Self {
        let details = EMERGENCY_ARTWORKS
            .iter()
            .map(|(id, image, title, artist, year, country)| ArtworkDetails {
                object_id: *id,
                image_url: image.to_string(),
                title: title.to_string(),
                artist: artist.to_string(),
                year: year.to_string(),
                country: country.to_string(),
                medium: None,
            })
            .collect();
        Self::from_candidates(StaticSource::from_details(details).entries)
    }

    pub fn from_candidates(entries: Vec<ArtworkCandidate>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl CandidateSource for EmergencySource {
    fn name(&self) -> &'static str {
        "emergency"
    }

    fn catalogue(&self) -> &[ArtworkCandidate] {
        &self.entries
    }

    async fn next_candidate(&self) -> Result<ArtworkCandidate> {
        pick(&self.entries).ok_or_else(|| GameError::NoCandidate {
            message: "every candidate source is exhausted".to_string(),
        })
    }
}

/// 依序嘗試各來源，緊急清單墊底
pub struct CandidateProvider {
    sources: Vec<Arc<dyn CandidateSource>>,
    emergency: EmergencySource,
}

impl CandidateProvider {
    pub fn new(sources: Vec<Arc<dyn CandidateSource>>, emergency: EmergencySource) -> Self {
        Self { sources, emergency }
    }

    /// 依 `fallback.order` 組出來源鏈
    pub fn from_config(
        museum_config: &MuseumConfig,
        fallback: &FallbackConfig,
        museum: Arc<dyn MuseumApi>,
    ) -> Self {
        let memo = Arc::new(CandidateCache::new(museum_config.object_cache_size));
        let mut sources: Vec<Arc<dyn CandidateSource>> = Vec::new();

        for name in &fallback.order {
            match name.as_str() {
                "live" => sources.push(Arc::new(LiveSource::new(
                    museum.clone(),
                    memo.clone(),
                    SearchQuery::new(museum_config.live_query.as_str()),
                    museum_config.id_cache_ttl(),
                    museum_config.selection_attempts,
                ))),
                "static" => {
                    let source = match &fallback.static_path {
                        Some(path) => StaticSource::from_file(path),
                        None => StaticSource::from_details(Vec::new()),
                    };
                    sources.push(Arc::new(source));
                }
                "pool" => sources.push(Arc::new(DynamicPoolSource::new(
                    museum.clone(),
                    memo.clone(),
                    PoolSettings::from(fallback),
                ))),
                other => tracing::warn!("Ignoring unknown candidate source '{}'", other),
            }
        }

        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        tracing::info!("🎨 Candidate sources: {} → emergency", names.join(" → "));

        Self::new(sources, EmergencySource::builtin())
    }

    /// 固定清單 (靜態與緊急) 依 object id 建立索引
    pub fn catalogue(&self) -> HashMap<u64, ArtworkCandidate> {
        let configured = self.sources.iter().flat_map(|source| source.catalogue().iter());
        self.emergency
            .catalogue()
            .iter()
            .chain(configured)
            .map(|candidate| (candidate.object_id(), candidate.clone()))
            .collect()
    }

    pub async fn random_candidate(&self) -> Result<ArtworkCandidate> {
        for source in &self.sources {
            match source.next_candidate().await {
                Ok(candidate) => {
                    tracing::info!(
                        "🖼️ {} source picked \"{}\" from {}",
                        source.name(),
                        candidate.details.title,
                        candidate.details.country
                    );
                    return Ok(candidate);
                }
                Err(e) => tracing::warn!("{} source failed: {}", source.name(), e),
            }
        }

        let candidate = self.emergency.next_candidate().await?;
        tracing::warn!(
            "🚨 Serving emergency artwork \"{}\"",
            candidate.details.title
        );
        Ok(candidate)
    }
}
