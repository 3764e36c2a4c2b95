use crate::domain::model::{Coordinate, LeaderboardEntry, MuseumObject, SearchQuery};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 博物館收藏 API
#[async_trait]
pub trait MuseumApi: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<u64>>;
    async fn fetch_object(&self, object_id: u64) -> Result<MuseumObject>;
}

/// 外部有序集合 (sorted set) 排行榜
#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// 新增或覆寫成員分數
    async fn add(&self, name: &str, score: f64) -> Result<()>;
    /// 只保留分數最高的 `keep` 筆
    async fn trim_to(&self, keep: usize) -> Result<()>;
    /// 依分數由高到低取前 `limit` 筆
    async fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>>;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// 反向地理編碼，回傳國家名稱 (海上等無國家時為 None)
    async fn reverse(&self, point: Coordinate) -> Result<Option<String>>;
}
