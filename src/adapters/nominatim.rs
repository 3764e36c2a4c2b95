use crate::config::toml_config::GeocoderConfig;
use crate::domain::model::Coordinate;
use crate::domain::ports::Geocoder;
use crate::utils::error::{GameError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// OpenStreetMap Nominatim 反向地理編碼
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    cache: Mutex<LruCache<String, Option<String>>>,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct Address {
    #[serde(default)]
    country: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration, cache_size: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            client: Client::builder()
                .user_agent(user_agent)
                .timeout(timeout)
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn from_config(config: &GeocoderConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            &config.user_agent,
            Duration::from_secs(config.timeout_seconds),
            config.cache_size,
        )
    }

    fn cache_key(point: Coordinate) -> String {
        format!("{:.4},{:.4}", point.lat, point.lng)
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, point: Coordinate) -> Result<Option<String>> {
        let key = Self::cache_key(point);
        if let Some(cached) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(cached.clone());
        }

        let response = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "json".to_string()),
                ("lat", point.lat.to_string()),
                ("lon", point.lng.to_string()),
                ("zoom", "3".to_string()),
                ("addressdetails", "1".to_string()),
                ("accept-language", "en".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GameError::UpstreamStatus {
                status: status.as_u16(),
                url: format!("{}/reverse", self.base_url),
            });
        }

        let body: ReverseResponse = response.json().await?;
        let country = body
            .address
            .and_then(|address| address.country)
            .map(|country| country.trim().to_string())
            .filter(|country| !country.is_empty());

        // 只快取成功的查詢結果
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, country.clone());

        Ok(country)
    }
}
