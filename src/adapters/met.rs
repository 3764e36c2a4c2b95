use crate::config::toml_config::{CircuitBreakerConfig, MuseumConfig};
use crate::core::circuit_breaker::CircuitBreaker;
use crate::core::rate_limiter::TokenBucket;
use crate::core::retry::RetryPolicy;
use crate::domain::model::{MuseumObject, SearchQuery, SearchResponse};
use crate::domain::ports::MuseumApi;
use crate::utils::error::{GameError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Met Collection API 客戶端：限流、斷路器、逾時與指數退避重試
pub struct MetClient {
    client: Client,
    base_url: String,
    limiter: Arc<TokenBucket>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
}

impl MetClient {
    pub fn new(
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
        limiter: Arc<TokenBucket>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter,
            breaker,
            retry,
        })
    }

    /// 依設定建立客戶端並啟動 token bucket (需在 tokio runtime 內)
    pub fn from_config(museum: &MuseumConfig, breaker: &CircuitBreakerConfig) -> Result<Self> {
        let limiter = TokenBucket::start(museum.requests_per_second, museum.rate_tick());
        let breaker = if breaker.enabled {
            CircuitBreaker::new(
                breaker.failure_threshold,
                Duration::from_secs(breaker.cooldown_seconds),
            )
        } else {
            CircuitBreaker::disabled()
        };
        let retry = RetryPolicy::new(museum.retry_attempts, museum.retry_delay());

        Self::new(
            &museum.base_url,
            &museum.user_agent,
            museum.timeout(),
            limiter,
            Arc::new(breaker),
            retry,
        )
    }

    #[cfg(test)]
    fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse_with_params(&raw, params).map_err(|e| GameError::ConfigError {
            message: format!("Invalid museum URL '{}': {}", raw, e),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.breaker.check()?;
            self.limiter.acquire().await?;

            tracing::debug!("Museum API request (attempt {}): {}", attempt, url);
            match self.send_once(&url).await {
                Ok(value) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    self.breaker.record_failure();
                    match self.retry.delay_after(attempt) {
                        Some(delay) => {
                            tracing::warn!(
                                "Museum API failed: {}, retrying in {:?} (attempt {}/{})",
                                e,
                                delay,
                                attempt,
                                self.retry.max_attempts
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            tracing::warn!(
                                "Museum API gave up after {} attempts: {} (breaker {:?})",
                                attempt,
                                e,
                                self.breaker.state()
                            );
                            return Err(e);
                        }
                    }
                }
                Err(e) => {
                    // 上游有回應 (4xx、格式錯誤)，不算斷路器失敗
                    self.breaker.record_success();
                    return Err(e);
                }
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let map_transport = |e: reqwest::Error| {
            if e.is_timeout() {
                GameError::UpstreamTimeout {
                    url: url.to_string(),
                }
            } else {
                GameError::HttpError(e)
            }
        };

        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GameError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await.map_err(map_transport)?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl MuseumApi for MetClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<u64>> {
        let mut params = vec![("hasImages", "true"), ("q", query.q.as_str())];
        if let Some(country) = &query.geo_location {
            params.push(("geoLocation", country.as_str()));
        }
        if query.paintings_only {
            params.push(("medium", "Paintings"));
        }

        let url = self.endpoint("search", &params)?;
        let response: SearchResponse = self.get_json(url).await?;
        let ids = response.object_ids.unwrap_or_default();
        tracing::debug!("Search '{}' returned {} object ids", query.q, ids.len());
        Ok(ids)
    }

    async fn fetch_object(&self, object_id: u64) -> Result<MuseumObject> {
        let url = self.endpoint(&format!("objects/{}", object_id), &[])?;
        self.get_json(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::circuit_breaker::BreakerState;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer, breaker: CircuitBreaker, timeout: Duration) -> MetClient {
        MetClient::new(
            &server.base_url(),
            "ArtGuessr-test",
            timeout,
            TokenBucket::start(100, Duration::from_secs(1)),
            Arc::new(breaker),
            RetryPolicy::new(3, Duration::from_millis(1)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_object_parses_record() {
        let server = MockServer::start();
        let object_mock = server.mock(|when, then| {
            when.method(GET).path("/objects/45434");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "objectID": 45434,
                    "isPublicDomain": true,
                    "primaryImage": "https://images.example.org/large.jpg",
                    "primaryImageSmall": "https://images.example.org/small.jpg",
                    "title": "Under the Wave off Kanagawa",
                    "artistDisplayName": "Katsushika Hokusai",
                    "objectDate": "ca. 1830–32",
                    "country": "Japan",
                    "medium": "Polychrome woodblock print",
                    "department": "Asian Art"
                }));
        });

        let client = client_for(&server, CircuitBreaker::disabled(), Duration::from_secs(5));
        let object = client.fetch_object(45434).await.unwrap();

        object_mock.assert();
        assert_eq!(object.object_id, 45434);
        assert_eq!(object.country, "Japan");
        assert_eq!(object.artist_display_name, "Katsushika Hokusai");
    }

    #[tokio::test]
    async fn test_search_sends_query_parameters() {
        let server = MockServer::start();
        let search_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/search")
                .query_param("hasImages", "true")
                .query_param("q", "bronze")
                .query_param("geoLocation", "China")
                .query_param("medium", "Paintings");
            then.status(200)
                .json_body(serde_json::json!({"total": 3, "objectIDs": [1, 2, 3]}));
        });

        let client = client_for(&server, CircuitBreaker::disabled(), Duration::from_secs(5));
        let query = SearchQuery::new("bronze")
            .with_geo_location("China")
            .paintings(true);
        let ids = client.search(&query).await.unwrap();

        search_mock.assert();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_search_with_null_ids_is_empty() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(200)
                .json_body(serde_json::json!({"total": 0, "objectIDs": null}));
        });

        let client = client_for(&server, CircuitBreaker::disabled(), Duration::from_secs(5));
        let ids = client.search(&SearchQuery::new("zzz")).await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_reported() {
        let server = MockServer::start();
        let failing = server.mock(|when, then| {
            when.method(GET).path("/objects/1");
            then.status(503);
        });

        let client = client_for(&server, CircuitBreaker::disabled(), Duration::from_secs(5));
        let result = client.fetch_object(1).await;

        failing.assert_hits(3);
        assert!(matches!(
            result,
            Err(GameError::UpstreamStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start();
        let missing = server.mock(|when, then| {
            when.method(GET).path("/objects/999999999");
            then.status(404)
                .json_body(serde_json::json!({"message": "Not a valid object"}));
        });

        let client = client_for(&server, CircuitBreaker::disabled(), Duration::from_secs(5));
        let result = client.fetch_object(999999999).await;

        missing.assert_hits(1);
        assert!(matches!(
            result,
            Err(GameError::UpstreamStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_retried() {
        let server = MockServer::start();
        let garbled = server.mock(|when, then| {
            when.method(GET).path("/objects/8");
            then.status(200)
                .header("Content-Type", "text/html")
                .body("<html>not json</html>");
        });

        // 門檻 1：只要記一次失敗就會開啟
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        let client = client_for(&server, breaker, Duration::from_secs(5));

        let result = client.fetch_object(8).await;
        assert!(matches!(result, Err(GameError::SerializationError(_))));
        garbled.assert_hits(1);
        assert_eq!(client.breaker().state(), BreakerState::Closed);

        assert!(client.fetch_object(8).await.is_err());
        garbled.assert_hits(2);
    }

    #[tokio::test]
    async fn test_circuit_breaker_stops_upstream_calls() {
        let server = MockServer::start();
        let failing = server.mock(|when, then| {
            when.method(GET).path("/objects/7");
            then.status(500);
        });

        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        let client = client_for(&server, breaker, Duration::from_secs(5));

        let first = client.fetch_object(7).await;
        assert!(matches!(first, Err(GameError::CircuitOpen { .. })));
        assert_eq!(client.breaker().state(), BreakerState::Open);

        let second = client.fetch_object(7).await;
        assert!(matches!(second, Err(GameError::CircuitOpen { .. })));

        // 斷路器開啟後不再打到上游
        failing.assert_hits(2);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failed_attempt() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/objects/3");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(serde_json::json!({"objectID": 3}));
        });

        let client = client_for(&server, CircuitBreaker::disabled(), Duration::from_millis(50));
        let result = client.fetch_object(3).await;

        assert!(matches!(result, Err(GameError::UpstreamTimeout { .. })));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let server = MockServer::start();
        let mut failing = server.mock(|when, then| {
            when.method(GET).path("/objects/5");
            then.status(502);
        });

        let client = client_for(&server, CircuitBreaker::new(5, Duration::from_secs(60)), Duration::from_secs(5));
        assert!(client.fetch_object(5).await.is_err());
        failing.delete();

        server.mock(|when, then| {
            when.method(GET).path("/objects/5");
            then.status(200)
                .json_body(serde_json::json!({"objectID": 5, "isPublicDomain": true}));
        });

        let object = client.fetch_object(5).await.unwrap();
        assert_eq!(object.object_id, 5);
        assert_eq!(client.breaker().state(), BreakerState::Closed);
    }
}
