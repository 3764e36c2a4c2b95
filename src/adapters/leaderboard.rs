use crate::config::toml_config::{LeaderboardBackend, LeaderboardConfig};
use crate::domain::model::LeaderboardEntry;
use crate::domain::ports::LeaderboardStore;
use crate::utils::error::{GameError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// 依設定選擇排行榜儲存後端
pub fn from_config(config: &LeaderboardConfig) -> Result<Arc<dyn LeaderboardStore>> {
    match config.backend {
        LeaderboardBackend::Memory => {
            tracing::info!("🏆 Using in-memory leaderboard (not shared across instances)");
            Ok(Arc::new(InMemoryLeaderboard::default()))
        }
        LeaderboardBackend::Upstash => {
            let url = config.url.as_deref().ok_or_else(|| GameError::MissingConfigError {
                field: "leaderboard.url".to_string(),
            })?;
            let token = config.token.as_deref().ok_or_else(|| GameError::MissingConfigError {
                field: "leaderboard.token".to_string(),
            })?;
            tracing::info!("🏆 Using Upstash leaderboard at {}", url);
            Ok(Arc::new(UpstashLeaderboard::new(
                url,
                token,
                &config.key,
                Duration::from_secs(config.timeout_seconds),
            )?))
        }
    }
}

/// 程序內的有序集合；同分時依名稱反向排序 (與 sorted set 的 REV 範圍一致)
#[derive(Default)]
pub struct InMemoryLeaderboard {
    scores: Mutex<HashMap<String, f64>>,
}

impl InMemoryLeaderboard {
    fn sorted(scores: &HashMap<String, f64>) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = scores
            .iter()
            .map(|(name, score)| LeaderboardEntry {
                name: name.clone(),
                score: *score,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.name.cmp(&a.name))
        });
        entries
    }
}

#[async_trait]
impl LeaderboardStore for InMemoryLeaderboard {
    async fn add(&self, name: &str, score: f64) -> Result<()> {
        let mut scores = self.scores.lock().unwrap_or_else(PoisonError::into_inner);
        scores.insert(name.to_string(), score);
        Ok(())
    }

    async fn trim_to(&self, keep: usize) -> Result<()> {
        let mut scores = self.scores.lock().unwrap_or_else(PoisonError::into_inner);
        let dropped: Vec<String> = Self::sorted(&scores)
            .into_iter()
            .skip(keep)
            .map(|entry| entry.name)
            .collect();
        for name in dropped {
            scores.remove(&name);
        }
        Ok(())
    }

    async fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let scores = self.scores.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Self::sorted(&scores).into_iter().take(limit).collect())
    }
}

/// Upstash Redis REST API 後端
pub struct UpstashLeaderboard {
    client: Client,
    url: String,
    token: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct UpstashResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl UpstashLeaderboard {
    pub fn new(url: &str, token: &str, key: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            key: key.to_string(),
        })
    }

    async fn command(&self, args: &[String]) -> Result<Value> {
        let command_name = args.first().map(String::as_str).unwrap_or_default();
        tracing::debug!("Upstash command {} on '{}'", command_name, self.key);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(args)
            .send()
            .await
            .map_err(|e| GameError::store(format!("{} request failed: {}", command_name, e)))?;

        let status = response.status();
        let body: UpstashResponse = response
            .json()
            .await
            .map_err(|e| GameError::store(format!("{} returned HTTP {}: {}", command_name, status, e)))?;

        if let Some(error) = body.error {
            return Err(GameError::store(format!("{} failed: {}", command_name, error)));
        }
        if !status.is_success() {
            return Err(GameError::store(format!("{} returned HTTP {}", command_name, status)));
        }

        Ok(body.result.unwrap_or(Value::Null))
    }

    /// `ZRANGE ... WITHSCORES` 回傳 [member, score, member, score, ...]
    fn parse_scored_members(result: Value) -> Result<Vec<LeaderboardEntry>> {
        let items = match result {
            Value::Array(items) => items,
            Value::Null => return Ok(Vec::new()),
            other => {
                return Err(GameError::store(format!(
                    "Unexpected ZRANGE result: {}",
                    other
                )))
            }
        };

        items
            .chunks(2)
            .map(|pair| {
                let name = match pair.first() {
                    Some(Value::String(name)) => name.clone(),
                    other => return Err(GameError::store(format!("Invalid member: {:?}", other))),
                };
                let score = match pair.get(1) {
                    Some(Value::String(raw)) => raw.parse::<f64>().ok(),
                    Some(Value::Number(number)) => number.as_f64(),
                    _ => None,
                }
                .ok_or_else(|| GameError::store(format!("Missing score for member '{}'", name)))?;
                Ok(LeaderboardEntry { name, score })
            })
            .collect()
    }
}

#[async_trait]
impl LeaderboardStore for UpstashLeaderboard {
    async fn add(&self, name: &str, score: f64) -> Result<()> {
        self.command(&[
            "ZADD".to_string(),
            self.key.clone(),
            score.to_string(),
            name.to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn trim_to(&self, keep: usize) -> Result<()> {
        let stop = -(keep as i64) - 1;
        self.command(&[
            "ZREMRANGEBYRANK".to_string(),
            self.key.clone(),
            "0".to_string(),
            stop.to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let result = self
            .command(&[
                "ZRANGE".to_string(),
                self.key.clone(),
                "0".to_string(),
                (limit - 1).to_string(),
                "REV".to_string(),
                "WITHSCORES".to_string(),
            ])
            .await?;
        Self::parse_scored_members(result)
    }
}
