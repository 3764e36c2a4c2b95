use crate::utils::error::{GameError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const SOURCE_NAMES: &[&str] = &["live", "static", "pool"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub museum: MuseumConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub fallback: FallbackConfig,
    pub rounds: RoundsConfig,
    pub leaderboard: LeaderboardConfig,
    pub geocoder: GeocoderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 空陣列代表允許所有來源
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MuseumConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub requests_per_second: u32,
    pub rate_tick_ms: u64,
    pub id_cache_hours: u64,
    pub live_query: String,
    pub selection_attempts: u32,
    pub object_cache_size: usize,
}

impl Default for MuseumConfig {
    fn default() -> Self {
        Self {
            base_url: "https://collectionapi.metmuseum.org/public/collection/v1".to_string(),
            user_agent: "ArtGuessr/1.0 (Educational Game)".to_string(),
            timeout_seconds: 15,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            requests_per_second: 80,
            rate_tick_ms: 1000,
            id_cache_hours: 24,
            live_query: "the".to_string(),
            selection_attempts: 10,
            object_cache_size: 500,
        }
    }
}

impl MuseumConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn rate_tick(&self) -> Duration {
        Duration::from_millis(self.rate_tick_ms)
    }

    pub fn id_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.id_cache_hours.saturating_mul(60 * 60))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub cooldown_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            cooldown_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// 來源嘗試順序；緊急清單永遠排在最後
    pub order: Vec<String>,
    pub static_path: Option<String>,
    pub pool_size: usize,
    pub pool_ttl_minutes: u64,
    pub pool_max_searches: usize,
    pub pool_ids_per_search: usize,
    pub pool_search_terms: Vec<String>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            order: SOURCE_NAMES.iter().map(|s| s.to_string()).collect(),
            static_path: Some("data/fallback_artworks.json".to_string()),
            pool_size: 20,
            pool_ttl_minutes: 60,
            pool_max_searches: 6,
            pool_ids_per_search: 20,
            pool_search_terms: [
                "art", "sculpture", "ceramic", "textile", "print", "metal", "wood", "glass",
                "bronze", "silver", "gold", "ivory",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl FallbackConfig {
    pub fn pool_ttl(&self) -> Duration {
        Duration::from_secs(self.pool_ttl_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundsConfig {
    pub max_age_minutes: i64,
    /// 記住多少個已計分的作品 id，避免同一回合被重建後重複計分
    pub scored_memory: usize,
}

impl Default for RoundsConfig {
    fn default() -> Self {
        Self {
            max_age_minutes: 120,
            scored_memory: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardBackend {
    #[default]
    Memory,
    Upstash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    pub backend: LeaderboardBackend,
    pub url: Option<String>,
    pub token: Option<String>,
    pub key: String,
    pub size: usize,
    pub timeout_seconds: u64,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            backend: LeaderboardBackend::Memory,
            url: None,
            token: None,
            key: "leaderboard".to_string(),
            size: 10,
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub enabled: bool,
    pub base_url: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// 反向地理編碼快取筆數上限
    pub cache_size: usize,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "ArtGuessr/1.0".to_string(),
            timeout_seconds: 10,
            cache_size: 2048,
        }
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(GameError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| GameError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${UPSTASH_REDIS_REST_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| GameError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("server.host", &self.server.host)?;
        validation::validate_range("server.port", self.server.port, 1, u16::MAX)?;

        validation::validate_url("museum.base_url", &self.museum.base_url)?;
        validation::validate_non_empty_string("museum.live_query", &self.museum.live_query)?;
        validation::validate_positive_number("museum.timeout_seconds", self.museum.timeout_seconds, 1)?;
        validation::validate_range("museum.retry_attempts", self.museum.retry_attempts, 1, 10)?;
        validation::validate_positive_number(
            "museum.requests_per_second",
            self.museum.requests_per_second,
            1,
        )?;
        validation::validate_positive_number("museum.rate_tick_ms", self.museum.rate_tick_ms, 1)?;
        validation::validate_positive_number(
            "museum.selection_attempts",
            self.museum.selection_attempts,
            1,
        )?;
        validation::validate_positive_number(
            "museum.object_cache_size",
            self.museum.object_cache_size,
            1,
        )?;
        validation::validate_range("museum.id_cache_hours", self.museum.id_cache_hours, 1, 24 * 30)?;

        if self.circuit_breaker.enabled {
            validation::validate_positive_number(
                "circuit_breaker.failure_threshold",
                self.circuit_breaker.failure_threshold,
                1,
            )?;
            validation::validate_range(
                "circuit_breaker.cooldown_seconds",
                self.circuit_breaker.cooldown_seconds,
                1,
                60 * 60,
            )?;
        }

        for source in &self.fallback.order {
            validation::validate_one_of("fallback.order", source, SOURCE_NAMES)?;
        }
        validation::validate_positive_number("fallback.pool_size", self.fallback.pool_size, 1)?;
        validation::validate_range(
            "fallback.pool_ttl_minutes",
            self.fallback.pool_ttl_minutes,
            1,
            24 * 60,
        )?;

        validation::validate_range("rounds.max_age_minutes", self.rounds.max_age_minutes, 1, 24 * 60)?;
        validation::validate_positive_number("rounds.scored_memory", self.rounds.scored_memory, 1)?;

        validation::validate_non_empty_string("leaderboard.key", &self.leaderboard.key)?;
        validation::validate_positive_number("leaderboard.size", self.leaderboard.size, 1)?;
        if self.leaderboard.backend == LeaderboardBackend::Upstash {
            let url = validation::validate_required_field("leaderboard.url", &self.leaderboard.url)?;
            validation::validate_url("leaderboard.url", url)?;
            let token =
                validation::validate_required_field("leaderboard.token", &self.leaderboard.token)?;
            if token.starts_with("${") {
                return Err(GameError::InvalidConfigValueError {
                    field: "leaderboard.token".to_string(),
                    value: token.clone(),
                    reason: "Environment variable is not set".to_string(),
                });
            }
            validation::validate_non_empty_string("leaderboard.token", token)?;
        }

        if self.geocoder.enabled {
            validation::validate_url("geocoder.base_url", &self.geocoder.base_url)?;
            validation::validate_positive_number("geocoder.cache_size", self.geocoder.cache_size, 1)?;
        }

        Ok(())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
