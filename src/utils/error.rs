use thiserror::Error;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration '{field}'")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Upstream returned HTTP {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("Upstream request timed out: {url}")]
    UpstreamTimeout { url: String },

    #[error("Circuit breaker open, retry in {retry_after_ms}ms")]
    CircuitOpen { retry_after_ms: u64 },

    #[error("Rate limiter shut down")]
    RateLimiterClosed,

    #[error("Artwork {object_id} rejected: {reason}")]
    Rejected { object_id: u64, reason: String },

    #[error("No artwork candidate available: {message}")]
    NoCandidate { message: String },

    #[error("Object not found or round expired: {object_id}")]
    RoundNotFound { object_id: u64 },

    #[error("Leaderboard store error: {message}")]
    StoreError { message: String },
}

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Upstream,
    Configuration,
    Validation,
    NotFound,
    Storage,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl GameError {
    pub fn validation(message: impl Into<String>) -> Self {
        GameError::ValidationError {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        GameError::StoreError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            GameError::HttpError(_)
            | GameError::UpstreamStatus { .. }
            | GameError::UpstreamTimeout { .. }
            | GameError::CircuitOpen { .. }
            | GameError::RateLimiterClosed
            | GameError::Rejected { .. }
            | GameError::NoCandidate { .. } => ErrorCategory::Upstream,
            GameError::ConfigError { .. }
            | GameError::ConfigValidationError { .. }
            | GameError::InvalidConfigValueError { .. }
            | GameError::MissingConfigError { .. } => ErrorCategory::Configuration,
            GameError::ValidationError { .. } => ErrorCategory::Validation,
            GameError::RoundNotFound { .. } => ErrorCategory::NotFound,
            GameError::StoreError { .. } => ErrorCategory::Storage,
            GameError::IoError(_) | GameError::SerializationError(_) => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GameError::ValidationError { .. }
            | GameError::RoundNotFound { .. }
            | GameError::Rejected { .. } => ErrorSeverity::Low,
            GameError::HttpError(_)
            | GameError::UpstreamStatus { .. }
            | GameError::UpstreamTimeout { .. }
            | GameError::CircuitOpen { .. } => ErrorSeverity::Medium,
            GameError::NoCandidate { .. }
            | GameError::StoreError { .. }
            | GameError::SerializationError(_)
            | GameError::IoError(_)
            | GameError::RateLimiterClosed => ErrorSeverity::High,
            GameError::ConfigError { .. }
            | GameError::ConfigValidationError { .. }
            | GameError::InvalidConfigValueError { .. }
            | GameError::MissingConfigError { .. } => ErrorSeverity::Critical,
        }
    }

    /// 是否值得重試 (5xx、逾時、連線失敗)
    pub fn is_transient(&self) -> bool {
        match self {
            GameError::UpstreamStatus { status, .. } => *status >= 500,
            GameError::UpstreamTimeout { .. } => true,
            GameError::HttpError(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Upstream => {
                "The museum API is unreliable; fallback artworks are served until it recovers"
            }
            ErrorCategory::Configuration => "Check the TOML config file and environment variables",
            ErrorCategory::Validation => "Fix the request payload and try again",
            ErrorCategory::NotFound => "Start a new round before submitting a guess",
            ErrorCategory::Storage => "Check the leaderboard store URL and token",
            ErrorCategory::Internal => "Check the logs for details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            GameError::ValidationError { message } => message.clone(),
            GameError::RoundNotFound { .. } => "Object not found or round expired".to_string(),
            GameError::NoCandidate { .. } => "No artwork is available right now".to_string(),
            GameError::StoreError { .. } => "Leaderboard is unavailable".to_string(),
            GameError::ConfigError { .. }
            | GameError::ConfigValidationError { .. }
            | GameError::InvalidConfigValueError { .. }
            | GameError::MissingConfigError { .. } => format!("Invalid configuration: {}", self),
            _ => "Something went wrong, please try again".to_string(),
        }
    }
}
