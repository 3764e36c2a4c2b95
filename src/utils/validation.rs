use crate::utils::error::{GameError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(GameError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(GameError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(GameError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min_value: T,
) -> Result<()> {
    if value < min_value {
        return Err(GameError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| GameError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GameError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(GameError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// 驗證值屬於允許的集合 (例如 fallback 來源名稱)
pub fn validate_one_of(field_name: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if !allowed.contains(&value) {
        return Err(GameError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Valid values: {}", allowed.join(", ")),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("museum.base_url", "https://example.com").is_ok());
        assert!(validate_url("museum.base_url", "http://example.com").is_ok());
        assert!(validate_url("museum.base_url", "").is_err());
        assert!(validate_url("museum.base_url", "invalid-url").is_err());
        assert!(validate_url("museum.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("museum.requests_per_second", 5, 1).is_ok());
        assert!(validate_positive_number("museum.requests_per_second", 0, 1).is_err());
    }

    #[test]
    fn test_validate_range_and_one_of() {
        assert!(validate_range("server.port", 8080u16, 1, u16::MAX).is_ok());
        assert!(validate_range("rounds.max_age_minutes", 0u64, 1, 1440).is_err());
        assert!(validate_one_of("fallback.order", "live", &["live", "static"]).is_ok());
        assert!(validate_one_of("fallback.order", "cache", &["live", "static"]).is_err());
    }

    #[test]
    fn test_validate_required_field() {
        let token: Option<String> = None;
        assert!(matches!(
            validate_required_field("leaderboard.token", &token),
            Err(GameError::MissingConfigError { .. })
        ));
        assert!(validate_non_empty_string("leaderboard.key", "  ").is_err());
    }
}
