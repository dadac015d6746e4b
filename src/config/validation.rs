//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds, timeouts > 0)
//! - Check the base URL and default headers are usable by the transport
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>

use reqwest::header::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::ClientConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("base_url '{url}' is not a valid URL: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("circuit_breaker.threshold must be greater than zero")]
    ZeroThreshold,

    #[error("circuit_breaker.grace_period_ms must be greater than zero")]
    ZeroGracePeriod,

    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    #[error("transport.timeout_ms must be greater than zero")]
    ZeroTimeout,

    #[error("cache.max_age_secs must be greater than zero")]
    ZeroCacheAge,

    #[error("status code {0} is outside 100..=599")]
    InvalidStatus(u16),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.base_url.is_empty() {
        if let Err(e) = url::Url::parse(&config.base_url) {
            errors.push(ValidationError::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: e.to_string(),
            });
        }
    }

    if let Some(breaker) = &config.circuit_breaker {
        if breaker.threshold == 0 {
            errors.push(ValidationError::ZeroThreshold);
        }
        if breaker.grace_period_ms == 0 {
            errors.push(ValidationError::ZeroGracePeriod);
        }
    }

    for (name, value) in &config.headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::InvalidHeader(name.clone()));
        }
    }

    if config.transport.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if config.cache.max_age_secs == Some(0) {
        errors.push(ValidationError::ZeroCacheAge);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check that a status code can carry a handler.
pub fn validate_status(status: u16) -> Result<(), ValidationError> {
    if (100..=599).contains(&status) {
        Ok(())
    } else {
        Err(ValidationError::InvalidStatus(status))
    }
}
