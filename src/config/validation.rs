//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (header length > 0, status codes in range)
//! - Check names that end up in external systems (metric prefix, log filter)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ReporterConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::ReporterConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("logging.filter {filter:?} is invalid: {reason}")]
    InvalidLogFilter { filter: String, reason: String },

    #[error("debug.header_max_length must be greater than zero")]
    ZeroHeaderLength,

    #[error("debug.error_status_min {0} is not an HTTP status code")]
    InvalidErrorStatus(u16),

    #[error("debug.skip_paths entry {0:?} must start with '/'")]
    InvalidSkipPath(String),

    #[error("metrics.prefix {0:?} is not a valid metric name")]
    InvalidMetricPrefix(String),
}

pub fn validate_config(config: &ReporterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = EnvFilter::try_new(&config.logging.filter) {
        errors.push(ValidationError::InvalidLogFilter {
            filter: config.logging.filter.clone(),
            reason: e.to_string(),
        });
    }

    if config.debug.header_max_length == 0 {
        errors.push(ValidationError::ZeroHeaderLength);
    }
    if !(100..=599).contains(&config.debug.error_status_min) {
        errors.push(ValidationError::InvalidErrorStatus(config.debug.error_status_min));
    }
    for path in &config.debug.skip_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidSkipPath(path.clone()));
        }
    }

    if !is_metric_name(&config.metrics.prefix) {
        errors.push(ValidationError::InvalidMetricPrefix(config.metrics.prefix.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}
