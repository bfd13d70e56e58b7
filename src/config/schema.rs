//! Configuration schema definitions.
//!
//! This module defines the configuration of the reporters shipped with the
//! crate. All types derive Serde traits for deserialization from config files.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::observability::metrics::MetricsReporter;
use crate::observability::tracing::DebugReporter;
use crate::reporter::{Reporter, Reporters};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ReporterConfig {
    /// Log subscriber settings.
    pub logging: LoggingConfig,

    /// Debug trace reporter settings.
    pub debug: DebugConfig,

    /// Metrics reporter settings.
    pub metrics: MetricsConfig,
}

impl ReporterConfig {
    /// Build a reporter out of every enabled section, or `None` when nothing
    /// is enabled.
    pub fn reporter(&self) -> Option<Arc<dyn Reporter>> {
        let mut reporters = Reporters::new();
        if self.debug.enabled {
            reporters.push(Arc::new(DebugReporter::from_config(&self.debug)));
        }
        if self.metrics.enabled {
            reporters.push(Arc::new(MetricsReporter::from_config(&self.metrics)));
        }

        if reporters.is_empty() {
            None
        } else {
            Some(Arc::new(reporters))
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directives, used when `RUST_LOG` is not set.
    pub filter: String,

    /// Colored output.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "http_reporter=info".to_string(),
            ansi: true,
        }
    }
}

/// Debug trace reporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Enable the debug trace reporter.
    pub enabled: bool,

    /// Maximum length of a logged header name, value, or line.
    pub header_max_length: usize,

    /// Responses with this status or above mark the exchange as failed.
    pub error_status_min: u16,

    /// Path prefixes that are never traced (e.g. "/health").
    pub skip_paths: Vec<String>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            header_max_length: 100,
            error_status_min: 500,
            skip_paths: Vec::new(),
        }
    }
}

/// Metrics reporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the metrics reporter.
    pub enabled: bool,

    /// Prefix of every metric name.
    pub prefix: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix: "http_server".to_string(),
        }
    }
}
