//! Metrics reporter.
//!
//! # Responsibilities
//! - Count started, handled, failed and taken-over exchanges
//! - Record latency and body size distributions
//!
//! # Metrics
//! - `<prefix>_requests_started_total` (counter): by method
//! - `<prefix>_requests_handled_total` (counter): by method, code
//! - `<prefix>_request_duration_seconds` (histogram): by method, code
//! - `<prefix>_request_size_bytes` (histogram): by method
//! - `<prefix>_response_size_bytes` (histogram): by method, code
//! - `<prefix>_connections_taken_over_total` (counter): by method
//! - `<prefix>_requests_failed_total` (counter): by method
//!
//! # Design Decisions
//! - Records through the `metrics` facade; the exporter is the application's choice
//! - Metric names are built once per reporter, not per event

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, StatusCode};
use metrics::{counter, histogram};

use crate::config::MetricsConfig;
use crate::reporter::{Exchange, Reporter, Tracker};

struct MetricNames {
    started: String,
    handled: String,
    duration: String,
    request_size: String,
    response_size: String,
    taken_over: String,
    failed: String,
}

impl MetricNames {
    fn new(prefix: &str) -> Self {
        Self {
            started: format!("{prefix}_requests_started_total"),
            handled: format!("{prefix}_requests_handled_total"),
            duration: format!("{prefix}_request_duration_seconds"),
            request_size: format!("{prefix}_request_size_bytes"),
            response_size: format!("{prefix}_response_size_bytes"),
            taken_over: format!("{prefix}_connections_taken_over_total"),
            failed: format!("{prefix}_requests_failed_total"),
        }
    }
}

/// Reporter recording exchange metrics.
#[derive(Clone)]
pub struct MetricsReporter {
    names: Arc<MetricNames>,
}

impl MetricsReporter {
    pub fn new(prefix: &str) -> Self {
        Self {
            names: Arc::new(MetricNames::new(prefix)),
        }
    }

    pub fn from_config(config: &MetricsConfig) -> Self {
        Self::new(&config.prefix)
    }
}

impl Default for MetricsReporter {
    fn default() -> Self {
        Self::from_config(&MetricsConfig::default())
    }
}

impl Reporter for MetricsReporter {
    fn track(&self, exchange: &Exchange<'_>) -> Option<Box<dyn Tracker>> {
        Some(Box::new(MetricsTracker {
            names: self.names.clone(),
            method: exchange.method.to_string(),
        }))
    }
}

struct MetricsTracker {
    names: Arc<MetricNames>,
    method: String,
}

impl Tracker for MetricsTracker {
    fn request_started(&self) {
        counter!(self.names.started.clone(), "method" => self.method.clone()).increment(1);
    }

    fn request_read(&self, _elapsed: Duration, size: u64) {
        histogram!(self.names.request_size.clone(), "method" => self.method.clone())
            .record(size as f64);
    }

    fn response_started(&self, _elapsed: Duration, _status: StatusCode, _headers: &HeaderMap) {}

    fn response_done(&self, elapsed: Duration, status: StatusCode, size: u64) {
        let code = status.as_u16().to_string();
        let labels = [
            ("method", self.method.clone()),
            ("code", code),
        ];

        counter!(self.names.handled.clone(), &labels).increment(1);
        histogram!(self.names.duration.clone(), &labels).record(elapsed.as_secs_f64());
        histogram!(self.names.response_size.clone(), &labels).record(size as f64);
    }

    fn conn_taken_over(&self, _elapsed: Duration) {
        counter!(self.names.taken_over.clone(), "method" => self.method.clone()).increment(1);
    }

    fn exchange_failed(&self, _elapsed: Duration, _error: &(dyn Error + 'static)) {
        counter!(self.names.failed.clone(), "method" => self.method.clone()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_records_exchange() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let reporter = MetricsReporter::new("test_http");
            let req = Request::post("/items").body(()).unwrap();
            let tracker = reporter.track(&Exchange::inbound(&req)).unwrap();

            tracker.request_started();
            tracker.request_read(Duration::from_millis(1), 8);
            let headers = HeaderMap::new();
            tracker.response_started(Duration::from_millis(2), StatusCode::CREATED, &headers);
            tracker.response_done(Duration::from_millis(3), StatusCode::CREATED, 9);
        });

        let rendered = handle.render();
        let handled = "test_http_requests_handled_total{method=\"POST\",code=\"201\"} 1";
        assert!(rendered.contains("test_http_requests_started_total{method=\"POST\"} 1"));
        assert!(rendered.contains(handled));
        assert!(rendered.contains("test_http_request_duration_seconds"));
        assert!(rendered.contains("test_http_response_size_bytes"));
        assert!(!rendered.contains("test_http_connections_taken_over_total"));
        assert!(!rendered.contains("test_http_requests_failed_total"));
    }

    #[test]
    fn test_records_takeover_and_failure() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let reporter = MetricsReporter::new("test_http");
            let req = Request::get("/ws").body(()).unwrap();

            let upgraded = reporter.track(&Exchange::inbound(&req)).unwrap();
            upgraded.request_started();
            upgraded.conn_taken_over(Duration::from_millis(1));

            let failed = reporter.track(&Exchange::outbound(&req)).unwrap();
            failed.request_started();
            let err = std::io::Error::other("connection reset");
            failed.exchange_failed(Duration::from_millis(2), &err);
        });

        let rendered = handle.render();
        assert!(rendered.contains("test_http_requests_started_total{method=\"GET\"} 2"));
        assert!(rendered.contains("test_http_connections_taken_over_total{method=\"GET\"} 1"));
        assert!(rendered.contains("test_http_requests_failed_total{method=\"GET\"} 1"));
        assert!(!rendered.contains("test_http_requests_handled_total"));
    }
}
