//! Debug trace reporter.
//!
//! # Responsibilities
//! - Open one span per exchange, named after the operation
//! - Log the request line and headers when the exchange starts
//! - Log the response status and headers when it completes
//! - Flag exchanges whose status counts as an error
//!
//! # Design Decisions
//! - Spans close when the tracker is dropped, after the last event
//! - The request ID comes from `x-request-id` when the caller sent one,
//!   otherwise a UUID v4 is generated
//! - Header dumps are truncated per line to keep events bounded

use std::error::Error;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use http::{HeaderMap, StatusCode};
use tracing::{field, Span};
use uuid::Uuid;

use crate::config::DebugConfig;
use crate::reporter::{Direction, Exchange, Reporter, Tracker};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request extension naming the operation handled by an exchange, e.g. set
/// by a router once the route is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationName(pub String);

type Filter = Arc<dyn Fn(&Exchange<'_>) -> bool + Send + Sync>;
type ErrorStatus = Arc<dyn Fn(StatusCode) -> bool + Send + Sync>;

/// Reporter that writes exchanges to `tracing` spans.
#[derive(Clone)]
pub struct DebugReporter {
    filter: Option<Filter>,
    is_error: ErrorStatus,
    header_max_length: usize,
}

impl Default for DebugReporter {
    fn default() -> Self {
        Self::from_config(&DebugConfig::default())
    }
}

impl DebugReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DebugConfig) -> Self {
        let min = config.error_status_min;
        let mut reporter = Self {
            filter: None,
            is_error: Arc::new(move |status: StatusCode| status.as_u16() >= min),
            header_max_length: config.header_max_length,
        };

        if !config.skip_paths.is_empty() {
            let skip = config.skip_paths.clone();
            reporter = reporter.with_filter(move |exchange| {
                let path = exchange.uri.path();
                !skip.iter().any(|prefix| path.starts_with(prefix.as_str()))
            });
        }
        reporter
    }

    /// Only exchanges for which `filter` returns true are traced.
    pub fn with_filter(
        mut self,
        filter: impl Fn(&Exchange<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Decides which response statuses mark an exchange as failed.
    pub fn with_error_status(
        mut self,
        is_error: impl Fn(StatusCode) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_error = Arc::new(is_error);
        self
    }

    pub fn with_header_max_length(mut self, max: usize) -> Self {
        self.header_max_length = max;
        self
    }
}

impl Reporter for DebugReporter {
    fn track(&self, exchange: &Exchange<'_>) -> Option<Box<dyn Tracker>> {
        if let Some(filter) = &self.filter {
            if !filter(exchange) {
                return None;
            }
        }

        let request_id = exchange
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let span = tracing::debug_span!(
            "http.exchange",
            operation = %operation_name(exchange),
            request_id = %request_id,
            direction = ?exchange.direction,
            status = field::Empty,
            error = field::Empty,
        );
        span.in_scope(|| {
            tracing::debug!(
                "{} {} {:?}",
                exchange.method,
                exchange.uri,
                exchange.version
            );
            tracing::debug!(
                headers = %format_headers(exchange.headers, self.header_max_length),
                "Request headers"
            );
        });

        Some(Box::new(DebugTracker {
            span,
            is_error: self.is_error.clone(),
            header_max_length: self.header_max_length,
            response_headers: Mutex::new(None),
        }))
    }
}

/// Operation name of a span: the `OperationName` extension when present,
/// else `http.Recv.<path>` for inbound and `<host><path>` for outbound exchanges.
pub fn operation_name(exchange: &Exchange<'_>) -> String {
    if let Some(OperationName(name)) = exchange.extensions.get::<OperationName>() {
        return match exchange.direction {
            Direction::Inbound => format!("http.Recv.{name}"),
            Direction::Outbound => format!("http.Send.{name}"),
        };
    }

    match exchange.direction {
        Direction::Inbound => format!("http.Recv.{}", exchange.uri.path()),
        Direction::Outbound => format!(
            "{}{}",
            exchange.uri.host().unwrap_or_default(),
            exchange.uri.path()
        ),
    }
}

struct DebugTracker {
    span: Span,
    is_error: ErrorStatus,
    header_max_length: usize,
    response_headers: Mutex<Option<HeaderMap>>,
}

impl Tracker for DebugTracker {
    fn request_started(&self) {}

    fn request_read(&self, elapsed: Duration, size: u64) {
        self.span
            .in_scope(|| tracing::trace!(?elapsed, size, "Request body read"));
    }

    fn response_started(&self, _elapsed: Duration, _status: StatusCode, headers: &HeaderMap) {
        *self
            .response_headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(headers.clone());
    }

    fn response_done(&self, elapsed: Duration, status: StatusCode, size: u64) {
        let headers = self
            .response_headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default();

        self.span.record("status", status.as_u16());
        if (self.is_error)(status) {
            self.span.record("error", true);
        }
        self.span.in_scope(|| {
            tracing::debug!(?elapsed, size, "Response: {status}");
            tracing::debug!(
                headers = %format_headers(&headers, self.header_max_length),
                "Response headers"
            );
        });
    }

    fn conn_taken_over(&self, elapsed: Duration) {
        self.span
            .in_scope(|| tracing::debug!(?elapsed, "Response: unknown (connection taken over)"));
    }

    fn exchange_failed(&self, elapsed: Duration, error: &(dyn Error + 'static)) {
        self.span.record("error", true);
        self.span
            .in_scope(|| tracing::debug!(?elapsed, error = %error, "Error on response"));
    }
}

/// Render headers as `name: value` lines.
///
/// Names and values are each cut to `max_len`; a line that still exceeds
/// `max_len` is cut and marked with " (header truncated)". Only the first
/// value of a repeated header is shown.
pub fn format_headers(headers: &HeaderMap, max_len: usize) -> String {
    let mut out = String::new();
    for name in headers.keys() {
        let value = headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
            .unwrap_or_default();

        let start = out.len();
        let _ = write!(
            out,
            "{}: {}",
            truncate(name.as_str(), max_len),
            truncate(&value, max_len)
        );
        if out.len() > start + max_len {
            let cut = start + truncate(&out[start..], max_len).len();
            out.truncate(cut);
            out.push_str(" (header truncated)");
        }
        out.push('\n');
    }
    out.pop();
    out
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;
    use std::io;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a subscriber that writes every event to a string.
    fn capture(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn finish(reporter: &DebugReporter, req: &Request<()>, status: StatusCode) {
        let tracker = reporter.track(&Exchange::inbound(req)).unwrap();
        tracker.request_started();
        tracker.response_started(Duration::ZERO, status, &HeaderMap::new());
        tracker.response_done(Duration::ZERO, status, 0);
    }

    #[test]
    fn test_error_status_marks_span() {
        let reporter = DebugReporter::new();
        let req = Request::get("/api")
            .header(X_REQUEST_ID, "abc123")
            .body(())
            .unwrap();

        let out = capture(|| finish(&reporter, &req, StatusCode::BAD_GATEWAY));
        assert!(out.contains("operation=http.Recv./api"));
        assert!(out.contains("request_id=abc123"));
        assert!(out.contains("status=502"));
        assert!(out.contains("error=true"));

        let out = capture(|| finish(&reporter, &req, StatusCode::NOT_FOUND));
        assert!(out.contains("status=404"));
        assert!(!out.contains("error=true"));

        let strict = DebugReporter::new().with_error_status(|status| status.is_client_error());
        let out = capture(|| finish(&strict, &req, StatusCode::NOT_FOUND));
        assert!(out.contains("error=true"));
    }

    #[test]
    fn test_request_id_defaults_to_uuid() {
        let req = Request::get("/api").body(()).unwrap();
        let out = capture(|| finish(&DebugReporter::new(), &req, StatusCode::OK));

        let start = out.find("request_id=").unwrap() + "request_id=".len();
        let id = &out[start..start + 36];
        assert!(Uuid::parse_str(id).is_ok(), "not a UUID: {id}");
    }

    #[test]
    fn test_takeover_and_failure_are_logged() {
        let req = Request::get("/ws").body(()).unwrap();
        let reporter = DebugReporter::new();

        let out = capture(|| {
            let tracker = reporter.track(&Exchange::inbound(&req)).unwrap();
            tracker.request_started();
            tracker.conn_taken_over(Duration::ZERO);
        });
        assert!(out.contains("Response: unknown (connection taken over)"));
        assert!(!out.contains("status="));

        let out = capture(|| {
            let tracker = reporter.track(&Exchange::outbound(&req)).unwrap();
            tracker.request_started();
            let err = io::Error::other("connection refused");
            tracker.exchange_failed(Duration::ZERO, &err);
        });
        assert!(out.contains("Error on response"));
        assert!(out.contains("connection refused"));
        assert!(out.contains("error=true"));
    }

    #[test]
    fn test_format_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "text/plain".parse().unwrap());
        headers.append("x-multi", "first".parse().unwrap());
        headers.append("x-multi", "second".parse().unwrap());

        assert_eq!(
            format_headers(&headers, 100),
            "content-type: text/plain\nx-multi: first"
        );
        assert_eq!(format_headers(&HeaderMap::new(), 100), "");
    }

    #[test]
    fn test_format_headers_truncates_long_lines() {
        let mut headers = HeaderMap::new();
        headers.insert("x-long", "abcdefghij".parse().unwrap());

        assert_eq!(format_headers(&headers, 8), "x-long:  (header truncated)");
        assert_eq!(format_headers(&headers, 4), "x-lo (header truncated)");
    }

    #[test]
    fn test_operation_name() {
        let req = Request::get("http://example.org/api/items").body(()).unwrap();
        assert_eq!(operation_name(&Exchange::inbound(&req)), "http.Recv./api/items");
        assert_eq!(operation_name(&Exchange::outbound(&req)), "example.org/api/items");

        let mut req = Request::get("/api/items/7").body(()).unwrap();
        req.extensions_mut()
            .insert(OperationName("items.get".to_string()));
        assert_eq!(operation_name(&Exchange::inbound(&req)), "http.Recv.items.get");
    }

    #[test]
    fn test_skip_paths_decline_tracking() {
        let reporter = DebugReporter::from_config(&DebugConfig {
            enabled: true,
            skip_paths: vec!["/health".to_string()],
            ..DebugConfig::default()
        });

        let health = Request::get("/health/live").body(()).unwrap();
        assert!(reporter.track(&Exchange::inbound(&health)).is_none());

        let api = Request::get("/api").body(()).unwrap();
        let out = capture(|| finish(&reporter, &api, StatusCode::OK));
        assert!(out.contains("operation=http.Recv./api"));
        assert!(out.contains("Response: 200 OK"));
    }
}
