//! Shared utilities for integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::{HeaderMap, StatusCode};
use http_reporter::{Exchange, Reporter, Tracker};

/// Everything a [`RecordingReporter`] saw.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub tracked: usize,
    pub request_started: usize,
    pub request_read: usize,
    pub response_started: usize,
    pub response_done: usize,
    pub taken_over: usize,
    pub failed: usize,

    pub request_size: u64,
    pub status: Option<StatusCode>,
    pub done_status: Option<StatusCode>,
    pub response_size: u64,

    /// Event names in the order they arrived.
    pub events: Vec<&'static str>,
}

/// A reporter that tracks every exchange and records its events.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    stats: Arc<Mutex<Stats>>,
    observe_takeover: bool,
}

#[allow(dead_code)]
impl RecordingReporter {
    pub fn new() -> Self {
        Self {
            stats: Arc::default(),
            observe_takeover: true,
        }
    }

    /// A reporter whose trackers ignore connection takeovers.
    pub fn without_takeover() -> Self {
        Self {
            stats: Arc::default(),
            observe_takeover: false,
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn track(&self, _exchange: &Exchange<'_>) -> Option<Box<dyn Tracker>> {
        self.stats.lock().unwrap().tracked += 1;
        if self.observe_takeover {
            Some(Box::new(RecordingTracker(self.stats.clone())))
        } else {
            Some(Box::new(PlainTracker(RecordingTracker(self.stats.clone()))))
        }
    }
}

struct RecordingTracker(Arc<Mutex<Stats>>);

impl RecordingTracker {
    fn with(&self, event: &'static str, f: impl FnOnce(&mut Stats)) {
        let mut stats = self.0.lock().unwrap();
        stats.events.push(event);
        f(&mut stats);
    }
}

impl Tracker for RecordingTracker {
    fn request_started(&self) {
        self.with("request_started", |s| s.request_started += 1);
    }

    fn request_read(&self, _elapsed: Duration, size: u64) {
        self.with("request_read", |s| {
            s.request_read += 1;
            s.request_size = size;
        });
    }

    fn response_started(&self, _elapsed: Duration, status: StatusCode, _headers: &HeaderMap) {
        self.with("response_started", |s| {
            s.response_started += 1;
            s.status = Some(status);
        });
    }

    fn response_done(&self, _elapsed: Duration, status: StatusCode, size: u64) {
        self.with("response_done", |s| {
            s.response_done += 1;
            s.done_status = Some(status);
            s.response_size = size;
        });
    }

    fn conn_taken_over(&self, _elapsed: Duration) {
        self.with("conn_taken_over", |s| s.taken_over += 1);
    }

    fn exchange_failed(&self, _elapsed: Duration, _error: &(dyn std::error::Error + 'static)) {
        self.with("exchange_failed", |s| s.failed += 1);
    }
}

/// Forwards the mandatory events only.
struct PlainTracker(RecordingTracker);

impl Tracker for PlainTracker {
    fn request_started(&self) {
        self.0.request_started()
    }

    fn request_read(&self, elapsed: Duration, size: u64) {
        self.0.request_read(elapsed, size)
    }

    fn response_started(&self, elapsed: Duration, status: StatusCode, headers: &HeaderMap) {
        self.0.response_started(elapsed, status, headers)
    }

    fn response_done(&self, elapsed: Duration, status: StatusCode, size: u64) {
        self.0.response_done(elapsed, status, size)
    }
}

/// Poll `cond` until it holds or a second has passed.
#[allow(dead_code)]
pub async fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
