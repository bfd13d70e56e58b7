//! Composite reporter delivering each exchange to several reporters.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, StatusCode};

use crate::reporter::{Exchange, Reporter, Tracker};

/// A reporter made of several reporters.
///
/// Each member decides on its own whether to track an exchange; the
/// composite declines only when every member declines.
#[derive(Clone, Default)]
pub struct Reporters {
    members: Vec<Arc<dyn Reporter>>,
}

impl Reporters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member reporter.
    pub fn with(mut self, reporter: impl Reporter + 'static) -> Self {
        self.members.push(Arc::new(reporter));
        self
    }

    pub fn push(&mut self, reporter: Arc<dyn Reporter>) {
        self.members.push(reporter);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Reporter for Reporters {
    fn track(&self, exchange: &Exchange<'_>) -> Option<Box<dyn Tracker>> {
        let mut trackers: Vec<_> = self
            .members
            .iter()
            .filter_map(|r| r.track(exchange))
            .collect();

        match trackers.len() {
            0 => None,
            1 => trackers.pop(),
            _ => Some(Box::new(FanoutTracker { trackers })),
        }
    }
}

struct FanoutTracker {
    trackers: Vec<Box<dyn Tracker>>,
}

impl Tracker for FanoutTracker {
    fn request_started(&self) {
        self.trackers.iter().for_each(|t| t.request_started());
    }

    fn request_read(&self, elapsed: Duration, size: u64) {
        self.trackers.iter().for_each(|t| t.request_read(elapsed, size));
    }

    fn response_started(&self, elapsed: Duration, status: StatusCode, headers: &HeaderMap) {
        for t in &self.trackers {
            t.response_started(elapsed, status, headers);
        }
    }

    fn response_done(&self, elapsed: Duration, status: StatusCode, size: u64) {
        for t in &self.trackers {
            t.response_done(elapsed, status, size);
        }
    }

    fn conn_taken_over(&self, elapsed: Duration) {
        self.trackers.iter().for_each(|t| t.conn_taken_over(elapsed));
    }

    fn exchange_failed(&self, elapsed: Duration, error: &(dyn Error + 'static)) {
        for t in &self.trackers {
            t.exchange_failed(elapsed, error);
        }
    }
}
