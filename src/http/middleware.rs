//! Server-side exchange orchestration.
//!
//! # State Machine
//! ```text
//! CREATED ─ reporter declines ─▶ DECLINED   (pass-through)
//!    │
//!    └─ tracker ─▶ STARTED ─ handler returns ─▶ DONE       (response_done)
//!                     │
//!                     └─ takeover ────────────▶ TAKEN_OVER (no response_done)
//! ```
//!
//! # Design Decisions
//! - The composition point is a `tower::Layer`, so handler chains can be
//!   assembled with `ServiceBuilder`
//! - One exchange is driven end to end by the calling thread; decorator state
//!   needs no synchronization
//! - A response that never wrote anything is reported with status 200, the
//!   status the server commits on the handler's behalf

use std::sync::Arc;
use std::time::Instant;

use http::{Request, StatusCode};
use tower::Layer;

use crate::config::ReporterConfig;
use crate::http::body::{Body, TrackedBody};
use crate::http::sink::ResponseSink;
use crate::http::writer::{Diagnostics, TracingDiagnostics, TrackedWriter};
use crate::reporter::{Exchange, Reporter, Tracker};

/// A stage of a blocking server handler chain.
pub trait Handler: Send + Sync {
    fn serve(&self, req: Request<Body>, resp: &mut dyn ResponseSink);
}

impl<F> Handler for F
where
    F: Fn(Request<Body>, &mut dyn ResponseSink) + Send + Sync,
{
    fn serve(&self, req: Request<Body>, resp: &mut dyn ResponseSink) {
        self(req, resp)
    }
}

/// How an exchange ended, as far as reporting is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No tracker was attached.
    Declined,
    /// The handler returned and `response_done` was reported.
    Done,
    /// The connection was taken over; `response_done` was not reported.
    TakenOver,
}

/// Layer attaching a [`Reporter`] to a handler.
#[derive(Clone)]
pub struct ReporterLayer {
    reporter: Option<Arc<dyn Reporter>>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl ReporterLayer {
    pub fn new(reporter: impl Reporter + 'static) -> Self {
        Self::from_shared(Arc::new(reporter))
    }

    pub fn from_shared(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter: Some(reporter),
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// A layer that passes every exchange straight through.
    pub fn disabled() -> Self {
        Self {
            reporter: None,
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// Build the reporters enabled in `config`.
    pub fn from_config(config: &ReporterConfig) -> Self {
        match config.reporter() {
            Some(reporter) => Self::from_shared(reporter),
            None => Self::disabled(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Diagnostics + 'static) -> Self {
        self.diagnostics = Arc::new(diagnostics);
        self
    }
}

impl<H> Layer<H> for ReporterLayer {
    type Service = Reported<H>;

    fn layer(&self, inner: H) -> Self::Service {
        Reported {
            inner,
            reporter: self.reporter.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

/// A handler whose exchanges are reported.
#[derive(Clone)]
pub struct Reported<H> {
    inner: H,
    reporter: Option<Arc<dyn Reporter>>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl<H: Handler> Reported<H> {
    pub fn get_ref(&self) -> &H {
        &self.inner
    }

    /// Serve one exchange and report how it ended.
    pub fn serve_exchange(&self, req: Request<Body>, resp: &mut dyn ResponseSink) -> Outcome {
        let tracker = self
            .reporter
            .as_ref()
            .and_then(|reporter| reporter.track(&Exchange::inbound(&req)));

        let Some(tracker) = tracker else {
            self.inner.serve(req, resp);
            return Outcome::Declined;
        };
        let tracker: Arc<dyn Tracker> = Arc::from(tracker);

        let start = Instant::now();
        tracker.request_started();

        let body_tracker = tracker.clone();
        let req = req.map(move |body| {
            Body::from_reader(TrackedBody::new(body, move |size| {
                body_tracker.request_read(start.elapsed(), size)
            }))
        });

        let mut writer = TrackedWriter::wrap(
            resp,
            |status, headers| tracker.response_started(start.elapsed(), status, headers),
            || tracker.conn_taken_over(start.elapsed()),
            self.diagnostics.as_ref(),
        );

        self.inner.serve(req, &mut writer);

        if writer.taken_over() {
            tracing::trace!(status = ?writer.status(), "Exchange ended with connection takeover");
            return Outcome::TakenOver;
        }

        let status = writer.status().unwrap_or(StatusCode::OK);
        tracker.response_done(start.elapsed(), status, writer.size());
        tracing::trace!(status = %status, size = writer.size(), "Exchange done");
        Outcome::Done
    }
}

impl<H: Handler> Handler for Reported<H> {
    fn serve(&self, req: Request<Body>, resp: &mut dyn ResponseSink) {
        self.serve_exchange(req, resp);
    }
}
