//! Client-side exchange reporting.
//!
//! # Data Flow
//! ```text
//! call(request)
//!     → request_started
//!     → inner service (request body wrapped: request_read at end-of-stream or drop)
//!     → response head: response_started
//!     → response body wrapped: response_done at end-of-stream or drop
//!
//! transport error → exchange_failed (no response events)
//! ```
//!
//! # Design Decisions
//! - Wraps any `tower::Service` over `http` requests, e.g. a hyper client
//! - Response size is the number of body bytes the caller actually consumed

use std::error::Error;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Instant;

use bytes::Buf;
use futures_util::future::BoxFuture;
use http::{Request, Response};
use http_body::{Body, Frame, SizeHint};
use tower::{Layer, Service};

use crate::reporter::{Exchange, Reporter, Tracker};

type CompleteHook = Box<dyn FnOnce(u64) + Send>;

pin_project_lite::pin_project! {
    /// A body that reports how many bytes went through it once it reaches
    /// end-of-stream or is dropped.
    pub struct ReportedBody<B> {
        #[pin]
        inner: B,
        size: u64,
        on_complete: Option<CompleteHook>,
    }

    impl<B> PinnedDrop for ReportedBody<B> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if let Some(on_complete) = this.on_complete.take() {
                on_complete(*this.size);
            }
        }
    }
}

impl<B> ReportedBody<B> {
    pub fn new(inner: B, on_complete: impl FnOnce(u64) + Send + 'static) -> Self {
        Self {
            inner,
            size: 0,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    /// Wraps a body without reporting anything.
    pub fn untracked(inner: B) -> Self {
        Self {
            inner,
            size: 0,
            on_complete: None,
        }
    }

    pub fn get_ref(&self) -> &B {
        &self.inner
    }
}

impl<B: Body> Body for ReportedBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let frame = ready!(this.inner.poll_frame(cx));

        match &frame {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    *this.size += data.remaining() as u64;
                }
            }
            Some(Err(_)) => {}
            None => {
                if let Some(on_complete) = this.on_complete.take() {
                    on_complete(*this.size);
                }
            }
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> fmt::Debug for ReportedBody<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportedBody")
            .field("size", &self.size)
            .field("tracked", &self.on_complete.is_some())
            .finish_non_exhaustive()
    }
}

/// Layer attaching a [`Reporter`] to a client service.
#[derive(Clone)]
pub struct ClientReporterLayer {
    reporter: Option<Arc<dyn Reporter>>,
}

impl ClientReporterLayer {
    pub fn new(reporter: impl Reporter + 'static) -> Self {
        Self::from_shared(Arc::new(reporter))
    }

    pub fn from_shared(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter: Some(reporter),
        }
    }

    pub fn disabled() -> Self {
        Self { reporter: None }
    }
}

impl<S> Layer<S> for ClientReporterLayer {
    type Service = ReportedClient<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ReportedClient {
            inner,
            reporter: self.reporter.clone(),
        }
    }
}

/// A client service whose exchanges are reported.
#[derive(Clone)]
pub struct ReportedClient<S> {
    inner: S,
    reporter: Option<Arc<dyn Reporter>>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ReportedClient<S>
where
    S: Service<Request<ReportedBody<ReqBody>>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Error + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ReportedBody<ResBody>>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let tracker = self
            .reporter
            .as_ref()
            .and_then(|reporter| reporter.track(&Exchange::outbound(&req)));

        let Some(tracker) = tracker else {
            let fut = self.inner.call(req.map(ReportedBody::untracked));
            return Box::pin(async move { Ok(fut.await?.map(ReportedBody::untracked)) });
        };
        let tracker: Arc<dyn Tracker> = Arc::from(tracker);

        let start = Instant::now();
        tracker.request_started();

        let body_tracker = tracker.clone();
        let req = req.map(move |body| {
            ReportedBody::new(body, move |size| {
                body_tracker.request_read(start.elapsed(), size)
            })
        });
        let fut = self.inner.call(req);

        Box::pin(async move {
            match fut.await {
                Ok(resp) => {
                    let status = resp.status();
                    tracker.response_started(start.elapsed(), status, resp.headers());
                    Ok(resp.map(move |body| {
                        ReportedBody::new(body, move |size| {
                            tracker.response_done(start.elapsed(), status, size)
                        })
                    }))
                }
                Err(err) => {
                    tracing::debug!(error = %err, "Client exchange failed");
                    tracker.exchange_failed(start.elapsed(), &err);
                    Err(err)
                }
            }
        })
    }
}
