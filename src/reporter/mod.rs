//! Exchange lifecycle event protocol.
//!
//! # Data Flow
//! ```text
//! inbound/outbound request
//!     → Reporter::track (may decline)
//!     → Tracker (one per exchange)
//!         request_started
//!         request_read          (at most once)
//!         response_started      (at most once)
//!         response_done | conn_taken_over | exchange_failed
//! ```
//!
//! # Design Decisions
//! - Trackers take `&self` and must be `Send + Sync`: the request body can be
//!   moved to another thread by the handler, so the tracker is shared via `Arc`
//! - Optional events are default no-op methods; a tracker that does not care
//!   about takeover simply does not override `conn_taken_over`
//! - Trackers are infallible from the caller's point of view

pub mod fanout;

use std::error::Error;
use std::time::Duration;

use http::{Extensions, HeaderMap, Method, Request, StatusCode, Uri, Version};

pub use fanout::Reporters;

/// Which side of the connection an exchange was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// A request received by a server handler chain.
    Inbound,
    /// A request sent through a client transport.
    Outbound,
}

/// Borrowed view of the request that opens an exchange.
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    pub direction: Direction,
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub version: Version,
    pub headers: &'a HeaderMap,
    pub extensions: &'a Extensions,
}

impl<'a> Exchange<'a> {
    /// View of a request received by a server.
    pub fn inbound<B>(req: &'a Request<B>) -> Self {
        Self::from_request(Direction::Inbound, req)
    }

    /// View of a request sent by a client.
    pub fn outbound<B>(req: &'a Request<B>) -> Self {
        Self::from_request(Direction::Outbound, req)
    }

    fn from_request<B>(direction: Direction, req: &'a Request<B>) -> Self {
        Self {
            direction,
            method: req.method(),
            uri: req.uri(),
            version: req.version(),
            headers: req.headers(),
            extensions: req.extensions(),
        }
    }
}

/// Decides whether an exchange is tracked.
pub trait Reporter: Send + Sync {
    /// Start tracking a new exchange. `None` means the exchange is not tracked.
    fn track(&self, exchange: &Exchange<'_>) -> Option<Box<dyn Tracker>>;
}

impl<R: Reporter + ?Sized> Reporter for std::sync::Arc<R> {
    fn track(&self, exchange: &Exchange<'_>) -> Option<Box<dyn Tracker>> {
        (**self).track(exchange)
    }
}

/// Receives events about one tracked exchange.
pub trait Tracker: Send + Sync {
    /// The exchange has started. Called immediately after `Reporter::track`.
    /// On the client this happens before any data is sent; on the server,
    /// after the request head has been parsed.
    fn request_started(&self);

    /// The request body has been read to end-of-stream or closed, whichever
    /// came first. On the server this may be omitted when the handler never
    /// touches the body.
    fn request_read(&self, elapsed: Duration, size: u64);

    /// The response has started. On the server this is the first status or
    /// body write; on the client, the arrival of the response head.
    fn response_started(&self, elapsed: Duration, status: StatusCode, headers: &HeaderMap);

    /// The response has completed. Never called for an exchange whose
    /// connection was taken over.
    fn response_done(&self, elapsed: Duration, status: StatusCode, size: u64);

    /// The connection was taken over by the handler. `response_done` will not
    /// follow, since what happens on the raw connection is not observable.
    /// `response_started` may still have fired if the takeover came after a
    /// write.
    fn conn_taken_over(&self, _elapsed: Duration) {}

    /// The client transport failed before a response head arrived.
    fn exchange_failed(&self, _elapsed: Duration, _error: &(dyn Error + 'static)) {}
}
