//! Capability-preserving response decorator.
//!
//! # Responsibilities
//! - Track the committed status and the number of body bytes accepted
//! - Signal "response started" once, on the first status or body write
//! - Signal "taken over" once, before delegating the takeover
//! - Re-expose exactly the optional capabilities the wrapped sink has
//!
//! # Capability Shapes
//! ```text
//! found on sink                               → shape   → exposed
//! close-notify + push, no takeover            → Modern  → close-notify, push
//! close-notify + flush + takeover + read-from → Legacy  → the same four
//! anything else                               → Minimal → nothing (warning emitted)
//! ```
//!
//! # Design Decisions
//! - Classification happens once in `wrap` from the sink's `as_*` accessors;
//!   the shape never changes afterwards
//! - Unknown shapes lose their optional capabilities instead of being
//!   forwarded partially
//! - Errors from the wrapped sink pass through untouched

use std::fmt;
use std::io::{self, Read};

use http::{HeaderMap, StatusCode};
use tokio::sync::oneshot;

use crate::http::sink::{
    probe, Capability, CapabilitySet, CloseNotify, Connection, Flush, Push, PushOptions,
    ReadFrom, ResponseSink, Takeover,
};

const MODERN: CapabilitySet = CapabilitySet::of(&[Capability::CloseNotify, Capability::Push]);
const LEGACY: CapabilitySet = CapabilitySet::of(&[
    Capability::CloseNotify,
    Capability::Flush,
    Capability::Takeover,
    Capability::ReadFrom,
]);

/// Classification of a sink's optional capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityShape {
    /// Multiplexed stream: close notification and push, no takeover.
    Modern,
    /// Dedicated connection: close notification, flush, takeover and bulk copy.
    Legacy,
    /// Unrecognized combination; only the baseline operations are exposed.
    Minimal,
}

impl CapabilityShape {
    pub fn classify(found: CapabilitySet) -> Self {
        let has = |cap| found.contains(cap);

        if !has(Capability::Takeover) && has(Capability::Push) && has(Capability::CloseNotify) {
            CapabilityShape::Modern
        } else if has(Capability::CloseNotify)
            && has(Capability::Flush)
            && has(Capability::Takeover)
            && has(Capability::ReadFrom)
        {
            CapabilityShape::Legacy
        } else {
            CapabilityShape::Minimal
        }
    }

    /// Capabilities a decorated sink of this shape exposes.
    pub const fn exposed(self) -> CapabilitySet {
        match self {
            CapabilityShape::Modern => MODERN,
            CapabilityShape::Legacy => LEGACY,
            CapabilityShape::Minimal => CapabilitySet::EMPTY,
        }
    }
}

/// Receives diagnostics the decorator cannot act on itself.
pub trait Diagnostics: Send + Sync {
    /// A sink exposed a capability combination no shape matches.
    fn unsupported_shape(&self, found: CapabilitySet);
}

/// Reports diagnostics as `tracing` warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn unsupported_shape(&self, found: CapabilitySet) {
        tracing::warn!(
            capabilities = %found,
            "Unsupported response sink capabilities, forwarding baseline operations only"
        );
    }
}

type StartedHook<'a> = Box<dyn FnMut(StatusCode, &HeaderMap) + 'a>;
type TakenOverHook<'a> = Box<dyn FnMut() + 'a>;

/// A response sink that reports when the response starts and when the
/// connection is taken over.
pub struct TrackedWriter<'a> {
    inner: &'a mut dyn ResponseSink,
    shape: CapabilityShape,
    exposed: CapabilitySet,
    status: Option<StatusCode>,
    size: u64,
    started: bool,
    taken_over: bool,
    on_started: StartedHook<'a>,
    on_taken_over: TakenOverHook<'a>,
}

impl<'a> TrackedWriter<'a> {
    pub fn wrap(
        inner: &'a mut dyn ResponseSink,
        on_started: impl FnMut(StatusCode, &HeaderMap) + 'a,
        on_taken_over: impl FnMut() + 'a,
        diagnostics: &dyn Diagnostics,
    ) -> Self {
        let found = probe(&mut *inner);
        let shape = CapabilityShape::classify(found);
        if shape == CapabilityShape::Minimal {
            diagnostics.unsupported_shape(found);
        }

        Self {
            inner,
            shape,
            exposed: shape.exposed(),
            status: None,
            size: 0,
            started: false,
            taken_over: false,
            on_started: Box::new(on_started),
            on_taken_over: Box::new(on_taken_over),
        }
    }

    pub fn shape(&self) -> CapabilityShape {
        self.shape
    }

    /// Status of the response, if one has been committed.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Body bytes accepted by the wrapped sink.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn taken_over(&self) -> bool {
        self.taken_over
    }

    fn start(&mut self, status: StatusCode) {
        if self.started {
            return;
        }
        self.started = true;
        self.status = Some(status);
        (self.on_started)(status, self.inner.headers());
    }

    fn exposes(&self, cap: Capability) -> bool {
        self.exposed.contains(cap)
    }
}

fn vanished(cap: Capability) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("response sink no longer provides {cap}"),
    )
}

impl ResponseSink for TrackedWriter<'_> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        self.start(status);
        self.inner.write_header(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.start(StatusCode::OK);
        let n = self.inner.write(buf)?;
        self.size += n as u64;
        Ok(n)
    }

    fn as_close_notify(&mut self) -> Option<&mut dyn CloseNotify> {
        if self.exposes(Capability::CloseNotify) {
            Some(self)
        } else {
            None
        }
    }

    fn as_flush(&mut self) -> Option<&mut dyn Flush> {
        if self.exposes(Capability::Flush) {
            Some(self)
        } else {
            None
        }
    }

    fn as_takeover(&mut self) -> Option<&mut dyn Takeover> {
        if self.exposes(Capability::Takeover) {
            Some(self)
        } else {
            None
        }
    }

    fn as_push(&mut self) -> Option<&mut dyn Push> {
        if self.exposes(Capability::Push) {
            Some(self)
        } else {
            None
        }
    }

    fn as_read_from(&mut self) -> Option<&mut dyn ReadFrom> {
        if self.exposes(Capability::ReadFrom) {
            Some(self)
        } else {
            None
        }
    }

    fn capabilities(&mut self) -> CapabilitySet {
        self.exposed
    }
}

impl CloseNotify for TrackedWriter<'_> {
    fn close_notify(&mut self) -> oneshot::Receiver<()> {
        match self.inner.as_close_notify() {
            Some(inner) => inner.close_notify(),
            // The sender is dropped, so the receiver resolves with an error
            // right away, same as a connection that is already gone.
            None => oneshot::channel().1,
        }
    }
}

impl Flush for TrackedWriter<'_> {
    fn flush(&mut self) -> io::Result<()> {
        self.inner
            .as_flush()
            .ok_or_else(|| vanished(Capability::Flush))?
            .flush()
    }
}

impl Takeover for TrackedWriter<'_> {
    fn take_over(&mut self) -> io::Result<Connection> {
        if !self.taken_over {
            self.taken_over = true;
            (self.on_taken_over)();
        }
        self.inner
            .as_takeover()
            .ok_or_else(|| vanished(Capability::Takeover))?
            .take_over()
    }
}

impl Push for TrackedWriter<'_> {
    fn push(&mut self, target: &str, options: &PushOptions) -> io::Result<()> {
        self.inner
            .as_push()
            .ok_or_else(|| vanished(Capability::Push))?
            .push(target, options)
    }
}

impl ReadFrom for TrackedWriter<'_> {
    fn read_from(&mut self, src: &mut dyn Read) -> io::Result<u64> {
        self.start(StatusCode::OK);
        let n = self
            .inner
            .as_read_from()
            .ok_or_else(|| vanished(Capability::ReadFrom))?
            .read_from(src)?;
        self.size += n;
        Ok(n)
    }
}

impl fmt::Debug for TrackedWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedWriter")
            .field("shape", &self.shape)
            .field("status", &self.status)
            .field("size", &self.size)
            .field("taken_over", &self.taken_over)
            .finish_non_exhaustive()
    }
}
