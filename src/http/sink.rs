//! Response sink abstraction and its optional capabilities.
//!
//! # Responsibilities
//! - Define the baseline operations every response sink supports
//!   (headers, status, body writes)
//! - Define the optional capabilities a sink may additionally support
//! - Provide capability probing through `as_*` accessors
//!
//! # Design Decisions
//! - Probing is an accessor returning `Option<&mut dyn Capability>` rather
//!   than downcasting, so wrappers can choose exactly what they re-expose
//! - Capability errors are plain `io::Error`s from the transport

use std::fmt;
use std::io::{self, Read, Write};

use http::{HeaderMap, Method, StatusCode};
use tokio::sync::oneshot;

/// The writing half of an HTTP exchange, as seen by a handler.
///
/// Whether an `as_*` accessor returns `Some` must not change over the life
/// of the sink.
pub trait ResponseSink {
    /// Headers that will be sent with the response.
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commit the response status. Only the first call has an effect on the wire.
    fn write_header(&mut self, status: StatusCode);

    /// Write part of the body, returning how many bytes the sink accepted.
    /// Writing before `write_header` implies a 200 status.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Write the whole buffer, retrying partial writes.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ))
                }
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn as_close_notify(&mut self) -> Option<&mut dyn CloseNotify> {
        None
    }

    fn as_flush(&mut self) -> Option<&mut dyn Flush> {
        None
    }

    fn as_takeover(&mut self) -> Option<&mut dyn Takeover> {
        None
    }

    fn as_push(&mut self) -> Option<&mut dyn Push> {
        None
    }

    fn as_read_from(&mut self) -> Option<&mut dyn ReadFrom> {
        None
    }

    /// The optional capabilities this sink supports. Must agree with the
    /// `as_*` accessors.
    fn capabilities(&mut self) -> CapabilitySet {
        probe(self)
    }
}

/// Ask each `as_*` accessor of `sink` whether its capability is present.
pub fn probe<S: ResponseSink + ?Sized>(sink: &mut S) -> CapabilitySet {
    let mut set = CapabilitySet::EMPTY;
    if sink.as_close_notify().is_some() {
        set.insert(Capability::CloseNotify);
    }
    if sink.as_flush().is_some() {
        set.insert(Capability::Flush);
    }
    if sink.as_takeover().is_some() {
        set.insert(Capability::Takeover);
    }
    if sink.as_push().is_some() {
        set.insert(Capability::Push);
    }
    if sink.as_read_from().is_some() {
        set.insert(Capability::ReadFrom);
    }
    set
}

/// Notification that the peer has gone away.
pub trait CloseNotify {
    /// The receiver resolves once the underlying connection closes.
    fn close_notify(&mut self) -> oneshot::Receiver<()>;
}

/// Sends buffered response data to the peer immediately.
pub trait Flush {
    fn flush(&mut self) -> io::Result<()>;
}

/// Hands the raw connection over to the caller.
///
/// After a takeover the sink must no longer be used to write the response.
pub trait Takeover {
    fn take_over(&mut self) -> io::Result<Connection>;
}

/// Server-initiated push of an additional resource.
pub trait Push {
    fn push(&mut self, target: &str, options: &PushOptions) -> io::Result<()>;
}

/// Bulk copy of a body from a reader, possibly bypassing userspace buffers.
pub trait ReadFrom {
    fn read_from(&mut self, src: &mut dyn Read) -> io::Result<u64>;
}

/// A bidirectional byte stream.
pub trait Transport: Read + Write + Send {}

impl<T: Read + Write + Send> Transport for T {}

/// A connection handed over by [`Takeover::take_over`].
pub struct Connection {
    pub transport: Box<dyn Transport>,
    /// Bytes already read from the peer but not consumed by the server.
    pub buffered: Vec<u8>,
}

impl Connection {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            buffered: Vec::new(),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("buffered", &self.buffered.len())
            .finish_non_exhaustive()
    }
}

/// Options of a push promise.
#[derive(Debug, Clone)]
pub struct PushOptions {
    pub method: Method,
    pub headers: HeaderMap,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
        }
    }
}

/// One optional response sink capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CloseNotify,
    Flush,
    Takeover,
    Push,
    ReadFrom,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::CloseNotify,
        Capability::Flush,
        Capability::Takeover,
        Capability::Push,
        Capability::ReadFrom,
    ];

    const fn bit(self) -> u8 {
        1 << self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::CloseNotify => "close-notify",
            Capability::Flush => "flush",
            Capability::Takeover => "takeover",
            Capability::Push => "push",
            Capability::ReadFrom => "read-from",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of [`Capability`] values.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const EMPTY: CapabilitySet = CapabilitySet(0);

    pub const fn of(caps: &[Capability]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < caps.len() {
            bits |= caps[i].bit();
            i += 1;
        }
        CapabilitySet(bits)
    }

    pub const fn contains(self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    pub fn insert(&mut self, cap: Capability) {
        self.0 |= cap.bit();
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::EMPTY;
        for cap in iter {
            set.insert(cap);
        }
        set
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (i, cap) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{cap}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_set() {
        let mut set = CapabilitySet::of(&[Capability::Push, Capability::CloseNotify]);
        assert!(set.contains(Capability::Push));
        assert!(!set.contains(Capability::Flush));
        assert_eq!(set.to_string(), "close-notify, push");

        set.insert(Capability::Flush);
        assert_eq!(set.iter().count(), 3);
        assert_eq!(CapabilitySet::EMPTY.to_string(), "none");
        assert_eq!(
            Capability::ALL.into_iter().collect::<CapabilitySet>().iter().count(),
            5
        );
    }
}
