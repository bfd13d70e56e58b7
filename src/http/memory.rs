//! In-memory response sink.
//!
//! Useful for driving handlers without a network server. The set of optional
//! capabilities it advertises is chosen at construction.

use std::io::{self, Cursor, Read};

use http::{HeaderMap, StatusCode};
use tokio::sync::oneshot;

use crate::http::sink::{
    Capability, CapabilitySet, CloseNotify, Connection, Flush, Push, PushOptions, ReadFrom,
    ResponseSink, Takeover,
};

#[derive(Debug, Default)]
pub struct MemorySink {
    headers: HeaderMap,
    status: Option<StatusCode>,
    body: Vec<u8>,
    capabilities: CapabilitySet,
    write_limit: Option<usize>,
    flushes: usize,
    pushed: Vec<String>,
    close_tx: Option<oneshot::Sender<()>>,
    taken_over: bool,
    peer_input: Vec<u8>,
}

impl MemorySink {
    /// A sink with no optional capabilities.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: CapabilitySet) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    /// The capability bundle of an HTTP/1.1 connection.
    pub fn http1() -> Self {
        Self::with_capabilities(CapabilitySet::of(&[
            Capability::CloseNotify,
            Capability::Flush,
            Capability::Takeover,
            Capability::ReadFrom,
        ]))
    }

    /// The capability bundle of an HTTP/2 stream.
    pub fn http2() -> Self {
        Self::with_capabilities(CapabilitySet::of(&[
            Capability::CloseNotify,
            Capability::Flush,
            Capability::Push,
        ]))
    }

    /// Accept at most `limit` bytes per `write` call.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Bytes the peer sent that a takeover hands back as buffered input.
    pub fn with_peer_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.peer_input = input.into();
        self
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn pushed(&self) -> &[String] {
        &self.pushed
    }

    pub fn is_taken_over(&self) -> bool {
        self.taken_over
    }

    /// Simulate the peer closing the connection.
    pub fn close_peer(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }

    fn has(&self, cap: Capability) -> bool {
        self.capabilities.contains(cap)
    }

    fn commit(&mut self) -> io::Result<()> {
        if self.taken_over {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection has been taken over",
            ));
        }
        self.status.get_or_insert(StatusCode::OK);
        Ok(())
    }
}

impl ResponseSink for MemorySink {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() && !self.taken_over {
            self.status = Some(status);
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.commit()?;
        let n = self.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        self.body.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn as_close_notify(&mut self) -> Option<&mut dyn CloseNotify> {
        if self.has(Capability::CloseNotify) {
            Some(self)
        } else {
            None
        }
    }

    fn as_flush(&mut self) -> Option<&mut dyn Flush> {
        if self.has(Capability::Flush) {
            Some(self)
        } else {
            None
        }
    }

    fn as_takeover(&mut self) -> Option<&mut dyn Takeover> {
        if self.has(Capability::Takeover) {
            Some(self)
        } else {
            None
        }
    }

    fn as_push(&mut self) -> Option<&mut dyn Push> {
        if self.has(Capability::Push) {
            Some(self)
        } else {
            None
        }
    }

    fn as_read_from(&mut self) -> Option<&mut dyn ReadFrom> {
        if self.has(Capability::ReadFrom) {
            Some(self)
        } else {
            None
        }
    }
}

impl CloseNotify for MemorySink {
    fn close_notify(&mut self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.close_tx = Some(tx);
        rx
    }
}

impl Flush for MemorySink {
    fn flush(&mut self) -> io::Result<()> {
        self.commit()?;
        self.flushes += 1;
        Ok(())
    }
}

impl Takeover for MemorySink {
    fn take_over(&mut self) -> io::Result<Connection> {
        if self.taken_over {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection has already been taken over",
            ));
        }
        self.taken_over = true;
        let mut conn = Connection::new(Cursor::new(Vec::new()));
        conn.buffered = std::mem::take(&mut self.peer_input);
        Ok(conn)
    }
}

impl Push for MemorySink {
    fn push(&mut self, target: &str, _options: &PushOptions) -> io::Result<()> {
        self.pushed.push(target.to_string());
        Ok(())
    }
}

impl ReadFrom for MemorySink {
    fn read_from(&mut self, src: &mut dyn Read) -> io::Result<u64> {
        self.commit()?;
        src.read_to_end(&mut self.body).map(|n| n as u64)
    }
}
