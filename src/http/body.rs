//! Blocking request body and its completion tracker.
//!
//! # Design Decisions
//! - Closing a body is dropping it, so a handler that abandons the body still
//!   completes the tracker
//! - Read errors are returned untouched and do not complete the tracker

use std::fmt;
use std::io::{self, Cursor, Read};

/// Request body handed to a [`Handler`](crate::http::Handler).
pub struct Body {
    inner: Box<dyn Read + Send>,
}

impl Body {
    pub fn empty() -> Self {
        Self::from_reader(io::empty())
    }

    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            inner: Box::new(reader),
        }
    }

    /// Close the body without reading the rest of it.
    pub fn close(self) {}
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_reader(Cursor::new(bytes))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Self::from_reader(bytes)
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self::from(s.as_bytes())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::from(s.into_bytes())
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish_non_exhaustive()
    }
}

/// Wraps a body and calls `on_complete` with the number of bytes read once
/// the body hits end-of-stream or is closed, whichever comes first.
pub struct TrackedBody<F>
where
    F: FnOnce(u64),
{
    inner: Body,
    size: u64,
    on_complete: Option<F>,
}

impl<F> TrackedBody<F>
where
    F: FnOnce(u64),
{
    pub fn new(inner: Body, on_complete: F) -> Self {
        Self {
            inner,
            size: 0,
            on_complete: Some(on_complete),
        }
    }

    /// Bytes read so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    fn complete(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(self.size);
        }
    }
}

impl<F> Read for TrackedBody<F>
where
    F: FnOnce(u64),
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.complete();
        }
        self.size += n as u64;
        Ok(n)
    }
}

impl<F> Drop for TrackedBody<F>
where
    F: FnOnce(u64),
{
    fn drop(&mut self) {
        self.complete();
    }
}
