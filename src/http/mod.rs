//! HTTP exchange instrumentation.
//!
//! # Data Flow
//! ```text
//! server:
//!   request
//!     → middleware.rs (Reporter::track, start clock)
//!     → body.rs (request body wrapped, request_read)
//!     → writer.rs (response sink wrapped, response_started / conn_taken_over)
//!     → next handler
//!     → middleware.rs (response_done unless taken over)
//!
//! client:
//!   request
//!     → client.rs (tower service wrapper, bodies wrapped both ways)
//! ```

pub mod body;
pub mod client;
pub mod memory;
pub mod middleware;
pub mod sink;
pub mod writer;

pub use body::{Body, TrackedBody};
pub use client::{ClientReporterLayer, ReportedBody, ReportedClient};
pub use memory::MemorySink;
pub use middleware::{Handler, Outcome, Reported, ReporterLayer};
pub use sink::{
    Capability, CapabilitySet, CloseNotify, Connection, Flush, Push, PushOptions, ReadFrom,
    ResponseSink, Takeover, Transport,
};
pub use writer::{CapabilityShape, Diagnostics, TracingDiagnostics, TrackedWriter};
