//! HTTP exchange lifecycle reporting.
//!
//! Instruments a handler chain (or a client transport) so that a pluggable
//! [`Reporter`] observes every exchange: request started, request body read,
//! response started, response done, or connection taken over. Optional
//! response sink capabilities survive the instrumentation.

pub mod config;
pub mod http;
pub mod observability;
pub mod reporter;

pub use config::ReporterConfig;
pub use self::http::{ClientReporterLayer, Handler, ReporterLayer, ResponseSink};
pub use reporter::{Direction, Exchange, Reporter, Reporters, Tracker};
