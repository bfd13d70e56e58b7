//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Exchange events
//!     → tracing.rs (debug spans per exchange)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → logging.rs (subscriber writing spans and events to stdout)
//!     → Metrics exporter installed by the application
//! ```
//!
//! # Design Decisions
//! - Both reporters are opt-in through configuration
//! - Reporters never fail an exchange

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::metrics::MetricsReporter;
pub use self::tracing::{DebugReporter, OperationName};
