//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ReporterConfig (validated, immutable)
//!     → ReporterConfig::reporter() builds the enabled reporters
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Every reporter is disabled unless its section enables it
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{DebugConfig, LoggingConfig, MetricsConfig, ReporterConfig};
pub use validation::ValidationError;
