//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Compiler and dispatcher produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters via the metrics facade)
//!
//! Consumers:
//!     → any tracing subscriber (init_logging installs fmt + EnvFilter)
//!     → any metrics recorder installed by the host application
//! ```
//!
//! # Design Decisions
//! - Structured fields, never formatted strings, for machine parsing
//! - Metrics are cheap (no-ops until a recorder is installed)

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
