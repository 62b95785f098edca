//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (per-method table: exact map, then patterns)
//!     → matcher.rs (segment walk, parameter capture)
//!     → Return: compiled route + Params, or NoMatch
//!
//! Route Registration (at compile time):
//!     App routes
//!     → parse patterns (static, :name, trailing *)
//!     → reject duplicate method + path
//!     → freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled once, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::{Matcher, PathPattern};
pub use router::{PathTable, Router};
