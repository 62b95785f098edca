//! Runtime side of compiled routines.
//!
//! # Data Flow
//! ```text
//! Dispatcher::dispatch(request)
//!     → chain.rs (CompiledChain::invoke with path params)
//!     → frame.rs (Frame: lazily allocated Context)
//!     → ops.rs (synchronous prefix, then one deferred scope)
//!     → errors.rs (controlled error → error route or "unhandled")
//!     → dispatch.rs (Dispatch::Ready | Dispatch::Pending)
//! ```
//!
//! # Design Decisions
//! - Everything here is immutable after compilation and shared across
//!   requests; only `Frame` is per request
//! - No run-time classification: each operation was specialized when built

pub mod chain;
pub mod dispatch;
pub(crate) mod errors;
pub mod frame;
pub mod ops;

pub use chain::CompiledChain;
pub use dispatch::Dispatch;
pub use frame::Frame;
pub use ops::Fragment;
