//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Request (from axum, hyper or any tower stack)
//!     → service.rs (tower::Service for Dispatcher)
//!     → app::Dispatcher (route lookup, compiled chain)
//!     → response.rs (context head + body, canned responses)
//!     → Response
//! ```

pub mod response;
pub mod service;

pub use response::{CannedResponse, ResponseHead, JSON_CONTENT_TYPE, TEXT_CONTENT_TYPE};
pub use service::DispatchFuture;
