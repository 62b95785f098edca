//! Build-time dispatch compiler.
//!
//! Turns a declarative tree of routes, middleware groups and error handlers
//! into one specialized dispatch routine per method + path.
//!
//! # Architecture Overview
//!
//! ```text
//!   App (registration)                        Dispatcher (per request)
//!   ──────────────────                        ────────────────────────
//!   handler / route / error    ┌──────────┐    routing ─▶ CompiledChain
//!        │                     │ compiler │        │          │
//!        ▼                     │  state   │        ▼          ▼
//!   RouteEntry ───────────────▶│  group   │──▶  runtime: prefix ─▶ scope
//!   (groups, route, errors)    │ terminal │        │
//!                              │  errors  │        ▼
//!                              │  chain   │    Dispatch::Ready | Pending
//!                              └──────────┘
//!
//!   Cross-cutting: config (TOML), observability (tracing, metrics)
//! ```
//!
//! # Example
//!
//! ```
//! use dispatch_compiler::{App, Context, Handler, Invoke, Route};
//!
//! let mut app = App::new();
//! app.use_handler(Handler::unchecked(Invoke::contextual(|c: &mut Context| {
//!     c.status = axum::http::StatusCode::ACCEPTED;
//! })));
//! app.get("/", Route::fixed("Hi"));
//! app.get("/*", Route::function(Invoke::contextual(|c: &mut Context| {
//!     c.param(0).unwrap_or_default().to_string()
//! })));
//!
//! let dispatcher = app.compile().unwrap();
//! let response = dispatcher.handle(&axum::http::Method::GET, "/abc").into_ready().unwrap();
//! assert_eq!(response.status(), axum::http::StatusCode::ACCEPTED);
//! ```

// Data model
pub mod error;
pub mod handler;
pub mod route;

// Compilation
pub mod compiler;
pub mod runtime;

// Collaborators
pub mod app;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use app::{App, Dispatcher};
pub use compiler::{CompileStats, Compiler, RouteEntry};
pub use config::{load_config, DispatchConfig};
pub use error::{CompileError, ControlledError, DynamicError, ErrorRegistry, ErrorTable, StaticError};
pub use handler::{Context, ContextPath, Handler, HandlerGroup, HandlerResult, Invoke, Params};
pub use route::{Formatted, Route, Serializer, StaticRoute};
pub use runtime::Dispatch;
