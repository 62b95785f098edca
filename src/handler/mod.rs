//! Handler data model.
//!
//! # Data Flow
//! ```text
//! Registration (App builder)
//!     → callable.rs (Invoke: sync/deferred, bare/contextual)
//!     → Handler (variant: composable / checked / unchecked, discarded / stored)
//!     → HandlerGroup (ordered, identity-keyed, immutable)
//!     → compiler::group (compiled once per GroupId)
//! ```
//!
//! # Design Decisions
//! - Deferred and needs-context flags are fixed when a handler is built
//! - Groups are shared through `Arc` and identified by a registration id
//! - Unchecked handlers cannot produce controlled errors (enforced by type)

pub mod callable;
pub mod context;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::error::ControlledError;

pub use callable::Invoke;
pub use context::{Context, ContextPath, InvalidContextPath, Params};

/// Outcome of a checked handler.
pub type HandlerResult = Result<Value, ControlledError>;

/// Unit of middleware.
#[derive(Clone)]
pub enum Handler {
    /// Nested chain compiled on its own and spliced in place.
    Composable(Arc<HandlerGroup>),
    /// Result checked for a controlled error, success value dropped.
    CheckedDiscarded(Invoke<HandlerResult>),
    /// Result dropped without inspection.
    UncheckedDiscarded(Invoke<Value>),
    /// Result checked, success value written to the context.
    CheckedStored(Invoke<HandlerResult>, ContextPath),
    /// Result written to the context as is.
    UncheckedStored(Invoke<Value>, ContextPath),
}

impl Handler {
    /// Handler whose controlled errors short-circuit the chain.
    pub fn checked<T>(invoke: Invoke<Result<T, ControlledError>>) -> Self
    where
        T: Send + 'static,
    {
        Handler::CheckedDiscarded(invoke.map(|r: Result<T, ControlledError>| r.map(|_| Value::Null)))
    }

    /// Handler run for its side effects only.
    pub fn unchecked<T>(invoke: Invoke<T>) -> Self
    where
        T: Send + 'static,
    {
        Handler::UncheckedDiscarded(invoke.map(|_| Value::Null))
    }

    /// Checked handler whose success value is stored under `path`.
    pub fn checked_store<T>(path: ContextPath, invoke: Invoke<Result<T, ControlledError>>) -> Self
    where
        T: Into<Value> + Send + 'static,
    {
        Handler::CheckedStored(
            invoke.map(|r: Result<T, ControlledError>| r.map(Into::into)),
            path,
        )
    }

    /// Handler whose value is stored under `path`.
    pub fn unchecked_store<T>(path: ContextPath, invoke: Invoke<T>) -> Self
    where
        T: Into<Value> + Send + 'static,
    {
        Handler::UncheckedStored(invoke.map(Into::into), path)
    }

    pub fn is_deferred(&self) -> bool {
        match self {
            Handler::Composable(group) => group.is_deferred(),
            Handler::CheckedDiscarded(i) | Handler::CheckedStored(i, _) => i.is_deferred(),
            Handler::UncheckedDiscarded(i) | Handler::UncheckedStored(i, _) => i.is_deferred(),
        }
    }

    pub fn needs_context(&self) -> bool {
        match self {
            Handler::Composable(group) => group.needs_context(),
            Handler::CheckedDiscarded(i) => i.needs_context(),
            Handler::UncheckedDiscarded(i) => i.needs_context(),
            // Stored handlers write into the context.
            Handler::CheckedStored(..) | Handler::UncheckedStored(..) => true,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Handler::Composable(_) => "composable",
            Handler::CheckedDiscarded(_) => "checked",
            Handler::UncheckedDiscarded(_) => "unchecked",
            Handler::CheckedStored(..) => "checked-store",
            Handler::UncheckedStored(..) => "unchecked-store",
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("kind", &self.kind())
            .field("deferred", &self.is_deferred())
            .field("needs_context", &self.needs_context())
            .finish()
    }
}

/// Registration-time identity of a [`HandlerGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u64);

impl GroupId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Ordered middleware chain compiled and cached as one unit.
#[derive(Debug)]
pub struct HandlerGroup {
    id: GroupId,
    handlers: Vec<Handler>,
    deferred: bool,
    needs_context: bool,
}

impl HandlerGroup {
    pub fn new(handlers: Vec<Handler>) -> Arc<Self> {
        let deferred = handlers.iter().any(Handler::is_deferred);
        let needs_context = handlers.iter().any(Handler::needs_context);
        Arc::new(Self {
            id: GroupId::next(),
            handlers,
            deferred,
            needs_context,
        })
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub fn needs_context(&self) -> bool {
        self.needs_context
    }
}
