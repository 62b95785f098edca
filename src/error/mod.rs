//! Controlled-error protocol.
//!
//! # Data Flow
//! ```text
//! ErrorRegistry (one per route tree)
//!     → StaticError / DynamicError<T> (unique ErrorDescriptor)
//!     → handler returns Err(ControlledError { id, payload })
//!     → compiled checked point raises
//!     → compiler::errors dispatch (by id)
//!     → table.rs ErrorRoute renders the response
//! ```
//!
//! # Design Decisions
//! - Controlled errors are ordinary values, never panics
//! - Descriptors remember the registry that issued them, so a table
//!   referencing another tree's error is rejected at compile time
//! - Native faults inside handlers are out of scope and propagate

pub mod compile;
pub mod table;

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::Value;

pub use compile::{CompileError, CompileResult};
pub use table::{ErrorRoute, ErrorTable};

/// Value returned by a failing handler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("controlled error #{id}")]
pub struct ControlledError {
    id: u32,
    payload: Option<Value>,
}

impl ControlledError {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub(crate) fn into_payload(self) -> Value {
        self.payload.unwrap_or(Value::Null)
    }
}

/// Identity of one declared error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorDescriptor {
    id: u32,
    registry: u32,
    dynamic: bool,
}

impl ErrorDescriptor {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub(crate) fn registry(&self) -> u32 {
        self.registry
    }
}

impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.dynamic { "dynamic" } else { "static" };
        write!(f, "{kind} error #{}", self.id)
    }
}

/// Error kind without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticError {
    descriptor: ErrorDescriptor,
}

impl StaticError {
    pub fn descriptor(&self) -> ErrorDescriptor {
        self.descriptor
    }

    /// The controlled error to return from a handler.
    pub fn raise(&self) -> ControlledError {
        ControlledError {
            id: self.descriptor.id,
            payload: None,
        }
    }
}

/// Error kind carrying a payload of type `T`.
#[derive(Debug)]
pub struct DynamicError<T> {
    descriptor: ErrorDescriptor,
    _payload: PhantomData<fn(T)>,
}

impl<T> Clone for DynamicError<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DynamicError<T> {}

impl<T: Into<Value>> DynamicError<T> {
    pub fn descriptor(&self) -> ErrorDescriptor {
        self.descriptor
    }

    /// The controlled error to return from a handler, carrying `payload`.
    pub fn create(&self, payload: T) -> ControlledError {
        ControlledError {
            id: self.descriptor.id,
            payload: Some(payload.into()),
        }
    }
}

/// Issues error descriptors for one route tree.
#[derive(Debug)]
pub struct ErrorRegistry {
    id: u32,
    next: u32,
}

impl ErrorRegistry {
    pub fn new() -> Self {
        static NEXT_REGISTRY: AtomicU32 = AtomicU32::new(0);
        Self {
            id: NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed),
            next: 0,
        }
    }

    fn issue(&mut self, dynamic: bool) -> ErrorDescriptor {
        let descriptor = ErrorDescriptor {
            id: self.next,
            registry: self.id,
            dynamic,
        };
        self.next += 1;
        descriptor
    }

    pub fn static_error(&mut self) -> StaticError {
        StaticError {
            descriptor: self.issue(false),
        }
    }

    pub fn dynamic_error<T: Into<Value>>(&mut self) -> DynamicError<T> {
        DynamicError {
            descriptor: self.issue(true),
            _payload: PhantomData,
        }
    }

    /// Whether `descriptor` was issued by this registry.
    pub fn owns(&self, descriptor: &ErrorDescriptor) -> bool {
        descriptor.registry == self.id && descriptor.id < self.next
    }

    pub fn len(&self) -> usize {
        self.next as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next == 0
    }
}

impl Default for ErrorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
