//! Error tables binding declared error kinds to error routes.

use serde_json::Value;

use crate::error::{DynamicError, ErrorDescriptor, StaticError};
use crate::route::Route;

/// Route rendering one caught error kind.
#[derive(Clone)]
pub enum ErrorRoute {
    /// Static errors carry nothing to thread.
    Static(Route<()>),
    /// Dynamic errors pass their payload as the leading argument.
    Dynamic(Route<Value>),
}

impl ErrorRoute {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, ErrorRoute::Dynamic(_))
    }
}

/// Declared error kinds of a route tree and their handlers.
///
/// Entries keep declaration order. Duplicate ids are accepted here and
/// rejected when the table is compiled.
#[derive(Clone, Default)]
pub struct ErrorTable {
    entries: Vec<(ErrorDescriptor, ErrorRoute)>,
}

impl ErrorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catch_static(&mut self, error: &StaticError, route: Route<()>) -> &mut Self {
        self.entries.push((error.descriptor(), ErrorRoute::Static(route)));
        self
    }

    pub fn catch_dynamic<T: Into<Value>>(&mut self, error: &DynamicError<T>, route: Route<Value>) -> &mut Self {
        self.entries.push((error.descriptor(), ErrorRoute::Dynamic(route)));
        self
    }

    pub fn entries(&self) -> &[(ErrorDescriptor, ErrorRoute)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
