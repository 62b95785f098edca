//! Build-time compile state and value interning.
//!
//! # Responsibilities
//! - Collect emitted pieces and their listing lines
//! - Intern runtime values (handlers, serializers, precomputed responses)
//!   so each distinct value gets exactly one stable reference
//! - Hand out binding names that stay unique across one compilation
//!
//! # Design Decisions
//! - A derived state shares the value table but owns its buffer, so a group
//!   compiled in isolation can be cached and replayed as one unit
//! - Values are keyed by `Arc` address; the table keeps every interned value
//!   alive, so an address is never reused within one compilation

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::runtime::ops::{Fragment, Op};

/// Stable reference to an interned value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueRef(usize);

impl fmt::Display for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identity-deduplicated table of captured values.
#[derive(Default)]
pub struct ValueTable {
    slots: Vec<Box<dyn Any + Send + Sync>>,
    index: HashMap<usize, ValueRef>,
}

impl ValueTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a shared value by identity.
    pub fn intern_arc<T>(&mut self, value: &Arc<T>) -> ValueRef
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = Arc::as_ptr(value) as *const () as usize;
        if let Some(existing) = self.index.get(&key) {
            return *existing;
        }
        let slot = ValueRef(self.slots.len());
        self.slots.push(Box::new(value.clone()));
        self.index.insert(key, slot);
        slot
    }

    /// Intern a freshly built value.
    pub fn intern<T>(&mut self, value: T) -> (ValueRef, Arc<T>)
    where
        T: Send + Sync + 'static,
    {
        let value = Arc::new(value);
        (self.intern_arc(&value), value)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for ValueTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueTable").field("len", &self.slots.len()).finish()
    }
}

/// Name of one intermediate handler result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding(usize);

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// One emitted element, in output order.
#[derive(Clone)]
pub(crate) enum Emitted {
    /// A compiled handler (inside a group).
    Op(Op),
    /// Context allocation point (route level).
    Allocate,
    /// Deferred scope boundary (route level).
    OpenScope,
    /// A cached group fragment (route level).
    Group(Arc<Fragment>),
}

/// Counters carried from a derived state back to its parent.
#[derive(Debug, Clone, Copy)]
pub struct Counters {
    next_binding: usize,
}

impl Counters {
    pub fn next_binding(&self) -> usize {
        self.next_binding
    }
}

/// Mutable context of one compilation unit (a route, or a group compiled
/// in isolation).
pub struct CompileState<'v> {
    buffer: Vec<Emitted>,
    lines: Vec<String>,
    values: &'v mut ValueTable,
    next_binding: usize,
    deferred: bool,
    context: bool,
    parameterized: bool,
}

impl<'v> CompileState<'v> {
    /// Root state for one method + path entry.
    pub fn new(values: &'v mut ValueTable, first_binding: usize, parameterized: bool) -> Self {
        Self {
            buffer: Vec::new(),
            lines: Vec::new(),
            values,
            next_binding: first_binding,
            deferred: false,
            context: false,
            parameterized,
        }
    }

    /// Independent child with its own buffer, sharing the value table and
    /// continuing the binding counter.
    pub fn derive(&mut self) -> CompileState<'_> {
        CompileState {
            buffer: Vec::new(),
            lines: Vec::new(),
            values: &mut *self.values,
            next_binding: self.next_binding,
            deferred: false,
            context: false,
            parameterized: self.parameterized,
        }
    }

    /// Take the counters of a finished child so later bindings stay unique.
    /// The child's buffer is not appended here.
    pub fn sync(&mut self, child: Counters) {
        self.next_binding = self.next_binding.max(child.next_binding);
    }

    pub(crate) fn finish(self) -> (Vec<Emitted>, Vec<String>, Counters) {
        let counters = self.counters();
        (self.buffer, self.lines, counters)
    }

    pub fn counters(&self) -> Counters {
        Counters {
            next_binding: self.next_binding,
        }
    }

    pub fn values(&mut self) -> &mut ValueTable {
        &mut *self.values
    }

    pub fn bind(&mut self) -> Binding {
        let binding = Binding(self.next_binding);
        self.next_binding += 1;
        binding
    }

    pub fn next_binding(&self) -> usize {
        self.next_binding
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub fn has_context(&self) -> bool {
        self.context
    }

    pub(crate) fn emit(&mut self, item: Emitted, line: String) {
        self.buffer.push(item);
        self.lines.push(line);
    }

    /// Emit without a listing line of its own.
    pub(crate) fn emit_silent(&mut self, item: Emitted) {
        self.buffer.push(item);
    }

    /// Add a listing line with no emitted element.
    pub(crate) fn note(&mut self, line: String) {
        self.lines.push(line);
    }

    /// Open the deferred scope; a no-op once it is open.
    pub(crate) fn open_scope(&mut self) {
        if !self.deferred {
            self.deferred = true;
            self.emit(Emitted::OpenScope, "async {".to_string());
        }
    }

    /// Allocate the shared context; a no-op once it is allocated.
    pub(crate) fn allocate(&mut self) {
        if !self.context {
            self.context = true;
            let line = if self.parameterized {
                "let c = {status:200, headers:[], params}"
            } else {
                "let c = {status:200, headers:[]}"
            };
            self.emit(Emitted::Allocate, line.to_string());
        }
    }
}
