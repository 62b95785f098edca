//! Build-time compiler.
//!
//! # Data Flow
//! ```text
//! RouteEntry (groups, terminal route, error table)
//!     → errors.rs (dispatch per error table identity, compiled once)
//!     → chain.rs (splice groups, place context + deferred boundary)
//!         → group.rs (group fragments, memoized by GroupId)
//!         → terminal.rs (function / formatted / static terminal)
//!     → runtime::CompiledChain
//! ```
//!
//! # Design Decisions
//! - One `Compiler` per route tree; its value table, group cache and
//!   binding counter span every route it compiles
//! - Error dispatch hangs off the route, not the group, so a group fragment
//!   is valid under any error table

pub mod chain;
pub mod errors;
pub mod group;
pub mod state;
pub mod terminal;

use std::collections::HashMap;
use std::sync::Arc;

use crate::compiler::errors::{compile_error_table, CompiledErrors};
use crate::compiler::group::GroupCache;
use crate::compiler::state::CompileState;
use crate::error::{CompileResult, ErrorRegistry, ErrorTable};
use crate::handler::HandlerGroup;
use crate::http::response::CannedResponse;
use crate::route::Route;
use crate::runtime::CompiledChain;

pub use group::compile_group;
pub use state::{ValueRef, ValueTable};

/// Everything registered for one method + path.
#[derive(Clone)]
pub struct RouteEntry {
    pub groups: Vec<Arc<HandlerGroup>>,
    pub route: Route,
    pub errors: Arc<ErrorTable>,
}

impl RouteEntry {
    pub fn new(groups: Vec<Arc<HandlerGroup>>, route: Route, errors: Arc<ErrorTable>) -> Self {
        Self { groups, route, errors }
    }
}

/// Summary of one compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub routes: usize,
    pub groups: usize,
    pub group_cache_hits: usize,
    pub error_tables: usize,
    pub values: usize,
    pub bindings: usize,
}

/// Compiles the entries of one route tree.
pub struct Compiler<'r> {
    registry: &'r ErrorRegistry,
    unhandled: Arc<CannedResponse>,
    values: ValueTable,
    cache: GroupCache,
    error_tables: HashMap<*const ErrorTable, CompiledErrors>,
    next_binding: usize,
    routes: usize,
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r ErrorRegistry, unhandled: CannedResponse) -> Self {
        Self {
            registry,
            unhandled: Arc::new(unhandled),
            values: ValueTable::new(),
            cache: GroupCache::new(),
            error_tables: HashMap::new(),
            next_binding: 0,
            routes: 0,
        }
    }

    /// Compile one entry. `parameterized` routes bind their path
    /// parameters into the context when it is allocated.
    pub fn compile_entry(&mut self, entry: &RouteEntry, parameterized: bool) -> CompileResult<CompiledChain> {
        // Tables are keyed by address. Interning keeps the table alive, so
        // the address stays unique for the whole compilation.
        let key = Arc::as_ptr(&entry.errors);
        if !self.error_tables.contains_key(&key) {
            let compiled = compile_error_table(&entry.errors, self.registry, &mut self.values, self.unhandled.clone())?;
            self.values.intern_arc(&entry.errors);
            self.error_tables.insert(key, compiled);
        }
        let errors = &self.error_tables[&key];

        let state = CompileState::new(&mut self.values, self.next_binding, parameterized);
        let (chain, counters) = chain::compile_chain(&entry.groups, &entry.route, errors, &mut self.cache, state)?;
        self.next_binding = counters.next_binding();
        self.routes += 1;
        Ok(chain)
    }

    pub fn stats(&self) -> CompileStats {
        CompileStats {
            routes: self.routes,
            groups: self.cache.len(),
            group_cache_hits: self.cache.hits(),
            error_tables: self.error_tables.len(),
            values: self.values.len(),
            bindings: self.next_binding,
        }
    }

    /// Finish compilation, keeping the interned values alive for the
    /// compiled routines.
    pub fn finish(self) -> (ValueTable, CompileStats) {
        let stats = self.stats();
        (self.values, stats)
    }
}
