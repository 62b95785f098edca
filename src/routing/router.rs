//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes per method
//! - Look up the route for a method + path, with its parameters
//! - Return an explicit miss rather than a silent default
//!
//! # Design Decisions
//! - Immutable after construction (shared without locks)
//! - O(1) lookup for static paths via HashMap
//! - O(n) scan of parameterized patterns, first registered wins

use std::collections::HashMap;

use axum::http::Method;

use crate::handler::Params;
use crate::routing::matcher::{Matcher, PathPattern};

/// Routes of one method.
#[derive(Debug)]
pub struct PathTable<T> {
    exact: HashMap<String, T>,
    patterns: Vec<(PathPattern, T)>,
}

impl<T> Default for PathTable<T> {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            patterns: Vec::new(),
        }
    }
}

impl<T> PathTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. Returns `false` if the same path is already present.
    pub fn insert(&mut self, pattern: PathPattern, value: T) -> bool {
        if pattern.is_static() {
            if self.exact.contains_key(pattern.as_str()) {
                return false;
            }
            self.exact.insert(pattern.as_str().to_string(), value);
        } else {
            if self.patterns.iter().any(|(p, _)| *p == pattern) {
                return false;
            }
            self.patterns.push((pattern, value));
        }
        true
    }

    /// Exact paths first, then patterns in registration order.
    pub fn lookup(&self, path: &str) -> Option<(&T, Option<Params>)> {
        if let Some(value) = self.exact.get(path) {
            return Some((value, None));
        }
        self.patterns
            .iter()
            .find_map(|(pattern, value)| pattern.capture(path).map(|params| (value, Some(params))))
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Method + path router.
#[derive(Debug)]
pub struct Router<T> {
    methods: HashMap<Method, PathTable<T>>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }
}

impl<T> Router<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. Returns `false` on a duplicate method + path.
    pub fn insert(&mut self, method: Method, pattern: PathPattern, value: T) -> bool {
        self.methods.entry(method).or_default().insert(pattern, value)
    }

    pub fn lookup(&self, method: &Method, path: &str) -> Option<(&T, Option<Params>)> {
        self.methods.get(method)?.lookup(path)
    }

    pub fn len(&self) -> usize {
        self.methods.values().map(PathTable::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
