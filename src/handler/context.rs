//! Per-request context shared by handlers of one route.
//!
//! # Responsibilities
//! - Carry response status and headers set by handlers
//! - Expose path parameters of parameterized routes
//! - Hold values written by stored handlers under dotted paths
//!
//! # Design Decisions
//! - Allocated lazily, at most once per request, by the compiled chain
//! - Exclusively owned by one invocation; never shared between requests

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// One captured path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Capture {
    name: Option<Arc<str>>,
    value: String,
}

/// Captures of a matched path, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    captures: Vec<Capture>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: Option<Arc<str>>, value: impl Into<String>) {
        self.captures.push(Capture {
            name,
            value: value.into(),
        });
    }

    /// Capture at `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.captures.get(index).map(|c| c.value.as_str())
    }

    /// Capture bound to a `:name` segment.
    pub fn named(&self, name: &str) -> Option<&str> {
        self.captures
            .iter()
            .find(|c| c.name.as_deref() == Some(name))
            .map(|c| c.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.captures.iter().map(|c| c.value.as_str())
    }
}

impl std::ops::Index<usize> for Params {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.captures[index].value
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Error returned when a context path cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid context path {0:?}: segments must be non-empty")]
pub struct InvalidContextPath(pub String);

/// Dotted location inside [`Context::state`] (e.g. `user.id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextPath(Arc<[String]>);

impl ContextPath {
    pub fn parse(path: &str) -> Result<Self, InvalidContextPath> {
        let segments: Vec<String> = path.split('.').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return Err(InvalidContextPath(path.to_owned()));
        }
        Ok(Self(segments.into()))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl FromStr for ContextPath {
    type Err = InvalidContextPath;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ContextPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Mutable per-request bag handed to context-aware handlers.
#[derive(Debug, Clone, Serialize)]
pub struct Context {
    /// Response status (200 until a handler changes it).
    #[serde(serialize_with = "serialize_status")]
    pub status: StatusCode,

    /// Extra response headers.
    #[serde(serialize_with = "serialize_headers")]
    pub headers: HeaderMap,

    /// Path captures; `None` for routes without parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,

    /// Values written by stored handlers.
    pub state: Map<String, Value>,
}

impl Context {
    pub fn new(params: Option<Params>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            params,
            state: Map::new(),
        }
    }

    /// Path capture at `index`, if the route is parameterized.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.as_ref().and_then(|p| p.get(index))
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    /// Read a value written under `path`.
    pub fn get(&self, path: &ContextPath) -> Option<&Value> {
        let (last, parents) = path.segments().split_last()?;
        let mut map = &self.state;
        for segment in parents {
            map = map.get(segment)?.as_object()?;
        }
        map.get(last)
    }

    /// Write `value` under `path`, creating intermediate objects.
    pub(crate) fn store(&mut self, path: &ContextPath, value: Value) {
        let Some((last, parents)) = path.segments().split_last() else {
            return;
        };
        let mut map = &mut self.state;
        for segment in parents {
            let slot = map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            map = match slot {
                Value::Object(inner) => inner,
                _ => return,
            };
        }
        map.insert(last.clone(), value);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(None)
    }
}

fn serialize_status<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(status.as_u16())
}

fn serialize_headers<S: Serializer>(headers: &HeaderMap, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(
        headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.to_str().unwrap_or_default())),
    )
}
