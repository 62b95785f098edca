//! Path pattern matching.
//!
//! # Responsibilities
//! - Parse route paths into static or parameterized patterns
//! - Match a request path and extract its parameters
//!
//! # Pattern Syntax
//! ```text
//! /users/list     static, matched by exact lookup
//! /users/:id      one non-empty segment, captured as "id"
//! /files/*        the rest of the path (possibly empty), captured as one value
//! ```
//!
//! # Design Decisions
//! - Matching is case-sensitive
//! - No regex: a pattern is a segment list walked once per request

use std::fmt;
use std::sync::Arc;

use crate::error::{CompileError, CompileResult};
use crate::handler::Params;

/// Something that can match a request path.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// The captured parameters if `path` matches.
    fn capture(&self, path: &str) -> Option<Params>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(Arc<str>),
    Rest,
}

/// Parsed route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(path: &str) -> CompileResult<Self> {
        let invalid = |reason| CompileError::InvalidPath {
            path: path.to_string(),
            reason,
        };

        let body = path.strip_prefix('/').ok_or_else(|| invalid("must start with '/'"))?;
        let parts: Vec<&str> = body.split('/').collect();
        let last = parts.len() - 1;

        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = if *part == "*" {
                if i != last {
                    return Err(invalid("'*' must be the last segment"));
                }
                Segment::Rest
            } else if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("parameter name is empty"));
                }
                Segment::Param(name.into())
            } else {
                Segment::Static(part.to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    /// Whether the pattern has no parameters.
    pub fn is_static(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Static(_)))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Matcher for PathPattern {
    fn capture(&self, path: &str) -> Option<Params> {
        let mut rest = path.strip_prefix('/')?;
        let mut params = Params::new();
        let last = self.segments.len() - 1;

        for (i, segment) in self.segments.iter().enumerate() {
            if let Segment::Rest = segment {
                params.push(None, rest);
                return Some(params);
            }

            let (head, tail) = match rest.split_once('/') {
                Some((head, tail)) => (head, Some(tail)),
                None => (rest, None),
            };
            match segment {
                Segment::Static(expected) if head == expected => {}
                Segment::Param(name) if !head.is_empty() => params.push(Some(name.clone()), head),
                _ => return None,
            }

            match (tail, i == last) {
                (None, true) => return Some(params),
                (Some(tail), false) => rest = tail,
                _ => return None,
            }
        }
        None
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
