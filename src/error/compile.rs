//! Compile-time defects of a route tree.

use axum::http::Method;
use thiserror::Error;

/// Errors that abort compilation before a dispatcher is produced.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Two error routes were declared for one error kind.
    #[error("error #{id} is handled more than once")]
    DuplicateErrorHandler { id: u32 },

    /// An error route references an error kind this route tree never issued.
    #[error("error #{id} was not declared by this route tree")]
    UnknownError { id: u32 },

    /// Two routes were registered for one method and path.
    #[error("route {method} {path} is registered more than once")]
    DuplicateRoute { method: Method, path: String },

    /// A path pattern could not be parsed.
    #[error("invalid path pattern {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// A static body could not be encoded.
    #[error("static body could not be serialized: {0}")]
    StaticBody(#[from] serde_json::Error),
}

/// Result alias for compilation.
pub type CompileResult<T> = Result<T, CompileError>;
