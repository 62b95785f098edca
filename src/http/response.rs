//! Response construction.
//!
//! # Responsibilities
//! - Turn a route body plus the request context into an HTTP response
//! - Hold the shared "not found" and "unhandled" responses
//! - Precompute header values reused by every formatted route
//!
//! # Design Decisions
//! - Status and headers come from the context only when one was allocated;
//!   otherwise the response is a plain 200
//! - Canned bodies are `Bytes`, so building a response never copies them

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;

/// Content type attached by formatted routes.
pub const JSON_CONTENT_TYPE: HeaderValue = HeaderValue::from_static("application/json");

/// Content type of static text bodies.
pub const TEXT_CONTENT_TYPE: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");

/// Status and headers taken from a request context.
#[derive(Debug, Default)]
pub struct ResponseHead {
    parts: Option<(StatusCode, HeaderMap)>,
}

impl ResponseHead {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            parts: Some((status, headers)),
        }
    }

    /// Head of a request that never allocated a context.
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.parts
            .as_ref()
            .map(|(status, _)| *status)
            .unwrap_or(StatusCode::OK)
    }

    pub fn respond(self, body: Body) -> Response {
        let mut response = Response::new(body);
        if let Some((status, headers)) = self.parts {
            *response.status_mut() = status;
            *response.headers_mut() = headers;
        }
        response
    }

    /// Response carrying `body` as JSON.
    pub fn respond_json(self, body: String) -> Response {
        let mut response = self.respond(Body::from(body));
        response
            .headers_mut()
            .entry(header::CONTENT_TYPE)
            .or_insert(JSON_CONTENT_TYPE);
        response
    }
}

/// Fixed response rebuilt on demand from shared parts.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl CannedResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub(crate) fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn response(&self) -> Response {
        let body = if self.body.is_empty() {
            Body::empty()
        } else {
            Body::from(self.body.clone())
        };
        self.respond(body)
    }

    /// Shared status and headers around a body built by the caller.
    pub(crate) fn respond(&self, body: Body) -> Response {
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        response.headers_mut().clone_from(&self.headers);
        response
    }
}
