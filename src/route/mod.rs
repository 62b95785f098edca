//! Route terminals.
//!
//! # Responsibilities
//! - Describe the final handler of a route (function, formatted, static)
//! - Carry the externally supplied serializers of formatted routes
//! - Carry the precomputed body and options of static routes
//!
//! # Design Decisions
//! - `A` is the leading argument of the terminal (`()` for normal routes,
//!   the error payload for dynamic error routes)
//! - Static routes are fully known at registration; their body is encoded
//!   once at compile time

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::handler::Invoke;

/// Schema-derived serializer supplied by the schema compiler.
pub type Serializer = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Final handler of a route.
pub enum Route<A = ()> {
    /// Returns the response body directly.
    Function(Invoke<Body, A>),
    /// Returns a value encoded by a serializer.
    Formatted(Formatted<A>),
    /// Body and options known at compile time.
    Static(StaticRoute),
}

impl<A> Clone for Route<A> {
    fn clone(&self) -> Self {
        match self {
            Route::Function(i) => Route::Function(i.clone()),
            Route::Formatted(f) => Route::Formatted(f.clone()),
            Route::Static(s) => Route::Static(s.clone()),
        }
    }
}

impl<A: Send + 'static> Route<A> {
    /// Route whose function output becomes the response body.
    pub fn function<B>(invoke: Invoke<B, A>) -> Self
    where
        B: Into<Body> + Send + 'static,
    {
        Route::Function(invoke.map(Into::into))
    }

    /// Route whose function output is serialized.
    pub fn formatted<T>(invoke: Invoke<T, A>) -> Formatted<A>
    where
        T: Serialize + Send + 'static,
    {
        Formatted {
            invoke: invoke.map(serde_json::to_value),
            serializer: None,
            by_status: Vec::new(),
        }
    }

    /// Static route with default options.
    pub fn fixed(body: impl Into<Value>) -> Self {
        Route::Static(StaticRoute::new(body))
    }
}

impl<A> From<Formatted<A>> for Route<A> {
    fn from(formatted: Formatted<A>) -> Self {
        Route::Formatted(formatted)
    }
}

impl<A> From<StaticRoute> for Route<A> {
    fn from(route: StaticRoute) -> Self {
        Route::Static(route)
    }
}

/// Output of a formatted route before serialization. A value that cannot
/// be represented as JSON answers with the "unhandled" response.
pub(crate) type Encoded = Result<Value, serde_json::Error>;

/// Function route encoded through schema-derived serializers.
pub struct Formatted<A = ()> {
    pub(crate) invoke: Invoke<Encoded, A>,
    pub(crate) serializer: Option<Serializer>,
    pub(crate) by_status: Vec<(StatusCode, Serializer)>,
}

impl<A> Clone for Formatted<A> {
    fn clone(&self) -> Self {
        Self {
            invoke: self.invoke.clone(),
            serializer: self.serializer.clone(),
            by_status: self.by_status.clone(),
        }
    }
}

impl<A: Send + 'static> Formatted<A> {
    pub fn new(invoke: Invoke<Value, A>) -> Self {
        Self {
            invoke: invoke.map(Ok),
            serializer: None,
            by_status: Vec::new(),
        }
    }
}

impl<A> Formatted<A> {
    /// Serializer used for every status without a dedicated one.
    pub fn serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Serializer used when the context status equals `status`.
    pub fn status_serializer(mut self, status: StatusCode, serializer: Serializer) -> Self {
        self.by_status.retain(|(s, _)| *s != status);
        self.by_status.push((status, serializer));
        self
    }

    pub fn into_route(self) -> Route<A> {
        Route::Formatted(self)
    }
}

/// Precomputed response.
#[derive(Debug, Clone)]
pub struct StaticRoute {
    pub(crate) body: Value,
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
}

impl StaticRoute {
    /// `Value::Null` yields an empty body, strings are sent as text and any
    /// other value as JSON.
    pub fn new(body: impl Into<Value>) -> Self {
        Self {
            body: body.into(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Value::Null)
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Context;
    use serde_json::json;

    #[test]
    fn test_route_variants() {
        let route: Route = Route::function(Invoke::bare(|| "hi"));
        assert!(matches!(route, Route::Function(ref i) if !i.is_deferred()));

        let route: Route = Route::formatted(Invoke::contextual(|c: &mut Context| c.status.as_u16())).into();
        assert!(matches!(route, Route::Formatted(ref f) if f.invoke.needs_context()));

        let route: Route = Route::fixed("Hi");
        assert!(matches!(route, Route::Static(ref s) if s.body == json!("Hi")));
    }

    #[test]
    fn test_status_serializer_replaces() {
        let first: Serializer = Arc::new(|_| "first".into());
        let second: Serializer = Arc::new(|_| "second".into());
        let formatted = Route::<()>::formatted(Invoke::bare(|| 1))
            .status_serializer(StatusCode::OK, first)
            .status_serializer(StatusCode::OK, second);

        assert_eq!(formatted.by_status.len(), 1);
        assert_eq!((formatted.by_status[0].1)(&json!(1)), "second");
    }
}
