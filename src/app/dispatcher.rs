//! Compiled dispatch routine of a route tree.

use std::fmt;
use std::sync::Arc;

use axum::http::{Method, Request};

use crate::compiler::{CompileStats, ValueTable};
use crate::http::response::CannedResponse;
use crate::observability::metrics;
use crate::routing::Router;
use crate::runtime::{CompiledChain, Dispatch};

/// Immutable dispatch routine, cheap to clone and shared across requests.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    router: Router<Arc<CompiledChain>>,
    not_found: CannedResponse,
    stats: CompileStats,
    // Owns every value captured by the compiled routines.
    _values: ValueTable,
}

impl Dispatcher {
    pub(crate) fn new(
        router: Router<Arc<CompiledChain>>,
        not_found: CannedResponse,
        values: ValueTable,
        stats: CompileStats,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                router,
                not_found,
                stats,
                _values: values,
            }),
        }
    }

    /// Dispatch a request by its method and path.
    pub fn dispatch<B>(&self, request: &Request<B>) -> Dispatch {
        self.handle(request.method(), request.uri().path())
    }

    pub fn handle(&self, method: &Method, path: &str) -> Dispatch {
        match self.inner.router.lookup(method, path) {
            Some((chain, params)) => {
                tracing::trace!(%method, path, deferred = chain.is_deferred(), "Dispatching request");
                metrics::record_request("matched");
                chain.invoke(params)
            }
            None => {
                tracing::trace!(%method, path, "No route matched");
                metrics::record_request("not_found");
                Dispatch::Ready(self.inner.not_found.response())
            }
        }
    }

    /// The compiled routine serving `method` + `path`, if any.
    pub fn route(&self, method: &Method, path: &str) -> Option<&CompiledChain> {
        self.inner.router.lookup(method, path).map(|(chain, _)| chain.as_ref())
    }

    /// Readable listing of the routine serving `method` + `path`.
    pub fn listing(&self, method: &Method, path: &str) -> Option<&str> {
        self.route(method, path).map(CompiledChain::listing)
    }

    pub fn stats(&self) -> CompileStats {
        self.inner.stats
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.inner.router.len())
            .field("stats", &self.inner.stats)
            .finish()
    }
}
