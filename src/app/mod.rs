//! Route registration and dispatch assembly.
//!
//! # Data Flow
//! ```text
//! App (builder)
//!     → use_handler / use_group (middleware for later routes)
//!     → get / post / ... (method + path + terminal route)
//!     → catch_static / catch_dynamic (route tree error table)
//!     → compile()
//!         → routing::PathPattern per path
//!         → compiler::Compiler per entry
//!         → Dispatcher (router of compiled chains)
//! ```
//!
//! # Design Decisions
//! - Middleware applies to the routes registered after it, in order
//! - One error table per route tree, shared by every route
//! - All defects (paths, duplicates, error tables) surface from `compile`

pub mod dispatcher;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::Value;

use crate::compiler::{Compiler, RouteEntry};
use crate::config::{validate_config, CannedResponseConfig, ConfigError, DispatchConfig};
use crate::error::{CompileError, CompileResult, DynamicError, ErrorRegistry, ErrorTable, StaticError};
use crate::handler::{Handler, HandlerGroup};
use crate::http::response::CannedResponse;
use crate::route::Route;
use crate::routing::{PathPattern, Router};

pub use dispatcher::Dispatcher;

struct Registered {
    method: Method,
    path: String,
    groups: Vec<Arc<HandlerGroup>>,
    route: Route,
}

/// Route tree builder.
pub struct App {
    config: DispatchConfig,
    registry: ErrorRegistry,
    errors: ErrorTable,
    middleware: Vec<Arc<HandlerGroup>>,
    routes: Vec<Registered>,
}

impl Default for App {
    fn default() -> Self {
        Self {
            config: DispatchConfig::default(),
            registry: ErrorRegistry::new(),
            errors: ErrorTable::new(),
            middleware: Vec::new(),
            routes: Vec::new(),
        }
    }
}

macro_rules! method_shortcuts {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            pub fn $name(&mut self, path: &str, route: Route) -> &mut Self {
                self.route(Method::$method, path, route)
            }
        )*
    };
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with a validated configuration.
    pub fn with_config(config: DispatchConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Declare an error kind without payload.
    pub fn static_error(&mut self) -> StaticError {
        self.registry.static_error()
    }

    /// Declare an error kind carrying a payload.
    pub fn dynamic_error<T: Into<Value>>(&mut self) -> DynamicError<T> {
        self.registry.dynamic_error()
    }

    /// Append one handler, as its own group.
    pub fn use_handler(&mut self, handler: Handler) -> &mut Self {
        self.middleware.push(HandlerGroup::new(vec![handler]));
        self
    }

    /// Append a shared group. Routes using the same group share one
    /// compiled fragment.
    pub fn use_group(&mut self, group: Arc<HandlerGroup>) -> &mut Self {
        self.middleware.push(group);
        self
    }

    pub fn route(&mut self, method: Method, path: &str, route: Route) -> &mut Self {
        self.routes.push(Registered {
            method,
            path: path.to_string(),
            groups: self.middleware.clone(),
            route,
        });
        self
    }

    method_shortcuts! {
        get => GET,
        post => POST,
        put => PUT,
        delete => DELETE,
        patch => PATCH,
        options => OPTIONS,
        trace => TRACE,
        head => HEAD,
    }

    pub fn catch_static(&mut self, error: &StaticError, route: Route) -> &mut Self {
        self.errors.catch_static(error, route);
        self
    }

    pub fn catch_dynamic<T: Into<Value>>(&mut self, error: &DynamicError<T>, route: Route<Value>) -> &mut Self {
        self.errors.catch_dynamic(error, route);
        self
    }

    /// Compile every registered route into one dispatcher.
    pub fn compile(&self) -> CompileResult<Dispatcher> {
        let unhandled = canned(&self.config.unhandled, StatusCode::INTERNAL_SERVER_ERROR);
        let not_found = canned(&self.config.not_found, StatusCode::NOT_FOUND);
        let errors = Arc::new(self.errors.clone());

        let mut compiler = Compiler::new(&self.registry, unhandled);
        let mut router = Router::new();

        for registered in &self.routes {
            let pattern = PathPattern::parse(&registered.path)?;
            let entry = RouteEntry::new(registered.groups.clone(), registered.route.clone(), errors.clone());
            let chain = compiler.compile_entry(&entry, !pattern.is_static())?;

            if self.config.log_listings {
                tracing::debug!(
                    method = %registered.method,
                    path = %registered.path,
                    listing = %chain.listing(),
                    "Compiled route"
                );
            }

            if !router.insert(registered.method.clone(), pattern, Arc::new(chain)) {
                return Err(CompileError::DuplicateRoute {
                    method: registered.method.clone(),
                    path: registered.path.clone(),
                });
            }
        }

        let (values, stats) = compiler.finish();
        tracing::info!(
            routes = stats.routes,
            groups = stats.groups,
            group_cache_hits = stats.group_cache_hits,
            values = stats.values,
            "Compiled route tree"
        );

        Ok(Dispatcher::new(router, not_found, values, stats))
    }
}

fn canned(config: &CannedResponseConfig, fallback: StatusCode) -> CannedResponse {
    config
        .to_response()
        .unwrap_or_else(|| CannedResponse::new(fallback, config.body.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Invoke;
    use crate::runtime::Dispatch;

    fn status(dispatch: Dispatch) -> StatusCode {
        dispatch.into_ready().unwrap().status()
    }

    #[test]
    fn test_middleware_applies_to_later_routes() {
        let mut app = App::new();
        app.get("/before", Route::fixed("a"));
        app.use_handler(Handler::unchecked(Invoke::bare(|| ())));
        app.get("/after", Route::fixed("b"));
        let dispatcher = app.compile().unwrap();

        assert_eq!(dispatcher.route(&Method::GET, "/before").unwrap().fragments().count(), 0);
        assert_eq!(dispatcher.route(&Method::GET, "/after").unwrap().fragments().count(), 1);
    }

    #[test]
    fn test_not_found_and_method_mismatch() {
        let mut app = App::new();
        app.post("/items", Route::fixed("created"));
        let dispatcher = app.compile().unwrap();

        assert_eq!(status(dispatcher.handle(&Method::POST, "/items")), StatusCode::OK);
        assert_eq!(status(dispatcher.handle(&Method::GET, "/items")), StatusCode::NOT_FOUND);
        assert_eq!(status(dispatcher.handle(&Method::POST, "/other")), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_configured_canned_responses() {
        let config = DispatchConfig {
            not_found: CannedResponseConfig::new(410),
            ..DispatchConfig::default()
        };
        let dispatcher = App::with_config(config).unwrap().compile().unwrap();
        assert_eq!(status(dispatcher.handle(&Method::GET, "/")), StatusCode::GONE);

        let config = DispatchConfig {
            unhandled: CannedResponseConfig::new(1),
            ..DispatchConfig::default()
        };
        assert!(App::with_config(config).is_err());
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut app = App::new();
        app.get("/", Route::fixed("a")).get("/", Route::fixed("b"));
        assert!(matches!(app.compile(), Err(CompileError::DuplicateRoute { .. })));
    }

    #[test]
    fn test_invalid_path_rejected() {
        let mut app = App::new();
        app.get("no-slash", Route::fixed("a"));
        assert!(matches!(app.compile(), Err(CompileError::InvalidPath { .. })));
    }
}
