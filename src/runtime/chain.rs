//! Compiled routine of one method + path entry.
//!
//! The chain is split at build time: a synchronous prefix runs directly,
//! and everything after the first suspending group runs inside one
//! deferred scope. Routes that never suspend return a ready response
//! without allocating a future.

use std::fmt;
use std::sync::Arc;

use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::handler::Params;
use crate::runtime::dispatch::{pending, Dispatch};
use crate::runtime::errors::ErrorDispatch;
use crate::runtime::frame::Frame;
use crate::runtime::ops::{Flow, Fragment};

/// Element of a compiled chain.
#[derive(Clone)]
pub(crate) enum Piece {
    /// Allocate the shared context.
    Allocate,
    /// A cached group fragment.
    Group(Arc<Fragment>),
}

impl Piece {
    fn run_sync(&self, frame: &mut Frame) -> Flow {
        match self {
            Piece::Allocate => {
                frame.allocate();
                Flow::Continue
            }
            Piece::Group(fragment) => fragment.run_sync(frame),
        }
    }

    async fn run(&self, frame: &mut Frame) -> Flow {
        match self {
            Piece::Allocate => {
                frame.allocate();
                Flow::Continue
            }
            Piece::Group(fragment) => fragment.run(frame).await,
        }
    }
}

pub(crate) type ReadyFn<A> = Arc<dyn Fn(A, &mut Frame) -> Response + Send + Sync>;
pub(crate) type DeferredFn<A> = Arc<dyn for<'f> Fn(A, &'f mut Frame) -> BoxFuture<'f, Response> + Send + Sync>;

/// Compiled route terminal.
pub(crate) enum Terminal<A> {
    /// Produces the response before returning.
    Ready(ReadyFn<A>),
    /// Produces a pending response that holds the frame until it completes;
    /// awaited inside a deferred scope, returned as a continuation outside
    /// one.
    Deferred(DeferredFn<A>),
}

impl<A> Clone for Terminal<A> {
    fn clone(&self) -> Self {
        match self {
            Terminal::Ready(f) => Terminal::Ready(f.clone()),
            Terminal::Deferred(f) => Terminal::Deferred(f.clone()),
        }
    }
}

impl<A: Send + 'static> Terminal<A> {
    pub(crate) fn deferred<F>(f: F) -> Self
    where
        F: for<'f> Fn(A, &'f mut Frame) -> BoxFuture<'f, Response> + Send + Sync + 'static,
    {
        Terminal::Deferred(Arc::new(f))
    }

    /// Invoke outside a deferred scope. A continuation takes the frame
    /// with it.
    pub(crate) fn call(&self, arg: A, mut frame: Frame) -> Dispatch {
        match self {
            Terminal::Ready(f) => Dispatch::Ready(f(arg, &mut frame)),
            Terminal::Deferred(f) => {
                let f = f.clone();
                pending(async move { f(arg, &mut frame).await })
            }
        }
    }

    /// Invoke inside the deferred scope.
    pub(crate) async fn call_in_scope(&self, arg: A, frame: &mut Frame) -> Response {
        match self {
            Terminal::Ready(f) => f(arg, frame),
            Terminal::Deferred(f) => f(arg, frame).await,
        }
    }
}

/// The specialized routine of one route.
pub struct CompiledChain {
    prefix: Vec<Piece>,
    scope: Option<Arc<[Piece]>>,
    terminal: Terminal<()>,
    errors: Arc<ErrorDispatch>,
    listing: String,
}

impl CompiledChain {
    pub(crate) fn new(
        prefix: Vec<Piece>,
        scope: Option<Vec<Piece>>,
        terminal: Terminal<()>,
        errors: Arc<ErrorDispatch>,
        listing: String,
    ) -> Self {
        Self {
            prefix,
            scope: scope.map(Into::into),
            terminal,
            errors,
            listing,
        }
    }

    /// Whether the routine opens a deferred scope.
    pub fn is_deferred(&self) -> bool {
        self.scope.is_some()
    }

    /// Whether any piece allocates the context.
    pub fn allocates_context(&self) -> bool {
        self.pieces().any(|p| matches!(p, Piece::Allocate))
    }

    /// Group fragments in chain order.
    pub fn fragments(&self) -> impl Iterator<Item = &Arc<Fragment>> {
        self.pieces().filter_map(|p| match p {
            Piece::Group(fragment) => Some(fragment),
            Piece::Allocate => None,
        })
    }

    pub fn listing(&self) -> &str {
        &self.listing
    }

    fn pieces(&self) -> impl Iterator<Item = &Piece> {
        self.prefix
            .iter()
            .chain(self.scope.iter().flat_map(|scope| scope.iter()))
    }

    /// Run the routine for one request.
    pub fn invoke(&self, params: Option<Params>) -> Dispatch {
        let mut frame = Frame::new(params);

        for piece in &self.prefix {
            if let Flow::Raise(err) = piece.run_sync(&mut frame) {
                return self.errors.dispatch(err, frame);
            }
        }

        let Some(scope) = &self.scope else {
            return self.terminal.call((), frame);
        };

        let scope = scope.clone();
        let terminal = self.terminal.clone();
        let errors = self.errors.clone();
        pending(async move {
            for piece in scope.iter() {
                if let Flow::Raise(err) = piece.run(&mut frame).await {
                    return errors.dispatch_in_scope(err, &mut frame).await;
                }
            }
            terminal.call_in_scope((), &mut frame).await
        })
    }
}

impl fmt::Debug for CompiledChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledChain")
            .field("prefix", &self.prefix.len())
            .field("scope", &self.scope.as_ref().map(|s| s.len()))
            .finish()
    }
}

impl fmt::Display for CompiledChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.listing)
    }
}
