//! Callable shapes accepted by handlers and routes.
//!
//! A callable declares its context dependency by construction (`bare` vs
//! `contextual`) and its suspension behavior by construction (`Ready` vs
//! `Deferred`). The compiler reads both flags once and never probes at
//! request time.
//!
//! A suspending contextual callable borrows the context for the whole
//! future, so it may read or write the context after an await point.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::compiler::state::{ValueRef, ValueTable};
use crate::handler::context::Context;

/// Function that completes before returning.
///
/// `A` is the leading argument supplied by the caller: `()` for middleware
/// and static error routes, the error payload for dynamic error routes.
pub(crate) enum Callable<T, A = ()> {
    Bare(Arc<dyn Fn(A) -> T + Send + Sync>),
    Contextual(Arc<dyn Fn(A, &mut Context) -> T + Send + Sync>),
}

impl<T, A> Clone for Callable<T, A> {
    fn clone(&self) -> Self {
        match self {
            Callable::Bare(f) => Callable::Bare(f.clone()),
            Callable::Contextual(f) => Callable::Contextual(f.clone()),
        }
    }
}

impl<T: 'static, A: 'static> Callable<T, A> {
    fn map<U, M>(self, map: M) -> Callable<U, A>
    where
        M: Fn(T) -> U + Send + Sync + 'static,
    {
        match self {
            Callable::Bare(f) => Callable::Bare(Arc::new(move |a| map(f(a)))),
            Callable::Contextual(f) => {
                Callable::Contextual(Arc::new(move |a, ctx: &mut Context| map(f(a, ctx))))
            }
        }
    }
}

pub(crate) type SuspendingFn<T, A> = Arc<dyn Fn(A) -> BoxFuture<'static, T> + Send + Sync>;
pub(crate) type BorrowingFn<T, A> = Arc<dyn for<'c> Fn(A, &'c mut Context) -> BoxFuture<'c, T> + Send + Sync>;

/// Function returning a pending computation.
pub(crate) enum Suspending<T, A = ()> {
    Bare(SuspendingFn<T, A>),
    /// The pending computation holds the context until it completes.
    Contextual(BorrowingFn<T, A>),
}

impl<T, A> Clone for Suspending<T, A> {
    fn clone(&self) -> Self {
        match self {
            Suspending::Bare(f) => Suspending::Bare(f.clone()),
            Suspending::Contextual(f) => Suspending::Contextual(f.clone()),
        }
    }
}

fn borrowing<T, A, F>(f: F) -> BorrowingFn<T, A>
where
    F: for<'c> Fn(A, &'c mut Context) -> BoxFuture<'c, T> + Send + Sync + 'static,
{
    Arc::new(f)
}

impl<T: Send + 'static, A: 'static> Suspending<T, A> {
    fn map<U, M>(self, map: M) -> Suspending<U, A>
    where
        U: Send + 'static,
        M: Fn(T) -> U + Clone + Send + Sync + 'static,
    {
        match self {
            Suspending::Bare(f) => Suspending::Bare(Arc::new(move |a| f(a).map(map.clone()).boxed())),
            Suspending::Contextual(f) => {
                Suspending::Contextual(borrowing(move |a, ctx| f(a, ctx).map(map.clone()).boxed()))
            }
        }
    }
}

/// Sync/deferred classification of a callable.
pub(crate) enum Shape<T, A = ()> {
    Ready(Callable<T, A>),
    Deferred(Suspending<T, A>),
}

impl<T, A> Clone for Shape<T, A> {
    fn clone(&self) -> Self {
        match self {
            Shape::Ready(c) => Shape::Ready(c.clone()),
            Shape::Deferred(c) => Shape::Deferred(c.clone()),
        }
    }
}

/// A user function together with its classification.
///
/// Adapting the output type (as handler and route constructors do) keeps
/// the identity of the function first registered, so one function interns
/// to one value however many handlers wrap it.
pub struct Invoke<T, A = ()> {
    shape: Shape<T, A>,
    origin: Arc<dyn Any + Send + Sync>,
}

impl<T, A> Clone for Invoke<T, A> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            origin: self.origin.clone(),
        }
    }
}

impl<T: Send + 'static, A: 'static> Invoke<T, A> {
    fn from_shape(shape: Shape<T, A>) -> Self {
        let origin: Arc<dyn Any + Send + Sync> = Arc::new(shape.clone());
        Self { shape, origin }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self.shape, Shape::Deferred(_))
    }

    pub fn needs_context(&self) -> bool {
        matches!(
            self.shape,
            Shape::Ready(Callable::Contextual(_)) | Shape::Deferred(Suspending::Contextual(_))
        )
    }

    pub(crate) fn shape(&self) -> &Shape<T, A> {
        &self.shape
    }

    /// Intern the registered function by identity.
    pub(crate) fn intern(&self, values: &mut ValueTable) -> ValueRef {
        values.intern_arc(&self.origin)
    }

    pub(crate) fn map<U, M>(self, map: M) -> Invoke<U, A>
    where
        U: Send + 'static,
        M: Fn(T) -> U + Clone + Send + Sync + 'static,
    {
        let shape = match self.shape {
            Shape::Ready(c) => Shape::Ready(c.map(map)),
            Shape::Deferred(c) => Shape::Deferred(c.map(map)),
        };
        Invoke {
            shape,
            origin: self.origin,
        }
    }
}

impl<T: Send + 'static> Invoke<T, ()> {
    /// Synchronous function without context.
    pub fn bare<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::from_shape(Shape::Ready(Callable::Bare(Arc::new(move |()| f()))))
    }

    /// Synchronous function reading the context.
    pub fn contextual<F>(f: F) -> Self
    where
        F: Fn(&mut Context) -> T + Send + Sync + 'static,
    {
        Self::from_shape(Shape::Ready(Callable::Contextual(Arc::new(
            move |(), ctx: &mut Context| f(ctx),
        ))))
    }

    /// Suspending function without context.
    pub fn bare_async<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::from_shape(Shape::Deferred(Suspending::Bare(Arc::new(move |()| f().boxed()))))
    }

    /// Suspending function holding the context until it completes.
    ///
    /// ```
    /// use dispatch_compiler::{Context, Invoke};
    /// use futures_util::FutureExt;
    ///
    /// let invoke = Invoke::contextual_async(|c: &mut Context| {
    ///     async move {
    ///         let found = async { false }.await;
    ///         if !found {
    ///             c.status = axum::http::StatusCode::NOT_FOUND;
    ///         }
    ///     }
    ///     .boxed()
    /// });
    /// assert!(invoke.is_deferred() && invoke.needs_context());
    /// ```
    pub fn contextual_async<F>(f: F) -> Self
    where
        F: for<'c> Fn(&'c mut Context) -> BoxFuture<'c, T> + Send + Sync + 'static,
    {
        Self::from_shape(Shape::Deferred(Suspending::Contextual(borrowing(
            move |(), ctx| f(ctx),
        ))))
    }
}

impl<T: Send + 'static, P: Send + 'static> Invoke<T, P> {
    /// Synchronous function taking a leading argument.
    pub fn with_arg<F>(f: F) -> Self
    where
        F: Fn(P) -> T + Send + Sync + 'static,
    {
        Self::from_shape(Shape::Ready(Callable::Bare(Arc::new(f))))
    }

    /// Synchronous function taking a leading argument and the context.
    pub fn with_arg_contextual<F>(f: F) -> Self
    where
        F: Fn(P, &mut Context) -> T + Send + Sync + 'static,
    {
        Self::from_shape(Shape::Ready(Callable::Contextual(Arc::new(f))))
    }

    /// Suspending function taking a leading argument.
    pub fn with_arg_async<F, Fut>(f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::from_shape(Shape::Deferred(Suspending::Bare(Arc::new(move |p| f(p).boxed()))))
    }

    /// Suspending function taking a leading argument and holding the
    /// context until it completes.
    pub fn with_arg_contextual_async<F>(f: F) -> Self
    where
        F: for<'c> Fn(P, &'c mut Context) -> BoxFuture<'c, T> + Send + Sync + 'static,
    {
        Self::from_shape(Shape::Deferred(Suspending::Contextual(borrowing(f))))
    }
}
