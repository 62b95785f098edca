//! Result of invoking a compiled routine.

use std::fmt;
use std::future::IntoFuture;

use axum::response::Response;
use futures_util::future::{self, BoxFuture, Either, Ready};
use futures_util::FutureExt;

/// A response, or a pending one when the route may suspend.
pub enum Dispatch {
    Ready(Response),
    Pending(BoxFuture<'static, Response>),
}

impl Dispatch {
    pub fn is_ready(&self) -> bool {
        matches!(self, Dispatch::Ready(_))
    }

    /// The response, if the routine completed without suspending.
    pub fn into_ready(self) -> Option<Response> {
        match self {
            Dispatch::Ready(response) => Some(response),
            Dispatch::Pending(_) => None,
        }
    }

    pub async fn resolve(self) -> Response {
        self.await
    }
}

impl IntoFuture for Dispatch {
    type Output = Response;
    type IntoFuture = Either<Ready<Response>, BoxFuture<'static, Response>>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Dispatch::Ready(response) => Either::Left(future::ready(response)),
            Dispatch::Pending(pending) => Either::Right(pending),
        }
    }
}

impl From<Response> for Dispatch {
    fn from(response: Response) -> Self {
        Dispatch::Ready(response)
    }
}

impl From<BoxFuture<'static, Response>> for Dispatch {
    fn from(pending: BoxFuture<'static, Response>) -> Self {
        Dispatch::Pending(pending)
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatch::Ready(response) => f.debug_tuple("Ready").field(&response.status()).finish(),
            Dispatch::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Lift a `'static` future into a pending dispatch.
pub(crate) fn pending<F>(fut: F) -> Dispatch
where
    F: std::future::Future<Output = Response> + Send + 'static,
{
    Dispatch::Pending(fut.boxed())
}
