//! Tower service adapter.
//!
//! Lets a [`Dispatcher`] be mounted anywhere a tower service is accepted,
//! e.g. as an axum fallback service. Ready dispatches resolve without
//! boxing a future.

use std::convert::Infallible;
use std::task::{Context, Poll};

use axum::http::Request;
use axum::response::Response;
use futures_util::future::{self, BoxFuture, Either, Ready};
use futures_util::FutureExt;
use tower::Service;

use crate::app::Dispatcher;
use crate::runtime::Dispatch;

pub type DispatchFuture = Either<Ready<Result<Response, Infallible>>, BoxFuture<'static, Result<Response, Infallible>>>;

impl<B> Service<Request<B>> for Dispatcher {
    type Response = Response;
    type Error = Infallible;
    type Future = DispatchFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        match self.dispatch(&request) {
            Dispatch::Ready(response) => Either::Left(future::ready(Ok(response))),
            Dispatch::Pending(pending) => Either::Right(pending.map(Ok).boxed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::app::App;
    use crate::handler::Invoke;
    use crate::route::Route;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_oneshot() {
        let mut app = App::new();
        app.get("/", Route::fixed("Hi"))
            .get("/later", Route::function(Invoke::bare_async(|| async { "done" })));
        let dispatcher = app.compile().unwrap();

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = dispatcher.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder().uri("/later").body(Body::empty()).unwrap();
        let response = dispatcher.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder().uri("/missing").body(Body::empty()).unwrap();
        let response = dispatcher.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_mounted_in_axum() {
        let mut app = App::new();
        app.get("/*", Route::fixed("fallback"));
        let dispatcher = app.compile().unwrap();
        let router = axum::Router::new().fallback_service(dispatcher);

        let request = Request::builder().uri("/anything").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
