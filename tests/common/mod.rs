//! Shared utilities for integration tests.

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use dispatch_compiler::Dispatcher;

/// Read a response body as UTF-8 text.
pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    String::from_utf8(bytes.to_vec()).expect("body should be UTF-8")
}

/// Dispatch a request and wait for its response, whether ready or pending.
pub async fn send(dispatcher: &Dispatcher, method: Method, path: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .expect("valid request");
    dispatcher.dispatch(&request).resolve().await
}

/// `GET path`, returning status code and body text.
#[allow(dead_code)]
pub async fn get(dispatcher: &Dispatcher, path: &str) -> (u16, String) {
    let response = send(dispatcher, Method::GET, path).await;
    let status = response.status().as_u16();
    (status, body_text(response).await)
}
