//! Routes whose handlers suspend.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use dispatch_compiler::{App, Context, ContextPath, Handler, Invoke, Route};
use futures_util::FutureExt;
use serde_json::Value;

mod common;

#[tokio::test]
async fn test_deferred_middleware_then_sync_terminal() {
    let mut app = App::new();
    app.use_handler(Handler::unchecked_store(
        ContextPath::parse("user").unwrap(),
        Invoke::bare_async(|| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            "ada"
        }),
    ));
    app.get(
        "/",
        Route::function(Invoke::contextual(|c: &mut Context| {
            let user = c.get(&ContextPath::parse("user").unwrap()).cloned();
            format!("hello {}", user.as_ref().and_then(Value::as_str).unwrap_or("nobody"))
        })),
    );
    let dispatcher = app.compile().unwrap();

    assert!(!dispatcher.handle(&Method::GET, "/").is_ready());
    let (status, body) = common::get(&dispatcher, "/").await;
    assert_eq!(status, 200);
    assert_eq!(body, "hello ada");
}

#[tokio::test]
async fn test_deferred_terminal_writes_context_after_await() {
    let mut app = App::new();
    app.use_handler(Handler::unchecked(Invoke::contextual(|c: &mut Context| {
        c.status = StatusCode::ACCEPTED;
    })));
    app.get(
        "/",
        Route::function(Invoke::contextual_async(|c| {
            async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                let before = c.status.as_u16();
                c.status = StatusCode::NOT_FOUND;
                c.set_header(axum::http::header::CACHE_CONTROL, "no-store".parse().unwrap());
                format!("was {before}")
            }
            .boxed()
        })),
    );
    let dispatcher = app.compile().unwrap();

    let chain = dispatcher.route(&Method::GET, "/").unwrap();
    assert!(!chain.is_deferred());
    assert!(chain.listing().contains(".then(respond)"));

    let response = common::send(&dispatcher, Method::GET, "/").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["cache-control"], "no-store");
    assert_eq!(common::body_text(response).await, "was 202");
}

#[tokio::test]
async fn test_deferred_middleware_writes_context_after_await() {
    let mut app = App::new();
    app.use_handler(Handler::unchecked(Invoke::contextual_async(|c| {
        async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            c.status = StatusCode::CREATED;
        }
        .boxed()
    })));
    app.get("/", Route::function(Invoke::contextual(|c: &mut Context| c.status.as_u16().to_string())));
    let dispatcher = app.compile().unwrap();

    let (status, body) = common::get(&dispatcher, "/").await;
    assert_eq!(status, 201);
    assert_eq!(body, "201");
}

#[tokio::test]
async fn test_error_raised_inside_scope() {
    let mut app = App::new();
    let limited = app.dynamic_error::<u64>();
    app.use_handler(Handler::unchecked(Invoke::bare_async(|| async {})));
    let raised = limited.clone();
    app.use_handler(Handler::checked(Invoke::bare_async(move || {
        let error = raised.create(30);
        async move { Err::<(), _>(error) }
    })));
    app.get("/", Route::fixed("unreachable"));
    app.catch_dynamic(
        &limited,
        Route::function(Invoke::with_arg_contextual_async(|retry: Value, c| {
            async move {
                tokio::task::yield_now().await;
                c.status = StatusCode::TOO_MANY_REQUESTS;
                format!("retry in {retry}")
            }
            .boxed()
        })),
    );
    let dispatcher = app.compile().unwrap();

    let chain = dispatcher.route(&Method::GET, "/").unwrap();
    assert!(chain.listing().contains("} catch e {"));

    let (status, body) = common::get(&dispatcher, "/").await;
    assert_eq!(status, 429);
    assert_eq!(body, "retry in 30");
}

#[tokio::test]
async fn test_error_route_in_scope_gets_fresh_context() {
    let mut app = App::new();
    let denied = app.static_error();
    app.use_handler(Handler::unchecked(Invoke::contextual_async(|c| {
        async move {
            c.status = StatusCode::UNAUTHORIZED;
            c.set_header("x-route".parse().unwrap(), "leaked".parse().unwrap());
        }
        .boxed()
    })));
    app.use_handler(Handler::checked(Invoke::bare(move || Err::<(), _>(denied.raise()))));
    app.get("/", Route::fixed("unreachable"));
    app.catch_static(
        &denied,
        Route::function(Invoke::contextual(|c: &mut Context| format!("error page {}", c.status.as_u16()))),
    );
    let dispatcher = app.compile().unwrap();

    let response = common::send(&dispatcher, Method::GET, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-route").is_none());
    assert_eq!(common::body_text(response).await, "error page 200");
}

#[tokio::test]
async fn test_concurrent_requests_have_own_context() {
    let mut app = App::new();
    app.use_handler(Handler::unchecked_store(
        ContextPath::parse("id").unwrap(),
        Invoke::contextual_async(|c| {
            async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                c.param(0).unwrap_or_default().to_string()
            }
            .boxed()
        }),
    ));
    app.get(
        "/:id",
        Route::function(Invoke::contextual(|c: &mut Context| {
            c.get(&ContextPath::parse("id").unwrap())
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        })),
    );
    let dispatcher = app.compile().unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { common::get(&dispatcher, &format!("/{i}")).await })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, i.to_string());
    }
}
