//! Route terminal compiler.
//!
//! # Responsibilities
//! - Compile a `Function`, `Formatted` or `Static` route into a terminal
//!   producing the response
//! - Report whether the terminal itself reads the context
//!
//! # Static Bodies
//! ```text
//! Value::Null    → one shared canned response
//! Value::String  → fresh body per request (text/plain)
//! anything else  → JSON encoded once, template cloned per request
//! ```

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use futures_util::FutureExt;
use serde_json::Value;

use crate::compiler::state::ValueTable;
use crate::error::CompileResult;
use crate::handler::callable::{Callable, Shape, Suspending};
use crate::handler::Invoke;
use crate::http::response::{CannedResponse, ResponseHead, JSON_CONTENT_TYPE, TEXT_CONTENT_TYPE};
use crate::route::{Encoded, Formatted, Route, Serializer, StaticRoute};
use crate::runtime::chain::Terminal;
use crate::runtime::frame::Frame;

type Finish<T> = Arc<dyn Fn(T, ResponseHead) -> Response + Send + Sync>;

/// A compiled terminal plus its classification.
pub(crate) struct CompiledTerminal<A> {
    pub(crate) terminal: Terminal<A>,
    pub(crate) needs_context: bool,
    pub(crate) deferred: bool,
    pub(crate) listing: String,
    /// Listing as spliced inside a deferred scope.
    pub(crate) scoped_listing: String,
}

/// Where the terminal is spliced.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Placement<'a> {
    /// A deferred scope is already open.
    pub(crate) in_scope: bool,
    /// Listing text of the leading argument, if any.
    pub(crate) arg: Option<&'a str>,
}

impl Placement<'static> {
    pub(crate) fn route(in_scope: bool) -> Self {
        Self { in_scope, arg: None }
    }
}

/// Compile `route`. `unhandled` answers formatted output that cannot be
/// encoded.
pub(crate) fn compile_terminal<A>(
    route: &Route<A>,
    values: &mut ValueTable,
    placement: Placement<'_>,
    unhandled: &Arc<CannedResponse>,
) -> CompileResult<CompiledTerminal<A>>
where
    A: Send + 'static,
{
    match route {
        Route::Function(invoke) => {
            let finish: Finish<Body> = Arc::new(|body, head: ResponseHead| head.respond(body));
            Ok(compile_invoke(invoke, finish, "respond", values, placement))
        }
        Route::Formatted(formatted) => {
            let (finish, wrap) = formatter(formatted, values, unhandled.clone());
            Ok(compile_invoke(&formatted.invoke, finish, &wrap, values, placement))
        }
        Route::Static(route) => compile_static(route, values),
    }
}

fn compile_invoke<T, A>(
    invoke: &Invoke<T, A>,
    finish: Finish<T>,
    wrap: &str,
    values: &mut ValueTable,
    placement: Placement<'_>,
) -> CompiledTerminal<A>
where
    T: Send + 'static,
    A: Send + 'static,
{
    let value = invoke.intern(values);
    let args = match (placement.arg, invoke.needs_context()) {
        (Some(arg), true) => format!("{arg}, c"),
        (Some(arg), false) => arg.to_string(),
        (None, true) => "c".to_string(),
        (None, false) => String::new(),
    };
    let render = |in_scope: bool| match (invoke.is_deferred(), in_scope) {
        (false, _) => format!("return {wrap}({value}({args}))"),
        (true, true) => format!("return {wrap}(await {value}({args}))"),
        (true, false) => format!("return {value}({args}).then({wrap})"),
    };

    CompiledTerminal {
        terminal: bind_terminal(invoke, finish),
        needs_context: invoke.needs_context(),
        deferred: invoke.is_deferred(),
        listing: render(placement.in_scope),
        scoped_listing: render(true),
    }
}

/// Specialize the terminal call. The response head is taken once the
/// handler has produced its output, so a deferred handler may still change
/// the status or headers after an await point.
fn bind_terminal<T, A>(invoke: &Invoke<T, A>, finish: Finish<T>) -> Terminal<A>
where
    T: Send + 'static,
    A: Send + 'static,
{
    match invoke.shape() {
        Shape::Ready(Callable::Bare(f)) => {
            let f = f.clone();
            Terminal::Ready(Arc::new(move |arg, frame: &mut Frame| {
                let out = f(arg);
                finish(out, frame.take_head())
            }))
        }
        Shape::Ready(Callable::Contextual(f)) => {
            let f = f.clone();
            Terminal::Ready(Arc::new(move |arg, frame: &mut Frame| {
                let out = f(arg, frame.context());
                finish(out, frame.take_head())
            }))
        }
        Shape::Deferred(Suspending::Bare(f)) => {
            let f = f.clone();
            Terminal::deferred(move |arg, frame| {
                let pending = f(arg);
                let finish = finish.clone();
                async move {
                    let out = pending.await;
                    finish(out, frame.take_head())
                }
                .boxed()
            })
        }
        Shape::Deferred(Suspending::Contextual(f)) => {
            let f = f.clone();
            Terminal::deferred(move |arg, frame| {
                let f = f.clone();
                let finish = finish.clone();
                async move {
                    let out = f(arg, frame.context()).await;
                    finish(out, frame.take_head())
                }
                .boxed()
            })
        }
    }
}

/// Pick the serializer once: per-status table, default serializer, or
/// plain JSON encoding.
fn formatter<A>(
    formatted: &Formatted<A>,
    values: &mut ValueTable,
    unhandled: Arc<CannedResponse>,
) -> (Finish<Encoded>, String) {
    let (encode, listing) = serializer(formatted, values);
    let finish: Finish<Encoded> = Arc::new(move |encoded: Encoded, head: ResponseHead| match encoded {
        Ok(value) => encode(value, head),
        Err(e) => {
            tracing::error!(error = %e, "Formatted route produced a value that cannot be encoded");
            unhandled.response()
        }
    });
    (finish, listing)
}

fn serializer<A>(formatted: &Formatted<A>, values: &mut ValueTable) -> (Finish<Value>, String) {
    let fallback = formatted.serializer.clone();
    let fallback_ref = fallback.as_ref().map(|s| values.intern_arc(s).to_string());

    if formatted.by_status.is_empty() {
        let finish: Finish<Value> = match fallback {
            Some(serializer) => Arc::new(move |value: Value, head: ResponseHead| head.respond_json(serializer(&value))),
            None => Arc::new(|value: Value, head: ResponseHead| head.respond_json(value.to_string())),
        };
        let listing = match fallback_ref {
            Some(serializer) => format!("json {serializer}"),
            None => "json".to_string(),
        };
        return (finish, listing);
    }

    let by_status: Arc<[(_, Serializer)]> = formatted.by_status.clone().into();
    let cases = by_status
        .iter()
        .map(|(status, serializer)| format!("{}: {}", status.as_u16(), values.intern_arc(serializer)))
        .collect::<Vec<_>>()
        .join(", ");
    let listing = format!(
        "json[{cases}; default: {}]",
        fallback_ref.as_deref().unwrap_or("encode")
    );

    let finish: Finish<Value> = Arc::new(move |value: Value, head: ResponseHead| {
        let status = head.status();
        let body = match by_status.iter().find(|(s, _)| *s == status) {
            Some((_, serializer)) => serializer(&value),
            None => match &fallback {
                Some(serializer) => serializer(&value),
                None => value.to_string(),
            },
        };
        head.respond_json(body)
    });
    (finish, listing)
}

fn compile_static<A>(route: &StaticRoute, values: &mut ValueTable) -> CompileResult<CompiledTerminal<A>>
where
    A: Send + 'static,
{
    let mut headers = route.headers.clone();
    let (terminal, listing): (Terminal<A>, String) = match &route.body {
        Value::Null => {
            let (value, canned) = values.intern(CannedResponse::new(route.status, Bytes::new()).with_headers(headers));
            (
                Terminal::Ready(Arc::new(move |_: A, _: &mut Frame| canned.response())),
                format!("return {value}"),
            )
        }
        Value::String(text) => {
            headers.entry(CONTENT_TYPE).or_insert(TEXT_CONTENT_TYPE);
            let (_, head) = values.intern(CannedResponse::new(route.status, Bytes::new()).with_headers(headers));
            let (value, text) = values.intern(text.clone());
            (
                Terminal::Ready(Arc::new(move |_: A, _: &mut Frame| head.respond(Body::from(text.as_str().to_owned())))),
                format!("return new Response({value})"),
            )
        }
        body => {
            let encoded = serde_json::to_vec(body)?;
            headers.entry(CONTENT_TYPE).or_insert(JSON_CONTENT_TYPE);
            let (value, template) = values.intern(CannedResponse::new(route.status, encoded).with_headers(headers));
            (
                Terminal::Ready(Arc::new(move |_: A, _: &mut Frame| template.response())),
                format!("return {value}.clone()"),
            )
        }
    };

    Ok(CompiledTerminal {
        terminal,
        needs_context: false,
        deferred: false,
        scoped_listing: listing.clone(),
        listing,
    })
}
