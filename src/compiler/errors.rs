//! Error table compiler.
//!
//! Builds the controlled-error dispatch shared by every checked point of the
//! routes using one `ErrorTable`. The shape follows the number of declared
//! kinds: none, one (single comparison) or several (table lookup). Ids
//! without a branch fall through to the shared "unhandled" response.

use std::collections::HashSet;
use std::sync::Arc;

use crate::compiler::group::indent;
use crate::compiler::state::ValueTable;
use crate::compiler::terminal::{compile_terminal, Placement};
use crate::error::{CompileError, CompileResult, ErrorRegistry, ErrorRoute, ErrorTable};
use crate::http::response::CannedResponse;
use crate::runtime::errors::{Branch, BranchTerminal, ErrorDispatch, Switch};

/// Compiled dispatch of one error table plus its listings.
pub(crate) struct CompiledErrors {
    pub(crate) dispatch: Arc<ErrorDispatch>,
    /// Catch block for errors raised before any deferred scope.
    pub(crate) listing: String,
    /// Catch block for errors raised inside the deferred scope.
    pub(crate) scoped_listing: String,
}

struct CompiledBranch {
    id: u32,
    branch: Branch,
    listing: String,
    scoped_listing: String,
}

pub(crate) fn compile_error_table(
    table: &ErrorTable,
    registry: &ErrorRegistry,
    values: &mut ValueTable,
    unhandled: Arc<CannedResponse>,
) -> CompileResult<CompiledErrors> {
    let mut seen = HashSet::new();
    let mut branches = Vec::with_capacity(table.len());

    for (descriptor, route) in table.entries() {
        if !registry.owns(descriptor) {
            return Err(CompileError::UnknownError { id: descriptor.id() });
        }
        if !seen.insert(descriptor.id()) {
            return Err(CompileError::DuplicateErrorHandler { id: descriptor.id() });
        }

        let (branch, compiled) = match route {
            ErrorRoute::Static(route) => {
                let compiled = compile_terminal(route, values, Placement::route(false), &unhandled)?;
                let branch = Branch::new(BranchTerminal::Static(compiled.terminal), compiled.needs_context);
                (branch, (compiled.needs_context, compiled.listing, compiled.scoped_listing))
            }
            ErrorRoute::Dynamic(route) => {
                let placement = Placement {
                    in_scope: false,
                    arg: Some("e.payload"),
                };
                let compiled = compile_terminal(route, values, placement, &unhandled)?;
                let branch = Branch::new(BranchTerminal::Dynamic(compiled.terminal), compiled.needs_context);
                (branch, (compiled.needs_context, compiled.listing, compiled.scoped_listing))
            }
        };
        let (needs_context, listing, scoped_listing) = compiled;
        branches.push(CompiledBranch {
            id: descriptor.id(),
            branch,
            listing: with_context(needs_context, listing),
            scoped_listing: with_context(needs_context, scoped_listing),
        });
    }

    let listing = render(&branches, |b| &b.listing);
    let scoped_listing = render(&branches, |b| &b.scoped_listing);

    let switch = match branches.len() {
        0 => Switch::Unhandled,
        1 => {
            let Some(only) = branches.pop() else {
                unreachable!("one branch");
            };
            Switch::Single(only.id, only.branch)
        }
        _ => Switch::Table(branches.into_iter().map(|b| (b.id, b.branch)).collect()),
    };

    tracing::debug!(kinds = table.len(), "Compiled error table");

    Ok(CompiledErrors {
        dispatch: Arc::new(ErrorDispatch::new(switch, unhandled)),
        listing,
        scoped_listing,
    })
}

fn render(branches: &[CompiledBranch], listing: impl Fn(&CompiledBranch) -> &String) -> String {
    let mut lines = Vec::with_capacity(branches.len() + 1);
    match branches {
        [] => lines.push("_ => return unhandled".to_string()),
        [only] => {
            lines.push(format!("if e.id == {} {{\n{}\n}}", only.id, indent(listing(only))));
            lines.push("return unhandled".to_string());
        }
        _ => {
            for branch in branches {
                lines.push(format!("{} => {{\n{}\n}}", branch.id, indent(listing(branch))));
            }
            lines.push("_ => return unhandled".to_string());
        }
    }
    format!("catch e {{\n{}\n}}", indent(&lines.join("\n")))
}

/// Error routes reading the context get a fresh one.
fn with_context(needs_context: bool, listing: String) -> String {
    if needs_context {
        format!("let c = {{status:200, headers:[]}}\n{listing}")
    } else {
        listing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Context, Invoke};
    use crate::route::Route;
    use crate::runtime::frame::Frame;
    use axum::http::StatusCode;
    use serde_json::Value;

    fn unhandled() -> Arc<CannedResponse> {
        Arc::new(CannedResponse::new(StatusCode::INTERNAL_SERVER_ERROR, ""))
    }

    #[test]
    fn test_zero_kinds_are_unhandled() {
        let mut registry = ErrorRegistry::new();
        let error = registry.static_error();
        let mut values = ValueTable::new();
        let compiled = compile_error_table(&ErrorTable::new(), &registry, &mut values, unhandled()).unwrap();

        let response = compiled
            .dispatch
            .dispatch(error.raise(), Frame::default())
            .into_ready()
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_single_kind() {
        let mut registry = ErrorRegistry::new();
        let caught = registry.static_error();
        let other = registry.static_error();
        let mut table = ErrorTable::new();
        table.catch_static(
            &caught,
            Route::function(Invoke::contextual(|c: &mut Context| {
                c.status = StatusCode::IM_A_TEAPOT;
                "caught"
            })),
        );

        let mut values = ValueTable::new();
        let compiled = compile_error_table(&table, &registry, &mut values, unhandled()).unwrap();
        assert!(compiled.listing.contains("if e.id == 0"));

        let response = compiled.dispatch.dispatch(caught.raise(), Frame::default()).into_ready().unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);

        let response = compiled
            .dispatch
            .dispatch(other.raise(), Frame::default())
            .into_ready()
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_many_kinds_thread_payload() {
        let mut registry = ErrorRegistry::new();
        let missing = registry.dynamic_error::<String>();
        let denied = registry.static_error();
        let mut table = ErrorTable::new();
        table
            .catch_dynamic(
                &missing,
                Route::function(Invoke::with_arg_contextual(|payload: Value, c: &mut Context| {
                    c.status = StatusCode::NOT_FOUND;
                    payload.as_str().unwrap_or_default().to_string()
                })),
            )
            .catch_static(&denied, Route::fixed("denied"));

        let mut values = ValueTable::new();
        let compiled = compile_error_table(&table, &registry, &mut values, unhandled()).unwrap();
        assert!(compiled.listing.contains("e.payload, c"));

        let response = compiled
            .dispatch
            .dispatch(missing.create("gone".into()), Frame::default())
            .into_ready()
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = compiled
            .dispatch
            .dispatch(denied.raise(), Frame::default())
            .into_ready()
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_context_reading_branch_gets_fresh_context() {
        let mut registry = ErrorRegistry::new();
        let denied = registry.static_error();
        let mut table = ErrorTable::new();
        table.catch_static(
            &denied,
            Route::function(Invoke::contextual(|c: &mut Context| c.status.as_u16().to_string())),
        );

        let mut values = ValueTable::new();
        let compiled = compile_error_table(&table, &registry, &mut values, unhandled()).unwrap();
        assert!(compiled.listing.contains("let c = {status:200, headers:[]}"));

        let route_frame = || {
            let mut frame = Frame::default();
            frame.allocate();
            frame.context().status = StatusCode::UNAUTHORIZED;
            frame.context().headers.insert("x-route", "leaked".parse().unwrap());
            frame
        };

        let response = compiled.dispatch.dispatch(denied.raise(), route_frame()).into_ready().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-route").is_none());

        let mut frame = route_frame();
        let response = compiled.dispatch.dispatch_in_scope(denied.raise(), &mut frame).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-route").is_none());
    }

    #[test]
    fn test_deferred_branch_listing_follows_placement() {
        let mut registry = ErrorRegistry::new();
        let denied = registry.static_error();
        let mut table = ErrorTable::new();
        table.catch_static(&denied, Route::function(Invoke::bare_async(|| async { "later" })));

        let mut values = ValueTable::new();
        let compiled = compile_error_table(&table, &registry, &mut values, unhandled()).unwrap();
        assert!(compiled.listing.contains(".then(respond)"));
        assert!(compiled.scoped_listing.contains("respond(await v"));
        assert!(!compiled.scoped_listing.contains(".then("));
    }

    #[test]
    fn test_duplicate_and_foreign_kinds_rejected() {
        let mut registry = ErrorRegistry::new();
        let error = registry.static_error();
        let mut table = ErrorTable::new();
        table.catch_static(&error, Route::fixed("a"));
        table.catch_static(&error, Route::fixed("b"));

        let mut values = ValueTable::new();
        let err = compile_error_table(&table, &registry, &mut values, unhandled()).err();
        assert!(matches!(err, Some(CompileError::DuplicateErrorHandler { id: 0 })));

        let mut foreign = ErrorRegistry::new();
        let stranger = foreign.static_error();
        let mut table = ErrorTable::new();
        table.catch_static(&stranger, Route::fixed("a"));
        let err = compile_error_table(&table, &registry, &mut values, unhandled()).err();
        assert!(matches!(err, Some(CompileError::UnknownError { .. })));
    }
}
