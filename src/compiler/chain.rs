//! Route chain compiler.
//!
//! Walks the groups of one route entry in order, splicing cached group
//! fragments and placing the context allocation and the deferred boundary,
//! then compiles the terminal and splits the result into a synchronous
//! prefix and a deferred scope.

use std::sync::Arc;

use crate::compiler::errors::CompiledErrors;
use crate::compiler::group::{compile_group, indent, GroupCache};
use crate::compiler::state::{CompileState, Counters, Emitted};
use crate::compiler::terminal::{compile_terminal, Placement};
use crate::error::CompileResult;
use crate::handler::HandlerGroup;
use crate::route::Route;
use crate::runtime::chain::{CompiledChain, Piece};

pub(crate) fn compile_chain(
    groups: &[Arc<HandlerGroup>],
    route: &Route,
    errors: &CompiledErrors,
    cache: &mut GroupCache,
    mut state: CompileState<'_>,
) -> CompileResult<(CompiledChain, Counters)> {
    for group in groups {
        let fragment = compile_group(group, cache, &mut state);
        // A cached fragment still updates the flags at this splice point.
        if fragment.is_deferred() {
            state.open_scope();
        }
        if fragment.needs_context() {
            state.allocate();
        }
        let line = format!("{} {{\n{}\n}}", group.id(), indent(fragment.listing()));
        state.emit(Emitted::Group(fragment), line);
    }

    let placement = Placement::route(state.is_deferred());
    let terminal = compile_terminal(route, state.values(), placement, errors.dispatch.unhandled())?;
    if terminal.needs_context {
        state.allocate();
    }
    state.note(terminal.listing);

    let deferred = state.is_deferred();
    let (buffer, lines, counters) = state.finish();

    let mut prefix = Vec::new();
    let mut scope: Option<Vec<Piece>> = None;
    for item in buffer {
        let piece = match item {
            Emitted::OpenScope => {
                scope = Some(Vec::new());
                continue;
            }
            Emitted::Allocate => Piece::Allocate,
            Emitted::Group(fragment) => Piece::Group(fragment),
            Emitted::Op(_) => continue,
        };
        match scope.as_mut() {
            Some(scope) => scope.push(piece),
            None => prefix.push(piece),
        }
    }

    // Each catch block follows the placement of the checked points it
    // covers: the scope's block awaits deferred error routes.
    let mut listing = lines.join("\n");
    if deferred {
        listing.push_str("\n} ");
        listing.push_str(&errors.scoped_listing);
    }
    if prefix.iter().any(|piece| matches!(piece, Piece::Group(_))) {
        listing.push('\n');
        listing.push_str(&errors.listing);
    }

    let chain = CompiledChain::new(prefix, scope, terminal.terminal, errors.dispatch.clone(), listing);
    Ok((chain, counters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::errors::compile_error_table;
    use crate::compiler::state::ValueTable;
    use crate::error::{ErrorRegistry, ErrorTable};
    use crate::handler::{Context, Handler, Invoke};
    use crate::http::response::CannedResponse;
    use axum::http::StatusCode;

    fn no_errors(values: &mut ValueTable) -> CompiledErrors {
        let unhandled = Arc::new(CannedResponse::new(StatusCode::INTERNAL_SERVER_ERROR, ""));
        compile_error_table(&ErrorTable::new(), &ErrorRegistry::new(), values, unhandled).unwrap()
    }

    #[test]
    fn test_sync_chain_without_context() {
        let mut values = ValueTable::new();
        let errors = no_errors(&mut values);
        let mut cache = GroupCache::new();
        let groups = vec![HandlerGroup::new(vec![Handler::unchecked(Invoke::bare(|| ()))])];
        let state = CompileState::new(&mut values, 0, false);

        let (chain, _) = compile_chain(&groups, &Route::fixed("Hi"), &errors, &mut cache, state).unwrap();
        assert!(!chain.is_deferred());
        assert!(!chain.allocates_context());
        assert!(chain.invoke(None).is_ready());
    }

    #[test]
    fn test_context_allocated_once_before_first_reader() {
        let mut values = ValueTable::new();
        let errors = no_errors(&mut values);
        let mut cache = GroupCache::new();
        let reader = || HandlerGroup::new(vec![Handler::unchecked(Invoke::contextual(|c: &mut Context| c.status.as_u16()))]);
        let groups = vec![
            HandlerGroup::new(vec![Handler::unchecked(Invoke::bare(|| ()))]),
            reader(),
            reader(),
        ];
        let state = CompileState::new(&mut values, 0, true);

        let (chain, _) = compile_chain(&groups, &Route::fixed("Hi"), &errors, &mut cache, state).unwrap();
        assert_eq!(chain.listing().matches("let c =").count(), 1);
        assert!(chain.listing().contains("params"));
        let first_group = chain.listing().find(&groups[0].id().to_string()).unwrap();
        assert!(chain.listing().find("let c =").unwrap() > first_group);
    }

    #[tokio::test]
    async fn test_single_deferred_scope() {
        let mut values = ValueTable::new();
        let errors = no_errors(&mut values);
        let mut cache = GroupCache::new();
        let suspending = || HandlerGroup::new(vec![Handler::unchecked(Invoke::bare_async(|| async {}))]);
        let groups = vec![
            HandlerGroup::new(vec![Handler::unchecked(Invoke::bare(|| ()))]),
            suspending(),
            suspending(),
        ];
        let state = CompileState::new(&mut values, 0, false);

        let (chain, _) = compile_chain(&groups, &Route::fixed("Hi"), &errors, &mut cache, state).unwrap();
        assert!(chain.is_deferred());
        assert_eq!(chain.listing().matches("async {").count(), 1);
        // One catch block for the prefix, one for the scope.
        assert!(chain.listing().contains("} catch e {"));
        assert_eq!(chain.listing().matches("catch e").count(), 2);

        let dispatch = chain.invoke(None);
        assert!(!dispatch.is_ready());
        assert_eq!(dispatch.resolve().await.status(), StatusCode::OK);
    }
}
