//! Handler group compiler.
//!
//! # Responsibilities
//! - Compile each handler of a group, in declaration order, into a
//!   pre-bound operation specialized for its variant
//! - Compile every group at most once per compilation and replay the
//!   cached fragment wherever the group is used again
//!
//! # Variant Table
//! ```text
//! Composable         → nested group compiled on its own, ops spliced in
//! CheckedDiscarded   → raise on controlled error, drop value
//! UncheckedDiscarded → drop value
//! CheckedStored      → raise on controlled error, store value at path
//! UncheckedStored    → store value at path
//! ```

use std::collections::HashMap;
use std::convert::identity;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;

use crate::compiler::state::{CompileState, Emitted};
use crate::handler::callable::{Callable, Shape, Suspending};
use crate::handler::{GroupId, Handler, HandlerGroup, HandlerResult, Invoke};
use crate::observability::metrics;
use crate::runtime::frame::Frame;
use crate::runtime::ops::{start_fn, Flow, Fragment, Op, SettleFn};

/// Memoized group fragments, valid for one compilation.
#[derive(Debug, Default)]
pub struct GroupCache {
    fragments: HashMap<GroupId, Arc<Fragment>>,
    hits: usize,
}

impl GroupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: GroupId) -> Option<&Arc<Fragment>> {
        self.fragments.get(&id)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of lookups answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }
}

/// Compile `group` in a derived state, or return its cached fragment.
pub fn compile_group(group: &HandlerGroup, cache: &mut GroupCache, state: &mut CompileState<'_>) -> Arc<Fragment> {
    if let Some(fragment) = cache.fragments.get(&group.id()) {
        cache.hits += 1;
        metrics::record_group_cache_hit();
        tracing::debug!(group = %group.id(), "Handler group cache hit");
        return fragment.clone();
    }

    let mut child = state.derive();
    for handler in group.handlers() {
        compile_handler(handler, cache, &mut child);
    }
    let (buffer, lines, counters) = child.finish();
    state.sync(counters);

    let ops: Vec<Op> = buffer
        .into_iter()
        .filter_map(|item| match item {
            Emitted::Op(op) => Some(op),
            _ => None,
        })
        .collect();

    tracing::debug!(
        group = %group.id(),
        handlers = group.handlers().len(),
        ops = ops.len(),
        deferred = group.is_deferred(),
        needs_context = group.needs_context(),
        "Compiled handler group"
    );
    metrics::record_group_compiled();

    let fragment = Arc::new(Fragment::new(
        ops,
        group.is_deferred(),
        group.needs_context(),
        lines.join("\n"),
    ));
    cache.fragments.insert(group.id(), fragment.clone());
    fragment
}

fn compile_handler(handler: &Handler, cache: &mut GroupCache, state: &mut CompileState<'_>) {
    match handler {
        Handler::Composable(nested) => {
            let fragment = compile_group(nested, cache, state);
            for op in fragment.ops() {
                state.emit_silent(Emitted::Op(op.clone()));
            }
            state.note(format!("{} {{\n{}\n}}", nested.id(), indent(fragment.listing())));
        }
        Handler::CheckedDiscarded(invoke) => {
            let x = state.bind();
            let call = call_text(invoke, state);
            let op = bind_op(invoke, identity, raise_or(|_, _| {}));
            state.emit(Emitted::Op(op), format!("let {x} = {call}; check {x}"));
        }
        Handler::UncheckedDiscarded(invoke) => {
            let call = call_text(invoke, state);
            let settle: SettleFn = Arc::new(|_: HandlerResult, _: &mut Frame| Flow::Continue);
            let op = bind_op(invoke, Ok, settle);
            state.emit(Emitted::Op(op), call);
        }
        Handler::CheckedStored(invoke, path) => {
            let x = state.bind();
            let call = call_text(invoke, state);
            let target = path.clone();
            let op = bind_op(
                invoke,
                identity,
                raise_or(move |value, frame| frame.context().store(&target, value)),
            );
            state.emit(Emitted::Op(op), format!("let {x} = {call}; check {x}; c.{path} = {x}"));
        }
        Handler::UncheckedStored(invoke, path) => {
            let call = call_text(invoke, state);
            let target = path.clone();
            let settle: SettleFn = Arc::new(move |outcome: HandlerResult, frame: &mut Frame| {
                if let Ok(value) = outcome {
                    frame.context().store(&target, value);
                }
                Flow::Continue
            });
            let op = bind_op(invoke, Ok, settle);
            state.emit(Emitted::Op(op), format!("c.{path} = {call}"));
        }
    }
}

/// Specialize one invocation for its sync/deferred and context shape.
fn bind_op<T>(invoke: &Invoke<T>, lift: fn(T) -> HandlerResult, settle: SettleFn) -> Op
where
    T: Send + 'static,
{
    match invoke.shape() {
        Shape::Ready(Callable::Bare(f)) => {
            let f = f.clone();
            Op::Run(Arc::new(move |frame: &mut Frame| settle(lift(f(())), frame)))
        }
        Shape::Ready(Callable::Contextual(f)) => {
            let f = f.clone();
            Op::Run(Arc::new(move |frame: &mut Frame| {
                let out = f((), frame.context());
                settle(lift(out), frame)
            }))
        }
        Shape::Deferred(Suspending::Bare(f)) => {
            let f = f.clone();
            Op::Await {
                start: start_fn(move |_| f(()).map(lift).boxed()),
                settle,
            }
        }
        Shape::Deferred(Suspending::Contextual(f)) => {
            let f = f.clone();
            Op::Await {
                start: start_fn(move |frame| f((), frame.context()).map(lift).boxed()),
                settle,
            }
        }
    }
}

/// Settle step of checked handlers: raise controlled errors, pass values on.
fn raise_or<F>(on_value: F) -> SettleFn
where
    F: Fn(Value, &mut Frame) + Send + Sync + 'static,
{
    Arc::new(move |outcome: HandlerResult, frame: &mut Frame| match outcome {
        Ok(value) => {
            on_value(value, frame);
            Flow::Continue
        }
        Err(err) => Flow::Raise(err),
    })
}

fn call_text<T: Send + 'static>(invoke: &Invoke<T>, state: &mut CompileState<'_>) -> String {
    let value = invoke.intern(state.values());
    let args = if invoke.needs_context() { "c" } else { "" };
    if invoke.is_deferred() {
        format!("await {value}({args})")
    } else {
        format!("{value}({args})")
    }
}

pub(crate) fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::state::ValueTable;
    use crate::error::ErrorRegistry;
    use crate::handler::ContextPath;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn run(fragment: &Fragment, frame: &mut Frame) -> Flow {
        fragment.run_sync(frame)
    }

    #[test]
    fn test_group_compiled_once() {
        let group = HandlerGroup::new(vec![Handler::unchecked(Invoke::bare(|| ()))]);
        let mut values = ValueTable::new();
        let mut cache = GroupCache::new();
        let mut state = CompileState::new(&mut values, 0, false);

        let first = compile_group(&group, &mut cache, &mut state);
        let second = compile_group(&group, &mut cache, &mut state);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_every_handler_of_a_group_runs_in_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let handlers = (0..3)
            .map(|i| {
                let order = order.clone();
                Handler::unchecked(Invoke::bare(move || order.lock().unwrap().push(i)))
            })
            .collect();
        let group = HandlerGroup::new(handlers);

        let mut values = ValueTable::new();
        let mut cache = GroupCache::new();
        let mut state = CompileState::new(&mut values, 0, false);
        let fragment = compile_group(&group, &mut cache, &mut state);
        assert_eq!(fragment.len(), 3);

        let mut frame = Frame::default();
        assert!(matches!(run(&fragment, &mut frame), Flow::Continue));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_checked_handler_short_circuits() {
        let mut registry = ErrorRegistry::new();
        let denied = registry.static_error();
        let after = Arc::new(AtomicUsize::new(0));
        let counter = after.clone();

        let group = HandlerGroup::new(vec![
            Handler::checked(Invoke::bare(move || Err::<(), _>(denied.raise()))),
            Handler::unchecked(Invoke::bare(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        ]);

        let mut values = ValueTable::new();
        let mut cache = GroupCache::new();
        let mut state = CompileState::new(&mut values, 0, false);
        let fragment = compile_group(&group, &mut cache, &mut state);

        let mut frame = Frame::default();
        match run(&fragment, &mut frame) {
            Flow::Raise(err) => assert_eq!(err.id(), denied.descriptor().id()),
            Flow::Continue => panic!("expected a raised error"),
        }
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stored_handlers_write_context() {
        let group = HandlerGroup::new(vec![
            Handler::unchecked_store(ContextPath::parse("user.name").unwrap(), Invoke::bare(|| "ada")),
            Handler::checked_store(
                ContextPath::parse("user.id").unwrap(),
                Invoke::bare(|| Ok::<_, crate::error::ControlledError>(7)),
            ),
        ]);

        let mut values = ValueTable::new();
        let mut cache = GroupCache::new();
        let mut state = CompileState::new(&mut values, 0, false);
        let fragment = compile_group(&group, &mut cache, &mut state);

        let mut frame = Frame::default();
        frame.allocate();
        run(&fragment, &mut frame);
        let state = &frame.context_ref().unwrap().state;
        assert_eq!(state.get("user"), Some(&json!({"name": "ada", "id": 7})));
    }

    #[test]
    fn test_nested_group_spliced_and_cached() {
        let inner = HandlerGroup::new(vec![
            Handler::unchecked(Invoke::bare(|| ())),
            Handler::checked(Invoke::bare(|| Ok::<_, crate::error::ControlledError>(()))),
        ]);
        let outer = HandlerGroup::new(vec![
            Handler::Composable(inner.clone()),
            Handler::unchecked(Invoke::bare(|| ())),
        ]);

        let mut values = ValueTable::new();
        let mut cache = GroupCache::new();
        let mut state = CompileState::new(&mut values, 0, false);
        let fragment = compile_group(&outer, &mut cache, &mut state);

        assert_eq!(fragment.len(), 3);
        assert!(cache.get(inner.id()).is_some());
        assert!(fragment.listing().contains(&inner.id().to_string()));
        assert!(fragment.listing().contains("check x0"));
    }

    #[test]
    fn test_bindings_unique_across_groups() {
        let checked = || Handler::checked(Invoke::bare(|| Ok::<_, crate::error::ControlledError>(())));
        let first = HandlerGroup::new(vec![checked(), checked()]);
        let second = HandlerGroup::new(vec![checked()]);

        let mut values = ValueTable::new();
        let mut cache = GroupCache::new();
        let mut state = CompileState::new(&mut values, 0, false);
        let a = compile_group(&first, &mut cache, &mut state);
        let b = compile_group(&second, &mut cache, &mut state);

        assert!(a.listing().contains("x0") && a.listing().contains("x1"));
        assert!(b.listing().contains("x2"));
        assert_eq!(state.next_binding(), 3);
    }

    #[tokio::test]
    async fn test_deferred_handler_awaited() {
        let group = HandlerGroup::new(vec![Handler::unchecked_store(
            ContextPath::parse("answer").unwrap(),
            Invoke::bare_async(|| async { 42 }),
        )]);

        let mut values = ValueTable::new();
        let mut cache = GroupCache::new();
        let mut state = CompileState::new(&mut values, 0, false);
        let fragment = compile_group(&group, &mut cache, &mut state);
        assert!(fragment.is_deferred());
        assert!(fragment.listing().contains("await"));

        let mut frame = Frame::default();
        frame.allocate();
        fragment.run(&mut frame).await;
        assert_eq!(frame.context_ref().unwrap().state.get("answer"), Some(&json!(42)));
    }
}
