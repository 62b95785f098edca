//! Pre-bound operations produced by the group compiler.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::ControlledError;
use crate::handler::HandlerResult;
use crate::runtime::frame::Frame;

/// What the chain does after one operation.
#[derive(Debug)]
pub(crate) enum Flow {
    Continue,
    Raise(ControlledError),
}

pub(crate) type RunFn = Arc<dyn Fn(&mut Frame) -> Flow + Send + Sync>;
pub(crate) type StartFn = Arc<dyn for<'f> Fn(&'f mut Frame) -> BoxFuture<'f, HandlerResult> + Send + Sync>;
pub(crate) type SettleFn = Arc<dyn Fn(HandlerResult, &mut Frame) -> Flow + Send + Sync>;

/// Build a start step whose pending result may borrow the frame.
pub(crate) fn start_fn<F>(f: F) -> StartFn
where
    F: for<'f> Fn(&'f mut Frame) -> BoxFuture<'f, HandlerResult> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// One compiled handler invocation.
#[derive(Clone)]
pub(crate) enum Op {
    /// Invoke, inspect and store in one synchronous step.
    Run(RunFn),
    /// Invoke, await the pending result, then inspect and store.
    Await { start: StartFn, settle: SettleFn },
}

/// Compiled form of one handler group, spliced verbatim wherever the group
/// is used.
pub struct Fragment {
    ops: Vec<Op>,
    deferred: bool,
    needs_context: bool,
    listing: String,
}

impl Fragment {
    pub(crate) fn new(ops: Vec<Op>, deferred: bool, needs_context: bool, listing: String) -> Self {
        Self {
            ops,
            deferred,
            needs_context,
            listing,
        }
    }

    pub(crate) fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub fn needs_context(&self) -> bool {
        self.needs_context
    }

    /// Readable rendering of the compiled operations.
    pub fn listing(&self) -> &str {
        &self.listing
    }

    /// Run outside any deferred scope.
    pub(crate) fn run_sync(&self, frame: &mut Frame) -> Flow {
        for op in &self.ops {
            let flow = match op {
                Op::Run(run) => run(frame),
                Op::Await { .. } => unreachable!("deferred fragment spliced before the deferred scope"),
            };
            if let Flow::Raise(_) = flow {
                return flow;
            }
        }
        Flow::Continue
    }

    /// Run inside the deferred scope.
    pub(crate) async fn run(&self, frame: &mut Frame) -> Flow {
        for op in &self.ops {
            let flow = match op {
                Op::Run(run) => run(frame),
                Op::Await { start, settle } => {
                    let outcome = start(frame).await;
                    settle(outcome, frame)
                }
            };
            if let Flow::Raise(_) = flow {
                return flow;
            }
        }
        Flow::Continue
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment")
            .field("ops", &self.ops.len())
            .field("deferred", &self.deferred)
            .field("needs_context", &self.needs_context)
            .finish()
    }
}
