//! Compiled controlled-error dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::error::ControlledError;
use crate::http::response::CannedResponse;
use crate::observability::metrics;
use crate::runtime::chain::Terminal;
use crate::runtime::dispatch::Dispatch;
use crate::runtime::frame::Frame;

/// Compiled error route.
pub(crate) enum BranchTerminal {
    Static(Terminal<()>),
    Dynamic(Terminal<Value>),
}

pub(crate) struct Branch {
    terminal: BranchTerminal,
    needs_context: bool,
}

impl Branch {
    pub(crate) fn new(terminal: BranchTerminal, needs_context: bool) -> Self {
        Self {
            terminal,
            needs_context,
        }
    }

    /// Error routes reading the context start from a fresh one.
    fn prepare(&self, frame: &mut Frame) {
        if self.needs_context {
            frame.detach();
        }
    }

    fn run(&self, err: ControlledError, mut frame: Frame) -> Dispatch {
        self.prepare(&mut frame);
        match &self.terminal {
            BranchTerminal::Static(terminal) => terminal.call((), frame),
            BranchTerminal::Dynamic(terminal) => terminal.call(err.into_payload(), frame),
        }
    }

    async fn run_in_scope(&self, err: ControlledError, frame: &mut Frame) -> Response {
        self.prepare(frame);
        match &self.terminal {
            BranchTerminal::Static(terminal) => terminal.call_in_scope((), frame).await,
            BranchTerminal::Dynamic(terminal) => terminal.call_in_scope(err.into_payload(), frame).await,
        }
    }
}

/// Dispatch shape chosen from the number of declared error kinds.
pub(crate) enum Switch {
    /// No kinds declared: every controlled error is unhandled.
    Unhandled,
    /// One kind: a single equality test.
    Single(u32, Branch),
    /// Several kinds: a table keyed by error id.
    Table(HashMap<u32, Branch>),
}

/// Error dispatch shared by every checked point of the routes that use one
/// error table.
pub(crate) struct ErrorDispatch {
    switch: Switch,
    unhandled: Arc<CannedResponse>,
}

impl ErrorDispatch {
    pub(crate) fn new(switch: Switch, unhandled: Arc<CannedResponse>) -> Self {
        Self { switch, unhandled }
    }

    pub(crate) fn unhandled(&self) -> &Arc<CannedResponse> {
        &self.unhandled
    }

    fn branch(&self, err: &ControlledError) -> Option<&Branch> {
        let branch = match &self.switch {
            Switch::Unhandled => None,
            Switch::Single(id, branch) => (*id == err.id()).then_some(branch),
            Switch::Table(branches) => branches.get(&err.id()),
        };
        match branch {
            Some(_) => metrics::record_controlled_error(true),
            None => {
                tracing::warn!(error_id = err.id(), "Unhandled controlled error");
                metrics::record_controlled_error(false);
            }
        }
        branch
    }

    /// Dispatch an error raised before any deferred scope.
    pub(crate) fn dispatch(&self, err: ControlledError, frame: Frame) -> Dispatch {
        match self.branch(&err) {
            Some(branch) => branch.run(err, frame),
            None => Dispatch::Ready(self.unhandled.response()),
        }
    }

    /// Dispatch an error raised inside the deferred scope.
    pub(crate) async fn dispatch_in_scope(&self, err: ControlledError, frame: &mut Frame) -> Response {
        match self.branch(&err) {
            Some(branch) => branch.run_in_scope(err, frame).await,
            None => self.unhandled.response(),
        }
    }
}
