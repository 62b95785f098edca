//! Per-invocation state of a compiled chain.

use crate::handler::{Context, Params};
use crate::http::response::ResponseHead;

/// State owned by exactly one invocation of a compiled route.
#[derive(Debug, Default)]
pub struct Frame {
    params: Option<Params>,
    context: Option<Context>,
}

impl Frame {
    pub(crate) fn new(params: Option<Params>) -> Self {
        Self {
            params,
            context: None,
        }
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn context_ref(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    /// Allocate the route context, binding path parameters.
    pub(crate) fn allocate(&mut self) {
        if self.context.is_none() {
            self.context = Some(Context::new(self.params.take()));
        }
    }

    /// Replace the context with a fresh one, without path parameters,
    /// for an error route.
    pub(crate) fn detach(&mut self) {
        self.context = Some(Context::new(None));
    }

    /// The route context. Compiled chains allocate it before the first
    /// handler that reads it, so the fallback only runs for hand-built
    /// frames.
    pub(crate) fn context(&mut self) -> &mut Context {
        let params = &mut self.params;
        self.context
            .get_or_insert_with(|| Context::new(params.take()))
    }

    /// Move status and headers out of the context for the final response.
    pub(crate) fn take_head(&mut self) -> ResponseHead {
        match self.context.as_mut() {
            Some(ctx) => ResponseHead::new(ctx.status, std::mem::take(&mut ctx.headers)),
            None => ResponseHead::plain(),
        }
    }
}
