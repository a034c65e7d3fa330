//! Handler that does nothing.

use async_trait::async_trait;

use super::DocumentHandler;
use crate::error::HandlerError;
use crate::message_bag::MessageBag;
use crate::pipeline::dispatch::DispatchContext;

/// Placeholder handler. Useful to keep a handler slot in a configuration
/// without side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl NoopHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentHandler for NoopHandler {
    fn name(&self) -> &str {
        "noop"
    }

    async fn handle_document(
        &self,
        _ctx: &DispatchContext<'_>,
        _bag: &mut MessageBag,
    ) -> Result<(), HandlerError> {
        Ok(())
    }
}
