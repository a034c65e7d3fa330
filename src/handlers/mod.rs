//! Consumers of recognized documents: handlers and callbacks.
//!
//! Handlers are named, configurable objects (usually built from a
//! [`HandlerSpec`](crate::config::HandlerSpec) through the
//! [`registry`]). Callbacks are plain closures that can stop the remaining
//! callbacks by returning [`CallbackFlow::Stop`].

pub mod message_ops;
pub mod noop;
pub mod registry;
pub mod save_to_file;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::message_bag::MessageBag;
use crate::pipeline::dispatch::DispatchContext;

pub use message_ops::{
    CopyMessageHandler, DeleteMessageHandler, MarkSeenHandler, MarkUnseenHandler,
    MoveMessageHandler,
};
pub use noop::NoopHandler;
pub use registry::HandlerRegistry;
pub use save_to_file::SaveToFileHandler;

/// A side-effecting consumer of a document.
///
/// Handlers run for every recognized and validated attachment. When
/// registered as a no-document handler they also run for watched attachments
/// that were not recognized, with `ctx.document` set to `None`.
#[async_trait]
pub trait DocumentHandler: Send + Sync {
    /// Name used as the message bag source.
    fn name(&self) -> &str;

    async fn handle_document(
        &self,
        ctx: &DispatchContext<'_>,
        bag: &mut MessageBag,
    ) -> Result<(), HandlerError>;
}

/// Whether the callback chain should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallbackFlow {
    #[default]
    Continue,
    Stop,
}

/// A callback invoked after all handlers.
pub type Callback = Arc<
    dyn Fn(&DispatchContext<'_>, &mut MessageBag) -> Result<CallbackFlow, HandlerError>
        + Send
        + Sync,
>;

/// Wrap a closure as a [`Callback`].
pub fn callback<F>(f: F) -> Callback
where
    F: Fn(&DispatchContext<'_>, &mut MessageBag) -> Result<CallbackFlow, HandlerError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}
