//! Handlers acting on the mail message itself: move, copy, delete and
//! seen-flag changes.

use async_trait::async_trait;
use tracing::info;

use super::DocumentHandler;
use crate::error::{ConfigError, HandlerError};
use crate::message_bag::MessageBag;
use crate::pipeline::dispatch::DispatchContext;
use crate::placeholder::resolve_for_document;

/// Resolve a destination folder template for the current document.
fn destination(template: &str, ctx: &DispatchContext<'_>) -> String {
    resolve_for_document(template, ctx.document)
}

fn require_folder(folder: &str) -> Result<String, ConfigError> {
    if folder.is_empty() {
        return Err(ConfigError::EmptyDestinationFolder);
    }
    Ok(folder.to_string())
}

/// Moves the message into another folder. The folder may contain placeholders.
#[derive(Debug, Clone)]
pub struct MoveMessageHandler {
    folder: String,
}

impl MoveMessageHandler {
    pub fn new(folder: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            folder: require_folder(folder)?,
        })
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }
}

#[async_trait]
impl DocumentHandler for MoveMessageHandler {
    fn name(&self) -> &str {
        "move_message"
    }

    async fn handle_document(
        &self,
        ctx: &DispatchContext<'_>,
        bag: &mut MessageBag,
    ) -> Result<(), HandlerError> {
        let target = destination(&self.folder, ctx);
        let mut report = bag.reporter(self.name()).with_data(ctx.additional_data());
        report.log(format!("Moving mail to {target}"));
        match ctx
            .mailbox
            .move_message(ctx.folder, &ctx.message.uid, &target)
            .await
        {
            Ok(()) => {
                info!(uid = %ctx.message.uid, folder = %target, "Moved message");
                report.log(format!("Successfully moved mail to {target}"));
                Ok(())
            }
            Err(e) => {
                report.error(format!("Failed to move mail: {e}"));
                Err(HandlerError::from(e))
            }
        }
    }
}

/// Copies the message into another folder. The folder may contain placeholders.
#[derive(Debug, Clone)]
pub struct CopyMessageHandler {
    folder: String,
}

impl CopyMessageHandler {
    pub fn new(folder: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            folder: require_folder(folder)?,
        })
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }
}

#[async_trait]
impl DocumentHandler for CopyMessageHandler {
    fn name(&self) -> &str {
        "copy_message"
    }

    async fn handle_document(
        &self,
        ctx: &DispatchContext<'_>,
        bag: &mut MessageBag,
    ) -> Result<(), HandlerError> {
        let target = destination(&self.folder, ctx);
        let mut report = bag.reporter(self.name()).with_data(ctx.additional_data());
        report.log(format!("Copying mail to {target}"));
        match ctx
            .mailbox
            .copy_message(ctx.folder, &ctx.message.uid, &target)
            .await
        {
            Ok(()) => {
                info!(uid = %ctx.message.uid, folder = %target, "Copied message");
                report.log(format!("Successfully copied mail to {target}"));
                Ok(())
            }
            Err(e) => {
                report.error(format!("Failed to copy mail: {e}"));
                Err(HandlerError::from(e))
            }
        }
    }
}

/// Deletes the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteMessageHandler;

#[async_trait]
impl DocumentHandler for DeleteMessageHandler {
    fn name(&self) -> &str {
        "delete_message"
    }

    async fn handle_document(
        &self,
        ctx: &DispatchContext<'_>,
        bag: &mut MessageBag,
    ) -> Result<(), HandlerError> {
        let uid = &ctx.message.uid;
        let mut report = bag.reporter(self.name()).with_data(ctx.additional_data());
        report.log(format!("Deleting message with {uid}"));
        match ctx.mailbox.delete_message(ctx.folder, uid).await {
            Ok(()) => {
                info!(uid = %uid, folder = ctx.folder, "Deleted message");
                report.log(format!("Successfully deleted message with {uid}"));
                Ok(())
            }
            Err(e) => {
                report.error(format!("Failed to delete message with id {uid}: {e}"));
                Err(HandlerError::from(e))
            }
        }
    }
}

/// Sets the `\Seen` flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkSeenHandler;

/// Clears the `\Seen` flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkUnseenHandler;

async fn set_seen(
    name: &str,
    seen: bool,
    ctx: &DispatchContext<'_>,
    bag: &mut MessageBag,
) -> Result<(), HandlerError> {
    let uid = &ctx.message.uid;
    let state = if seen { "seen" } else { "unseen" };
    let mut report = bag.reporter(name).with_data(ctx.additional_data());
    report.log(format!("Marking mail {uid} as {state}"));
    match ctx.mailbox.set_seen(ctx.folder, uid, seen).await {
        Ok(()) => {
            report.log(format!("Successfully marked mail {uid} as {state}"));
            Ok(())
        }
        Err(e) => {
            report.error(format!("Failed to mark mail as {state}: {e}"));
            Err(HandlerError::from(e))
        }
    }
}

#[async_trait]
impl DocumentHandler for MarkSeenHandler {
    fn name(&self) -> &str {
        "mark_seen"
    }

    async fn handle_document(
        &self,
        ctx: &DispatchContext<'_>,
        bag: &mut MessageBag,
    ) -> Result<(), HandlerError> {
        set_seen(self.name(), true, ctx, bag).await
    }
}

#[async_trait]
impl DocumentHandler for MarkUnseenHandler {
    fn name(&self) -> &str {
        "mark_unseen"
    }

    async fn handle_document(
        &self,
        ctx: &DispatchContext<'_>,
        bag: &mut MessageBag,
    ) -> Result<(), HandlerError> {
        set_seen(self.name(), false, ctx, bag).await
    }
}
