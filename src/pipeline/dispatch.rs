//! Dispatch of a document to handlers and callbacks.
//!
//! Every handler and callback call is isolated: a failure becomes an error
//! entry with its code, file, line and trace, and the loop moves on. Only a
//! callback returning [`CallbackFlow::Stop`] ends the callback loop early.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::account::MailAccount;
use crate::document::{InvoiceDocument, RecognitionKind};
use crate::error::HandlerError;
use crate::handlers::{Callback, CallbackFlow, DocumentHandler};
use crate::mailbox::{MailAttachment, MailMessage, Mailbox};
use crate::message_bag::{AdditionalData, MessageBag};

/// Bag source for callback failures.
const CALLBACK_SOURCE: &str = "Callback";

/// Everything a handler or callback gets to see about the current attachment.
pub struct DispatchContext<'a> {
    pub account: &'a MailAccount,
    /// Full folder path.
    pub folder: &'a str,
    pub message: &'a MailMessage,
    pub attachment: &'a MailAttachment,
    /// `None` for no-document dispatches.
    pub document: Option<&'a InvoiceDocument>,
    pub recognition: Option<RecognitionKind>,
    pub mailbox: &'a dyn Mailbox,
}

impl DispatchContext<'_> {
    /// Identifying data attached to every bag entry for this attachment.
    pub fn additional_data(&self) -> AdditionalData {
        let mut data = AdditionalData::new();
        data.insert("account".into(), Value::from(self.account.identifier()));
        data.insert("folder".into(), Value::from(self.folder));
        data.insert("message_uid".into(), Value::from(self.message.uid.as_str()));
        data.insert("attachment".into(), Value::from(self.attachment.display_name()));
        if let Some(kind) = self.recognition {
            data.insert("recognition".into(), Value::from(kind.label()));
        }
        data
    }

    /// The document, or an error for handlers that cannot work without one.
    /// The error records the caller's location.
    #[track_caller]
    pub fn require_document(&self) -> Result<&InvoiceDocument, HandlerError> {
        match self.document {
            Some(document) => Ok(document),
            None => Err(HandlerError::msg("No document available for this handler")),
        }
    }
}

/// Counters of a single dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub handlers_run: usize,
    pub handler_failures: usize,
    pub callbacks_run: usize,
    pub callback_failures: usize,
    /// A callback returned [`CallbackFlow::Stop`].
    pub stopped_early: bool,
}

impl DispatchReport {
    pub fn has_failures(&self) -> bool {
        self.handler_failures > 0 || self.callback_failures > 0
    }
}

/// Runs an ordered handler list followed by an ordered callback list.
pub struct DispatchEngine<'h> {
    handlers: &'h [Arc<dyn DocumentHandler>],
    callbacks: &'h [Callback],
}

impl<'h> DispatchEngine<'h> {
    pub fn new(handlers: &'h [Arc<dyn DocumentHandler>], callbacks: &'h [Callback]) -> Self {
        Self {
            handlers,
            callbacks,
        }
    }

    /// Handlers and callbacks for recognized documents.
    pub fn for_documents(account: &'h MailAccount) -> Self {
        Self::new(account.handlers(), account.callbacks())
    }

    /// Handlers and callbacks for watched attachments without a document.
    pub fn for_no_document(account: &'h MailAccount) -> Self {
        Self::new(account.no_document_handlers(), account.no_document_callbacks())
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty() && self.callbacks.is_empty()
    }

    pub async fn dispatch(
        &self,
        ctx: &DispatchContext<'_>,
        bag: &mut MessageBag,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for handler in self.handlers {
            report.handlers_run += 1;
            debug!(handler = handler.name(), uid = %ctx.message.uid, "Running handler");
            if let Err(e) = handler.handle_document(ctx, bag).await {
                report.handler_failures += 1;
                warn!(handler = handler.name(), error = %e, "Handler failed");
                let mut data = ctx.additional_data();
                data.insert("handler".into(), Value::from(handler.name()));
                bag.add_throwable(&e, handler.name(), data);
            }
        }

        for (index, callback) in self.callbacks.iter().enumerate() {
            report.callbacks_run += 1;
            match callback(ctx, bag) {
                Ok(CallbackFlow::Continue) => {}
                Ok(CallbackFlow::Stop) => {
                    debug!(index, "Callback stopped the callback chain");
                    report.stopped_early = true;
                    break;
                }
                Err(e) => {
                    report.callback_failures += 1;
                    warn!(index, error = %e, "Callback failed");
                    let mut data = ctx.additional_data();
                    data.insert("callback".into(), Value::from(index));
                    bag.add_throwable(&e, CALLBACK_SOURCE, data);
                }
            }
        }

        report
    }
}
