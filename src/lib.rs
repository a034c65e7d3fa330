//! ZUGFeRD mail reader: scans mailboxes for electronic invoices and hands
//! them to configurable handlers.

pub mod account;
pub mod config;
pub mod document;
pub mod error;
pub mod handlers;
pub mod mailbox;
pub mod message_bag;
pub mod pipeline;
pub mod placeholder;
pub mod util;

pub use account::{ConnectionSettings, MailAccount};
pub use config::{AccountConfig, HandlerSpec, ReaderConfig, ValidationSettings};
pub use document::{DocumentParser, InvoiceDocument, RecognitionKind};
pub use error::{Error, HandlerError, Result};
pub use handlers::{Callback, CallbackFlow, DocumentHandler, HandlerRegistry};
pub use mailbox::{MailAttachment, MailFolder, MailMessage, Mailbox};
pub use message_bag::{MessageBag, MessageType};
pub use pipeline::{MailReader, RunSummary};
