//! Mailbox abstraction: folders, messages and attachments.
//!
//! The reader never speaks a mail protocol itself. It enumerates and
//! manipulates messages through the [`Mailbox`] trait.

pub mod eml;
pub mod memory;

use std::path::Path;

use async_trait::async_trait;
use mail_parser::{MessageParser, MimeHeaders};
use serde::{Deserialize, Serialize};

use crate::error::MailboxError;
use crate::util::extension_for_mime;

pub use eml::EmlDirectoryMailbox;
pub use memory::InMemoryMailbox;

/// MIME type assumed for parts without a Content-Type header.
const DEFAULT_ATTACHMENT_MIME: &str = "application/octet-stream";

/// A mailbox folder and its sub-folders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailFolder {
    /// Full path, segments joined by `/`.
    pub path: String,
    /// Last path segment.
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MailFolder>,
}

impl MailFolder {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            path,
            name,
            children: Vec::new(),
        }
    }

    /// This folder followed by all descendants, depth first.
    pub fn flatten(&self) -> Vec<&MailFolder> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }
}

/// A single attachment of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub name: Option<String>,
    /// Lower-cased `type/subtype`, without parameters.
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl MailAttachment {
    pub fn new(name: Option<&str>, mime_type: &str, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.map(str::to_string),
            mime_type: mime_type.to_ascii_lowercase(),
            content: content.into(),
        }
    }

    /// Extension from the file name, else from the MIME type.
    pub fn extension(&self) -> Option<String> {
        self.name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(str::to_string)
            .or_else(|| extension_for_mime(&self.mime_type).map(str::to_string))
    }

    /// File name without extension, if the attachment has a name.
    pub fn stem(&self) -> Option<String> {
        self.name
            .as_deref()
            .and_then(|name| Path::new(name).file_stem())
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map(str::to_string)
    }

    /// Name used in log lines.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed)")
    }
}

/// A message with its attachments already fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Mailbox-unique message id within its folder.
    pub uid: String,
    pub subject: String,
    pub from: String,
    pub seen: bool,
    pub attachments: Vec<MailAttachment>,
}

impl MailMessage {
    /// Parse an RFC 5322 message and collect its attachments.
    pub fn parse(uid: impl Into<String>, raw: &[u8], seen: bool) -> Result<Self, MailboxError> {
        let uid = uid.into();
        let Some(parsed) = MessageParser::default().parse(raw) else {
            return Err(MailboxError::UnparsableMessage(uid));
        };

        let subject = parsed.subject().unwrap_or_default().to_string();
        let from = parsed
            .from()
            .and_then(|addr| addr.first())
            .and_then(|a| a.address())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let attachments = parsed
            .attachments()
            .map(|part| {
                let mime_type = MimeHeaders::content_type(part)
                    .map(|ct| match ct.subtype() {
                        Some(sub) => format!("{}/{}", ct.ctype(), sub),
                        None => ct.ctype().to_string(),
                    })
                    .unwrap_or_else(|| DEFAULT_ATTACHMENT_MIME.to_string());
                MailAttachment::new(
                    MimeHeaders::attachment_name(part),
                    &mime_type,
                    part.contents(),
                )
            })
            .collect();

        Ok(Self {
            uid,
            subject,
            from,
            seen,
            attachments,
        })
    }
}

/// Access to a mail store.
///
/// Folder arguments are full paths as reported in [`MailFolder::path`].
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Root folders, each with its full sub-tree.
    async fn list_folders(&self) -> Result<Vec<MailFolder>, MailboxError>;

    /// Messages in `folder`, optionally restricted to unseen ones.
    async fn list_messages(
        &self,
        folder: &str,
        unseen_only: bool,
    ) -> Result<Vec<MailMessage>, MailboxError>;

    async fn move_message(
        &self,
        folder: &str,
        uid: &str,
        destination: &str,
    ) -> Result<(), MailboxError>;

    async fn copy_message(
        &self,
        folder: &str,
        uid: &str,
        destination: &str,
    ) -> Result<(), MailboxError>;

    async fn delete_message(&self, folder: &str, uid: &str) -> Result<(), MailboxError>;

    /// Set or clear the `\Seen` flag.
    async fn set_seen(&self, folder: &str, uid: &str, seen: bool) -> Result<(), MailboxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "From: Lieferant GmbH <billing@lieferant.de>\r\n\
To: ap@kunde.de\r\n\
Subject: Rechnung 471102\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain\r\n\
\r\n\
Please find the invoice attached.\r\n\
--XYZ\r\n\
Content-Type: application/xml\r\n\
Content-Disposition: attachment; filename=\"invoice.xml\"\r\n\
\r\n\
<rsm:CrossIndustryInvoice/>\r\n\
--XYZ--\r\n";

    #[test]
    fn parse_collects_headers_and_attachments() {
        let msg = MailMessage::parse("1", RAW.as_bytes(), false).unwrap();
        assert_eq!(msg.uid, "1");
        assert_eq!(msg.subject, "Rechnung 471102");
        assert_eq!(msg.from, "billing@lieferant.de");
        assert!(!msg.seen);
        assert_eq!(msg.attachments.len(), 1);

        let att = &msg.attachments[0];
        assert_eq!(att.name.as_deref(), Some("invoice.xml"));
        assert_eq!(att.mime_type, "application/xml");
        assert!(String::from_utf8_lossy(&att.content).contains("CrossIndustryInvoice"));
    }

    #[test]
    fn attachment_extension_prefers_file_name() {
        let named = MailAttachment::new(Some("scan.PDF"), "application/octet-stream", vec![]);
        assert_eq!(named.extension().as_deref(), Some("PDF"));
        assert_eq!(named.stem().as_deref(), Some("scan"));

        let unnamed = MailAttachment::new(None, "Application/PDF", vec![]);
        assert_eq!(unnamed.mime_type, "application/pdf");
        assert_eq!(unnamed.extension().as_deref(), Some("pdf"));
        assert_eq!(unnamed.stem(), None);

        let unknown = MailAttachment::new(None, "application/x-foo", vec![]);
        assert_eq!(unknown.extension(), None);
    }

    #[test]
    fn folder_flatten_is_depth_first() {
        let mut root = MailFolder::new("INBOX");
        let mut invoices = MailFolder::new("INBOX/Invoices");
        invoices.children.push(MailFolder::new("INBOX/Invoices/2024"));
        root.children.push(invoices);
        root.children.push(MailFolder::new("INBOX/Other"));

        let paths: Vec<&str> = root.flatten().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["INBOX", "INBOX/Invoices", "INBOX/Invoices/2024", "INBOX/Other"]
        );
        assert_eq!(root.children[0].children[0].name, "2024");
    }
}
