//! Mail reader: walks every account, folder, message and attachment and
//! drives recognition → validation → dispatch for each watched attachment.
//!
//! Failures below attachment level end up in the message bag and never stop
//! the run. Mailbox enumeration errors and configuration errors are returned
//! to the caller.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::account::MailAccount;
use crate::config::ReaderConfig;
use crate::document::DocumentParser;
use crate::error::Result;
use crate::mailbox::{MailAttachment, MailFolder, MailMessage, Mailbox};
use crate::message_bag::MessageBag;
use crate::pipeline::dispatch::{DispatchContext, DispatchEngine};
use crate::pipeline::recognition::{RecognitionChain, RecognitionResult};
use crate::pipeline::validation::{DocumentValidator, ValidationPipeline};
use crate::util::truncate;

/// Bag source for entries emitted by the reader itself.
pub const READER_SOURCE: &str = "MailReader";

/// Subject and sender are shortened to this many characters in log lines.
const LOG_FIELD_WIDTH: usize = 20;

struct WatchedAccount {
    account: MailAccount,
    mailbox: Arc<dyn Mailbox>,
}

/// Folder tree of one account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountFolders {
    pub account: String,
    pub folders: Vec<MailFolder>,
}

/// Counters of one `check_all_accounts` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub accounts: usize,
    pub folders: usize,
    pub messages: usize,
    pub attachments: usize,
    /// Attachments whose MIME type is not watched.
    pub skipped: usize,
    pub not_recognized: usize,
    pub recognized: usize,
    pub validation_failed: usize,
    pub dispatched: usize,
    pub handler_failures: usize,
    pub callback_failures: usize,
}

/// Scans configured accounts for invoice attachments.
pub struct MailReader {
    config: ReaderConfig,
    recognition: RecognitionChain,
    validators: Vec<Arc<dyn DocumentValidator>>,
    accounts: Vec<WatchedAccount>,
}

impl MailReader {
    pub fn new(config: ReaderConfig, parser: Arc<dyn DocumentParser>) -> Self {
        Self {
            config,
            recognition: RecognitionChain::new(parser),
            validators: Vec::new(),
            accounts: Vec::new(),
        }
    }

    /// Register the validator for one stage. A later validator for the same
    /// stage replaces an earlier one.
    pub fn with_validator(mut self, validator: Arc<dyn DocumentValidator>) -> Self {
        self.validators.retain(|v| v.stage() != validator.stage());
        self.validators.push(validator);
        self
    }

    pub fn add_account(&mut self, account: MailAccount, mailbox: Arc<dyn Mailbox>) -> &mut Self {
        self.accounts.push(WatchedAccount { account, mailbox });
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn accounts(&self) -> impl Iterator<Item = &MailAccount> {
        self.accounts.iter().map(|w| &w.account)
    }

    /// Folder trees of all accounts, in registration order.
    pub async fn available_folders(&self) -> Result<Vec<AccountFolders>> {
        let mut result = Vec::with_capacity(self.accounts.len());
        for watched in &self.accounts {
            result.push(AccountFolders {
                account: watched.account.identifier().to_string(),
                folders: watched.mailbox.list_folders().await?,
            });
        }
        Ok(result)
    }

    /// Run over every account. The bag is cleared first.
    ///
    /// Fails before touching any mailbox when an enabled validation stage has
    /// no validator.
    pub async fn check_all_accounts(&self, bag: &mut MessageBag) -> Result<RunSummary> {
        bag.clear();
        let validation = ValidationPipeline::new(self.config.validation, &self.validators)?;
        let mut summary = RunSummary::default();

        for watched in &self.accounts {
            summary.accounts += 1;
            self.check_account(watched, &validation, bag, &mut summary)
                .await?;
        }

        info!(
            accounts = summary.accounts,
            attachments = summary.attachments,
            recognized = summary.recognized,
            dispatched = summary.dispatched,
            "Finished checking accounts"
        );
        Ok(summary)
    }

    async fn check_account(
        &self,
        watched: &WatchedAccount,
        validation: &ValidationPipeline,
        bag: &mut MessageBag,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let account = &watched.account;
        info!(account = account.identifier(), "Checking account");

        let roots = watched.mailbox.list_folders().await?;
        for folder in roots.iter().flat_map(MailFolder::flatten) {
            if !account.is_watching_folder(&folder.path) {
                continue;
            }
            summary.folders += 1;
            debug!(account = account.identifier(), folder = %folder.path, "Checking folder");

            let messages = watched
                .mailbox
                .list_messages(&folder.path, account.unseen_only())
                .await?;
            for message in &messages {
                summary.messages += 1;
                for attachment in &message.attachments {
                    summary.attachments += 1;
                    let target = AttachmentTarget {
                        account,
                        mailbox: watched.mailbox.as_ref(),
                        folder: &folder.path,
                        message,
                        attachment,
                    };
                    self.check_attachment(target, validation, bag, summary).await;
                }
            }
        }
        Ok(())
    }

    async fn check_attachment(
        &self,
        target: AttachmentTarget<'_>,
        validation: &ValidationPipeline,
        bag: &mut MessageBag,
        summary: &mut RunSummary,
    ) {
        let ctx = target.context();
        let message = target.message;
        let mime_type = &target.attachment.mime_type;

        let recognition = {
            let mut report = bag.reporter(READER_SOURCE).with_data(ctx.additional_data());
            report.log(format!(
                "Checking attachment of mail {}, Subject: {}, Sender: {}",
                message.uid,
                truncate(&message.subject, LOG_FIELD_WIDTH),
                truncate(&message.from, LOG_FIELD_WIDTH),
            ));

            if !target.account.is_watching_mime_type(mime_type) {
                report.log(format!("Mimetype {mime_type} does not match"));
                summary.skipped += 1;
                return;
            }
            report.log(format!("Valid Mimetype {mime_type} found"));

            self.recognition.recognize(
                &target.attachment.content,
                self.config.ubl_support_enabled,
                &mut report,
            )
        };

        let (document, kind) = match recognition {
            RecognitionResult::Recognized { document, kind } => (document, kind),
            RecognitionResult::NotRecognized => {
                summary.not_recognized += 1;
                let engine = DispatchEngine::for_no_document(target.account);
                if !engine.is_empty() {
                    let report = engine.dispatch(&ctx, bag).await;
                    summary.handler_failures += report.handler_failures;
                    summary.callback_failures += report.callback_failures;
                }
                return;
            }
        };
        summary.recognized += 1;

        let ctx = DispatchContext {
            document: Some(&document),
            recognition: Some(kind),
            ..ctx
        };

        {
            let mut report = bag.reporter(READER_SOURCE).with_data(ctx.additional_data());
            if let Err(e) = validation.validate(&document, &mut report).await {
                warn!(uid = %message.uid, error = %e, "Document failed validation");
                report.error(e.to_string());
                summary.validation_failed += 1;
                return;
            }
        }

        let report = DispatchEngine::for_documents(target.account)
            .dispatch(&ctx, bag)
            .await;
        summary.dispatched += 1;
        summary.handler_failures += report.handler_failures;
        summary.callback_failures += report.callback_failures;
    }
}

/// The attachment currently being processed and where it lives.
struct AttachmentTarget<'a> {
    account: &'a MailAccount,
    mailbox: &'a dyn Mailbox,
    folder: &'a str,
    message: &'a MailMessage,
    attachment: &'a MailAttachment,
}

impl<'a> AttachmentTarget<'a> {
    fn context(&self) -> DispatchContext<'a> {
        DispatchContext {
            account: self.account,
            folder: self.folder,
            message: self.message,
            attachment: self.attachment,
            document: None,
            recognition: None,
            mailbox: self.mailbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::InvoiceDocument;
    use crate::error::{ConfigError, Error, RecognitionError};
    use crate::mailbox::InMemoryMailbox;

    struct XmlOnlyParser;

    impl DocumentParser for XmlOnlyParser {
        fn parse_pdf_embedded(
            &self,
            _bytes: &[u8],
        ) -> std::result::Result<InvoiceDocument, RecognitionError> {
            Err(RecognitionError::Parse("not a PDF".into()))
        }

        fn parse_xml_cii(
            &self,
            bytes: &[u8],
        ) -> std::result::Result<InvoiceDocument, RecognitionError> {
            if bytes.starts_with(b"<CII") {
                Ok(InvoiceDocument {
                    document_no: Some("471102".into()),
                    ..Default::default()
                })
            } else {
                Err(RecognitionError::Parse("not CII".into()))
            }
        }

        fn convert_ubl_to_cii(
            &self,
            _bytes: &[u8],
        ) -> std::result::Result<Vec<u8>, RecognitionError> {
            Err(RecognitionError::Conversion("not UBL".into()))
        }
    }

    fn message(attachments: Vec<MailAttachment>) -> MailMessage {
        MailMessage {
            uid: "1".into(),
            subject: "Your invoice for October 2024".into(),
            from: "billing@lieferant-gmbh.de".into(),
            seen: false,
            attachments,
        }
    }

    fn account(mime_types: &[&str]) -> MailAccount {
        let mut account = MailAccount::new();
        account
            .set_identifier("office")
            .set_folders(["INBOX"])
            .set_mime_types(mime_types.iter().copied());
        account
    }

    #[tokio::test]
    async fn unwatched_mime_type_is_skipped() {
        let mailbox = InMemoryMailbox::new().with_message(
            "INBOX",
            message(vec![MailAttachment::new(Some("note.txt"), "text/plain", b"hi".to_vec())]),
        );
        let mut reader = MailReader::new(ReaderConfig::default(), Arc::new(XmlOnlyParser));
        reader.add_account(account(&["application/pdf"]), Arc::new(mailbox));

        let mut bag = MessageBag::new();
        let summary = reader.check_all_accounts(&mut bag).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.recognized + summary.not_recognized, 0);
        assert_eq!(
            bag.log_messages(),
            vec![
                "Checking attachment of mail 1, Subject: Your invoice for ..., \
                 Sender: billing@lieferan...",
                "Mimetype text/plain does not match",
            ]
        );
        assert!(bag.has_no_warning_messages());
    }

    #[tokio::test]
    async fn bag_is_cleared_per_run() {
        let mailbox = InMemoryMailbox::new().with_folder("INBOX");
        let mut reader = MailReader::new(ReaderConfig::default(), Arc::new(XmlOnlyParser));
        reader.add_account(account(&["text/xml"]), Arc::new(mailbox));

        let mut bag = MessageBag::new();
        bag.add_error("old", "left over");
        reader.check_all_accounts(&mut bag).await.unwrap();
        assert!(bag.is_empty());
    }

    #[tokio::test]
    async fn missing_validator_fails_the_run() {
        let config =
            ReaderConfig::default().with_validation(crate::config::ValidationSettings::all());
        let reader = MailReader::new(config, Arc::new(XmlOnlyParser));
        let mut bag = MessageBag::new();
        let err = reader.check_all_accounts(&mut bag).await.unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingValidator { .. })));
    }

    #[tokio::test]
    async fn lists_folders_per_account() {
        let mailbox = InMemoryMailbox::new().with_folder("INBOX");
        let mut reader = MailReader::new(ReaderConfig::default(), Arc::new(XmlOnlyParser));
        reader.add_account(account(&["text/xml"]), Arc::new(mailbox));

        let folders = reader.available_folders().await.unwrap();
        assert_eq!(folders[0].account, "office");
        assert_eq!(folders[0].folders[0].path, "INBOX");
    }
}
