//! Save the attachment to a directory under a placeholder-derived name.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::fs;
use tracing::info;

use super::DocumentHandler;
use crate::document::InvoiceDocument;
use crate::error::{ConfigError, HandlerError};
use crate::mailbox::MailAttachment;
use crate::message_bag::MessageBag;
use crate::pipeline::dispatch::DispatchContext;
use crate::placeholder::resolve_for_document;

/// File name pattern used when none is configured.
pub const DEFAULT_FILENAME_PATTERN: &str = "{documentno}_{documentsellername}";

/// Stem used when neither the pattern nor the attachment yields a name.
const FALLBACK_STEM: &str = "attachment";

static UNDERSCORE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("underscore pattern is valid"));

/// Writes the attachment bytes to `<directory>/<resolved pattern>.<ext>`.
#[derive(Debug, Clone)]
pub struct SaveToFileHandler {
    /// Always ends with a path separator.
    directory: String,
    pattern: String,
}

impl SaveToFileHandler {
    /// `directory` must exist. An empty `pattern` selects
    /// [`DEFAULT_FILENAME_PATTERN`].
    pub fn new(directory: &str, pattern: &str) -> Result<Self, ConfigError> {
        if directory.is_empty() {
            return Err(ConfigError::EmptyFilePath);
        }
        let directory = format!(
            "{}{MAIN_SEPARATOR}",
            directory.trim_end_matches(['/', MAIN_SEPARATOR])
        );
        if !Path::new(&directory).is_dir() {
            return Err(ConfigError::DirectoryNotFound(directory));
        }

        let pattern = if pattern.is_empty() {
            DEFAULT_FILENAME_PATTERN
        } else {
            pattern
        };

        Ok(Self {
            directory,
            pattern: pattern.to_string(),
        })
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Final file name for the current attachment.
    pub fn file_name_for(&self, ctx: &DispatchContext<'_>) -> String {
        build_file_name(&self.pattern, ctx.document, ctx.attachment)
    }
}

fn build_file_name(
    pattern: &str,
    document: Option<&InvoiceDocument>,
    attachment: &MailAttachment,
) -> String {
    let resolved = resolve_for_document(pattern, document).replace(['/', '\\'], "_");
    let collapsed = UNDERSCORE_RUNS.replace_all(&resolved, "_");

    let stem = if collapsed.trim_matches('_').trim().is_empty() {
        attachment
            .stem()
            .unwrap_or_else(|| FALLBACK_STEM.to_string())
    } else {
        collapsed.into_owned()
    };

    match attachment.extension() {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

#[async_trait]
impl DocumentHandler for SaveToFileHandler {
    fn name(&self) -> &str {
        "save_to_file"
    }

    async fn handle_document(
        &self,
        ctx: &DispatchContext<'_>,
        bag: &mut MessageBag,
    ) -> Result<(), HandlerError> {
        let file_name = self.file_name_for(ctx);
        let target: PathBuf = Path::new(&self.directory).join(&file_name);
        let mut report = bag.reporter(self.name()).with_data(ctx.additional_data());

        report.log(format!("Saving attachment to {}{file_name}", self.directory));
        match fs::write(&target, &ctx.attachment.content).await {
            Ok(()) => {
                info!(
                    path = %target.display(),
                    bytes = ctx.attachment.content.len(),
                    "Saved attachment"
                );
                report.log(format!(
                    "Successfully saved attachment to {}{file_name}",
                    self.directory
                ));
                Ok(())
            }
            Err(e) => {
                report.error(format!("Failed to save attachment: {e}"));
                Err(HandlerError::from(e))
            }
        }
    }
}
