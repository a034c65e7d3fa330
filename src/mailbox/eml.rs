//! Mailbox backed by a directory of `.eml` files.
//!
//! Layout:
//! - every sub-directory of the root is a folder (`INBOX/Invoices` is
//!   `<root>/INBOX/Invoices`)
//! - `<uid>.eml` is an unseen message, `<uid>.seen.eml` a seen one
//!
//! Flag changes are renames, move/copy/delete map to the matching file
//! operation.

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::{MailFolder, MailMessage, Mailbox};
use crate::error::MailboxError;

const UNSEEN_SUFFIX: &str = ".eml";
const SEEN_SUFFIX: &str = ".seen.eml";

/// Directory-backed mailbox.
#[derive(Debug, Clone)]
pub struct EmlDirectoryMailbox {
    root: PathBuf,
}

impl EmlDirectoryMailbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a folder path. Fails for paths escaping the root or
    /// folders that do not exist.
    fn folder_dir(&self, folder: &str) -> Result<PathBuf, MailboxError> {
        let relative = Path::new(folder);
        let escapes = folder.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        let dir = self.root.join(relative);
        if escapes || !dir.is_dir() {
            return Err(MailboxError::FolderNotFound(folder.to_string()));
        }
        Ok(dir)
    }

    /// File currently holding message `uid`, with its seen state.
    fn message_file(&self, folder: &str, uid: &str) -> Result<(PathBuf, bool), MailboxError> {
        let dir = self.folder_dir(folder)?;
        let seen = dir.join(format!("{uid}{SEEN_SUFFIX}"));
        if seen.is_file() {
            return Ok((seen, true));
        }
        let unseen = dir.join(format!("{uid}{UNSEEN_SUFFIX}"));
        if unseen.is_file() {
            return Ok((unseen, false));
        }
        Err(MailboxError::MessageNotFound {
            folder: folder.to_string(),
            uid: uid.to_string(),
        })
    }

    /// Fails when `dir` already holds message `uid` under either suffix.
    fn ensure_uid_free(dir: &Path, destination: &str, uid: &str) -> Result<(), MailboxError> {
        let taken = [SEEN_SUFFIX, UNSEEN_SUFFIX]
            .iter()
            .any(|suffix| dir.join(format!("{uid}{suffix}")).exists());
        if taken {
            return Err(MailboxError::OperationFailed(format!(
                "message {uid} already exists in folder {destination}"
            )));
        }
        Ok(())
    }

    fn scan_dir<'a>(
        &'a self,
        dir: &'a Path,
        prefix: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<MailFolder>, MailboxError>> + Send + 'a>> {
        Box::pin(async move {
            let mut names = Vec::new();
            let mut read_dir = fs::read_dir(dir).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                if entry.metadata().await?.is_dir() && !name.starts_with('.') {
                    names.push(name);
                }
            }
            names.sort();

            let mut folders = Vec::with_capacity(names.len());
            for name in names {
                let path = match prefix {
                    Some(prefix) => format!("{prefix}/{name}"),
                    None => name.clone(),
                };
                let mut folder = MailFolder::new(path.clone());
                folder.children = self.scan_dir(&dir.join(&name), Some(&path)).await?;
                folders.push(folder);
            }
            Ok(folders)
        })
    }
}

/// Split a message file name into uid and seen state.
fn parse_file_name(name: &str) -> Option<(&str, bool)> {
    if let Some(uid) = name.strip_suffix(SEEN_SUFFIX) {
        return Some((uid, true));
    }
    name.strip_suffix(UNSEEN_SUFFIX).map(|uid| (uid, false))
}

#[async_trait]
impl Mailbox for EmlDirectoryMailbox {
    async fn list_folders(&self) -> Result<Vec<MailFolder>, MailboxError> {
        if !self.root.is_dir() {
            return Err(MailboxError::FolderNotFound(
                self.root.to_string_lossy().to_string(),
            ));
        }
        self.scan_dir(&self.root, None).await
    }

    async fn list_messages(
        &self,
        folder: &str,
        unseen_only: bool,
    ) -> Result<Vec<MailMessage>, MailboxError> {
        let dir = self.folder_dir(folder)?;

        let mut files = Vec::new();
        let mut read_dir = fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            if entry.metadata().await?.is_file() {
                files.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        files.sort();

        let mut messages = Vec::new();
        for file in &files {
            let Some((uid, seen)) = parse_file_name(file) else {
                continue;
            };
            if unseen_only && seen {
                continue;
            }
            let raw = fs::read(dir.join(file)).await?;
            match MailMessage::parse(uid, &raw, seen) {
                Ok(message) => messages.push(message),
                Err(e) => warn!(folder, file = %file, error = %e, "Skipping unparsable message"),
            }
        }
        debug!(folder, count = messages.len(), "Listed messages");
        Ok(messages)
    }

    async fn move_message(
        &self,
        folder: &str,
        uid: &str,
        destination: &str,
    ) -> Result<(), MailboxError> {
        let (source, _) = self.message_file(folder, uid)?;
        let target_dir = self.folder_dir(destination)?;
        Self::ensure_uid_free(&target_dir, destination, uid)?;
        let Some(file_name) = source.file_name() else {
            return Err(MailboxError::OperationFailed(format!(
                "invalid message path {}",
                source.display()
            )));
        };
        fs::rename(&source, target_dir.join(file_name)).await?;
        Ok(())
    }

    async fn copy_message(
        &self,
        folder: &str,
        uid: &str,
        destination: &str,
    ) -> Result<(), MailboxError> {
        let (source, _) = self.message_file(folder, uid)?;
        let target_dir = self.folder_dir(destination)?;
        Self::ensure_uid_free(&target_dir, destination, uid)?;
        let Some(file_name) = source.file_name() else {
            return Err(MailboxError::OperationFailed(format!(
                "invalid message path {}",
                source.display()
            )));
        };
        fs::copy(&source, target_dir.join(file_name)).await?;
        Ok(())
    }

    async fn delete_message(&self, folder: &str, uid: &str) -> Result<(), MailboxError> {
        let (source, _) = self.message_file(folder, uid)?;
        fs::remove_file(source).await?;
        Ok(())
    }

    async fn set_seen(&self, folder: &str, uid: &str, seen: bool) -> Result<(), MailboxError> {
        let (source, currently_seen) = self.message_file(folder, uid)?;
        if currently_seen == seen {
            return Ok(());
        }
        let suffix = if seen { SEEN_SUFFIX } else { UNSEEN_SUFFIX };
        let target = source.with_file_name(format!("{uid}{suffix}"));
        fs::rename(source, target).await?;
        Ok(())
    }
}
