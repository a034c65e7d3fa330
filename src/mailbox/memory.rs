//! In-memory mailbox.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{MailFolder, MailMessage, Mailbox};
use crate::error::MailboxError;

/// Mailbox held entirely in memory.
///
/// Folders are created on demand by [`with_folder`](Self::with_folder) and
/// [`with_message`](Self::with_message), including all parent folders.
#[derive(Debug, Default)]
pub struct InMemoryMailbox {
    folders: Mutex<BTreeMap<String, Vec<MailMessage>>>,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(mut self, path: &str) -> Self {
        ensure_folder(self.folders.get_mut(), path);
        self
    }

    pub fn with_message(mut self, folder: &str, message: MailMessage) -> Self {
        let folders = self.folders.get_mut();
        ensure_folder(folders, folder);
        if let Some(messages) = folders.get_mut(folder) {
            messages.push(message);
        }
        self
    }

    /// Snapshot of the messages currently in `folder`.
    pub async fn messages(&self, folder: &str) -> Vec<MailMessage> {
        self.folders
            .lock()
            .await
            .get(folder)
            .cloned()
            .unwrap_or_default()
    }
}

fn ensure_folder(folders: &mut BTreeMap<String, Vec<MailMessage>>, path: &str) {
    let mut prefix = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(segment);
        folders.entry(prefix.clone()).or_default();
    }
}

fn build_tree(paths: &[&String], parent: Option<&str>) -> Vec<MailFolder> {
    paths
        .iter()
        .filter(|path| path.rsplit_once('/').map(|(p, _)| p) == parent)
        .map(|path| {
            let mut folder = MailFolder::new(path.as_str());
            folder.children = build_tree(paths, Some(path.as_str()));
            folder
        })
        .collect()
}

/// Destination must exist and must not hold `uid` already.
fn check_destination(
    folders: &BTreeMap<String, Vec<MailMessage>>,
    destination: &str,
    uid: &str,
) -> Result<(), MailboxError> {
    let target = folders
        .get(destination)
        .ok_or_else(|| MailboxError::FolderNotFound(destination.to_string()))?;
    if target.iter().any(|m| m.uid == uid) {
        return Err(MailboxError::OperationFailed(format!(
            "message {uid} already exists in folder {destination}"
        )));
    }
    Ok(())
}

fn take_message(
    folders: &mut BTreeMap<String, Vec<MailMessage>>,
    folder: &str,
    uid: &str,
) -> Result<MailMessage, MailboxError> {
    let messages = folders
        .get_mut(folder)
        .ok_or_else(|| MailboxError::FolderNotFound(folder.to_string()))?;
    let index = messages
        .iter()
        .position(|m| m.uid == uid)
        .ok_or_else(|| MailboxError::MessageNotFound {
            folder: folder.to_string(),
            uid: uid.to_string(),
        })?;
    Ok(messages.remove(index))
}

fn find_message<'a>(
    folders: &'a mut BTreeMap<String, Vec<MailMessage>>,
    folder: &str,
    uid: &str,
) -> Result<&'a mut MailMessage, MailboxError> {
    folders
        .get_mut(folder)
        .ok_or_else(|| MailboxError::FolderNotFound(folder.to_string()))?
        .iter_mut()
        .find(|m| m.uid == uid)
        .ok_or_else(|| MailboxError::MessageNotFound {
            folder: folder.to_string(),
            uid: uid.to_string(),
        })
}

#[async_trait]
impl Mailbox for InMemoryMailbox {
    async fn list_folders(&self) -> Result<Vec<MailFolder>, MailboxError> {
        let folders = self.folders.lock().await;
        let paths: Vec<&String> = folders.keys().collect();
        Ok(build_tree(&paths, None))
    }

    async fn list_messages(
        &self,
        folder: &str,
        unseen_only: bool,
    ) -> Result<Vec<MailMessage>, MailboxError> {
        let folders = self.folders.lock().await;
        let messages = folders
            .get(folder)
            .ok_or_else(|| MailboxError::FolderNotFound(folder.to_string()))?;
        Ok(messages
            .iter()
            .filter(|m| !unseen_only || !m.seen)
            .cloned()
            .collect())
    }

    async fn move_message(
        &self,
        folder: &str,
        uid: &str,
        destination: &str,
    ) -> Result<(), MailboxError> {
        let mut folders = self.folders.lock().await;
        check_destination(&folders, destination, uid)?;
        let message = take_message(&mut folders, folder, uid)?;
        if let Some(target) = folders.get_mut(destination) {
            target.push(message);
        }
        Ok(())
    }

    async fn copy_message(
        &self,
        folder: &str,
        uid: &str,
        destination: &str,
    ) -> Result<(), MailboxError> {
        let mut folders = self.folders.lock().await;
        check_destination(&folders, destination, uid)?;
        let copy = find_message(&mut folders, folder, uid)?.clone();
        if let Some(target) = folders.get_mut(destination) {
            target.push(copy);
        }
        Ok(())
    }

    async fn delete_message(&self, folder: &str, uid: &str) -> Result<(), MailboxError> {
        let mut folders = self.folders.lock().await;
        take_message(&mut folders, folder, uid).map(|_| ())
    }

    async fn set_seen(&self, folder: &str, uid: &str, seen: bool) -> Result<(), MailboxError> {
        let mut folders = self.folders.lock().await;
        find_message(&mut folders, folder, uid)?.seen = seen;
        Ok(())
    }
}
