//! Ordered, typed event log of a reader run.
//!
//! Every pipeline step reports here. The bag is constructed by the caller and
//! passed down by `&mut` reference, so append order always equals call order.
//! It is cleared at the start of each `check_all_accounts` run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HandlerError;

/// Free-form context attached to an entry.
pub type AdditionalData = serde_json::Map<String, Value>;

/// Severity of a bag entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Log,
    LogSecondary,
    Warning,
    Error,
    Success,
}

impl MessageType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::LogSecondary => "log_secondary",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

/// A single recorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBagEntry {
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Name of the component that emitted the entry.
    pub source: String,
    pub message: String,
    #[serde(rename = "additionalData")]
    pub additional_data: AdditionalData,
    #[serde(rename = "datetime")]
    pub timestamp: DateTime<Utc>,
}

/// Append-only event log.
#[derive(Debug, Clone, Default)]
pub struct MessageBag {
    entries: Vec<MessageBagEntry>,
}

impl MessageBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every entry.
    pub fn clear(&mut self) -> &mut Self {
        self.entries.clear();
        self
    }

    /// Append an entry.
    pub fn add(
        &mut self,
        kind: MessageType,
        source: &str,
        message: impl Into<String>,
        additional_data: AdditionalData,
    ) -> &mut Self {
        self.entries.push(MessageBagEntry {
            kind,
            source: source.to_string(),
            message: message.into(),
            additional_data,
            timestamp: Utc::now(),
        });
        self
    }

    pub fn add_log(&mut self, source: &str, message: impl Into<String>) -> &mut Self {
        self.add(MessageType::Log, source, message, AdditionalData::new())
    }

    pub fn add_log_secondary(&mut self, source: &str, message: impl Into<String>) -> &mut Self {
        self.add(MessageType::LogSecondary, source, message, AdditionalData::new())
    }

    pub fn add_warning(&mut self, source: &str, message: impl Into<String>) -> &mut Self {
        self.add(MessageType::Warning, source, message, AdditionalData::new())
    }

    pub fn add_error(&mut self, source: &str, message: impl Into<String>) -> &mut Self {
        self.add(MessageType::Error, source, message, AdditionalData::new())
    }

    pub fn add_success(&mut self, source: &str, message: impl Into<String>) -> &mut Self {
        self.add(MessageType::Success, source, message, AdditionalData::new())
    }

    /// Record a handler/callback failure as an error entry.
    ///
    /// `additional_data` is augmented with `errno`, `errfile`, `errline` and
    /// `errtrace` taken from the failure.
    pub fn add_throwable(
        &mut self,
        error: &HandlerError,
        source: &str,
        mut additional_data: AdditionalData,
    ) -> &mut Self {
        additional_data.insert("errno".into(), Value::from(error.code()));
        additional_data.insert("errfile".into(), Value::from(error.file()));
        additional_data.insert("errline".into(), Value::from(error.line()));
        additional_data.insert("errtrace".into(), Value::from(error.trace()));
        self.add(MessageType::Error, source, error.message(), additional_data)
    }

    /// A sender bound to `source`, for components that emit many entries.
    pub fn reporter<'a>(&'a mut self, source: &'a str) -> Reporter<'a> {
        Reporter {
            bag: self,
            source,
            data: AdditionalData::new(),
        }
    }

    /// Message texts of a given type, in insertion order.
    pub fn messages_of(&self, kind: MessageType) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.message.as_str())
            .collect()
    }

    pub fn log_messages(&self) -> Vec<&str> {
        self.messages_of(MessageType::Log)
    }

    pub fn has_log_messages(&self) -> bool {
        self.has(MessageType::Log)
    }

    pub fn has_no_log_messages(&self) -> bool {
        !self.has_log_messages()
    }

    pub fn log_secondary_messages(&self) -> Vec<&str> {
        self.messages_of(MessageType::LogSecondary)
    }

    pub fn has_log_secondary_messages(&self) -> bool {
        self.has(MessageType::LogSecondary)
    }

    pub fn has_no_log_secondary_messages(&self) -> bool {
        !self.has_log_secondary_messages()
    }

    pub fn warning_messages(&self) -> Vec<&str> {
        self.messages_of(MessageType::Warning)
    }

    pub fn has_warning_messages(&self) -> bool {
        self.has(MessageType::Warning)
    }

    pub fn has_no_warning_messages(&self) -> bool {
        !self.has_warning_messages()
    }

    pub fn error_messages(&self) -> Vec<&str> {
        self.messages_of(MessageType::Error)
    }

    pub fn has_error_messages(&self) -> bool {
        self.has(MessageType::Error)
    }

    pub fn has_no_error_messages(&self) -> bool {
        !self.has_error_messages()
    }

    pub fn success_messages(&self) -> Vec<&str> {
        self.messages_of(MessageType::Success)
    }

    pub fn has_success_messages(&self) -> bool {
        self.has(MessageType::Success)
    }

    pub fn has_no_success_messages(&self) -> bool {
        !self.has_success_messages()
    }

    /// Every entry since the last `clear()`.
    pub fn all_messages(&self) -> &[MessageBagEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty-printed JSON array of all entries, timestamps included.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }

    fn has(&self, kind: MessageType) -> bool {
        self.entries.iter().any(|e| e.kind == kind)
    }
}

impl fmt::Display for MessageBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = self.to_json().map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Source-scoped view on a [`MessageBag`].
///
/// Carries a fixed set of additional data that is attached to every entry it
/// emits (account, folder, message and attachment while an attachment is
/// being processed).
pub struct Reporter<'a> {
    bag: &'a mut MessageBag,
    source: &'a str,
    data: AdditionalData,
}

impl<'a> Reporter<'a> {
    /// Attach `data` to every subsequent entry.
    pub fn with_data(mut self, data: AdditionalData) -> Self {
        self.data = data;
        self
    }

    pub fn log(&mut self, message: impl Into<String>) -> &mut Self {
        self.emit(MessageType::Log, message)
    }

    pub fn log_secondary(&mut self, message: impl Into<String>) -> &mut Self {
        self.emit(MessageType::LogSecondary, message)
    }

    pub fn warning(&mut self, message: impl Into<String>) -> &mut Self {
        self.emit(MessageType::Warning, message)
    }

    pub fn error(&mut self, message: impl Into<String>) -> &mut Self {
        self.emit(MessageType::Error, message)
    }

    pub fn success(&mut self, message: impl Into<String>) -> &mut Self {
        self.emit(MessageType::Success, message)
    }

    pub fn throwable(&mut self, error: &HandlerError) -> &mut Self {
        self.bag.add_throwable(error, self.source, self.data.clone());
        self
    }

    fn emit(&mut self, kind: MessageType, message: impl Into<String>) -> &mut Self {
        self.bag.add(kind, self.source, message, self.data.clone());
        self
    }
}
