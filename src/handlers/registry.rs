//! Handler registry: stable kind identifiers to constructors.
//!
//! Each constructor deserializes its own typed options struct from the
//! [`HandlerSpec`] options map, so an invalid configuration is rejected
//! while building the account instead of at dispatch time.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{
    CopyMessageHandler, DeleteMessageHandler, DocumentHandler, MarkSeenHandler, MarkUnseenHandler,
    MoveMessageHandler, NoopHandler, SaveToFileHandler,
};
use crate::account::MailAccount;
use crate::config::{AccountConfig, HandlerSpec};
use crate::error::ConfigError;

/// Builds a handler from its options.
pub type HandlerConstructor =
    Arc<dyn Fn(&Map<String, Value>) -> Result<Arc<dyn DocumentHandler>, ConfigError> + Send + Sync>;

/// Kinds that custom registrations cannot replace.
const BUILTIN_KINDS: &[&str] = &[
    "save_to_file",
    "move_message",
    "copy_message",
    "delete_message",
    "mark_seen",
    "mark_unseen",
    "noop",
];

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SaveToFileOptions {
    path: String,
    #[serde(default)]
    filename: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FolderOptions {
    folder: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoOptions {}

fn parse_options<T: DeserializeOwned>(
    kind: &str,
    options: &Map<String, Value>,
) -> Result<T, ConfigError> {
    serde_json::from_value(Value::Object(options.clone())).map_err(|e| {
        ConfigError::InvalidHandlerOptions {
            kind: kind.to_string(),
            message: e.to_string(),
        }
    })
}

/// Registry of handler constructors.
pub struct HandlerRegistry {
    constructors: HashMap<String, HandlerConstructor>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl HandlerRegistry {
    /// Registry without any kinds.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with every built-in kind.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.insert("save_to_file", |options| {
            let opts: SaveToFileOptions = parse_options("save_to_file", options)?;
            Ok(Arc::new(SaveToFileHandler::new(&opts.path, &opts.filename)?))
        });
        registry.insert("move_message", |options| {
            let opts: FolderOptions = parse_options("move_message", options)?;
            Ok(Arc::new(MoveMessageHandler::new(&opts.folder)?))
        });
        registry.insert("copy_message", |options| {
            let opts: FolderOptions = parse_options("copy_message", options)?;
            Ok(Arc::new(CopyMessageHandler::new(&opts.folder)?))
        });
        registry.insert("delete_message", |options| {
            parse_options::<NoOptions>("delete_message", options)?;
            Ok(Arc::new(DeleteMessageHandler))
        });
        registry.insert("mark_seen", |options| {
            parse_options::<NoOptions>("mark_seen", options)?;
            Ok(Arc::new(MarkSeenHandler))
        });
        registry.insert("mark_unseen", |options| {
            parse_options::<NoOptions>("mark_unseen", options)?;
            Ok(Arc::new(MarkUnseenHandler))
        });
        registry.insert("noop", |options| {
            parse_options::<NoOptions>("noop", options)?;
            Ok(Arc::new(NoopHandler::new()))
        });
        registry
    }

    fn insert<F>(&mut self, kind: &str, constructor: F)
    where
        F: Fn(&Map<String, Value>) -> Result<Arc<dyn DocumentHandler>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(kind.to_string(), Arc::new(constructor));
    }

    /// Register a custom kind. Built-in kinds cannot be replaced.
    pub fn register<F>(&mut self, kind: &str, constructor: F)
    where
        F: Fn(&Map<String, Value>) -> Result<Arc<dyn DocumentHandler>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        if BUILTIN_KINDS.contains(&kind) {
            tracing::warn!(kind, "Rejected handler registration: would shadow a built-in kind");
            return;
        }
        self.insert(kind, constructor);
        tracing::debug!("Registered handler kind: {}", kind);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn build(&self, spec: &HandlerSpec) -> Result<Arc<dyn DocumentHandler>, ConfigError> {
        let constructor = self
            .constructors
            .get(&spec.kind)
            .ok_or_else(|| ConfigError::UnknownHandler(spec.kind.clone()))?;
        constructor(&spec.options)
    }

    pub fn build_all(
        &self,
        specs: &[HandlerSpec],
    ) -> Result<Vec<Arc<dyn DocumentHandler>>, ConfigError> {
        specs.iter().map(|spec| self.build(spec)).collect()
    }

    /// Build a [`MailAccount`] from its persisted configuration.
    pub fn build_account(&self, config: &AccountConfig) -> Result<MailAccount, ConfigError> {
        let mut account = MailAccount::new();
        account
            .set_identifier(&config.identifier)
            .set_folders(config.folders.iter().cloned())
            .set_mime_types(config.mime_types.iter().cloned())
            .set_unseen_only(config.unseen_only)
            .set_handlers(self.build_all(&config.handlers)?)
            .set_no_document_handlers(self.build_all(&config.no_document_handlers)?);
        if let Some(connection) = &config.connection {
            account.set_connection(connection.clone())?;
        }
        Ok(account)
    }
}
