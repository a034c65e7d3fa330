//! Mail account watch configuration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::handlers::{Callback, DocumentHandler};

/// Mail access protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    #[default]
    Imap,
    LegacyImap,
    Pop3,
    Nntp,
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "imap" => Ok(Self::Imap),
            "legacy-imap" => Ok(Self::LegacyImap),
            "pop3" => Ok(Self::Pop3),
            "nntp" => Ok(Self::Nntp),
            other => Err(ConfigError::InvalidConnection {
                field: "protocol",
                message: format!(
                    "The protocol must be one of imap, legacy-imap, pop3 or nntp, {other} given"
                ),
            }),
        }
    }
}

/// Transport encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encryption {
    /// Plain connection.
    #[default]
    None,
    Ssl,
    Tls,
    StartTls,
    NoTls,
}

impl FromStr for Encryption {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "false" | "none" => Ok(Self::None),
            "ssl" => Ok(Self::Ssl),
            "tls" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            "notls" => Ok(Self::NoTls),
            _ => Err(ConfigError::InvalidConnection {
                field: "encryption",
                message: "The encryption must be false or one of ssl, tls, starttls, notls".into(),
            }),
        }
    }
}

/// Authentication method other than plain login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authentication {
    OAuth,
}

impl FromStr for Authentication {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oauth" => Ok(Self::OAuth),
            _ => Err(ConfigError::InvalidConnection {
                field: "authentication",
                message: "The authentication method must be one of null (NUL), oauth".into(),
            }),
        }
    }
}

/// Connection parameters handed to whatever builds the [`Mailbox`](crate::mailbox::Mailbox)
/// for an account. The reader itself never connects anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub encryption: Encryption,
    #[serde(default = "default_validate_cert")]
    pub validate_cert: bool,
    pub username: String,
    #[serde(with = "secret_string")]
    pub password: SecretString,
    #[serde(default)]
    pub authentication: Option<Authentication>,
    /// Connection timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_validate_cert() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

impl ConnectionSettings {
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            protocol: Protocol::default(),
            encryption: Encryption::default(),
            validate_cert: default_validate_cert(),
            username: username.to_string(),
            password: SecretString::from(password),
            authentication: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check the fields that have no type-level guarantee.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let require = |field: &'static str, value: &str, message: &str| {
            if value.trim().is_empty() {
                Err(ConfigError::InvalidConnection {
                    field,
                    message: message.to_string(),
                })
            } else {
                Ok(())
            }
        };
        require("host", &self.host, "The host must not be empty")?;
        require("username", &self.username, "The username must be not empty")?;
        require("password", self.password.expose_secret(), "The password must be not empty")?;
        Ok(())
    }
}

impl PartialEq for ConnectionSettings {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
            && self.port == other.port
            && self.protocol == other.protocol
            && self.encryption == other.encryption
            && self.validate_cert == other.validate_cert
            && self.username == other.username
            && self.password.expose_secret() == other.password.expose_secret()
            && self.authentication == other.authentication
            && self.timeout_secs == other.timeout_secs
    }
}

impl Eq for ConnectionSettings {}

/// Serde adapter storing the password as a plain string.
mod secret_string {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        secret: &SecretString,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(secret.expose_secret())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<SecretString, D::Error> {
        String::deserialize(deserializer).map(SecretString::from)
    }
}

/// A watched mail account: which folders and MIME types to look at and what
/// to do with recognized documents.
pub struct MailAccount {
    identifier: String,
    folders: Vec<String>,
    mime_types: Vec<String>,
    handlers: Vec<Arc<dyn DocumentHandler>>,
    callbacks: Vec<Callback>,
    no_document_handlers: Vec<Arc<dyn DocumentHandler>>,
    no_document_callbacks: Vec<Callback>,
    unseen_only: bool,
    connection: Option<ConnectionSettings>,
}

impl Default for MailAccount {
    fn default() -> Self {
        Self::new()
    }
}

impl MailAccount {
    /// New account with a generated identifier and nothing watched.
    pub fn new() -> Self {
        Self {
            identifier: Uuid::new_v4().to_string(),
            folders: Vec::new(),
            mime_types: Vec::new(),
            handlers: Vec::new(),
            callbacks: Vec::new(),
            no_document_handlers: Vec::new(),
            no_document_callbacks: Vec::new(),
            unseen_only: false,
            connection: None,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Set the identifier. A blank value generates a new one.
    pub fn set_identifier(&mut self, identifier: &str) -> &mut Self {
        self.identifier = if identifier.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            identifier.to_string()
        };
        self
    }

    pub fn folders(&self) -> &[String] {
        &self.folders
    }

    /// Replace the watched folders. Empty entries are dropped.
    pub fn set_folders<I, S>(&mut self, folders: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.folders = non_empty(folders);
        self
    }

    pub fn add_folder(&mut self, folder: &str) -> Result<&mut Self, ConfigError> {
        if folder.is_empty() {
            return Err(ConfigError::EmptyFolder);
        }
        self.folders.push(folder.to_string());
        Ok(self)
    }

    pub fn is_watching_folder(&self, path: &str) -> bool {
        self.folders.iter().any(|f| f == path)
    }

    pub fn mime_types(&self) -> &[String] {
        &self.mime_types
    }

    /// Replace the watched MIME types. Empty entries are dropped.
    pub fn set_mime_types<I, S>(&mut self, mime_types: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mime_types = non_empty(mime_types);
        self
    }

    pub fn add_mime_type(&mut self, mime_type: &str) -> Result<&mut Self, ConfigError> {
        if mime_type.is_empty() {
            return Err(ConfigError::EmptyMimeType);
        }
        self.mime_types.push(mime_type.to_string());
        Ok(self)
    }

    /// MIME types compare case-insensitively.
    pub fn is_watching_mime_type(&self, mime_type: &str) -> bool {
        self.mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(mime_type))
    }

    pub fn handlers(&self) -> &[Arc<dyn DocumentHandler>] {
        &self.handlers
    }

    pub fn set_handlers(&mut self, handlers: Vec<Arc<dyn DocumentHandler>>) -> &mut Self {
        self.handlers = handlers;
        self
    }

    pub fn add_handler(&mut self, handler: Arc<dyn DocumentHandler>) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    pub fn callbacks(&self) -> &[Callback] {
        &self.callbacks
    }

    pub fn set_callbacks(&mut self, callbacks: Vec<Callback>) -> &mut Self {
        self.callbacks = callbacks;
        self
    }

    pub fn add_callback(&mut self, callback: Callback) -> &mut Self {
        self.callbacks.push(callback);
        self
    }

    pub fn no_document_handlers(&self) -> &[Arc<dyn DocumentHandler>] {
        &self.no_document_handlers
    }

    pub fn set_no_document_handlers(
        &mut self,
        handlers: Vec<Arc<dyn DocumentHandler>>,
    ) -> &mut Self {
        self.no_document_handlers = handlers;
        self
    }

    pub fn add_no_document_handler(&mut self, handler: Arc<dyn DocumentHandler>) -> &mut Self {
        self.no_document_handlers.push(handler);
        self
    }

    pub fn no_document_callbacks(&self) -> &[Callback] {
        &self.no_document_callbacks
    }

    pub fn set_no_document_callbacks(&mut self, callbacks: Vec<Callback>) -> &mut Self {
        self.no_document_callbacks = callbacks;
        self
    }

    pub fn add_no_document_callback(&mut self, callback: Callback) -> &mut Self {
        self.no_document_callbacks.push(callback);
        self
    }

    pub fn unseen_only(&self) -> bool {
        self.unseen_only
    }

    pub fn set_unseen_only(&mut self, unseen_only: bool) -> &mut Self {
        self.unseen_only = unseen_only;
        self
    }

    pub fn connection(&self) -> Option<&ConnectionSettings> {
        self.connection.as_ref()
    }

    /// Attach connection settings after validating them.
    pub fn set_connection(
        &mut self,
        connection: ConnectionSettings,
    ) -> Result<&mut Self, ConfigError> {
        connection.validate()?;
        self.connection = Some(connection);
        Ok(self)
    }
}

impl fmt::Debug for MailAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |handlers: &[Arc<dyn DocumentHandler>]| -> Vec<String> {
            handlers.iter().map(|h| h.name().to_string()).collect()
        };
        f.debug_struct("MailAccount")
            .field("identifier", &self.identifier)
            .field("folders", &self.folders)
            .field("mime_types", &self.mime_types)
            .field("handlers", &names(&self.handlers))
            .field("callbacks", &self.callbacks.len())
            .field("no_document_handlers", &names(&self.no_document_handlers))
            .field("no_document_callbacks", &self.no_document_callbacks.len())
            .field("unseen_only", &self.unseen_only)
            .field("connection", &self.connection)
            .finish()
    }
}

fn non_empty<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .map(Into::into)
        .filter(|v: &String| !v.is_empty())
        .collect()
}
