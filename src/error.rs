//! Error types for the invoice mail reader.

use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Configuration-related errors. Surfaced to the caller, never logged to the bag.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Mimetype must not be empty")]
    EmptyMimeType,

    #[error("Path must not be empty")]
    EmptyFolder,

    #[error("The destination folder must not be empty")]
    EmptyDestinationFolder,

    #[error("The file path must not be empty")]
    EmptyFilePath,

    #[error("The file path {0} does not exist")]
    DirectoryNotFound(String),

    #[error("Unknown handler kind: {0}")]
    UnknownHandler(String),

    #[error("Invalid options for handler {kind}: {message}")]
    InvalidHandlerOptions { kind: String, message: String },

    #[error("{stage} validation is enabled but no validator is registered for it")]
    MissingValidator { stage: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid connection setting {field}: {message}")]
    InvalidConnection {
        field: &'static str,
        message: String,
    },
}

/// Errors raised by a mailbox facility.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Message {uid} not found in folder {folder}")]
    MessageNotFound { folder: String, uid: String },

    #[error("Failed to parse message {0}")]
    UnparsableMessage(String),

    #[error("Mailbox operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single recognition attempt failed. Never fatal on its own.
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("{0}")]
    Parse(String),

    #[error("UBL to CII conversion failed: {0}")]
    Conversion(String),
}

/// Fatal for the attachment being processed: remaining stages and dispatch are skipped.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Validation against {stage} failed")]
    StageFailed {
        stage: String,
        diagnostics: Vec<String>,
    },

    #[error("Validation against {stage} could not be performed: {reason}")]
    ValidatorUnavailable { stage: String, reason: String },
}

/// Failure raised by a handler or callback.
///
/// Records where it was raised (or converted with `?`), a numeric code and a
/// backtrace so the dispatch engine can report it with full context. Any
/// `std::error::Error` converts into it, which is why it does not implement
/// `std::error::Error` itself.
pub struct HandlerError {
    source: anyhow::Error,
    code: i32,
    location: &'static Location<'static>,
    backtrace: Backtrace,
}

impl HandlerError {
    /// Create an error from a plain message.
    #[track_caller]
    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::from_anyhow(anyhow::Error::msg(message))
    }

    #[track_caller]
    fn from_anyhow(source: anyhow::Error) -> Self {
        let code = source
            .downcast_ref::<std::io::Error>()
            .and_then(std::io::Error::raw_os_error)
            .unwrap_or(0);
        Self {
            source,
            code,
            location: Location::caller(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Override the numeric error code.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    pub fn message(&self) -> String {
        self.source.to_string()
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    pub fn line(&self) -> u32 {
        self.location.line()
    }

    /// Formatted backtrace. Empty-ish unless `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE` is set.
    pub fn trace(&self) -> String {
        self.backtrace.to_string()
    }

    /// The wrapped error.
    pub fn source(&self) -> &anyhow::Error {
        &self.source
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[track_caller]
    fn from(error: E) -> Self {
        Self::from_anyhow(anyhow::Error::new(error))
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("message", &self.source.to_string())
            .field("code", &self.code)
            .field("file", &self.location.file())
            .field("line", &self.location.line())
            .finish()
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_io() -> std::result::Result<(), HandlerError> {
        let err = std::io::Error::from_raw_os_error(2);
        Err::<(), _>(err)?;
        Ok(())
    }

    #[test]
    fn handler_error_captures_location() {
        let line = line!() + 1;
        let err = HandlerError::msg("boom");
        assert_eq!(err.message(), "boom");
        assert_eq!(err.line(), line);
        assert!(err.file().ends_with("error.rs"));
        assert_eq!(err.code(), 0);
    }

    #[test]
    fn handler_error_from_io_error_keeps_os_code() {
        let err = failing_io().unwrap_err();
        assert_eq!(err.code(), 2);
        assert!(err.file().ends_with("error.rs"));
    }

    #[test]
    fn handler_error_code_override() {
        let err = HandlerError::msg("boom").with_code(42);
        assert_eq!(err.code(), 42);
    }

    #[test]
    fn config_error_messages() {
        assert_eq!(ConfigError::EmptyMimeType.to_string(), "Mimetype must not be empty");
        assert_eq!(
            ConfigError::DirectoryNotFound("/nope/".into()).to_string(),
            "The file path /nope/ does not exist"
        );
    }

    #[test]
    fn validation_error_message_names_stage() {
        let err = ValidationError::StageFailed {
            stage: "XML schema".into(),
            diagnostics: vec![],
        };
        assert_eq!(err.to_string(), "Validation against XML schema failed");
    }
}
