//! Configuration types.

use serde::{Deserialize, Serialize};

use crate::account::ConnectionSettings;
use crate::error::ConfigError;

const ENV_UBL_SUPPORT: &str = "ZUGFERD_MAIL_UBL_SUPPORT";
const ENV_VALIDATE_BUSINESS_RULES: &str = "ZUGFERD_MAIL_VALIDATE_BUSINESS_RULES";
const ENV_VALIDATE_SCHEMA: &str = "ZUGFERD_MAIL_VALIDATE_SCHEMA";
const ENV_VALIDATE_EXTERNAL: &str = "ZUGFERD_MAIL_VALIDATE_EXTERNAL";

/// Reader configuration shared by all accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Try UBL → CII conversion when an attachment is neither PDF nor CII.
    pub ubl_support_enabled: bool,
    pub validation: ValidationSettings,
}

/// Independently toggled validation stages. All off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub business_rules: bool,
    pub xml_schema: bool,
    pub external_service: bool,
}

impl ValidationSettings {
    /// Every stage enabled.
    pub fn all() -> Self {
        Self {
            business_rules: true,
            xml_schema: true,
            external_service: true,
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.business_rules || self.xml_schema || self.external_service
    }
}

impl ReaderConfig {
    /// Load from environment variables, falling back to defaults for unset ones.
    ///
    /// - `ZUGFERD_MAIL_UBL_SUPPORT`
    /// - `ZUGFERD_MAIL_VALIDATE_BUSINESS_RULES`
    /// - `ZUGFERD_MAIL_VALIDATE_SCHEMA`
    /// - `ZUGFERD_MAIL_VALIDATE_EXTERNAL`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| -> Result<bool, ConfigError> {
            match lookup(key) {
                Some(raw) => parse_bool(key, &raw),
                None => Ok(default),
            }
        };

        Ok(Self {
            ubl_support_enabled: flag(ENV_UBL_SUPPORT, defaults.ubl_support_enabled)?,
            validation: ValidationSettings {
                business_rules: flag(
                    ENV_VALIDATE_BUSINESS_RULES,
                    defaults.validation.business_rules,
                )?,
                xml_schema: flag(ENV_VALIDATE_SCHEMA, defaults.validation.xml_schema)?,
                external_service: flag(
                    ENV_VALIDATE_EXTERNAL,
                    defaults.validation.external_service,
                )?,
            },
        })
    }

    pub fn with_ubl_support(mut self, enabled: bool) -> Self {
        self.ubl_support_enabled = enabled;
        self
    }

    pub fn with_validation(mut self, validation: ValidationSettings) -> Self {
        self.validation = validation;
        self
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

/// Declarative handler entry: `{"kind": "<id>", ...options}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerSpec {
    pub kind: String,
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl HandlerSpec {
    /// Handler without options.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            options: serde_json::Map::new(),
        }
    }

    pub fn with_option(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Persistable account watch configuration.
///
/// Turned into a [`MailAccount`](crate::account::MailAccount) by
/// [`HandlerRegistry::build_account`](crate::handlers::registry::HandlerRegistry::build_account).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Generated when empty.
    pub identifier: String,
    pub folders: Vec<String>,
    pub mime_types: Vec<String>,
    pub unseen_only: bool,
    pub handlers: Vec<HandlerSpec>,
    pub no_document_handlers: Vec<HandlerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionSettings>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_disable_everything() {
        let config = ReaderConfig::default();
        assert!(!config.ubl_support_enabled);
        assert!(!config.validation.any_enabled());
    }

    #[test]
    fn unset_variables_keep_defaults() {
        let config = ReaderConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ReaderConfig::default());
    }

    #[test]
    fn variables_toggle_flags() {
        let config = ReaderConfig::from_lookup(lookup(&[
            (ENV_UBL_SUPPORT, "yes"),
            (ENV_VALIDATE_SCHEMA, "1"),
            (ENV_VALIDATE_EXTERNAL, "OFF"),
        ]))
        .unwrap();
        assert!(config.ubl_support_enabled);
        assert!(config.validation.xml_schema);
        assert!(!config.validation.business_rules);
        assert!(!config.validation.external_service);
    }

    #[test]
    fn invalid_boolean_is_rejected() {
        let err = ReaderConfig::from_lookup(lookup(&[(ENV_VALIDATE_BUSINESS_RULES, "maybe")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == ENV_VALIDATE_BUSINESS_RULES
        ));
    }

    #[test]
    fn handler_spec_flattens_options() {
        let spec: HandlerSpec =
            serde_json::from_str(r#"{"kind":"move_message","folder":"Archive/{documentno}"}"#)
                .unwrap();
        assert_eq!(spec.kind, "move_message");
        assert_eq!(spec.options["folder"], "Archive/{documentno}");

        let built = HandlerSpec::new("save_to_file").with_option("path", "/tmp");
        let json = serde_json::to_value(&built).unwrap();
        assert_eq!(json["kind"], "save_to_file");
        assert_eq!(json["path"], "/tmp");
    }

    #[test]
    fn account_config_deserializes_with_defaults() {
        let account: AccountConfig = serde_json::from_str(
            r#"{
                "folders": ["INBOX"],
                "mime_types": ["application/pdf"],
                "handlers": [{"kind": "noop"}]
            }"#,
        )
        .unwrap();
        assert!(account.identifier.is_empty());
        assert!(!account.unseen_only);
        assert_eq!(account.handlers.len(), 1);
        assert!(account.no_document_handlers.is_empty());
    }
}
