//! Validation stages run over a recognized document.
//!
//! Stages run in a fixed order: business rules, XML schema, external
//! validation service. A disabled stage leaves a secondary log entry. An
//! enabled stage reports every diagnostic to the bag and aborts the pipeline
//! as soon as it sees a hard error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ValidationSettings;
use crate::document::InvoiceDocument;
use crate::error::{ConfigError, ValidationError};
use crate::message_bag::Reporter;

/// A validation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    BusinessRules,
    XmlSchema,
    ExternalService,
}

impl ValidationStage {
    /// Execution order.
    pub const ORDER: [Self; 3] = [Self::BusinessRules, Self::XmlSchema, Self::ExternalService];

    pub fn label(&self) -> &'static str {
        match self {
            Self::BusinessRules => "business rules",
            Self::XmlSchema => "XML schema",
            Self::ExternalService => "external validation service",
        }
    }

    pub fn is_enabled(&self, settings: &ValidationSettings) -> bool {
        match self {
            Self::BusinessRules => settings.business_rules,
            Self::XmlSchema => settings.xml_schema,
            Self::ExternalService => settings.external_service,
        }
    }
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Diagnostics returned by a validator.
///
/// Schema and business-rule validators usually only fill `errors`; an
/// external validation service may report all four categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationReport {
    pub infos: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub process_errors: Vec<String>,
}

impl ValidationReport {
    /// Report with only hard errors.
    pub fn with_errors(errors: Vec<String>) -> Self {
        Self {
            errors,
            ..Default::default()
        }
    }

    pub fn has_hard_errors(&self) -> bool {
        !self.errors.is_empty() || !self.process_errors.is_empty()
    }

    fn hard_errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .chain(&self.process_errors)
            .cloned()
            .collect()
    }
}

/// External validator for one stage.
#[async_trait]
pub trait DocumentValidator: Send + Sync {
    fn stage(&self) -> ValidationStage;

    /// Validate `document`. `Err` means the validator could not run at all.
    async fn validate(&self, document: &InvoiceDocument)
    -> Result<ValidationReport, ValidationError>;
}

/// Result of one stage that did not abort the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Skipped,
    Passed,
    PassedWithWarnings(Vec<String>),
}

/// Per-stage outcomes of a passed validation run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    pub stages: Vec<(ValidationStage, StageOutcome)>,
}

impl ValidationSummary {
    pub fn outcome(&self, stage: ValidationStage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, outcome)| outcome)
    }

    pub fn has_warnings(&self) -> bool {
        self.stages
            .iter()
            .any(|(_, outcome)| matches!(outcome, StageOutcome::PassedWithWarnings(_)))
    }
}

/// Ordered, toggle-able validation stages.
pub struct ValidationPipeline {
    settings: ValidationSettings,
    validators: HashMap<ValidationStage, Arc<dyn DocumentValidator>>,
}

impl ValidationPipeline {
    /// Build a pipeline. Every enabled stage needs a validator.
    pub fn new(
        settings: ValidationSettings,
        validators: &[Arc<dyn DocumentValidator>],
    ) -> Result<Self, ConfigError> {
        let validators: HashMap<_, _> = validators
            .iter()
            .map(|v| (v.stage(), Arc::clone(v)))
            .collect();

        if let Some(missing) = ValidationStage::ORDER
            .iter()
            .find(|stage| stage.is_enabled(&settings) && !validators.contains_key(stage))
        {
            return Err(ConfigError::MissingValidator {
                stage: missing.label().to_string(),
            });
        }

        Ok(Self {
            settings,
            validators,
        })
    }

    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    /// Run all stages. Stops at the first stage reporting a hard error.
    pub async fn validate(
        &self,
        document: &InvoiceDocument,
        reporter: &mut Reporter<'_>,
    ) -> Result<ValidationSummary, ValidationError> {
        let mut summary = ValidationSummary::default();

        for stage in ValidationStage::ORDER {
            let validator = match self.validators.get(&stage) {
                Some(validator) if stage.is_enabled(&self.settings) => validator,
                _ => {
                    reporter.log_secondary(format!(
                        "The document was not validated against {stage} (Disabled)"
                    ));
                    summary.stages.push((stage, StageOutcome::Skipped));
                    continue;
                }
            };

            debug!(stage = stage.label(), "Running validation stage");
            let report = validator.validate(document).await?;

            for info in &report.infos {
                reporter.log(info.as_str());
            }
            for warning in &report.warnings {
                reporter.warning(warning.as_str());
            }
            for error in report.errors.iter().chain(&report.process_errors) {
                reporter.error(error.as_str());
            }

            if report.has_hard_errors() {
                warn!(
                    stage = stage.label(),
                    errors = report.errors.len(),
                    process_errors = report.process_errors.len(),
                    "Validation failed"
                );
                return Err(ValidationError::StageFailed {
                    stage: stage.label().to_string(),
                    diagnostics: report.hard_errors(),
                });
            }

            reporter.success(format!("The document was successfully validated against {stage}"));
            let outcome = if report.warnings.is_empty() {
                StageOutcome::Passed
            } else {
                StageOutcome::PassedWithWarnings(report.warnings)
            };
            summary.stages.push((stage, outcome));
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::message_bag::MessageBag;

    struct FixedValidator {
        stage: ValidationStage,
        report: ValidationReport,
        calls: AtomicUsize,
    }

    impl FixedValidator {
        fn new(stage: ValidationStage, report: ValidationReport) -> Arc<Self> {
            Arc::new(Self {
                stage,
                report,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DocumentValidator for FixedValidator {
        fn stage(&self) -> ValidationStage {
            self.stage
        }

        async fn validate(
            &self,
            _document: &InvoiceDocument,
        ) -> Result<ValidationReport, ValidationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.report.clone())
        }
    }

    struct BrokenValidator;

    #[async_trait]
    impl DocumentValidator for BrokenValidator {
        fn stage(&self) -> ValidationStage {
            ValidationStage::ExternalService
        }

        async fn validate(
            &self,
            _document: &InvoiceDocument,
        ) -> Result<ValidationReport, ValidationError> {
            Err(ValidationError::ValidatorUnavailable {
                stage: self.stage().label().into(),
                reason: "connection refused".into(),
            })
        }
    }

    #[tokio::test]
    async fn all_disabled_passes_with_three_notices() {
        let pipeline = ValidationPipeline::new(ValidationSettings::default(), &[]).unwrap();
        let mut bag = MessageBag::new();
        let summary = pipeline
            .validate(&InvoiceDocument::default(), &mut bag.reporter("test"))
            .await
            .unwrap();

        assert_eq!(
            bag.log_secondary_messages(),
            vec![
                "The document was not validated against business rules (Disabled)",
                "The document was not validated against XML schema (Disabled)",
                "The document was not validated against external validation service (Disabled)",
            ]
        );
        assert!(bag.has_no_success_messages());
        assert!(bag.has_no_error_messages());
        assert!(
            summary
                .stages
                .iter()
                .all(|(_, outcome)| *outcome == StageOutcome::Skipped)
        );
    }

    #[tokio::test]
    async fn enabled_stage_without_validator_is_a_config_error() {
        let settings = ValidationSettings {
            xml_schema: true,
            ..Default::default()
        };
        let err = ValidationPipeline::new(settings, &[]).err().unwrap();
        assert!(matches!(
            err,
            ConfigError::MissingValidator { ref stage } if stage == "XML schema"
        ));
    }

    #[tokio::test]
    async fn failing_stage_stops_later_stages() {
        let rules =
            FixedValidator::new(ValidationStage::BusinessRules, ValidationReport::default());
        let schema = FixedValidator::new(
            ValidationStage::XmlSchema,
            ValidationReport::with_errors(vec!["Element 'ram:ID' is missing".into()]),
        );
        let external =
            FixedValidator::new(ValidationStage::ExternalService, ValidationReport::default());
        let validators: Vec<Arc<dyn DocumentValidator>> =
            vec![rules.clone(), schema.clone(), external.clone()];

        let pipeline = ValidationPipeline::new(ValidationSettings::all(), &validators).unwrap();
        let mut bag = MessageBag::new();
        let err = pipeline
            .validate(&InvoiceDocument::default(), &mut bag.reporter("test"))
            .await
            .unwrap_err();

        assert!(matches!(err, ValidationError::StageFailed { ref stage, ref diagnostics }
            if stage == "XML schema" && diagnostics.len() == 1));
        assert_eq!(external.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            bag.success_messages(),
            vec!["The document was successfully validated against business rules"]
        );
        assert_eq!(bag.error_messages(), vec!["Element 'ram:ID' is missing"]);
        let last = bag.all_messages().last().unwrap();
        assert!(!last.message.contains("external"));
    }

    #[tokio::test]
    async fn warnings_do_not_block() {
        let external = FixedValidator::new(
            ValidationStage::ExternalService,
            ValidationReport {
                infos: vec!["Profile EN16931".into()],
                warnings: vec!["BR-DE-21 recommended".into()],
                ..Default::default()
            },
        );
        let settings = ValidationSettings {
            external_service: true,
            ..Default::default()
        };
        let validators: Vec<Arc<dyn DocumentValidator>> = vec![external];
        let pipeline = ValidationPipeline::new(settings, &validators).unwrap();
        let mut bag = MessageBag::new();
        let summary = pipeline
            .validate(&InvoiceDocument::default(), &mut bag.reporter("test"))
            .await
            .unwrap();

        assert!(summary.has_warnings());
        assert_eq!(
            summary.outcome(ValidationStage::ExternalService),
            Some(&StageOutcome::PassedWithWarnings(vec!["BR-DE-21 recommended".into()]))
        );
        assert_eq!(bag.log_messages(), vec!["Profile EN16931"]);
        assert_eq!(bag.warning_messages(), vec!["BR-DE-21 recommended"]);
        assert_eq!(bag.log_secondary_messages().len(), 2);
    }

    #[tokio::test]
    async fn process_errors_are_hard_errors() {
        let external = FixedValidator::new(
            ValidationStage::ExternalService,
            ValidationReport {
                process_errors: vec!["Scenario not found".into()],
                ..Default::default()
            },
        );
        let settings = ValidationSettings {
            external_service: true,
            ..Default::default()
        };
        let validators: Vec<Arc<dyn DocumentValidator>> = vec![external];
        let pipeline = ValidationPipeline::new(settings, &validators).unwrap();
        let mut bag = MessageBag::new();
        let result = pipeline
            .validate(&InvoiceDocument::default(), &mut bag.reporter("test"))
            .await;
        assert!(result.is_err());
        assert_eq!(bag.error_messages(), vec!["Scenario not found"]);
    }

    #[tokio::test]
    async fn unavailable_validator_is_fatal() {
        let settings = ValidationSettings {
            external_service: true,
            ..Default::default()
        };
        let validators: Vec<Arc<dyn DocumentValidator>> = vec![Arc::new(BrokenValidator)];
        let pipeline = ValidationPipeline::new(settings, &validators).unwrap();
        let mut bag = MessageBag::new();
        let err = pipeline
            .validate(&InvoiceDocument::default(), &mut bag.reporter("test"))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::ValidatorUnavailable { .. }));
    }
}
