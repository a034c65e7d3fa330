//! Attachment processing pipeline.
//!
//! Every watched attachment flows through:
//! 1. [`RecognitionChain::recognize`]: PDF with embedded CII, then CII XML,
//!    then (optionally) UBL converted to CII
//! 2. [`ValidationPipeline::validate`]: the enabled validation stages in order
//! 3. [`DispatchEngine::dispatch`]: the account's handlers and callbacks
//!
//! [`MailReader`] drives the three steps for every account.

pub mod dispatch;
pub mod reader;
pub mod recognition;
pub mod validation;

pub use dispatch::{DispatchContext, DispatchEngine, DispatchReport};
pub use reader::{AccountFolders, MailReader, RunSummary};
pub use recognition::{RecognitionChain, RecognitionResult};
pub use validation::{
    DocumentValidator, StageOutcome, ValidationPipeline, ValidationReport, ValidationStage,
    ValidationSummary,
};
