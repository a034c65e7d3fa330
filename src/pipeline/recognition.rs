//! Recognition chain: PDF → CII XML → UBL XML.
//!
//! Each attempt is isolated. A failed attempt leaves a warning with the
//! parser's diagnostic and the chain moves on to the next candidate. The
//! order is fixed.

use std::sync::Arc;

use tracing::debug;

use crate::document::{DocumentParser, InvoiceDocument, RecognitionKind};
use crate::message_bag::Reporter;

/// Outcome of running the chain over one attachment.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionResult {
    NotRecognized,
    Recognized {
        document: InvoiceDocument,
        kind: RecognitionKind,
    },
}

impl RecognitionResult {
    pub fn is_recognized(&self) -> bool {
        matches!(self, Self::Recognized { .. })
    }
}

/// Runs the recognition attempts in priority order.
pub struct RecognitionChain {
    parser: Arc<dyn DocumentParser>,
}

impl RecognitionChain {
    pub fn new(parser: Arc<dyn DocumentParser>) -> Self {
        Self { parser }
    }

    /// Try to interpret `bytes` as an invoice.
    pub fn recognize(
        &self,
        bytes: &[u8],
        ubl_support_enabled: bool,
        reporter: &mut Reporter<'_>,
    ) -> RecognitionResult {
        reporter.log("Checking for ZUGFeRD compatible PDF");
        match self.parser.parse_pdf_embedded(bytes) {
            Ok(document) => {
                reporter.success("Mail contains a ZUGFeRD compatible PDF");
                return recognized(document, RecognitionKind::PdfEmbeddedCii);
            }
            Err(e) => {
                reporter.warning(format!("No ZUGFeRD compatible PDF found ({e})"));
            }
        }

        reporter.log("Checking for ZUGFeRD compatible XML");
        match self.parser.parse_xml_cii(bytes) {
            Ok(document) => {
                reporter.success("Mail contains a ZUGFeRD compatible XML");
                return recognized(document, RecognitionKind::XmlCii);
            }
            Err(e) => {
                reporter.warning(format!("No ZUGFeRD compatible XML found ({e})"));
            }
        }

        if !ubl_support_enabled {
            reporter.log_secondary("UBL support disabled");
            debug!("Attachment not recognized, UBL support disabled");
            return RecognitionResult::NotRecognized;
        }

        reporter.log("Checking for UBL compatible XML");
        let converted = self
            .parser
            .convert_ubl_to_cii(bytes)
            .and_then(|cii| self.parser.parse_xml_cii(&cii));
        match converted {
            Ok(document) => {
                reporter.success("Mail contains a UBL compatible XML");
                recognized(document, RecognitionKind::XmlUblConvertedToCii)
            }
            Err(e) => {
                reporter.warning(format!("No UBL compatible XML found ({e})"));
                debug!("Attachment not recognized");
                RecognitionResult::NotRecognized
            }
        }
    }
}

fn recognized(document: InvoiceDocument, kind: RecognitionKind) -> RecognitionResult {
    debug!(kind = kind.label(), "Attachment recognized");
    RecognitionResult::Recognized { document, kind }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::RecognitionError;
    use crate::message_bag::{MessageBag, MessageType};

    /// Parser that accepts fixed byte prefixes and records call order.
    #[derive(Default)]
    struct PrefixParser {
        calls: Mutex<Vec<&'static str>>,
    }

    impl PrefixParser {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn doc(no: &str) -> InvoiceDocument {
            InvoiceDocument {
                document_no: Some(no.into()),
                ..Default::default()
            }
        }
    }

    impl DocumentParser for PrefixParser {
        fn parse_pdf_embedded(&self, bytes: &[u8]) -> Result<InvoiceDocument, RecognitionError> {
            self.calls.lock().unwrap().push("pdf");
            if bytes.starts_with(b"%PDF") {
                Ok(Self::doc("pdf"))
            } else {
                Err(RecognitionError::Parse("not a PDF".into()))
            }
        }

        fn parse_xml_cii(&self, bytes: &[u8]) -> Result<InvoiceDocument, RecognitionError> {
            self.calls.lock().unwrap().push("cii");
            if bytes.starts_with(b"<CII") {
                Ok(Self::doc("cii"))
            } else {
                Err(RecognitionError::Parse("not CII".into()))
            }
        }

        fn convert_ubl_to_cii(&self, bytes: &[u8]) -> Result<Vec<u8>, RecognitionError> {
            self.calls.lock().unwrap().push("ubl");
            if bytes.starts_with(b"<UBL") {
                Ok(b"<CII/>".to_vec())
            } else {
                Err(RecognitionError::Conversion("not UBL".into()))
            }
        }
    }

    fn run(bytes: &[u8], ubl: bool) -> (RecognitionResult, MessageBag, Vec<&'static str>) {
        let parser = Arc::new(PrefixParser::default());
        let chain = RecognitionChain::new(parser.clone());
        let mut bag = MessageBag::new();
        let result = chain.recognize(bytes, ubl, &mut bag.reporter("test"));
        (result, bag, parser.calls())
    }

    #[test]
    fn pdf_wins_first() {
        let (result, bag, calls) = run(b"%PDF-1.7", true);
        assert!(matches!(
            result,
            RecognitionResult::Recognized { kind: RecognitionKind::PdfEmbeddedCii, .. }
        ));
        assert_eq!(calls, vec!["pdf"]);
        assert_eq!(bag.success_messages(), vec!["Mail contains a ZUGFeRD compatible PDF"]);
        assert!(bag.has_no_warning_messages());
    }

    #[test]
    fn cii_after_pdf_failure() {
        let (result, bag, calls) = run(b"<CII/>", true);
        assert!(matches!(
            result,
            RecognitionResult::Recognized { kind: RecognitionKind::XmlCii, .. }
        ));
        assert_eq!(calls, vec!["pdf", "cii"]);
        assert_eq!(bag.warning_messages(), vec!["No ZUGFeRD compatible PDF found (not a PDF)"]);
    }

    #[test]
    fn ubl_is_converted_then_parsed() {
        let (result, bag, calls) = run(b"<UBL/>", true);
        match result {
            RecognitionResult::Recognized { document, kind } => {
                assert_eq!(kind, RecognitionKind::XmlUblConvertedToCii);
                assert_eq!(document.document_no.as_deref(), Some("cii"));
            }
            RecognitionResult::NotRecognized => panic!("expected UBL recognition"),
        }
        assert_eq!(calls, vec!["pdf", "cii", "ubl", "cii"]);
        assert_eq!(bag.success_messages(), vec!["Mail contains a UBL compatible XML"]);
    }

    #[test]
    fn unrecognized_warns_once_per_attempt() {
        let (result, bag, calls) = run(b"hello", true);
        assert_eq!(result, RecognitionResult::NotRecognized);
        assert_eq!(calls, vec!["pdf", "cii", "ubl"]);
        assert_eq!(bag.warning_messages().len(), 3);
        assert_eq!(
            bag.warning_messages()[2],
            "No UBL compatible XML found (UBL to CII conversion failed: not UBL)"
        );
        assert!(bag.has_no_success_messages());
        assert_eq!(
            bag.log_messages(),
            vec![
                "Checking for ZUGFeRD compatible PDF",
                "Checking for ZUGFeRD compatible XML",
                "Checking for UBL compatible XML",
            ]
        );
    }

    #[test]
    fn ubl_disabled_skips_conversion() {
        let (result, bag, calls) = run(b"<UBL/>", false);
        assert_eq!(result, RecognitionResult::NotRecognized);
        assert_eq!(calls, vec!["pdf", "cii"]);
        assert_eq!(bag.warning_messages().len(), 2);
        assert_eq!(bag.log_secondary_messages(), vec!["UBL support disabled"]);
        let last = bag.all_messages().last().unwrap();
        assert_eq!(last.kind, MessageType::LogSecondary);
    }
}
