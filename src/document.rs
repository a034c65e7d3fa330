//! Invoice document model and the parser seam.
//!
//! Parsing PDF/XML into a structured invoice is done by an external parser.
//! The reader only consumes the metadata listed here.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::RecognitionError;

/// How an attachment was recognized as an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionKind {
    /// PDF carrying an embedded ZUGFeRD/Factur-X XML.
    PdfEmbeddedCii,
    /// Plain CII XML.
    XmlCii,
    /// UBL XML converted to CII before parsing.
    XmlUblConvertedToCii,
}

impl RecognitionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PdfEmbeddedCii => "pdf_embedded_cii",
            Self::XmlCii => "xml_cii",
            Self::XmlUblConvertedToCii => "xml_ubl_converted_to_cii",
        }
    }
}

impl fmt::Display for RecognitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Seller party of an invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SellerParty {
    pub name: Option<String>,
    /// Seller-assigned identifiers, in document order.
    #[serde(default)]
    pub ids: Vec<String>,
    /// Global identifiers keyed by scheme (e.g. `0088` for GLN).
    #[serde(default)]
    pub global_ids: BTreeMap<String, String>,
    pub description: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub address_line_3: Option<String>,
    pub postcode: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    /// Country subdivisions, in document order.
    #[serde(default)]
    pub subdivisions: Vec<String>,
}

/// Read-only view of a parsed invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDocument {
    pub document_no: Option<String>,
    pub type_code: Option<String>,
    pub date: Option<NaiveDate>,
    pub name: Option<String>,
    pub language: Option<String>,
    pub invoice_currency: Option<String>,
    pub tax_currency: Option<String>,
    pub specified_period: Option<NaiveDate>,
    #[serde(default)]
    pub seller: SellerParty,
    /// Raw CII XML the document was parsed from. Handed to validators.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xml: Vec<u8>,
}

/// Parses attachment bytes into an [`InvoiceDocument`].
///
/// Implementations wrap a real ZUGFeRD/Factur-X library. Each call either
/// yields a document or a diagnostic describing why the bytes did not match.
pub trait DocumentParser: Send + Sync {
    /// Extract and parse the invoice XML embedded in a PDF.
    fn parse_pdf_embedded(&self, bytes: &[u8]) -> Result<InvoiceDocument, RecognitionError>;

    /// Parse bytes as a CII invoice.
    fn parse_xml_cii(&self, bytes: &[u8]) -> Result<InvoiceDocument, RecognitionError>;

    /// Convert UBL XML to CII XML.
    fn convert_ubl_to_cii(&self, bytes: &[u8]) -> Result<Vec<u8>, RecognitionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognition_kind_serializes_as_label() {
        let json = serde_json::to_string(&RecognitionKind::XmlUblConvertedToCii).unwrap();
        assert_eq!(json, "\"xml_ubl_converted_to_cii\"");
        assert_eq!(RecognitionKind::PdfEmbeddedCii.to_string(), "pdf_embedded_cii");
    }

    #[test]
    fn document_deserializes_with_missing_fields() {
        let doc: InvoiceDocument = serde_json::from_str(
            r#"{"document_no":"471102","date":"2024-11-15","seller":{"name":"Lieferant GmbH"}}"#,
        )
        .unwrap();
        assert_eq!(doc.document_no.as_deref(), Some("471102"));
        assert_eq!(doc.date, NaiveDate::from_ymd_opt(2024, 11, 15));
        assert_eq!(doc.seller.name.as_deref(), Some("Lieferant GmbH"));
        assert!(doc.seller.ids.is_empty());
        assert!(doc.xml.is_empty());
    }
}
