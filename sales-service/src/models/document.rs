//! Document keys shared by records, ledger entries and cash collections.
//!
//! `DocumentNumber` is the join key between the three entities. `DocumentFields`
//! is the only place that decides which of the three identifier fields a record
//! carries.

use crate::error::SalesError;
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_DOCUMENT_NUMBER_LEN: usize = 64;

/// Validated business identifier (invoice, cash-sale or quotation number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentNumber(String);

impl DocumentNumber {
    pub fn parse(raw: &str) -> Result<Self, SalesError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SalesError::validation("Document number cannot be empty"));
        }
        if trimmed.len() > MAX_DOCUMENT_NUMBER_LEN {
            return Err(SalesError::validation(format!(
                "Document number exceeds {} characters",
                MAX_DOCUMENT_NUMBER_LEN
            )));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(SalesError::validation(
                "Document number contains control characters",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentNumber {
    type Error = SalesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentNumber> for String {
    fn from(value: DocumentNumber) -> Self {
        value.0
    }
}

impl AsRef<str> for DocumentNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentType {
    Invoice,
    CashSale,
    Quotation,
}

/// Resolution order when stored data populates more than one identifier.
pub const TYPE_PRECEDENCE: [DocumentType; 3] = [
    DocumentType::Quotation,
    DocumentType::CashSale,
    DocumentType::Invoice,
];

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::CashSale => "cashSale",
            DocumentType::Quotation => "quotation",
        }
    }

    /// Name of the record field that carries this type's number.
    pub fn field_name(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoiceNumber",
            DocumentType::CashSale => "cashSaleNumber",
            DocumentType::Quotation => "quotationNumber",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = SalesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invoice" => Ok(DocumentType::Invoice),
            "cashsale" | "cash_sale" | "cash-sale" => Ok(DocumentType::CashSale),
            "quotation" => Ok(DocumentType::Quotation),
            other => Err(SalesError::validation(format!(
                "Unknown document type: {}",
                other
            ))),
        }
    }
}

/// A document's type together with its number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub document_type: DocumentType,
    pub number: DocumentNumber,
}

impl DocumentRef {
    pub fn new(document_type: DocumentType, number: DocumentNumber) -> Self {
        Self {
            document_type,
            number,
        }
    }

    /// Number as it belongs in the `invoiceNumber` field, if this is an invoice.
    pub fn invoice_number(&self) -> Option<&str> {
        self.number_for(DocumentType::Invoice)
    }

    pub fn cash_sale_number(&self) -> Option<&str> {
        self.number_for(DocumentType::CashSale)
    }

    pub fn quotation_number(&self) -> Option<&str> {
        self.number_for(DocumentType::Quotation)
    }

    fn number_for(&self, document_type: DocumentType) -> Option<&str> {
        (self.document_type == document_type).then(|| self.number.as_str())
    }
}

/// The three identifier fields exactly as a record (either schema) carries them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentFields<'a> {
    pub invoice_number: Option<&'a str>,
    pub cash_sale_number: Option<&'a str>,
    pub quotation_number: Option<&'a str>,
}

impl<'a> DocumentFields<'a> {
    fn raw(&self, document_type: DocumentType) -> Option<&'a str> {
        match document_type {
            DocumentType::Invoice => self.invoice_number,
            DocumentType::CashSale => self.cash_sale_number,
            DocumentType::Quotation => self.quotation_number,
        }
    }

    /// Populated (non-blank) fields, in precedence order.
    pub fn populated(&self) -> Vec<(DocumentType, &'a str)> {
        TYPE_PRECEDENCE
            .iter()
            .filter_map(|t| {
                self.raw(*t)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| (*t, v))
            })
            .collect()
    }

    /// Intake rule: exactly one identifier must be supplied.
    pub fn require_exactly_one(&self) -> Result<DocumentRef, SalesError> {
        let populated = self.populated();
        match populated.as_slice() {
            [] => Err(SalesError::validation(
                "One of invoiceNumber, cashSaleNumber or quotationNumber is required",
            )),
            [(document_type, number)] => {
                Ok(DocumentRef::new(*document_type, DocumentNumber::parse(number)?))
            }
            many => Err(SalesError::validation(format!(
                "Only one document number may be supplied, got {}",
                many.iter()
                    .map(|(t, _)| t.field_name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Read rule: the highest-precedence valid identifier wins.
    pub fn resolve(&self) -> Option<DocumentRef> {
        self.populated().into_iter().find_map(|(document_type, number)| {
            DocumentNumber::parse(number)
                .ok()
                .map(|n| DocumentRef::new(document_type, n))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields<'a>(
        invoice: Option<&'a str>,
        cash_sale: Option<&'a str>,
        quotation: Option<&'a str>,
    ) -> DocumentFields<'a> {
        DocumentFields {
            invoice_number: invoice,
            cash_sale_number: cash_sale,
            quotation_number: quotation,
        }
    }

    #[test]
    fn test_document_number_is_trimmed() {
        let number = DocumentNumber::parse("  INV-1 ").unwrap();
        assert_eq!(number.as_str(), "INV-1");
    }

    #[test]
    fn test_document_number_rejects_blank() {
        assert!(matches!(
            DocumentNumber::parse("   "),
            Err(SalesError::Validation(_))
        ));
    }

    #[test]
    fn test_exactly_one_accepts_single_field() {
        let doc = fields(None, Some("CS-100"), None)
            .require_exactly_one()
            .unwrap();
        assert_eq!(doc.document_type, DocumentType::CashSale);
        assert_eq!(doc.number.as_str(), "CS-100");
        assert_eq!(doc.cash_sale_number(), Some("CS-100"));
        assert_eq!(doc.invoice_number(), None);
    }

    #[test]
    fn test_exactly_one_rejects_none() {
        let err = fields(None, Some(" "), None)
            .require_exactly_one()
            .unwrap_err();
        assert!(matches!(err, SalesError::Validation(_)));
    }

    #[test]
    fn test_exactly_one_rejects_many() {
        let err = fields(Some("INV-1"), None, Some("Q-1"))
            .require_exactly_one()
            .unwrap_err();
        let SalesError::Validation(msg) = err else {
            panic!("expected validation error");
        };
        assert!(msg.contains("quotationNumber"));
        assert!(msg.contains("invoiceNumber"));
    }

    #[test]
    fn test_resolve_precedence_quotation_first() {
        let doc = fields(Some("INV-1"), Some("CS-1"), Some("Q-1"))
            .resolve()
            .unwrap();
        assert_eq!(doc.document_type, DocumentType::Quotation);
        assert_eq!(doc.number.as_str(), "Q-1");
    }

    #[test]
    fn test_resolve_precedence_cash_sale_over_invoice() {
        let doc = fields(Some("INV-1"), Some("CS-1"), None).resolve().unwrap();
        assert_eq!(doc.document_type, DocumentType::CashSale);
    }

    #[test]
    fn test_resolve_skips_blank_fields() {
        let doc = fields(Some("INV-9"), Some(""), Some("  ")).resolve().unwrap();
        assert_eq!(doc.document_type, DocumentType::Invoice);
        assert_eq!(doc.number.as_str(), "INV-9");
    }

    #[test]
    fn test_resolve_nothing_populated() {
        assert!(fields(None, None, None).resolve().is_none());
    }

    #[test]
    fn test_document_type_from_str_accepts_aliases() {
        assert_eq!("cashSale".parse::<DocumentType>().unwrap(), DocumentType::CashSale);
        assert_eq!("cash_sale".parse::<DocumentType>().unwrap(), DocumentType::CashSale);
        assert_eq!("INVOICE".parse::<DocumentType>().unwrap(), DocumentType::Invoice);
        assert!("receipt".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_document_number_serde_validates() {
        let ok: DocumentNumber = serde_json::from_str("\"Q-7\"").unwrap();
        assert_eq!(ok.as_str(), "Q-7");
        assert!(serde_json::from_str::<DocumentNumber>("\"\"").is_err());
    }
}
