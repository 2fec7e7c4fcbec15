//! Expenditure transactions and compliance scoring.
//!
//! An expenditure enters pending_validation with a documentary compliance
//! score in [0, 100]. An auditor validation transitions it to validated or
//! rejected; only validated expenditures ever reach a chain.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::crypto::{random_hex, sha256_hex, unix_nanos};
use crate::error::{Error, Result};

static GSTIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z]{1}[1-9A-Z]{1}Z[0-9A-Z]{1}$").expect("valid pattern")
});

/// GSTIN format check: state code, PAN, entity code, check digit, the
/// default 'Z', final check character. Format only; no registry lookup.
pub fn verify_gstin(gstin: &str) -> bool {
    !gstin.is_empty() && GSTIN.is_match(gstin)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDetails {
    pub invoice_number: String,
    pub gstin: String,
    pub vendor_name: String,
    pub vendor_gstin: String,
    pub invoice_date: DateTime<Utc>,
    pub documents: Vec<String>,
    pub bank_transaction_id: String,
    pub cheque_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub hash: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Validation record an auditor attaches to an expenditure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditorValidation {
    pub auditor_id: String,
    pub is_valid: bool,
    pub remarks: String,
    pub audit_score: f64,
    pub timestamp: DateTime<Utc>,
    pub signature: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenditureStatus {
    PendingValidation,
    Validated,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenditureTransaction {
    pub transaction_id: String,
    pub ngo_id: String,
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub invoice_details: InvoiceDetails,
    pub attachments: Vec<Attachment>,
    pub status: ExpenditureStatus,
    pub auditor_validation: Option<AuditorValidation>,
    pub compliance_score: f64,
}

impl ExpenditureTransaction {
    pub fn new(
        ngo_id: &str,
        amount: f64,
        category: &str,
        description: &str,
        invoice_details: InvoiceDetails,
        attachments: Vec<Attachment>,
    ) -> Result<Self> {
        if amount <= 0.0 {
            return Err(Error::InvalidAmount(amount));
        }

        let mut tx = Self {
            transaction_id: random_hex(16),
            ngo_id: ngo_id.to_owned(),
            amount,
            category: category.to_owned(),
            description: description.to_owned(),
            timestamp: Utc::now(),
            invoice_details,
            attachments,
            status: ExpenditureStatus::PendingValidation,
            auditor_validation: None,
            compliance_score: 0.0,
        };
        tx.compliance_score = tx.compute_compliance_score();
        Ok(tx)
    }

    /// Weighted documentary completeness, capped at 100. Each clause
    /// contributes its full weight iff its predicate holds.
    fn compute_compliance_score(&self) -> f64 {
        let mut score: f64 = 0.0;
        let invoice = &self.invoice_details;

        if !invoice.invoice_number.is_empty() {
            score += 20.0;
        }
        if verify_gstin(&invoice.gstin) {
            score += 20.0;
        }
        if !invoice.vendor_name.is_empty() && !invoice.vendor_gstin.is_empty() {
            score += 15.0;
        }
        if !invoice.bank_transaction_id.is_empty() || !invoice.cheque_number.is_empty() {
            score += 15.0;
        }
        if !invoice.documents.is_empty() {
            score += 15.0;
        }
        if !self.attachments.is_empty() {
            score += 10.0;
        }
        if self.invoice_age_days() <= 90 {
            score += 5.0;
        }

        score.min(100.0)
    }

    fn invoice_age_days(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.invoice_details.invoice_date)
            .num_seconds()
            / 86_400
    }

    /// Attach the auditor's verdict. Monotone: a transaction that already
    /// left pending_validation cannot be re-validated.
    pub fn validate_by_auditor(
        &mut self,
        auditor_id: &str,
        is_valid: bool,
        remarks: &str,
        audit_score: Option<f64>,
    ) -> Result<AuditorValidation> {
        if self.status != ExpenditureStatus::PendingValidation {
            return Err(Error::TransactionFinalized(self.transaction_id.clone()));
        }

        let signature = sha256_hex(
            format!(
                "{}{}{}{}",
                auditor_id,
                self.transaction_id,
                is_valid,
                unix_nanos(Utc::now())
            )
            .as_bytes(),
        );
        let validation = AuditorValidation {
            auditor_id: auditor_id.to_owned(),
            is_valid,
            remarks: remarks.to_owned(),
            audit_score: audit_score.unwrap_or(self.compliance_score),
            timestamp: Utc::now(),
            signature,
        };

        self.auditor_validation = Some(validation.clone());
        self.status = if is_valid {
            ExpenditureStatus::Validated
        } else {
            ExpenditureStatus::Rejected
        };
        Ok(validation)
    }

    pub fn add_attachment(&mut self, filename: &str, hash: &str, kind: &str) {
        self.attachments.push(Attachment {
            filename: filename.to_owned(),
            hash: hash.to_owned(),
            kind: kind.to_owned(),
            uploaded_at: Utc::now(),
        });
        self.compliance_score = self.compute_compliance_score();
    }

    pub fn verify_invoice_uniqueness(&self, existing_invoices: &[String]) -> bool {
        !existing_invoices
            .iter()
            .any(|existing| existing == &self.invoice_details.invoice_number)
    }

    /// Human-readable gaps in the documentation, one entry per failed
    /// compliance clause.
    pub fn compliance_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let invoice = &self.invoice_details;

        if invoice.invoice_number.is_empty() {
            issues.push("Missing invoice number".to_string());
        }
        if !verify_gstin(&invoice.gstin) {
            issues.push("Invalid GSTIN format".to_string());
        }
        if invoice.vendor_name.is_empty() {
            issues.push("Missing vendor name".to_string());
        }
        if invoice.vendor_gstin.is_empty() {
            issues.push("Missing vendor GSTIN".to_string());
        }
        if invoice.bank_transaction_id.is_empty() && invoice.cheque_number.is_empty() {
            issues.push("Missing payment proof (bank transaction ID or cheque number)".to_string());
        }
        if invoice.documents.is_empty() {
            issues.push("No supporting documents provided".to_string());
        }
        if self.attachments.is_empty() {
            issues.push("No file attachments provided".to_string());
        }
        let age = self.invoice_age_days();
        if age > 90 {
            issues.push(format!(
                "Invoice is too old ({age} days, threshold: 90 days)"
            ));
        }

        issues
    }

    pub fn is_validated(&self) -> bool {
        self.status == ExpenditureStatus::Validated
    }

    pub fn is_rejected(&self) -> bool {
        self.status == ExpenditureStatus::Rejected
    }

    pub fn is_pending_validation(&self) -> bool {
        self.status == ExpenditureStatus::PendingValidation
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn full_invoice() -> InvoiceDetails {
        InvoiceDetails {
            invoice_number: "INV-2024-001".to_string(),
            gstin: "27ABCDE1234F1Z5".to_string(),
            vendor_name: "Shakti Supplies".to_string(),
            vendor_gstin: "29FGHIJ5678K2Z3".to_string(),
            invoice_date: Utc::now(),
            documents: vec!["invoice.pdf".to_string()],
            bank_transaction_id: "TXN12345".to_string(),
            cheque_number: String::new(),
        }
    }

    fn empty_invoice() -> InvoiceDetails {
        InvoiceDetails {
            invoice_number: String::new(),
            gstin: String::new(),
            vendor_name: String::new(),
            vendor_gstin: String::new(),
            invoice_date: Utc::now() - chrono::Duration::days(120),
            documents: Vec::new(),
            bank_transaction_id: String::new(),
            cheque_number: String::new(),
        }
    }

    fn attachment() -> Attachment {
        Attachment {
            filename: "receipt.jpg".to_string(),
            hash: "ab".repeat(32),
            kind: "image/jpeg".to_string(),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn gstin_vectors() {
        assert!(verify_gstin("27ABCDE1234F1Z5"));
        assert!(!verify_gstin("27abcde1234f1z5")); // lowercase
        assert!(!verify_gstin("27ABCDE1234F1ZZ")); // 'Z' must sit at position 14
        assert!(!verify_gstin("27ABCDE1234F10Z5")); // wrong length
        assert!(!verify_gstin(""));
    }

    #[test]
    fn all_predicates_true_scores_exactly_100() {
        let tx = ExpenditureTransaction::new(
            "NGO001",
            40_000.0,
            "Education",
            "School supplies",
            full_invoice(),
            vec![attachment()],
        )
        .unwrap();
        assert_eq!(tx.compliance_score, 100.0);
        assert!(tx.compliance_issues().is_empty());
    }

    #[test]
    fn no_predicates_true_scores_zero() {
        let tx = ExpenditureTransaction::new(
            "NGO001",
            40_000.0,
            "Education",
            "Undocumented",
            empty_invoice(),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(tx.compliance_score, 0.0);
        assert_eq!(tx.compliance_issues().len(), 8);
    }

    #[test]
    fn partial_invoice_scores_the_seed_value() {
        // Valid GSTIN + invoice number + recent date, nothing else: 20+20+5.
        let invoice = InvoiceDetails {
            invoice_number: "INV-1".to_string(),
            gstin: "27ABCDE1234F1Z5".to_string(),
            vendor_name: String::new(),
            vendor_gstin: String::new(),
            invoice_date: Utc::now(),
            documents: Vec::new(),
            bank_transaction_id: String::new(),
            cheque_number: String::new(),
        };
        let tx = ExpenditureTransaction::new(
            "NGO001",
            40_000.0,
            "Education",
            "Sparse invoice",
            invoice,
            Vec::new(),
        )
        .unwrap();
        assert_eq!(tx.compliance_score, 45.0);
    }

    #[test]
    fn add_attachment_recomputes_score() {
        let invoice = full_invoice();
        let mut tx =
            ExpenditureTransaction::new("NGO001", 1_000.0, "Health", "Meds", invoice, Vec::new())
                .unwrap();
        assert_eq!(tx.compliance_score, 90.0);
        tx.add_attachment("receipt.jpg", &"cd".repeat(32), "image/jpeg");
        assert_eq!(tx.compliance_score, 100.0);
    }

    #[test]
    fn auditor_validation_transitions_are_monotone() {
        let mut tx = ExpenditureTransaction::new(
            "NGO001",
            500.0,
            "Health",
            "Meds",
            full_invoice(),
            vec![attachment()],
        )
        .unwrap();
        assert!(tx.is_pending_validation());

        let validation = tx
            .validate_by_auditor("AUD1", true, "Approve - Excellent compliance", None)
            .unwrap();
        assert!(tx.is_validated());
        assert_eq!(validation.audit_score, 100.0);
        assert_eq!(validation.signature.len(), 64);

        // A second validation attempt is rejected.
        assert!(matches!(
            tx.validate_by_auditor("AUD2", false, "late", None),
            Err(Error::TransactionFinalized(_))
        ));
    }

    #[test]
    fn rejection_is_terminal() {
        let mut tx = ExpenditureTransaction::new(
            "NGO001",
            500.0,
            "Health",
            "Meds",
            empty_invoice(),
            Vec::new(),
        )
        .unwrap();
        tx.validate_by_auditor("AUD1", false, "Reject - Insufficient compliance", None)
            .unwrap();
        assert!(tx.is_rejected());
        assert!(tx.validate_by_auditor("AUD1", true, "retry", None).is_err());
    }

    #[test]
    fn invoice_uniqueness_scan() {
        let tx = ExpenditureTransaction::new(
            "NGO001",
            500.0,
            "Health",
            "Meds",
            full_invoice(),
            Vec::new(),
        )
        .unwrap();
        assert!(tx.verify_invoice_uniqueness(&["INV-OTHER".to_string()]));
        assert!(!tx.verify_invoice_uniqueness(&["INV-2024-001".to_string()]));
    }
}
