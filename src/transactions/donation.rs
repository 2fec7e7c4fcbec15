//! Donation transactions and electronic bills.
//!
//! A donation is born pending with a proof stub and a signed e-bill, and
//! reaches a terminal state (completed or failed) within one orchestrator
//! call. The e-bill signature is SHA-256 over a canonical serialization of
//! the unsigned fields, so mutating any signed field after issuance fails
//! validation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{random_hex, sha256_hex, DonationProof};
use crate::error::{Error, Result};

/// Advisory 80G tax-benefit figures; not used in platform accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBenefit {
    pub section: String,
    pub deductible_amount: f64,
    pub tax_saving: f64,
    pub note: String,
}

impl TaxBenefit {
    pub fn for_amount(amount: f64) -> Self {
        let deductible = amount.min(10_000.0);
        Self {
            section: "80G".to_string(),
            deductible_amount: deductible,
            tax_saving: deductible * 0.30,
            note: "Consult tax advisor for accurate calculations".to_string(),
        }
    }
}

/// Signed donation receipt embedded in the donation block payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EBill {
    pub bill_id: String,
    pub transaction_id: String,
    pub amount: f64,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub ngo_id: String,
    /// SHA-256 of the donor id (anonymized).
    pub donor_hash: String,
    pub payment_method: String,
    pub tax_benefit: TaxBenefit,
    pub receipt_number: String,
    pub signature: String,
    pub qr_code: String,
    pub download_url: String,
    pub validity_period: String,
}

/// The signed field list, in its canonical order. `signature`, `qr_code`
/// and `download_url` are excluded.
#[derive(Serialize)]
struct EBillSigningView<'a> {
    bill_id: &'a str,
    transaction_id: &'a str,
    amount: f64,
    currency: &'a str,
    timestamp: i64,
    ngo_id: &'a str,
    donor_hash: &'a str,
    payment_method: &'a str,
    tax_benefit: &'a TaxBenefit,
    receipt_number: &'a str,
    validity_period: &'a str,
}

#[derive(Serialize)]
struct QrPayload<'a> {
    bill_id: &'a str,
    amount: f64,
    ngo_id: &'a str,
    timestamp: i64,
}

impl EBill {
    /// Recompute the signature from the current field values.
    pub fn signing_digest(&self) -> String {
        let view = EBillSigningView {
            bill_id: &self.bill_id,
            transaction_id: &self.transaction_id,
            amount: self.amount,
            currency: &self.currency,
            timestamp: self.timestamp.timestamp(),
            ngo_id: &self.ngo_id,
            donor_hash: &self.donor_hash,
            payment_method: &self.payment_method,
            tax_benefit: &self.tax_benefit,
            receipt_number: &self.receipt_number,
            validity_period: &self.validity_period,
        };
        let canonical = serde_json::to_string(&view).unwrap_or_default();
        sha256_hex(canonical.as_bytes())
    }

    pub fn verify_signature(&self) -> bool {
        self.signature == self.signing_digest()
    }

    fn qr_payload(&self) -> String {
        let payload = QrPayload {
            bill_id: &self.bill_id,
            amount: self.amount,
            ngo_id: &self.ngo_id,
            timestamp: self.timestamp.timestamp(),
        };
        let json = serde_json::to_string(&payload).unwrap_or_default();
        format!("QR:{}", STANDARD.encode(json))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationTransaction {
    pub transaction_id: String,
    pub donor_id: String,
    pub ngo_id: String,
    pub amount: f64,
    pub payment_method: String,
    pub timestamp: DateTime<Utc>,
    pub status: DonationStatus,
    pub donor_kyc_hash: String,
    pub zk_proof: DonationProof,
    pub e_bill: EBill,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl DonationTransaction {
    pub fn new(
        donor_id: &str,
        ngo_id: &str,
        amount: f64,
        payment_method: &str,
        donor_kyc_hash: &str,
    ) -> Result<Self> {
        if amount <= 0.0 {
            return Err(Error::InvalidAmount(amount));
        }

        let transaction_id = random_hex(16);
        let timestamp = Utc::now();
        let zk_proof = DonationProof::generate(donor_id, amount, timestamp);
        let e_bill = build_ebill(
            &transaction_id,
            donor_id,
            ngo_id,
            amount,
            payment_method,
            timestamp,
        );

        Ok(Self {
            transaction_id,
            donor_id: donor_id.to_owned(),
            ngo_id: ngo_id.to_owned(),
            amount,
            payment_method: payment_method.to_owned(),
            timestamp,
            status: DonationStatus::Pending,
            donor_kyc_hash: donor_kyc_hash.to_owned(),
            zk_proof,
            e_bill,
            completed_at: None,
            failed_at: None,
            failure_reason: None,
        })
    }

    /// Recompute the e-bill signature and compare against the stored one.
    pub fn validate_ebill(&self) -> bool {
        self.e_bill.verify_signature()
    }

    pub fn mark_complete(&mut self) {
        self.status = DonationStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, reason: &str) {
        self.status = DonationStatus::Failed;
        self.failed_at = Some(Utc::now());
        self.failure_reason = Some(reason.to_owned());
    }

    pub fn is_pending(&self) -> bool {
        self.status == DonationStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == DonationStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == DonationStatus::Failed
    }

    /// Summary of the transaction for listings and dashboards.
    pub fn summary(&self) -> DonationSummary {
        DonationSummary {
            transaction_id: self.transaction_id.clone(),
            ngo_id: self.ngo_id.clone(),
            amount: self.amount,
            currency: "INR".to_string(),
            payment_method: self.payment_method.clone(),
            status: self.status,
            timestamp: self.timestamp,
            receipt_number: self.e_bill.receipt_number.clone(),
            tax_saving: self.e_bill.tax_benefit.tax_saving,
            completed_at: self.completed_at,
            failed_at: self.failed_at,
            failure_reason: self.failure_reason.clone(),
        }
    }

    /// Receipt-facing view of the e-bill, without the signed internals.
    pub fn ebill_info(&self) -> EBillInfo {
        EBillInfo {
            bill_id: self.e_bill.bill_id.clone(),
            receipt_number: self.e_bill.receipt_number.clone(),
            amount: self.e_bill.amount,
            currency: self.e_bill.currency.clone(),
            tax_benefit: self.e_bill.tax_benefit.clone(),
            download_url: self.e_bill.download_url.clone(),
            validity_period: self.e_bill.validity_period.clone(),
            qr_code: self.e_bill.qr_code.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationSummary {
    pub transaction_id: String,
    pub ngo_id: String,
    pub amount: f64,
    pub currency: String,
    pub payment_method: String,
    pub status: DonationStatus,
    pub timestamp: DateTime<Utc>,
    pub receipt_number: String,
    pub tax_saving: f64,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

/// What a donor sees when downloading their receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EBillInfo {
    pub bill_id: String,
    pub receipt_number: String,
    pub amount: f64,
    pub currency: String,
    pub tax_benefit: TaxBenefit,
    pub download_url: String,
    pub validity_period: String,
    pub qr_code: String,
}

fn build_ebill(
    transaction_id: &str,
    donor_id: &str,
    ngo_id: &str,
    amount: f64,
    payment_method: &str,
    timestamp: DateTime<Utc>,
) -> EBill {
    let bill_id = random_hex(12);
    let receipt_number = format!(
        "RCP-{}-{}",
        timestamp.timestamp(),
        bill_id[..10].to_uppercase()
    );

    let mut bill = EBill {
        bill_id: bill_id.clone(),
        transaction_id: transaction_id.to_owned(),
        amount,
        currency: "INR".to_string(),
        timestamp,
        ngo_id: ngo_id.to_owned(),
        donor_hash: sha256_hex(donor_id.as_bytes()),
        payment_method: payment_method.to_owned(),
        tax_benefit: TaxBenefit::for_amount(amount),
        receipt_number,
        signature: String::new(),
        qr_code: String::new(),
        download_url: format!("https://receipts.ngo/{bill_id}"),
        validity_period: "7 years".to_string(),
    };
    bill.signature = bill.signing_digest();
    bill.qr_code = bill.qr_payload();
    bill
}
