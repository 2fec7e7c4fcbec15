//! NGOs: owners of the per-NGO double chain, the admission pipelines, and
//! the rating / transparency-score computation derived from on-chain
//! history.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{sha256_hex, MultiSigWallet};
use crate::error::{Error, Result};
use crate::ledger::{
    AttachmentRef, Block, BlockPayload, BlockType, Chain, ChainStats, ChainType, DonationPayload,
    ExpenditurePayload,
};
use crate::transactions::{verify_gstin, DonationTransaction, EBill, ExpenditureTransaction};

/// Minimum compliance score an expenditure must carry to enter the chain.
const COMPLIANCE_MINIMUM: f64 = 60.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NgoKycData {
    pub verified: bool,
    pub documents_hash: String,
    pub verification_date: Option<DateTime<Utc>>,
    pub verification_authority: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
    pub valid_until: String,
}

/// What the NGO hands back after admitting a transaction to a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionReceipt {
    pub block_hash: String,
    pub transaction_id: String,
    pub block_index: u64,
    pub e_bill: Option<EBill>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingDetails {
    pub rating: f64,
    pub transparency_score: u32,
    pub utilization_rate: f64,
    pub gap_percentage: f64,
    pub total_donations: f64,
    pub total_expenditures: f64,
    pub period_days: i64,
    pub documentation_quality: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NgoSnapshot {
    pub ngo_id: String,
    pub name: String,
    pub category: String,
    pub rating: f64,
    pub transparency_score: u32,
    pub kyc_verified: bool,
    pub total_donations_received: f64,
    pub total_expenditure_reported: f64,
    pub donation_chain_length: usize,
    pub expenditure_chain_length: usize,
    pub donation_chain_valid: bool,
    pub expenditure_chain_valid: bool,
    pub last_audit_date: Option<DateTime<Utc>>,
    pub certificate_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Per-chain statistics for both of an NGO's chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSummary {
    pub donation_chain: ChainStats,
    pub donation_chain_difficulty: usize,
    pub expenditure_chain: ChainStats,
    pub expenditure_chain_difficulty: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub period_months: u32,
    pub total_donations: f64,
    pub total_expenditures: f64,
    pub donation_count: usize,
    pub expenditure_count: usize,
    pub category_breakdown: HashMap<String, f64>,
    pub average_donation: f64,
    pub monthly_average_donations: f64,
    pub monthly_average_expenditures: f64,
}

#[derive(Debug)]
pub struct Ngo {
    pub ngo_id: String,
    pub name: String,
    pub registration_number: String,
    pub category: String,
    pub rating: f64,
    pub kyc_data: NgoKycData,
    pub donation_chain: Chain,
    pub expenditure_chain: Chain,
    pub wallet: MultiSigWallet,
    pub total_donations_received: f64,
    pub total_expenditure_reported: f64,
    pub transparency_score: u32,
    pub created_at: DateTime<Utc>,
    pub last_audit_date: Option<DateTime<Utc>>,
    pub certificates: Vec<Certificate>,
    pub public_key: String,
}

impl Ngo {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ngo_id: &str,
        name: &str,
        registration_number: &str,
        category: &str,
        kyc_documents: &[String],
        signers: &[String],
        donation_difficulty: usize,
        expenditure_difficulty: usize,
    ) -> Self {
        let public_key = sha256_hex(format!("{ngo_id}{registration_number}").as_bytes());
        let documents_hash = if kyc_documents.is_empty() {
            String::new()
        } else {
            sha256_hex(kyc_documents.join(",").as_bytes())
        };

        let wallet = MultiSigWallet::new(2);
        for signer in signers {
            wallet.add_signer(signer);
        }

        Self {
            ngo_id: ngo_id.to_owned(),
            name: name.to_owned(),
            registration_number: registration_number.to_owned(),
            category: category.to_owned(),
            rating: 5.0,
            kyc_data: NgoKycData {
                verified: false,
                documents_hash,
                verification_date: None,
                verification_authority: None,
            },
            donation_chain: Chain::new(ngo_id, ChainType::Donation, donation_difficulty),
            expenditure_chain: Chain::new(ngo_id, ChainType::Expenditure, expenditure_difficulty),
            wallet,
            total_donations_received: 0.0,
            total_expenditure_reported: 0.0,
            transparency_score: 100,
            created_at: Utc::now(),
            last_audit_date: None,
            certificates: Vec::new(),
            public_key,
        }
    }

    pub fn verify_kyc(&mut self, authority_id: &str, certificates: Vec<Certificate>) {
        self.kyc_data.verified = true;
        self.kyc_data.verification_date = Some(Utc::now());
        self.kyc_data.verification_authority = Some(authority_id.to_owned());
        self.certificates = certificates;
    }

    /// Admit a donation: verify the e-bill and proof stub, build the
    /// donation payload, mine a block onto the donation chain and mark the
    /// transaction complete. The donor id enters the payload only as its
    /// hash.
    pub fn process_donation(
        &mut self,
        donation: &mut DonationTransaction,
    ) -> Result<AdmissionReceipt> {
        if !donation.validate_ebill() {
            donation.mark_failed("invalid e-bill");
            return Err(Error::InvalidEBill);
        }
        if !donation.zk_proof.verify() {
            donation.mark_failed("invalid donation proof");
            return Err(Error::InvalidProof);
        }

        let payload = BlockPayload::Donation(DonationPayload {
            transaction_id: donation.transaction_id.clone(),
            donor_hash: sha256_hex(donation.donor_id.as_bytes()),
            amount: donation.amount,
            currency: "INR".to_string(),
            zk_proof: donation.zk_proof.clone(),
            e_bill: donation.e_bill.clone(),
            timestamp: donation.timestamp,
            payment_method: donation.payment_method.clone(),
        });

        let mut block = Block::new(
            self.donation_chain.len() as u64,
            Utc::now(),
            payload,
            self.donation_chain.latest_hash(),
            BlockType::Donation,
        );
        block.validate();
        block.add_validator("ebill_system", &donation.e_bill.signature, "ebill");
        block.add_validator("zk_system", &donation.zk_proof.proof, "zkproof");

        match self.donation_chain.append_block(block) {
            Ok(appended) => {
                self.total_donations_received += donation.amount;
                donation.mark_complete();
                log::info!(
                    "NGO {} admitted donation {} at block {}",
                    self.ngo_id,
                    donation.transaction_id,
                    appended.index
                );
                Ok(AdmissionReceipt {
                    block_hash: appended.hash,
                    transaction_id: donation.transaction_id.clone(),
                    block_index: appended.index,
                    e_bill: Some(donation.e_bill.clone()),
                })
            }
            Err(err) => {
                donation.mark_failed("block validation failed");
                Err(err.into())
            }
        }
    }

    /// Admit an auditor-validated expenditure. The numeric compliance
    /// threshold is authoritative; the auditor's recommendation text gates
    /// only the validation record itself.
    pub fn process_expenditure(
        &mut self,
        expenditure: &ExpenditureTransaction,
    ) -> Result<AdmissionReceipt> {
        let validation = expenditure
            .auditor_validation
            .as_ref()
            .filter(|validation| validation.is_valid)
            .ok_or_else(|| Error::NotVerified {
                entity: "expenditure",
                id: expenditure.transaction_id.clone(),
            })?;

        if !verify_gstin(&expenditure.invoice_details.gstin) {
            return Err(Error::InvalidGstin(expenditure.invoice_details.gstin.clone()));
        }
        if expenditure.compliance_score < COMPLIANCE_MINIMUM {
            return Err(Error::ComplianceTooLow {
                score: expenditure.compliance_score,
                minimum: COMPLIANCE_MINIMUM,
            });
        }

        let attachments = expenditure
            .attachments
            .iter()
            .map(|attachment| AttachmentRef {
                filename: attachment.filename.clone(),
                hash: attachment.hash.clone(),
                kind: attachment.kind.clone(),
            })
            .collect();

        let payload = BlockPayload::Expenditure(ExpenditurePayload {
            transaction_id: expenditure.transaction_id.clone(),
            amount: expenditure.amount,
            currency: "INR".to_string(),
            category: expenditure.category.clone(),
            description: expenditure.description.clone(),
            invoice_details: expenditure.invoice_details.clone(),
            auditor_validation: validation.clone(),
            compliance_score: expenditure.compliance_score,
            timestamp: expenditure.timestamp,
            attachments,
        });

        let mut block = Block::new(
            self.expenditure_chain.len() as u64,
            Utc::now(),
            payload,
            self.expenditure_chain.latest_hash(),
            BlockType::Expenditure,
        );
        block.validate();
        block.add_validator(&validation.auditor_id, &validation.signature, "auditor");

        let appended = self.expenditure_chain.append_block(block)?;
        self.total_expenditure_reported += expenditure.amount;
        log::info!(
            "NGO {} admitted expenditure {} at block {}",
            self.ngo_id,
            expenditure.transaction_id,
            appended.index
        );
        Ok(AdmissionReceipt {
            block_hash: appended.hash,
            transaction_id: expenditure.transaction_id.clone(),
            block_index: appended.index,
            e_bill: None,
        })
    }

    /// Recompute the rating from the last `period_days` of on-chain
    /// activity and refresh the transparency score
    /// (`round(rating/5 · 100)`).
    pub fn calculate_rating(&mut self, period_days: i64) -> RatingDetails {
        let now = Utc::now();
        let start = now - Duration::days(period_days);

        let donations = self.donation_chain.blocks_by_date_range(start, now);
        let expenditures = self.expenditure_chain.blocks_by_date_range(start, now);

        let total_donations = sum_block_amounts(&donations);
        let total_expenditures = sum_block_amounts(&expenditures);

        let utilization_rate = if total_donations > 0.0 {
            total_expenditures / total_donations
        } else {
            0.0
        };
        let gap_percentage = if total_donations > 0.0 {
            (total_donations - total_expenditures).abs() / total_donations * 100.0
        } else {
            0.0
        };

        let mut rating = 5.0;

        if gap_percentage > 50.0 {
            rating -= 2.0;
        } else if gap_percentage > 30.0 {
            rating -= 1.0;
        } else if gap_percentage > 15.0 {
            rating -= 0.5;
        }

        if (0.6..=0.85).contains(&utilization_rate) {
            rating += 0.5;
        } else if utilization_rate < 0.3 || utilization_rate > 0.95 {
            rating -= 0.5;
        }

        let documentation_quality = self.documentation_quality();
        rating += documentation_quality * 0.5;

        if self.kyc_data.verified {
            rating += 0.2;
        }
        if !self.certificates.is_empty() {
            rating += 0.3;
        }

        rating = rating.clamp(1.0, 5.0);
        self.rating = rating;
        self.transparency_score = ((rating / 5.0) * 100.0).round() as u32;

        RatingDetails {
            rating,
            transparency_score: self.transparency_score,
            utilization_rate,
            gap_percentage,
            total_donations,
            total_expenditures,
            period_days,
            documentation_quality,
        }
    }

    /// Mean documentary score of the 10 most recent expenditure blocks,
    /// each scored out of 1.0. With no expenditures yet, documentation is
    /// assumed perfect.
    fn documentation_quality(&self) -> f64 {
        let recent = self.expenditure_chain.recent_blocks(10);
        let mut total = 0.0;
        let mut counted = 0usize;

        for block in &recent {
            let BlockPayload::Expenditure(payload) = &block.payload else {
                continue;
            };
            counted += 1;
            let invoice = &payload.invoice_details;
            let mut score = 0.0;

            if !invoice.invoice_number.is_empty() {
                score += 0.1;
            }
            if !invoice.gstin.is_empty() {
                score += 0.1;
            }
            if !invoice.vendor_name.is_empty() {
                score += 0.1;
            }
            if !invoice.vendor_gstin.is_empty() {
                score += 0.1;
            }
            if !invoice.documents.is_empty() {
                score += 0.2;
            }
            if !payload.attachments.is_empty() {
                score += 0.1;
            }
            if block.validated {
                score += 0.1;
            }
            if !block.validators.is_empty() {
                score += 0.1;
            }
            if payload.compliance_score >= 80.0 {
                score += 0.1;
            }

            total += score;
        }

        if counted == 0 {
            return 1.0;
        }
        (total / counted as f64).min(1.0)
    }

    pub fn snapshot(&self) -> NgoSnapshot {
        NgoSnapshot {
            ngo_id: self.ngo_id.clone(),
            name: self.name.clone(),
            category: self.category.clone(),
            rating: self.rating,
            transparency_score: self.transparency_score,
            kyc_verified: self.kyc_data.verified,
            total_donations_received: self.total_donations_received,
            total_expenditure_reported: self.total_expenditure_reported,
            donation_chain_length: self.donation_chain.len(),
            expenditure_chain_length: self.expenditure_chain.len(),
            donation_chain_valid: self.donation_chain.is_valid(),
            expenditure_chain_valid: self.expenditure_chain.is_valid(),
            last_audit_date: self.last_audit_date,
            certificate_count: self.certificates.len(),
            created_at: self.created_at,
        }
    }

    /// Full statistics for both chains, including validator counts and
    /// mining difficulty.
    pub fn chain_summary(&self) -> ChainSummary {
        ChainSummary {
            donation_chain: self.donation_chain.stats(),
            donation_chain_difficulty: self.donation_chain.difficulty(),
            expenditure_chain: self.expenditure_chain.stats(),
            expenditure_chain_difficulty: self.expenditure_chain.difficulty(),
        }
    }

    /// Donation and expenditure aggregates over the last `months` months,
    /// with a per-category expenditure breakdown.
    pub fn financial_summary(&self, months: u32) -> FinancialSummary {
        let months = months.max(1);
        let now = Utc::now();
        let start = now - Duration::days(i64::from(months) * 30);

        let donations = self.donation_chain.blocks_by_date_range(start, now);
        let expenditures = self.expenditure_chain.blocks_by_date_range(start, now);

        let mut category_breakdown: HashMap<String, f64> = HashMap::new();
        for block in &expenditures {
            if let BlockPayload::Expenditure(payload) = &block.payload {
                *category_breakdown
                    .entry(payload.category.clone())
                    .or_insert(0.0) += payload.amount;
            }
        }

        let total_donations = sum_block_amounts(&donations);
        let total_expenditures = sum_block_amounts(&expenditures);
        let donation_count = donations
            .iter()
            .filter(|b| matches!(b.payload, BlockPayload::Donation(_)))
            .count();
        let expenditure_count = expenditures
            .iter()
            .filter(|b| matches!(b.payload, BlockPayload::Expenditure(_)))
            .count();

        let average_donation = if donation_count > 0 {
            total_donations / donation_count as f64
        } else {
            0.0
        };

        FinancialSummary {
            period_months: months,
            total_donations,
            total_expenditures,
            donation_count,
            expenditure_count,
            category_breakdown,
            average_donation,
            monthly_average_donations: total_donations / f64::from(months),
            monthly_average_expenditures: total_expenditures / f64::from(months),
        }
    }
}

/// Sum the payload amounts of a block slice; genesis blocks carry none.
fn sum_block_amounts(blocks: &[Block]) -> f64 {
    blocks
        .iter()
        .filter_map(|block| block.payload.amount())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::expenditure::tests::full_invoice;
    use crate::transactions::InvoiceDetails;

    fn ngo() -> Ngo {
        Ngo::new(
            "NGO001",
            "Helping Hands",
            "REG-42",
            "Education",
            &["trust_deed.pdf".to_string()],
            &["signer-a".to_string(), "signer-b".to_string()],
            2,
            2,
        )
    }

    fn donation(amount: f64) -> DonationTransaction {
        DonationTransaction::new("D1", "NGO001", amount, "UPI", "kychash").unwrap()
    }

    fn validated_expenditure(amount: f64) -> ExpenditureTransaction {
        let mut tx = ExpenditureTransaction::new(
            "NGO001",
            amount,
            "Education",
            "School supplies",
            full_invoice(),
            Vec::new(),
        )
        .unwrap();
        tx.add_attachment("receipt.jpg", &"ab".repeat(32), "image/jpeg");
        tx.validate_by_auditor("AUD001", true, "Approve - Excellent compliance", None)
            .unwrap();
        tx
    }

    #[test]
    fn construction_wires_chains_and_wallet() {
        let ngo = ngo();
        assert_eq!(ngo.donation_chain.len(), 1);
        assert_eq!(ngo.expenditure_chain.len(), 1);
        assert_eq!(ngo.wallet.signers().len(), 2);
        assert_eq!(ngo.rating, 5.0);
        assert_eq!(ngo.transparency_score, 100);
        assert_eq!(ngo.public_key.len(), 64);
    }

    #[test]
    fn donation_admission_extends_the_chain() {
        let mut ngo = ngo();
        let mut tx = donation(49_500.0);
        let receipt = ngo.process_donation(&mut tx).unwrap();

        assert_eq!(receipt.block_index, 1);
        assert_eq!(ngo.donation_chain.len(), 2);
        assert_eq!(ngo.total_donations_received, 49_500.0);
        assert!(tx.is_completed());
        assert!(ngo.donation_chain.is_valid());

        let block = ngo.donation_chain.block_by_hash(&receipt.block_hash).unwrap();
        assert!(block.hash.starts_with("00"));
        assert_eq!(block.validators_by_type("ebill").len(), 1);
        assert_eq!(block.validators_by_type("zkproof").len(), 1);
        match &block.payload {
            BlockPayload::Donation(payload) => {
                assert_eq!(payload.amount, 49_500.0);
                assert_eq!(payload.currency, "INR");
                assert_eq!(payload.donor_hash, sha256_hex(b"D1"));
                assert_ne!(payload.donor_hash, "D1");
            }
            other => panic!("expected donation payload, got {other:?}"),
        }
    }

    #[test]
    fn tampered_ebill_is_rejected_and_marks_failure() {
        let mut ngo = ngo();
        let mut tx = donation(1_000.0);
        tx.e_bill.amount = 999_999.0;

        let err = ngo.process_donation(&mut tx).unwrap_err();
        assert!(matches!(err, Error::InvalidEBill));
        assert!(tx.is_failed());
        assert_eq!(ngo.donation_chain.len(), 1);
        assert_eq!(ngo.total_donations_received, 0.0);
    }

    #[test]
    fn expenditure_requires_auditor_validation() {
        let mut ngo = ngo();
        let tx = ExpenditureTransaction::new(
            "NGO001",
            500.0,
            "Health",
            "Meds",
            full_invoice(),
            Vec::new(),
        )
        .unwrap();
        assert!(matches!(
            ngo.process_expenditure(&tx),
            Err(Error::NotVerified { .. })
        ));
    }

    #[test]
    fn expenditure_below_compliance_minimum_is_rejected() {
        let mut ngo = ngo();
        // Valid GSTIN + invoice number + recent date only: score 45.
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
        let mut tx = ExpenditureTransaction::new(
            "NGO001", 500.0, "Health", "Meds", invoice, Vec::new(),
        )
        .unwrap();
        tx.validate_by_auditor("AUD001", true, "forced", None).unwrap();

        assert!(matches!(
            ngo.process_expenditure(&tx),
            Err(Error::ComplianceTooLow { .. })
        ));
        assert_eq!(ngo.expenditure_chain.len(), 1);
    }

    #[test]
    fn validated_expenditure_reaches_the_chain() {
        let mut ngo = ngo();
        let tx = validated_expenditure(40_000.0);
        let receipt = ngo.process_expenditure(&tx).unwrap();

        assert_eq!(receipt.block_index, 1);
        assert!(receipt.e_bill.is_none());
        assert_eq!(ngo.total_expenditure_reported, 40_000.0);

        let block = ngo
            .expenditure_chain
            .block_by_hash(&receipt.block_hash)
            .unwrap();
        assert_eq!(block.validators_by_type("auditor").len(), 1);
        match &block.payload {
            BlockPayload::Expenditure(payload) => {
                assert_eq!(payload.compliance_score, 100.0);
                assert_eq!(payload.attachments.len(), 1);
            }
            other => panic!("expected expenditure payload, got {other:?}"),
        }
    }

    #[test]
    fn rating_reflects_transparency_relation() {
        let mut ngo = ngo();
        ngo.verify_kyc(
            "GOV-AUTH",
            vec![Certificate {
                kind: "80G".to_string(),
                number: "80G-123".to_string(),
                valid_until: "2027-03-31".to_string(),
            }],
        );

        let mut tx = donation(103_950.0);
        ngo.process_donation(&mut tx).unwrap();
        let spend = validated_expenditure(40_000.0);
        ngo.process_expenditure(&spend).unwrap();

        let details = ngo.calculate_rating(30);
        assert!((1.0..=5.0).contains(&details.rating));
        assert_eq!(
            details.transparency_score,
            ((details.rating / 5.0) * 100.0).round() as u32
        );
        assert_eq!(ngo.rating, details.rating);
    }

    #[test]
    fn rating_without_activity_uses_neutral_utilization() {
        let mut ngo = ngo();
        let details = ngo.calculate_rating(30);
        // No donations: gap 0, utilization 0 (penalized), doc quality 1.0.
        assert_eq!(details.total_donations, 0.0);
        assert_eq!(details.documentation_quality, 1.0);
        assert_eq!(details.rating, 5.0);
        assert_eq!(details.transparency_score, 100);
    }

    #[test]
    fn documentation_quality_counts_only_expenditure_blocks() {
        let mut ngo = ngo();
        assert_eq!(ngo.documentation_quality(), 1.0);

        let tx = validated_expenditure(1_000.0);
        ngo.process_expenditure(&tx).unwrap();
        // Fully documented block scores 1.0.
        assert_eq!(ngo.documentation_quality(), 1.0);
    }

    #[test]
    fn chain_summary_surfaces_both_chains() {
        let mut ngo = ngo();
        let mut tx = donation(10_000.0);
        ngo.process_donation(&mut tx).unwrap();

        let summary = ngo.chain_summary();
        assert_eq!(summary.donation_chain.total_blocks, 2);
        assert_eq!(summary.donation_chain.validated_blocks, 2);
        assert_eq!(summary.donation_chain.chain_type, ChainType::Donation);
        assert!(summary.donation_chain.is_valid);
        assert_eq!(summary.donation_chain_difficulty, 2);

        assert_eq!(summary.expenditure_chain.total_blocks, 1);
        assert_eq!(summary.expenditure_chain.chain_type, ChainType::Expenditure);
        assert_eq!(summary.expenditure_chain_difficulty, 2);
    }

    #[test]
    fn financial_summary_breaks_down_categories() {
        let mut ngo = ngo();
        let mut tx = donation(100_000.0);
        ngo.process_donation(&mut tx).unwrap();
        ngo.process_expenditure(&validated_expenditure(30_000.0)).unwrap();
        ngo.process_expenditure(&validated_expenditure(10_000.0)).unwrap();

        let summary = ngo.financial_summary(12);
        assert_eq!(summary.donation_count, 1);
        assert_eq!(summary.expenditure_count, 2);
        assert_eq!(summary.total_expenditures, 40_000.0);
        assert_eq!(summary.category_breakdown["Education"], 40_000.0);
        assert_eq!(summary.average_donation, 100_000.0);
    }
}
