//! The platform orchestrator.
//!
//! A constructed object (never a singleton) owning the three entity
//! registries, the KYC-authority set and the aggregate counters behind a
//! single reader-writer lock, plus the anchor service. Admission
//! operations hold the write lock across the whole pipeline, which
//! serializes admission globally: `total_transactions` gains a total
//! order, and a donor's `check_donation_limit` + `add_donation` behave as
//! one atomic pair. Lock order is Orchestrator → Chain → MultiSig →
//! Anchor; no lock is re-entered.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::anchor::{AnchorReceipt, AnchorService, AnchorVerification, NetworkStats, SimulatedAnchor};
use crate::config::PlatformConfig;
use crate::entities::{
    AuditResult, Auditor, AuditorStats, Certificate, Donor, DonorStats, Ngo, NgoSnapshot,
    VerificationLevel,
};
use crate::error::{Error, Result};
use crate::ledger::ChainType;
use crate::transactions::{
    Attachment, DonationTransaction, EBill, ExpenditureTransaction, InvoiceDetails,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_transactions: u64,
    pub total_donations: f64,
    pub total_expenditures: f64,
    pub platform_fees_collected: f64,
    pub created_at: DateTime<Utc>,
}

/// Aggregated view over the whole platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total_ngos: usize,
    pub total_donors: usize,
    pub total_auditors: usize,
    pub total_transactions: u64,
    pub total_donations: f64,
    pub total_expenditures: f64,
    pub platform_fee_collected: f64,
    pub verified_ngos: usize,
    pub verified_donors: usize,
    pub verified_auditors: usize,
    pub kyc_authorities: usize,
    pub days_active: i64,
    pub average_ngo_rating: f64,
    pub categories: Vec<String>,
}

/// Caller-supplied expenditure data. The invoice may be synthesized by the
/// caller for well-formedness tests; categories and descriptions are
/// free-form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenditureRequest {
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub invoice: InvoiceDetails,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationOutcome {
    pub block_hash: String,
    pub transaction_id: String,
    pub block_index: u64,
    pub e_bill: EBill,
    pub anchor: Option<AnchorReceipt>,
    pub platform_fee: f64,
    pub net_amount: f64,
    pub gross_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenditureOutcome {
    pub block_hash: String,
    pub transaction_id: String,
    pub block_index: u64,
    pub audit_result: AuditResult,
    pub anchor: Option<AnchorReceipt>,
}

/// One row of a platform-wide rating sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NgoRating {
    pub ngo_id: String,
    pub name: String,
    pub category: String,
    pub kyc_verified: bool,
    pub rating: f64,
    pub transparency_score: u32,
    pub utilization_rate: f64,
    pub gap_percentage: f64,
    pub total_donations: f64,
    pub total_expenditures: f64,
    pub documentation_quality: f64,
}

struct PlatformState {
    ngos: HashMap<String, Ngo>,
    donors: HashMap<String, Donor>,
    auditors: HashMap<String, Auditor>,
    kyc_authorities: HashSet<String>,
    stats: SystemStats,
}

pub struct Platform {
    config: PlatformConfig,
    anchor: Box<dyn AnchorService>,
    state: RwLock<PlatformState>,
}

impl Platform {
    /// Construct with the built-in anchor simulator.
    pub fn new(config: PlatformConfig) -> Self {
        let anchor = Box::new(SimulatedAnchor::from_config(&config));
        Self::with_anchor(config, anchor)
    }

    /// Construct with a caller-supplied anchor driver.
    pub fn with_anchor(config: PlatformConfig, anchor: Box<dyn AnchorService>) -> Self {
        let config = config.normalized();
        Self {
            config,
            anchor,
            state: RwLock::new(PlatformState {
                ngos: HashMap::new(),
                donors: HashMap::new(),
                auditors: HashMap::new(),
                kyc_authorities: HashSet::new(),
                stats: SystemStats {
                    total_transactions: 0,
                    total_donations: 0.0,
                    total_expenditures: 0.0,
                    platform_fees_collected: 0.0,
                    created_at: Utc::now(),
                },
            }),
        }
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    // ----- registration and KYC -------------------------------------------

    pub fn register_ngo(
        &self,
        ngo_id: &str,
        name: &str,
        registration_number: &str,
        category: &str,
        kyc_documents: Vec<String>,
        signers: Vec<String>,
    ) -> Result<()> {
        let mut state = self.state.write();
        if state.ngos.contains_key(ngo_id) {
            return Err(Error::AlreadyExists {
                entity: "NGO",
                id: ngo_id.to_owned(),
            });
        }
        let ngo = Ngo::new(
            ngo_id,
            name,
            registration_number,
            category,
            &kyc_documents,
            &signers,
            self.config.donation_chain_difficulty,
            self.config.expenditure_chain_difficulty,
        );
        state.ngos.insert(ngo_id.to_owned(), ngo);
        log::info!("registered NGO {ngo_id}");
        Ok(())
    }

    /// Authorities are trust-on-first-use: the first verification an
    /// authority performs records it in the authority set.
    pub fn verify_ngo_kyc(
        &self,
        ngo_id: &str,
        authority_id: &str,
        certificates: Vec<Certificate>,
    ) -> Result<()> {
        let mut state = self.state.write();
        state.kyc_authorities.insert(authority_id.to_owned());
        let ngo = state.ngos.get_mut(ngo_id).ok_or_else(|| Error::NotFound {
            entity: "NGO",
            id: ngo_id.to_owned(),
        })?;
        ngo.verify_kyc(authority_id, certificates);
        Ok(())
    }

    pub fn register_donor(
        &self,
        donor_id: &str,
        kyc_documents: Vec<String>,
        annual_limit: Option<f64>,
    ) -> Result<()> {
        let mut state = self.state.write();
        if state.donors.contains_key(donor_id) {
            return Err(Error::AlreadyExists {
                entity: "donor",
                id: donor_id.to_owned(),
            });
        }
        let limit = annual_limit.unwrap_or(self.config.default_annual_limit);
        state
            .donors
            .insert(donor_id.to_owned(), Donor::new(donor_id, kyc_documents, limit));
        log::info!("registered donor {donor_id}");
        Ok(())
    }

    pub fn verify_donor_kyc(
        &self,
        donor_id: &str,
        authority_id: &str,
        level: VerificationLevel,
    ) -> Result<()> {
        let mut state = self.state.write();
        state.kyc_authorities.insert(authority_id.to_owned());
        let premium_limit = self.config.premium_annual_limit;
        let donor = state
            .donors
            .get_mut(donor_id)
            .ok_or_else(|| Error::NotFound {
                entity: "donor",
                id: donor_id.to_owned(),
            })?;
        donor.verify_kyc(authority_id, level, premium_limit);
        Ok(())
    }

    pub fn register_auditor(
        &self,
        auditor_id: &str,
        name: &str,
        credentials: Value,
        specializations: Vec<String>,
    ) -> Result<()> {
        let mut state = self.state.write();
        if state.auditors.contains_key(auditor_id) {
            return Err(Error::AlreadyExists {
                entity: "auditor",
                id: auditor_id.to_owned(),
            });
        }
        state.auditors.insert(
            auditor_id.to_owned(),
            Auditor::new(auditor_id, name, credentials, specializations),
        );
        log::info!("registered auditor {auditor_id}");
        Ok(())
    }

    pub fn verify_auditor_credentials(&self, auditor_id: &str, authority_id: &str) -> Result<()> {
        let mut state = self.state.write();
        state.kyc_authorities.insert(authority_id.to_owned());
        let auditor = state
            .auditors
            .get_mut(auditor_id)
            .ok_or_else(|| Error::NotFound {
                entity: "auditor",
                id: auditor_id.to_owned(),
            })?;
        auditor.verify_credentials(authority_id);
        Ok(())
    }

    // ----- transaction admission ------------------------------------------

    /// Run the donation pipeline: KYC and limit checks, fee split,
    /// transaction construction, NGO admission, donor bookkeeping,
    /// counters and anchoring. Anchoring failures never roll back the
    /// admission; the outcome simply carries no anchor.
    pub fn process_donation(
        &self,
        donor_id: &str,
        ngo_id: &str,
        gross_amount: f64,
        payment_method: &str,
    ) -> Result<DonationOutcome> {
        if gross_amount <= 0.0 {
            return Err(Error::InvalidAmount(gross_amount));
        }

        let mut state = self.state.write();

        let donor_kyc_hash = {
            let donor = state.donors.get(donor_id).ok_or_else(|| Error::NotFound {
                entity: "donor",
                id: donor_id.to_owned(),
            })?;
            if !donor.kyc_verified {
                return Err(Error::NotVerified {
                    entity: "donor",
                    id: donor_id.to_owned(),
                });
            }
            let limit = donor.check_donation_limit(gross_amount);
            if !limit.can_donate {
                return Err(Error::LimitExceeded {
                    remaining: limit.remaining_limit,
                });
            }
            donor.kyc_data.document_hash.clone()
        };

        {
            let ngo = state.ngos.get(ngo_id).ok_or_else(|| Error::NotFound {
                entity: "NGO",
                id: ngo_id.to_owned(),
            })?;
            if !ngo.kyc_data.verified {
                return Err(Error::NotVerified {
                    entity: "NGO",
                    id: ngo_id.to_owned(),
                });
            }
        }

        let platform_fee = gross_amount * self.config.fee_percentage;
        let net_amount = gross_amount - platform_fee;

        let mut donation =
            DonationTransaction::new(donor_id, ngo_id, net_amount, payment_method, &donor_kyc_hash)?;

        let receipt = state
            .ngos
            .get_mut(ngo_id)
            .ok_or_else(|| Error::NotFound {
                entity: "NGO",
                id: ngo_id.to_owned(),
            })?
            .process_donation(&mut donation)?;

        if let Some(donor) = state.donors.get_mut(donor_id) {
            donor.add_donation(&donation);
        }

        state.stats.total_transactions += 1;
        state.stats.total_donations += net_amount;
        state.stats.platform_fees_collected += platform_fee;

        let mut extra = Map::new();
        extra.insert("amount".to_string(), Value::from(net_amount));
        extra.insert("platform_fee".to_string(), Value::from(platform_fee));
        let anchor = self.try_anchor(&receipt.block_hash, ngo_id, ChainType::Donation, extra);

        Ok(DonationOutcome {
            block_hash: receipt.block_hash,
            transaction_id: donation.transaction_id.clone(),
            block_index: receipt.block_index,
            e_bill: donation.e_bill,
            anchor,
            platform_fee,
            net_amount,
            gross_amount,
        })
    }

    /// Run the expenditure pipeline: the auditor reviews the transaction,
    /// the recommendation gates the validation record, and the NGO enforces
    /// the numeric compliance threshold at admission.
    pub fn process_expenditure(
        &self,
        ngo_id: &str,
        request: ExpenditureRequest,
        auditor_id: &str,
    ) -> Result<ExpenditureOutcome> {
        let mut state = self.state.write();

        if !state.ngos.contains_key(ngo_id) {
            return Err(Error::NotFound {
                entity: "NGO",
                id: ngo_id.to_owned(),
            });
        }
        {
            let auditor = state
                .auditors
                .get(auditor_id)
                .ok_or_else(|| Error::NotFound {
                    entity: "auditor",
                    id: auditor_id.to_owned(),
                })?;
            if !auditor.verified {
                return Err(Error::NotVerified {
                    entity: "auditor",
                    id: auditor_id.to_owned(),
                });
            }
        }

        let mut expenditure = ExpenditureTransaction::new(
            ngo_id,
            request.amount,
            &request.category,
            &request.description,
            request.invoice,
            request.attachments,
        )?;

        let audit_result = state
            .auditors
            .get_mut(auditor_id)
            .ok_or_else(|| Error::NotFound {
                entity: "auditor",
                id: auditor_id.to_owned(),
            })?
            .audit_expenditure(&expenditure, "");

        let approve = audit_result.is_approval();
        expenditure.validate_by_auditor(
            auditor_id,
            approve,
            &audit_result.recommendation,
            Some(audit_result.compliance_score),
        )?;

        if !approve {
            return Err(Error::AuditRejected(audit_result.recommendation));
        }

        let receipt = state
            .ngos
            .get_mut(ngo_id)
            .ok_or_else(|| Error::NotFound {
                entity: "NGO",
                id: ngo_id.to_owned(),
            })?
            .process_expenditure(&expenditure)?;

        state.stats.total_transactions += 1;
        state.stats.total_expenditures += expenditure.amount;

        let mut extra = Map::new();
        extra.insert("amount".to_string(), Value::from(expenditure.amount));
        extra.insert(
            "category".to_string(),
            Value::from(expenditure.category.as_str()),
        );
        let anchor = self.try_anchor(&receipt.block_hash, ngo_id, ChainType::Expenditure, extra);

        Ok(ExpenditureOutcome {
            block_hash: receipt.block_hash,
            transaction_id: expenditure.transaction_id.clone(),
            block_index: receipt.block_index,
            audit_result,
            anchor,
        })
    }

    fn try_anchor(
        &self,
        block_hash: &str,
        ngo_id: &str,
        chain_type: ChainType,
        extra: Map<String, Value>,
    ) -> Option<AnchorReceipt> {
        match self
            .anchor
            .anchor_block_hash(block_hash, ngo_id, chain_type, extra)
        {
            Ok(receipt) => Some(receipt),
            Err(err) => {
                log::warn!("anchoring failed for block {block_hash}: {err}");
                None
            }
        }
    }

    // ----- read paths ------------------------------------------------------

    /// Recompute every NGO's rating over `period_days` and return the
    /// results sorted descending by rating (stable).
    pub fn calculate_all_ngo_ratings(&self, period_days: i64) -> Vec<NgoRating> {
        let mut state = self.state.write();
        let mut ratings: Vec<NgoRating> = state
            .ngos
            .values_mut()
            .map(|ngo| {
                let details = ngo.calculate_rating(period_days);
                NgoRating {
                    ngo_id: ngo.ngo_id.clone(),
                    name: ngo.name.clone(),
                    category: ngo.category.clone(),
                    kyc_verified: ngo.kyc_data.verified,
                    rating: details.rating,
                    transparency_score: details.transparency_score,
                    utilization_rate: details.utilization_rate,
                    gap_percentage: details.gap_percentage,
                    total_donations: details.total_donations,
                    total_expenditures: details.total_expenditures,
                    documentation_quality: details.documentation_quality,
                }
            })
            .collect();

        ratings.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ratings
    }

    pub fn platform_stats(&self) -> PlatformStats {
        let state = self.state.read();

        let verified_ngos = state
            .ngos
            .values()
            .filter(|ngo| ngo.kyc_data.verified)
            .count();
        let verified_donors = state
            .donors
            .values()
            .filter(|donor| donor.kyc_verified)
            .count();
        let verified_auditors = state
            .auditors
            .values()
            .filter(|auditor| auditor.verified)
            .count();

        let average_ngo_rating = if state.ngos.is_empty() {
            0.0
        } else {
            state.ngos.values().map(|ngo| ngo.rating).sum::<f64>() / state.ngos.len() as f64
        };

        let mut categories: Vec<String> = state
            .ngos
            .values()
            .map(|ngo| ngo.category.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        categories.sort();

        let days_active = Utc::now()
            .signed_duration_since(state.stats.created_at)
            .num_days();

        PlatformStats {
            total_ngos: state.ngos.len(),
            total_donors: state.donors.len(),
            total_auditors: state.auditors.len(),
            total_transactions: state.stats.total_transactions,
            total_donations: state.stats.total_donations,
            total_expenditures: state.stats.total_expenditures,
            platform_fee_collected: state.stats.platform_fees_collected,
            verified_ngos,
            verified_donors,
            verified_auditors,
            kyc_authorities: state.kyc_authorities.len(),
            days_active,
            average_ngo_rating,
            categories,
        }
    }

    pub fn ngo(&self, ngo_id: &str) -> Result<NgoSnapshot> {
        let state = self.state.read();
        state
            .ngos
            .get(ngo_id)
            .map(Ngo::snapshot)
            .ok_or_else(|| Error::NotFound {
                entity: "NGO",
                id: ngo_id.to_owned(),
            })
    }

    pub fn donor(&self, donor_id: &str) -> Result<DonorStats> {
        let state = self.state.read();
        state
            .donors
            .get(donor_id)
            .map(Donor::stats)
            .ok_or_else(|| Error::NotFound {
                entity: "donor",
                id: donor_id.to_owned(),
            })
    }

    pub fn auditor(&self, auditor_id: &str) -> Result<AuditorStats> {
        let state = self.state.read();
        state
            .auditors
            .get(auditor_id)
            .map(Auditor::stats)
            .ok_or_else(|| Error::NotFound {
                entity: "auditor",
                id: auditor_id.to_owned(),
            })
    }

    pub fn verify_anchor(&self, block_hash: &str) -> AnchorVerification {
        self.anchor.verify(block_hash)
    }

    pub fn network_stats(&self) -> NetworkStats {
        self.anchor.network_stats()
    }
}
