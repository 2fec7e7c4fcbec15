//! Donors: KYC state, donation history, annual-limit enforcement and
//! per-year tax-benefit roll-ups.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{sha256_hex, DonationProof};
use crate::transactions::{DonationTransaction, EBill, TaxBenefit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationLevel {
    None,
    Basic,
    Premium,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonorKycData {
    pub document_hash: String,
    pub verification_date: Option<DateTime<Utc>>,
    pub verification_authority: Option<String>,
    pub documents_submitted: Vec<String>,
    pub verification_level: VerificationLevel,
}

/// One donation as remembered by the donor (the chain keeps its own copy
/// inside the block payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationRecord {
    pub transaction_id: String,
    pub ngo_id: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
    pub e_bill: EBill,
    pub zk_proof: DonationProof,
    pub tax_benefit: TaxBenefit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxBenefitSummary {
    pub year: i32,
    pub total_donated: f64,
    pub total_deductible: f64,
    pub estimated_tax_saving: f64,
    pub donations: Vec<DonationRecord>,
}

impl TaxBenefitSummary {
    fn empty(year: i32) -> Self {
        Self {
            year,
            total_donated: 0.0,
            total_deductible: 0.0,
            estimated_tax_saving: 0.0,
            donations: Vec::new(),
        }
    }

    fn absorb(&mut self, record: &DonationRecord) {
        self.total_donated += record.amount;
        self.total_deductible += record.tax_benefit.deductible_amount;
        self.estimated_tax_saving += record.tax_benefit.tax_saving;
        self.donations.push(record.clone());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationLimit {
    pub can_donate: bool,
    pub current_year_total: f64,
    pub limit: f64,
    pub remaining_limit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonorStats {
    pub donor_id: String,
    pub kyc_verified: bool,
    pub verification_level: VerificationLevel,
    pub total_donated: f64,
    pub donation_count: usize,
    pub current_year_donations: f64,
    pub current_year_count: usize,
    pub preferred_ngos_count: usize,
    pub average_donation: f64,
    pub member_since: DateTime<Utc>,
    pub annual_limit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donor {
    pub donor_id: String,
    pub kyc_verified: bool,
    pub kyc_data: DonorKycData,
    pub donation_history: Vec<DonationRecord>,
    pub total_donated: f64,
    pub preferred_ngos: Vec<String>,
    pub tax_benefits: Vec<TaxBenefitSummary>,
    pub created_at: DateTime<Utc>,
    pub annual_donation_limit: f64,
}

impl Donor {
    pub fn new(donor_id: &str, documents: Vec<String>, annual_limit: f64) -> Self {
        let document_hash = if documents.is_empty() {
            String::new()
        } else {
            sha256_hex(documents.join(",").as_bytes())
        };
        Self {
            donor_id: donor_id.to_owned(),
            kyc_verified: false,
            kyc_data: DonorKycData {
                document_hash,
                verification_date: None,
                verification_authority: None,
                documents_submitted: documents,
                verification_level: VerificationLevel::None,
            },
            donation_history: Vec::new(),
            total_donated: 0.0,
            preferred_ngos: Vec::new(),
            tax_benefits: Vec::new(),
            created_at: Utc::now(),
            annual_donation_limit: annual_limit,
        }
    }

    /// Passing premium KYC raises the annual limit to `premium_limit`.
    pub fn verify_kyc(
        &mut self,
        authority_id: &str,
        level: VerificationLevel,
        premium_limit: f64,
    ) {
        let level = if level == VerificationLevel::None {
            VerificationLevel::Basic
        } else {
            level
        };
        self.kyc_verified = true;
        self.kyc_data.verification_date = Some(Utc::now());
        self.kyc_data.verification_authority = Some(authority_id.to_owned());
        self.kyc_data.verification_level = level;
        if level == VerificationLevel::Premium {
            self.annual_donation_limit = premium_limit;
        }
    }

    /// Sum the current calendar year's donations and decide whether
    /// `amount` still fits under the annual limit.
    pub fn check_donation_limit(&self, amount: f64) -> DonationLimit {
        let current_year = Utc::now().year();
        let current_year_total: f64 = self
            .donation_history
            .iter()
            .filter(|record| record.timestamp.year() == current_year)
            .map(|record| record.amount)
            .sum();

        DonationLimit {
            can_donate: current_year_total + amount <= self.annual_donation_limit,
            current_year_total,
            limit: self.annual_donation_limit,
            remaining_limit: self.annual_donation_limit - current_year_total,
        }
    }

    /// Append a donation to the history and roll it into the calendar-year
    /// tax-benefit summary. History is append-only.
    pub fn add_donation(&mut self, donation: &DonationTransaction) {
        let record = DonationRecord {
            transaction_id: donation.transaction_id.clone(),
            ngo_id: donation.ngo_id.clone(),
            amount: donation.amount,
            timestamp: donation.timestamp,
            e_bill: donation.e_bill.clone(),
            zk_proof: donation.zk_proof.clone(),
            tax_benefit: donation.e_bill.tax_benefit.clone(),
        };

        self.total_donated += record.amount;
        self.update_tax_benefits(&record);
        self.donation_history.push(record);
    }

    fn update_tax_benefits(&mut self, record: &DonationRecord) {
        let year = record.timestamp.year();
        if let Some(summary) = self.tax_benefits.iter_mut().find(|s| s.year == year) {
            summary.absorb(record);
        } else {
            let mut summary = TaxBenefitSummary::empty(year);
            summary.absorb(record);
            self.tax_benefits.push(summary);
        }
    }

    pub fn add_preferred_ngo(&mut self, ngo_id: &str) {
        if !self.preferred_ngos.iter().any(|id| id == ngo_id) {
            self.preferred_ngos.push(ngo_id.to_owned());
        }
    }

    pub fn remove_preferred_ngo(&mut self, ngo_id: &str) {
        self.preferred_ngos.retain(|id| id != ngo_id);
    }

    /// Most recent `limit` donations in history order; 0 means everything.
    pub fn donation_history(&self, limit: usize) -> &[DonationRecord] {
        if limit == 0 || limit >= self.donation_history.len() {
            return &self.donation_history;
        }
        let start = self.donation_history.len() - limit;
        &self.donation_history[start..]
    }

    /// Tax-benefit summary for a year; `None` means the current year. A
    /// year with no donations yields an empty summary.
    pub fn annual_tax_benefits(&self, year: Option<i32>) -> TaxBenefitSummary {
        let year = year.unwrap_or_else(|| Utc::now().year());
        self.tax_benefits
            .iter()
            .find(|summary| summary.year == year)
            .cloned()
            .unwrap_or_else(|| TaxBenefitSummary::empty(year))
    }

    pub fn donations_by_ngo(&self, ngo_id: &str) -> Vec<&DonationRecord> {
        self.donation_history
            .iter()
            .filter(|record| record.ngo_id == ngo_id)
            .collect()
    }

    pub fn donations_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<&DonationRecord> {
        self.donation_history
            .iter()
            .filter(|record| record.timestamp >= from && record.timestamp <= to)
            .collect()
    }

    /// Current-year totals keyed by month name.
    pub fn monthly_donation_summary(&self) -> HashMap<String, f64> {
        const MONTHS: [&str; 12] = [
            "January",
            "February",
            "March",
            "April",
            "May",
            "June",
            "July",
            "August",
            "September",
            "October",
            "November",
            "December",
        ];
        let mut summary: HashMap<String, f64> =
            MONTHS.iter().map(|m| (m.to_string(), 0.0)).collect();

        let current_year = Utc::now().year();
        for record in &self.donation_history {
            if record.timestamp.year() == current_year {
                let month = MONTHS[record.timestamp.month0() as usize];
                if let Some(total) = summary.get_mut(month) {
                    *total += record.amount;
                }
            }
        }
        summary
    }

    pub fn stats(&self) -> DonorStats {
        let current_year = Utc::now().year();
        let (current_year_donations, current_year_count) = self
            .donation_history
            .iter()
            .filter(|record| record.timestamp.year() == current_year)
            .fold((0.0, 0usize), |(sum, count), record| {
                (sum + record.amount, count + 1)
            });

        let average_donation = if self.donation_history.is_empty() {
            0.0
        } else {
            self.total_donated / self.donation_history.len() as f64
        };

        let verification_level = if self.kyc_verified {
            self.kyc_data.verification_level
        } else {
            VerificationLevel::None
        };

        DonorStats {
            donor_id: self.donor_id.clone(),
            kyc_verified: self.kyc_verified,
            verification_level,
            total_donated: self.total_donated,
            donation_count: self.donation_history.len(),
            current_year_donations,
            current_year_count,
            preferred_ngos_count: self.preferred_ngos.len(),
            average_donation,
            member_since: self.created_at,
            annual_limit: self.annual_donation_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_LIMIT: f64 = 1_000_000.0;
    const PREMIUM_LIMIT: f64 = 5_000_000.0;

    fn donor() -> Donor {
        Donor::new(
            "D1",
            vec!["aadhaar.pdf".to_string(), "pan.pdf".to_string()],
            DEFAULT_LIMIT,
        )
    }

    fn donation(amount: f64) -> DonationTransaction {
        DonationTransaction::new("D1", "NGO001", amount, "UPI", "kychash").unwrap()
    }

    #[test]
    fn documents_are_hashed_at_registration() {
        let donor = donor();
        assert_eq!(donor.kyc_data.document_hash.len(), 64);
        assert!(!donor.kyc_verified);
        assert_eq!(donor.kyc_data.verification_level, VerificationLevel::None);
    }

    #[test]
    fn premium_kyc_raises_annual_limit() {
        let mut donor = donor();
        donor.verify_kyc("GOV-AUTH", VerificationLevel::Basic, PREMIUM_LIMIT);
        assert_eq!(donor.annual_donation_limit, DEFAULT_LIMIT);

        donor.verify_kyc("GOV-AUTH", VerificationLevel::Premium, PREMIUM_LIMIT);
        assert_eq!(donor.annual_donation_limit, PREMIUM_LIMIT);
    }

    #[test]
    fn unspecified_level_defaults_to_basic() {
        let mut donor = donor();
        donor.verify_kyc("GOV-AUTH", VerificationLevel::None, PREMIUM_LIMIT);
        assert_eq!(donor.kyc_data.verification_level, VerificationLevel::Basic);
    }

    #[test]
    fn limit_check_sums_current_year_only() {
        let mut donor = donor();
        donor.add_donation(&donation(600_000.0));

        let check = donor.check_donation_limit(300_000.0);
        assert!(check.can_donate);
        assert_eq!(check.current_year_total, 600_000.0);
        assert_eq!(check.remaining_limit, 400_000.0);

        let over = donor.check_donation_limit(500_000.0);
        assert!(!over.can_donate);

        // A donation from a past year does not count against this year.
        donor.donation_history[0].timestamp =
            donor.donation_history[0].timestamp - chrono::Duration::days(400);
        let fresh = donor.check_donation_limit(900_000.0);
        assert!(fresh.can_donate);
        assert_eq!(fresh.current_year_total, 0.0);
    }

    #[test]
    fn history_and_tax_benefits_accumulate() {
        let mut donor = donor();
        donor.add_donation(&donation(50_000.0));
        donor.add_donation(&donation(4_000.0));

        assert_eq!(donor.donation_history.len(), 2);
        assert_eq!(donor.total_donated, 54_000.0);

        let benefits = donor.annual_tax_benefits(None);
        assert_eq!(benefits.total_donated, 54_000.0);
        // 10_000 cap applies per donation.
        assert_eq!(benefits.total_deductible, 14_000.0);
        assert_eq!(benefits.estimated_tax_saving, 4_200.0);
        assert_eq!(benefits.donations.len(), 2);

        let empty = donor.annual_tax_benefits(Some(1999));
        assert_eq!(empty.total_donated, 0.0);
        assert!(empty.donations.is_empty());
    }

    #[test]
    fn history_limit_returns_most_recent() {
        let mut donor = donor();
        for amount in [100.0, 200.0, 300.0] {
            donor.add_donation(&donation(amount));
        }
        let recent = donor.donation_history(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].amount, 200.0);
        assert_eq!(recent[1].amount, 300.0);
        assert_eq!(donor.donation_history(0).len(), 3);
    }

    #[test]
    fn preferred_ngos_are_a_set() {
        let mut donor = donor();
        donor.add_preferred_ngo("NGO001");
        donor.add_preferred_ngo("NGO001");
        donor.add_preferred_ngo("NGO002");
        assert_eq!(donor.preferred_ngos.len(), 2);
        donor.remove_preferred_ngo("NGO001");
        assert_eq!(donor.preferred_ngos, vec!["NGO002".to_string()]);
    }

    #[test]
    fn stats_aggregate_history() {
        let mut donor = donor();
        donor.add_donation(&donation(10_000.0));
        donor.add_donation(&donation(30_000.0));
        donor.add_preferred_ngo("NGO001");

        let stats = donor.stats();
        assert_eq!(stats.donation_count, 2);
        assert_eq!(stats.total_donated, 40_000.0);
        assert_eq!(stats.average_donation, 20_000.0);
        assert_eq!(stats.preferred_ngos_count, 1);
        assert_eq!(stats.current_year_count, 2);
    }

    #[test]
    fn monthly_summary_covers_all_months() {
        let mut donor = donor();
        donor.add_donation(&donation(5_000.0));
        let summary = donor.monthly_donation_summary();
        assert_eq!(summary.len(), 12);
        let total: f64 = summary.values().sum();
        assert_eq!(total, 5_000.0);
    }
}
