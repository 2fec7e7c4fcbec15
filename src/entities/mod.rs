//! Platform participants: NGOs, donors and auditors. Entities carry no
//! locks of their own; all mutation happens under the orchestrator's
//! write lock.

pub mod auditor;
pub mod donor;
pub mod ngo;

pub use auditor::{recommendation_for_score, AuditResult, Auditor, AuditorStats};
pub use donor::{
    DonationLimit, DonationRecord, Donor, DonorKycData, DonorStats, TaxBenefitSummary,
    VerificationLevel,
};
pub use ngo::{
    AdmissionReceipt, Certificate, ChainSummary, FinancialSummary, Ngo, NgoKycData, NgoSnapshot,
    RatingDetails,
};
