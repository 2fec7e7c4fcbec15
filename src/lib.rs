//! Transparency ledger for charitable donations and expenditures.
//!
//! Each participating NGO owns two append-only, proof-of-work-mined
//! chains, one for incoming donations and one for outgoing expenditures,
//! whose block hashes are notarized on a public chain through a pluggable
//! anchor service. Donors, NGOs and auditors are first-class participants;
//! all three pass KYC before their transactions enter a chain. The
//! [`platform::Platform`] orchestrator serializes registration, KYC,
//! donation admission, auditor validation of expenditures, block mining,
//! anchoring, rating recomputation and statistics aggregation.
//!
//! The crate is a library surface, not a wire protocol: HTTP servers,
//! authentication, storage bindings and dashboards are external
//! collaborators built on top of the orchestrator operations.

pub mod anchor;
pub mod config;
pub mod crypto;
pub mod entities;
pub mod error;
pub mod ledger;
pub mod platform;
pub mod transactions;

pub use anchor::{
    AnchorReceipt, AnchorService, AnchorVerification, NetworkStats, SimulatedAnchor,
};
pub use config::PlatformConfig;
pub use crypto::{DonationProof, MultiSigWallet};
pub use entities::{
    AuditResult, Auditor, AuditorStats, Certificate, Donor, DonorStats, Ngo, NgoSnapshot,
    RatingDetails, VerificationLevel,
};
pub use error::{Error, Result};
pub use ledger::{Block, BlockPayload, BlockType, Chain, ChainSnapshot, ChainType};
pub use platform::{
    DonationOutcome, ExpenditureOutcome, ExpenditureRequest, NgoRating, Platform, PlatformStats,
};
pub use transactions::{
    Attachment, DonationTransaction, EBill, ExpenditureTransaction, InvoiceDetails, TaxBenefit,
};
