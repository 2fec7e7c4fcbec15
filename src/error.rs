//! Platform error taxonomy.
//!
//! Every failure surfaced by the orchestrator entry points is one of these
//! kinds. Callers can distinguish retryable conditions (a lost append race,
//! a failed anchor submission) from terminal ones (a bad e-bill never
//! becomes valid by retrying).

use thiserror::Error;

use crate::ledger::ChainError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} already registered")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("{entity} {id} is not verified")]
    NotVerified { entity: &'static str, id: String },

    #[error("donation exceeds annual limit, remaining {remaining:.2}")]
    LimitExceeded { remaining: f64 },

    #[error("amount must be positive, got {0}")]
    InvalidAmount(f64),

    #[error("invalid e-bill signature")]
    InvalidEBill,

    #[error("invalid donation proof")]
    InvalidProof,

    #[error("invalid GSTIN format: {0}")]
    InvalidGstin(String),

    #[error("compliance score {score:.1}% below required minimum {minimum:.0}%")]
    ComplianceTooLow { score: f64, minimum: f64 },

    #[error("transaction {0} already reached a terminal state")]
    TransactionFinalized(String),

    #[error("expenditure rejected by auditor: {0}")]
    AuditRejected(String),

    #[error("chain append failed: {0}")]
    ChainAppendFailed(#[from] ChainError),

    #[error("anchoring failed: {0}")]
    AnchorFailed(String),
}

impl Error {
    /// Whether the caller may reasonably retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ChainAppendFailed(_) | Error::AnchorFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
