//! Multi-signature wallet for NGO disbursement policy.
//!
//! Pending transactions accumulate signatures from an authorized signer
//! set and execute exactly once when the threshold is reached. The
//! donation and expenditure pipelines do not route through the wallet; it
//! is exposed so an implementation can adopt multisig admission without
//! rearchitecting.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::random_hex;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MultiSigError {
    #[error("transaction not found")]
    UnknownTransaction,
    #[error("transaction already executed")]
    AlreadyExecuted,
    #[error("unauthorized signer")]
    UnauthorizedSigner,
    #[error("already signed by this signer")]
    AlreadySigned,
}

/// A single signature collected on a pending transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerSignature {
    pub signer: String,
    pub signature: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub data: Value,
    pub signatures: Vec<SignerSignature>,
    pub executed: bool,
    pub timestamp: DateTime<Utc>,
    pub creator: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub tx_id: String,
    pub executed: bool,
    pub signatures_count: usize,
    pub required_signatures: usize,
    pub signatures: Vec<SignerSignature>,
}

/// Result of a successful signing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignOutcome {
    pub executed: bool,
    pub signatures_count: usize,
}

#[derive(Debug, Default)]
struct WalletState {
    signers: Vec<String>,
    pending: HashMap<String, PendingTransaction>,
    executed: usize,
}

#[derive(Debug)]
pub struct MultiSigWallet {
    required_signatures: usize,
    state: RwLock<WalletState>,
}

impl MultiSigWallet {
    /// A threshold below 1 falls back to requiring two signatures.
    pub fn new(required_signatures: usize) -> Self {
        let required = if required_signatures < 1 {
            2
        } else {
            required_signatures
        };
        Self {
            required_signatures: required,
            state: RwLock::new(WalletState::default()),
        }
    }

    pub fn required_signatures(&self) -> usize {
        self.required_signatures
    }

    /// Idempotent: adding a known signer is a no-op.
    pub fn add_signer(&self, address: &str) {
        let mut state = self.state.write();
        if !state.signers.iter().any(|s| s == address) {
            state.signers.push(address.to_owned());
        }
    }

    pub fn remove_signer(&self, address: &str) {
        self.state.write().signers.retain(|s| s != address);
    }

    pub fn signers(&self) -> Vec<String> {
        self.state.read().signers.clone()
    }

    /// Create a pending transaction and return its 128-bit random id. A
    /// `creator` key in the data, when present, is recorded on the entry.
    pub fn create_transaction(&self, data: Value) -> String {
        let tx_id = random_hex(16);
        let creator = data
            .get("creator")
            .and_then(Value::as_str)
            .map(str::to_owned);
        self.state.write().pending.insert(
            tx_id.clone(),
            PendingTransaction {
                data,
                signatures: Vec::new(),
                executed: false,
                timestamp: Utc::now(),
                creator,
            },
        );
        tx_id
    }

    /// Add one signature. Execution flips exactly once, when the signature
    /// count reaches the threshold.
    pub fn sign_transaction(
        &self,
        tx_id: &str,
        signer: &str,
        signature: &str,
    ) -> Result<SignOutcome, MultiSigError> {
        let mut state = self.state.write();
        let authorized = state.signers.iter().any(|s| s == signer);

        let required = self.required_signatures;
        let tx = state
            .pending
            .get_mut(tx_id)
            .ok_or(MultiSigError::UnknownTransaction)?;
        if tx.executed {
            return Err(MultiSigError::AlreadyExecuted);
        }
        if !authorized {
            return Err(MultiSigError::UnauthorizedSigner);
        }
        if tx.signatures.iter().any(|s| s.signer == signer) {
            return Err(MultiSigError::AlreadySigned);
        }

        tx.signatures.push(SignerSignature {
            signer: signer.to_owned(),
            signature: signature.to_owned(),
            timestamp: Utc::now(),
        });

        let count = tx.signatures.len();
        let executed = count >= required;
        if executed {
            tx.executed = true;
            state.executed += 1;
        }
        Ok(SignOutcome {
            executed,
            signatures_count: count,
        })
    }

    pub fn transaction_status(&self, tx_id: &str) -> Option<TransactionStatus> {
        let state = self.state.read();
        state.pending.get(tx_id).map(|tx| TransactionStatus {
            tx_id: tx_id.to_owned(),
            executed: tx.executed,
            signatures_count: tx.signatures.len(),
            required_signatures: self.required_signatures,
            signatures: tx.signatures.clone(),
        })
    }

    /// Number of transactions still waiting for signatures.
    pub fn pending_count(&self) -> usize {
        self.state
            .read()
            .pending
            .values()
            .filter(|tx| !tx.executed)
            .count()
    }

    pub fn executed_count(&self) -> usize {
        self.state.read().executed
    }
}
