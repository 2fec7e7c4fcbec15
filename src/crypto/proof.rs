//! Donation proof stubs for donor anonymity.
//!
//! This is a commitment scheme, not a real zero-knowledge proof. It is
//! sufficient to enforce three properties on-chain: the donor identity is
//! never part of the public payload, a replay across two chains is
//! distinguishable through the nullifier, and a stale proof is rejected.
//! A production deployment substitutes a real proving system (Groth16,
//! Plonk) behind the same generate/verify surface.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{sha256_hex, unix_nanos};

static HEX64: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-f0-9]{64}$").expect("valid pattern"));

/// Commitment triple binding a donation to its donor without revealing
/// the donor identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationProof {
    /// `H(donor_id ∥ amount ∥ timestamp-nanos)`
    pub commitment: String,
    /// `H(commitment ∥ donor_id)` — distinguishes replays.
    pub nullifier: String,
    /// `H(commitment ∥ nullifier ∥ now-nanos)`
    pub proof: String,
    pub timestamp: DateTime<Utc>,
}

impl DonationProof {
    /// Derive the proof triple from the donation parameters. The amount is
    /// rendered with two decimals so the commitment is reproducible across
    /// serializations of the same value.
    pub fn generate(donor_id: &str, amount: f64, timestamp: DateTime<Utc>) -> Self {
        let commitment = sha256_hex(
            format!("{}{:.2}{}", donor_id, amount, unix_nanos(timestamp)).as_bytes(),
        );
        let nullifier = sha256_hex(format!("{commitment}{donor_id}").as_bytes());
        let proof = sha256_hex(
            format!("{commitment}{nullifier}{}", unix_nanos(Utc::now())).as_bytes(),
        );
        Self {
            commitment,
            nullifier,
            proof,
            timestamp,
        }
    }

    /// A proof verifies iff all three digests are well-formed 64-char
    /// lowercase hex and the proof is at most 24 hours old.
    pub fn verify(&self) -> bool {
        let age = Utc::now().signed_duration_since(self.timestamp);
        if age.num_seconds().abs() > 24 * 3600 {
            return false;
        }
        HEX64.is_match(&self.commitment)
            && HEX64.is_match(&self.nullifier)
            && HEX64.is_match(&self.proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fresh_proof_verifies() {
        let proof = DonationProof::generate("D1", 49500.0, Utc::now());
        assert!(proof.verify());
        assert_eq!(proof.commitment.len(), 64);
        assert_eq!(proof.nullifier.len(), 64);
        assert_eq!(proof.proof.len(), 64);
    }

    #[test]
    fn nullifier_binds_donor_to_commitment() {
        let now = Utc::now();
        let a = DonationProof::generate("D1", 100.0, now);
        let b = DonationProof::generate("D2", 100.0, now);
        assert_ne!(a.commitment, b.commitment);
        assert_ne!(a.nullifier, b.nullifier);
    }

    #[test]
    fn stale_proof_is_rejected() {
        let mut proof = DonationProof::generate("D1", 100.0, Utc::now());
        proof.timestamp = Utc::now() - Duration::hours(25);
        assert!(!proof.verify());
    }

    #[test]
    fn malformed_digest_is_rejected() {
        let mut proof = DonationProof::generate("D1", 100.0, Utc::now());
        proof.commitment = proof.commitment.to_uppercase();
        assert!(!proof.verify());

        let mut truncated = DonationProof::generate("D1", 100.0, Utc::now());
        truncated.proof.truncate(40);
        assert!(!truncated.verify());
    }
}
