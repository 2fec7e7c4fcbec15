//! Cryptographic primitives for the transparency ledger.
//!
//! Everything here is deterministic SHA-256 arithmetic rendered as
//! lowercase hex. The proof stub and the multi-signature wallet simulate
//! their production counterparts with the same observable shape, so a real
//! deployment can swap in genuine primitives behind the same interfaces.

use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

pub mod multisig;
pub mod proof;

pub use multisig::{MultiSigError, MultiSigWallet, SignOutcome, SignerSignature, TransactionStatus};
pub use proof::DonationProof;

/// Hash data with SHA-256, rendered as lowercase hex (64 chars).
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Generate `n` cryptographically secure random bytes, hex encoded.
pub fn random_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Unix nanoseconds of a timestamp; saturates to 0 outside the
/// representable range (~year 2262).
pub(crate) fn unix_nanos(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_nanos_opt().unwrap_or_default()
}
