//! Proof-of-work blocks.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{sha256_hex, unix_nanos};

use super::payload::BlockPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Genesis,
    Donation,
    Expenditure,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Genesis => "genesis",
            BlockType::Donation => "donation",
            BlockType::Expenditure => "expenditure",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validator endorsement attached to a block. Validators do not enter
/// the block hash; they are audit metadata, not consensus input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    pub validator_id: String,
    pub signature: String,
    pub validation_type: String,
    pub timestamp: DateTime<Utc>,
}

/// A single immutable entry in a chain.
///
/// `hash = H(index ∥ prev_hash ∥ timestamp ∥ payload ∥ nonce ∥ block_type ∥
/// merkle_root)`, so any payload mutation after admission invalidates the
/// block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: BlockPayload,
    pub previous_hash: String,
    pub block_type: BlockType,
    pub hash: String,
    pub nonce: u64,
    pub validated: bool,
    pub validators: Vec<Validator>,
    pub merkle_root: String,
}

impl Block {
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        payload: BlockPayload,
        previous_hash: impl Into<String>,
        block_type: BlockType,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            payload,
            previous_hash: previous_hash.into(),
            block_type,
            hash: String::new(),
            nonce: 0,
            validated: false,
            validators: Vec::new(),
            merkle_root: String::new(),
        };
        block.merkle_root = block.compute_merkle_root();
        block.hash = block.compute_hash();
        block
    }

    pub fn compute_hash(&self) -> String {
        let record = format!(
            "{}{}{}{}{}{}{}",
            self.index,
            self.previous_hash,
            unix_nanos(self.timestamp),
            self.payload.canonical_json(),
            self.nonce,
            self.block_type,
            self.merkle_root,
        );
        sha256_hex(record.as_bytes())
    }

    fn compute_merkle_root(&self) -> String {
        sha256_hex(self.payload.canonical_json().as_bytes())
    }

    /// Increment the nonce until the hash carries `difficulty` leading '0'
    /// hex chars. Unbounded by design; difficulty 2 terminates sub-second.
    pub fn mine(&mut self, difficulty: usize) {
        let target = "0".repeat(difficulty);
        while !self.hash.starts_with(&target) {
            self.nonce += 1;
            self.hash = self.compute_hash();
        }
        log::debug!("block mined: {}", self.hash);
    }

    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.hash.starts_with(&"0".repeat(difficulty))
    }

    /// An empty validation type defaults to "general".
    pub fn add_validator(&mut self, validator_id: &str, signature: &str, validation_type: &str) {
        let validation_type = if validation_type.is_empty() {
            "general"
        } else {
            validation_type
        };
        self.validators.push(Validator {
            validator_id: validator_id.to_owned(),
            signature: signature.to_owned(),
            validation_type: validation_type.to_owned(),
            timestamp: Utc::now(),
        });
    }

    pub fn validate(&mut self) {
        self.validated = true;
    }

    /// Valid iff the stored hash still recomputes and the block was marked
    /// validated at admission.
    pub fn is_valid(&self) -> bool {
        self.hash == self.compute_hash() && self.validated
    }

    pub fn validators_by_type(&self, validation_type: &str) -> Vec<&Validator> {
        self.validators
            .iter()
            .filter(|v| v.validation_type == validation_type)
            .collect()
    }

    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    /// Lightweight summary of the block, without the payload.
    pub fn block_info(&self) -> BlockInfo {
        BlockInfo {
            index: self.index,
            timestamp: self.timestamp,
            hash: self.hash.clone(),
            previous_hash: self.previous_hash.clone(),
            block_type: self.block_type,
            validated: self.validated,
            validator_count: self.validators.len(),
            nonce: self.nonce,
            merkle_root: self.merkle_root.clone(),
        }
    }
}

/// Summary view of a block for listings and status endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub hash: String,
    pub previous_hash: String,
    pub block_type: BlockType,
    pub validated: bool,
    pub validator_count: usize,
    pub nonce: u64,
    pub merkle_root: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::chain::ChainType;
    use crate::ledger::payload::GenesisPayload;

    fn test_payload() -> BlockPayload {
        BlockPayload::Genesis(GenesisPayload {
            ngo_id: "NGO001".to_string(),
            chain_type: ChainType::Donation,
            message: "test".to_string(),
        })
    }

    #[test]
    fn mining_satisfies_difficulty_prefix() {
        let mut block = Block::new(1, Utc::now(), test_payload(), "abc", BlockType::Donation);
        block.mine(2);
        assert!(block.hash.starts_with("00"));
        assert!(block.meets_difficulty(2));
        assert_eq!(block.hash, block.compute_hash());
    }

    #[test]
    fn validity_requires_both_hash_and_validation() {
        let mut block = Block::new(0, Utc::now(), test_payload(), "0", BlockType::Genesis);
        assert!(!block.is_valid());
        block.validate();
        assert!(block.is_valid());
    }

    #[test]
    fn payload_mutation_invalidates() {
        let mut block = Block::new(0, Utc::now(), test_payload(), "0", BlockType::Genesis);
        block.validate();
        assert!(block.is_valid());

        block.payload = BlockPayload::Genesis(GenesisPayload {
            ngo_id: "NGO999".to_string(),
            chain_type: ChainType::Donation,
            message: "tampered".to_string(),
        });
        assert!(!block.is_valid());
    }

    #[test]
    fn nonce_and_linkage_feed_the_hash() {
        let block = Block::new(3, Utc::now(), test_payload(), "parent", BlockType::Donation);
        let mut renumbered = block.clone();
        renumbered.index = 4;
        assert_ne!(block.compute_hash(), renumbered.compute_hash());

        let mut relinked = block.clone();
        relinked.previous_hash = "other".to_string();
        assert_ne!(block.compute_hash(), relinked.compute_hash());

        let mut bumped = block;
        bumped.nonce += 1;
        assert_ne!(bumped.hash, bumped.compute_hash());
    }

    #[test]
    fn validators_are_typed_and_defaulted() {
        let mut block = Block::new(0, Utc::now(), test_payload(), "0", BlockType::Genesis);
        block.add_validator("auditor1", "sig1", "auditor");
        block.add_validator("system", "sig2", "");
        assert_eq!(block.validator_count(), 2);
        assert_eq!(block.validators_by_type("auditor").len(), 1);
        assert_eq!(block.validators_by_type("general").len(), 1);
    }

    #[test]
    fn block_info_mirrors_the_block() {
        let mut block = Block::new(7, Utc::now(), test_payload(), "parent", BlockType::Donation);
        block.validate();
        block.add_validator("auditor1", "sig1", "auditor");
        block.mine(1);

        let info = block.block_info();
        assert_eq!(info.index, 7);
        assert_eq!(info.hash, block.hash);
        assert_eq!(info.previous_hash, "parent");
        assert_eq!(info.block_type, BlockType::Donation);
        assert!(info.validated);
        assert_eq!(info.validator_count, 1);
        assert_eq!(info.nonce, block.nonce);
        assert_eq!(info.merkle_root, block.merkle_root);
    }
}
