//! Per-NGO append-only chains.
//!
//! A chain is owned by exactly one NGO and holds either donations or
//! expenditures. All state lives behind a reader-writer lock: reads take
//! the read lock and return consistent snapshots, `append_block` holds the
//! write lock across linking, mining and validation.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::block::{Block, BlockType};
use super::payload::{BlockPayload, GenesisPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    Donation,
    Expenditure,
}

impl ChainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainType::Donation => "donation",
            ChainType::Expenditure => "expenditure",
        }
    }

    pub fn block_type(&self) -> BlockType {
        match self {
            ChainType::Donation => BlockType::Donation,
            ChainType::Expenditure => BlockType::Expenditure,
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The candidate was built against a parent that is no longer the tail.
    #[error("stale previous hash: expected {expected}, found {found}")]
    StaleParent { expected: String, found: String },
    #[error("block hash does not recompute")]
    HashMismatch,
    #[error("block does not satisfy the difficulty target")]
    InsufficientWork,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStats {
    pub total_blocks: usize,
    pub validated_blocks: usize,
    pub chain_type: ChainType,
    pub ngo_id: String,
    pub last_block_time: DateTime<Utc>,
    pub is_valid: bool,
}

/// Serializable image of a chain; round-trips bit-identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub ngo_id: String,
    pub chain_type: ChainType,
    pub difficulty: usize,
    pub blocks: Vec<Block>,
}

#[derive(Debug)]
pub(crate) struct ChainState {
    pub(crate) blocks: Vec<Block>,
    pub(crate) pending: Vec<Block>,
    pub(crate) nodes: Vec<String>,
}

#[derive(Debug)]
pub struct Chain {
    ngo_id: String,
    chain_type: ChainType,
    difficulty: usize,
    pub(crate) state: RwLock<ChainState>,
}

impl Chain {
    /// Construct with a validated genesis block. A difficulty below 1
    /// falls back to 2.
    pub fn new(ngo_id: &str, chain_type: ChainType, difficulty: usize) -> Self {
        let difficulty = if difficulty < 1 { 2 } else { difficulty };
        let genesis = Self::genesis_block(ngo_id, chain_type);
        Self {
            ngo_id: ngo_id.to_owned(),
            chain_type,
            difficulty,
            state: RwLock::new(ChainState {
                blocks: vec![genesis],
                pending: Vec::new(),
                nodes: Vec::new(),
            }),
        }
    }

    fn genesis_block(ngo_id: &str, chain_type: ChainType) -> Block {
        let payload = BlockPayload::Genesis(GenesisPayload {
            ngo_id: ngo_id.to_owned(),
            chain_type,
            message: format!("Genesis block for {chain_type} chain of NGO {ngo_id}"),
        });
        let mut genesis = Block::new(0, Utc::now(), payload, "0", BlockType::Genesis);
        genesis.validate();
        genesis.add_validator("system", "genesis_signature", "genesis");
        genesis
    }

    pub fn ngo_id(&self) -> &str {
        &self.ngo_id
    }

    pub fn chain_type(&self) -> ChainType {
        self.chain_type
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn len(&self) -> usize {
        self.state.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().blocks.is_empty()
    }

    pub fn latest_block(&self) -> Option<Block> {
        self.state.read().blocks.last().cloned()
    }

    /// Hash of the tail block; "0" on a chain with no blocks, matching the
    /// genesis sentinel.
    pub fn latest_hash(&self) -> String {
        self.state
            .read()
            .blocks
            .last()
            .map(|block| block.hash.clone())
            .unwrap_or_else(|| "0".to_owned())
    }

    /// Admit a candidate block.
    ///
    /// The candidate must name the current tail as its parent; a stale
    /// parent fails the append, which is what lets exactly one of several
    /// racers built against the same tail win. On success the block is
    /// assigned the next dense index, mined to the chain difficulty,
    /// re-validated and appended. The chain is untouched on any failure.
    pub fn append_block(&self, mut block: Block) -> Result<Block, ChainError> {
        let mut state = self.state.write();
        let tail_hash = state
            .blocks
            .last()
            .map(|tail| tail.hash.clone())
            .unwrap_or_else(|| "0".to_owned());

        if block.previous_hash != tail_hash {
            log::warn!(
                "rejecting block on {} {} chain: stale previous hash",
                self.ngo_id,
                self.chain_type
            );
            return Err(ChainError::StaleParent {
                expected: tail_hash,
                found: block.previous_hash,
            });
        }

        block.index = state.blocks.len() as u64;
        block.hash = block.compute_hash();
        block.mine(self.difficulty);

        if block.hash != block.compute_hash() {
            log::warn!("rejecting block on {} chain: hash mismatch", self.ngo_id);
            return Err(ChainError::HashMismatch);
        }
        if !block.meets_difficulty(self.difficulty) {
            log::warn!("rejecting block on {} chain: not mined", self.ngo_id);
            return Err(ChainError::InsufficientWork);
        }

        state.blocks.push(block.clone());
        Ok(block)
    }

    /// Check a candidate against the current tail without admitting it.
    pub fn validate_block(&self, block: &Block) -> bool {
        let state = self.state.read();
        let Some(tail) = state.blocks.last() else {
            return false;
        };
        block.previous_hash == tail.hash
            && block.hash == block.compute_hash()
            && block.meets_difficulty(self.difficulty)
    }

    /// Full-chain integrity: every non-genesis block must recompute its
    /// hash, be validated, link to its predecessor and sit at its dense
    /// index.
    pub fn is_valid(&self) -> bool {
        Self::blocks_are_valid(&self.state.read().blocks)
    }

    fn blocks_are_valid(blocks: &[Block]) -> bool {
        for i in 1..blocks.len() {
            let current = &blocks[i];
            if !current.is_valid() {
                log::warn!("block {i} is invalid");
                return false;
            }
            if current.previous_hash != blocks[i - 1].hash {
                log::warn!("block {i} has invalid previous hash");
                return false;
            }
            if current.index != i as u64 {
                log::warn!("block {i} has non-dense index {}", current.index);
                return false;
            }
        }
        true
    }

    /// Linear scan; chains stay small per NGO.
    pub fn block_by_hash(&self, hash: &str) -> Option<Block> {
        self.state
            .read()
            .blocks
            .iter()
            .find(|block| block.hash == hash)
            .cloned()
    }

    pub fn block_by_index(&self, index: usize) -> Option<Block> {
        self.state.read().blocks.get(index).cloned()
    }

    /// Inclusive on both ends.
    pub fn blocks_by_date_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Block> {
        self.state
            .read()
            .blocks
            .iter()
            .filter(|block| block.timestamp >= from && block.timestamp <= to)
            .cloned()
            .collect()
    }

    /// Clamped to the chain bounds; an inverted range is empty.
    pub fn block_range(&self, start: usize, end: usize) -> Vec<Block> {
        let state = self.state.read();
        if state.blocks.is_empty() {
            return Vec::new();
        }
        let end = end.min(state.blocks.len() - 1);
        if start > end {
            return Vec::new();
        }
        state.blocks[start..=end].to_vec()
    }

    /// The last `min(count, len)` blocks in chain order.
    pub fn recent_blocks(&self, count: usize) -> Vec<Block> {
        let state = self.state.read();
        let len = state.blocks.len();
        let start = len.saturating_sub(count);
        state.blocks[start..].to_vec()
    }

    pub fn stats(&self) -> ChainStats {
        let state = self.state.read();
        let validated_blocks = state.blocks.iter().filter(|b| b.validated).count();
        let last_block_time = state
            .blocks
            .iter()
            .map(|b| b.timestamp)
            .max()
            .unwrap_or_else(Utc::now);
        ChainStats {
            total_blocks: state.blocks.len(),
            validated_blocks,
            chain_type: self.chain_type,
            ngo_id: self.ngo_id.clone(),
            last_block_time,
            is_valid: Self::blocks_are_valid(&state.blocks),
        }
    }

    pub fn add_network_node(&self, address: &str) {
        let mut state = self.state.write();
        if !state.nodes.iter().any(|node| node == address) {
            state.nodes.push(address.to_owned());
        }
    }

    pub fn remove_network_node(&self, address: &str) {
        self.state.write().nodes.retain(|node| node != address);
    }

    pub fn network_nodes(&self) -> Vec<String> {
        self.state.read().nodes.clone()
    }

    pub fn add_pending_block(&self, block: Block) {
        self.state.write().pending.push(block);
    }

    pub fn pending_blocks(&self) -> Vec<Block> {
        self.state.read().pending.clone()
    }

    pub fn clear_pending_blocks(&self) {
        self.state.write().pending.clear();
    }

    pub fn to_snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            ngo_id: self.ngo_id.clone(),
            chain_type: self.chain_type,
            difficulty: self.difficulty,
            blocks: self.state.read().blocks.clone(),
        }
    }

    pub fn from_snapshot(snapshot: ChainSnapshot) -> Self {
        Self {
            ngo_id: snapshot.ngo_id,
            chain_type: snapshot.chain_type,
            difficulty: snapshot.difficulty,
            state: RwLock::new(ChainState {
                blocks: snapshot.blocks,
                pending: Vec::new(),
                nodes: Vec::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_block(chain: &Chain) -> Block {
        let payload = BlockPayload::Genesis(GenesisPayload {
            ngo_id: chain.ngo_id().to_owned(),
            chain_type: chain.chain_type(),
            message: "entry".to_string(),
        });
        let mut block = Block::new(
            chain.len() as u64,
            Utc::now(),
            payload,
            chain.latest_hash(),
            chain.chain_type().block_type(),
        );
        block.validate();
        block
    }

    #[test]
    fn construction_creates_validated_genesis() {
        let chain = Chain::new("NGO001", ChainType::Donation, 2);
        assert_eq!(chain.len(), 1);
        let genesis = chain.block_by_index(0).unwrap();
        assert_eq!(genesis.previous_hash, "0");
        assert!(genesis.is_valid());
        assert_eq!(genesis.validators_by_type("genesis").len(), 1);
    }

    #[test]
    fn difficulty_below_one_falls_back() {
        let chain = Chain::new("NGO001", ChainType::Donation, 0);
        assert_eq!(chain.difficulty(), 2);
    }

    #[test]
    fn append_links_mines_and_indexes() {
        let chain = Chain::new("NGO001", ChainType::Donation, 2);
        let appended = chain.append_block(test_block(&chain)).unwrap();
        assert_eq!(appended.index, 1);
        assert!(appended.hash.starts_with("00"));
        assert_eq!(chain.len(), 2);
        assert!(chain.is_valid());

        let again = chain.append_block(test_block(&chain)).unwrap();
        assert_eq!(again.index, 2);
        assert_eq!(again.previous_hash, chain.block_by_index(1).unwrap().hash);
    }

    #[test]
    fn stale_parent_is_rejected_and_chain_untouched() {
        let chain = Chain::new("NGO001", ChainType::Donation, 2);
        let first = test_block(&chain);
        let second = test_block(&chain); // same parent as `first`
        chain.append_block(first).unwrap();

        let err = chain.append_block(second).unwrap_err();
        assert!(matches!(err, ChainError::StaleParent { .. }));
        assert_eq!(chain.len(), 2);
        assert!(chain.is_valid());
    }

    #[test]
    fn tampered_payload_breaks_chain_validity() {
        let chain = Chain::new("NGO001", ChainType::Donation, 2);
        for _ in 0..3 {
            chain.append_block(test_block(&chain)).unwrap();
        }
        assert!(chain.is_valid());

        chain.state.write().blocks[2].payload = BlockPayload::Genesis(GenesisPayload {
            ngo_id: "hacker".to_string(),
            chain_type: ChainType::Donation,
            message: "tampered".to_string(),
        });
        assert!(!chain.is_valid());
    }

    #[test]
    fn broken_linkage_breaks_chain_validity() {
        let chain = Chain::new("NGO001", ChainType::Donation, 2);
        chain.append_block(test_block(&chain)).unwrap();
        chain.append_block(test_block(&chain)).unwrap();

        chain.state.write().blocks[2].previous_hash = "f".repeat(64);
        assert!(!chain.is_valid());
    }

    #[test]
    fn date_range_is_inclusive() {
        let chain = Chain::new("NGO001", ChainType::Donation, 1);
        chain.append_block(test_block(&chain)).unwrap();
        let appended = chain.block_by_index(1).unwrap();

        let hits = chain.blocks_by_date_range(appended.timestamp, appended.timestamp);
        assert!(hits.iter().any(|b| b.hash == appended.hash));

        let misses = chain.blocks_by_date_range(
            appended.timestamp + Duration::seconds(1),
            appended.timestamp + Duration::seconds(2),
        );
        assert!(misses.is_empty());
    }

    #[test]
    fn recent_blocks_clamps_to_length() {
        let chain = Chain::new("NGO001", ChainType::Donation, 1);
        chain.append_block(test_block(&chain)).unwrap();
        assert_eq!(chain.recent_blocks(10).len(), 2);
        assert_eq!(chain.recent_blocks(1).len(), 1);
        assert_eq!(chain.recent_blocks(1)[0].index, 1);
    }

    #[test]
    fn stats_reflect_chain_contents() {
        let chain = Chain::new("NGO001", ChainType::Expenditure, 1);
        chain.append_block(test_block(&chain)).unwrap();
        let stats = chain.stats();
        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.validated_blocks, 2);
        assert_eq!(stats.chain_type, ChainType::Expenditure);
        assert!(stats.is_valid);
    }

    #[test]
    fn snapshot_round_trips_bit_identically() {
        let chain = Chain::new("NGO001", ChainType::Donation, 1);
        chain.append_block(test_block(&chain)).unwrap();

        let snapshot = chain.to_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: ChainSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, restored);

        let rebuilt = Chain::from_snapshot(restored);
        assert!(rebuilt.is_valid());
        assert_eq!(rebuilt.latest_hash(), chain.latest_hash());
    }

    #[test]
    fn network_nodes_and_pending_queue() {
        let chain = Chain::new("NGO001", ChainType::Donation, 2);
        chain.add_network_node("node-a");
        chain.add_network_node("node-a");
        chain.add_network_node("node-b");
        assert_eq!(chain.network_nodes().len(), 2);
        chain.remove_network_node("node-a");
        assert_eq!(chain.network_nodes(), vec!["node-b".to_string()]);

        chain.add_pending_block(test_block(&chain));
        assert_eq!(chain.pending_blocks().len(), 1);
        chain.clear_pending_blocks();
        assert!(chain.pending_blocks().is_empty());
    }
}
