//! The per-NGO double-chain ledger: proof-of-work blocks, tagged payloads
//! and thread-safe append-only chains.

pub mod block;
pub mod chain;
pub mod payload;

pub use block::{Block, BlockInfo, BlockType, Validator};
pub use chain::{Chain, ChainError, ChainSnapshot, ChainStats, ChainType};
pub use payload::{
    AttachmentRef, BlockPayload, DonationPayload, ExpenditurePayload, GenesisPayload,
};
