//! Public-chain anchoring: content-addressable notarization of local
//! block hashes.
//!
//! [`AnchorService`] is the pluggable seam; [`SimulatedAnchor`] stands in
//! for a real driver by simulating submission latency and receipt fields.
//! A production implementation substitutes real transaction submission and
//! receipt polling behind the same interface.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::config::PlatformConfig;
use crate::crypto::{random_hex, sha256_hex};
use crate::error::Result;
use crate::ledger::ChainType;

/// Receipt binding a local block hash to a (simulated) public-chain
/// transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub tx_hash: String,
    pub data_hash: String,
    pub timestamp: DateTime<Utc>,
    pub block_number: u64,
    pub gas_used: u64,
    pub confirmations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorVerification {
    pub exists: bool,
    pub verified: bool,
    pub block_number: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub tx_hash: Option<String>,
    pub confirmations: Option<u32>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStats {
    pub network: String,
    pub chain_id: u64,
    pub gas_price: String,
    pub current_block: u64,
    pub wallet_address: String,
    pub contract_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorStatistics {
    pub total_anchors: usize,
    pub total_gas_used: u64,
    pub average_gas_used: u64,
    pub earliest_anchor: Option<DateTime<Utc>>,
    pub latest_anchor: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchoredBlock {
    pub block_hash: String,
    pub receipt: AnchorReceipt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasEstimate {
    pub estimated_gas: u64,
    pub gas_price_gwei: u64,
    pub estimated_cost_wei: u64,
}

/// The anchoring seam. Implementations must accept any hex string as a
/// block hash and keep at most one anchor per local hash.
pub trait AnchorService: Send + Sync {
    fn anchor_block_hash(
        &self,
        block_hash: &str,
        ngo_id: &str,
        chain_type: ChainType,
        extra: Map<String, Value>,
    ) -> Result<AnchorReceipt>;

    fn verify(&self, block_hash: &str) -> AnchorVerification;

    fn network_stats(&self) -> NetworkStats;
}

/// In-process stand-in for a public-chain driver. Anchors live in a map
/// keyed by local block hash; re-anchoring a hash overwrites the previous
/// receipt.
#[derive(Debug)]
pub struct SimulatedAnchor {
    provider_url: String,
    wallet_address: String,
    contract_address: Option<String>,
    gas_limit: u64,
    gas_price_gwei: u64,
    anchors: RwLock<HashMap<String, AnchorReceipt>>,
}

impl SimulatedAnchor {
    pub fn new(provider_url: &str, private_key: &str, gas_limit: u64, gas_price_gwei: u64) -> Self {
        let gas_limit = if gas_limit == 0 { 300_000 } else { gas_limit };
        Self {
            provider_url: provider_url.to_owned(),
            wallet_address: derive_wallet_address(private_key),
            contract_address: None,
            gas_limit,
            gas_price_gwei,
            anchors: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &PlatformConfig) -> Self {
        Self::new(
            &config.provider_url,
            &config.anchor_private_key,
            config.gas_limit,
            config.gas_price_gwei,
        )
    }

    pub fn provider_url(&self) -> &str {
        &self.provider_url
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.read().len()
    }

    /// All anchors, most recent first.
    pub fn history(&self) -> Vec<AnchoredBlock> {
        let mut entries: Vec<AnchoredBlock> = self
            .anchors
            .read()
            .iter()
            .map(|(block_hash, receipt)| AnchoredBlock {
                block_hash: block_hash.clone(),
                receipt: receipt.clone(),
            })
            .collect();
        entries.sort_by(|a, b| b.receipt.timestamp.cmp(&a.receipt.timestamp));
        entries
    }

    /// Inclusive on both ends.
    pub fn anchors_by_time_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<AnchorReceipt> {
        self.anchors
            .read()
            .values()
            .filter(|receipt| receipt.timestamp >= from && receipt.timestamp <= to)
            .cloned()
            .collect()
    }

    pub fn statistics(&self) -> AnchorStatistics {
        let anchors = self.anchors.read();
        if anchors.is_empty() {
            return AnchorStatistics {
                total_anchors: 0,
                total_gas_used: 0,
                average_gas_used: 0,
                earliest_anchor: None,
                latest_anchor: None,
            };
        }

        let total_gas_used: u64 = anchors.values().map(|receipt| receipt.gas_used).sum();
        let earliest = anchors.values().map(|receipt| receipt.timestamp).min();
        let latest = anchors.values().map(|receipt| receipt.timestamp).max();

        AnchorStatistics {
            total_anchors: anchors.len(),
            total_gas_used,
            average_gas_used: total_gas_used / anchors.len() as u64,
            earliest_anchor: earliest,
            latest_anchor: latest,
        }
    }

    pub fn estimate_gas_cost(&self) -> GasEstimate {
        let estimated_gas = 21_000 + 10_000;
        GasEstimate {
            estimated_gas,
            gas_price_gwei: self.gas_price_gwei,
            estimated_cost_wei: estimated_gas * self.gas_price_gwei,
        }
    }
}

impl AnchorService for SimulatedAnchor {
    fn anchor_block_hash(
        &self,
        block_hash: &str,
        ngo_id: &str,
        chain_type: ChainType,
        extra: Map<String, Value>,
    ) -> Result<AnchorReceipt> {
        // serde_json's Map is key-sorted, so the payload is canonical
        // regardless of insertion order.
        let mut payload = Map::new();
        payload.insert("block_hash".to_string(), Value::from(block_hash));
        payload.insert("ngo_id".to_string(), Value::from(ngo_id));
        payload.insert("chain_type".to_string(), Value::from(chain_type.as_str()));
        payload.insert(
            "timestamp".to_string(),
            Value::from(Utc::now().timestamp()),
        );
        for (key, value) in extra {
            payload.insert(key, value);
        }
        let canonical = serde_json::to_string(&Value::Object(payload)).unwrap_or_default();
        let data_hash = sha256_hex(canonical.as_bytes());

        // Simulated submission delay.
        thread::sleep(Duration::from_millis(200));

        let (block_number, gas_used) = {
            let mut rng = rand::thread_rng();
            (
                50_000_000 + rng.gen_range(0..1_000_000),
                21_000 + rng.gen_range(0..50_000),
            )
        };
        let receipt = AnchorReceipt {
            tx_hash: format!("0x{}", random_hex(32)),
            data_hash,
            timestamp: Utc::now(),
            block_number,
            gas_used,
            confirmations: 12,
        };

        self.anchors
            .write()
            .insert(block_hash.to_owned(), receipt.clone());
        log::info!("anchored block {} as {}", block_hash, receipt.tx_hash);
        Ok(receipt)
    }

    fn verify(&self, block_hash: &str) -> AnchorVerification {
        thread::sleep(Duration::from_millis(100));

        match self.anchors.read().get(block_hash) {
            Some(receipt) => AnchorVerification {
                exists: true,
                verified: true,
                block_number: Some(receipt.block_number),
                timestamp: Some(receipt.timestamp),
                tx_hash: Some(receipt.tx_hash.clone()),
                confirmations: Some(receipt.confirmations),
                message: None,
            },
            None => AnchorVerification {
                exists: false,
                verified: false,
                block_number: None,
                timestamp: None,
                tx_hash: None,
                confirmations: None,
                message: Some("Block hash not found in anchored data".to_string()),
            },
        }
    }

    fn network_stats(&self) -> NetworkStats {
        thread::sleep(Duration::from_millis(50));

        NetworkStats {
            network: "Polygon Mumbai Testnet".to_string(),
            chain_id: 80_001,
            gas_price: format!("{} gwei", self.gas_price_gwei),
            current_block: 50_000_000 + rand::thread_rng().gen_range(0..1_000_000),
            wallet_address: self.wallet_address.clone(),
            contract_address: self.contract_address.clone(),
        }
    }
}

/// 20-byte address derived from the key material, `0x`-prefixed (40 hex
/// chars).
fn derive_wallet_address(private_key: &str) -> String {
    let digest = Sha256::digest(private_key.as_bytes());
    format!("0x{}", hex::encode(&digest[..20]))
}
