//! Block payload variants.
//!
//! A block carries exactly one of three fixed-shape records, tagged by
//! `type` in the canonical JSON. The tagged representation (rather than a
//! free-form map) is what makes hashes and Merkle roots reproducible: the
//! serialized field order is the declaration order below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::DonationProof;
use crate::transactions::{AuditorValidation, EBill, InvoiceDetails};

use super::chain::ChainType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockPayload {
    Genesis(GenesisPayload),
    Donation(DonationPayload),
    Expenditure(ExpenditurePayload),
}

impl BlockPayload {
    /// Monetary amount carried by the payload; genesis blocks carry none.
    pub fn amount(&self) -> Option<f64> {
        match self {
            BlockPayload::Genesis(_) => None,
            BlockPayload::Donation(payload) => Some(payload.amount),
            BlockPayload::Expenditure(payload) => Some(payload.amount),
        }
    }

    /// Canonical JSON used as hash and Merkle-root input.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisPayload {
    pub ngo_id: String,
    pub chain_type: ChainType,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationPayload {
    pub transaction_id: String,
    /// SHA-256 of the donor id; the id itself never enters the chain.
    pub donor_hash: String,
    pub amount: f64,
    pub currency: String,
    pub zk_proof: DonationProof,
    pub e_bill: EBill,
    pub timestamp: DateTime<Utc>,
    pub payment_method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenditurePayload {
    pub transaction_id: String,
    pub amount: f64,
    pub currency: String,
    pub category: String,
    pub description: String,
    pub invoice_details: InvoiceDetails,
    pub auditor_validation: AuditorValidation,
    pub compliance_score: f64,
    pub timestamp: DateTime<Utc>,
    pub attachments: Vec<AttachmentRef>,
}

/// Attachment as persisted in a block: name, content hash, media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub filename: String,
    pub hash: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_payload_is_tagged() {
        let payload = BlockPayload::Genesis(GenesisPayload {
            ngo_id: "NGO001".to_string(),
            chain_type: ChainType::Donation,
            message: "Genesis block for donation chain of NGO NGO001".to_string(),
        });
        let json: serde_json::Value = serde_json::from_str(&payload.canonical_json()).unwrap();
        assert_eq!(json["type"], "genesis");
        assert_eq!(json["ngo_id"], "NGO001");
        assert_eq!(json["chain_type"], "donation");
        assert_eq!(payload.amount(), None);
    }

    #[test]
    fn canonical_json_is_stable() {
        let payload = BlockPayload::Genesis(GenesisPayload {
            ngo_id: "NGO001".to_string(),
            chain_type: ChainType::Expenditure,
            message: "m".to_string(),
        });
        assert_eq!(payload.canonical_json(), payload.canonical_json());
    }
}
