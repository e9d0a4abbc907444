//! Signed settlement receipts.
//!
//! Every terminal transition (finalize or cancel) produces a
//! [`SettlementReceipt`]: a JSON summary of who received the deed and the
//! funds, its SHA-256 hash, and an ed25519 signature from the ledger.

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AssetId, EscrowError, PartyAddress, Result, constants};

/// Which terminal transition the receipt proves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptType {
    SaleFinalized,
    SaleCancelled,
}

impl std::fmt::Display for ReceiptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SaleFinalized => write!(f, "SALE_FINALIZED"),
            Self::SaleCancelled => write!(f, "SALE_CANCELLED"),
        }
    }
}

/// A single disbursement out of the custodian's held funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub to: PartyAddress,
    pub amount: Decimal,
}

/// What a settlement did: the receipt payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub asset_id: AssetId,
    pub receipt_type: ReceiptType,
    /// New owner of the deed after settlement.
    pub deed_recipient: PartyAddress,
    pub payouts: Vec<Payout>,
}

impl SettlementSummary {
    /// Total funds disbursed.
    #[must_use]
    pub fn total_paid(&self) -> Decimal {
        self.payouts.iter().map(|p| p.amount).sum()
    }

    /// Amount paid to `party` across all payouts.
    #[must_use]
    pub fn paid_to(&self, party: &PartyAddress) -> Decimal {
        self.payouts
            .iter()
            .filter(|p| &p.to == party)
            .map(|p| p.amount)
            .sum()
    }
}

/// A signed, hash-committed settlement record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub receipt_type: ReceiptType,
    pub asset_id: AssetId,
    /// JSON-encoded [`SettlementSummary`].
    pub payload: Vec<u8>,
    /// `SHA-256(RECEIPT_DOMAIN || payload)`.
    pub payload_hash: [u8; 32],
    /// Ed25519 signature over `payload_hash`.
    pub signature: Vec<u8>,
    pub issued_at: DateTime<Utc>,
}

impl SettlementReceipt {
    /// Encode, hash and sign a settlement summary.
    pub fn issue(summary: &SettlementSummary, key: &SigningKey) -> Result<Self> {
        let payload = serde_json::to_vec(summary)?;
        let payload_hash = Self::hash_payload(&payload);
        let signature = key.sign(&payload_hash).to_bytes().to_vec();
        Ok(Self {
            receipt_type: summary.receipt_type,
            asset_id: summary.asset_id,
            payload,
            payload_hash,
            signature,
            issued_at: Utc::now(),
        })
    }

    fn hash_payload(payload: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(constants::RECEIPT_DOMAIN);
        hasher.update(payload);
        hasher.finalize().into()
    }

    /// Decode the payload back into a summary.
    pub fn summary(&self) -> Result<SettlementSummary> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Check the payload hash and the signature against `key`.
    ///
    /// # Errors
    /// Returns `Serialization` if the hash does not commit to the payload or
    /// the signature is malformed or does not verify.
    pub fn verify(&self, key: &VerifyingKey) -> Result<()> {
        if Self::hash_payload(&self.payload) != self.payload_hash {
            return Err(EscrowError::Serialization(format!(
                "receipt for {} has a stale payload hash",
                self.asset_id
            )));
        }
        let bytes: [u8; 64] = self.signature.as_slice().try_into().map_err(|_| {
            EscrowError::Serialization(format!(
                "receipt signature must be 64 bytes, got {}",
                self.signature.len()
            ))
        })?;
        key.verify(&self.payload_hash, &Signature::from_bytes(&bytes))
            .map_err(|e| EscrowError::Serialization(format!("receipt signature: {e}")))
    }
}
