//! Persisted record of one transaction's lifecycle.

use chain_sol::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Unapproved,
    Approved,
    Submitted,
    Confirmed,
    Error,
    Dropped,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Error | Self::Dropped)
    }
}

/// Result of `getSignatureStatuses` for one signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmations: Option<u64>,
    /// Serialized `TransactionError`, empty when the transaction succeeded.
    #[serde(default)]
    pub err: String,
    /// `processed`, `confirmed` or `finalized`; may be empty.
    #[serde(default)]
    pub confirmation_status: String,
}

impl SignatureStatus {
    pub fn is_finalized(&self) -> bool {
        self.confirmation_status == "finalized"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMeta {
    pub id: String,
    /// Address of the account whose key signs this transaction.
    pub from: String,
    pub chain_id: String,
    pub status: TransactionStatus,
    pub created_time: DateTime<Utc>,
    pub submitted_time: Option<DateTime<Utc>>,
    pub confirmed_time: Option<DateTime<Utc>>,
    pub tx_hash: Option<String>,
    pub signature_status: Option<SignatureStatus>,
    /// Origin of the dApp that requested the transaction, if any.
    pub origin: Option<String>,
    pub tx: Transaction,
}

impl TxMeta {
    pub fn new(
        from: impl Into<String>,
        chain_id: impl Into<String>,
        tx: Transaction,
        origin: Option<String>,
    ) -> Self {
        Self {
            id: generate_meta_id(),
            from: from.into(),
            chain_id: chain_id.into(),
            status: TransactionStatus::Unapproved,
            created_time: Utc::now(),
            submitted_time: None,
            confirmed_time: None,
            tx_hash: None,
            signature_status: None,
            origin,
            tx,
        }
    }

    /// Only failed or dropped transactions can be resubmitted as a new meta.
    /// A durable nonce transaction that failed on chain has consumed its
    /// nonce, so its clone could never land.
    pub fn is_retriable(&self) -> bool {
        match self.status {
            TransactionStatus::Dropped => true,
            TransactionStatus::Error => !self.tx.message.uses_durable_nonce(),
            _ => false,
        }
    }
}

pub fn generate_meta_id() -> String {
    Uuid::new_v4().to_string()
}
