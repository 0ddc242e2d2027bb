//! JSON-RPC surface the manager depends on.
//!
//! Transport, endpoint selection and retries belong to the implementor.
//! Network failures should be reported as
//! [`TxError::ConnectionIssue`](crate::error::TxError::ConnectionIssue).

use async_trait::async_trait;
use chain_sol::SendOptions;
use serde::{Deserialize, Serialize};

use crate::error::TxResult;
use crate::meta::SignatureStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestBlockhash {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub lamports: u64,
    /// Owning program.
    pub owner: String,
    /// Base64 account data.
    pub data: String,
    pub executable: bool,
}

#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn get_latest_blockhash(&self, chain_id: &str) -> TxResult<LatestBlockhash>;

    async fn get_block_height(&self, chain_id: &str) -> TxResult<u64>;

    /// One entry per requested signature, in request order. `None` means the
    /// cluster does not know the signature.
    async fn get_signature_statuses(
        &self,
        chain_id: &str,
        signatures: &[String],
    ) -> TxResult<Vec<Option<SignatureStatus>>>;

    /// `None` when the account does not exist.
    async fn get_account_info(&self, chain_id: &str, address: &str)
        -> TxResult<Option<AccountInfo>>;

    /// Submit a Base64 signed transaction; returns its signature.
    async fn send_transaction(
        &self,
        chain_id: &str,
        signed_tx_base64: &str,
        options: Option<&SendOptions>,
    ) -> TxResult<String>;

    async fn get_fee_for_message(&self, chain_id: &str, message_base64: &str) -> TxResult<u64>;
}
