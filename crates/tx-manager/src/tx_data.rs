//! Builders turning user intent into unsigned transactions.
//!
//! Messages are created without a blockhash; it is resolved at approval.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chain_sol::programs::{bubblegum, spl_token, system, TOKEN_PROGRAM_ID};
use chain_sol::{decode_merkle_tree_account, Message, SendOptions, Transaction, TransactionType};
use tracing::{debug, warn};

use crate::config::FeePayerPolicy;
use crate::error::{TxError, TxResult};
use crate::manager::SolanaTxManager;

impl SolanaTxManager {
    /// Native SOL transfer of `lamports` from `from` to `to`.
    pub fn make_system_transfer_tx_data(
        &self,
        from: &str,
        to: &str,
        lamports: u64,
    ) -> TxResult<Transaction> {
        self.check_destination(to)?;
        require_address("from", from)?;

        let ix = system::transfer(from, to, lamports)?;
        let msg = Message::new_legacy(String::new(), 0, from, vec![ix])?;

        let mut tx = Transaction::new(msg, TransactionType::SystemTransfer);
        tx.to_wallet_address = to.to_string();
        tx.amount = Some(lamports);
        Ok(tx)
    }

    /// SPL token transfer between the associated token accounts of `from`
    /// and `to`, creating the receiver's account first when needed.
    pub async fn make_token_transfer_tx_data(
        &self,
        chain_id: &str,
        mint: &str,
        from: &str,
        to: &str,
        amount: u64,
    ) -> TxResult<Transaction> {
        self.check_destination(to)?;
        require_address("from", from)?;
        require_address("mint", mint)?;

        let from_ata = spl_token::derive_associated_token_address(from, mint)
            .map_err(|e| TxError::InvalidParams(e.to_string()))?;
        let to_ata = spl_token::derive_associated_token_address(to, mint)
            .map_err(|e| TxError::InvalidParams(e.to_string()))?;

        let receiver_account = self.rpc.get_account_info(chain_id, &to_ata).await?;
        let create_ata = receiver_account.map_or(true, |info| info.owner != TOKEN_PROGRAM_ID);

        let mut instructions = Vec::with_capacity(2);
        if create_ata {
            debug!(chain_id, ata = %to_ata, "receiver token account missing, creating it");
            instructions.push(spl_token::create_associated_token_account(
                from, to, &to_ata, mint,
            )?);
        }
        instructions.push(spl_token::transfer(
            TOKEN_PROGRAM_ID,
            &from_ata,
            &to_ata,
            from,
            &[],
            amount,
        )?);

        let msg = Message::new_legacy(String::new(), 0, from, instructions)?;
        let tx_type = if create_ata {
            TransactionType::SplTokenTransferWithAtaCreation
        } else {
            TransactionType::SplTokenTransfer
        };

        let mut tx = Transaction::new(msg, tx_type);
        tx.to_wallet_address = to.to_string();
        tx.spl_token_mint_address = Some(mint.to_string());
        tx.amount = Some(amount);
        Ok(tx)
    }

    /// Bubblegum transfer of the compressed NFT `token_address` to `to`.
    pub async fn make_compressed_nft_transfer_tx_data(
        &self,
        chain_id: &str,
        token_address: &str,
        from: &str,
        to: &str,
    ) -> TxResult<Transaction> {
        self.check_destination(to)?;
        require_address("from", from)?;

        let proof = self
            .nft_metadata
            .fetch_compressed_nft_proof(token_address)
            .await
            .ok_or_else(|| {
                TxError::InternalError(format!("no proof data for compressed NFT {token_address}"))
            })?;
        if proof.owner != from {
            warn!(chain_id, token_address, owner = %proof.owner, from, "sender is not the current leaf owner");
        }

        let tree_chain = self.config.merkle_tree_chain_id.as_str();
        let account = self
            .rpc
            .get_account_info(tree_chain, &proof.merkle_tree)
            .await?
            .ok_or_else(|| {
                TxError::InternalError(format!("merkle tree {} not found", proof.merkle_tree))
            })?;
        let data = BASE64
            .decode(&account.data)
            .map_err(|e| TxError::InternalError(format!("merkle tree account data: {e}")))?;
        let tree = decode_merkle_tree_account(&data)?;

        let ix = bubblegum::transfer(tree.canopy_depth, &tree.authority, to, &proof)?;
        let fee_payer = match self.config.compressed_nft_fee_payer {
            FeePayerPolicy::NftOwner => proof.owner.as_str(),
            FeePayerPolicy::Sender => from,
        };
        let msg = Message::new_legacy(String::new(), 0, fee_payer, vec![ix])?;

        let mut tx = Transaction::new(msg, TransactionType::CompressedNftTransfer);
        tx.to_wallet_address = to.to_string();
        Ok(tx)
    }

    /// Parse a (partially) signed transaction handed over by a dApp.
    pub fn make_tx_data_from_signed_base64(
        &self,
        encoded: &str,
        tx_type: TransactionType,
        send_options: Option<SendOptions>,
    ) -> TxResult<Transaction> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| TxError::InternalError(format!("transaction is not base64: {e}")))?;
        if bytes.is_empty() || bytes.len() > self.config.max_transaction_size {
            return Err(TxError::InternalError(format!(
                "transaction size {} outside 1..={}",
                bytes.len(),
                self.config.max_transaction_size
            )));
        }

        let mut tx = Transaction::from_signed_transaction_bytes(&bytes)?;
        tx.tx_type = tx_type;
        tx.send_options = send_options;
        Ok(tx)
    }

    fn check_destination(&self, to: &str) -> TxResult<()> {
        require_address("to", to)?;
        if self.address_policy.is_restricted_address(to) {
            warn!(to, "rejected transfer to restricted address");
            return Err(TxError::InvalidParams(format!(
                "{to} is a restricted address"
            )));
        }
        Ok(())
    }
}

fn require_address(field: &str, value: &str) -> TxResult<()> {
    if value.is_empty() {
        return Err(TxError::InvalidParams(format!("{field} address is empty")));
    }
    Ok(())
}
