//! Transactions: a message plus wallet-side metadata and the signed wire
//! format.
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message                 (see `message`)
//! ```

use std::collections::{BTreeMap, HashMap};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::encoding::{encode_compact_u16, ByteReader};
use crate::error::SolError;
use crate::message::Message;

/// Size in bytes of an Ed25519 signature.
pub const SIGNATURE_SIZE: usize = 64;

/// What a transaction does, as presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    SystemTransfer,
    SplTokenTransfer,
    SplTokenTransferWithAtaCreation,
    CompressedNftTransfer,
    DappSignAndSendTransaction,
    DappSignTransaction,
    Other,
}

/// Options forwarded to `sendTransaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    pub max_retries: Option<u64>,
    pub preflight_commitment: Option<String>,
    pub skip_preflight: Option<bool>,
}

/// A transaction owned by exactly one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub message: Message,
    pub tx_type: TransactionType,
    pub to_wallet_address: String,
    /// Lamports for native transfers, token base units for SPL transfers.
    pub amount: Option<u64>,
    pub spl_token_mint_address: Option<String>,
    pub send_options: Option<SendOptions>,
    /// Signatures supplied by other parties, keyed by signer address.
    #[serde(default)]
    pub raw_signatures: BTreeMap<String, Vec<u8>>,
}

impl Transaction {
    pub fn new(message: Message, tx_type: TransactionType) -> Self {
        Self {
            message,
            tx_type,
            to_wallet_address: String::new(),
            amount: None,
            spl_token_mint_address: None,
            send_options: None,
            raw_signatures: BTreeMap::new(),
        }
    }

    /// Serialized message bytes and the signer addresses in slot order.
    pub fn serialized_message(&self) -> Result<(Vec<u8>, Vec<String>), SolError> {
        self.message.serialize()
    }

    /// Base64 of the serialized message, as `getFeeForMessage` expects.
    pub fn base64_encoded_message(&self) -> Result<String, SolError> {
        let (bytes, _) = self.serialized_message()?;
        Ok(BASE64.encode(bytes))
    }

    /// Assemble the signed wire transaction.
    ///
    /// Each signer slot is filled from `signatures`, then from
    /// `raw_signatures`, and otherwise left as 64 zero bytes.
    pub fn signed_transaction_bytes(
        &self,
        signatures: &HashMap<String, Vec<u8>>,
    ) -> Result<Vec<u8>, SolError> {
        let (message_bytes, signers) = self.serialized_message()?;

        let mut wire = Vec::with_capacity(3 + signers.len() * SIGNATURE_SIZE + message_bytes.len());
        wire.extend_from_slice(&encode_compact_u16(signers.len() as u16));
        for signer in &signers {
            match signatures.get(signer).or_else(|| self.raw_signatures.get(signer)) {
                Some(sig) if sig.len() == SIGNATURE_SIZE => wire.extend_from_slice(sig),
                Some(sig) => {
                    return Err(SolError::SigningError(format!(
                        "signature for {signer} is {} bytes",
                        sig.len()
                    )))
                }
                None => wire.extend_from_slice(&[0u8; SIGNATURE_SIZE]),
            }
        }
        wire.extend_from_slice(&message_bytes);

        Ok(wire)
    }

    /// Parse a (possibly partially) signed wire transaction.
    ///
    /// Non-zero signature slots are kept as raw signatures of the matching
    /// signer.
    pub fn from_signed_transaction_bytes(bytes: &[u8]) -> Result<Self, SolError> {
        let mut reader = ByteReader::new(bytes);

        let num_signatures = reader.read_compact_u16()? as usize;
        let mut signatures = Vec::with_capacity(num_signatures);
        for _ in 0..num_signatures {
            signatures.push(reader.read_array::<SIGNATURE_SIZE>()?);
        }

        let (message, header) = Message::read_from(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(SolError::SerializationError(format!(
                "{} trailing bytes after transaction",
                reader.remaining()
            )));
        }

        let num_required = header.num_required_signatures as usize;
        if num_signatures != num_required {
            return Err(SolError::SerializationError(format!(
                "transaction carries {num_signatures} signatures, message requires {num_required}"
            )));
        }
        let signer_keys = message
            .static_account_keys
            .as_deref()
            .map(|keys| &keys[..num_required])
            .unwrap_or_default();

        let raw_signatures = signer_keys
            .iter()
            .zip(signatures)
            .filter(|(_, sig)| sig.iter().any(|b| *b != 0))
            .map(|(signer, sig)| (signer.clone(), sig.to_vec()))
            .collect();

        Ok(Self {
            raw_signatures,
            ..Self::new(message, TransactionType::Other)
        })
    }

    /// Whether a signature from `signer` has already been collected.
    pub fn has_raw_signature(&self, signer: &str) -> bool {
        self.raw_signatures.contains_key(signer)
    }

    pub fn clear_raw_signatures(&mut self) {
        self.raw_signatures.clear();
    }
}
