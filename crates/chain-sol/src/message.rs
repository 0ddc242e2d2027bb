//! Legacy Solana message assembly and wire format.
//!
//! ```text
//! Message:
//!   num_required_sigs     u8
//!   num_readonly_signed   u8
//!   num_readonly_unsigned u8
//!   num_accounts          compact-u16
//!   account_keys          32 bytes * num_accounts
//!   recent_blockhash      32 bytes
//!   num_instructions      compact-u16
//!   instructions[]
//!
//! Instruction:
//!   program_id_index      u8
//!   num_accounts          compact-u16
//!   account_indices       u8 * num_accounts
//!   data_len              compact-u16
//!   data                  u8 * data_len
//! ```

use serde::{Deserialize, Serialize};

use crate::address::{decode_fixed, decode_pubkey, encode_pubkey};
use crate::encoding::{encode_compact_u16, ByteReader};
use crate::error::SolError;
use crate::instruction::{AccountMeta, Instruction};
use crate::programs::system::is_advance_nonce_account;

/// High bit of the first message byte marks a versioned (v0+) message.
const VERSION_PREFIX_MASK: u8 = 0x80;

/// An unsigned message: fee payer, blockhash window and instructions.
///
/// `recent_blockhash` is empty and `last_valid_block_height` is zero until a
/// blockhash has been resolved for the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub fee_payer: String,
    pub recent_blockhash: String,
    pub last_valid_block_height: u64,
    pub instructions: Vec<Instruction>,
    /// Account key order of a message decoded from a dApp transaction.
    /// Kept so that re-serializing yields the bytes the other signers signed.
    #[serde(default)]
    pub static_account_keys: Option<Vec<String>>,
}

/// Signature and read-only counts that prefix the account table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

/// An instruction whose accounts are indices into the message account table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

/// A message lowered to its wire representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMessage {
    pub header: MessageHeader,
    pub account_keys: Vec<String>,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
}

#[derive(Debug)]
struct AccountEntry {
    pubkey: String,
    is_signer: bool,
    is_writable: bool,
}

impl AccountEntry {
    /// Canonical ordering class: writable signers, readonly signers,
    /// writable non-signers, readonly non-signers.
    fn rank(&self) -> u8 {
        match (self.is_signer, self.is_writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        }
    }
}

impl Message {
    /// Assemble a legacy message. The fee payer always becomes the first
    /// writable signer.
    pub fn new_legacy(
        recent_blockhash: impl Into<String>,
        last_valid_block_height: u64,
        fee_payer: impl Into<String>,
        instructions: Vec<Instruction>,
    ) -> Result<Self, SolError> {
        let fee_payer = fee_payer.into();
        if fee_payer.is_empty() {
            return Err(SolError::MessageBuild("fee payer is required".into()));
        }
        if instructions.is_empty() {
            return Err(SolError::MessageBuild(
                "message needs at least one instruction".into(),
            ));
        }

        Ok(Self {
            fee_payer,
            recent_blockhash: recent_blockhash.into(),
            last_valid_block_height,
            instructions,
            static_account_keys: None,
        })
    }

    /// True when the first instruction advances a durable nonce, meaning
    /// `recent_blockhash` is the nonce value and never expires on its own.
    pub fn uses_durable_nonce(&self) -> bool {
        self.instructions
            .first()
            .is_some_and(is_advance_nonce_account)
    }

    /// Lower the message to account indices.
    pub fn compile(&self) -> Result<CompiledMessage, SolError> {
        if self.recent_blockhash.is_empty() {
            return Err(SolError::SerializationError(
                "recent blockhash has not been resolved".into(),
            ));
        }
        let recent_blockhash = decode_fixed::<32>(&self.recent_blockhash).map_err(|reason| {
            SolError::SerializationError(format!("invalid recent blockhash: {reason}"))
        })?;

        let entries = self.ordered_entries()?;
        if entries.len() > u8::MAX as usize {
            return Err(SolError::SerializationError(format!(
                "too many accounts: {}",
                entries.len()
            )));
        }

        let header = MessageHeader {
            num_required_signatures: entries.iter().filter(|e| e.is_signer).count() as u8,
            num_readonly_signed_accounts: entries
                .iter()
                .filter(|e| e.is_signer && !e.is_writable)
                .count() as u8,
            num_readonly_unsigned_accounts: entries
                .iter()
                .filter(|e| !e.is_signer && !e.is_writable)
                .count() as u8,
        };

        let account_keys: Vec<String> = entries.into_iter().map(|e| e.pubkey).collect();
        let index_of = |pubkey: &str| -> Result<u8, SolError> {
            account_keys
                .iter()
                .position(|k| k == pubkey)
                .map(|i| i as u8)
                .ok_or_else(|| SolError::SerializationError(format!("{pubkey} not in account keys")))
        };

        let mut instructions = Vec::with_capacity(self.instructions.len());
        for ix in &self.instructions {
            instructions.push(CompiledInstruction {
                program_id_index: index_of(&ix.program_id)?,
                account_indices: ix
                    .accounts
                    .iter()
                    .map(|meta| index_of(&meta.pubkey))
                    .collect::<Result<_, _>>()?,
                data: ix.data.clone(),
            });
        }

        Ok(CompiledMessage {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }

    /// Serialize to the bytes that get signed, together with the ordered
    /// list of accounts whose signatures the transaction requires.
    pub fn serialize(&self) -> Result<(Vec<u8>, Vec<String>), SolError> {
        let compiled = self.compile()?;
        let bytes = compiled.serialize()?;
        let signers = compiled.signers().to_vec();
        Ok((bytes, signers))
    }

    /// Parse a legacy message. Versioned messages are rejected.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, SolError> {
        let mut reader = ByteReader::new(bytes);
        let (message, _) = Self::read_from(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(SolError::SerializationError(format!(
                "{} trailing bytes after message",
                reader.remaining()
            )));
        }
        Ok(message)
    }

    pub(crate) fn read_from(
        reader: &mut ByteReader<'_>,
    ) -> Result<(Self, MessageHeader), SolError> {
        let num_required_signatures = reader.read_u8()?;
        if num_required_signatures & VERSION_PREFIX_MASK != 0 {
            return Err(SolError::SerializationError(
                "versioned messages are not supported".into(),
            ));
        }
        let header = MessageHeader {
            num_required_signatures,
            num_readonly_signed_accounts: reader.read_u8()?,
            num_readonly_unsigned_accounts: reader.read_u8()?,
        };

        let num_accounts = reader.read_compact_u16()? as usize;
        let mut account_keys = Vec::with_capacity(num_accounts);
        for _ in 0..num_accounts {
            account_keys.push(encode_pubkey(&reader.read_array::<32>()?));
        }
        validate_header(&header, account_keys.len())?;

        let recent_blockhash = encode_pubkey(&reader.read_array::<32>()?);

        let num_instructions = reader.read_compact_u16()? as usize;
        let mut instructions = Vec::with_capacity(num_instructions);
        for _ in 0..num_instructions {
            let program_id_index = reader.read_u8()? as usize;
            let program_id = account_keys.get(program_id_index).ok_or_else(|| {
                SolError::SerializationError(format!("program index {program_id_index} out of range"))
            })?;

            let num_indices = reader.read_compact_u16()? as usize;
            let mut accounts = Vec::with_capacity(num_indices);
            for &index in reader.take(num_indices)? {
                let index = index as usize;
                let pubkey = account_keys.get(index).ok_or_else(|| {
                    SolError::SerializationError(format!("account index {index} out of range"))
                })?;
                accounts.push(AccountMeta::new(
                    pubkey.as_str(),
                    is_signer_index(&header, index),
                    is_writable_index(&header, index, account_keys.len()),
                ));
            }

            let data_len = reader.read_compact_u16()? as usize;
            let data = reader.take(data_len)?.to_vec();
            instructions.push(Instruction::new(program_id.as_str(), accounts, data));
        }

        let message = Self {
            fee_payer: account_keys[0].clone(),
            recent_blockhash,
            last_valid_block_height: 0,
            instructions,
            static_account_keys: Some(account_keys),
        };
        Ok((message, header))
    }

    /// Merge account flags across instructions and order them, honouring
    /// `static_account_keys` when it is still consistent with the flags.
    fn ordered_entries(&self) -> Result<Vec<AccountEntry>, SolError> {
        let mut entries: Vec<AccountEntry> = Vec::new();
        let mut upsert = |pubkey: &str, signer: bool, writable: bool| {
            if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
                entry.is_signer |= signer;
                entry.is_writable |= writable;
            } else {
                entries.push(AccountEntry {
                    pubkey: pubkey.to_string(),
                    is_signer: signer,
                    is_writable: writable,
                });
            }
        };

        upsert(&self.fee_payer, true, true);
        for ix in &self.instructions {
            if ix.program_id.is_empty() {
                return Err(SolError::MessageBuild("instruction without program id".into()));
            }
            for meta in &ix.accounts {
                upsert(&meta.pubkey, meta.is_signer, meta.is_writable);
            }
            upsert(&ix.program_id, false, false);
        }

        for entry in &entries {
            decode_pubkey(&entry.pubkey)
                .map_err(|e| SolError::SerializationError(e.to_string()))?;
        }

        if let Some(order) = &self.static_account_keys {
            if let Some(reordered) = apply_static_order(&entries, order) {
                return Ok(reordered);
            }
        }

        // Stable: fee payer stays first among writable signers.
        entries.sort_by_key(AccountEntry::rank);
        Ok(entries)
    }
}

impl CompiledMessage {
    /// Accounts that must sign, in signature-slot order.
    pub fn signers(&self) -> &[String] {
        &self.account_keys[..self.header.num_required_signatures as usize]
    }

    pub fn serialize(&self) -> Result<Vec<u8>, SolError> {
        let mut buf = Vec::with_capacity(256);

        buf.push(self.header.num_required_signatures);
        buf.push(self.header.num_readonly_signed_accounts);
        buf.push(self.header.num_readonly_unsigned_accounts);

        buf.extend_from_slice(&encode_compact_u16(self.account_keys.len() as u16));
        for key in &self.account_keys {
            buf.extend_from_slice(&decode_pubkey(key)?);
        }

        buf.extend_from_slice(&self.recent_blockhash);

        buf.extend_from_slice(&encode_len(self.instructions.len())?);
        for ix in &self.instructions {
            buf.push(ix.program_id_index);
            buf.extend_from_slice(&encode_len(ix.account_indices.len())?);
            buf.extend_from_slice(&ix.account_indices);
            buf.extend_from_slice(&encode_len(ix.data.len())?);
            buf.extend_from_slice(&ix.data);
        }

        Ok(buf)
    }
}

fn encode_len(len: usize) -> Result<Vec<u8>, SolError> {
    u16::try_from(len)
        .map(encode_compact_u16)
        .map_err(|_| SolError::SerializationError(format!("length {len} exceeds compact-u16")))
}

fn validate_header(header: &MessageHeader, num_accounts: usize) -> Result<(), SolError> {
    let required = header.num_required_signatures as usize;
    let consistent = required >= 1
        && required <= num_accounts
        && header.num_readonly_signed_accounts < header.num_required_signatures
        && header.num_readonly_unsigned_accounts as usize <= num_accounts - required;
    if consistent {
        Ok(())
    } else {
        Err(SolError::SerializationError(format!(
            "message header {header:?} inconsistent with {num_accounts} accounts"
        )))
    }
}

fn is_signer_index(header: &MessageHeader, index: usize) -> bool {
    index < header.num_required_signatures as usize
}

fn is_writable_index(header: &MessageHeader, index: usize, num_accounts: usize) -> bool {
    let required = header.num_required_signatures as usize;
    if index < required {
        index < required - header.num_readonly_signed_accounts as usize
    } else {
        index < num_accounts - header.num_readonly_unsigned_accounts as usize
    }
}

fn apply_static_order(entries: &[AccountEntry], order: &[String]) -> Option<Vec<AccountEntry>> {
    if order.len() != entries.len() || order.first() != entries.first().map(|e| &e.pubkey) {
        return None;
    }
    let mut reordered = Vec::with_capacity(order.len());
    for key in order {
        let entry = entries.iter().find(|e| &e.pubkey == key)?;
        if reordered
            .last()
            .is_some_and(|prev: &AccountEntry| prev.rank() > entry.rank())
        {
            return None;
        }
        reordered.push(AccountEntry {
            pubkey: entry.pubkey.clone(),
            is_signer: entry.is_signer,
            is_writable: entry.is_writable,
        });
    }
    Some(reordered)
}
