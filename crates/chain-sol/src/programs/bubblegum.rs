//! Bubblegum (compressed NFT) transfer instruction.
//!
//! A compressed NFT is a leaf in an on-chain concurrent Merkle tree. To move
//! it the client supplies the current root, the leaf's hashes and the part of
//! the proof path that the tree's canopy does not already store on chain.

use serde::{Deserialize, Serialize};

use crate::address::decode_fixed;
use crate::encoding::uint_to_le_bytes;
use crate::error::SolError;
use crate::instruction::{AccountMeta, Instruction};
use crate::programs::{
    ACCOUNT_COMPRESSION_PROGRAM_ID, BUBBLEGUM_PROGRAM_ID, NOOP_PROGRAM_ID, SYSTEM_PROGRAM_ID,
};

/// Anchor discriminator of the bubblegum `transfer` instruction.
pub const TRANSFER_DISCRIMINATOR: [u8; 8] = [163, 52, 200, 231, 140, 3, 69, 186];

/// Asset and proof data for one compressed NFT, as returned by an NFT
/// metadata indexer. All hashes and addresses are Base58.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedNftProof {
    pub root: String,
    pub data_hash: String,
    pub creator_hash: String,
    pub owner: String,
    pub delegate: String,
    pub merkle_tree: String,
    /// Proof path from the leaf upwards.
    pub proof: Vec<String>,
    pub leaf_index: u64,
    pub canopy_depth: u64,
}

/// Build a bubblegum `transfer` of the leaf described by `proof` to
/// `new_leaf_owner`.
///
/// Data (108 bytes): discriminator, root, data hash, creator hash, the leaf
/// index as u64 LE ("nonce") and again truncated to u32 LE ("index").
///
/// Accounts: tree authority, leaf owner, leaf delegate (the owner again),
/// new owner, merkle tree [writable], log wrapper, compression program,
/// system program, then the first `proof.len() - canopy_depth` proof nodes.
pub fn transfer(
    canopy_depth: u32,
    tree_authority: &str,
    new_leaf_owner: &str,
    proof: &CompressedNftProof,
) -> Result<Instruction, SolError> {
    let root = decode_hash("root", &proof.root)?;
    let data_hash = decode_hash("data hash", &proof.data_hash)?;
    let creator_hash = decode_hash("creator hash", &proof.creator_hash)?;

    let mut data = Vec::with_capacity(108);
    data.extend_from_slice(&TRANSFER_DISCRIMINATOR);
    data.extend_from_slice(&root);
    data.extend_from_slice(&data_hash);
    data.extend_from_slice(&creator_hash);
    data.extend_from_slice(&uint_to_le_bytes(proof.leaf_index));
    data.extend_from_slice(&uint_to_le_bytes(proof.leaf_index as u32));

    let mut accounts = vec![
        AccountMeta::readonly(tree_authority),
        AccountMeta::readonly(proof.owner.as_str()),
        AccountMeta::readonly(proof.owner.as_str()),
        AccountMeta::readonly(new_leaf_owner),
        AccountMeta::new(proof.merkle_tree.as_str(), false, true),
        AccountMeta::readonly(NOOP_PROGRAM_ID),
        AccountMeta::readonly(ACCOUNT_COMPRESSION_PROGRAM_ID),
        AccountMeta::readonly(SYSTEM_PROGRAM_ID),
    ];

    // Nodes covered by the canopy are already on chain. A canopy deeper than
    // the supplied proof leaves nothing to attach.
    let uncached = proof.proof.len().saturating_sub(canopy_depth as usize);
    accounts.extend(
        proof.proof[..uncached]
            .iter()
            .map(|node| AccountMeta::readonly(node.as_str())),
    );

    Ok(Instruction::new(BUBBLEGUM_PROGRAM_ID, accounts, data))
}

fn decode_hash(field: &str, value: &str) -> Result<[u8; 32], SolError> {
    decode_fixed::<32>(value)
        .map_err(|reason| SolError::InstructionBuild(format!("invalid {field}: {reason}")))
}
