//! SPL Token and Associated Token Account instructions.
//!
//! Implements the token `Transfer` instruction, associated token account
//! creation and ATA address derivation without the `spl-token` crates.

use sha2::{Digest, Sha256};

use crate::address::{decode_pubkey, encode_pubkey};
use crate::encoding::uint_to_le_bytes;
use crate::error::SolError;
use crate::instruction::{AccountMeta, Instruction};
use crate::programs::{ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID};

/// SPL Token `Transfer` instruction index.
const TOKEN_TRANSFER_IX_INDEX: u8 = 3;

/// The string appended to PDA derivation: "ProgramDerivedAddress".
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

// ---------------------------------------------------------------------------
// SPL Token Transfer
// ---------------------------------------------------------------------------

/// Build an SPL Token `Transfer` instruction moving `amount` base units.
///
/// Accounts for a single owner or delegate:
///   0. source token account [writable]
///   1. destination token account [writable]
///   2. authority [signer]
///
/// With a multisig authority the authority is not a signer itself and each
/// of the `co_signers` follows as a read-only signer.
///
/// Data: u8 instruction index (3) followed by u64 LE amount (9 bytes).
pub fn transfer(
    token_program_id: &str,
    source: &str,
    destination: &str,
    authority: &str,
    co_signers: &[String],
    amount: u64,
) -> Result<Instruction, SolError> {
    if token_program_id.is_empty()
        || source.is_empty()
        || destination.is_empty()
        || authority.is_empty()
    {
        return Err(SolError::InstructionBuild(
            "token transfer requires program, source, destination and authority".into(),
        ));
    }

    let mut data = Vec::with_capacity(9);
    data.push(TOKEN_TRANSFER_IX_INDEX);
    data.extend_from_slice(&uint_to_le_bytes(amount));

    let mut accounts = vec![
        AccountMeta::new(source, false, true),
        AccountMeta::new(destination, false, true),
        AccountMeta::new(authority, co_signers.is_empty(), false),
    ];
    accounts.extend(co_signers.iter().map(|signer| AccountMeta::new(signer.as_str(), true, false)));

    Ok(Instruction::new(token_program_id, accounts, data))
}

// ---------------------------------------------------------------------------
// Associated Token Account
// ---------------------------------------------------------------------------

/// Create the associated token account `ata_address` for `wallet` and `mint`,
/// paid for by `funder`. The instruction carries no data.
///
/// Accounts:
///   0. funder [signer, writable]
///   1. associated token account [writable]
///   2. wallet [readonly]
///   3. mint [readonly]
///   4. system program [readonly]
///   5. token program [readonly]
pub fn create_associated_token_account(
    funder: &str,
    wallet: &str,
    ata_address: &str,
    mint: &str,
) -> Result<Instruction, SolError> {
    if funder.is_empty() || wallet.is_empty() || ata_address.is_empty() || mint.is_empty() {
        return Err(SolError::InstructionBuild(
            "associated token account creation requires all addresses".into(),
        ));
    }

    Ok(Instruction::new(
        ASSOCIATED_TOKEN_PROGRAM_ID,
        vec![
            AccountMeta::new(funder, true, true),
            AccountMeta::new(ata_address, false, true),
            AccountMeta::readonly(wallet),
            AccountMeta::readonly(mint),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
            AccountMeta::readonly(TOKEN_PROGRAM_ID),
        ],
        Vec::new(),
    ))
}

/// Derive the associated token account address for a wallet + mint pair.
///
/// The ATA is a Program Derived Address with seeds
/// `[wallet, token_program_id, mint]` under the associated token program.
pub fn derive_associated_token_address(wallet: &str, mint: &str) -> Result<String, SolError> {
    let wallet = decode_pubkey(wallet)?;
    let mint = decode_pubkey(mint)?;
    let token_program = decode_pubkey(TOKEN_PROGRAM_ID)?;
    let ata_program = decode_pubkey(ASSOCIATED_TOKEN_PROGRAM_ID)?;

    let (address, _bump) = find_program_address(
        &[wallet.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ata_program,
    )?;
    Ok(encode_pubkey(&address))
}

/// Search bump seeds from 255 down to 0 for the first off-curve hash.
fn find_program_address(
    seeds: &[&[u8]],
    program_id: &[u8; 32],
) -> Result<([u8; 32], u8), SolError> {
    for bump in (0u8..=255).rev() {
        if let Some(address) = try_create_program_address(seeds, &[bump], program_id) {
            return Ok((address, bump));
        }
    }

    Err(SolError::InvalidAddress(
        "could not find valid PDA bump seed".into(),
    ))
}

/// `SHA-256(seeds || bump || program_id || "ProgramDerivedAddress")`, or
/// `None` if the digest lands on the Ed25519 curve.
fn try_create_program_address(
    seeds: &[&[u8]],
    bump_seed: &[u8],
    program_id: &[u8; 32],
) -> Option<[u8; 32]> {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(bump_seed);
    hasher.update(program_id);
    hasher.update(PDA_MARKER);

    let hash: [u8; 32] = hasher.finalize().into();
    if is_on_curve(&hash) {
        return None;
    }
    Some(hash)
}

fn is_on_curve(bytes: &[u8; 32]) -> bool {
    curve25519_dalek::edwards::CompressedEdwardsY(*bytes)
        .decompress()
        .is_some()
}
