//! Solana address encoding.
//!
//! An address is the Base58 encoding of a raw 32-byte public key. Program
//! derived addresses use the same representation even though they are not
//! points on the Ed25519 curve.

use crate::error::SolError;

/// Size in bytes of a decoded Solana public key.
pub const PUBKEY_SIZE: usize = 32;

/// Decode a Base58 address into its 32-byte public key.
///
/// Fails if the string is not Base58 or does not decode to exactly
/// [`PUBKEY_SIZE`] bytes.
pub fn decode_pubkey(address: &str) -> Result<[u8; PUBKEY_SIZE], SolError> {
    decode_fixed::<PUBKEY_SIZE>(address)
        .map_err(|reason| SolError::InvalidAddress(format!("{address:?}: {reason}")))
}

/// Encode a 32-byte public key as a Base58 address.
pub fn encode_pubkey(bytes: &[u8; PUBKEY_SIZE]) -> String {
    bs58::encode(bytes).into_string()
}

/// Whether `address` is a well-formed Solana address.
pub fn is_valid_address(address: &str) -> bool {
    decode_pubkey(address).is_ok()
}

/// Decode a Base58 string that must be exactly `N` bytes long.
///
/// Used for addresses as well as for 32-byte hashes (blockhashes, Merkle
/// roots) which share the same textual representation.
pub fn decode_fixed<const N: usize>(value: &str) -> Result<[u8; N], String> {
    let bytes = bs58::decode(value)
        .into_vec()
        .map_err(|e| format!("base58 decode failed: {e}"))?;

    bytes
        .try_into()
        .map_err(|v: Vec<u8>| format!("expected {N} bytes, got {}", v.len()))
}
