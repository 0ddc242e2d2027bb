//! Decoder for SPL account-compression `ConcurrentMerkleTree` accounts.
//!
//! Only two facts are extracted: the tree authority (the bubblegum PDA that
//! signs for the tree) and the canopy depth, i.e. how many upper levels of
//! the tree are cached on chain after the fixed-size tree body.
//!
//! ```text
//! header:
//!   account_type       u8   (1 = ConcurrentMerkleTree)
//!   version            u8   (0 = v1)
//!   max_buffer_size    u32 LE
//!   max_depth          u32 LE
//!   authority          32 bytes
//!   creation_slot      u64
//!   padding            6 bytes
//! tree:
//!   sequence_number    u64
//!   active_index       u64
//!   buffer_size        u64
//!   change_logs        max_buffer_size * (root 32 + path 32*max_depth + index u32 + pad u32)
//!   rightmost_path     proof 32*max_depth + leaf 32 + index u32 + pad u32
//! canopy:              remaining bytes, 32 per cached node
//! ```

use crate::address::{encode_pubkey, is_valid_address};
use crate::encoding::ByteReader;
use crate::error::SolError;

const ACCOUNT_TYPE_CONCURRENT_MERKLE_TREE: u8 = 1;
const HEADER_VERSION_V1: u8 = 0;
const NODE_SIZE: usize = 32;

/// What a transfer needs to know about a compressed NFT's tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTreeInfo {
    pub canopy_depth: u32,
    pub authority: String,
}

/// Decode a raw Merkle tree account buffer.
///
/// Fails on an unexpected account type or version, a malformed authority,
/// or a buffer too short for the layout its own header declares.
pub fn decode_merkle_tree_account(data: &[u8]) -> Result<MerkleTreeInfo, SolError> {
    let mut reader = ByteReader::new(data);

    let account_type = reader.read_u8().map_err(truncated)?;
    if account_type != ACCOUNT_TYPE_CONCURRENT_MERKLE_TREE {
        return Err(SolError::AccountDecode(format!(
            "unexpected compression account type {account_type}"
        )));
    }

    let version = reader.read_u8().map_err(truncated)?;
    if version != HEADER_VERSION_V1 {
        return Err(SolError::AccountDecode(format!(
            "unsupported merkle tree header version {version}"
        )));
    }

    let max_buffer_size = reader.read_u32().map_err(truncated)? as usize;
    let max_depth = reader.read_u32().map_err(truncated)? as usize;

    let authority = encode_pubkey(&reader.read_array::<32>().map_err(truncated)?);
    if !is_valid_address(&authority) {
        return Err(SolError::AccountDecode(format!(
            "malformed tree authority {authority}"
        )));
    }

    // creation slot + padding
    reader.skip(8 + 6).map_err(truncated)?;
    // sequence number, active index, buffer size
    reader.skip(3 * 8).map_err(truncated)?;

    let path_len = overflow_checked(NODE_SIZE.checked_mul(max_depth))?;
    let change_log_len = overflow_checked(path_len.checked_add(NODE_SIZE + 4 + 4))?;
    reader
        .skip(overflow_checked(change_log_len.checked_mul(max_buffer_size))?)
        .map_err(truncated)?;

    let rightmost_path_len = overflow_checked(path_len.checked_add(NODE_SIZE + 4 + 4))?;
    reader.skip(rightmost_path_len).map_err(truncated)?;

    Ok(MerkleTreeInfo {
        canopy_depth: canopy_depth_for(reader.remaining()),
        authority,
    })
}

/// Depth of a canopy stored in `canopy_byte_length` bytes.
///
/// A canopy of depth `c` holds every node of the top `c` levels below the
/// root, `2^(c+1) - 2` nodes in total.
pub fn canopy_depth_for(canopy_byte_length: usize) -> u32 {
    if canopy_byte_length == 0 {
        return 0;
    }
    ((canopy_byte_length as f64 / NODE_SIZE as f64 + 2.0).log2() - 1.0).floor() as u32
}

fn truncated(err: SolError) -> SolError {
    SolError::AccountDecode(format!("merkle tree account truncated: {err}"))
}

fn overflow_checked(value: Option<usize>) -> Result<usize, SolError> {
    value.ok_or_else(|| SolError::AccountDecode("merkle tree dimensions overflow".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::uint_to_le_bytes;

    const AUTHORITY: [u8; 32] = [0x42; 32];

    fn tree_account(max_buffer_size: u32, max_depth: u32, canopy_depth: u32) -> Vec<u8> {
        let depth = max_depth as usize;
        let mut data = vec![ACCOUNT_TYPE_CONCURRENT_MERKLE_TREE, HEADER_VERSION_V1];
        data.extend_from_slice(&uint_to_le_bytes(max_buffer_size));
        data.extend_from_slice(&uint_to_le_bytes(max_depth));
        data.extend_from_slice(&AUTHORITY);
        data.extend_from_slice(&[0u8; 8 + 6]);
        data.extend_from_slice(&[0u8; 24]);
        for _ in 0..max_buffer_size {
            data.extend_from_slice(&vec![0u8; 32 + 32 * depth + 8]);
        }
        data.extend_from_slice(&vec![0u8; 32 * depth + 32 + 8]);
        let canopy_nodes = (1usize << (canopy_depth + 1)) - 2;
        data.extend_from_slice(&vec![0u8; 32 * canopy_nodes]);
        data
    }

    #[test]
    fn canopy_depth_from_synthetic_buffers() {
        for depth in [3u32, 14] {
            for canopy in 0..=3 {
                let info = decode_merkle_tree_account(&tree_account(0, depth, canopy)).unwrap();
                assert_eq!(info.canopy_depth, canopy, "max_depth={depth}");
            }
        }
    }

    #[test]
    fn realistic_tree_dimensions() {
        let info = decode_merkle_tree_account(&tree_account(64, 14, 10)).unwrap();
        assert_eq!(info.canopy_depth, 10);
        assert_eq!(info.authority, encode_pubkey(&AUTHORITY));
    }

    #[test]
    fn canopy_formula_floors_partial_levels() {
        assert_eq!(canopy_depth_for(0), 0);
        // 3 nodes is more than depth 1 (2 nodes) but less than depth 2 (6).
        assert_eq!(canopy_depth_for(3 * 32), 1);
        assert_eq!(canopy_depth_for(6 * 32), 2);
        assert_eq!(canopy_depth_for(((1 << 18) - 2) * 32), 17);
    }

    #[test]
    fn rejects_wrong_account_type() {
        let mut data = tree_account(0, 3, 0);
        data[0] = 0;
        assert!(matches!(
            decode_merkle_tree_account(&data),
            Err(SolError::AccountDecode(_))
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut data = tree_account(0, 3, 0);
        data[1] = 1;
        assert!(decode_merkle_tree_account(&data).is_err());
    }

    #[test]
    fn rejects_truncated_header() {
        let data = tree_account(0, 3, 0);
        assert!(decode_merkle_tree_account(&data[..20]).is_err());
        assert!(decode_merkle_tree_account(&[]).is_err());
    }

    #[test]
    fn rejects_body_shorter_than_declared() {
        let data = tree_account(2, 5, 0);
        let err = decode_merkle_tree_account(&data[..data.len() - 1]).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn absurd_dimensions_fail_cleanly() {
        let mut data = tree_account(0, 3, 0);
        data[2..6].copy_from_slice(&u32::MAX.to_le_bytes());
        data[6..10].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(decode_merkle_tree_account(&data).is_err());
    }
}
