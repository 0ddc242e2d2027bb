use async_trait::async_trait;
use chain_sol::CompressedNftProof;

/// Indexer that knows the current leaf data and proof of compressed NFTs.
#[async_trait]
pub trait NftMetadataService: Send + Sync {
    /// Proof data for the asset `token_address`, `None` if the indexer has
    /// nothing usable.
    async fn fetch_compressed_nft_proof(&self, token_address: &str) -> Option<CompressedNftProof>;
}
