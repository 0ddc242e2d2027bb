//! Recent-blockhash and last-valid-block-height assignment.

use chain_sol::Message;
use tracing::debug;

use crate::block_tracker::BlockTracker;
use crate::error::TxResult;
use crate::rpc::RpcClient;

/// Give `message` a blockhash and expiry height before it is signed.
///
/// A message without a blockhash takes the tracker's latest (cached if
/// fresh) together with its last valid block height. A message that already
/// carries one keeps it, e.g. a durable-nonce value or a hash chosen by a
/// dApp, and expires `threshold` blocks above the current height.
///
/// `message` is only touched once the RPC call succeeded.
pub async fn resolve_blockhash(
    tracker: &BlockTracker,
    rpc: &dyn RpcClient,
    threshold: u64,
    chain_id: &str,
    message: &mut Message,
) -> TxResult<()> {
    if message.recent_blockhash.is_empty() {
        let latest = tracker.latest_blockhash(chain_id, true).await?;
        debug!(chain_id, blockhash = %latest.blockhash, "using tracker blockhash");
        message.recent_blockhash = latest.blockhash;
        message.last_valid_block_height = latest.last_valid_block_height;
    } else {
        let height = rpc.get_block_height(chain_id).await?;
        message.last_valid_block_height = height.saturating_add(threshold);
        debug!(
            chain_id,
            block_height = height,
            last_valid_block_height = message.last_valid_block_height,
            "keeping existing blockhash"
        );
    }
    Ok(())
}
