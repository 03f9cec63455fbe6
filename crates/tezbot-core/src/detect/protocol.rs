//! Protocol-change detector.

use tracing::debug;

use crate::chain::ChainService;
use crate::error::ListenerError;
use crate::events::GovernanceEvent;
use crate::types::{Block, BlockRef};

/// Compare `block`'s protocol with its predecessor's.
///
/// `last_block` is the block the listener processed before this one. When it
/// is absent the predecessor is fetched by hash. Emits at most one event.
pub async fn detect_protocol_change<C: ChainService + ?Sized>(
    service: &C,
    chain: &str,
    block: &Block,
    last_block: Option<&Block>,
) -> Result<Option<GovernanceEvent>, ListenerError> {
    debug!(block = %block.hash, "inspecting block for protocol changes");

    let previous_protocol = match last_block {
        Some(prev) => prev.protocol.clone(),
        None => {
            let pred = BlockRef(block.header.predecessor.clone());
            service.get_block(chain, &pred).await?.protocol
        }
    };

    if previous_protocol == block.protocol {
        return Ok(None);
    }

    Ok(Some(GovernanceEvent::ProtocolChange {
        protocol: block.protocol.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{empty_block, MemoryChain};

    #[tokio::test]
    async fn change_against_fetched_predecessor() {
        let chain = MemoryChain::new();
        chain.insert_block(empty_block(9, "BL9", "BL8", "P1"));
        let block = empty_block(10, "BL10", "BL9", "P2");

        let event = detect_protocol_change(&chain, "main", &block, None)
            .await
            .unwrap();
        assert_eq!(
            event,
            Some(GovernanceEvent::ProtocolChange { protocol: "P2".into() })
        );
        assert_eq!(chain.block_requests(), vec![BlockRef::from("BL9")]);
    }

    #[tokio::test]
    async fn same_protocol_emits_nothing() {
        let chain = MemoryChain::new();
        chain.insert_block(empty_block(9, "BL9", "BL8", "P1"));
        let block = empty_block(10, "BL10", "BL9", "P1");
        let event = detect_protocol_change(&chain, "main", &block, None)
            .await
            .unwrap();
        assert!(event.is_none());
    }

    #[tokio::test]
    async fn last_block_skips_the_lookup() {
        let chain = MemoryChain::new();
        let last = empty_block(9, "BL9", "BL8", "P1");
        let block = empty_block(10, "BL10", "BL9", "P2");

        let event = detect_protocol_change(&chain, "main", &block, Some(&last))
            .await
            .unwrap();
        assert!(event.is_some());
        assert!(chain.block_requests().is_empty());
    }

    #[tokio::test]
    async fn missing_predecessor_is_an_error() {
        let chain = MemoryChain::new();
        let block = empty_block(10, "BL10", "BL9", "P2");
        assert!(detect_protocol_change(&chain, "main", &block, None)
            .await
            .is_err());
    }
}
