use std::sync::Arc;

use tracing::error;
use vdl_types::Block;

use crate::error::{StoreError, StoreResult};

/// Durable, append-only, index-ordered block collection.
///
/// All implementations must satisfy these invariants:
/// - Blocks are immutable once written; there is no update or delete.
/// - `append` accepts only `block.index == len()` and is all-or-nothing: a
///   failed append leaves no trace of the block.
/// - Readers never observe a partially written block.
/// - Reads return copies and re-read store state on every call.
/// - The store never recomputes or checks digests; that is the ledger's job.
/// - All I/O errors are propagated, never silently ignored.
pub trait BlockStore: Send + Sync {
    /// Persist `block` at the next index.
    fn append(&self, block: &Block) -> StoreResult<()>;

    /// Read the block at `index`, or `None` past the end.
    fn get(&self, index: u64) -> StoreResult<Option<Block>>;

    /// The highest-index block, or `None` if the store is empty.
    fn last_block(&self) -> StoreResult<Option<Block>>;

    /// Number of persisted blocks.
    fn len(&self) -> StoreResult<u64>;

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Every block in ascending index order.
    fn all_blocks(&self) -> StoreResult<Vec<Block>>;

    /// Startup reconstruction of the chain. An empty result tells the
    /// caller to write a genesis block.
    fn load_all(&self) -> StoreResult<Vec<Block>> {
        self.all_blocks()
    }

    /// Flush buffered writes to durable media.
    fn sync(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl<S: BlockStore + ?Sized> BlockStore for Box<S> {
    fn append(&self, block: &Block) -> StoreResult<()> {
        (**self).append(block)
    }
    fn get(&self, index: u64) -> StoreResult<Option<Block>> {
        (**self).get(index)
    }
    fn last_block(&self) -> StoreResult<Option<Block>> {
        (**self).last_block()
    }
    fn len(&self) -> StoreResult<u64> {
        (**self).len()
    }
    fn all_blocks(&self) -> StoreResult<Vec<Block>> {
        (**self).all_blocks()
    }
    fn load_all(&self) -> StoreResult<Vec<Block>> {
        (**self).load_all()
    }
    fn sync(&self) -> StoreResult<()> {
        (**self).sync()
    }
}

impl<S: BlockStore + ?Sized> BlockStore for Arc<S> {
    fn append(&self, block: &Block) -> StoreResult<()> {
        (**self).append(block)
    }
    fn get(&self, index: u64) -> StoreResult<Option<Block>> {
        (**self).get(index)
    }
    fn last_block(&self) -> StoreResult<Option<Block>> {
        (**self).last_block()
    }
    fn len(&self) -> StoreResult<u64> {
        (**self).len()
    }
    fn all_blocks(&self) -> StoreResult<Vec<Block>> {
        (**self).all_blocks()
    }
    fn load_all(&self) -> StoreResult<Vec<Block>> {
        (**self).load_all()
    }
    fn sync(&self) -> StoreResult<()> {
        (**self).sync()
    }
}

/// Shared out-of-sequence guard for backends.
pub(crate) fn check_next_index(expected: u64, block: &Block) -> StoreResult<()> {
    if block.index != expected {
        error!(
            expected,
            found = block.index,
            "rejecting out-of-order block append"
        );
        return Err(StoreError::Ordering {
            expected,
            found: block.index,
        });
    }
    Ok(())
}
