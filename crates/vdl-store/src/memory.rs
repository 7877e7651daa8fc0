use std::sync::RwLock;

use vdl_types::Block;

use crate::error::{StoreError, StoreResult};
use crate::traits::{check_next_index, BlockStore};

/// In-memory, `Vec`-backed block store.
///
/// Intended for tests and embedding. Blocks are held behind a `RwLock` and
/// cloned on read and write. Nothing survives the process.
pub struct InMemoryBlockStore {
    blocks: RwLock<Vec<Block>>,
}

impl InMemoryBlockStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(Vec::new()),
        }
    }

    /// Seed a store with already-persisted blocks, e.g. an export.
    ///
    /// Only index continuity is checked; digests are left for the ledger to
    /// verify.
    pub fn from_blocks(blocks: Vec<Block>) -> StoreResult<Self> {
        for (position, block) in blocks.iter().enumerate() {
            check_next_index(position as u64, block)?;
        }
        Ok(Self {
            blocks: RwLock::new(blocks),
        })
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("in-memory store lock poisoned".into())
    }
}

impl Default for InMemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn append(&self, block: &Block) -> StoreResult<()> {
        let mut blocks = self.blocks.write().map_err(|_| Self::poisoned())?;
        check_next_index(blocks.len() as u64, block)?;
        blocks.push(block.clone());
        Ok(())
    }

    fn get(&self, index: u64) -> StoreResult<Option<Block>> {
        let blocks = self.blocks.read().map_err(|_| Self::poisoned())?;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|i| blocks.get(i))
            .cloned())
    }

    fn last_block(&self) -> StoreResult<Option<Block>> {
        let blocks = self.blocks.read().map_err(|_| Self::poisoned())?;
        Ok(blocks.last().cloned())
    }

    fn len(&self) -> StoreResult<u64> {
        let blocks = self.blocks.read().map_err(|_| Self::poisoned())?;
        Ok(blocks.len() as u64)
    }

    fn all_blocks(&self) -> StoreResult<Vec<Block>> {
        let blocks = self.blocks.read().map_err(|_| Self::poisoned())?;
        Ok(blocks.clone())
    }
}

impl std::fmt::Debug for InMemoryBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.blocks.read().map(|b| b.len()).unwrap_or_default();
        f.debug_struct("InMemoryBlockStore")
            .field("block_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdl_crypto::seal;
    use vdl_types::{ChainLink, Confidence, Label, Timestamp};

    fn chain(count: u64) -> Vec<Block> {
        let mut out = Vec::new();
        let mut prev = ChainLink::Genesis;
        for i in 0..count {
            let label = if i == 0 { Label::Genesis } else { Label::Real };
            let block = seal(i, Timestamp::from_millis(i), label, Confidence::ONE, prev);
            prev = block.link();
            out.push(block);
        }
        out
    }

    #[test]
    fn empty_store() {
        let store = InMemoryBlockStore::new();
        assert!(store.is_empty().unwrap());
        assert!(store.last_block().unwrap().is_none());
        assert!(store.get(0).unwrap().is_none());
        assert!(store.all_blocks().unwrap().is_empty());
    }

    #[test]
    fn append_and_read_back() {
        let store = InMemoryBlockStore::new();
        let blocks = chain(3);
        for b in &blocks {
            store.append(b).unwrap();
        }

        assert_eq!(store.len().unwrap(), 3);
        assert_eq!(store.get(1).unwrap().as_ref(), Some(&blocks[1]));
        assert_eq!(store.last_block().unwrap().as_ref(), Some(&blocks[2]));
        assert_eq!(store.all_blocks().unwrap(), blocks);
        assert_eq!(store.load_all().unwrap(), blocks);
    }

    #[test]
    fn out_of_order_append_rejected() {
        let store = InMemoryBlockStore::new();
        let blocks = chain(3);
        store.append(&blocks[0]).unwrap();

        let err = store.append(&blocks[2]).unwrap_err();
        assert!(matches!(err, StoreError::Ordering { expected: 1, found: 2 }));
        assert!(err.is_ordering());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn duplicate_index_rejected() {
        let store = InMemoryBlockStore::new();
        let blocks = chain(1);
        store.append(&blocks[0]).unwrap();
        assert!(store.append(&blocks[0]).unwrap_err().is_ordering());
    }

    #[test]
    fn from_blocks_checks_continuity() {
        let mut blocks = chain(3);
        let store = InMemoryBlockStore::from_blocks(blocks.clone()).unwrap();
        assert_eq!(store.len().unwrap(), 3);

        blocks.remove(1);
        assert!(InMemoryBlockStore::from_blocks(blocks).is_err());
    }

    #[test]
    fn reads_return_copies() {
        let store = InMemoryBlockStore::from_blocks(chain(2)).unwrap();
        let mut copy = store.all_blocks().unwrap();
        copy[1].label = Label::Fake;
        assert_eq!(store.get(1).unwrap().unwrap().label, Label::Real);
    }

    #[test]
    fn debug_shows_count() {
        let store = InMemoryBlockStore::from_blocks(chain(2)).unwrap();
        assert!(format!("{store:?}").contains("block_count: 2"));
    }
}
