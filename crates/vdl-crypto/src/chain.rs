use vdl_types::{Block, ChainLink, Label};

use crate::hasher::recompute;

/// Hash chain integrity verifier.
///
/// Verifies that a sequence of blocks forms a valid chain: block 0 has the
/// genesis shape, every block's index equals its position, each block's
/// `prev_hash` matches the previous block's `hash`, and each stored `hash`
/// equals the digest recomputed from the block's fields.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify a whole chain, stopping at the first failure.
    pub fn verify_chain(blocks: &[Block]) -> Result<(), ChainError> {
        let mut previous = None;
        for (position, block) in blocks.iter().enumerate() {
            Self::verify_next(previous, position as u64, block)?;
            previous = Some(block);
        }
        Ok(())
    }

    /// Verify one block given its predecessor (`None` for position 0).
    ///
    /// Lets callers verify a chain incrementally without holding it all.
    pub fn verify_next(
        previous: Option<&Block>,
        position: u64,
        block: &Block,
    ) -> Result<(), ChainError> {
        if block.index != position {
            return Err(ChainError::IndexGap {
                position,
                found: block.index,
            });
        }

        match previous {
            None => {
                if block.label != Label::Genesis {
                    return Err(ChainError::GenesisLabel {
                        found: block.label.to_string(),
                    });
                }
                if !block.prev_hash.is_genesis() {
                    return Err(ChainError::GenesisLink);
                }
            }
            Some(prev) => {
                match block.prev_hash {
                    ChainLink::Block(digest) if digest == prev.hash => {}
                    ChainLink::Block(_) => {
                        return Err(ChainError::BrokenLink { index: block.index })
                    }
                    ChainLink::Genesis => {
                        return Err(ChainError::MissingPrevHash { index: block.index })
                    }
                }
                if block.label == Label::Genesis {
                    return Err(ChainError::MisplacedGenesis { index: block.index });
                }
            }
        }

        if recompute(block) != block.hash {
            return Err(ChainError::HashMismatch { index: block.index });
        }

        Ok(())
    }
}

/// Errors from chain verification. Each names the offending block index.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("block 0 has label {found}, expected GENESIS")]
    GenesisLabel { found: String },

    #[error("block 0 has a predecessor hash (should be the GENESIS sentinel)")]
    GenesisLink,

    #[error("index gap at position {position}: found index {found}")]
    IndexGap { position: u64, found: u64 },

    #[error("broken link at index {index}: prev_hash does not match")]
    BrokenLink { index: u64 },

    #[error("missing prev_hash at index {index} (should reference previous block)")]
    MissingPrevHash { index: u64 },

    #[error("GENESIS label on non-genesis block {index}")]
    MisplacedGenesis { index: u64 },

    #[error("hash mismatch at index {index}: computed hash differs from stored")]
    HashMismatch { index: u64 },
}

impl ChainError {
    /// Index of the first block that failed verification.
    pub fn index(&self) -> u64 {
        match self {
            Self::GenesisLabel { .. } | Self::GenesisLink => 0,
            Self::IndexGap { position, .. } => *position,
            Self::BrokenLink { index }
            | Self::MissingPrevHash { index }
            | Self::MisplacedGenesis { index }
            | Self::HashMismatch { index } => *index,
        }
    }
}
