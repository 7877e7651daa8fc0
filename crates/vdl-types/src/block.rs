use std::fmt;

use serde::{Deserialize, Serialize};

use crate::digest::{ChainLink, Digest};
use crate::timestamp::Timestamp;
use crate::verdict::{Confidence, Label};

/// One immutable ledger entry.
///
/// `hash` covers every other field, `prev_hash` included, so editing any
/// field of a persisted block (or of an ancestor) is detectable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain; 0 is genesis.
    pub index: u64,
    pub timestamp: Timestamp,
    pub label: Label,
    pub confidence: Confidence,
    pub prev_hash: ChainLink,
    pub hash: Digest,
}

impl Block {
    /// Returns `true` if this block has the genesis shape.
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.label == Label::Genesis && self.prev_hash.is_genesis()
    }

    /// The link a successor must carry.
    pub fn link(&self) -> ChainLink {
        ChainLink::Block(self.hash)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [{}] {} ({})",
            self.index,
            self.hash.short_hex(),
            self.label,
            self.confidence
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(index: u64, label: Label, prev_hash: ChainLink) -> Block {
        Block {
            index,
            timestamp: Timestamp::from_millis(1_000),
            label,
            confidence: Confidence::ZERO,
            prev_hash,
            hash: Digest::from_hash([index as u8; 32]),
        }
    }

    #[test]
    fn genesis_shape() {
        assert!(block(0, Label::Genesis, ChainLink::Genesis).is_genesis());
        assert!(!block(1, Label::Genesis, ChainLink::Genesis).is_genesis());
        assert!(!block(0, Label::Real, ChainLink::Genesis).is_genesis());
        let linked = ChainLink::Block(Digest::from_hash([0; 32]));
        assert!(!block(0, Label::Genesis, linked).is_genesis());
    }

    #[test]
    fn link_points_at_own_hash() {
        let b = block(3, Label::Fake, ChainLink::Genesis);
        assert_eq!(b.link(), ChainLink::Block(b.hash));
    }

    #[test]
    fn json_exposes_display_fields() {
        let b = block(0, Label::Genesis, ChainLink::Genesis);
        let value = serde_json::to_value(&b).unwrap();
        assert_eq!(value["index"], 0);
        assert_eq!(value["timestamp"], 1_000);
        assert_eq!(value["label"], "GENESIS");
        assert_eq!(value["confidence"], 0.0);
        assert_eq!(value["prev_hash"], "GENESIS");
        assert_eq!(value["hash"], b.hash.to_hex());
    }

    #[test]
    fn bincode_roundtrip_preserves_block() {
        let b = block(2, Label::Real, ChainLink::Block(Digest::from_hash([9; 32])));
        let bytes = bincode::serialize(&b).unwrap();
        let parsed: Block = bincode::deserialize(&bytes).unwrap();
        assert_eq!(parsed, b);
    }
}
