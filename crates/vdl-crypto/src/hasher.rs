use sha2::{Digest as _, Sha256};
use vdl_types::{Block, ChainLink, Confidence, Digest, Label, Timestamp};

/// Canonical digest input: the fields' canonical text forms concatenated in
/// the order `index, timestamp, label, confidence, prev_hash`.
pub fn preimage(
    index: u64,
    timestamp: Timestamp,
    label: Label,
    confidence: Confidence,
    prev_hash: &ChainLink,
) -> String {
    let mut out = String::with_capacity(96);
    out.push_str(&index.to_string());
    out.push_str(&timestamp.canonical());
    out.push_str(label.as_str());
    out.push_str(&confidence.canonical());
    out.push_str(&prev_hash.canonical());
    out
}

/// SHA-256 over the UTF-8 bytes of [`preimage`].
pub fn digest(
    index: u64,
    timestamp: Timestamp,
    label: Label,
    confidence: Confidence,
    prev_hash: &ChainLink,
) -> Digest {
    let input = preimage(index, timestamp, label, confidence, prev_hash);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&Sha256::digest(input.as_bytes()));
    Digest::from_hash(hash)
}

/// Build a block whose `hash` is the digest of its other fields.
pub fn seal(
    index: u64,
    timestamp: Timestamp,
    label: Label,
    confidence: Confidence,
    prev_hash: ChainLink,
) -> Block {
    let hash = digest(index, timestamp, label, confidence, &prev_hash);
    Block {
        index,
        timestamp,
        label,
        confidence,
        prev_hash,
        hash,
    }
}

/// Recompute the digest a block should carry, ignoring its stored `hash`.
pub fn recompute(block: &Block) -> Digest {
    digest(
        block.index,
        block.timestamp,
        block.label,
        block.confidence,
        &block.prev_hash,
    )
}
