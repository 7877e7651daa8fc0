use serde::Serialize;
use vdl_crypto::recompute;
use vdl_types::{Block, ChainLink, Digest, Label};

/// Result of a full chain walk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub block_count: u64,
    pub head: Option<Digest>,
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
}

impl ValidationReport {
    /// Returns `true` if no violations were found. Warnings do not count.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// The lowest-index violation, matching what `verify_chain` reports.
    pub fn first_violation(&self) -> Option<&Violation> {
        self.violations.first()
    }
}

/// A specific integrity violation detected during validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub index: u64,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    IndexGap,
    GenesisShape,
    MisplacedGenesis,
    BrokenLink,
    HashMismatch,
}

/// Suspicious but not invalid, e.g. a clock that stepped backwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub index: u64,
    pub description: String,
}

/// Chain integrity validator.
///
/// Unlike [`vdl_crypto::HashChainVerifier`], which stops at the first
/// failure, this walks every block and reports all problems. Links are
/// checked against the stored predecessor, so one tampered block yields a
/// hash mismatch at its own index and nothing downstream unless it was
/// resealed.
pub struct ChainValidator;

impl ChainValidator {
    pub fn validate(blocks: &[Block]) -> ValidationReport {
        let mut violations = Vec::new();
        let mut warnings = Vec::new();

        for (position, block) in blocks.iter().enumerate() {
            let position = position as u64;
            let mut violation = |kind, description: String| {
                violations.push(Violation {
                    index: block.index,
                    kind,
                    description,
                })
            };

            if block.index != position {
                violation(
                    ViolationKind::IndexGap,
                    format!("expected index {position}, got {}", block.index),
                );
            }

            if position == 0 {
                if block.label != Label::Genesis {
                    violation(
                        ViolationKind::GenesisShape,
                        format!("first block has label {}", block.label),
                    );
                }
                if !block.prev_hash.is_genesis() {
                    violation(
                        ViolationKind::GenesisShape,
                        "first block has a predecessor hash".into(),
                    );
                }
            } else {
                let prev = &blocks[position as usize - 1];
                if block.label == Label::Genesis {
                    violation(
                        ViolationKind::MisplacedGenesis,
                        "GENESIS label after the first block".into(),
                    );
                }
                if block.prev_hash != ChainLink::Block(prev.hash) {
                    violation(
                        ViolationKind::BrokenLink,
                        format!("prev_hash {} does not match {}", block.prev_hash, prev.hash),
                    );
                }
                if block.timestamp < prev.timestamp {
                    warnings.push(Warning {
                        index: block.index,
                        description: format!(
                            "timestamp {} precedes previous block's {}",
                            block.timestamp, prev.timestamp
                        ),
                    });
                }
            }

            if recompute(block) != block.hash {
                violation(
                    ViolationKind::HashMismatch,
                    "stored hash does not match computed".into(),
                );
            }
        }

        ValidationReport {
            block_count: blocks.len() as u64,
            head: blocks.last().map(|b| b.hash),
            violations,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use vdl_crypto::seal;
    use vdl_types::{Confidence, Timestamp};

    use super::*;

    fn chain(timestamps: &[u64]) -> Vec<Block> {
        let mut out: Vec<Block> = Vec::new();
        for (i, &ts) in timestamps.iter().enumerate() {
            let (label, prev) = match out.last() {
                None => (Label::Genesis, ChainLink::Genesis),
                Some(last) => (Label::Real, last.link()),
            };
            out.push(seal(i as u64, Timestamp::from_millis(ts), label, Confidence::ONE, prev));
        }
        out
    }

    #[test]
    fn valid_chain_passes() {
        let blocks = chain(&[1, 2, 3]);
        let report = ChainValidator::validate(&blocks);
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
        assert_eq!(report.block_count, 3);
        assert_eq!(report.head, Some(blocks[2].hash));
    }

    #[test]
    fn empty_chain_is_valid() {
        let report = ChainValidator::validate(&[]);
        assert!(report.is_valid());
        assert_eq!(report.block_count, 0);
        assert_eq!(report.head, None);
    }

    #[test]
    fn collects_every_tampered_block() {
        let mut blocks = chain(&[1, 2, 3, 4]);
        blocks[1].label = Label::Fake;
        blocks[3].confidence = Confidence::ZERO;

        let report = ChainValidator::validate(&blocks);
        let indices: Vec<_> = report.violations.iter().map(|v| (v.index, v.kind)).collect();
        assert_eq!(
            indices,
            vec![(1, ViolationKind::HashMismatch), (3, ViolationKind::HashMismatch)]
        );
        assert_eq!(report.first_violation().map(|v| v.index), Some(1));
    }

    #[test]
    fn bad_genesis_shape() {
        let mut blocks = chain(&[1, 2]);
        blocks[0] = seal(
            0,
            Timestamp::from_millis(1),
            Label::Real,
            Confidence::ONE,
            ChainLink::Genesis,
        );

        let report = ChainValidator::validate(&blocks);
        let kinds: Vec<_> = report.violations.iter().map(|v| v.kind).collect();
        assert_eq!(kinds, vec![ViolationKind::GenesisShape, ViolationKind::BrokenLink]);
    }

    #[test]
    fn clock_regression_is_a_warning() {
        let blocks = chain(&[10, 5, 20]);
        let report = ChainValidator::validate(&blocks);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].index, 1);
    }

    #[test]
    fn report_serializes_kinds_in_snake_case() {
        let mut blocks = chain(&[1, 2]);
        blocks[1].label = Label::Genesis;
        let json = serde_json::to_string(&ChainValidator::validate(&blocks)).unwrap();
        assert!(json.contains("\"misplaced_genesis\""));
        assert!(json.contains("\"hash_mismatch\""));
    }
}
