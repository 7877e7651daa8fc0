use serde::Serialize;
use vdl_types::{Block, Label, Timestamp};

/// Verdict counts and chain position, reconstructed from blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerdictSummary {
    /// Blocks including genesis.
    pub block_count: u64,
    pub real_count: u64,
    pub fake_count: u64,
    pub head: Option<Block>,
    pub first_verdict_at: Option<Timestamp>,
    pub last_verdict_at: Option<Timestamp>,
}

impl VerdictSummary {
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let mut real_count = 0;
        let mut fake_count = 0;
        let mut first_verdict_at = None;
        let mut last_verdict_at = None;

        for block in blocks {
            match block.label {
                Label::Real => real_count += 1,
                Label::Fake => fake_count += 1,
                Label::Genesis => continue,
            }
            first_verdict_at.get_or_insert(block.timestamp);
            last_verdict_at = Some(block.timestamp);
        }

        Self {
            block_count: blocks.len() as u64,
            real_count,
            fake_count,
            head: blocks.last().cloned(),
            first_verdict_at,
            last_verdict_at,
        }
    }

    pub fn verdict_count(&self) -> u64 {
        self.real_count + self.fake_count
    }

    /// Share of verdicts labelled `FAKE`, or `None` with no verdicts.
    pub fn fake_ratio(&self) -> Option<f64> {
        match self.verdict_count() {
            0 => None,
            n => Some(self.fake_count as f64 / n as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use vdl_crypto::seal;
    use vdl_types::{ChainLink, Confidence};

    use super::*;

    fn chain(labels: &[Label]) -> Vec<Block> {
        let mut out: Vec<Block> = Vec::new();
        for (i, &label) in labels.iter().enumerate() {
            let prev = out.last().map(Block::link).unwrap_or(ChainLink::Genesis);
            let ts = Timestamp::from_millis(100 * i as u64);
            out.push(seal(i as u64, ts, label, Confidence::ONE, prev));
        }
        out
    }

    #[test]
    fn genesis_only() {
        let summary = VerdictSummary::from_blocks(&chain(&[Label::Genesis]));
        assert_eq!(summary.block_count, 1);
        assert_eq!(summary.verdict_count(), 0);
        assert_eq!(summary.first_verdict_at, None);
        assert_eq!(summary.fake_ratio(), None);
        assert!(summary.head.unwrap().is_genesis());
    }

    #[test]
    fn counts_and_bounds() {
        let blocks = chain(&[Label::Genesis, Label::Real, Label::Fake, Label::Fake, Label::Real]);
        let summary = VerdictSummary::from_blocks(&blocks);

        assert_eq!(summary.real_count, 2);
        assert_eq!(summary.fake_count, 2);
        assert_eq!(summary.first_verdict_at, Some(Timestamp::from_millis(100)));
        assert_eq!(summary.last_verdict_at, Some(Timestamp::from_millis(400)));
        assert_eq!(summary.head.as_ref(), blocks.last());
        assert_eq!(summary.fake_ratio(), Some(0.5));
    }

    #[test]
    fn empty_input() {
        let summary = VerdictSummary::from_blocks(&[]);
        assert_eq!(summary.block_count, 0);
        assert!(summary.head.is_none());
    }
}
