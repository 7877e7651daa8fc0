use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info, warn};
use vdl_crypto::{seal, HashChainVerifier};
use vdl_store::BlockStore;
use vdl_types::{Block, ChainLink, Confidence, Label, Timestamp, Verdict};

use crate::error::{LedgerError, LedgerResult};
use crate::projection::VerdictSummary;
use crate::validation::{ChainValidator, ValidationReport};

/// The verdict ledger.
///
/// Owns a [`BlockStore`] and a read cache of the chain. Created
/// uninitialized; [`initialize`](Self::initialize) either writes the genesis
/// block into an empty store or loads the existing chain, after which the
/// ledger is ready. Every other operation on an uninitialized ledger fails
/// with [`LedgerError::NotInitialized`].
///
/// `record_verdict` holds the exclusive lock across read-last, seal and
/// append, so concurrent callers never produce two blocks with the same
/// index or predecessor.
pub struct Ledger<S> {
    store: S,
    state: RwLock<LedgerState>,
}

enum LedgerState {
    Uninitialized,
    Ready { chain: Vec<Block> },
}

impl<S: BlockStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: RwLock::new(LedgerState::Uninitialized),
        }
    }

    /// Write genesis into an empty store, or load the stored chain.
    ///
    /// The loaded chain is not verified here; call
    /// [`verify_chain`](Self::verify_chain) for that. Calling this on a
    /// ready ledger is a no-op.
    pub fn initialize(&self) -> LedgerResult<()> {
        let mut state = self.write_state()?;
        if matches!(*state, LedgerState::Ready { .. }) {
            debug!("ledger already initialized");
            return Ok(());
        }

        let mut chain = self.store.load_all()?;
        if chain.is_empty() {
            let genesis = seal(
                0,
                Timestamp::now(),
                Label::Genesis,
                Confidence::ZERO,
                ChainLink::Genesis,
            );
            self.store.append(&genesis)?;
            info!(hash = %genesis.hash.short_hex(), "genesis block written");
            chain.push(genesis);
        } else {
            info!(blocks = chain.len(), "ledger loaded from store");
        }

        *state = LedgerState::Ready { chain };
        Ok(())
    }

    /// Append a new block recording `label` with `confidence`.
    ///
    /// The block links to the current head, takes the next index, and is
    /// stamped no earlier than the head's timestamp. On any store failure
    /// nothing is recorded and the cache is left untouched.
    pub fn record_verdict(&self, label: Label, confidence: Confidence) -> LedgerResult<Block> {
        let verdict = Verdict::new(label, confidence)?;
        self.record(&verdict)
    }

    /// [`record_verdict`](Self::record_verdict) for an already-validated
    /// verdict.
    pub fn record(&self, verdict: &Verdict) -> LedgerResult<Block> {
        let mut state = self.write_state()?;
        let LedgerState::Ready { chain } = &mut *state else {
            return Err(LedgerError::NotInitialized);
        };

        let (index, prev_hash, floor) = match chain.last() {
            Some(last) => (last.index + 1, last.link(), last.timestamp),
            None => (0, ChainLink::Genesis, Timestamp::from_millis(0)),
        };
        let block = seal(
            index,
            Timestamp::now_not_before(floor),
            verdict.label,
            verdict.confidence,
            prev_hash,
        );

        if let Err(e) = self.store.append(&block) {
            error!(index, error = %e, "verdict append failed");
            return Err(e.into());
        }
        chain.push(block.clone());

        info!(
            index,
            label = %block.label,
            confidence = %block.confidence,
            hash = %block.hash.short_hex(),
            "verdict recorded"
        );
        Ok(block)
    }

    /// Walk the stored chain and fail on the first offending block.
    ///
    /// Reads from the store rather than the cache, so tampering with
    /// persisted blocks is detected.
    pub fn verify_chain(&self) -> LedgerResult<()> {
        let blocks = self.history()?;
        match HashChainVerifier::verify_chain(&blocks) {
            Ok(()) => {
                debug!(blocks = blocks.len(), "chain verified");
                Ok(())
            }
            Err(e) => {
                warn!(index = e.index(), error = %e, "chain verification failed");
                Err(e.into())
            }
        }
    }

    /// Walk the stored chain collecting every violation and warning.
    pub fn validate(&self) -> LedgerResult<ValidationReport> {
        let blocks = self.history()?;
        Ok(ChainValidator::validate(&blocks))
    }

    /// All stored blocks in index order, re-read from the store.
    pub fn history(&self) -> LedgerResult<Vec<Block>> {
        self.ensure_ready()?;
        Ok(self.store.all_blocks()?)
    }

    /// The stored block at `index`.
    pub fn block(&self, index: u64) -> LedgerResult<Option<Block>> {
        self.ensure_ready()?;
        Ok(self.store.get(index)?)
    }

    /// The cached head of the chain.
    pub fn head(&self) -> LedgerResult<Option<Block>> {
        let state = self.read_state()?;
        match &*state {
            LedgerState::Ready { chain } => Ok(chain.last().cloned()),
            LedgerState::Uninitialized => Err(LedgerError::NotInitialized),
        }
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> LedgerResult<u64> {
        let state = self.read_state()?;
        match &*state {
            LedgerState::Ready { chain } => Ok(chain.len() as u64),
            LedgerState::Uninitialized => Err(LedgerError::NotInitialized),
        }
    }

    pub fn summary(&self) -> LedgerResult<VerdictSummary> {
        Ok(VerdictSummary::from_blocks(&self.history()?))
    }

    pub fn is_ready(&self) -> bool {
        self.state
            .read()
            .map(|s| matches!(*s, LedgerState::Ready { .. }))
            .unwrap_or(false)
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Flush the store and release the ledger.
    pub fn shutdown(self) -> LedgerResult<()> {
        self.ensure_ready()?;
        self.store.sync()?;
        info!("ledger shut down");
        Ok(())
    }

    fn ensure_ready(&self) -> LedgerResult<()> {
        match *self.read_state()? {
            LedgerState::Ready { .. } => Ok(()),
            LedgerState::Uninitialized => Err(LedgerError::NotInitialized),
        }
    }

    fn read_state(&self) -> LedgerResult<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| LedgerError::LockPoisoned("state read"))
    }

    fn write_state(&self) -> LedgerResult<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|_| LedgerError::LockPoisoned("state write"))
    }
}

impl<S> std::fmt::Debug for Ledger<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let blocks = self.state.read().ok().and_then(|s| match &*s {
            LedgerState::Ready { chain } => Some(chain.len()),
            LedgerState::Uninitialized => None,
        });
        f.debug_struct("Ledger").field("blocks", &blocks).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use vdl_crypto::ChainError;
    use vdl_store::{FileBlockStore, FileStoreConfig, InMemoryBlockStore, StoreError, StoreResult};

    use super::*;

    fn ready_ledger() -> Ledger<InMemoryBlockStore> {
        let ledger = Ledger::new(InMemoryBlockStore::new());
        ledger.initialize().unwrap();
        ledger
    }

    fn conf(value: f64) -> Confidence {
        Confidence::new(value).unwrap()
    }

    /// Store wrapper whose next append fails when armed.
    struct FlakyStore {
        inner: InMemoryBlockStore,
        fail_next: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: InMemoryBlockStore::new(),
                fail_next: AtomicBool::new(false),
            }
        }

        fn arm(&self) {
            self.fail_next.store(true, Ordering::SeqCst);
        }
    }

    impl BlockStore for FlakyStore {
        fn append(&self, block: &Block) -> StoreResult<()> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "injected write failure",
                )));
            }
            self.inner.append(block)
        }
        fn get(&self, index: u64) -> StoreResult<Option<Block>> {
            self.inner.get(index)
        }
        fn last_block(&self) -> StoreResult<Option<Block>> {
            self.inner.last_block()
        }
        fn len(&self) -> StoreResult<u64> {
            self.inner.len()
        }
        fn all_blocks(&self) -> StoreResult<Vec<Block>> {
            self.inner.all_blocks()
        }
    }

    #[test]
    fn initialize_writes_genesis() {
        let ledger = ready_ledger();
        let history = ledger.history().unwrap();

        assert_eq!(history.len(), 1);
        let genesis = &history[0];
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.label, Label::Genesis);
        assert_eq!(genesis.confidence, Confidence::ZERO);
        assert_eq!(genesis.prev_hash, ChainLink::Genesis);
        assert!(genesis.is_genesis());
        ledger.verify_chain().unwrap();
    }

    #[test]
    fn initialize_twice_is_noop() {
        let ledger = ready_ledger();
        ledger.initialize().unwrap();
        assert_eq!(ledger.len().unwrap(), 1);
    }

    #[test]
    fn operations_require_initialize() {
        let ledger = Ledger::new(InMemoryBlockStore::new());
        assert!(!ledger.is_ready());
        assert!(matches!(
            ledger.record_verdict(Label::Real, Confidence::ONE),
            Err(LedgerError::NotInitialized)
        ));
        assert!(matches!(ledger.verify_chain(), Err(LedgerError::NotInitialized)));
        assert!(matches!(ledger.history(), Err(LedgerError::NotInitialized)));
        assert!(matches!(ledger.head(), Err(LedgerError::NotInitialized)));
        assert!(ledger.store().is_empty().unwrap());
    }

    #[test]
    fn genesis_label_is_not_a_verdict() {
        let ledger = ready_ledger();
        let err = ledger
            .record_verdict(Label::Genesis, Confidence::ZERO)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidVerdict(_)));
        assert_eq!(ledger.len().unwrap(), 1);
    }

    #[test]
    fn real_then_fake_then_verify() {
        let ledger = ready_ledger();

        let real = ledger.record_verdict(Label::Real, Confidence::ONE).unwrap();
        let fake = ledger.record_verdict(Label::Fake, Confidence::ZERO).unwrap();
        ledger.verify_chain().unwrap();

        let history = ledger.history().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], real);
        assert_eq!(history[2], fake);
        assert_eq!(real.index, 1);
        assert_eq!(fake.index, 2);
        assert_eq!(real.prev_hash, history[0].link());
        assert_eq!(fake.prev_hash, real.link());
        assert_eq!(ledger.head().unwrap(), Some(fake));
    }

    #[test]
    fn k_verdicts_give_k_plus_one_blocks() {
        let ledger = ready_ledger();
        for i in 0..20u32 {
            let label = if i % 3 == 0 { Label::Fake } else { Label::Real };
            ledger.record_verdict(label, conf(f64::from(i) / 20.0)).unwrap();
        }

        let history = ledger.history().unwrap();
        assert_eq!(history.len(), 21);
        for (position, block) in history.iter().enumerate() {
            assert_eq!(block.index, position as u64);
        }
        for pair in history.windows(2) {
            assert_eq!(pair[1].prev_hash, pair[0].link());
            assert!(pair[1].timestamp >= pair[0].timestamp);
        }
        ledger.verify_chain().unwrap();
    }

    #[test]
    fn failed_append_records_nothing() {
        let ledger = Ledger::new(FlakyStore::new());
        ledger.initialize().unwrap();
        ledger.record_verdict(Label::Real, Confidence::ONE).unwrap();
        let before = ledger.history().unwrap();

        ledger.store().arm();
        let err = ledger
            .record_verdict(Label::Fake, Confidence::ZERO)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Storage(StoreError::Io(_))));
        assert_eq!(ledger.history().unwrap(), before);
        assert_eq!(ledger.len().unwrap(), 2);

        let next = ledger.record_verdict(Label::Fake, Confidence::ZERO).unwrap();
        assert_eq!(next.index, 2);
        assert_eq!(next.prev_hash, before[1].link());
        ledger.verify_chain().unwrap();
    }

    #[test]
    fn tampered_label_detected_at_index() {
        let ledger = ready_ledger();
        ledger.record_verdict(Label::Real, Confidence::ONE).unwrap();
        ledger.record_verdict(Label::Fake, Confidence::ZERO).unwrap();
        ledger.record_verdict(Label::Real, Confidence::ONE).unwrap();

        let mut blocks = ledger.history().unwrap();
        blocks[2].label = Label::Real;

        let tampered = Ledger::new(InMemoryBlockStore::from_blocks(blocks).unwrap());
        tampered.initialize().unwrap();
        let err = tampered.verify_chain().unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Integrity(ChainError::HashMismatch { index: 2 })
        ));
        assert_eq!(err.offending_index(), Some(2));
    }

    #[test]
    fn tampered_confidence_detected_in_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("original.log");
        let forged = dir.path().join("forged.log");

        let ledger =
            Ledger::new(FileBlockStore::open(&original, FileStoreConfig::default()).unwrap());
        ledger.initialize().unwrap();
        ledger.record_verdict(Label::Fake, conf(0.9)).unwrap();
        ledger.record_verdict(Label::Real, conf(0.6)).unwrap();
        let mut blocks = ledger.history().unwrap();
        ledger.shutdown().unwrap();

        blocks[1].confidence = conf(0.1);
        let store = FileBlockStore::open(&forged, FileStoreConfig::default()).unwrap();
        for b in &blocks {
            store.append(b).unwrap();
        }
        drop(store);

        let reopened =
            Ledger::new(FileBlockStore::open(&forged, FileStoreConfig::default()).unwrap());
        reopened.initialize().unwrap();
        let err = reopened.verify_chain().unwrap_err();
        assert_eq!(err.offending_index(), Some(1));
    }

    #[test]
    fn resealed_block_breaks_next_link() {
        let ledger = ready_ledger();
        ledger.record_verdict(Label::Real, Confidence::ONE).unwrap();
        ledger.record_verdict(Label::Real, Confidence::ONE).unwrap();

        let mut blocks = ledger.history().unwrap();
        let b = blocks[1].clone();
        blocks[1] = seal(b.index, b.timestamp, Label::Fake, Confidence::ZERO, b.prev_hash);

        let tampered = Ledger::new(InMemoryBlockStore::from_blocks(blocks).unwrap());
        tampered.initialize().unwrap();
        let err = tampered.verify_chain().unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Integrity(ChainError::BrokenLink { index: 2 })
        ));
    }

    #[test]
    fn reopen_file_store_continues_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.log");

        let ledger = Ledger::new(FileBlockStore::open(&path, FileStoreConfig::default()).unwrap());
        ledger.initialize().unwrap();
        let first = ledger.record_verdict(Label::Real, Confidence::ONE).unwrap();
        ledger.shutdown().unwrap();

        let ledger = Ledger::new(FileBlockStore::open(&path, FileStoreConfig::default()).unwrap());
        ledger.initialize().unwrap();
        assert_eq!(ledger.len().unwrap(), 2);
        let second = ledger.record_verdict(Label::Fake, Confidence::ZERO).unwrap();
        assert_eq!(second.index, 2);
        assert_eq!(second.prev_hash, first.link());
        ledger.verify_chain().unwrap();
    }

    #[test]
    fn timestamp_never_precedes_head() {
        let future = Timestamp::from_millis(Timestamp::now().as_millis() + 3_600_000);
        let genesis = seal(0, future, Label::Genesis, Confidence::ZERO, ChainLink::Genesis);
        let ledger = Ledger::new(InMemoryBlockStore::from_blocks(vec![genesis]).unwrap());
        ledger.initialize().unwrap();

        let block = ledger.record_verdict(Label::Real, Confidence::ONE).unwrap();
        assert!(block.timestamp >= future);
        ledger.verify_chain().unwrap();
    }

    #[test]
    fn concurrent_records_stay_linked() {
        let ledger = Arc::new(ready_ledger());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        let label = if t % 2 == 0 { Label::Real } else { Label::Fake };
                        ledger.record_verdict(label, Confidence::ONE).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(ledger.len().unwrap(), 81);
        ledger.verify_chain().unwrap();
    }

    #[test]
    fn summary_counts_verdicts() {
        let ledger = ready_ledger();
        ledger.record_verdict(Label::Real, Confidence::ONE).unwrap();
        ledger.record_verdict(Label::Real, conf(0.75)).unwrap();
        ledger.record_verdict(Label::Fake, Confidence::ZERO).unwrap();

        let summary = ledger.summary().unwrap();
        assert_eq!(summary.real_count, 2);
        assert_eq!(summary.fake_count, 1);
        assert_eq!(summary.block_count, 4);
    }

    #[test]
    fn block_lookup_by_index() {
        let ledger = ready_ledger();
        let real = ledger.record_verdict(Label::Real, Confidence::ONE).unwrap();
        assert_eq!(ledger.block(1).unwrap(), Some(real));
        assert_eq!(ledger.block(7).unwrap(), None);
    }

    #[test]
    fn debug_reports_block_count() {
        let ledger = ready_ledger();
        assert!(format!("{ledger:?}").contains("Some(1)"));
    }
}
