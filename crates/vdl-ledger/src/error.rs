use vdl_crypto::ChainError;
use vdl_store::StoreError;
use vdl_types::TypeError;

/// Errors produced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The block store failed; the verdict was not recorded.
    #[error("storage error: {0}")]
    Storage(#[source] StoreError),

    /// The stored chain failed verification.
    #[error("integrity violation: {0}")]
    Integrity(#[from] ChainError),

    /// The store refused a block presented out of sequence.
    #[error("out-of-order append: expected index {expected}, found {found}")]
    Ordering { expected: u64, found: u64 },

    #[error("ledger has not been initialized")]
    NotInitialized,

    #[error("ledger {0} lock poisoned")]
    LockPoisoned(&'static str),

    #[error("invalid verdict: {0}")]
    InvalidVerdict(#[from] TypeError),
}

impl LedgerError {
    /// Index of the first offending block for integrity failures.
    pub fn offending_index(&self) -> Option<u64> {
        match self {
            Self::Integrity(e) => Some(e.index()),
            _ => None,
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Ordering { expected, found } => Self::Ordering { expected, found },
            other => Self::Storage(other),
        }
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_ordering_maps_to_ledger_ordering() {
        let err: LedgerError = StoreError::Ordering { expected: 3, found: 5 }.into();
        assert!(matches!(err, LedgerError::Ordering { expected: 3, found: 5 }));
    }

    #[test]
    fn other_store_errors_map_to_storage() {
        let err: LedgerError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, LedgerError::Storage(_)));
        assert_eq!(err.offending_index(), None);
    }

    #[test]
    fn integrity_reports_index() {
        let err: LedgerError = ChainError::HashMismatch { index: 4 }.into();
        assert_eq!(err.offending_index(), Some(4));
        assert!(err.to_string().contains("index 4"));
    }
}
