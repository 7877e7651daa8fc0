/// Errors from block store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A block was presented out of sequence.
    #[error("out-of-order append: expected index {expected}, got {found}")]
    Ordering { expected: u64, found: u64 },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Persisted data failed a framing or checksum check.
    #[error("corrupt block record at {location}: {reason}")]
    Corrupt { location: String, reason: String },

    /// The backend cannot serve requests (e.g. a poisoned lock).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Error reported by the SQLite engine.
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Returns `true` for the out-of-sequence guard, which signals a bug
    /// upstream rather than a backend failure.
    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::Ordering { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
