//! Append-only block storage for the Verdict Ledger.
//!
//! A block store is the sole durable owner of the chain. It keeps blocks in
//! index order, accepts only the next index, and never interprets block
//! contents beyond that.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlockStore`] trait:
//!
//! - [`InMemoryBlockStore`] -- `Vec`-based store for tests and embedding
//! - [`FileBlockStore`] -- length/CRC-framed append-only log file
//! - `SqliteBlockStore` -- one row per block (feature `sqlite`)
//!
//! # Design Rules
//!
//! 1. Blocks are immutable once written; there is no update or delete.
//! 2. Appends are all-or-nothing.
//! 3. Readers never see a partially written block.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::{FileBlockStore, FileStoreConfig, SyncMode};
pub use memory::InMemoryBlockStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBlockStore;
pub use traits::BlockStore;
