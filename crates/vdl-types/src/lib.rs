//! Foundation types for the Verdict Ledger (VDL).
//!
//! Every other VDL crate depends on `vdl-types`.
//!
//! # Key Types
//!
//! - [`Block`] — One immutable, hash-linked ledger entry
//! - [`Digest`] — 256-bit block digest, hex-encoded on the wire
//! - [`ChainLink`] — Predecessor reference or the `GENESIS` sentinel
//! - [`Timestamp`] — Millisecond wall-clock instant
//! - [`Label`], [`Confidence`], [`Verdict`] — Classifier output

pub mod block;
pub mod digest;
pub mod error;
pub mod timestamp;
pub mod verdict;

pub use block::Block;
pub use digest::{ChainLink, Digest, GENESIS_SENTINEL};
pub use error::TypeError;
pub use timestamp::Timestamp;
pub use verdict::{Confidence, Label, Verdict};
