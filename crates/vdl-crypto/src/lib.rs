//! Hash-chain primitives for the Verdict Ledger.
//!
//! Provides the SHA-256 block digest and the verifier that walks a chain
//! checking genesis shape, index continuity, predecessor links, and digests.
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod chain;
pub mod hasher;

pub use chain::{ChainError, HashChainVerifier};
pub use hasher::{digest, preimage, recompute, seal};
