//! Append-only verdict ledger for the Verdict Ledger (VDL).
//!
//! This crate is the heart of VDL. It provides:
//! - [`Ledger`], the owned orchestrator that writes the genesis block,
//!   links and seals each verdict, and verifies the stored chain
//! - Full-walk validation that collects every violation ([`ChainValidator`])
//! - The verdict summary projection ([`VerdictSummary`])
//!
//! The ledger is generic over any [`vdl_store::BlockStore`]; the store is the
//! durable owner of blocks and the ledger keeps only a read cache.

pub mod error;
pub mod ledger;
pub mod projection;
pub mod validation;

pub use error::{LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use projection::VerdictSummary;
pub use validation::{ChainValidator, ValidationReport, Violation, ViolationKind, Warning};
