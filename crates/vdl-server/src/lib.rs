//! HTTP upload service for the Verdict Ledger.
//!
//! Accepts audio clips, classifies them through a pluggable [`Classifier`],
//! records each verdict as a block in the ledger, and serves the chain,
//! validation report, summary, and operator action log as JSON.

pub mod action_log;
pub mod classifier;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use action_log::{ActionEntry, ActionLog, Prediction};
pub use classifier::{parse_prediction, Classifier, CommandClassifier};
pub use config::{ClassifierConfig, ServerConfig, StoreBackend, StoreConfig, UploadConfig};
pub use error::{ServerError, ServerResult};
pub use handler::{AppState, SharedLedger};
pub use server::VdlServer;
