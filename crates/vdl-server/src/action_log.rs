use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{ServerError, ServerResult};

/// Local wall-clock format used for action log timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prediction {
    Real,
    Fake,
}

impl Prediction {
    pub fn from_real(is_real: bool) -> Self {
        if is_real {
            Self::Real
        } else {
            Self::Fake
        }
    }
}

/// One upload as seen by an operator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub filename: String,
    pub prediction: Prediction,
    pub timestamp: String,
}

/// JSON-array file of processed uploads.
///
/// This is an operator convenience, not part of the chain: an unreadable or
/// malformed file is treated as empty and rewritten on the next append.
#[derive(Debug)]
pub struct ActionLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ActionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, oldest first.
    pub async fn entries(&self) -> Vec<ActionEntry> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "action log unreadable");
                return Vec::new();
            }
        };
        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(
                path = %self.path.display(),
                error = %e,
                "action log malformed, treating as empty"
            );
            Vec::new()
        })
    }

    /// Append an entry stamped with the current local time.
    pub async fn append(&self, filename: &str, is_real: bool) -> ServerResult<ActionEntry> {
        let entry = ActionEntry {
            filename: filename.to_string(),
            prediction: Prediction::from_real(is_real),
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
        };

        let _guard = self.write_lock.lock().await;
        let mut entries = self.entries().await;
        entries.push(entry.clone());

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(&entries)
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        tokio::fs::write(&self.path, json).await?;
        Ok(entry)
    }
}
