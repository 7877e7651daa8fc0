use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use vdl_store::{BlockStore, FileBlockStore, FileStoreConfig, InMemoryBlockStore, SyncMode};

use crate::error::{ServerError, ServerResult};

/// Service configuration, loaded from TOML. Every field has a default, so an
/// empty file is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory holding the chain and, unless overridden, the action log.
    pub data_dir: PathBuf,
    pub store: StoreConfig,
    pub upload: UploadConfig,
    pub classifier: ClassifierConfig,
    /// Action log path; defaults to `<data_dir>/actions.json`.
    pub action_log: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            data_dir: PathBuf::from("data"),
            store: StoreConfig::default(),
            upload: UploadConfig::default(),
            classifier: ClassifierConfig::default(),
            action_log: None,
        }
    }
}

impl ServerConfig {
    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn action_log_path(&self) -> PathBuf {
        self.action_log
            .clone()
            .unwrap_or_else(|| self.data_dir.join("actions.json"))
    }

    /// Where the configured backend keeps its blocks, if anywhere.
    pub fn chain_path(&self) -> Option<PathBuf> {
        match self.store.backend {
            StoreBackend::Memory => None,
            StoreBackend::File => Some(self.data_dir.join("chain.log")),
            StoreBackend::Sqlite => Some(self.data_dir.join("blockchain.db")),
        }
    }

    /// Open the configured block store.
    pub fn open_store(&self) -> ServerResult<Box<dyn BlockStore>> {
        let store: Box<dyn BlockStore> = match (self.store.backend, self.chain_path()) {
            (StoreBackend::File, Some(path)) => {
                let config = FileStoreConfig {
                    sync_mode: self.store.sync,
                };
                Box::new(FileBlockStore::open(&path, config)?)
            }
            #[cfg(feature = "sqlite")]
            (StoreBackend::Sqlite, Some(path)) => Box::new(vdl_store::SqliteBlockStore::open(
                &path,
                self.store.busy_timeout(),
            )?),
            #[cfg(not(feature = "sqlite"))]
            (StoreBackend::Sqlite, _) => {
                return Err(ServerError::Config(
                    "sqlite backend requested but built without the `sqlite` feature".into(),
                ))
            }
            _ => Box::new(InMemoryBlockStore::new()),
        };
        info!(backend = ?self.store.backend, "block store opened");
        Ok(store)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
    Sqlite,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// fsync policy for the file backend.
    pub sync: SyncMode,
    /// How long a SQLite call waits on a locked database.
    pub busy_timeout_ms: u64,
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            sync: SyncMode::default(),
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_bytes: usize,
    /// Accepted file extensions, without the dot. Matched case-insensitively.
    pub allowed_extensions: Vec<String>,
}

impl UploadConfig {
    pub fn is_allowed(&self, filename: &str) -> bool {
        let Some((_, ext)) = filename.rsplit_once('.') else {
            return false;
        };
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 25 * 1024 * 1024,
            allowed_extensions: vec!["wav".into()],
        }
    }
}

/// External classifier program. The clip is written to its stdin and one
/// `REAL|FAKE [confidence]` line is read from its stdout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_ms: u64,
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            program: "vdl-classify".into(),
            args: Vec::new(),
            timeout_ms: 30_000,
        }
    }
}
