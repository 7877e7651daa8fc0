//! SQLite-backed block store.
//!
//! One row per block in a `blocks` table whose columns mirror the block
//! fields. `prev_hash → hash` linkage is application-level; the database
//! enforces only the primary key.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use vdl_types::{Block, ChainLink, Confidence, Digest, Label, Timestamp};

use crate::error::{StoreError, StoreResult};
use crate::traits::{check_next_index, BlockStore};

const SCHEMA_SQL: &str = "
PRAGMA journal_mode = WAL;
CREATE TABLE IF NOT EXISTS blocks (
    block_index     INTEGER PRIMARY KEY,
    timestamp       INTEGER NOT NULL,
    predicted_label TEXT    NOT NULL,
    confidence      REAL    NOT NULL,
    prev_hash       TEXT    NOT NULL,
    hash            TEXT    NOT NULL
);
";

const SELECT_COLUMNS: &str =
    "SELECT block_index, timestamp, predicted_label, confidence, prev_hash, hash FROM blocks";

/// Default wait for a locked database before an operation fails.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteBlockStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteBlockStore {
    /// Open or create a database at `path`.
    ///
    /// `busy_timeout` bounds how long a call waits on a locked database, so
    /// a stuck writer surfaces as an error instead of a hang.
    pub fn open(path: &Path, busy_timeout: Duration) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA_SQL)?;
        info!(path = %path.display(), "sqlite block store opened");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory database for testing.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".into()))
    }
}

/// Raw column values, decoded into a [`Block`] outside the rusqlite closure
/// so decoding failures become [`StoreError::Corrupt`].
struct BlockRow {
    index: i64,
    timestamp: i64,
    label: String,
    confidence: f64,
    prev_hash: String,
    hash: String,
}

impl BlockRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            index: row.get(0)?,
            timestamp: row.get(1)?,
            label: row.get(2)?,
            confidence: row.get(3)?,
            prev_hash: row.get(4)?,
            hash: row.get(5)?,
        })
    }

    fn into_block(self) -> StoreResult<Block> {
        let location = format!("block_index {}", self.index);
        let corrupt = |reason: String| StoreError::Corrupt {
            location: location.clone(),
            reason,
        };

        let index = u64::try_from(self.index).map_err(|e| corrupt(e.to_string()))?;
        let timestamp = u64::try_from(self.timestamp).map_err(|e| corrupt(e.to_string()))?;
        let label: Label = self
            .label
            .parse()
            .map_err(|e: vdl_types::TypeError| corrupt(e.to_string()))?;
        let confidence =
            Confidence::new(self.confidence).map_err(|e| corrupt(e.to_string()))?;
        let prev_hash: ChainLink = self
            .prev_hash
            .parse()
            .map_err(|e: vdl_types::TypeError| corrupt(e.to_string()))?;
        let hash = Digest::from_hex(&self.hash).map_err(|e| corrupt(e.to_string()))?;

        Ok(Block {
            index,
            timestamp: Timestamp::from_millis(timestamp),
            label,
            confidence,
            prev_hash,
            hash,
        })
    }
}

fn to_sql_int(value: u64) -> StoreResult<i64> {
    i64::try_from(value)
        .map_err(|_| StoreError::Serialization(format!("{value} exceeds SQLite INTEGER range")))
}

impl BlockStore for SqliteBlockStore {
    fn append(&self, block: &Block) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let count: i64 = tx.query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get(0))?;
        check_next_index(count as u64, block)?;

        tx.execute(
            "INSERT INTO blocks (block_index, timestamp, predicted_label, confidence, prev_hash, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                to_sql_int(block.index)?,
                to_sql_int(block.timestamp.as_millis())?,
                block.label.as_str(),
                block.confidence.as_f64(),
                block.prev_hash.canonical(),
                block.hash.to_hex(),
            ],
        )?;
        tx.commit()?;

        debug!(index = block.index, "block row inserted");
        Ok(())
    }

    fn get(&self, index: u64) -> StoreResult<Option<Block>> {
        let Ok(index) = i64::try_from(index) else {
            return Ok(None);
        };
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE block_index = ?1"),
                params![index],
                BlockRow::from_row,
            )
            .optional()?;
        row.map(BlockRow::into_block).transpose()
    }

    fn last_block(&self) -> StoreResult<Option<Block>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("{SELECT_COLUMNS} ORDER BY block_index DESC LIMIT 1"),
                [],
                BlockRow::from_row,
            )
            .optional()?;
        row.map(BlockRow::into_block).transpose()
    }

    fn len(&self) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn all_blocks(&self) -> StoreResult<Vec<Block>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY block_index ASC"))?;
        let rows = stmt
            .query_map([], BlockRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(BlockRow::into_block).collect()
    }

    fn sync(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("PRAGMA wal_checkpoint(FULL);")?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBlockStore")
            .field("path", &self.path)
            .finish()
    }
}
