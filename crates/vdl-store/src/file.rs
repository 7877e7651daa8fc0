use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use vdl_types::Block;

use crate::error::{StoreError, StoreResult};
use crate::traits::{check_next_index, BlockStore};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Flush/sync strategy for the block log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every append (safest, highest latency).
    #[default]
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    OsDefault,
}

/// Configuration for [`FileBlockStore`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    pub sync_mode: SyncMode,
}

struct LogState {
    file: File,
    /// End of the last fully written frame.
    committed: u64,
    /// Byte offset of each block's frame, by index.
    offsets: Vec<u64>,
    last: Option<Block>,
    /// Set when a partial frame could not be removed; the file no longer
    /// ends at `committed`, so further appends would land at the wrong offset.
    broken: Option<String>,
}

/// Append-only block log in a single file.
///
/// On-disk format, one frame per block:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized Block)]
/// ```
///
/// A frame cut short at the end of the file is a torn write from a crash and
/// is truncated away on open. A checksum failure anywhere else is reported as
/// corruption; skipping it would silently open a gap in the chain.
pub struct FileBlockStore {
    path: PathBuf,
    state: RwLock<LogState>,
    config: FileStoreConfig,
}

impl FileBlockStore {
    /// Open (or create) a block log at the given path.
    pub fn open(path: &Path, config: FileStoreConfig) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let file_len = file.metadata()?.len();

        let scan = scan(path, file_len)?;
        if scan.end < file_len {
            warn!(
                path = %path.display(),
                committed = scan.end,
                file_len,
                "truncating torn tail of block log"
            );
            file.set_len(scan.end)?;
        }

        let offsets = scan.frames.iter().map(|(offset, _)| *offset).collect::<Vec<_>>();
        let last = scan.frames.into_iter().last().map(|(_, block)| block);
        info!(path = %path.display(), blocks = offsets.len(), "block log opened");

        Ok(Self {
            path: path.to_path_buf(),
            state: RwLock::new(LogState {
                file,
                committed: scan.end,
                offsets,
                last,
                broken: None,
            }),
            config,
        })
    }

    /// Path to the block log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_frame(&self, file: &mut File, frame: &[u8]) -> std::io::Result<()> {
        file.write_all(frame)?;
        if matches!(self.config.sync_mode, SyncMode::EveryWrite) {
            file.sync_data()?;
        }
        Ok(())
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("block log lock poisoned".into())
    }
}

impl BlockStore for FileBlockStore {
    fn append(&self, block: &Block) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| Self::poisoned())?;
        if let Some(reason) = &state.broken {
            return Err(StoreError::Unavailable(reason.clone()));
        }
        check_next_index(state.offsets.len() as u64, block)?;

        let frame = encode_frame(block)?;
        let offset = state.committed;

        if let Err(e) = self.write_frame(&mut state.file, &frame) {
            warn!(index = block.index, offset, error = %e, "block append failed; rolling back");
            if let Err(rollback) = state.file.set_len(offset) {
                error!(offset, error = %rollback, "failed to roll back partial frame");
                let reason =
                    format!("partial frame at offset {offset} could not be removed: {rollback}");
                state.broken = Some(reason.clone());
                return Err(StoreError::Unavailable(reason));
            }
            return Err(e.into());
        }

        state.offsets.push(offset);
        state.committed += frame.len() as u64;
        state.last = Some(block.clone());

        debug!(index = block.index, offset, len = frame.len(), "block appended");
        Ok(())
    }

    fn get(&self, index: u64) -> StoreResult<Option<Block>> {
        let offset = {
            let state = self.state.read().map_err(|_| Self::poisoned())?;
            match usize::try_from(index).ok().and_then(|i| state.offsets.get(i)) {
                Some(offset) => *offset,
                None => return Ok(None),
            }
        };

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let (block, _) = read_frame(&mut file, offset)?;
        Ok(Some(block))
    }

    fn last_block(&self) -> StoreResult<Option<Block>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.last.clone())
    }

    fn len(&self) -> StoreResult<u64> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.offsets.len() as u64)
    }

    fn all_blocks(&self) -> StoreResult<Vec<Block>> {
        // Frames past `committed` may be mid-write; never read them.
        let committed = self.state.read().map_err(|_| Self::poisoned())?.committed;

        let scan = scan(&self.path, committed)?;
        if scan.end < committed {
            return Err(StoreError::Corrupt {
                location: format!("offset {}", scan.end),
                reason: "block log shorter than its committed length".into(),
            });
        }
        Ok(scan.frames.into_iter().map(|(_, block)| block).collect())
    }

    fn sync(&self) -> StoreResult<()> {
        let state = self.state.write().map_err(|_| Self::poisoned())?;
        state.file.sync_all()?;
        debug!(path = %self.path.display(), "block log synced");
        Ok(())
    }
}

impl std::fmt::Debug for FileBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBlockStore")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish()
    }
}

struct Scan {
    frames: Vec<(u64, Block)>,
    /// Offset just past the last complete frame.
    end: u64,
}

fn encode_frame(block: &Block) -> StoreResult<Vec<u8>> {
    let payload =
        bincode::serialize(block).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| StoreError::Serialization(format!("block of {} bytes", payload.len())))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Read and check one frame starting at `offset`. Returns the block and the
/// frame's total length.
fn read_frame<R: Read>(reader: &mut R, offset: u64) -> StoreResult<(Block, u64)> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;
    let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    if length == 0 {
        return Err(StoreError::Corrupt {
            location: format!("offset {offset}"),
            reason: "zero-length frame".into(),
        });
    }

    let mut payload = vec![0u8; length as usize];
    reader.read_exact(&mut payload)?;

    let actual_crc = crc32fast::hash(&payload);
    if actual_crc != expected_crc {
        return Err(StoreError::Corrupt {
            location: format!("offset {offset}"),
            reason: format!("CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"),
        });
    }

    let block = bincode::deserialize::<Block>(&payload).map_err(|e| StoreError::Corrupt {
        location: format!("offset {offset}"),
        reason: e.to_string(),
    })?;
    Ok((block, HEADER_SIZE as u64 + u64::from(length)))
}

/// Read every complete frame in `path[..limit]`.
fn scan(path: &Path, limit: u64) -> StoreResult<Scan> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut frames = Vec::new();
    let mut offset: u64 = 0;

    while offset + HEADER_SIZE as u64 <= limit {
        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if offset + HEADER_SIZE as u64 + u64::from(length) > limit {
            break;
        }

        let mut frame = (&header[..]).chain(&mut reader);
        let (block, frame_len) = read_frame(&mut frame, offset)?;

        let expected = frames.len() as u64;
        if block.index != expected {
            return Err(StoreError::Corrupt {
                location: format!("offset {offset}"),
                reason: format!("expected index {expected}, found {}", block.index),
            });
        }

        frames.push((offset, block));
        offset += frame_len;
    }

    debug!(path = %path.display(), blocks = frames.len(), end = offset, "block log scanned");
    Ok(Scan { frames, end: offset })
}
