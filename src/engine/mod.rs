//! Engine Module
//!
//! The storage engine that owns the file, the write buffer, the block table
//! and the key index.
//!
//! ## Responsibilities
//! - Create new files or validate and replay existing ones
//! - Append records to the write buffer and flush full buffers as blocks
//! - Serve point lookups from the buffer or from a decompressed block
//! - Iterate live records and compact them into a new file

mod recovery;
mod scan;
mod state;

use std::fs::{self, OpenOptions};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::compression::{Compressor, CompressorId, CompressorRegistry};
use crate::config::Config;
use crate::encoding::{decode, encode};
use crate::error::{IoResultExt, Result, ZkvError};
use crate::format::{read_header, write_header, Action};

pub use recovery::RecoveryReport;

use self::state::EngineState;

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader
///
/// One `RwLock` guards all mutable state.
/// - **Writes** (set/delete/flush/close) take the write lock
/// - **Reads** (get/count/iterate/shrink) take the read lock and read
///   blocks through their own file handle, so they run concurrently
///
/// Callbacks passed to `iterate` run under the read lock and must not
/// call mutating methods on the same engine.
///
/// Two engines on the same file, in one process or several, are not
/// supported.
pub struct Engine {
    /// Storage file path
    path: PathBuf,

    /// Effective configuration (format fields filled from the header)
    config: Config,

    /// Registry this engine resolved its compressor from
    registry: Arc<CompressorRegistry>,

    /// Compressor for every block of this file
    compressor: Arc<dyn Compressor>,

    /// Flush threshold, from the header
    block_data_size: u64,

    /// What replay found on open
    report: RecoveryReport,

    state: RwLock<EngineState>,
}

impl Engine {
    /// Open or create a file with a default compressor registry
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let registry = Arc::new(CompressorRegistry::with_defaults()?);
        Self::open_with_registry(path, config, registry)
    }

    /// Open or create a file with default options
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, Config::default())
    }

    /// Open or create a file, resolving compressors from `registry`
    ///
    /// A missing file is created with a header built from `config`. An
    /// existing file has its header validated against `config` and its
    /// blocks replayed to rebuild the index.
    pub fn open_with_registry(
        path: impl AsRef<Path>,
        config: Config,
        registry: Arc<CompressorRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        if path.exists() {
            Self::open_existing(path, config, registry)
        } else {
            Self::create(path, config, registry)
        }
    }

    fn create(path: PathBuf, config: Config, registry: Arc<CompressorRegistry>) -> Result<Self> {
        if config.read_only {
            return Err(ZkvError::InvalidConfig(
                "cannot create a new read-only storage".to_string(),
            ));
        }

        let block_data_size = config.block_data_size_or_default();
        let compressor = registry.get(config.compressor_or_default())?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .io_context(|| format!("creating {}", path.display()))?;

        let written = write_header(&mut file, block_data_size, compressor.id()).and_then(|_| {
            if config.sync_on_flush {
                file.sync_all().io_context(|| "syncing new header".to_string())?;
            }
            Ok(())
        });
        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(e);
        }

        tracing::info!(
            path = %path.display(),
            block_data_size,
            compressor = compressor.name(),
            "created storage"
        );

        let config = Config {
            block_data_size: Some(block_data_size),
            compressor: Some(compressor.id()),
            ..config
        };

        Ok(Self {
            path,
            config,
            registry,
            compressor,
            block_data_size,
            report: RecoveryReport::default(),
            state: RwLock::new(EngineState::new(file)),
        })
    }

    fn open_existing(
        path: PathBuf,
        config: Config,
        registry: Arc<CompressorRegistry>,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(!config.read_only)
            .open(&path)
            .io_context(|| format!("opening {}", path.display()))?;

        let mut reader = BufReader::new(&file);
        let header = read_header(&mut reader)?;
        let compressor = registry.get(header.compressor_id)?;

        if let Some(size) = config.block_data_size {
            if size != header.block_data_size {
                return Err(ZkvError::ConfigMismatch(format!(
                    "cannot change block size to {} on existing storage with block size {}",
                    size, header.block_data_size
                )));
            }
        }
        if let Some(id) = config.compressor {
            if id != header.compressor_id {
                return Err(ZkvError::ConfigMismatch(format!(
                    "cannot change compressor to {} on existing storage using {}",
                    id, header.compressor_id
                )));
            }
        }

        let recovered =
            recovery::replay(&mut reader, compressor.as_ref(), header.block_data_size)?;
        drop(reader);

        let report = recovered.report;
        tracing::info!(
            path = %path.display(),
            blocks = report.blocks_replayed,
            records = report.records_replayed,
            tombstones = report.tombstones_replayed,
            redundant_deletes = report.redundant_deletes,
            tail_restored = report.tail_restored,
            live_keys = report.live_keys,
            read_only = config.read_only,
            "opened storage"
        );

        let state = EngineState {
            file,
            buffer: recovered.buffer,
            index: recovered.index,
            block_info: recovered.block_info,
            current_block: recovered.current_block,
            dirty: false,
        };

        let config = Config {
            block_data_size: Some(header.block_data_size),
            compressor: Some(header.compressor_id),
            ..config
        };

        Ok(Self {
            path,
            config,
            registry,
            compressor,
            block_data_size: header.block_data_size,
            report,
            state: RwLock::new(state),
        })
    }

    // =========================================================================
    // Typed Operations
    // =========================================================================

    /// Store `value` under `key`, replacing any previous value
    ///
    /// See [`Engine::set_raw`] for what a failed flush leaves behind.
    pub fn set<K, V>(&self, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let key = encode(key)?;
        let value = encode(value)?;
        self.set_raw(&key, &value)
    }

    /// Fetch the value stored under `key`
    ///
    /// Returns `ZkvError::NotFound` if the key has no live value.
    pub fn get<K, V>(&self, key: &K) -> Result<V>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        let key = encode(key)?;
        let value = self.get_raw(&key)?;
        decode(&value)
    }

    /// Remove `key`. Deleting a missing key is a no-op.
    pub fn delete<K>(&self, key: &K) -> Result<()>
    where
        K: Serialize + ?Sized,
    {
        let key = encode(key)?;
        self.delete_raw(&key)
    }

    /// Visit live key/value pairs in file order until `visit` returns false
    pub fn iterate<K, V, F>(&self, mut visit: F) -> Result<()>
    where
        K: DeserializeOwned,
        V: DeserializeOwned,
        F: FnMut(K, V) -> bool,
    {
        let state = self.state.read();
        self.scan_live(&state, |key, value| {
            let key = decode(key)?;
            let value = decode(value)?;
            Ok(visit(key, value))
        })
    }

    /// All live keys, in no particular order
    pub fn keys<K>(&self) -> Result<Vec<K>>
    where
        K: DeserializeOwned,
    {
        let state = self.state.read();
        state.index.keys().map(|key| decode(key)).collect()
    }

    // =========================================================================
    // Raw Operations (pre-encoded keys and values)
    // =========================================================================

    /// Store an encoded value under an encoded key
    ///
    /// Flushes the write buffer once it reaches the block size.
    ///
    /// If that flush fails the error is returned, but the record is already
    /// buffered and indexed: `get` sees it, and the next `flush`, `set` or
    /// `close` retries writing the block.
    pub fn set_raw(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.config.read_only {
            return Err(ZkvError::ReadOnly);
        }

        let mut state = self.state.write();
        state.append(Action::Add, key, Some(value))?;

        if state.buffer.len() as u64 >= self.block_data_size {
            state.flush(self.compressor.as_ref(), self.config.sync_on_flush)?;
        }

        Ok(())
    }

    /// Fetch the encoded value stored under an encoded key
    pub fn get_raw(&self, key: &[u8]) -> Result<Vec<u8>> {
        let state = self.state.read();
        let coords = *state.index.get(key).ok_or(ZkvError::NotFound)?;
        self.read_value(&state, key, coords)
    }

    /// Append a tombstone for an encoded key and drop it from the index
    pub fn delete_raw(&self, key: &[u8]) -> Result<()> {
        if self.config.read_only {
            return Err(ZkvError::ReadOnly);
        }

        let mut state = self.state.write();
        if !state.index.contains_key(key) {
            return Ok(());
        }

        state.append(Action::Delete, key, None)
    }

    /// Visit live encoded key/value pairs in file order until `visit`
    /// returns false
    pub fn iterate_raw<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let state = self.state.read();
        self.scan_live(&state, |key, value| Ok(visit(key, value)))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Number of live keys
    pub fn count(&self) -> usize {
        self.state.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Write buffered records to the file as a new block
    ///
    /// No-op when nothing new is buffered, including on read-only engines.
    pub fn flush(&self) -> Result<()> {
        if self.config.read_only {
            return Ok(());
        }

        let mut state = self.state.write();
        state.flush(self.compressor.as_ref(), self.config.sync_on_flush)?;
        Ok(())
    }

    /// Flush pending records, sync and release the file
    pub fn close(self) -> Result<()> {
        if !self.config.read_only {
            let mut state = self.state.write();
            state.flush(self.compressor.as_ref(), self.config.sync_on_flush)?;
            state
                .file
                .sync_all()
                .io_context(|| format!("syncing {}", self.path.display()))?;
        }

        tracing::info!(path = %self.path.display(), "closed storage");
        Ok(())
    }

    /// Copy live records into a new file at `new_path`
    ///
    /// The new file uses the same block size and compressor and holds no
    /// superseded records or tombstones. Fails if `new_path` exists.
    pub fn shrink(&self, new_path: impl AsRef<Path>) -> Result<()> {
        let new_path = new_path.as_ref();
        if new_path.exists() {
            return Err(ZkvError::AlreadyExists(new_path.to_path_buf()));
        }

        let config = Config::builder()
            .block_data_size(self.block_data_size)
            .compressor(self.compressor.id())
            .sync_on_flush(self.config.sync_on_flush)
            .build();

        let target = Engine::open_with_registry(new_path, config, Arc::clone(&self.registry))?;

        let copied = {
            let state = self.state.read();
            let mut copied = 0u64;
            let result = self.scan_live(&state, |key, value| {
                target.set_raw(key, value)?;
                copied += 1;
                Ok(true)
            });
            result.map(|_| copied)
        };

        let copied = match copied.and_then(|copied| target.close().map(|_| copied)) {
            Ok(copied) => copied,
            Err(e) => {
                let _ = fs::remove_file(new_path);
                return Err(e);
            }
        };

        tracing::info!(
            source = %self.path.display(),
            target = %new_path.display(),
            records = copied,
            "shrank storage"
        );

        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the storage file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the effective configuration
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    /// Get the id of the compressor used by this file
    pub fn compressor_id(&self) -> CompressorId {
        self.compressor.id()
    }

    /// Get the number of flushed blocks tracked in the block table
    pub fn block_count(&self) -> usize {
        self.state.read().block_info.len()
    }

    /// Get the number the write buffer gets when flushed
    pub fn current_block(&self) -> u64 {
        self.state.read().current_block
    }

    /// Get the write buffer size in bytes
    pub fn buffer_len(&self) -> usize {
        self.state.read().buffer.len()
    }

    /// Get a copy of the write buffer
    pub fn pending_bytes(&self) -> Vec<u8> {
        self.state.read().buffer.to_vec()
    }

    /// Get what replay found when this engine was opened
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.report
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.config.read_only {
            return;
        }

        let compressor = Arc::clone(&self.compressor);
        let sync = self.config.sync_on_flush;
        if let Err(e) = self.state.get_mut().flush(compressor.as_ref(), sync) {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "failed to flush write buffer on drop"
            );
        }
    }
}
