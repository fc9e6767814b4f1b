//! Configuration for zkv
//!
//! Construction-time options only. Block size and compressor are written
//! into the file header when a file is created and cannot change afterwards.

use crate::compression::{CompressorId, ZSTD_ID};
use crate::error::{Result, ZkvError};

/// Block size used when creating a file without an explicit one
pub const DEFAULT_BLOCK_DATA_SIZE: u64 = 256 * 1024; // 256 KiB

/// Compressor used when creating a file without an explicit one
pub const DEFAULT_COMPRESSOR: CompressorId = ZSTD_ID;

/// Options for opening or creating a storage file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Format Configuration (fixed per file)
    // -------------------------------------------------------------------------
    /// Uncompressed size that triggers a block flush.
    /// `None` uses the default for new files and accepts the header value
    /// for existing ones.
    pub block_data_size: Option<u64>,

    /// Compressor id used for every block.
    /// `None` behaves like `block_data_size`.
    pub compressor: Option<CompressorId>,

    // -------------------------------------------------------------------------
    // Access Configuration
    // -------------------------------------------------------------------------
    /// Reject all mutations. Cannot be used to create a new file.
    pub read_only: bool,

    /// fsync after every block append
    pub sync_on_flush: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_data_size: None,
            compressor: None,
            read_only: false,
            sync_on_flush: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Block size a new file would be created with
    pub fn block_data_size_or_default(&self) -> u64 {
        self.block_data_size.unwrap_or(DEFAULT_BLOCK_DATA_SIZE)
    }

    /// Compressor a new file would be created with
    pub fn compressor_or_default(&self) -> CompressorId {
        self.compressor.unwrap_or(DEFAULT_COMPRESSOR)
    }

    /// Reject values that can never be persisted
    pub fn validate(&self) -> Result<()> {
        if let Some(size) = self.block_data_size {
            if size == 0 {
                return Err(ZkvError::InvalidConfig(
                    "block data size must be positive".to_string(),
                ));
            }
            if i64::try_from(size).is_err() {
                return Err(ZkvError::InvalidConfig(format!(
                    "block data size {} does not fit the file header",
                    size
                )));
            }
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the block size (in uncompressed bytes)
    pub fn block_data_size(mut self, size: u64) -> Self {
        self.config.block_data_size = Some(size);
        self
    }

    /// Set the compressor by id
    pub fn compressor(mut self, id: CompressorId) -> Self {
        self.config.compressor = Some(id);
        self
    }

    /// Open in read-only mode
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Enable or disable fsync after each block append
    pub fn sync_on_flush(mut self, sync: bool) -> Self {
        self.config.sync_on_flush = sync;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
