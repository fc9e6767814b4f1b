//! Zstandard compressor

use parking_lot::Mutex;

use crate::error::{Result, ZkvError};

use super::{Compressor, CompressorId, ZSTD_ID};

const DEFAULT_LEVEL: i32 = 3;

/// Zstandard compression with a reusable encoder context
pub struct ZstdCompressor {
    level: i32,
    /// Allocated by `init`
    encoder: Option<Mutex<::zstd::bulk::Compressor<'static>>>,
}

impl ZstdCompressor {
    /// Compression level, 0 selects the zstd default
    pub fn with_level(level: i32) -> Self {
        Self {
            level,
            encoder: None,
        }
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::with_level(DEFAULT_LEVEL)
    }
}

impl std::fmt::Debug for ZstdCompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZstdCompressor")
            .field("level", &self.level)
            .field("initialized", &self.encoder.is_some())
            .finish()
    }
}

impl Compressor for ZstdCompressor {
    fn id(&self) -> CompressorId {
        ZSTD_ID
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn init(&mut self) -> Result<()> {
        let encoder = ::zstd::bulk::Compressor::new(self.level)
            .map_err(|e| ZkvError::Compression(format!("zstd encoder init: {}", e)))?;
        self.encoder = Some(Mutex::new(encoder));
        Ok(())
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let encoder = self.encoder.as_ref().ok_or_else(|| {
            ZkvError::Compression("zstd compressor used before init".to_string())
        })?;

        encoder
            .lock()
            .compress(data)
            .map_err(|e| ZkvError::Compression(format!("zstd compress: {}", e)))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        ::zstd::stream::decode_all(data)
            .map_err(|e| ZkvError::Compression(format!("zstd decompress: {}", e)))
    }
}
