//! XZ (LZMA2) compressor

use std::io::Read;

use xz2::read::{XzDecoder, XzEncoder};

use crate::error::{Result, ZkvError};

use super::{Compressor, CompressorId, XZ_ID};

/// liblzma preset used when none is given
const DEFAULT_PRESET: u32 = 6;

/// LZMA2 compression in the `.xz` container
#[derive(Debug, Clone, Copy)]
pub struct XzCompressor {
    preset: u32,
}

impl XzCompressor {
    /// Preset 0 (fastest) to 9 (smallest)
    pub fn with_preset(preset: u32) -> Self {
        Self { preset }
    }
}

impl Default for XzCompressor {
    fn default() -> Self {
        Self::with_preset(DEFAULT_PRESET)
    }
}

impl Compressor for XzCompressor {
    fn id(&self) -> CompressorId {
        XZ_ID
    }

    fn name(&self) -> &'static str {
        "xz"
    }

    fn init(&mut self) -> Result<()> {
        if self.preset > 9 {
            return Err(ZkvError::InvalidConfig(format!(
                "xz preset must be 0..=9, got {}",
                self.preset
            )));
        }
        Ok(())
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() / 2);
        XzEncoder::new(data, self.preset)
            .read_to_end(&mut out)
            .map_err(|e| ZkvError::Compression(format!("xz compress: {}", e)))?;
        Ok(out)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() * 2);
        XzDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| ZkvError::Compression(format!("xz decompress: {}", e)))?;
        Ok(out)
    }
}
