//! Identity compressor

use crate::error::Result;

use super::{Compressor, CompressorId, NONE_ID};

/// Stores blocks uncompressed
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneCompressor;

impl Compressor for NoneCompressor {
    fn id(&self) -> CompressorId {
        NONE_ID
    }

    fn name(&self) -> &'static str {
        "none"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}
