//! Block codec
//!
//! A block frames one compressed payload of concatenated records:
//! `[compressed_len: i64][uncompressed_len: i64][compressed bytes]`.

use std::io::{ErrorKind, Read};

use bytes::{Buf, BufMut};

use crate::compression::Compressor;
use crate::error::{Result, ZkvError};

use super::BLOCK_HEADER_SIZE;

/// Compress `payload` and frame it as a block
pub fn encode_block(compressor: &dyn Compressor, payload: &[u8]) -> Result<Vec<u8>> {
    let compressed = compressor.compress(payload)?;

    let mut block = Vec::with_capacity(BLOCK_HEADER_SIZE + compressed.len());
    block.put_i64_le(compressed.len() as i64);
    block.put_i64_le(payload.len() as i64);
    block.put_slice(&compressed);

    Ok(block)
}

/// Read one block and return its decompressed payload
///
/// Returns `Ok(None)` when the reader is already at end of file. End of
/// file anywhere inside the block is `CorruptBlock`.
pub fn decode_block<R: Read>(
    compressor: &dyn Compressor,
    reader: &mut R,
) -> Result<Option<Vec<u8>>> {
    let mut raw = [0u8; BLOCK_HEADER_SIZE];
    let filled = read_full(reader, &mut raw)?;
    if filled == 0 {
        return Ok(None);
    }
    if filled < BLOCK_HEADER_SIZE {
        return Err(ZkvError::CorruptBlock(format!(
            "truncated block header: {} of {} bytes",
            filled, BLOCK_HEADER_SIZE
        )));
    }

    let mut header = &raw[..];
    let compressed_len = header.get_i64_le();
    let uncompressed_len = header.get_i64_le();

    if compressed_len < 0 || uncompressed_len < 0 {
        return Err(ZkvError::CorruptBlock(format!(
            "negative block length: compressed={}, uncompressed={}",
            compressed_len, uncompressed_len
        )));
    }

    // take() avoids allocating a bogus length up front
    let mut compressed = Vec::new();
    reader
        .by_ref()
        .take(compressed_len as u64)
        .read_to_end(&mut compressed)?;

    if compressed.len() as u64 != compressed_len as u64 {
        return Err(ZkvError::CorruptBlock(format!(
            "truncated block body: {} of {} bytes",
            compressed.len(),
            compressed_len
        )));
    }

    let payload = compressor
        .decompress(&compressed)
        .map_err(|e| ZkvError::CorruptBlock(format!("cannot decompress block: {}", e)))?;

    if payload.len() as u64 != uncompressed_len as u64 {
        return Err(ZkvError::CorruptBlock(format!(
            "decompressed length mismatch: header says {}, got {}",
            uncompressed_len,
            payload.len()
        )));
    }

    Ok(Some(payload))
}

/// Fill `buf` as far as the reader allows, returning the bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
