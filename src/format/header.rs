//! File header
//!
//! Written once when a file is created and validated on every open.

use std::io::{Read, Write};

use bytes::{Buf, BufMut};

use crate::compression::CompressorId;
use crate::error::{Result, ZkvError};

use super::{FORMAT_VERSION, HEADER_SIZE, MAGIC};

/// Decoded file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: i8,
    pub compressor_id: CompressorId,
    pub block_data_size: u64,
}

/// Write magic, version, compressor id and block size
pub fn write_header<W: Write>(
    writer: &mut W,
    block_data_size: u64,
    compressor_id: CompressorId,
) -> Result<()> {
    let block_data_size = i64::try_from(block_data_size).map_err(|_| {
        ZkvError::InvalidConfig(format!(
            "block data size {} does not fit the file header",
            block_data_size
        ))
    })?;

    let mut header = Vec::with_capacity(HEADER_SIZE as usize);
    header.put_slice(MAGIC);
    header.put_i8(FORMAT_VERSION);
    header.put_i8(compressor_id);
    header.put_i64_le(block_data_size);

    writer.write_all(&header)?;
    Ok(())
}

/// Read and validate a header
///
/// The compressor id is returned as stored; resolving it is up to the caller.
pub fn read_header<R: Read>(reader: &mut R) -> Result<FileHeader> {
    let mut raw = [0u8; HEADER_SIZE as usize];
    reader.read_exact(&mut raw).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            ZkvError::BadFormat("file is shorter than the header".to_string())
        }
        _ => ZkvError::Io(e),
    })?;

    let mut buf = &raw[..];

    let magic = &buf[..MAGIC.len()];
    if magic != MAGIC {
        return Err(ZkvError::BadFormat(format!(
            "invalid magic: expected {:?}, got {:?}",
            MAGIC, magic
        )));
    }
    buf.advance(MAGIC.len());

    let version = buf.get_i8();
    if version != FORMAT_VERSION {
        return Err(ZkvError::BadFormat(format!(
            "unsupported format version: {}",
            version
        )));
    }

    let compressor_id = buf.get_i8();

    let block_data_size = buf.get_i64_le();
    if block_data_size <= 0 {
        return Err(ZkvError::BadFormat(format!(
            "invalid block data size in header: {}",
            block_data_size
        )));
    }

    Ok(FileHeader {
        version,
        compressor_id,
        block_data_size: block_data_size as u64,
    })
}
