//! Mutable engine state
//!
//! Everything guarded by the engine's RwLock: the file handle, the write
//! buffer, the block table and the key index.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

use bytes::BytesMut;

use crate::compression::Compressor;
use crate::error::{IoResultExt, Result, ZkvError};
use crate::format::{encode_block, encode_record, Action};

/// Location of a key's live record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Coords {
    /// Block number, in file order
    pub block: u64,
    /// Offset of the record within the block's decompressed payload
    pub offset: u64,
}

pub(crate) struct EngineState {
    /// Handle used for appends (read-only opens hold it for the lifetime
    /// of the engine but never write)
    pub file: File,

    /// Uncompressed records of the block being built
    pub buffer: BytesMut,

    /// Key bytes → location of the most recent Add
    pub index: HashMap<Vec<u8>, Coords>,

    /// Block number → file offset, for every flushed block
    pub block_info: HashMap<u64, u64>,

    /// Number the write buffer gets when flushed
    pub current_block: u64,

    /// Buffer holds records not yet on disk. False right after recovery
    /// restores a tail block, whose bytes are already persisted.
    pub dirty: bool,
}

impl EngineState {
    pub fn new(file: File) -> Self {
        Self {
            file,
            buffer: BytesMut::new(),
            index: HashMap::new(),
            block_info: HashMap::new(),
            current_block: 0,
            dirty: false,
        }
    }

    /// Encode a record into the write buffer and update the index
    pub fn append(&mut self, action: Action, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        let coords = Coords {
            block: self.current_block,
            offset: self.buffer.len() as u64,
        };

        encode_record(&mut self.buffer, action, key, value)?;
        self.dirty = true;

        match action {
            Action::Add => {
                self.index.insert(key.to_vec(), coords);
            }
            Action::Delete => {
                self.index.remove(key);
            }
        }

        Ok(())
    }

    /// Append the write buffer to the file as a new block
    ///
    /// Returns false when there was nothing to write.
    pub fn flush(&mut self, compressor: &dyn Compressor, sync: bool) -> Result<bool> {
        if self.buffer.is_empty() || !self.dirty {
            return Ok(false);
        }

        let block_num = self.current_block;
        let block = encode_block(compressor, &self.buffer)?;

        let offset = self
            .file
            .seek(SeekFrom::End(0))
            .io_context(|| format!("seeking to end of file for block {}", block_num))?;

        if let Err(source) = self.file.write_all(&block) {
            // Keep the file ending on a block boundary
            if let Err(e) = self.file.set_len(offset) {
                tracing::error!(
                    block = block_num,
                    offset,
                    error = %e,
                    "failed to truncate partially written block"
                );
            }
            return Err(ZkvError::IoContext {
                context: format!("appending block {} at offset {}", block_num, offset),
                source,
            });
        }

        if sync {
            self.file
                .sync_data()
                .io_context(|| format!("syncing block {}", block_num))?;
        }

        tracing::debug!(
            block = block_num,
            offset,
            payload_bytes = self.buffer.len(),
            block_bytes = block.len(),
            "flushed block"
        );

        self.block_info.insert(block_num, offset);
        self.buffer.clear();
        self.current_block += 1;
        self.dirty = false;

        Ok(true)
    }
}
