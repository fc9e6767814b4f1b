//! Recovery
//!
//! Rebuilds the in-memory state of an existing file by replaying every
//! block in order.
//!
//! ## Steps
//! 1. Read blocks from just past the header until end of file. End of file
//!    on a block boundary ends the scan; anywhere else it is corruption.
//! 2. Replay each block's records: Add points the key at the record,
//!    Delete drops the key.
//! 3. If the last block is smaller than the block size, move it back into
//!    the write buffer so new records keep filling it.

use std::collections::HashMap;
use std::io::{Read, Seek};

use bytes::BytesMut;

use crate::compression::Compressor;
use crate::error::{IoResultExt, Result, ZkvError};
use crate::format::{decode_block, Action, RecordReader};

use super::state::Coords;

/// Statistics from replaying a file on open
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Blocks read from the file, including a restored tail block
    pub blocks_replayed: u64,

    /// Add and Delete records replayed
    pub records_replayed: u64,

    /// Delete records replayed
    pub tombstones_replayed: u64,

    /// Deletes replayed for keys that were not indexed at that point
    pub redundant_deletes: u64,

    /// Whether the last block was moved back into the write buffer
    pub tail_restored: bool,

    /// Live keys after replay
    pub live_keys: usize,
}

/// State reconstructed from disk
pub(crate) struct Recovered {
    pub index: HashMap<Vec<u8>, Coords>,
    pub block_info: HashMap<u64, u64>,
    pub current_block: u64,
    pub buffer: BytesMut,
    pub report: RecoveryReport,
}

/// Replay all blocks from the reader's current position
pub(crate) fn replay<R: Read + Seek>(
    reader: &mut R,
    compressor: &dyn Compressor,
    block_data_size: u64,
) -> Result<Recovered> {
    let mut index: HashMap<Vec<u8>, Coords> = HashMap::new();
    let mut block_info = HashMap::new();
    let mut report = RecoveryReport::default();

    let mut block_num = 0u64;
    let mut last_payload = None;

    loop {
        let offset = reader
            .stream_position()
            .io_context(|| format!("locating block {}", block_num))?;

        let payload = match decode_block(compressor, reader) {
            Ok(Some(payload)) => payload,
            Ok(None) => break,
            Err(e) => return Err(locate(e, block_num, offset)),
        };

        block_info.insert(block_num, offset);

        for item in RecordReader::new(&payload) {
            let (record_offset, record) = item.map_err(|e| locate(e, block_num, offset))?;
            report.records_replayed += 1;

            match record.action {
                Action::Add => {
                    index.insert(
                        record.key.to_vec(),
                        Coords {
                            block: block_num,
                            offset: record_offset,
                        },
                    );
                }
                Action::Delete => {
                    report.tombstones_replayed += 1;
                    if index.remove(record.key).is_none() {
                        report.redundant_deletes += 1;
                        tracing::debug!(
                            block = block_num,
                            record_offset,
                            "replayed delete for a key that is not indexed"
                        );
                    }
                }
            }
        }

        block_num += 1;
        last_payload = Some(payload);
    }

    report.blocks_replayed = block_num;

    let mut buffer = BytesMut::new();
    if let Some(payload) = last_payload {
        if (payload.len() as u64) < block_data_size {
            block_num -= 1;
            block_info.remove(&block_num);
            buffer.extend_from_slice(&payload);
            report.tail_restored = true;

            tracing::debug!(
                block = block_num,
                bytes = payload.len(),
                "restored under-full tail block into write buffer"
            );
        }
    }

    report.live_keys = index.len();

    Ok(Recovered {
        index,
        block_info,
        current_block: block_num,
        buffer,
        report,
    })
}

/// Prefix corruption errors with where in the file they were found
fn locate(err: ZkvError, block: u64, offset: u64) -> ZkvError {
    match err {
        ZkvError::CorruptBlock(msg) => {
            ZkvError::CorruptBlock(format!("block {} at offset {}: {}", block, offset, msg))
        }
        ZkvError::CorruptRecord(msg) => {
            ZkvError::CorruptRecord(format!("block {} at offset {}: {}", block, offset, msg))
        }
        other => other,
    }
}
