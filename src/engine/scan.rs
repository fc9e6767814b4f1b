//! Block loading and live-record scans
//!
//! Reads go through a fresh file handle so they only need the shared lock.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};

use crate::error::{IoResultExt, Result, ZkvError};
use crate::format::{decode_block, record_at, Action, RecordReader};

use super::state::{Coords, EngineState};
use super::Engine;

impl Engine {
    /// Open a read handle on the storage file
    pub(super) fn open_reader(&self) -> Result<BufReader<File>> {
        let file = File::open(&self.path)
            .io_context(|| format!("opening {} for reading", self.path.display()))?;
        Ok(BufReader::new(file))
    }

    /// Decompressed payload of a flushed block
    pub(super) fn read_block(
        &self,
        reader: &mut BufReader<File>,
        state: &EngineState,
        block: u64,
    ) -> Result<Vec<u8>> {
        let offset = *state.block_info.get(&block).ok_or_else(|| {
            ZkvError::IndexCorruption(format!("block {} has no recorded file offset", block))
        })?;

        reader
            .seek(SeekFrom::Start(offset))
            .io_context(|| format!("seeking to block {} at offset {}", block, offset))?;

        decode_block(self.compressor.as_ref(), reader)?.ok_or_else(|| {
            ZkvError::CorruptBlock(format!(
                "block {} at offset {} is past end of file",
                block, offset
            ))
        })
    }

    /// Value bytes of the live record at `coords`
    pub(super) fn read_value(
        &self,
        state: &EngineState,
        key: &[u8],
        coords: Coords,
    ) -> Result<Vec<u8>> {
        if coords.block == state.current_block {
            return live_value(&state.buffer, key, coords).map(<[u8]>::to_vec);
        }

        let mut reader = self.open_reader()?;
        let payload = self.read_block(&mut reader, state, coords.block)?;
        live_value(&payload, key, coords).map(<[u8]>::to_vec)
    }

    /// Visit every live record in file order, then the write buffer
    ///
    /// A record is live when the index points exactly at it. `visit`
    /// returns false to stop early.
    pub(super) fn scan_live<F>(&self, state: &EngineState, mut visit: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<bool>,
    {
        if state.index.is_empty() {
            return Ok(());
        }

        if state.current_block > 0 {
            let mut reader = self.open_reader()?;
            for block in 0..state.current_block {
                let payload = self.read_block(&mut reader, state, block)?;
                if !visit_block(state, block, &payload, &mut visit)? {
                    return Ok(());
                }
            }
        }

        visit_block(state, state.current_block, &state.buffer, &mut visit)?;
        Ok(())
    }
}

/// Decode the record at `coords` and check it is the Add for `key`
fn live_value<'a>(payload: &'a [u8], key: &[u8], coords: Coords) -> Result<&'a [u8]> {
    let record = record_at(payload, coords.offset)?.ok_or_else(|| {
        ZkvError::IndexCorruption(format!(
            "no record at block {} offset {}",
            coords.block, coords.offset
        ))
    })?;

    match (record.action, record.value) {
        (Action::Add, Some(value)) if record.key == key => Ok(value),
        _ => Err(ZkvError::IndexCorruption(format!(
            "record at block {} offset {} is not the live add for this key",
            coords.block, coords.offset
        ))),
    }
}

fn visit_block<F>(state: &EngineState, block: u64, payload: &[u8], visit: &mut F) -> Result<bool>
where
    F: FnMut(&[u8], &[u8]) -> Result<bool>,
{
    for item in RecordReader::new(payload) {
        let (offset, record) = item?;

        let value = match (record.action, record.value) {
            (Action::Add, Some(value)) => value,
            _ => continue,
        };

        if state.index.get(record.key) != Some(&Coords { block, offset }) {
            continue;
        }

        if !visit(record.key, value)? {
            return Ok(false);
        }
    }

    Ok(true)
}
