//! Record codec
//!
//! A record is one Add or Delete for a single key. Records are
//! concatenated inside a block payload with no separators; the end of the
//! payload at a record boundary ends the sequence.

use bytes::{Buf, BufMut};

use crate::error::{Result, ZkvError};

use super::{LEN_SIZE, RECORD_PREFIX_SIZE};

/// Record action tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum Action {
    Add = 1,
    Delete = 2,
}

impl TryFrom<i8> for Action {
    type Error = ZkvError;

    fn try_from(tag: i8) -> Result<Self> {
        match tag {
            1 => Ok(Action::Add),
            2 => Ok(Action::Delete),
            other => Err(ZkvError::UnknownAction(other)),
        }
    }
}

/// A decoded record borrowing from its block payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub action: Action,
    pub key: &'a [u8],
    /// Present exactly when `action` is `Add`
    pub value: Option<&'a [u8]>,
}

/// Encoded size of a record
pub fn encoded_len(key: &[u8], value: Option<&[u8]>) -> usize {
    RECORD_PREFIX_SIZE + key.len() + value.map_or(0, |v| LEN_SIZE + v.len())
}

/// Append one record to `buf`, returning the number of bytes written
///
/// Nothing is written when the record is rejected.
pub fn encode_record<B: BufMut>(
    buf: &mut B,
    action: Action,
    key: &[u8],
    value: Option<&[u8]>,
) -> Result<usize> {
    if key.is_empty() {
        return Err(ZkvError::InvalidRecord("key must not be empty".to_string()));
    }

    match (action, value) {
        (Action::Add, Some(v)) if v.is_empty() => {
            return Err(ZkvError::InvalidRecord(
                "value must not be empty".to_string(),
            ));
        }
        (Action::Add, None) => {
            return Err(ZkvError::InvalidRecord(
                "add record requires a value".to_string(),
            ));
        }
        (Action::Delete, Some(_)) => {
            return Err(ZkvError::InvalidRecord(
                "delete record carries no value".to_string(),
            ));
        }
        _ => {}
    }

    buf.put_i8(action as i8);
    buf.put_i64_le(key.len() as i64);
    buf.put_slice(key);
    if let Some(v) = value {
        buf.put_i64_le(v.len() as i64);
        buf.put_slice(v);
    }

    Ok(encoded_len(key, value))
}

/// Decode the next record and advance `src` past it
///
/// Returns `Ok(None)` when `src` is empty.
pub fn decode_record<'a>(src: &mut &'a [u8]) -> Result<Option<Record<'a>>> {
    if src.is_empty() {
        return Ok(None);
    }

    let action = Action::try_from(src.get_i8())?;
    let key = read_field(src, "key")?;
    let value = match action {
        Action::Add => Some(read_field(src, "value")?),
        Action::Delete => None,
    };

    Ok(Some(Record { action, key, value }))
}

/// Decode the record starting at `offset` within a block payload
pub fn record_at(payload: &[u8], offset: u64) -> Result<Option<Record<'_>>> {
    let start = match usize::try_from(offset) {
        Ok(start) if start <= payload.len() => start,
        _ => return Ok(None),
    };

    let mut src = &payload[start..];
    decode_record(&mut src)
}

/// Read one length-prefixed field
fn read_field<'a>(src: &mut &'a [u8], what: &str) -> Result<&'a [u8]> {
    if src.remaining() < LEN_SIZE {
        return Err(ZkvError::CorruptRecord(format!(
            "truncated {} length: {} bytes left",
            what,
            src.remaining()
        )));
    }

    let len = src.get_i64_le();
    if len <= 0 {
        return Err(ZkvError::CorruptRecord(format!(
            "invalid {} length: {}",
            what, len
        )));
    }

    let data: &'a [u8] = *src;
    let len = match usize::try_from(len) {
        Ok(len) if len <= data.len() => len,
        _ => {
            return Err(ZkvError::CorruptRecord(format!(
                "{} length {} exceeds remaining {} bytes",
                what,
                len,
                data.len()
            )));
        }
    };

    let (field, rest) = data.split_at(len);
    *src = rest;
    Ok(field)
}

// =============================================================================
// Sequential Reader
// =============================================================================

/// Iterates the records of a block payload along with their offsets
///
/// Stops after the first error.
pub struct RecordReader<'a> {
    payload: &'a [u8],
    rest: &'a [u8],
}

impl<'a> RecordReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            rest: payload,
        }
    }

    /// Offset of the next record within the payload
    pub fn offset(&self) -> u64 {
        (self.payload.len() - self.rest.len()) as u64
    }
}

impl<'a> Iterator for RecordReader<'a> {
    /// (offset within payload, record)
    type Item = Result<(u64, Record<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offset();
        match decode_record(&mut self.rest) {
            Ok(Some(record)) => Some(Ok((offset, record))),
            Ok(None) => None,
            Err(e) => {
                self.rest = &[];
                Some(Err(e))
            }
        }
    }
}
