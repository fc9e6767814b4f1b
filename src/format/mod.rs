//! Format Module
//!
//! On-disk layout of a zkv file. Pure encode/decode functions, no state.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                               │
//! │   Magic (4) | Version: i8 (1) | Compressor: i8 (1) | Block: i64 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Block 0                                                         │
//! │   CompressedLen: i64 | UncompressedLen: i64 | compressed bytes  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Block 1 ... Block N                                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Record Format (inside a decompressed block)
//! ```text
//! ┌────────────┬─────────────┬─────┬───────────────┬───────┐
//! │ Action (1) │ KeyLen (8)  │ Key │ ValueLen (8)  │ Value │
//! └────────────┴─────────────┴─────┴───────────────┴───────┘
//!                                   (value fields only for Add)
//! ```
//!
//! All integers are little-endian and signed.

mod block;
mod header;
mod record;

pub use block::{decode_block, encode_block};
pub use header::{read_header, write_header, FileHeader};
pub use record::{decode_record, encode_record, encoded_len, record_at, Action, Record, RecordReader};

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying a zkv file
pub const MAGIC: &[u8; 4] = b"ZKV\x1a";

/// Current file format version
pub const FORMAT_VERSION: i8 = 1;

/// Header size: Magic (4) + Version (1) + Compressor (1) + BlockDataSize (8)
pub const HEADER_SIZE: u64 = 14;

/// Block frame header: CompressedLen (8) + UncompressedLen (8)
pub const BLOCK_HEADER_SIZE: usize = 16;

/// Fixed bytes of a record before its key: Action (1) + KeyLen (8)
pub(crate) const RECORD_PREFIX_SIZE: usize = 9;

/// Size of a length prefix
pub(crate) const LEN_SIZE: usize = 8;
