//! # zkv
//!
//! An embedded, single-file key/value store with:
//! - Append-only log of Add/Delete records packed into compressed blocks
//! - Pluggable block compression (none, xz, zstd)
//! - In-memory index rebuilt by replaying the file on open
//! - Single-writer/multi-reader concurrency model
//! - Compaction into a fresh file
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Engine (RwLock over state)                   │
//! │      set / get / delete / iterate / flush / shrink           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Write Buffer│          │  Key Index  │
//!   │  (records)  │          │ key → coords│
//!   └──────┬──────┘          └─────────────┘
//!          │ flush at block size
//!          ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │    Block    │─────────▶│ Compressor  │
//!   │   Codec     │          │  Registry   │
//!   └──────┬──────┘          └─────────────┘
//!          │ append
//!          ▼
//!   ┌─────────────────────────────────────┐
//!   │ File: Header | Block 0 | Block 1 ...│
//!   └─────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```no_run
//! use zkv::{Config, Engine};
//!
//! let engine = Engine::open("data.zkv", Config::default()).unwrap();
//! engine.set("answer", &42i64).unwrap();
//! let value: i64 = engine.get("answer").unwrap();
//! assert_eq!(value, 42);
//! engine.close().unwrap();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod compression;
pub mod encoding;
pub mod format;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, ZkvError};
pub use config::Config;
pub use compression::{Compressor, CompressorId, CompressorRegistry};
pub use engine::{Engine, RecoveryReport};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of zkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
