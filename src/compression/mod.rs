//! Compression Module
//!
//! Pluggable block compressors, selected per file by a small integer id
//! stored in the file header.
//!
//! ## Built-in Compressors
//! ```text
//! ┌──────┬────────┬──────────────────────────────┐
//! │  Id  │  Name  │  Notes                       │
//! ├──────┼────────┼──────────────────────────────┤
//! │  1   │  none  │  identity                    │
//! │  2   │  xz    │  LZMA2, best ratio, slowest  │
//! │  3   │  zstd  │  balanced (default)          │
//! └──────┴────────┴──────────────────────────────┘
//! ```
//!
//! Ids are persisted. Never renumber an existing compressor.

mod none;
mod xz;
mod zstd;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, ZkvError};

pub use self::none::NoneCompressor;
pub use self::xz::XzCompressor;
pub use self::zstd::ZstdCompressor;

/// Persisted compressor identifier
pub type CompressorId = i8;

pub const NONE_ID: CompressorId = 1;
pub const XZ_ID: CompressorId = 2;
pub const ZSTD_ID: CompressorId = 3;

/// A block compression algorithm
pub trait Compressor: Send + Sync + fmt::Debug {
    /// Stable id written to the file header
    fn id(&self) -> CompressorId;

    /// Human readable name (used by the CLI)
    fn name(&self) -> &'static str;

    /// One-time setup, called by the registry before first use
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Set of compressors an engine may use, keyed by id
///
/// Built once and shared between engines through an `Arc`.
#[derive(Default)]
pub struct CompressorRegistry {
    compressors: HashMap<CompressorId, Arc<dyn Compressor>>,
}

impl CompressorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in none, xz and zstd compressors
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(NoneCompressor)?;
        registry.register(XzCompressor::default())?;
        registry.register(ZstdCompressor::default())?;
        Ok(registry)
    }

    /// Initialize and add a compressor
    pub fn register<C>(&mut self, mut compressor: C) -> Result<()>
    where
        C: Compressor + 'static,
    {
        let id = compressor.id();
        if self.compressors.contains_key(&id) {
            return Err(ZkvError::InvalidConfig(format!(
                "compressor id {} is already registered",
                id
            )));
        }

        compressor.init()?;
        self.compressors.insert(id, Arc::new(compressor));
        Ok(())
    }

    /// Look up a compressor by id
    pub fn get(&self, id: CompressorId) -> Result<Arc<dyn Compressor>> {
        self.compressors
            .get(&id)
            .cloned()
            .ok_or(ZkvError::UnknownCompressor(id))
    }

    /// Find the id of a registered compressor by name
    pub fn id_by_name(&self, name: &str) -> Option<CompressorId> {
        self.compressors
            .values()
            .find(|c| c.name().eq_ignore_ascii_case(name))
            .map(|c| c.id())
    }

    /// Registered ids, ascending
    pub fn ids(&self) -> Vec<CompressorId> {
        let mut ids: Vec<_> = self.compressors.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for CompressorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressorRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
