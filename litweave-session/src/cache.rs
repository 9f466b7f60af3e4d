//! Per-document incremental cache.
//!
//! One [`CacheEntry`] per chunk index: the SHA-256 of what the chunk looked
//! like last run, and the weave-buffer offset its output ended at. A hash
//! mismatch at index `i` drops every entry from `i` on, so all later chunks
//! are reprocessed too.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of `content`.
pub fn digest(content: &str) -> String {
    let mut h = Sha256::new();
    h.update(content.as_bytes());
    hex::encode(h.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    /// `None` until the chunk's output has been written.
    pub output_end_offset: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkCache {
    entries: Vec<CacheEntry>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `false` when `index` holds the same hash as last time; the cache is
    /// then left untouched. Otherwise everything from `index` on is dropped,
    /// a fresh entry without an offset is appended and `true` is returned.
    pub fn should_reprocess(&mut self, index: usize, content: &str) -> bool {
        let hash = digest(content);
        if self.entries.get(index).is_some_and(|e| e.hash == hash) {
            return false;
        }
        self.entries.truncate(index);
        self.entries.push(CacheEntry {
            hash,
            output_end_offset: None,
        });
        true
    }

    pub fn record_offset(&mut self, index: usize, offset: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.output_end_offset = Some(offset);
        }
    }

    pub fn last_offset(&self, index: usize) -> Option<usize> {
        self.entries.get(index).and_then(|e| e.output_end_offset)
    }

    /// Drop entries for chunks a shrunken document no longer has.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }
}
