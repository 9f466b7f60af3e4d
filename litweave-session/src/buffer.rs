//! In-memory output buffers with a hash-gated atomic flush.
//!
//! ## `flush` protocol
//!
//! 1. No target path: nothing to write, report [`OutputStatus::InMemory`].
//! 2. SHA-256 the buffer.
//! 3. Same digest as the last flush and the file still exists: skip.
//! 4. Write to `<path>.litweave.tmp`.
//! 5. Rename to the final path (atomic on POSIX).
//! 6. Remember the digest.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::digest;
use crate::error::{io_err, SessionError};

/// Outcome of flushing one buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutputStatus {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was skipped: buffer matches what was last written.
    Unchanged { path: PathBuf },
    /// No output path configured; the buffer stays in memory.
    InMemory,
}

impl OutputStatus {
    pub fn was_written(&self) -> bool {
        matches!(self, OutputStatus::Written { .. })
    }
}

#[derive(Debug, Default)]
pub struct OutputBuffer {
    text: String,
    target: Option<PathBuf>,
    flushed_digest: Option<String>,
}

impl OutputBuffer {
    pub fn new(target: Option<PathBuf>) -> Self {
        Self {
            text: String::new(),
            target,
            flushed_digest: None,
        }
    }

    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Discard everything after `offset`. Offsets past the end, or off a
    /// character boundary, leave the buffer alone.
    pub fn seek(&mut self, offset: usize) {
        if offset < self.text.len() && self.text.is_char_boundary(offset) {
            self.text.truncate(offset);
        }
    }

    pub fn append(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn flush(&mut self) -> Result<OutputStatus, SessionError> {
        let Some(path) = self.target.clone() else {
            return Ok(OutputStatus::InMemory);
        };
        let tmp = PathBuf::from(format!("{}.litweave.tmp", path.display()));
        self.flush_with_tmp(&path, &tmp)
    }

    fn flush_with_tmp(&mut self, path: &Path, tmp: &Path) -> Result<OutputStatus, SessionError> {
        let digest = digest(&self.text);
        if self.flushed_digest.as_deref() == Some(digest.as_str()) && path.exists() {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(OutputStatus::Unchanged {
                path: path.to_path_buf(),
            });
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        if let Some(tmp_parent) = tmp.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(tmp_parent).map_err(|e| io_err(tmp_parent, e))?;
        }
        std::fs::write(tmp, &self.text).map_err(|e| io_err(tmp, e))?;

        if let Err(e) = std::fs::rename(tmp, path) {
            let _ = std::fs::remove_file(tmp);
            return Err(io_err(path, e));
        }

        self.flushed_digest = Some(digest);
        tracing::info!("wrote: {}", path.display());
        Ok(OutputStatus::Written {
            path: path.to_path_buf(),
        })
    }
}
