//! Run reports returned to callers (and over the daemon socket).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use litweave_core::{Diagnostic, Operation, ProjectKey, Severity};

use crate::buffer::OutputStatus;
use crate::session::SessionState;

/// Summary of one `Session::run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub project: ProjectKey,
    pub operation: Operation,
    /// Chunks read from the document.
    pub chunks: usize,
    /// Chunks that missed the cache and were rewritten.
    pub reprocessed: usize,
    /// Chunks whose previous output was kept.
    pub skipped: usize,
    /// Non-empty hunks produced by processors this run.
    pub hunks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weave: Option<OutputStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tangle: Option<OutputStatus>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunReport {
    /// Keep diagnostics at or above `level`; drop all of them when `quiet`.
    pub fn filter_diagnostics(&mut self, level: Severity, quiet: bool) {
        if quiet {
            self.diagnostics.clear();
        } else {
            self.diagnostics.retain(|d| d.severity >= level);
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

/// One row of the daemon's `status` answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub project: ProjectKey,
    pub state: SessionState,
    pub runs: u64,
    /// Cache entries currently held.
    pub cached_chunks: usize,
    pub processors: Vec<String>,
    pub formatters: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
}
