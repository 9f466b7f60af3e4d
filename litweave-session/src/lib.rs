//! # litweave-session
//!
//! The incremental engine: per-document chunk cache, patched output
//! buffers with hash-gated atomic flushes, live plugin dispatch, and the
//! [`Session`] tying them together.
//!
//! Use [`Session`] directly to keep state across runs, or
//! [`pipeline::run_local`] for a one-shot run.

pub mod buffer;
pub mod cache;
pub mod error;
pub mod pipeline;
pub mod plugins;
pub mod report;
pub mod session;
pub mod settings;

pub use buffer::{OutputBuffer, OutputStatus};
pub use cache::{CacheEntry, ChunkCache};
pub use error::SessionError;
pub use pipeline::{run_local, LocalRun};
pub use report::{RunReport, SessionSummary};
pub use session::{Session, SessionState};
pub use settings::SessionSettings;
