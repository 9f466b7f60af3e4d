//! The litweave daemon: a socket server keeping one incremental session per
//! project alive between requests, plus the blocking client used by the CLI.

mod error;
pub mod protocol;
mod runtime;
pub mod table;

pub use error::DaemonError;
pub use protocol::{
    request_ping, request_run, request_status, request_stop, send_request, DaemonRequest,
    DaemonResponse, RunOutcome,
};
pub use runtime::{init_tracing, run, start_blocking, Daemon, DaemonSettings};
pub use table::{Checkout, ProjectGate, SessionStatus, SessionTable, SharedSession};
