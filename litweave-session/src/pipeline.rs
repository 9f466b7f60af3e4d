//! One-shot local runs, used when no daemon is involved.

use std::sync::Arc;

use litweave_core::{JobRequest, PluginRegistry};

use crate::error::SessionError;
use crate::report::RunReport;
use crate::session::Session;

/// Result of a local run: the report plus the final buffer contents.
#[derive(Debug, Clone)]
pub struct LocalRun {
    pub report: RunReport,
    pub weave: String,
    pub tangle: String,
}

/// Build a fresh session for `job`, run it once and drop it.
pub fn run_local(registry: Arc<PluginRegistry>, job: &JobRequest) -> Result<LocalRun, SessionError> {
    let mut session = Session::from_job(job, registry)?;
    let report = session.run(job)?;
    Ok(LocalRun {
        report,
        weave: session.weave_text().to_string(),
        tangle: session.tangle_text().to_string(),
    })
}
