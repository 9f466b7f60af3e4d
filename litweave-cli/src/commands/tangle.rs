//! `litweave tangle`: extract the embedded source.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use litweave_core::{Config, Operation};

use super::job::JobArgs;

/// Arguments for `litweave tangle`.
#[derive(Args, Debug)]
pub struct TangleArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Tangled output file (default: `<input>.py`).
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl TangleArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let config = Config::load_at(&home).context("failed to load configuration")?;

        let tangle_output = self.job.output_path(self.output.as_deref(), "py")?;
        let job = self
            .job
            .job(&config, Operation::Tangle, None, tangle_output);
        self.job.execute(&config, &home, job)
    }
}
