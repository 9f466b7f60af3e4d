//! `litweave weave`: render a document.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use litweave_core::{Config, Operation};

use super::job::JobArgs;

/// Arguments for `litweave weave`.
#[derive(Args, Debug)]
pub struct WeaveArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Woven output file (default: `<input>.rst`).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also tangle into this file.
    #[arg(long, short = 't')]
    pub tangle_output: Option<PathBuf>,
}

impl WeaveArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let config = Config::load_at(&home).context("failed to load configuration")?;

        let weave_output = self.job.output_path(self.output.as_deref(), "rst")?;
        let operation = if self.tangle_output.is_some() {
            Operation::Both
        } else {
            Operation::Weave
        };
        let job = self
            .job
            .job(&config, operation, weave_output, self.tangle_output.clone());
        self.job.execute(&config, &home, job)
    }
}
