//! litweave: incremental literate-programming weaver.
//!
//! # Usage
//!
//! ```text
//! litweave weave <input> [-o out.rst] [--tangle-output out.py] [--daemon] [--rebuild]
//!                [--processor p] [--formatter f] [--option key=json]... [--force]
//! litweave tangle <input> [-o out.py] [--daemon] [--force]
//! litweave daemon start|stop|status|ping
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonCommand, tangle::TangleArgs, weave::WeaveArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "litweave",
    version,
    about = "Weave and tangle literate documents, incrementally",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a document, running its code chunks through their processors.
    Weave(WeaveArgs),

    /// Extract the embedded source of a document.
    Tangle(TangleArgs),

    /// Manage the background daemon that keeps sessions warm.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Weave(args) => args.run(),
        Commands::Tangle(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
