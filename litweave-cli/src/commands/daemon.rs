//! `litweave daemon`: background session server lifecycle.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use litweave_core::Config;
use litweave_daemon::{
    request_ping, request_status, request_stop, start_blocking, DaemonError, DaemonSettings,
    SessionStatus,
};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground.
    Start,
    /// Request graceful daemon shutdown.
    Stop,
    /// Show the daemon's live sessions.
    Status(DaemonStatusArgs),
    /// Check that the daemon answers.
    Ping,
}

#[derive(Args, Debug)]
pub struct DaemonStatusArgs {
    /// Emit the raw status JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "input")]
    input: String,
    #[tabled(rename = "weave")]
    weave: String,
    #[tabled(rename = "tangle")]
    tangle: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "runs")]
    runs: String,
    #[tabled(rename = "cached chunks")]
    cached: String,
    #[tabled(rename = "last run")]
    last_run: String,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let config = Config::load_at(&home).context("failed to load configuration")?;
    let endpoint = config.endpoint_at(&home);

    match command {
        DaemonCommand::Start => {
            start_blocking(DaemonSettings::from_config_at(&config, &home))
                .context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&endpoint) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Ping => match request_ping(&endpoint) {
            Ok(pong) => println!(
                "{} daemon {} answering on {endpoint}",
                "✓".green(),
                pong["version"].as_str().unwrap_or("?")
            ),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to ping daemon"),
        },
        DaemonCommand::Status(args) => match request_status(&endpoint) {
            Ok(status) if args.json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status)
                        .context("failed to render daemon status JSON")?
                );
            }
            Ok(status) => print_status(&status)?,
            Err(DaemonError::DaemonNotRunning { .. }) if args.json => {
                let payload = serde_json::json!({
                    "running": false,
                    "endpoint": endpoint.to_string(),
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&payload)
                        .context("failed to render daemon status JSON")?
                );
            }
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running ({endpoint})");
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        },
    }

    Ok(())
}

fn print_status(status: &Value) -> Result<()> {
    let sessions: Vec<SessionStatus> = serde_json::from_value(status["sessions"].clone())
        .context("daemon sent a malformed session list")?;
    println!(
        "{} daemon on {} (up {}s, {} session{})",
        "●".green(),
        status["endpoint"].as_str().unwrap_or("?"),
        status["uptime_secs"].as_i64().unwrap_or(0),
        sessions.len(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    if sessions.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let rows: Vec<SessionRow> = sessions.iter().map(|s| session_row(s, now)).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn session_row(status: &SessionStatus, now: DateTime<Utc>) -> SessionRow {
    let show = |path: &Option<std::path::PathBuf>| {
        path.as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    let (state, runs, cached, last_run) = match &status.summary {
        Some(summary) => (
            format!("{:?}", summary.state).to_lowercase(),
            summary.runs.to_string(),
            summary.cached_chunks.to_string(),
            summary
                .last_run_at
                .map(|at| format_age(now, at))
                .unwrap_or_else(|| "never".to_string()),
        ),
        None => (
            "running".to_string(),
            "-".to_string(),
            "-".to_string(),
            "-".to_string(),
        ),
    };
    SessionRow {
        input: status.project.input.display().to_string(),
        weave: show(&status.project.weave_output),
        tangle: show(&status.project.tangle_output),
        state: if status.busy { "running".to_string() } else { state },
        runs,
        cached,
        last_run,
    }
}

fn format_age(now: DateTime<Utc>, at: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        _ => format!("{}h ago", secs / 3600),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn ages_are_coarse() {
        let now = Utc::now();
        assert_eq!(format_age(now, now - Duration::seconds(5)), "5s ago");
        assert_eq!(format_age(now, now - Duration::seconds(125)), "2m ago");
        assert_eq!(format_age(now, now - Duration::hours(3)), "3h ago");
        assert_eq!(format_age(now, now + Duration::seconds(5)), "0s ago");
    }
}
