//! Flags shared by `weave` and `tangle`, and the code that runs a job
//! locally or through the daemon.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;

use litweave_core::{Config, Diagnostic, JobRequest, Operation, Severity};
use litweave_daemon::{request_run, Checkout, DaemonError};
use litweave_session::{run_local, OutputStatus, RunReport};

#[derive(Args, Debug)]
pub struct JobArgs {
    /// Literate source document.
    pub input: PathBuf,

    /// Send the job to the running daemon instead of processing it here.
    #[arg(long)]
    pub daemon: bool,

    /// Discard the daemon's cached session for this document first.
    #[arg(long, requires = "daemon")]
    pub rebuild: bool,

    /// Default processor for chunks without a `proc` option.
    #[arg(long)]
    pub processor: Option<String>,

    /// Default formatter for chunks without a `form` option.
    #[arg(long)]
    pub formatter: Option<String>,

    /// Extra session option, `key=value`; the value is read as JSON when it parses.
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
    pub options: Vec<(String, Value)>,

    /// Overwrite a guessed output file that already exists.
    #[arg(short, long)]
    pub force: bool,

    /// Print the result to stdout instead of writing a file.
    #[arg(long, conflicts_with = "daemon")]
    pub stdout: bool,

    /// Lowest diagnostic severity to show (debug, info, warning, error).
    #[arg(long, default_value = "warning", value_parser = parse_severity)]
    pub log_level: Severity,

    /// Hide diagnostics.
    #[arg(short, long)]
    pub quiet: bool,

    /// Emit the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl JobArgs {
    /// Assemble the request. `weave_output`/`tangle_output` are the already
    /// resolved targets for the requested operation.
    pub fn job(
        &self,
        config: &Config,
        operation: Operation,
        weave_output: Option<PathBuf>,
        tangle_output: Option<PathBuf>,
    ) -> JobRequest {
        let mut options = config.session_options();
        if let Some(processor) = &self.processor {
            options.insert("processor".into(), Value::from(processor.as_str()));
        }
        if let Some(formatter) = &self.formatter {
            options.insert("formatter".into(), Value::from(formatter.as_str()));
        }
        for (key, value) in &self.options {
            options.insert(key.clone(), value.clone());
        }

        let mut job = JobRequest::new(absolute(&self.input));
        job.weave_output = weave_output.map(|p| absolute(&p));
        job.tangle_output = tangle_output.map(|p| absolute(&p));
        job.options = options;
        job.rebuild = self.rebuild;
        job.operation = operation;
        job.log_level = self.log_level;
        job.quiet = self.quiet;
        job
    }

    /// `explicit` when given, otherwise `<input stem>.<ext>` beside the
    /// input. A guessed path that already exists needs `--force`.
    pub fn output_path(&self, explicit: Option<&Path>, ext: &str) -> Result<Option<PathBuf>> {
        if self.stdout {
            return Ok(None);
        }
        if let Some(path) = explicit {
            return Ok(Some(path.to_path_buf()));
        }
        let guessed = self.input.with_extension(ext);
        if guessed == self.input {
            bail!(
                "guessed output {} is the input itself; name the output explicitly",
                guessed.display()
            );
        }
        if guessed.exists() {
            if !self.force {
                bail!(
                    "output file {} exists; name the output explicitly or pass --force",
                    guessed.display()
                );
            }
            eprintln!(
                "{} overwriting existing file {}",
                "warning:".yellow().bold(),
                guessed.display()
            );
        }
        Ok(Some(guessed))
    }

    /// Run `job` and print its outcome.
    pub fn execute(&self, config: &Config, home: &Path, job: JobRequest) -> Result<()> {
        if self.daemon {
            let endpoint = config.endpoint_at(home);
            let outcome = match request_run(&endpoint, job) {
                Ok(outcome) => outcome,
                Err(DaemonError::DaemonNotRunning { endpoint }) => {
                    bail!("daemon is not running on {endpoint}; start it with `litweave daemon start`")
                }
                Err(err) => return Err(err).context("daemon run failed"),
            };
            return self.print_report(&outcome.report, Some(outcome.session));
        }

        let registry =
            Arc::new(litweave_renderer::builtin_registry().context("failed to register plugins")?);
        let input = job.input.display().to_string();
        let run = run_local(registry, &job).with_context(|| format!("failed to process {input}"))?;
        if self.stdout {
            match job.operation {
                Operation::Tangle => print!("{}", run.tangle),
                Operation::Weave | Operation::Both => print!("{}", run.weave),
            }
            print_diagnostics(&run.report.diagnostics);
            return Ok(());
        }
        self.print_report(&run.report, None)
    }

    fn print_report(&self, report: &RunReport, session: Option<Checkout>) -> Result<()> {
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(report).context("failed to render report JSON")?
            );
            return Ok(());
        }

        let mut line = format!(
            "{} {} ({} chunks: {} processed, {} cached, {} ms)",
            "✓".green(),
            report.project.input.display(),
            report.chunks,
            report.reprocessed,
            report.skipped,
            report.duration_ms
        );
        if let Some(session) = session {
            line.push_str(&format!(" [{} session]", checkout_label(session)).dimmed().to_string());
        }
        println!("{line}");
        for (label, status) in [("weave", &report.weave), ("tangle", &report.tangle)] {
            if let Some(status) = status {
                println!("  {label:<6} {}", describe_output(status));
            }
        }
        print_diagnostics(&report.diagnostics);
        Ok(())
    }
}

fn checkout_label(checkout: Checkout) -> &'static str {
    match checkout {
        Checkout::Created => "new",
        Checkout::Reused => "reused",
        Checkout::Rebuilt => "rebuilt",
        Checkout::OptionsChanged => "replaced",
    }
}

fn describe_output(status: &OutputStatus) -> String {
    match status {
        OutputStatus::Written { path } => format!("{} {}", "written".green(), path.display()),
        OutputStatus::Unchanged { path } => {
            format!("{} {}", "unchanged".dimmed(), path.display())
        }
        OutputStatus::InMemory => "kept in memory".dimmed().to_string(),
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        let severity = match diagnostic.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "info".cyan(),
            Severity::Debug => "debug".dimmed(),
        };
        let chunk = diagnostic
            .chunk
            .map(|n| format!(" (chunk #{n})"))
            .unwrap_or_default();
        eprintln!(
            "  {severity}: line {}{chunk}: {}",
            diagnostic.line, diagnostic.message
        );
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty option name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
    Ok((key.to_string(), value))
}

fn parse_severity(raw: &str) -> Result<Severity, String> {
    serde_json::from_value(Value::from(raw.to_ascii_lowercase()))
        .map_err(|_| format!("unknown level '{raw}'; expected debug, info, warning, error"))
}
