//! A session: the incremental state kept for one project.
//!
//! ```text
//!   Fresh ──run──▶ Running ──done──▶ Idle ──run──▶ Running ...
//! ```
//!
//! Replacement (rebuild, changed option bag) is the owner's business; a
//! session only ever moves between these three states.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use litweave_core::{
    Chunk, ChunkReader, ConfigError, Diagnostic, JobRequest, Operation, Options, PluginKind,
    PluginRegistry, ProjectKey, Tokens,
};

use crate::buffer::OutputBuffer;
use crate::cache::ChunkCache;
use crate::error::{io_err, SessionError};
use crate::plugins::LivePlugins;
use crate::report::{RunReport, SessionSummary};
use crate::settings::SessionSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Fresh,
    Running,
    Idle,
}

#[derive(Debug, Default)]
struct Counters {
    chunks: usize,
    reprocessed: usize,
    skipped: usize,
    hunks: usize,
}

pub struct Session {
    key: ProjectKey,
    options: Options,
    settings: SessionSettings,
    tokens: Tokens,
    registry: Arc<PluginRegistry>,
    cache: ChunkCache,
    weave: OutputBuffer,
    tangle: OutputBuffer,
    plugins: LivePlugins,
    state: SessionState,
    runs: u64,
    created_at: DateTime<Utc>,
    last_run_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Validate `options` and build an empty session.
    ///
    /// Fails before any document is read when the tokens are inconsistent or
    /// a default plugin is not registered.
    pub fn new(
        key: ProjectKey,
        options: Options,
        registry: Arc<PluginRegistry>,
    ) -> Result<Self, SessionError> {
        let settings = SessionSettings::from_options(&options)?;
        let tokens = settings.tokens()?;
        for (kind, name) in [
            (PluginKind::Processor, &settings.processor),
            (PluginKind::Formatter, &settings.formatter),
        ] {
            if !registry.contains(kind, name) {
                return Err(ConfigError::UnknownDefault {
                    kind,
                    name: name.clone(),
                }
                .into());
            }
        }
        Ok(Self {
            weave: OutputBuffer::new(key.weave_output.clone()),
            tangle: OutputBuffer::new(key.tangle_output.clone()),
            key,
            options,
            settings,
            tokens,
            registry,
            cache: ChunkCache::new(),
            plugins: LivePlugins::new(),
            state: SessionState::Fresh,
            runs: 0,
            created_at: Utc::now(),
            last_run_at: None,
        })
    }

    pub fn from_job(job: &JobRequest, registry: Arc<PluginRegistry>) -> Result<Self, SessionError> {
        Self::new(job.project_key(), job.options.clone(), registry)
    }

    pub fn key(&self) -> &ProjectKey {
        &self.key
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn weave_text(&self) -> &str {
        self.weave.as_str()
    }

    pub fn tangle_text(&self) -> &str {
        self.tangle.as_str()
    }

    pub fn summary(&self) -> SessionSummary {
        let (processors, formatters) = self.plugins.live_names();
        SessionSummary {
            project: self.key.clone(),
            state: self.state,
            runs: self.runs,
            cached_chunks: self.cache.len(),
            processors: processors.into_iter().map(str::to_string).collect(),
            formatters: formatters.into_iter().map(str::to_string).collect(),
            created_at: self.created_at,
            last_run_at: self.last_run_at,
        }
    }

    /// Run `job` against this session. The job's paths are assumed to match
    /// the session key; its diagnostics preferences filter the report.
    pub fn run(&mut self, job: &JobRequest) -> Result<RunReport, SessionError> {
        let mut report = self.run_operation(job.operation)?;
        report.filter_diagnostics(job.log_level, job.quiet);
        Ok(report)
    }

    pub fn weave(&mut self) -> Result<RunReport, SessionError> {
        self.run_operation(Operation::Weave)
    }

    pub fn tangle(&mut self) -> Result<RunReport, SessionError> {
        self.run_operation(Operation::Tangle)
    }

    fn run_operation(&mut self, operation: Operation) -> Result<RunReport, SessionError> {
        let started = Instant::now();
        self.state = SessionState::Running;
        let mut diagnostics = Vec::new();
        let outcome = self.process_document(operation, &mut diagnostics);
        self.state = SessionState::Idle;
        self.runs += 1;
        let counters = outcome?;

        let weave = if operation.weaves() {
            Some(self.weave.flush()?)
        } else {
            None
        };
        let tangle = if operation.tangles() {
            Some(self.tangle.flush()?)
        } else {
            None
        };

        let finished_at = Utc::now();
        self.last_run_at = Some(finished_at);
        tracing::info!(
            "{}: {} chunks, {} reprocessed, {} skipped",
            self.key,
            counters.chunks,
            counters.reprocessed,
            counters.skipped
        );
        Ok(RunReport {
            project: self.key.clone(),
            operation,
            chunks: counters.chunks,
            reprocessed: counters.reprocessed,
            skipped: counters.skipped,
            hunks: counters.hunks,
            weave,
            tangle,
            diagnostics,
            finished_at,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Read the input and patch the buffers chunk by chunk, in order.
    fn process_document(
        &mut self,
        operation: Operation,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Counters, SessionError> {
        let path = self.key.input.clone();
        let file = File::open(&path).map_err(|e| io_err(&path, e))?;
        let mut reader = ChunkReader::new(
            BufReader::new(file),
            self.tokens.clone(),
            self.settings.code_defaults(),
        );

        if operation.tangles() {
            self.tangle.clear();
        }

        let mut counters = Counters::default();
        while let Some(item) = reader.next() {
            diagnostics.extend(reader.take_diagnostics());
            let chunk = item.map_err(|source| SessionError::Read {
                path: path.clone(),
                source,
            })?;
            counters.chunks += 1;

            if operation.tangles() && chunk.is_code() {
                self.tangle.append(&chunk.raw);
            }
            if operation.weaves() {
                self.weave_chunk(&chunk, &mut counters, diagnostics);
            }
        }
        diagnostics.extend(reader.take_diagnostics());

        if operation.weaves() {
            self.cache.truncate(counters.chunks);
            let end = match counters.chunks.checked_sub(1) {
                Some(last) => self.cache.last_offset(last).unwrap_or(self.weave.len()),
                None => 0,
            };
            self.weave.seek(end);
        }
        Ok(counters)
    }

    fn weave_chunk(&mut self, chunk: &Chunk, counters: &mut Counters, diagnostics: &mut Vec<Diagnostic>) {
        let index = chunk.number;
        if !self.cache.should_reprocess(index, &chunk.fingerprint()) {
            tracing::debug!("chunk #{} unchanged", index);
            counters.skipped += 1;
            return;
        }
        counters.reprocessed += 1;

        let start = match index.checked_sub(1) {
            Some(previous) => self.cache.last_offset(previous),
            None => Some(0),
        };
        if let Some(offset) = start {
            self.weave.seek(offset);
        }

        if chunk.is_code() {
            let dispatched = self.plugins.dispatch(
                &self.registry,
                &self.settings,
                &self.options,
                chunk,
                diagnostics,
            );
            counters.hunks += dispatched.hunks;
            for fragment in &dispatched.fragments {
                self.weave.append(fragment);
            }
        } else {
            self.weave.append(&chunk.raw);
        }
        self.cache.record_offset(index, self.weave.len());
    }
}
