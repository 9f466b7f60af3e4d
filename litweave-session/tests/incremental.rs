use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use litweave_core::{
    Chunk, Hunk, JobRequest, Operation, Options, PluginDescriptor, PluginError, PluginRegistry,
    Processor, Severity,
};
use litweave_session::{run_local, OutputStatus, Session, SessionError};
use serde_json::json;
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Sums the integer on every chunk it sees and prints the running total.
struct Accumulator {
    total: i64,
}

impl Processor for Accumulator {
    fn name(&self) -> &str {
        "acc"
    }

    fn process(&mut self, chunk: &Chunk, _options: &Options) -> Vec<Hunk> {
        self.total += chunk.raw.trim().parse::<i64>().unwrap_or(0);
        vec![Hunk::stdout(format!("total = {}\n", self.total))]
    }
}

fn registry() -> Arc<PluginRegistry> {
    let mut registry = litweave_renderer::builtin_registry().expect("builtin registry");
    registry
        .register_processor(
            PluginDescriptor::processor("acc", Options::new()),
            |_: &Options| -> Result<Box<dyn Processor>, PluginError> {
                Ok(Box::new(Accumulator { total: 0 }))
            },
        )
        .expect("register acc");
    Arc::new(registry)
}

fn write_doc(path: &Path, text: &str) {
    fs::write(path, text).expect("write document");
}

fn job(dir: &TempDir, input: &Path) -> JobRequest {
    let mut job = JobRequest::new(input);
    job.weave_output = Some(dir.path().join("doc.rst"));
    job.tangle_output = Some(dir.path().join("doc.py"));
    job
}

/// What a brand-new session produces for the document currently on disk.
fn fresh_weave(input: &Path) -> String {
    let job = JobRequest::new(input);
    run_local(registry(), &job).expect("fresh run").weave
}

const DOC: &str = "intro\n%<\nx = 1\n%>\nmid\n%<\ny = 2\n%>\noutro\n";

// ---------------------------------------------------------------------------
// 1. Idempotence
// ---------------------------------------------------------------------------

#[test]
fn unchanged_document_is_not_rewritten() {
    init_logging();
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("doc.lit");
    write_doc(&input, DOC);
    let job = job(&dir, &input);

    let mut session = Session::from_job(&job, registry()).expect("session");
    let first = session.run(&job).expect("first run");
    assert!(matches!(first.weave, Some(OutputStatus::Written { .. })));
    let woven = fs::read_to_string(dir.path().join("doc.rst")).expect("read weave");

    let second = session.run(&job).expect("second run");
    assert_eq!(second.reprocessed, 0, "second run must be all cache hits");
    assert_eq!(second.skipped, 5);
    assert!(matches!(second.weave, Some(OutputStatus::Unchanged { .. })));
    assert_eq!(
        fs::read_to_string(dir.path().join("doc.rst")).expect("read weave"),
        woven
    );
}

#[test]
fn compact_output_wraps_code_in_code_blocks() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("doc.lit");
    write_doc(&input, "intro\n%< {}\nx = 1\n%>\noutro\n");
    let out = run_local(registry(), &JobRequest::new(&input)).expect("run");
    assert!(out.weave.starts_with("intro\n\n.. code-block:: python\n\n    x = 1\n"));
    assert!(out.weave.ends_with("outro\n"));
}

// ---------------------------------------------------------------------------
// 2. Edit locality
// ---------------------------------------------------------------------------

#[test]
fn editing_a_chunk_reprocesses_it_and_everything_after() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("doc.lit");
    write_doc(&input, DOC);
    let job = job(&dir, &input);
    let mut session = Session::from_job(&job, registry()).expect("session");
    session.run(&job).expect("first run");

    let keep = session.cache().last_offset(2).expect("offset of chunk #2");
    let prefix = session.weave_text()[..keep].to_string();

    write_doc(&input, &DOC.replace("y = 2", "y = 3"));
    let report = session.run(&job).expect("second run");
    assert_eq!(report.skipped, 3);
    assert_eq!(report.reprocessed, 2);
    assert_eq!(&session.weave_text()[..keep], prefix);
    assert!(session.weave_text().contains("y = 3"));
    assert_eq!(session.weave_text(), fresh_weave(&input));
}

#[test]
fn editing_the_first_code_chunk_cascades() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("doc.lit");
    write_doc(&input, DOC);
    let job = job(&dir, &input);
    let mut session = Session::from_job(&job, registry()).expect("session");
    session.run(&job).expect("first run");

    write_doc(&input, &DOC.replace("x = 1", "x = 2"));
    let report = session.run(&job).expect("second run");
    assert_eq!(report.skipped, 1, "only the intro survives");
    assert_eq!(report.reprocessed, 4);
    assert_eq!(session.weave_text(), fresh_weave(&input));
}

#[test]
fn changing_chunk_options_invalidates_it() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("doc.lit");
    write_doc(&input, DOC);
    let job = job(&dir, &input);
    let mut session = Session::from_job(&job, registry()).expect("session");
    session.run(&job).expect("first run");

    write_doc(&input, &DOC.replacen("%<\ny = 2", "%< {\"e\": false}\ny = 2", 1));
    let report = session.run(&job).expect("second run");
    assert_eq!(report.reprocessed, 2);
    assert!(!session.weave_text().contains("y = 2"), "echo was turned off");
}

#[test]
fn shrinking_document_drops_stale_tail() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("doc.lit");
    write_doc(&input, DOC);
    let job = job(&dir, &input);
    let mut session = Session::from_job(&job, registry()).expect("session");
    session.run(&job).expect("first run");

    write_doc(&input, "intro\n%<\nx = 1\n%>\n");
    let report = session.run(&job).expect("second run");
    assert_eq!(report.chunks, 2);
    assert_eq!(report.reprocessed, 0);
    assert_eq!(session.cache().len(), 2);
    assert_eq!(session.weave_text(), fresh_weave(&input));
    assert!(!session.weave_text().contains("outro"));
    assert_eq!(
        fs::read_to_string(dir.path().join("doc.rst")).expect("read weave"),
        session.weave_text()
    );
}

// ---------------------------------------------------------------------------
// 3. Tangle
// ---------------------------------------------------------------------------

#[test]
fn tangle_reproduces_embedded_source() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("doc.lit");
    write_doc(&input, DOC);
    let mut job = job(&dir, &input);
    job.operation = Operation::Both;

    let mut session = Session::from_job(&job, registry()).expect("session");
    session.run(&job).expect("first run");
    session.run(&job).expect("second run");
    assert_eq!(session.tangle_text(), "x = 1\ny = 2\n", "tangle is rebuilt, never appended");
    assert_eq!(
        fs::read_to_string(dir.path().join("doc.py")).expect("read tangle"),
        "x = 1\ny = 2\n"
    );
}

// ---------------------------------------------------------------------------
// 4. Dispatch
// ---------------------------------------------------------------------------

#[test]
fn unknown_processor_yields_one_warning_and_no_output() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("doc.lit");
    write_doc(&input, "a\n%< {\"proc\": \"fortran\"}\nx\n%>\nb\n");
    let out = run_local(registry(), &JobRequest::new(&input)).expect("run must not abort");
    assert_eq!(out.weave, "a\nb\n");
    assert_eq!(out.report.chunks, 3);
    let warnings: Vec<_> = out
        .report
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].chunk, Some(1));
}

#[test]
fn malformed_directive_is_reported_not_fatal() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("doc.lit");
    write_doc(&input, "%< {oops\nx = 1\n%>\n");
    let out = run_local(registry(), &JobRequest::new(&input)).expect("run");
    assert!(out.weave.contains("x = 1"));
    assert_eq!(out.report.diagnostics.len(), 1);
    assert_eq!(out.report.diagnostics[0].line, 1);

    let mut quiet = JobRequest::new(&input);
    quiet.quiet = true;
    let out = run_local(registry(), &quiet).expect("run");
    assert!(out.report.diagnostics.is_empty());
}

#[test]
fn stateful_processor_sees_chunks_in_order() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("doc.lit");
    write_doc(
        &input,
        "%< {\"proc\": \"acc\", \"e\": false}\n1\n%>\n%< {\"proc\": \"acc\", \"e\": false}\n2\n%>\n",
    );
    let out = run_local(registry(), &JobRequest::new(&input)).expect("run");
    assert!(out.weave.contains("total = 1"));
    assert!(out.weave.contains("total = 3"), "second chunk must see the first one's state");
}

// ---------------------------------------------------------------------------
// 5. Errors
// ---------------------------------------------------------------------------

#[test]
fn unterminated_chunk_reports_start_line() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("doc.lit");
    write_doc(&input, "a\nb\n%< {}\nx = 1\n");
    let err = run_local(registry(), &JobRequest::new(&input)).unwrap_err();
    assert!(matches!(err, SessionError::Read { .. }), "got: {err}");
    assert_eq!(err.line(), Some(3));
    assert!(err.to_string().contains("doc.lit"));
}

#[test]
fn custom_tokens_from_session_options() {
    let dir = TempDir::new().expect("tempdir");
    let input: PathBuf = dir.path().join("doc.lit");
    write_doc(&input, "%<<\nx = 1\n%>>\n%%%%<< literal\n");
    let mut job = JobRequest::new(&input);
    job.options = json!({"start_token": "%<<", "end_token": "%>>", "comment_token": "%%%"})
        .as_object()
        .cloned()
        .expect("object");
    let out = run_local(registry(), &job).expect("run");
    assert!(out.weave.contains("    x = 1"));
    assert!(out.weave.ends_with("%<< literal\n"));
}
