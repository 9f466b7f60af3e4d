//! Domain types shared by the reader, the plugin registry and the session engine.
//!
//! Option bags are plain JSON objects ([`Options`]); serde_json's map is
//! ordered, so two bags compare equal exactly when their key/value sets do.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A resolved key/value option bag.
pub type Options = serde_json::Map<String, Value>;

/// Overlay `overlay` on top of `base`, returning a new bag.
pub fn merge_options(base: &Options, overlay: &Options) -> Options {
    let mut merged = base.clone();
    for (key, value) in overlay {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

// ---------------------------------------------------------------------------
// Chunks
// ---------------------------------------------------------------------------

/// Lexical kind of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Text,
    Code,
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkKind::Text => write!(f, "text"),
            ChunkKind::Code => write!(f, "code"),
        }
    }
}

/// One unit produced by the [`ChunkReader`](crate::reader::ChunkReader).
///
/// `number` counts text and code chunks together, starting at 0.
/// `line_number` is the 1-based source line the chunk starts on; for code
/// chunks that is the line carrying the start token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub number: usize,
    pub line_number: usize,
    pub kind: ChunkKind,
    pub options: Options,
    pub raw: String,
}

impl Chunk {
    pub fn text(number: usize, line_number: usize, raw: impl Into<String>) -> Self {
        Self {
            number,
            line_number,
            kind: ChunkKind::Text,
            options: Options::new(),
            raw: raw.into(),
        }
    }

    pub fn code(number: usize, line_number: usize, options: Options, raw: impl Into<String>) -> Self {
        Self {
            number,
            line_number,
            kind: ChunkKind::Code,
            options,
            raw: raw.into(),
        }
    }

    pub fn is_code(&self) -> bool {
        self.kind == ChunkKind::Code
    }

    /// String value of an option, if present and a string.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    /// Material the incremental cache hashes for this chunk.
    ///
    /// Covers the kind and resolved options as well as the body, so editing a
    /// chunk's directive line invalidates it just like editing its body.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}\u{0}{}\u{0}{}",
            self.kind,
            Value::Object(self.options.clone()),
            self.raw
        )
    }
}

// ---------------------------------------------------------------------------
// Hunks
// ---------------------------------------------------------------------------

/// A figure reference emitted by a processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Figure {
    pub path: PathBuf,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default = "default_figure_width")]
    pub width: String,
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub desc: String,
}

fn default_figure_width() -> String {
    "100%".to_string()
}

impl Figure {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            label: String::new(),
            alt: String::new(),
            width: default_figure_width(),
            height: None,
            desc: String::new(),
        }
    }
}

/// One typed output fragment produced by a processor for a formatter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Hunk {
    /// Echoed source code.
    Source { text: String },
    /// Captured standard output.
    Stdout { text: String },
    /// Captured standard error.
    Stderr { text: String },
    /// Error trace from a failed execution.
    Traceback { text: String },
    /// An auto-printed result.
    Result { text: String },
    Figure(Figure),
}

impl Hunk {
    pub fn source(text: impl Into<String>) -> Self {
        Hunk::Source { text: text.into() }
    }

    pub fn stdout(text: impl Into<String>) -> Self {
        Hunk::Stdout { text: text.into() }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Hunk::Stderr { text: text.into() }
    }

    pub fn traceback(text: impl Into<String>) -> Self {
        Hunk::Traceback { text: text.into() }
    }

    pub fn result(text: impl Into<String>) -> Self {
        Hunk::Result { text: text.into() }
    }

    /// Textual payload, `None` for figures.
    pub fn text(&self) -> Option<&str> {
        match self {
            Hunk::Source { text }
            | Hunk::Stdout { text }
            | Hunk::Stderr { text }
            | Hunk::Traceback { text }
            | Hunk::Result { text } => Some(text),
            Hunk::Figure(_) => None,
        }
    }

    /// Empty hunks contribute no output and are dropped before formatting.
    pub fn is_empty(&self) -> bool {
        match self {
            Hunk::Figure(figure) => figure.path.as_os_str().is_empty(),
            _ => self.text().map(|t| t.trim().is_empty()).unwrap_or(true),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Hunk::Source { .. } => "source",
            Hunk::Stdout { .. } => "stdout",
            Hunk::Stderr { .. } => "stderr",
            Hunk::Traceback { .. } => "traceback",
            Hunk::Result { .. } => "result",
            Hunk::Figure(_) => "figure",
        }
    }
}

// ---------------------------------------------------------------------------
// Projects and jobs
// ---------------------------------------------------------------------------

/// Identity of a session: the input path plus both optional output paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectKey {
    pub input: PathBuf,
    pub weave_output: Option<PathBuf>,
    pub tangle_output: Option<PathBuf>,
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show(path: &Option<PathBuf>) -> String {
            path.as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string())
        }
        write!(
            f,
            "{} -> {} | {}",
            self.input.display(),
            show(&self.weave_output),
            show(&self.tangle_output)
        )
    }
}

/// What a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    Weave,
    Tangle,
    Both,
}

impl Operation {
    pub fn weaves(self) -> bool {
        matches!(self, Operation::Weave | Operation::Both)
    }

    pub fn tangles(self) -> bool {
        matches!(self, Operation::Tangle | Operation::Both)
    }
}

/// One weave/tangle request: paths, session option bag, rebuild flag and
/// logging preferences. This is also the `run` payload of the daemon protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub input: PathBuf,
    #[serde(default, rename = "woutput", skip_serializing_if = "Option::is_none")]
    pub weave_output: Option<PathBuf>,
    #[serde(default, rename = "toutput", skip_serializing_if = "Option::is_none")]
    pub tangle_output: Option<PathBuf>,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub rebuild: bool,
    #[serde(default)]
    pub operation: Operation,
    /// Lowest diagnostic severity echoed back to the client.
    #[serde(default)]
    pub log_level: Severity,
    /// Suppress diagnostics in the response entirely.
    #[serde(default)]
    pub quiet: bool,
}

impl JobRequest {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            weave_output: None,
            tangle_output: None,
            options: Options::new(),
            rebuild: false,
            operation: Operation::default(),
            log_level: Severity::default(),
            quiet: false,
        }
    }

    pub fn project_key(&self) -> ProjectKey {
        ProjectKey {
            input: self.input.clone(),
            weave_output: self.weave_output.clone(),
            tangle_output: self.tangle_output.clone(),
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Severity of a per-run diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    #[default]
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => write!(f, "debug"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A non-fatal problem noticed while reading or dispatching a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(line: usize, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            line,
            chunk: None,
            message: message.into(),
        }
    }

    pub fn error(line: usize, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            line,
            chunk: None,
            message: message.into(),
        }
    }

    pub fn for_chunk(mut self, chunk: usize) -> Self {
        self.chunk = Some(chunk);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chunk {
            Some(chunk) => write!(
                f,
                "{} (line {}, chunk #{}): {}",
                self.severity, self.line, chunk, self.message
            ),
            None => write!(f, "{} (line {}): {}", self.severity, self.line, self.message),
        }
    }
}
