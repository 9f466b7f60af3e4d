//! Line-driven chunk lexer.
//!
//! # Document syntax
//!
//! ```text
//! prose ...                 <- text chunk
//! %< {"proc": "none"}       <- start token + options object
//! x = 1                     <- code chunk body
//! %> {"e": false}           <- end token + (optional) options overrides
//! %%%< literal              <- comment token: first two chars stripped
//! ```
//!
//! The reader is a two-state machine (outside / inside a code chunk) driven
//! one line at a time. It yields chunks lazily and stops at the first parse
//! error; a fresh reader is needed for every pass over a document.

use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ReadError};
use crate::types::{merge_options, Chunk, Diagnostic, Options};

pub const DEFAULT_START_TOKEN: &str = "%<";
pub const DEFAULT_END_TOKEN: &str = "%>";
pub const DEFAULT_COMMENT_TOKEN: &str = "%%";

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Validated delimiter set: equal lengths, pairwise distinct, non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    start: String,
    end: String,
    comment: String,
}

impl Tokens {
    pub fn new(
        start: impl Into<String>,
        end: impl Into<String>,
        comment: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let (start, end, comment) = (start.into(), end.into(), comment.into());
        if start.is_empty() || end.is_empty() || comment.is_empty() {
            return Err(ConfigError::EmptyToken);
        }
        if start.len() != end.len() || start.len() != comment.len() {
            return Err(ConfigError::TokenLength {
                start,
                end,
                comment,
            });
        }
        if start == end || start == comment {
            return Err(ConfigError::TokenClash { token: start });
        }
        if end == comment {
            return Err(ConfigError::TokenClash { token: end });
        }
        Ok(Self {
            start,
            end,
            comment,
        })
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    fn classify<'l>(&self, line: &'l str) -> Line<'l> {
        if let Some(rest) = line.strip_prefix(self.start.as_str()) {
            Line::Start(rest)
        } else if let Some(rest) = line.strip_prefix(self.end.as_str()) {
            Line::End(rest)
        } else if let Some(rest) = line.strip_prefix(self.comment.as_str()) {
            Line::Escaped(rest)
        } else {
            Line::Plain(line)
        }
    }
}

impl Default for Tokens {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_TOKEN.to_string(),
            end: DEFAULT_END_TOKEN.to_string(),
            comment: DEFAULT_COMMENT_TOKEN.to_string(),
        }
    }
}

enum Line<'l> {
    Start(&'l str),
    End(&'l str),
    Escaped(&'l str),
    Plain(&'l str),
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Streaming chunk lexer over any [`BufRead`].
///
/// Yields `Result<Chunk, ReadError>`; after the first error (or the end of
/// input) it yields `None` forever. Option-directive parse failures are not
/// errors: they are collected as [`Diagnostic`]s, drained with
/// [`ChunkReader::take_diagnostics`].
pub struct ChunkReader<R> {
    source: R,
    tokens: Tokens,
    code_defaults: Options,
    buffer: String,
    depth: i32,
    /// Physical number of the most recently read line (1-based).
    line: usize,
    /// Line the chunk currently being accumulated starts on.
    chunk_line: usize,
    next_number: usize,
    open_options: Options,
    diagnostics: Vec<Diagnostic>,
    finished: bool,
}

impl<R: BufRead> ChunkReader<R> {
    /// `code_defaults` is the per-type default bag every code chunk's
    /// directive is merged over.
    pub fn new(source: R, tokens: Tokens, code_defaults: Options) -> Self {
        Self {
            source,
            tokens,
            code_defaults,
            buffer: String::new(),
            depth: 0,
            line: 0,
            chunk_line: 1,
            next_number: 0,
            open_options: Options::new(),
            diagnostics: Vec::new(),
            finished: false,
        }
    }

    /// Drain diagnostics gathered since the last call.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn flush(&mut self, code: bool) -> Option<Chunk> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        let number = self.next_number;
        self.next_number += 1;
        let chunk = if code {
            Chunk::code(
                number,
                self.chunk_line,
                std::mem::take(&mut self.open_options),
                raw,
            )
        } else {
            Chunk::text(number, self.chunk_line, raw)
        };
        Some(chunk)
    }

    fn parse_directive(&mut self, directive: &str) -> Options {
        let directive = directive.trim();
        if directive.is_empty() {
            return Options::new();
        }
        match serde_json::from_str::<Options>(directive) {
            Ok(options) => options,
            Err(err) => {
                self.diagnostics.push(Diagnostic::warning(
                    self.line,
                    format!("ignoring malformed chunk options {directive:?}: {err}"),
                ));
                Options::new()
            }
        }
    }

    /// Feed one line; returns a chunk when the line closes one.
    fn feed(&mut self, line: &str) -> Result<Option<Chunk>, ReadError> {
        let emitted = match self.tokens.classify(line) {
            Line::Start(directive) => {
                let emitted = if self.depth == 0 { self.flush(false) } else { None };
                let overrides = self.parse_directive(directive);
                self.open_options = merge_options(&self.code_defaults, &overrides);
                self.depth += 1;
                self.chunk_line = self.line;
                emitted
            }
            Line::End(directive) => {
                let overrides = self.parse_directive(directive);
                let emitted = if self.depth == 1 {
                    self.open_options = merge_options(&self.open_options, &overrides);
                    self.flush(true)
                } else {
                    None
                };
                self.open_options = Options::new();
                self.depth -= 1;
                self.chunk_line = self.line + 1;
                emitted
            }
            Line::Escaped(rest) => {
                self.buffer.push_str(rest);
                None
            }
            Line::Plain(text) => {
                self.buffer.push_str(text);
                None
            }
        };

        if !(0..=1).contains(&self.depth) {
            return Err(ReadError::Parse {
                line: self.line,
                message: "missing delimiter".to_string(),
            });
        }
        Ok(emitted)
    }

    fn finish(&mut self) -> Option<Result<Chunk, ReadError>> {
        self.finished = true;
        if self.depth == 1 {
            return Some(Err(ReadError::Unterminated {
                line: self.chunk_line,
            }));
        }
        self.flush(false).map(Ok)
    }
}

impl<R: BufRead> Iterator for ChunkReader<R> {
    type Item = Result<Chunk, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let mut line = String::new();
        loop {
            line.clear();
            match self.source.read_line(&mut line) {
                Ok(0) => return self.finish(),
                Ok(_) => {
                    self.line += 1;
                    match self.feed(&line) {
                        Ok(Some(chunk)) => return Some(Ok(chunk)),
                        Ok(None) => continue,
                        Err(err) => {
                            self.finished = true;
                            return Some(Err(err));
                        }
                    }
                }
                Err(source) => {
                    self.finished = true;
                    return Some(Err(ReadError::Io {
                        line: self.line + 1,
                        source,
                    }));
                }
            }
        }
    }
}

/// Read every chunk of an in-memory document.
pub fn read_str(text: &str, tokens: &Tokens, code_defaults: &Options) -> Result<Vec<Chunk>, ReadError> {
    ChunkReader::new(text.as_bytes(), tokens.clone(), code_defaults.clone()).collect()
}
