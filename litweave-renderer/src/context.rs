//! Template contexts: serializable rendering payloads built from hunks.

use serde::{Deserialize, Serialize};

use litweave_core::{Figure, Hunk};

use crate::error::RenderError;

/// Indent applied to every non-blank line of a code block body.
pub const INDENT: &str = "    ";

/// Trim `text` and indent each non-blank line by [`INDENT`]. Blank lines
/// stay empty so the reStructuredText block is not broken by trailing spaces.
pub fn indent_block(text: &str) -> String {
    text.trim()
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{INDENT}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Payload for `rst/code_block.rst.tera` and `rst/indented.rst.tera`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockContext {
    /// Chunk number the block belongs to.
    pub number: usize,
    /// Hunk kind (`source`, `stdout`, ...).
    pub kind: String,
    /// Language named in the `code-block` directive.
    pub lang: String,
    /// Hunk text, already indented.
    pub code: String,
}

impl BlockContext {
    /// `None` for figures.
    pub fn from_hunk(number: usize, lang: &str, hunk: &Hunk) -> Option<Self> {
        hunk.text().map(|text| Self {
            number,
            kind: hunk.kind_name().to_string(),
            lang: lang.to_string(),
            code: indent_block(text),
        })
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

/// Payload for `rst/figure.rst.tera`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FigureContext {
    pub number: usize,
    pub path: String,
    pub label: String,
    pub alt: String,
    pub width: String,
    pub height: Option<String>,
    pub desc: String,
}

impl FigureContext {
    pub fn from_figure(number: usize, figure: &Figure) -> Self {
        Self {
            number,
            path: figure.path.to_string_lossy().replace('\\', "/"),
            label: figure.label.clone(),
            alt: figure.alt.clone(),
            width: figure.width.clone(),
            height: figure.height.clone(),
            desc: figure.desc.clone(),
        }
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}
