//! Tera rendering engine: embedded reStructuredText templates plus optional
//! user overrides.
//!
//! | Template                  | Used for                                        |
//! |---------------------------|-------------------------------------------------|
//! | `rst/code_block.rst.tera` | first text hunk of a chunk (`.. code-block::`)  |
//! | `rst/indented.rst.tera`   | every following text hunk, continuing the block |
//! | `rst/figure.rst.tera`     | figure hunks (`.. figure::`)                    |

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::Tera;

use crate::context::{BlockContext, FigureContext};
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates: baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("rst/code_block.rst.tera", include_str!("templates/rst/code_block.rst.tera")),
    ("rst/indented.rst.tera", include_str!("templates/rst/indented.rst.tera")),
    ("rst/figure.rst.tera", include_str!("templates/rst/figure.rst.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .to_lowercase()
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    let mut templates = Vec::new();
    for path in files {
        if path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert(
            normalize_template_name(Path::new(name)),
            (*content).to_string(),
        );
    }
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// The templates formatters render through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    CodeBlock,
    Indented,
    Figure,
}

impl Template {
    pub fn all() -> &'static [Template] {
        &[Template::CodeBlock, Template::Indented, Template::Figure]
    }

    /// Name under which the template is registered (and overridden).
    pub fn name(&self) -> &'static str {
        match self {
            Template::CodeBlock => "rst/code_block.rst.tera",
            Template::Indented => "rst/indented.rst.tera",
            Template::Figure => "rst/figure.rst.tera",
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine for rendering templates with optional user overrides.
///
/// `user_template_dir` may contain `.tera` files that override embedded
/// defaults, e.g. `<dir>/rst/figure.rst.tera`. Template names are normalised
/// to lowercase relative paths.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let tera = build_tera(user_template_dir)?;
        Ok(TemplateEngine { tera })
    }

    /// Render a text hunk, as the opening `code-block` directive when `lead`
    /// is set and as an indented continuation otherwise.
    pub fn render_block(&self, ctx: &BlockContext, lead: bool) -> Result<String, RenderError> {
        let template = if lead { Template::CodeBlock } else { Template::Indented };
        Ok(self.tera.render(template.name(), &ctx.to_tera_context()?)?)
    }

    pub fn render_figure(&self, ctx: &FigureContext) -> Result<String, RenderError> {
        Ok(self.tera.render(Template::Figure.name(), &ctx.to_tera_context()?)?)
    }

    /// Names of every loaded template, sorted.
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tera.get_template_names().collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use litweave_core::{Figure, Hunk};

    fn block(text: &str) -> BlockContext {
        BlockContext::from_hunk(0, "python", &Hunk::source(text)).unwrap()
    }

    #[test]
    fn engine_new_succeeds() {
        let engine = TemplateEngine::new(None).expect("embedded templates must parse");
        for template in Template::all() {
            assert!(engine.template_names().contains(&template.name()));
        }
    }

    #[test]
    fn lead_block_is_a_code_block_directive() {
        let engine = TemplateEngine::new(None).unwrap();
        let out = engine.render_block(&block("x = 1\n"), true).unwrap();
        assert!(out.starts_with("\n.. code-block:: python\n\n    x = 1\n"), "got: {out:?}");
    }

    #[test]
    fn continuation_block_is_only_indented() {
        let engine = TemplateEngine::new(None).unwrap();
        let out = engine.render_block(&block("1\n"), false).unwrap();
        assert!(out.starts_with("\n    1\n"), "got: {out:?}");
        assert!(!out.contains("code-block"));
    }

    #[test]
    fn figure_height_is_optional() {
        let engine = TemplateEngine::new(None).unwrap();
        let mut figure = Figure::new("fig/plot.png");
        figure.label = "plot".to_string();
        let out = engine
            .render_figure(&FigureContext::from_figure(2, &figure))
            .unwrap();
        assert!(out.contains(".. _plot:"), "got: {out}");
        assert!(out.contains(".. figure:: fig/plot.png"));
        assert!(out.contains(":width: 100%"));
        assert!(!out.contains(":height:"));

        figure.height = Some("50%".to_string());
        let out = engine
            .render_figure(&FigureContext::from_figure(2, &figure))
            .unwrap();
        assert!(out.contains(":height: 50%"), "got: {out}");
    }

    #[test]
    fn no_crlf_in_rendered_output() {
        let engine = TemplateEngine::new(None).unwrap();
        let out = engine.render_block(&block("a\nb\n"), true).unwrap();
        assert!(!out.contains('\r'));
    }
}
