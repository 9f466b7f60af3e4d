use litweave_core::{Chunk, Figure, Hunk, Options, PluginKind};
use litweave_renderer::{builtin_registry, CompactOptions, Template, TemplateEngine};
use serde_json::json;
use tempfile::TempDir;

fn write_template(dir: &TempDir, name: &str, body: &str) {
    let path = dir.path().join(name);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(path, body).expect("write template");
}

fn session_with_templates(dir: &TempDir) -> Options {
    json!({"template_dir": dir.path().to_string_lossy()})
        .as_object()
        .cloned()
        .expect("object")
}

// ---------------------------------------------------------------------------
// 1. Registry contents
// ---------------------------------------------------------------------------

#[test]
fn builtin_registry_has_every_builtin() {
    let registry = builtin_registry().expect("builtin registry");
    assert!(registry.contains(PluginKind::Processor, "none"));
    assert!(registry.contains(PluginKind::Formatter, "compact"));
    assert!(registry.contains(PluginKind::Formatter, "none"));

    let compact = registry
        .descriptor(PluginKind::Formatter, "compact")
        .expect("compact descriptor");
    assert_eq!(compact.default_options, CompactOptions::defaults());
}

// ---------------------------------------------------------------------------
// 2. User overrides
// ---------------------------------------------------------------------------

#[test]
fn user_template_overrides_embedded_one() {
    let dir = TempDir::new().expect("tempdir");
    write_template(&dir, "rst/code_block.rst.tera", "[{{ lang }}]\n{{ code }}\n");

    let registry = builtin_registry().expect("builtin registry");
    let mut formatter = registry
        .instantiate_formatter("compact", &session_with_templates(&dir))
        .expect("formatter");
    let chunk = Chunk::code(0, 1, Options::new(), "x = 1\n");
    let options = CompactOptions::defaults();
    let out = formatter
        .format(&chunk, &options, &[Hunk::source("x = 1\n")])
        .expect("format");
    assert_eq!(out.len(), 1);
    assert!(out[0].starts_with("[python]\n    x = 1"), "got: {:?}", out[0]);
}

#[test]
fn override_names_are_case_insensitive() {
    let dir = TempDir::new().expect("tempdir");
    write_template(&dir, "RST/Figure.rst.tera", "FIG {{ path }}");
    let engine = TemplateEngine::new(Some(dir.path())).expect("engine");
    assert!(engine.template_names().contains(&Template::Figure.name()));

    let ctx = litweave_renderer::FigureContext::from_figure(0, &Figure::new("a.png"));
    assert_eq!(engine.render_figure(&ctx).expect("render"), "FIG a.png");
}

#[test]
fn non_tera_files_are_ignored() {
    let dir = TempDir::new().expect("tempdir");
    write_template(&dir, "rst/notes.txt", "{{ broken");
    let engine = TemplateEngine::new(Some(dir.path())).expect("engine");
    assert_eq!(engine.template_names().len(), Template::all().len());
}

#[test]
fn broken_override_fails_instantiation() {
    let dir = TempDir::new().expect("tempdir");
    write_template(&dir, "rst/indented.rst.tera", "{% if %}");

    let registry = builtin_registry().expect("builtin registry");
    let err = match registry.instantiate_formatter("none", &session_with_templates(&dir)) {
        Ok(_) => panic!("a template that does not parse must fail"),
        Err(err) => err,
    };
    assert_eq!(err.plugin, "none");
}

#[test]
fn missing_template_dir_falls_back_to_embedded() {
    let engine = TemplateEngine::new(Some(std::path::Path::new("/nonexistent/litweave-tpl")))
        .expect("engine");
    assert_eq!(engine.template_names().len(), Template::all().len());
}
