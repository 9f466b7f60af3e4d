use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const DOC: &str = "intro\n%< {}\nx = 1\n%>\noutro\n";

fn litweave_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("litweave"));
    cmd.env("HOME", home).env("USERPROFILE", home);
    cmd
}

fn write_doc(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).expect("write document");
    path
}

#[test]
fn weave_guesses_rst_output_beside_input() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let input = write_doc(&work, "doc.lit", DOC);

    litweave_cmd(home.path())
        .arg("weave")
        .arg(&input)
        .assert()
        .success()
        .stdout(contains("3 chunks"));

    let woven = fs::read_to_string(work.path().join("doc.rst")).expect("read weave");
    assert!(woven.starts_with("intro\n"));
    assert!(woven.contains(".. code-block:: python"));
    assert!(woven.contains("    x = 1"));
    assert!(woven.ends_with("outro\n"));
}

#[test]
fn existing_guessed_output_needs_force() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let input = write_doc(&work, "doc.lit", DOC);
    fs::write(work.path().join("doc.rst"), "precious").expect("write existing");

    litweave_cmd(home.path())
        .arg("weave")
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("--force"));
    assert_eq!(
        fs::read_to_string(work.path().join("doc.rst")).expect("read"),
        "precious"
    );

    litweave_cmd(home.path())
        .args(["weave", "--force"])
        .arg(&input)
        .assert()
        .success();
    assert!(fs::read_to_string(work.path().join("doc.rst"))
        .expect("read")
        .contains("code-block"));
}

#[test]
fn explicit_output_is_always_written() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let input = write_doc(&work, "doc.lit", DOC);
    let out = work.path().join("out.txt");
    fs::write(&out, "old").expect("write existing");

    litweave_cmd(home.path())
        .arg("weave")
        .arg(&input)
        .arg("-o")
        .arg(&out)
        .args(["--formatter", "none"])
        .assert()
        .success();
    let woven = fs::read_to_string(&out).expect("read");
    assert!(woven.starts_with("intro\n"));
    assert!(woven.contains("    x = 1"));
    assert!(!woven.contains("code-block"));
}

#[test]
fn tangle_writes_only_code() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let input = write_doc(&work, "doc.lit", "a\n%<\nx = 1\n%>\nb\n%<\ny = 2\n%>\n");

    litweave_cmd(home.path())
        .arg("tangle")
        .arg(&input)
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(work.path().join("doc.py")).expect("read tangle"),
        "x = 1\ny = 2\n"
    );
}

#[test]
fn stdout_prints_without_writing() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let input = write_doc(&work, "doc.lit", DOC);

    let quiet_doc = write_doc(&work, "quiet.lit", "intro\n%< {\"e\": false}\nx = 1\n%>\noutro\n");

    litweave_cmd(home.path())
        .args(["weave", "--stdout"])
        .arg(&input)
        .assert()
        .success()
        .stdout(contains("intro\n").and(contains(".. code-block:: python")));
    litweave_cmd(home.path())
        .args(["weave", "--stdout"])
        .arg(&quiet_doc)
        .assert()
        .success()
        .stdout(predicate::eq("intro\noutro\n"));
    assert!(!work.path().join("doc.rst").exists());
    assert!(!work.path().join("quiet.rst").exists());
}

#[test]
fn unknown_processor_is_a_warning_not_a_failure() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let input = write_doc(&work, "doc.lit", "a\n%< {\"proc\": \"fortran\"}\nx\n%>\n");

    litweave_cmd(home.path())
        .arg("weave")
        .arg(&input)
        .assert()
        .success()
        .stderr(contains("unknown processor").and(contains("chunk #1")));

    litweave_cmd(home.path())
        .args(["weave", "--force", "--quiet"])
        .arg(&input)
        .assert()
        .success()
        .stderr(contains("unknown processor").not());
}

#[test]
fn unterminated_chunk_fails_with_its_line() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let input = write_doc(&work, "doc.lit", "a\nb\n%< {}\nx = 1\n");

    litweave_cmd(home.path())
        .arg("weave")
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("line 3"));
}

#[test]
fn config_file_sets_tokens() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    fs::create_dir_all(home.path().join(".litweave")).expect("config dir");
    fs::write(
        home.path().join(".litweave/config.yaml"),
        "start_token: \"%<<\"\nend_token: \"%>>\"\ncomment_token: \"%%%\"\nformatter: none\n",
    )
    .expect("write config");
    let input = write_doc(&work, "doc.lit", "%<<\nx = 1\n%>>\n");

    litweave_cmd(home.path())
        .args(["weave", "--stdout"])
        .arg(&input)
        .assert()
        .success()
        .stdout(contains("    x = 1").and(contains("code-block").not()));
}

#[test]
fn rebuild_requires_daemon() {
    let home = TempDir::new().expect("home");
    litweave_cmd(home.path())
        .args(["weave", "doc.lit", "--rebuild"])
        .assert()
        .failure();
}
