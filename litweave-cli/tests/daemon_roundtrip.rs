use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn litweave_bin() -> PathBuf {
    PathBuf::from(assert_cmd::cargo::cargo_bin!("litweave"))
}

fn litweave_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(litweave_bin());
    cmd.env("HOME", home).env("USERPROFILE", home);
    cmd
}

struct DaemonProcess {
    child: Child,
    home: PathBuf,
}

impl DaemonProcess {
    fn start(home: &Path) -> Self {
        let child = litweave_cmd(home)
            .args(["daemon", "start"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");
        Self {
            child,
            home: home.to_path_buf(),
        }
    }

    fn stop(&mut self) {
        let _ = litweave_cmd(&self.home).args(["daemon", "stop"]).status();

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            sleep(Duration::from_millis(50));
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

fn daemon_running(home: &Path) -> bool {
    let Ok(output) = litweave_cmd(home).args(["daemon", "status", "--json"]).output() else {
        return false;
    };
    if !output.status.success() {
        return false;
    }
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(&output.stdout) else {
        return false;
    };
    value
        .get("running")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(100));
    }
    false
}

#[test]
fn status_without_daemon_reports_not_running() {
    let home = TempDir::new().expect("home");
    litweave_cmd(home.path())
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(contains("not running"));
    assert!(!daemon_running(home.path()));
}

#[test]
fn weave_through_daemon_without_daemon_fails_cleanly() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let input = work.path().join("doc.lit");
    fs::write(&input, "a\n").expect("write doc");

    litweave_cmd(home.path())
        .args(["weave", "--daemon"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("daemon start"));
}

#[test]
fn daemon_keeps_the_session_between_weaves() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let input = work.path().join("doc.lit");
    let output = work.path().join("doc.rst");
    fs::write(&input, "intro\n%<\nx = 1\n%>\noutro\n").expect("write doc");

    let mut daemon = DaemonProcess::start(home.path());
    assert!(
        wait_until(Duration::from_secs(5), || daemon_running(home.path())),
        "daemon did not report running state in time",
    );

    let weave = |extra: &[&str]| {
        let mut cmd = litweave_cmd(home.path());
        cmd.args(["weave", "--daemon", "-o"]).arg(&output).args(extra).arg(&input);
        cmd
    };

    weave(&[]).assert().success().stdout(contains("new session"));
    assert!(fs::read_to_string(&output)
        .expect("read weave")
        .contains("x = 1"));

    weave(&[])
        .assert()
        .success()
        .stdout(contains("reused session").and(contains("0 processed")));

    fs::write(&input, "intro\n%<\nx = 2\n%>\noutro\n").expect("edit doc");
    weave(&[]).assert().success().stdout(contains("2 processed"));
    assert!(fs::read_to_string(&output)
        .expect("read weave")
        .contains("x = 2"));

    weave(&["--rebuild"])
        .assert()
        .success()
        .stdout(contains("rebuilt session"));

    litweave_cmd(home.path())
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(contains("1 session").and(contains("doc.lit")));

    daemon.stop();
    assert!(!daemon_running(home.path()));
}
