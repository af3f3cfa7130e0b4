//! Deadline cleanup when `fail2ban-client` runs behind an elevation wrapper.
//!
//! The fake wrapper starts the client as its own child (no `exec`), the way
//! `sudo` does, so killing only the direct child would leave the client
//! running.

use fail2rest::fail2ban::{CommandRunner, ProcessRunner};
use fail2rest::{Deadline, Fail2banError};
use once_cell::sync::Lazy;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const FAKE_SUDO: &str = r#"#!/bin/sh
[ "$1" = "-n" ] && shift
"$@"
status=$?
exit $status
"#;

const FAKE_CLIENT: &str = r#"#!/bin/sh
echo $$ > "__DIR__/$2.pid"
exec sleep 30
"#;

static FIXTURE: Lazy<Fixture> = Lazy::new(Fixture::create);

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn create() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let client = FAKE_CLIENT.replace("__DIR__", &dir.path().display().to_string());
        write_script(&dir.path().join("sudo"), FAKE_SUDO);
        write_script(&dir.path().join("fail2ban-client"), &client);
        Self { dir }
    }

    fn runner(&self) -> ProcessRunner {
        ProcessRunner::new(self.dir.path().join("fail2ban-client"))
            .with_elevation(self.dir.path().join("sudo"))
    }

    fn pid_file(&self, tag: &str) -> PathBuf {
        self.dir.path().join(format!("{}.pid", tag))
    }
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Running and not a zombie
fn running(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rfind(')')
            .and_then(|i| stat[i + 1..].trim_start().chars().next())
            .map(|state| state != 'Z')
            .unwrap_or(false),
        Err(_) => false,
    }
}

async fn client_pid(tag: &str) -> u32 {
    for _ in 0..40 {
        if let Ok(text) = std::fs::read_to_string(FIXTURE.pid_file(tag)) {
            if let Ok(pid) = text.trim().parse() {
                return pid;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("fake client never wrote {}.pid", tag);
}

async fn stopped_within(pid: u32, limit: Duration) -> bool {
    let started = Instant::now();
    while started.elapsed() < limit {
        if !running(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn deadline_stops_client_started_by_wrapper() {
    let runner = FIXTURE.runner();
    let started = Instant::now();

    let err = runner
        .run(&["status", "deadline"], Deadline::after(Duration::from_millis(500)))
        .await
        .unwrap_err();
    assert!(matches!(err, Fail2banError::TimedOut), "unexpected error: {:?}", err);
    assert!(started.elapsed() < Duration::from_secs(3));

    let pid = client_pid("deadline").await;
    assert!(
        stopped_within(pid, Duration::from_secs(2)).await,
        "fail2ban-client {} still running after the deadline",
        pid
    );
}

#[tokio::test]
async fn aborted_call_stops_client_started_by_wrapper() {
    let runner = FIXTURE.runner();
    let call = tokio::spawn(async move {
        runner
            .run(&["status", "aborted"], Deadline::after(Duration::from_secs(30)))
            .await
    });

    let pid = client_pid("aborted").await;
    assert!(running(pid));

    call.abort();
    let _ = call.await;

    assert!(
        stopped_within(pid, Duration::from_secs(2)).await,
        "fail2ban-client {} still running after the call was dropped",
        pid
    );
}
