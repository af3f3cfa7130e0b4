//! Process execution for `fail2ban-client`.
//!
//! Every call spawns a fresh child with a discrete argument vector (never a
//! shell string) and is bound to the caller's [`Deadline`]. The child leads
//! its own process group, so when the deadline passes the whole group is
//! terminated and the child reaped before the error is returned. With an
//! elevation wrapper such as `sudo` that covers the client it started too.

use super::{Deadline, Fail2banError};
use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Time between SIGTERM and SIGKILL for a call that outlived its deadline.
/// `sudo` relays SIGTERM to the client but cannot relay SIGKILL.
const TERM_GRACE: Duration = Duration::from_millis(100);

/// Output phrases that mean the tool needs elevated privileges
const PERMISSION_MARKERS: &[&str] = &["Permission denied", "you must be root"];

/// Output phrases fail2ban uses for an unknown jail
const NOT_FOUND_MARKERS: &[&str] = &["does not exist"];

/// Runs one tool invocation and returns its combined, trimmed output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, args: &[&str], deadline: Deadline) -> Result<String, Fail2banError>;
}

/// Spawns the real `fail2ban-client` binary
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    client_path: PathBuf,
    /// Privilege-elevation wrapper (e.g. `sudo`) placed before the client path
    elevation: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new(client_path: impl Into<PathBuf>) -> Self {
        Self {
            client_path: client_path.into(),
            elevation: None,
        }
    }

    /// Run the client through a wrapper such as `sudo`
    pub fn with_elevation(mut self, wrapper: impl Into<PathBuf>) -> Self {
        self.elevation = Some(wrapper.into());
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = match &self.elevation {
            Some(wrapper) => {
                let mut cmd = Command::new(wrapper);
                // sudo must not prompt; a hung password prompt would only end at the deadline
                cmd.arg("-n").arg(&self.client_path);
                cmd
            }
            None => Command::new(&self.client_path),
        };

        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        cmd
    }

    fn program(&self) -> String {
        self.elevation
            .as_ref()
            .unwrap_or(&self.client_path)
            .display()
            .to_string()
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, args: &[&str], deadline: Deadline) -> Result<String, Fail2banError> {
        if deadline.is_expired() {
            return Err(Fail2banError::TimedOut);
        }

        debug!(args = ?args, "Running fail2ban-client");

        let mut child = self
            .command(args)
            .spawn()
            .map_err(|source| Fail2banError::Spawn {
                program: self.program(),
                source,
            })?;

        let mut group = ProcessGroup::of(&child);
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let result = tokio::time::timeout_at(deadline.instant(), async {
            let (out, err) = tokio::try_join!(read_stream(stdout), read_stream(stderr))?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out, err))
        })
        .await;

        let (status, out, err) = match result {
            Ok(Ok(collected)) => {
                // leader reaped; its pid may be reused from here on
                group.disarm();
                collected
            }
            Ok(Err(e)) => {
                group.kill();
                reap(&mut child).await;
                return Err(Fail2banError::Io(e));
            }
            Err(_) => {
                group.signal(Signal::SIGTERM);
                tokio::time::sleep(TERM_GRACE).await;
                group.kill();
                reap(&mut child).await;
                warn!(args = ?args, "fail2ban-client killed at request deadline");
                return Err(Fail2banError::TimedOut);
            }
        };

        let output = combine_output(&out, &err);

        if status.success() {
            Ok(output)
        } else {
            Err(classify_failure(status.code(), output))
        }
    }
}

/// Process group led by a spawned child.
///
/// Until disarmed, dropping the guard sends SIGKILL to the group, which covers
/// a request task aborted while the call is still running.
struct ProcessGroup {
    pgid: Option<Pid>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self {
            pgid: child.id().map(|pid| Pid::from_raw(pid as i32)),
        }
    }

    fn signal(&self, signal: Signal) {
        let Some(pgid) = self.pgid else {
            return;
        };
        match killpg(pgid, signal) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!(pgid = %pgid, ?signal, error = %e, "Failed to signal fail2ban-client group"),
        }
    }

    /// SIGKILL the group, then disarm before the leader is reaped
    fn kill(&mut self) {
        self.signal(Signal::SIGKILL);
        self.disarm();
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.signal(Signal::SIGKILL);
    }
}

/// Kill (if still needed) and wait for the group leader
async fn reap(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to reap fail2ban-client");
    }
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// stdout followed by stderr, lossily decoded and trimmed
fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    let stderr = String::from_utf8_lossy(stderr);
    if !stderr.trim().is_empty() {
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&stderr);
    }
    combined.trim().to_string()
}

/// Map a non-zero exit to the most specific error the output supports
pub fn classify_failure(code: Option<i32>, output: String) -> Fail2banError {
    if PERMISSION_MARKERS.iter().any(|m| output.contains(m)) {
        return Fail2banError::PermissionDenied { output };
    }
    if NOT_FOUND_MARKERS.iter().any(|m| output.contains(m)) {
        return Fail2banError::JailNotFound { output };
    }
    Fail2banError::CommandFailed { code, output }
}
