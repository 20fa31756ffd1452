//! # One bounded subprocess run.
//!
//! [`run_with_deadline`] is the single spawn path for both probe and request
//! invocations: launch the script with one argument, optionally feed stdin,
//! capture both output streams, and wait no longer than the deadline.
//!
//! ## Rules
//! - stdin is written from a detached task and closed; a script that never
//!   reads it cannot deadlock the daemon.
//! - Output streams are drained concurrently with the wait, so a chatty
//!   script cannot fill a pipe and stall.
//! - On deadline expiry the process receives SIGTERM, then SIGKILL after a
//!   short grace.
//! - `kill_on_drop` backs all of this: a future dropped mid-flight still
//!   reaps its subprocess.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time;
use tracing::debug;

/// How long a process gets between SIGTERM and SIGKILL.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Raw outcome of one bounded run.
pub(crate) enum RawExec {
    /// The process exited on its own within the deadline.
    Completed {
        status: ExitStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    /// The deadline elapsed; the process has been terminated.
    TimedOut,
    /// The process could not be spawned or waited on.
    SpawnError(std::io::Error),
}

/// Runs `path` with a single argument under a deadline.
///
/// `stdin_payload` of `None` attaches a closed stdin; `Some` pipes the bytes
/// in and closes the stream afterwards.
pub(crate) async fn run_with_deadline(
    path: &Path,
    arg: &str,
    stdin_payload: Option<Vec<u8>>,
    deadline: Duration,
) -> RawExec {
    let mut cmd = Command::new(path);
    cmd.arg(arg)
        .stdin(if stdin_payload.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return RawExec::SpawnError(e),
    };

    if let Some(payload) = stdin_payload {
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                // EPIPE here just means the script never read its input.
                let _ = stdin.write_all(&payload).await;
                let _ = stdin.shutdown().await;
            });
        }
    }

    let stdout_task = drain(child.stdout.take());
    let stderr_task = drain(child.stderr.take());

    match time::timeout(deadline, child.wait()).await {
        Ok(Ok(status)) => {
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            RawExec::Completed {
                status,
                stdout,
                stderr,
            }
        }
        Ok(Err(e)) => RawExec::SpawnError(e),
        Err(_elapsed) => {
            terminate(&mut child).await;
            RawExec::TimedOut
        }
    }
}

/// SIGTERM, short grace, then SIGKILL.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        debug!(pid, "sending SIGTERM to timed-out script");
        // ESRCH means the process already exited between wait and here.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        if time::timeout(KILL_GRACE, child.wait()).await.is_ok() {
            return;
        }
    }
    let _ = child.start_kill();
    let _ = child.wait().await;
}

/// Reads a child stream to the end in a detached task.
fn drain<R>(stream: Option<R>) -> tokio::task::JoinHandle<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut buf).await;
        }
        buf
    })
}
