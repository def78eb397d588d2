use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::error::ExecError;

/// Result of a shell command execution.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

/// Run `sh -c <command>` in `cwd`, killing the whole process group once
/// `timeout_secs` elapses. Output captured before the timeout is returned.
pub async fn execute_shell(
    command: &str,
    cwd: &Path,
    timeout_secs: u64,
) -> Result<ExecResult, ExecError> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ExecError::SpawnFailed(e.to_string()))?;

    let pid = child.id();
    // Dropping this future (agent timeout, Ctrl+C) must not orphan background jobs.
    let mut group = GroupKill(pid.map(|p| p as i32));

    let stdout_buf = Arc::new(Mutex::new(Vec::new()));
    let stderr_buf = Arc::new(Mutex::new(Vec::new()));

    let stdout_task = child
        .stdout
        .take()
        .map(|pipe| tokio::spawn(drain(pipe, stdout_buf.clone())));
    let stderr_task = child
        .stderr
        .take()
        .map(|pipe| tokio::spawn(drain(pipe, stderr_buf.clone())));

    let waited = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait()).await;

    let (exit_code, timed_out) = match waited {
        Ok(Ok(status)) => {
            group.disarm();
            (status.code(), false)
        }
        Ok(Err(e)) => return Err(ExecError::ProcessFailed(e.to_string())),
        Err(_) => {
            group.kill();
            let _ = child.kill().await;
            let _ = child.wait().await;
            (None, true)
        }
    };

    // Grandchildren may still hold the pipes open after a timeout; don't wait on them forever.
    for task in [stdout_task, stderr_task].into_iter().flatten() {
        let _ = tokio::time::timeout(Duration::from_millis(500), task).await;
    }

    let stdout = String::from_utf8_lossy(&stdout_buf.lock().await).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_buf.lock().await).into_owned();

    Ok(ExecResult {
        stdout,
        stderr,
        exit_code,
        timed_out,
    })
}

/// Kills a process group on drop unless disarmed.
struct GroupKill(Option<i32>);

impl GroupKill {
    fn kill(&mut self) {
        if let Some(pgid) = self.0.take() {
            // Negative-pid semantics: signal every process in the group.
            if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                tracing::debug!("killpg({pgid}) failed: {e}");
            }
        }
    }

    /// The shell exited normally; leave its group alone.
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for GroupKill {
    fn drop(&mut self) {
        self.kill();
    }
}

async fn drain<R: AsyncRead + Unpin>(mut pipe: R, buf: Arc<Mutex<Vec<u8>>>) {
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.lock().await.extend_from_slice(&chunk[..n]),
        }
    }
}
