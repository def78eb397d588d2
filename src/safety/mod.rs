pub mod command_filter;
pub mod defaults;
pub mod workspace;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use command_filter::{BlockedCommand, CommandFilter};
use workspace::WorkspaceGuard;

use crate::config::AppConfig;
use crate::error::{ExecError, GuardrailError};
use crate::exec::{ExecResult, execute_shell};

/// Combined safety layer: checks commands against the blocklist, enforces
/// workspace boundaries, and delegates allowed commands to the shell executor
/// with timeout enforcement.
///
/// This is the single entry point for all command execution. No code should
/// call [`execute_shell`] directly -- always go through `SafetyLayer::execute`.
pub struct SafetyLayer {
    command_filter: CommandFilter,
    workspace_guard: WorkspaceGuard,
    timeout_secs: u64,
    security_log_path: PathBuf,
}

impl SafetyLayer {
    /// Build a SafetyLayer from the resolved application configuration.
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let command_filter = CommandFilter::new(&config.blocked_patterns)
            .map_err(|e| anyhow::anyhow!("Failed to compile command filter patterns: {}", e))?;

        let workspace_guard = WorkspaceGuard::new(&config.workspace)
            .map_err(|e| anyhow::anyhow!("Failed to initialize workspace guard: {}", e))?;

        Ok(Self {
            command_filter,
            workspace_guard,
            timeout_secs: config.shell_timeout_secs,
            security_log_path: config.security_log_path.clone(),
        })
    }

    /// Execute a shell command through the safety pipeline using the
    /// configured timeout.
    pub async fn execute(&self, command: &str) -> Result<ExecResult, ExecError> {
        self.execute_with_timeout(command, self.timeout_secs).await
    }

    /// Execute a shell command through the safety pipeline.
    ///
    /// Blocked commands are logged to the security file and come back as an
    /// [`ExecResult`] with the blocked JSON in `stderr` and `exit_code` 126
    /// ("cannot execute"). Allowed commands run in the workspace root.
    pub async fn execute_with_timeout(
        &self,
        command: &str,
        timeout_secs: u64,
    ) -> Result<ExecResult, ExecError> {
        if let Some(blocked) = self.command_filter.check(command) {
            tracing::warn!(command, reason = %blocked.reason, "Blocked shell command");
            self.log_blocked_command(&blocked);

            return Ok(ExecResult {
                stdout: String::new(),
                stderr: blocked.to_json(),
                exit_code: Some(126),
                timed_out: false,
            });
        }

        execute_shell(command, self.workspace_guard.canonical_root(), timeout_secs).await
    }

    /// Check a command against the blocklist without executing it. Blocked
    /// commands are written to the security log.
    pub fn screen(&self, command: &str) -> Result<(), GuardrailError> {
        match self.command_filter.check(command) {
            Some(blocked) => {
                tracing::warn!(command, reason = %blocked.reason, "Blocked shell command");
                self.log_blocked_command(&blocked);
                Err(GuardrailError::CommandBlocked {
                    command: blocked.command,
                    reason: blocked.reason,
                })
            }
            None => Ok(()),
        }
    }

    /// Resolve a path for writing, rejecting anything outside the workspace.
    pub fn resolve_write(&self, path: &Path) -> Result<PathBuf, GuardrailError> {
        self.workspace_guard.resolve_write_target(path)
    }

    /// Resolve a path for reading: relative paths are taken from the workspace
    /// root, absolute paths are used as-is.
    pub fn resolve_read(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_guard.canonical_root().join(path)
        }
    }

    /// Get the canonical workspace root path.
    pub fn workspace_root(&self) -> &Path {
        self.workspace_guard.canonical_root()
    }

    /// Default shell timeout in seconds.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Append a JSON line to the security log for a blocked command.
    ///
    /// If the log file cannot be written, a warning is logged via tracing but
    /// the command check is not affected.
    fn log_blocked_command(&self, blocked: &BlockedCommand) {
        let log_entry = serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "blocked": true,
            "reason": blocked.reason,
            "command": blocked.command,
        });

        if let Some(parent) = self.security_log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.security_log_path)
        {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{log_entry}") {
                    tracing::warn!(
                        "Failed to write to security log at {}: {}",
                        self.security_log_path.display(),
                        e
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to open security log at {}: {}",
                    self.security_log_path.display(),
                    e
                );
            }
        }
    }
}
