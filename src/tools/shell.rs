use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Tool, ToolContext, ToolResult, str_arg, u64_arg};

/// Run a shell command in the workspace through the safety layer.
pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "execute_shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command (sh -c) in the workspace directory. Dangerous commands are \
         blocked. Returns stdout; stderr is appended when the command fails."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "The shell command to execute"},
                "timeout": {"type": "integer", "description": "Timeout in seconds (default from config)"}
            },
            "required": ["command"]
        })
    }

    fn requires_approval(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(command) = str_arg(&args, "command") else {
            return ToolResult::missing("command");
        };
        let timeout = u64_arg(&args, "timeout")
            .filter(|t| *t > 0)
            .unwrap_or_else(|| ctx.safety.timeout_secs());

        tracing::info!(command, timeout, "Executing shell command");

        if let Err(e) = ctx.safety.screen(command) {
            return ToolResult::err(e.to_string()).with_meta("command", command);
        }

        let result = match ctx.safety.execute_with_timeout(command, timeout).await {
            Ok(r) => r,
            Err(e) => return ToolResult::err(e.to_string()).with_meta("command", command),
        };

        if result.timed_out {
            return ToolResult::err(format!("Command timed out after {timeout} seconds"))
                .with_meta("command", command)
                .with_meta("partial_stdout", result.stdout);
        }

        let success = result.success();
        let mut output = result.stdout.clone();
        if !success && !result.stderr.is_empty() {
            output.push_str(&format!("\n\nSTDERR:\n{}", result.stderr));
        }

        tracing::debug!(exit_code = ?result.exit_code, "Command completed");

        let tool_result = ToolResult {
            success,
            output,
            error: (!success).then(|| {
                format!(
                    "Command exited with code {}",
                    result
                        .exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "unknown".into())
                )
            }),
            metadata: Default::default(),
        };

        tool_result
            .with_meta("command", command)
            .with_meta("exit_code", result.exit_code)
            .with_meta("stdout_length", result.stdout.len())
            .with_meta("stderr_length", result.stderr.len())
    }
}
