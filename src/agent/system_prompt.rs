//! Harness context wrapping for agent system prompts.

use std::path::Path;

/// Wrap an agent's own prompt with harness context.
///
/// Layout: role preamble, environment, available tools, constraints, then
/// the agent prompt after a separator. Agents without tools get a note that
/// they must answer in plain text.
pub fn build_system_prompt(
    agent_prompt: &str,
    workspace: &Path,
    model: &str,
    tool_descriptions: &str,
) -> String {
    let workspace_display = workspace.display();
    let tools = if tool_descriptions.trim().is_empty() {
        "No tools are available. Answer with text only.".to_string()
    } else {
        tool_descriptions.trim_end().to_string()
    };

    format!(
        "\
You are an AI agent running inside the omni command-line harness.

## Environment
- Model: {model}
- Workspace: {workspace_display}
- Relative paths resolve against the workspace

## Available Tools
{tools}

## Constraints
- File writes are restricted to the workspace directory
- Shell commands are filtered against a security blocklist and time out
- Some tools ask the user for approval and may be rejected
- Read access is unrestricted

---

{agent_prompt}"
    )
}
