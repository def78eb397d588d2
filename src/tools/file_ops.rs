use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Tool, ToolContext, ToolResult, bool_arg, str_arg, u64_arg};

/// Read a file, optionally a 1-indexed inclusive line range. Reads are not
/// restricted to the workspace.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Paths are relative to the workspace root or absolute. \
         Optionally read only a line range (1-indexed, inclusive)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "description": "Path to the file"},
                "start_line": {"type": "integer", "description": "First line to read (1-indexed)"},
                "end_line": {"type": "integer", "description": "Last line to read (inclusive)"}
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(file_path) = str_arg(&args, "file_path") else {
            return ToolResult::missing("file_path");
        };
        let start_line = u64_arg(&args, "start_line").map(|n| n as usize);
        let end_line = u64_arg(&args, "end_line").map(|n| n as usize);

        let path = ctx.safety.resolve_read(Path::new(file_path));
        if !path.exists() {
            return ToolResult::err(format!("File not found: {file_path}"));
        }
        if !path.is_file() {
            return ToolResult::err(format!("Not a file: {file_path}"));
        }

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) => return ToolResult::err(format!("Failed to read {file_path}: {e}")),
        };

        let content = if start_line.is_none() && end_line.is_none() {
            text
        } else {
            slice_lines(&text, start_line, end_line)
        };

        tracing::debug!("Read {} characters from {}", content.len(), path.display());

        ToolResult::ok(content.clone())
            .with_meta("file_path", path.display().to_string())
            .with_meta("size", content.len())
            .with_meta("start_line", start_line)
            .with_meta("end_line", end_line)
    }
}

/// Lines `start..=end` (1-indexed), keeping line terminators.
pub(crate) fn slice_lines(text: &str, start: Option<usize>, end: Option<usize>) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let start_idx = start.map(|s| s.saturating_sub(1)).unwrap_or(0);
    let end_idx = end.unwrap_or(lines.len()).min(lines.len());
    if start_idx >= end_idx {
        return String::new();
    }
    lines[start_idx..end_idx].concat()
}

/// Write a file inside the workspace.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file inside the workspace, replacing it if it exists. \
         Parent directories are created unless create_dirs is false. \
         Writes outside the workspace are rejected."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "description": "Path relative to the workspace root"},
                "content": {"type": "string", "description": "Content to write"},
                "create_dirs": {"type": "boolean", "description": "Create missing parent directories (default true)"}
            },
            "required": ["file_path", "content"]
        })
    }

    fn requires_approval(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(file_path) = str_arg(&args, "file_path") else {
            return ToolResult::missing("file_path");
        };
        let Some(content) = str_arg(&args, "content") else {
            return ToolResult::missing("content");
        };
        let create_dirs = bool_arg(&args, "create_dirs").unwrap_or(true);

        let target = match ctx.safety.resolve_write(Path::new(file_path)) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e.to_string()),
        };

        if let Some(parent) = target.parent() {
            if create_dirs {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return ToolResult::err(format!("Failed to create directories: {e}"));
                }
            } else if !parent.exists() {
                return ToolResult::err(format!(
                    "Parent directory does not exist: {}",
                    parent.display()
                ));
            }
        }

        if let Err(e) = tokio::fs::write(&target, content).await {
            return ToolResult::err(format!("Failed to write {file_path}: {e}"));
        }

        let chars = content.chars().count();
        tracing::info!("Wrote {} characters to {}", chars, target.display());

        ToolResult::ok(format!("Successfully wrote {chars} characters"))
            .with_meta("file_path", target.display().to_string())
            .with_meta("size", content.len())
    }
}
