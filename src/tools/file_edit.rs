use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};
use similar::TextDiff;

use super::{Tool, ToolContext, ToolResult, str_arg, u64_arg};

/// Search-and-replace edit of the first exact match, optionally limited to a
/// line range. Returns a unified diff of the change.
pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a file inside the workspace by replacing the first exact occurrence of search_text \
         with replace_text. Optionally restrict the search to a line range (1-indexed, inclusive). \
         Returns a unified diff of the change."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "description": "Path to the file to edit"},
                "search_text": {"type": "string", "description": "Exact text to find"},
                "replace_text": {"type": "string", "description": "Replacement text"},
                "start_line": {"type": "integer", "description": "First line of the search range (1-indexed)"},
                "end_line": {"type": "integer", "description": "Last line of the search range (inclusive)"}
            },
            "required": ["file_path", "search_text", "replace_text"]
        })
    }

    fn requires_approval(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(file_path) = str_arg(&args, "file_path") else {
            return ToolResult::missing("file_path");
        };
        let Some(search_text) = str_arg(&args, "search_text") else {
            return ToolResult::missing("search_text");
        };
        let Some(replace_text) = str_arg(&args, "replace_text") else {
            return ToolResult::missing("replace_text");
        };
        if search_text.is_empty() {
            return ToolResult::err("search_text must not be empty");
        }
        let start_line = u64_arg(&args, "start_line").map(|n| n as usize);
        let end_line = u64_arg(&args, "end_line").map(|n| n as usize);

        let path = match ctx.safety.resolve_write(Path::new(file_path)) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e.to_string()),
        };
        if !path.is_file() {
            return ToolResult::err(format!("File not found: {file_path}"));
        }

        let original = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) => return ToolResult::err(format!("Failed to read {file_path}: {e}")),
        };

        let edited = match replace_first(&original, search_text, replace_text, start_line, end_line) {
            Ok(edited) => edited,
            Err(message) => return ToolResult::err(message),
        };

        let diff = unified_diff(file_path, &original, &edited);

        if let Err(e) = tokio::fs::write(&path, &edited).await {
            return ToolResult::err(format!("Failed to write {file_path}: {e}"));
        }
        tracing::info!("Edited {}", path.display());

        let lines_changed = diff
            .lines()
            .filter(|l| {
                (l.starts_with('+') || l.starts_with('-'))
                    && !l.starts_with("+++")
                    && !l.starts_with("---")
            })
            .count();

        ToolResult::ok(diff)
            .with_meta("file_path", path.display().to_string())
            .with_meta("lines_changed", lines_changed)
            .with_meta("search_text_length", search_text.len())
            .with_meta("replace_text_length", replace_text.len())
    }
}

/// Replace the first occurrence of `search` in `content`, or within the
/// `start..=end` line window when a range is given.
pub(crate) fn replace_first(
    content: &str,
    search: &str,
    replace: &str,
    start_line: Option<usize>,
    end_line: Option<usize>,
) -> Result<String, String> {
    if start_line.is_none() && end_line.is_none() {
        if !content.contains(search) {
            return Err("Search text not found in file".to_string());
        }
        return Ok(content.replacen(search, replace, 1));
    }

    let mut lines: Vec<&str> = content.split('\n').collect();
    let start_idx = start_line.map(|s| s.saturating_sub(1)).unwrap_or(0);
    let end_idx = end_line.unwrap_or(lines.len()).min(lines.len());
    let not_found = || {
        format!(
            "Search text not found in lines {}-{}",
            start_line.unwrap_or(1),
            end_line.unwrap_or(lines.len())
        )
    };

    if start_idx >= end_idx {
        return Err(not_found());
    }

    let window = lines[start_idx..end_idx].join("\n");
    if !window.contains(search) {
        return Err(not_found());
    }

    let edited_window = window.replacen(search, replace, 1);
    lines.splice(start_idx..end_idx, edited_window.split('\n'));
    Ok(lines.join("\n"))
}

pub(crate) fn unified_diff(file_path: &str, original: &str, edited: &str) -> String {
    TextDiff::from_lines(original, edited)
        .unified_diff()
        .context_radius(3)
        .header(
            &format!("{file_path} (original)"),
            &format!("{file_path} (modified)"),
        )
        .to_string()
}
