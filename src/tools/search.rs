use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::RegexBuilder;
use serde_json::{Value, json};
use walkdir::WalkDir;

use super::{Tool, ToolContext, ToolResult, bool_arg, str_arg, u64_arg};

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Resolve `directory` against the workspace and check it is a directory.
fn resolve_dir(ctx: &ToolContext, directory: &str) -> Result<PathBuf, ToolResult> {
    let path = match directory.trim() {
        "" | "." | "./" => ctx.workspace().to_path_buf(),
        other => ctx.safety.resolve_read(Path::new(other)),
    };
    if !path.exists() {
        return Err(ToolResult::err(format!("Directory not found: {directory}")));
    }
    if !path.is_dir() {
        return Err(ToolResult::err(format!("Not a directory: {directory}")));
    }
    Ok(path)
}

async fn blocking<F>(f: F) -> ToolResult
where
    F: FnOnce() -> ToolResult + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| ToolResult::err(format!("Search task failed: {e}")))
}

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and directories, sorted by name. Directories end with '/', files show their size in KB."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "directory": {"type": "string", "description": "Directory to list (default: workspace root)"},
                "show_hidden": {"type": "boolean", "description": "Include entries starting with '.' (default false)"},
                "max_depth": {"type": "integer", "description": "How deep to recurse; 1 lists only the directory itself (default 1)"}
            }
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let directory = str_arg(&args, "directory").unwrap_or(".").to_string();
        let show_hidden = bool_arg(&args, "show_hidden").unwrap_or(false);
        let max_depth = u64_arg(&args, "max_depth").unwrap_or(1).max(1) as usize;

        let root = match resolve_dir(ctx, &directory) {
            Ok(p) => p,
            Err(result) => return result,
        };

        blocking(move || list_directory(&root, show_hidden, max_depth)).await
    }
}

fn list_directory(root: &Path, show_hidden: bool, max_depth: usize) -> ToolResult {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || show_hidden || !is_hidden(e.file_name()));

    let mut lines = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if entry.file_type().is_dir() {
            lines.push(format!("📁 {}/", rel.display()));
        } else {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            lines.push(format!("📄 {} ({:.1} KB)", rel.display(), size as f64 / 1024.0));
        }
    }

    tracing::debug!("Listed {} items in {}", lines.len(), root.display());
    let count = lines.len();
    ToolResult::ok(lines.join("\n"))
        .with_meta("directory", root.display().to_string())
        .with_meta("item_count", count)
}

pub struct GlobSearchTool;

#[async_trait]
impl Tool for GlobSearchTool {
    fn name(&self) -> &str {
        "glob_search"
    }

    fn description(&self) -> &str {
        "Find files by glob pattern (e.g. '*.rs', 'src/**/*.py'). Returns paths relative to the searched directory."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Glob pattern"},
                "directory": {"type": "string", "description": "Directory to search (default: workspace root)"},
                "recursive": {"type": "boolean", "description": "Match at any depth (default true)"},
                "max_results": {"type": "integer", "description": "Maximum number of paths (default 100)"}
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(pattern) = str_arg(&args, "pattern").map(str::to_string) else {
            return ToolResult::missing("pattern");
        };
        let directory = str_arg(&args, "directory").unwrap_or(".").to_string();
        let recursive = bool_arg(&args, "recursive").unwrap_or(true);
        let max_results = u64_arg(&args, "max_results").unwrap_or(100) as usize;

        let root = match resolve_dir(ctx, &directory) {
            Ok(p) => p,
            Err(result) => return result,
        };

        blocking(move || glob_search(&root, &pattern, recursive, max_results)).await
    }
}

fn glob_search(root: &Path, pattern: &str, recursive: bool, max_results: usize) -> ToolResult {
    let base = glob::Pattern::escape(&root.to_string_lossy());
    let full = if recursive && !pattern.starts_with("**") {
        format!("{base}/**/{pattern}")
    } else {
        format!("{base}/{pattern}")
    };

    let paths = match glob::glob(&full) {
        Ok(paths) => paths,
        Err(e) => return ToolResult::err(format!("Invalid glob pattern: {e}")),
    };

    let mut matches: Vec<String> = paths
        .filter_map(Result::ok)
        .filter_map(|p| {
            p.strip_prefix(root)
                .ok()
                .map(|rel| rel.display().to_string())
        })
        .filter(|rel| !rel.is_empty())
        .take(max_results)
        .collect();
    matches.sort();

    tracing::debug!("Found {} files matching '{}'", matches.len(), pattern);
    let count = matches.len();
    ToolResult::ok(matches.join("\n"))
        .with_meta("pattern", pattern)
        .with_meta("match_count", count)
}

pub struct GrepSearchTool;

#[async_trait]
impl Tool for GrepSearchTool {
    fn name(&self) -> &str {
        "grep_search"
    }

    fn description(&self) -> &str {
        "Search file contents with a regular expression. Output lines look like 'file:line: text'."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Regular expression"},
                "directory": {"type": "string", "description": "Directory to search (default: workspace root)"},
                "file_pattern": {"type": "string", "description": "Glob for file names to search (default '*')"},
                "case_sensitive": {"type": "boolean", "description": "Case-sensitive match (default true)"},
                "max_results": {"type": "integer", "description": "Maximum number of matching lines (default 50)"}
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(pattern) = str_arg(&args, "pattern").map(str::to_string) else {
            return ToolResult::missing("pattern");
        };
        let directory = str_arg(&args, "directory").unwrap_or(".").to_string();
        let file_pattern = str_arg(&args, "file_pattern").unwrap_or("*").to_string();
        let case_sensitive = bool_arg(&args, "case_sensitive").unwrap_or(true);
        let max_results = u64_arg(&args, "max_results").unwrap_or(50) as usize;

        let root = match resolve_dir(ctx, &directory) {
            Ok(p) => p,
            Err(result) => return result,
        };

        blocking(move || {
            grep_search(&root, &pattern, &file_pattern, case_sensitive, max_results)
        })
        .await
    }
}

fn grep_search(
    root: &Path,
    pattern: &str,
    file_pattern: &str,
    case_sensitive: bool,
    max_results: usize,
) -> ToolResult {
    let regex = match RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
    {
        Ok(r) => r,
        Err(e) => return ToolResult::err(format!("Invalid regex pattern: {e}")),
    };
    let file_glob = match glob::Pattern::new(file_pattern) {
        Ok(p) => p,
        Err(e) => return ToolResult::err(format!("Invalid file pattern: {e}")),
    };
    let match_path = file_pattern.contains('/');

    let mut matches = Vec::new();
    let files = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git")
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file());

    'files: for entry in files {
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let candidate = if match_path {
            file_glob.matches_path(rel)
        } else {
            file_glob.matches(&entry.file_name().to_string_lossy())
        };
        if !candidate {
            continue;
        }

        let Ok(bytes) = std::fs::read(entry.path()) else {
            continue;
        };
        let text = String::from_utf8_lossy(&bytes);

        for (idx, line) in text.lines().enumerate() {
            if regex.is_match(line) {
                matches.push(format!("{}:{}: {}", rel.display(), idx + 1, line.trim_end()));
                if matches.len() >= max_results {
                    break 'files;
                }
            }
        }
    }

    tracing::debug!("Found {} matches for pattern '{}'", matches.len(), pattern);
    let count = matches.len();
    ToolResult::ok(matches.join("\n"))
        .with_meta("pattern", pattern)
        .with_meta("directory", root.display().to_string())
        .with_meta("match_count", count)
}
