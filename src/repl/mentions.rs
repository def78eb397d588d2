//! `@file` mentions in REPL input.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

pub const MAX_MENTION_LINES: usize = 500;

const SEARCH_DIRS: &[&str] = &[".", "src", "tests", "docs", "config"];
const SKIP_DIRS: &[&str] = &["target", "node_modules", ".git", ".omni"];

static MENTION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"@([\w\-./]+(?:\.\w+)?)").ok());

/// Every `@path` in `text`, without the `@`.
pub fn extract_mentions(text: &str) -> Vec<String> {
    let Some(re) = MENTION_RE.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Find the file a mention refers to: the path itself, then the path under
/// each search directory, then any file whose path ends with the mention.
/// Relative lookups start at `workspace`.
pub fn resolve_mention(mention: &str, workspace: &Path) -> Option<PathBuf> {
    let direct = workspace.join(mention);
    if direct.is_file() {
        return Some(direct);
    }

    for dir in SEARCH_DIRS {
        let candidate = workspace.join(dir).join(mention);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    for dir in SEARCH_DIRS {
        let root = workspace.join(dir);
        if !root.is_dir() {
            continue;
        }
        let found = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !(e.file_type().is_dir()
                        && SKIP_DIRS.contains(&e.file_name().to_string_lossy().as_ref()))
            })
            .filter_map(Result::ok)
            .find(|e| e.file_type().is_file() && e.path().to_string_lossy().ends_with(mention));
        if let Some(entry) = found {
            return Some(entry.into_path());
        }
    }

    None
}

/// File content, cut at `max_lines` with a truncation marker.
pub fn read_mentioned_file(path: &Path, max_lines: usize) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let total = content.lines().count();
            if total > max_lines {
                let kept: Vec<&str> = content.lines().take(max_lines).collect();
                format!(
                    "{}\n\n... [truncated {} lines]",
                    kept.join("\n"),
                    total - max_lines
                )
            } else {
                content
            }
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read mentioned file");
            format!("[Error reading file: {e}]")
        }
    }
}

/// Replace resolved mentions with their paths and build the
/// "Referenced files:" block. The block is empty when `text` has no mentions.
pub fn process_mentions(text: &str, workspace: &Path) -> (String, String) {
    let mentions = extract_mentions(text);
    if mentions.is_empty() {
        return (text.to_string(), String::new());
    }

    let mut cleaned = text.to_string();
    let mut context = vec!["Referenced files:".to_string()];

    for mention in &mentions {
        match resolve_mention(mention, workspace) {
            Some(path) => {
                let shown = path
                    .strip_prefix(workspace)
                    .map(|p| p.strip_prefix(".").unwrap_or(p).to_path_buf())
                    .unwrap_or_else(|_| path.clone());
                let shown = shown.display().to_string();
                tracing::info!(mention = %mention, path = %shown, "Resolved file mention");
                context.push(format!("\n=== {shown} ==="));
                context.push(read_mentioned_file(&path, MAX_MENTION_LINES));
                cleaned = cleaned.replace(&format!("@{mention}"), &shown);
            }
            None => {
                tracing::warn!(mention = %mention, "Could not resolve file mention");
                context.push(format!("\n=== {mention} (NOT FOUND) ==="));
            }
        }
    }

    (cleaned, context.join("\n"))
}

/// The prompt sent to an agent: the cleaned text followed by the file block.
pub fn with_context(cleaned: &str, context: &str) -> String {
    if context.is_empty() {
        cleaned.to_string()
    } else {
        format!("{cleaned}\n\n{context}")
    }
}
