//! Pulls file contents out of a free-form model response.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFile {
    pub file_path: String,
    pub content: String,
    /// Extension without the dot: `html`, `css`, `js`, `py`, ...
    #[serde(default)]
    pub file_type: String,
}

#[derive(Deserialize)]
struct FilesPayload {
    files: Vec<ExtractedFile>,
}

static FENCE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```([\w+#.-]*)[^\n]*\n(.*?)```").ok());

/// Split `response` into files.
///
/// A JSON `{"files": [...]}` payload wins. Otherwise each fenced code block
/// becomes a file: a single block lands at `requested_path`; with several,
/// the block whose language matches the requested extension takes
/// `requested_path` and the others are placed next to it under a
/// conventional name. With no fences the whole trimmed response is the file.
pub fn extract_files(response: &str, requested_path: &str) -> Vec<ExtractedFile> {
    if let Some(files) = extract_json(response, requested_path) {
        tracing::debug!(count = files.len(), "Extracted files from JSON payload");
        return files;
    }

    let blocks = fenced_blocks(response);
    let requested_ext = extension_of(requested_path);

    let files = match blocks.len() {
        0 => vec![ExtractedFile {
            file_path: requested_path.to_string(),
            content: ensure_trailing_newline(response.trim()),
            file_type: requested_ext.clone(),
        }],
        1 => {
            let (_, content) = &blocks[0];
            vec![ExtractedFile {
                file_path: requested_path.to_string(),
                content: ensure_trailing_newline(content),
                file_type: requested_ext.clone(),
            }]
        }
        _ => place_blocks(&blocks, requested_path, &requested_ext),
    };

    tracing::debug!(count = files.len(), "Extracted files from response");
    files
}

fn extract_json(response: &str, requested_path: &str) -> Option<Vec<ExtractedFile>> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end <= start {
        return None;
    }
    let payload: FilesPayload = serde_json::from_str(&response[start..=end]).ok()?;
    if payload.files.is_empty() {
        return None;
    }

    let base = base_dir(requested_path);
    let files = payload
        .files
        .into_iter()
        .filter(|f| !f.content.trim().is_empty())
        .map(|mut f| {
            if f.file_path.trim().is_empty() {
                f.file_path = requested_path.to_string();
            } else if Path::new(&f.file_path).parent() == Some(Path::new("")) {
                f.file_path = join(&base, &f.file_path);
            }
            if f.file_type.is_empty() {
                f.file_type = extension_of(&f.file_path);
            }
            f.content = ensure_trailing_newline(&f.content);
            f
        })
        .collect::<Vec<_>>();

    (!files.is_empty()).then_some(files)
}

fn fenced_blocks(response: &str) -> Vec<(String, String)> {
    let Some(re) = FENCE_RE.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(response)
        .filter_map(|caps| {
            let lang = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let body = caps.get(2)?.as_str();
            if body.trim().is_empty() {
                return None;
            }
            Some((normalize_lang(lang), body.to_string()))
        })
        .collect()
}

fn place_blocks(
    blocks: &[(String, String)],
    requested_path: &str,
    requested_ext: &str,
) -> Vec<ExtractedFile> {
    let base = base_dir(requested_path);
    let primary = blocks
        .iter()
        .position(|(ext, _)| same_kind(ext, requested_ext))
        .unwrap_or(0);

    let mut used: Vec<String> = vec![requested_path.to_string()];
    let mut files = Vec::with_capacity(blocks.len());

    for (i, (ext, content)) in blocks.iter().enumerate() {
        let (file_path, file_type) = if i == primary {
            (requested_path.to_string(), requested_ext.to_string())
        } else {
            let ext = if ext.is_empty() { "txt" } else { ext.as_str() };
            let path = unique_path(&base, &sibling_name(ext), &used);
            (path, ext.to_string())
        };
        used.push(file_path.clone());
        files.push(ExtractedFile {
            file_path,
            content: ensure_trailing_newline(content),
            file_type,
        });
    }
    files
}

fn sibling_name(ext: &str) -> String {
    match ext {
        "html" => "index.html".to_string(),
        "css" => "styles.css".to_string(),
        "js" => "app.js".to_string(),
        other => format!("main.{other}"),
    }
}

fn unique_path(base: &str, name: &str, used: &[String]) -> String {
    let candidate = join(base, name);
    if !used.contains(&candidate) {
        return candidate;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (name, String::new()),
    };
    (2..)
        .map(|n| join(base, &format!("{stem}_{n}{ext}")))
        .find(|p| !used.contains(p))
        .unwrap_or(candidate)
}

fn normalize_lang(lang: &str) -> String {
    match lang.to_ascii_lowercase().as_str() {
        "javascript" | "js" | "jsx" | "mjs" => "js".to_string(),
        "typescript" | "ts" => "ts".to_string(),
        "python" | "py" | "python3" => "py".to_string(),
        "html" | "htm" | "xhtml" => "html".to_string(),
        "rust" | "rs" => "rs".to_string(),
        "bash" | "sh" | "shell" | "zsh" => "sh".to_string(),
        "markdown" | "md" => "md".to_string(),
        "yaml" | "yml" => "yaml".to_string(),
        other => other.to_string(),
    }
}

fn same_kind(block_ext: &str, requested_ext: &str) -> bool {
    !block_ext.is_empty() && normalize_lang(block_ext) == normalize_lang(requested_ext)
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn base_dir(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        PathBuf::from(base).join(name).to_string_lossy().into_owned()
    }
}

fn ensure_trailing_newline(content: &str) -> String {
    if content.ends_with('\n') {
        content.to_string()
    } else {
        format!("{content}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_payload_wins() {
        let response = r#"Here you go:
{"files": [
  {"file_path": "index.html", "content": "<html></html>", "file_type": "html"},
  {"file_path": "site/styles.css", "content": "body {}"}
]}
Enjoy."#;
        let files = extract_files(response, "site/index.html");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].file_path, "site/index.html");
        assert_eq!(files[1].file_path, "site/styles.css");
        assert_eq!(files[1].file_type, "css");
    }

    #[test]
    fn single_fence_goes_to_requested_path() {
        let response = "Sure!\n```python\nprint('hi')\n```\nThat prints hi.";
        let files = extract_files(response, "out/hello.py");
        assert_eq!(
            files,
            vec![ExtractedFile {
                file_path: "out/hello.py".into(),
                content: "print('hi')\n".into(),
                file_type: "py".into(),
            }]
        );
    }

    #[test]
    fn multiple_fences_get_sibling_names() {
        let response = "```css\nbody { margin: 0; }\n```\n\n```html\n<!DOCTYPE html>\n<html></html>\n```\n\n```javascript\nconsole.log(1);\n```\n";
        let files = extract_files(response, "web/page.html");
        let paths: Vec<&str> = files.iter().map(|f| f.file_path.as_str()).collect();
        assert_eq!(paths, vec!["web/styles.css", "web/page.html", "web/app.js"]);
        assert!(files[1].content.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn duplicate_siblings_are_numbered() {
        let response = "```py\na = 1\n```\n```js\nlet a;\n```\n```js\nlet b;\n```\n";
        let files = extract_files(response, "main.py");
        let paths: Vec<&str> = files.iter().map(|f| f.file_path.as_str()).collect();
        assert_eq!(paths, vec!["main.py", "app.js", "app_2.js"]);
    }

    #[test]
    fn plain_response_is_one_file() {
        let files = extract_files("  <p>hello</p>  \n", "index.html");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].content, "<p>hello</p>\n");
        assert_eq!(files[0].file_type, "html");
    }

    #[test]
    fn braces_in_code_do_not_count_as_json() {
        let response = "```js\nfunction f() { return {a: 1}; }\n```";
        let files = extract_files(response, "app.js");
        assert_eq!(files.len(), 1);
        assert!(files[0].content.starts_with("function f()"));
    }
}
