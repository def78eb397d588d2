//! Code generation through the text-only `code_generator` agent.
//!
//! The agent answers in prose and fenced blocks; [`extract_files`] turns that
//! into files, which are written inside the workspace and checked with
//! [`validate_file_quality`].

pub mod extractor;
pub mod quality;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

pub use extractor::{ExtractedFile, extract_files};
pub use quality::{QualityIssue, QualityReport, Severity, validate_file_quality};

use crate::agent::{AgentOutput, Runtime};
use crate::error::AgentError;
use crate::safety::SafetyLayer;

pub const CODE_GENERATOR: &str = "code_generator";

/// A file written by [`write_generated`] with its quality report.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub bytes: usize,
    pub report: QualityReport,
}

pub fn code_prompt(description: &str, language: &str, style_guide: Option<&str>) -> String {
    let mut prompt = format!("Generate {language} code: {description}");
    if let Some(guide) = style_guide.map(str::trim).filter(|g| !g.is_empty()) {
        prompt.push_str(&format!("\n\nFollow {guide} guidelines and design patterns."));
    }
    prompt
}

/// Where the primary file goes when no output path is given.
pub fn default_output_path(language: &str) -> PathBuf {
    let file = match language.trim().to_ascii_lowercase().as_str() {
        "html" | "web" => "index.html".to_string(),
        "css" => "styles.css".to_string(),
        "javascript" | "js" => "app.js".to_string(),
        "typescript" | "ts" => "app.ts".to_string(),
        "python" | "py" => "main.py".to_string(),
        "rust" | "rs" => "main.rs".to_string(),
        "go" => "main.go".to_string(),
        "bash" | "shell" | "sh" => "main.sh".to_string(),
        "" => "main.txt".to_string(),
        other => format!("main.{other}"),
    };
    PathBuf::from("generated").join(file)
}

/// Ask the code generator for `description` in `language`.
pub async fn generate_code(
    runtime: &Arc<Runtime>,
    description: &str,
    language: &str,
    style_guide: Option<&str>,
    cancel: CancellationToken,
    print_stream: bool,
) -> Result<AgentOutput, AgentError> {
    let prompt = code_prompt(description, language, style_guide);
    tracing::info!(language, "Generating code");
    runtime.run(CODE_GENERATOR, &prompt, cancel, print_stream).await
}

/// Write extracted files inside the workspace and check each one.
///
/// Paths outside the workspace abort the whole batch before anything is
/// written.
pub async fn write_generated(
    safety: &SafetyLayer,
    files: &[ExtractedFile],
) -> anyhow::Result<Vec<GeneratedFile>> {
    let targets = files
        .iter()
        .map(|f| safety.resolve_write(std::path::Path::new(&f.file_path)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut written = Vec::with_capacity(files.len());
    for (file, path) in files.iter().zip(targets) {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&path, &file.content)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        let report = validate_file_quality(&path);
        tracing::info!(
            path = %path.display(),
            score = report.quality_score,
            issues = report.issues.len(),
            "Wrote generated file"
        );
        written.push(GeneratedFile {
            path,
            bytes: file.content.len(),
            report,
        });
    }
    Ok(written)
}

/// Generate, extract and write in one go. Returns the written files.
pub async fn generate_to_workspace(
    runtime: &Arc<Runtime>,
    description: &str,
    language: &str,
    output: Option<PathBuf>,
    style_guide: Option<&str>,
    cancel: CancellationToken,
) -> anyhow::Result<Vec<GeneratedFile>> {
    let output = output.unwrap_or_else(|| default_output_path(language));
    let answer = generate_code(runtime, description, language, style_guide, cancel, false).await?;
    let files = extract_files(&answer.text, &output.to_string_lossy());
    write_generated(runtime.safety(), &files).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartialConfig;
    use tempfile::TempDir;

    fn safety(tmp: &TempDir) -> SafetyLayer {
        let config = PartialConfig {
            workspace: Some(tmp.path().to_path_buf()),
            ..Default::default()
        }
        .finalize()
        .unwrap();
        SafetyLayer::new(&config).unwrap()
    }

    #[test]
    fn prompt_includes_style_guide_when_given() {
        assert_eq!(code_prompt("a todo app", "html", None), "Generate html code: a todo app");
        assert_eq!(
            code_prompt("a parser", "python", Some("PEP 8")),
            "Generate python code: a parser\n\nFollow PEP 8 guidelines and design patterns."
        );
        assert_eq!(code_prompt("x", "go", Some("  ")), "Generate go code: x");
    }

    #[test]
    fn default_paths_follow_language() {
        assert_eq!(default_output_path("html"), PathBuf::from("generated/index.html"));
        assert_eq!(default_output_path("Python"), PathBuf::from("generated/main.py"));
        assert_eq!(default_output_path("kotlin"), PathBuf::from("generated/main.kotlin"));
    }

    #[tokio::test]
    async fn writes_files_and_reports_quality() {
        let tmp = TempDir::new().unwrap();
        let safety = safety(&tmp);
        let files = extract_files(
            "```html\n<!DOCTYPE html>\n<html><head></head><body>hello</body></html>\n```\n```css\nbody { color: red; }\n```",
            "site/index.html",
        );

        let written = write_generated(&safety, &files).await.unwrap();
        assert_eq!(written.len(), 2);
        assert!(tmp.path().join("site/index.html").exists());
        assert!(tmp.path().join("site/styles.css").exists());
        assert!(!written[0].report.has_issues);
    }

    #[tokio::test]
    async fn rejects_paths_outside_workspace() {
        let tmp = TempDir::new().unwrap();
        let safety = safety(&tmp);
        let files = vec![
            ExtractedFile {
                file_path: "ok.txt".into(),
                content: "fine content\n".into(),
                file_type: "txt".into(),
            },
            ExtractedFile {
                file_path: "/etc/omni-should-not-exist.txt".into(),
                content: "nope\n".into(),
                file_type: "txt".into(),
            },
        ];

        assert!(write_generated(&safety, &files).await.is_err());
        assert!(!tmp.path().join("ok.txt").exists());
    }
}
