//! Heuristic quality checks for generated files.
//!
//! The checks only look for problems that make generated output obviously
//! unusable: empty files, unbalanced brackets, missing block colons in
//! Python, incomplete HTML skeletons and placeholder comments in JavaScript.

use std::fs;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityIssue {
    pub file_path: String,
    /// `syntax`, `incomplete`, `missing`, `undefined_var` or `validation_error`.
    pub issue_type: String,
    pub severity: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
}

impl QualityIssue {
    fn new(file_path: &str, issue_type: &str, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            file_path: file_path.to_string(),
            issue_type: issue_type.to_string(),
            severity,
            description: description.into(),
            line_number: None,
        }
    }

    fn at_line(mut self, line: usize) -> Self {
        self.line_number = Some(line);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub file_path: String,
    pub has_issues: bool,
    pub issues: Vec<QualityIssue>,
    pub quality_score: f64,
}

impl QualityReport {
    fn from_issues(file_path: &str, issues: Vec<QualityIssue>) -> Self {
        let critical = issues.iter().filter(|i| i.severity == Severity::Critical).count();
        let warnings = issues.iter().filter(|i| i.severity == Severity::Warning).count();
        let quality_score = (1.0 - 0.3 * critical as f64 - 0.1 * warnings as f64).max(0.0);

        Self {
            file_path: file_path.to_string(),
            has_issues: !issues.is_empty(),
            issues,
            quality_score,
        }
    }

    pub fn has_critical_issues(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }
}

/// Check one file on disk.
pub fn validate_file_quality(path: &Path) -> QualityReport {
    let file_path = path.display().to_string();

    if !path.exists() {
        return QualityReport {
            file_path: file_path.clone(),
            has_issues: true,
            issues: vec![QualityIssue::new(
                &file_path,
                "missing",
                Severity::Critical,
                "File does not exist",
            )],
            quality_score: 0.0,
        };
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            return QualityReport {
                file_path: file_path.clone(),
                has_issues: true,
                issues: vec![QualityIssue::new(
                    &file_path,
                    "validation_error",
                    Severity::Critical,
                    format!("Validation error: {e}"),
                )],
                quality_score: 0.0,
            };
        }
    };

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let report = validate_content(&file_path, &extension, &content);
    if report.has_critical_issues() {
        tracing::warn!(file = %file_path, issues = report.issues.len(), "Generated file has critical issues");
    } else {
        tracing::debug!(file = %file_path, score = report.quality_score, "Quality check passed");
    }
    report
}

/// Check `content` as if it were a file with the given extension.
pub fn validate_content(file_path: &str, extension: &str, content: &str) -> QualityReport {
    let mut issues = check_empty(file_path, content);
    match extension {
        "py" => issues.extend(check_python(file_path, content)),
        "html" | "htm" => issues.extend(check_html(file_path, content)),
        "js" => issues.extend(check_javascript(file_path, content)),
        _ => {}
    }
    QualityReport::from_issues(file_path, issues)
}

fn check_empty(file_path: &str, content: &str) -> Vec<QualityIssue> {
    if content.trim().chars().count() < 10 {
        vec![QualityIssue::new(
            file_path,
            "incomplete",
            Severity::Critical,
            "File is empty or nearly empty",
        )]
    } else {
        Vec::new()
    }
}

fn ci(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern).case_insensitive(true).build().ok()
}

fn count_ci(pattern: &str, content: &str) -> usize {
    ci(pattern).map(|re| re.find_iter(content).count()).unwrap_or(0)
}

fn check_html(file_path: &str, content: &str) -> Vec<QualityIssue> {
    let mut issues = Vec::new();

    if count_ci(r"<!DOCTYPE\s+html>", content) == 0 {
        issues.push(QualityIssue::new(
            file_path,
            "incomplete",
            Severity::Warning,
            "Missing DOCTYPE declaration",
        ));
    }

    for tag in ["html", "head", "body"] {
        if count_ci(&format!(r"<{tag}\b"), content) == 0 {
            issues.push(QualityIssue::new(
                file_path,
                "incomplete",
                Severity::Critical,
                format!("Missing <{tag}> tag"),
            ));
        }
    }

    if count_ci(r"<html\b", content) > count_ci(r"</html>", content) {
        issues.push(QualityIssue::new(
            file_path,
            "incomplete",
            Severity::Critical,
            "Unclosed <html> tag",
        ));
    }

    issues
}

const JS_PLACEHOLDERS: &[&str] = &[r"//\s*\.{3}", r"//\s*rest\s+of", r"//\s*TODO", r"/\*\s*\.{3}\s*\*/"];

fn check_javascript(file_path: &str, content: &str) -> Vec<QualityIssue> {
    let mut issues = Vec::new();

    for pattern in JS_PLACEHOLDERS {
        if count_ci(pattern, content) > 0 {
            issues.push(QualityIssue::new(
                file_path,
                "incomplete",
                Severity::Critical,
                format!("Contains placeholder comment: {pattern}"),
            ));
        }
    }

    // Receivers used as `x.execute(` or `return x.` with no declaration of `x`.
    let mut reported: Vec<String> = Vec::new();
    for pattern in [r"\b(\w+)\.execute\(", r"return\s+(\w+)\."] {
        let Ok(re) = Regex::new(pattern) else { continue };
        for caps in re.captures_iter(content) {
            let Some(var) = caps.get(1).map(|m| m.as_str()) else { continue };
            if reported.iter().any(|r| r == var) {
                continue;
            }
            let declared = Regex::new(&format!(
                r"\b(const|let|var|function|class)\s+{}\b",
                regex::escape(var)
            ))
            .map(|re| re.is_match(content))
            .unwrap_or(true);
            let is_param = Regex::new(&format!(r"\(([^)]*\b{}\b[^)]*)\)\s*(=>|\{{)", regex::escape(var)))
                .map(|re| re.is_match(content))
                .unwrap_or(false);
            if !declared && !is_param && !is_js_global(var) {
                reported.push(var.to_string());
                issues.push(QualityIssue::new(
                    file_path,
                    "undefined_var",
                    Severity::Critical,
                    format!("Potentially undefined variable: {var}"),
                ));
            }
        }
    }

    let open = content.matches('{').count();
    let close = content.matches('}').count();
    if open.abs_diff(close) > 2 {
        issues.push(QualityIssue::new(
            file_path,
            "syntax",
            Severity::Critical,
            format!("Mismatched braces: {open} opening, {close} closing"),
        ));
    }

    issues
}

fn is_js_global(name: &str) -> bool {
    matches!(
        name,
        "this" | "window" | "document" | "console" | "Math" | "JSON" | "Object" | "Array"
            | "Promise" | "localStorage" | "sessionStorage" | "navigator" | "super"
    )
}

const PY_BLOCK_KEYWORDS: &[&str] = &[
    "def", "class", "if", "elif", "else", "for", "while", "try", "except", "finally", "with",
];

/// Bracket balance (ignoring strings and comments) and missing block colons.
fn check_python(file_path: &str, content: &str) -> Vec<QualityIssue> {
    let mut issues = Vec::new();
    if let Some((line, message)) = python_bracket_error(content) {
        issues.push(
            QualityIssue::new(file_path, "syntax", Severity::Critical, format!("Syntax error: {message}"))
                .at_line(line),
        );
        return issues;
    }
    for line in python_missing_colons(content) {
        issues.push(
            QualityIssue::new(file_path, "syntax", Severity::Critical, "Syntax error: expected ':'")
                .at_line(line),
        );
    }
    issues
}

fn python_bracket_error(content: &str) -> Option<(usize, String)> {
    let chars: Vec<char> = content.chars().collect();
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => line += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '"' | '\'' => {
                let triple = i + 2 < chars.len() && chars[i + 1] == c && chars[i + 2] == c;
                let start_line = line;
                i += if triple { 3 } else { 1 };
                loop {
                    if i >= chars.len() {
                        return Some((start_line, "unterminated string literal".to_string()));
                    }
                    let d = chars[i];
                    if d == '\\' {
                        if chars.get(i + 1) == Some(&'\n') {
                            line += 1;
                        }
                        i += 2;
                        continue;
                    }
                    if d == '\n' {
                        if !triple {
                            return Some((start_line, "unterminated string literal".to_string()));
                        }
                        line += 1;
                    }
                    if d == c && (!triple || (chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c))) {
                        i += if triple { 3 } else { 1 };
                        break;
                    }
                    i += 1;
                }
                continue;
            }
            '(' | '[' | '{' => stack.push((c, line)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, open_line)) => {
                        return Some((
                            line,
                            format!("closing '{c}' does not match '{open}' on line {open_line}"),
                        ));
                    }
                    None => return Some((line, format!("unmatched '{c}'"))),
                }
            }
            _ => {}
        }
        i += 1;
    }

    stack
        .last()
        .map(|(open, open_line)| (*open_line, format!("'{open}' was never closed")))
}

/// Lines opening a block that don't end with `:`. Lines inside triple-quoted
/// strings and continued lines are skipped.
fn python_missing_colons(content: &str) -> Vec<usize> {
    let mut missing = Vec::new();
    let mut in_docstring = false;
    let mut depth: i64 = 0;

    for (idx, raw) in content.lines().enumerate() {
        let triple_quotes = raw.matches("\"\"\"").count() + raw.matches("'''").count();
        if in_docstring {
            if triple_quotes % 2 == 1 {
                in_docstring = false;
            }
            continue;
        }
        if triple_quotes % 2 == 1 {
            in_docstring = true;
        }

        let code = strip_python_comment(raw).trim_end();
        let starts_statement = depth == 0;
        for c in code.chars() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                _ => {}
            }
        }
        if !starts_statement || depth != 0 || code.ends_with('\\') {
            depth = depth.max(0);
            continue;
        }

        let trimmed = code.trim_start();
        let trimmed = trimmed.strip_prefix("async ").unwrap_or(trimmed);
        let first_word: String = trimmed
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if PY_BLOCK_KEYWORDS.contains(&first_word.as_str()) {
            let rest = &trimmed[first_word.len()..];
            let is_statement = rest.is_empty() || rest.starts_with([' ', ':', '(']);
            if is_statement && !code.ends_with(':') && !code.contains(": ") {
                missing.push(idx + 1);
            }
        }
    }
    missing
}

fn strip_python_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, '#') => return &line[..i],
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            _ => {}
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_scores_zero() {
        let report = validate_file_quality(Path::new("/definitely/not/here.py"));
        assert!(report.has_issues);
        assert_eq!(report.quality_score, 0.0);
        assert_eq!(report.issues[0].issue_type, "missing");
    }

    #[test]
    fn empty_file_is_critical() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.css");
        fs::write(&path, "  \n").unwrap();

        let report = validate_file_quality(&path);
        assert_eq!(report.issues.len(), 1);
        assert!((report.quality_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn complete_html_passes() {
        let html = "<!DOCTYPE html>\n<html>\n<head><title>x</title></head>\n<body><p>hi</p></body>\n</html>\n";
        let report = validate_content("index.html", "html", html);
        assert!(!report.has_issues, "{:?}", report.issues);
        assert_eq!(report.quality_score, 1.0);
    }

    #[test]
    fn html_without_doctype_is_a_warning_only() {
        let html = "<html>\n<head></head>\n<body>content here</body>\n</html>";
        let report = validate_content("index.html", "html", html);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].severity, Severity::Warning);
        assert!((report.quality_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn unclosed_html_and_missing_body_are_critical() {
        let html = "<!DOCTYPE html>\n<html>\n<head><title>x</title></head>\n";
        let report = validate_content("index.html", "html", html);
        let descriptions: Vec<&str> = report.issues.iter().map(|i| i.description.as_str()).collect();
        assert!(descriptions.contains(&"Missing <body> tag"));
        assert!(descriptions.contains(&"Unclosed <html> tag"));
        assert!((report.quality_score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn javascript_placeholders_are_flagged() {
        let js = "function start() {\n  // TODO wire this up\n  return 1;\n}\n";
        let report = validate_content("app.js", "js", js);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].description.contains("placeholder"));
    }

    #[test]
    fn javascript_undefined_receiver_is_flagged() {
        let js = "function run() {\n  return tool.execute(1);\n}\n";
        let report = validate_content("app.js", "js", js);
        assert!(
            report
                .issues
                .iter()
                .any(|i| i.issue_type == "undefined_var" && i.description.ends_with("tool"))
        );

        let ok = "const tool = makeTool();\nfunction run() {\n  return tool.execute(1);\n}\n";
        assert!(!validate_content("app.js", "js", ok).has_issues);
    }

    #[test]
    fn javascript_brace_mismatch_beyond_tolerance() {
        let js = "function a() {{{{\n  let x = 1;\n";
        let report = validate_content("app.js", "js", js);
        assert!(report.issues.iter().any(|i| i.description.starts_with("Mismatched braces")));
    }

    #[test]
    fn valid_python_passes() {
        let py = "import os\n\n\ndef main(args: list) -> None:\n    \"\"\"Entry point.\n    if this were code\n    \"\"\"\n    data = {\n        'a': (1, 2),\n    }\n    if data:  # comment with (\n        print(\"# not a comment )\")\n\n\nclass Foo(object):\n    pass\n";
        let report = validate_content("main.py", "py", py);
        assert!(!report.has_issues, "{:?}", report.issues);
    }

    #[test]
    fn python_unclosed_bracket_reports_line() {
        let py = "def main():\n    x = [1, 2,\n    return x\n";
        let report = validate_content("main.py", "py", py);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].line_number, Some(2));
        assert!(report.issues[0].description.contains("never closed"));
    }

    #[test]
    fn python_missing_colon_reports_line() {
        let py = "import sys\n\ndef main()\n    return 1\n";
        let report = validate_content("main.py", "py", py);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].line_number, Some(3));
        assert_eq!(report.issues[0].description, "Syntax error: expected ':'");
    }

    #[test]
    fn css_is_only_checked_for_emptiness() {
        let report = validate_content("styles.css", "css", "body { color: red;");
        assert!(!report.has_issues);
    }
}
