//! JSONL session logger for agent run replay.
//!
//! Every agent run writes one append-only file named
//! `session-{timestamp}-{agent}.jsonl` into the configured log directory.
//! Writes are small and flushed after each event, so plain `std::fs` is used.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

/// Returns the current UTC time as an ISO 8601 string with milliseconds.
fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// A structured log entry serialized as a single JSON line.
#[derive(Debug, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum LogEntry {
    SessionStart {
        timestamp: String,
        agent: String,
        model: String,
        workspace: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        delegation_id: Option<String>,
    },

    AssistantText {
        timestamp: String,
        turn: u32,
        content: String,
    },

    ToolCall {
        timestamp: String,
        turn: u32,
        call_id: String,
        fn_name: String,
        fn_arguments: serde_json::Value,
    },

    ToolResult {
        timestamp: String,
        turn: u32,
        call_id: String,
        fn_name: String,
        success: bool,
        result: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A model attempt failed and the runner moved on to the next attempt.
    ModelFallback {
        timestamp: String,
        from_model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        to_model: Option<String>,
        attempt: u32,
        error: String,
    },

    Error {
        timestamp: String,
        turn: u32,
        message: String,
    },

    SessionEnd {
        timestamp: String,
        total_turns: u32,
        reason: String,
    },
}

/// Append-only JSONL logger for one agent run.
pub struct SessionLogger {
    writer: BufWriter<fs::File>,
    log_path: PathBuf,
}

impl SessionLogger {
    /// Create a logger writing into `log_dir`, creating the directory if needed.
    ///
    /// The file name carries a millisecond timestamp and the agent label so
    /// that nested delegated runs started in the same second do not collide.
    pub fn new(log_dir: &Path, agent: &str) -> anyhow::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3f").to_string();
        let label: String = agent
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        let mut log_path = log_dir.join(format!("session-{stamp}-{label}.jsonl"));
        let mut n = 1;
        while log_path.exists() {
            log_path = log_dir.join(format!("session-{stamp}-{label}-{n}.jsonl"));
            n += 1;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            log_path,
        })
    }

    /// Serialize a log entry as a single JSON line and flush.
    pub fn log_event(&mut self, event: &LogEntry) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn log_session_start(
        &mut self,
        agent: &str,
        model: &str,
        workspace: &Path,
        delegation_id: Option<&str>,
    ) -> anyhow::Result<()> {
        self.log_event(&LogEntry::SessionStart {
            timestamp: now_iso(),
            agent: agent.to_string(),
            model: model.to_string(),
            workspace: workspace.display().to_string(),
            delegation_id: delegation_id.map(str::to_string),
        })
    }

    pub fn log_assistant_text(&mut self, turn: u32, content: &str) -> anyhow::Result<()> {
        self.log_event(&LogEntry::AssistantText {
            timestamp: now_iso(),
            turn,
            content: content.to_string(),
        })
    }

    pub fn log_tool_call(
        &mut self,
        turn: u32,
        call_id: &str,
        fn_name: &str,
        fn_arguments: &serde_json::Value,
    ) -> anyhow::Result<()> {
        self.log_event(&LogEntry::ToolCall {
            timestamp: now_iso(),
            turn,
            call_id: call_id.to_string(),
            fn_name: fn_name.to_string(),
            fn_arguments: fn_arguments.clone(),
        })
    }

    pub fn log_tool_result(
        &mut self,
        turn: u32,
        call_id: &str,
        fn_name: &str,
        result: &crate::tools::ToolResult,
    ) -> anyhow::Result<()> {
        self.log_event(&LogEntry::ToolResult {
            timestamp: now_iso(),
            turn,
            call_id: call_id.to_string(),
            fn_name: fn_name.to_string(),
            success: result.success,
            result: result.output.clone(),
            error: result.error.clone(),
        })
    }

    pub fn log_model_fallback(
        &mut self,
        from_model: &str,
        to_model: Option<&str>,
        attempt: u32,
        error: &str,
    ) -> anyhow::Result<()> {
        self.log_event(&LogEntry::ModelFallback {
            timestamp: now_iso(),
            from_model: from_model.to_string(),
            to_model: to_model.map(str::to_string),
            attempt,
            error: error.to_string(),
        })
    }

    pub fn log_error(&mut self, turn: u32, message: &str) -> anyhow::Result<()> {
        self.log_event(&LogEntry::Error {
            timestamp: now_iso(),
            turn,
            message: message.to_string(),
        })
    }

    pub fn log_session_end(&mut self, total_turns: u32, reason: &str) -> anyhow::Result<()> {
        self.log_event(&LogEntry::SessionEnd {
            timestamp: now_iso(),
            total_turns,
            reason: reason.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolResult;
    use std::io::BufRead;
    use tempfile::TempDir;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        let file = fs::File::open(path).expect("open log");
        std::io::BufReader::new(file)
            .lines()
            .map(|l| serde_json::from_str(&l.expect("line")).expect("valid JSON"))
            .collect()
    }

    #[test]
    fn creates_named_file_in_log_dir() {
        let tmp = TempDir::new().unwrap();
        let log_dir = tmp.path().join("logs");
        let logger = SessionLogger::new(&log_dir, "file_editor").unwrap();

        assert!(log_dir.is_dir());
        assert!(logger.log_path().starts_with(&log_dir));
        let name = logger.log_path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("session-"));
        assert!(name.ends_with("-file_editor.jsonl"));
    }

    #[test]
    fn two_loggers_in_same_instant_do_not_share_a_file() {
        let tmp = TempDir::new().unwrap();
        let a = SessionLogger::new(tmp.path(), "default").unwrap();
        let b = SessionLogger::new(tmp.path(), "default").unwrap();
        assert_ne!(a.log_path(), b.log_path());
    }

    #[test]
    fn agent_label_is_sanitized() {
        let tmp = TempDir::new().unwrap();
        let logger = SessionLogger::new(tmp.path(), "my agent/x").unwrap();
        let name = logger.log_path().file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("-my_agent_x.jsonl"), "{name}");
    }

    #[test]
    fn full_session_is_written_in_order() {
        let tmp = TempDir::new().unwrap();
        let mut logger = SessionLogger::new(tmp.path(), "default").unwrap();

        logger
            .log_session_start("default", "ollama:mistral", Path::new("/ws"), None)
            .unwrap();
        logger
            .log_tool_call(1, "call_1", "read_file", &serde_json::json!({"file_path": "a.txt"}))
            .unwrap();
        logger
            .log_tool_result(1, "call_1", "read_file", &ToolResult::err("File not found: a.txt"))
            .unwrap();
        logger
            .log_model_fallback("ollama:mistral", Some("openai:gpt-4o"), 1, "boom")
            .unwrap();
        logger.log_assistant_text(2, "done").unwrap();
        logger.log_session_end(2, "completed").unwrap();

        let entries = read_lines(logger.log_path());
        let kinds: Vec<&str> = entries
            .iter()
            .map(|e| e["event_type"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "session_start",
                "tool_call",
                "tool_result",
                "model_fallback",
                "assistant_text",
                "session_end"
            ]
        );

        assert_eq!(entries[0]["agent"], "default");
        assert!(entries[0].get("delegation_id").is_none());
        assert_eq!(entries[1]["fn_arguments"]["file_path"], "a.txt");
        assert_eq!(entries[2]["success"], false);
        assert_eq!(entries[2]["error"], "File not found: a.txt");
        assert_eq!(entries[3]["to_model"], "openai:gpt-4o");
        assert_eq!(entries[5]["total_turns"], 2);
        assert!(entries[0]["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}
