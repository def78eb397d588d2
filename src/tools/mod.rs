//! Tools the model can call.
//!
//! Every tool implements [`Tool`] and returns a [`ToolResult`]. Failures are
//! values, never `Err`, so the model always sees what went wrong and can
//! react. The [`ToolRegistry`] owns the tool set, exports genai schemas and
//! runs calls through the [`approval::ApprovalGate`].

pub mod approval;
pub mod file_edit;
pub mod file_ops;
pub mod memory;
mod registry;
pub mod search;
pub mod shell;
pub mod web;

pub use registry::ToolRegistry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::safety::SafetyLayer;
use approval::ApprovalGate;

/// Outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub metadata: Map<String, Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            metadata: Map::new(),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message.into()),
            metadata: Map::new(),
        }
    }

    pub fn missing(param: &str) -> Self {
        Self::err(format!("Missing required parameter: {param}"))
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// The text handed back to the model: raw output on success, a JSON
    /// error object otherwise.
    pub fn to_model_content(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            json!({ "error": self.error.as_deref().unwrap_or("unknown error") }).to_string()
        }
    }
}

/// Runs a named agent on behalf of a tool (delegation).
#[async_trait]
pub trait Delegator: Send + Sync {
    /// Run `agent` on `prompt` as a child of the calling agent and return its
    /// final answer.
    async fn delegate(
        &self,
        ctx: &ToolContext,
        agent: &str,
        prompt: String,
    ) -> Result<String, AgentError>;
}

/// Everything a tool may need while executing.
#[derive(Clone)]
pub struct ToolContext {
    pub safety: Arc<SafetyLayer>,
    pub approval: Arc<ApprovalGate>,
    pub memory_db: PathBuf,
    /// Name of the agent making the call.
    pub agent: String,
    /// Delegation record of the calling agent, when it is itself a delegate.
    pub delegation_id: Option<String>,
    pub cancel: CancellationToken,
    pub delegator: Option<Arc<dyn Delegator>>,
}

impl ToolContext {
    pub fn new(safety: Arc<SafetyLayer>, memory_db: PathBuf) -> Self {
        Self {
            safety,
            approval: Arc::new(ApprovalGate::auto()),
            memory_db,
            agent: "default".to_string(),
            delegation_id: None,
            cancel: CancellationToken::new(),
            delegator: None,
        }
    }

    pub fn workspace(&self) -> &Path {
        self.safety.workspace_root()
    }
}

/// Unified tool interface.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    /// Whether a call must pass the approval gate first.
    fn requires_approval(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult;
}

pub(crate) fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub(crate) fn u64_arg(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    })
}

pub(crate) fn bool_arg(args: &Value, key: &str) -> Option<bool> {
    args.get(key).and_then(|v| {
        v.as_bool().or_else(|| match v.as_str() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        })
    })
}

/// Cut `content` to `max_chars` characters, noting the original length.
pub(crate) fn truncate_chars(content: &str, max_chars: Option<usize>) -> String {
    match max_chars {
        Some(limit) if content.chars().count() > limit => {
            let head: String = content.chars().take(limit).collect();
            format!(
                "{head}...\n[truncated at {limit} chars, total {}]",
                content.chars().count()
            )
        }
        _ => content.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_results_serialize_as_json_for_the_model() {
        let result = ToolResult::err("File not found: a.txt");
        let parsed: Value = serde_json::from_str(&result.to_model_content()).unwrap();
        assert_eq!(parsed["error"], "File not found: a.txt");
    }

    #[test]
    fn success_results_pass_output_through() {
        assert_eq!(ToolResult::ok("hello").to_model_content(), "hello");
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("héllo", Some(10)), "héllo");
        let cut = truncate_chars("héllo wörld", Some(5));
        assert!(cut.starts_with("héllo..."));
        assert!(cut.contains("[truncated at 5 chars, total 11]"));
    }

    #[test]
    fn numeric_args_accept_strings() {
        let args = json!({"a": 3, "b": "7", "c": "x"});
        assert_eq!(u64_arg(&args, "a"), Some(3));
        assert_eq!(u64_arg(&args, "b"), Some(7));
        assert_eq!(u64_arg(&args, "c"), None);
    }
}
