use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;

use super::approval::ApprovalDecision;
use super::{Tool, ToolContext, ToolResult, file_edit, file_ops, memory, search, shell, web};
use crate::error::ToolError;

/// Named tool set with deterministic (registration) order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in tool, delegation tools included.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: Vec<Arc<dyn Tool>> = vec![
            Arc::new(file_ops::ReadFileTool),
            Arc::new(file_ops::WriteFileTool),
            Arc::new(file_edit::EditFileTool),
            Arc::new(search::ListDirectoryTool),
            Arc::new(search::GlobSearchTool),
            Arc::new(search::GrepSearchTool),
            Arc::new(shell::ShellTool),
            Arc::new(web::FetchUrlTool),
            Arc::new(memory::MemoryTool),
        ];
        for tool in builtins
            .into_iter()
            .chain(crate::orchestration::delegation_tools())
        {
            // Built-in names are unique.
            let _ = registry.register(tool);
        }
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    fn selected<'a>(&'a self, names: &'a [String]) -> impl Iterator<Item = &'a Arc<dyn Tool>> + 'a {
        names.iter().filter_map(|name| self.tools.get(name))
    }

    /// genai tool schemas for the given names. Unknown names are skipped.
    pub fn genai_tools(&self, names: &[String]) -> Vec<genai::chat::Tool> {
        self.selected(names)
            .map(|tool| {
                genai::chat::Tool::new(tool.name())
                    .with_description(tool.description())
                    .with_schema(tool.parameters())
            })
            .collect()
    }

    /// Markdown description of the given tools for the system prompt.
    pub fn descriptions(&self, names: &[String]) -> String {
        let mut out = String::new();
        for tool in self.selected(names) {
            out.push_str(&format!("### {}\n{}\n", tool.name(), tool.description()));
            if let Some(props) = tool.parameters().get("properties").and_then(Value::as_object) {
                for (param, schema) in props {
                    let desc = schema
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    out.push_str(&format!("- **{param}**: {desc}\n"));
                }
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }

    /// Run a tool call. Unknown tools, rejected approvals and panics inside a
    /// tool all come back as error results.
    pub async fn dispatch(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.get(name) else {
            return ToolResult::err(format!("Unknown tool: {name}"));
        };

        if tool.requires_approval() {
            let decision = ctx.approval.request(name, &args).await;
            if decision == ApprovalDecision::Rejected {
                tracing::info!(tool = name, "Tool call rejected");
                return ToolResult::err(format!("Tool execution rejected by user: {name}"))
                    .with_meta("approval_decision", decision.as_str());
            }
        }

        match AssertUnwindSafe(tool.execute(ctx, args)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(tool = name, "Tool panicked");
                ToolResult::err(format!("Tool '{name}' failed unexpectedly"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::approval::{ApprovalGate, ApprovalPrompter};
    use crate::tools::test_support::make_ctx;
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the text argument"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string", "description": "Text to echo"}}})
        }
        async fn execute(&self, _ctx: &ToolContext, args: Value) -> ToolResult {
            ToolResult::ok(args["text"].as_str().unwrap_or_default())
        }
    }

    struct Panics;

    #[async_trait]
    impl Tool for Panics {
        fn name(&self) -> &str {
            "panics"
        }
        fn description(&self) -> &str {
            "Always panics"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _ctx: &ToolContext, _args: Value) -> ToolResult {
            panic!("boom")
        }
    }

    struct RejectAll;

    #[async_trait]
    impl ApprovalPrompter for RejectAll {
        async fn ask(&self, _tool: &str, _args: &Value) -> ApprovalDecision {
            ApprovalDecision::Rejected
        }
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo)).unwrap();
        let err = registry.register(Arc::new(Echo)).unwrap_err();
        assert!(matches!(err, ToolError::AlreadyRegistered(ref n) if n == "echo"));
    }

    #[test]
    fn builtins_are_registered() {
        let registry = ToolRegistry::with_builtins();
        for name in [
            "read_file",
            "write_file",
            "edit_file",
            "list_directory",
            "glob_search",
            "grep_search",
            "execute_shell",
            "fetch_url",
            "memory",
            "analyze_codebase",
            "edit_files",
        ] {
            assert!(registry.has(name), "missing {name}");
        }
    }

    #[test]
    fn genai_export_respects_subset() {
        let registry = ToolRegistry::with_builtins();
        let tools = registry.genai_tools(&["read_file".to_string(), "nope".to_string()]);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name.to_string(), "read_file");
        assert!(tools[0].schema.is_some());
    }

    #[test]
    fn descriptions_list_parameters() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo)).unwrap();
        let desc = registry.descriptions(&["echo".to_string()]);
        assert!(desc.contains("### echo"));
        assert!(desc.contains("- **text**: Text to echo"));
    }

    #[tokio::test]
    async fn unknown_tool_is_error_result() {
        let tmp = TempDir::new().unwrap();
        let ctx = make_ctx(&tmp);
        let result = ToolRegistry::new().dispatch("nope", json!({}), &ctx).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unknown tool: nope"));
    }

    #[tokio::test]
    async fn panicking_tool_is_error_result() {
        let tmp = TempDir::new().unwrap();
        let ctx = make_ctx(&tmp);
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Panics)).unwrap();
        let result = registry.dispatch("panics", json!({}), &ctx).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn rejected_approval_blocks_execution() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = make_ctx(&tmp);
        ctx.approval = Arc::new(ApprovalGate::new(false, Some(Arc::new(RejectAll))));

        let registry = ToolRegistry::with_builtins();
        let result = registry
            .dispatch(
                "write_file",
                json!({"file_path": "x.txt", "content": "hi"}),
                &ctx,
            )
            .await;

        assert_eq!(
            result.error.as_deref(),
            Some("Tool execution rejected by user: write_file")
        );
        assert_eq!(result.metadata["approval_decision"], "rejected");
        assert!(!ctx.workspace().join("x.txt").exists());
    }

    #[tokio::test]
    async fn read_only_tools_skip_approval() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = make_ctx(&tmp);
        ctx.approval = Arc::new(ApprovalGate::new(false, Some(Arc::new(RejectAll))));
        std::fs::write(ctx.workspace().join("a.txt"), "content").unwrap();

        let registry = ToolRegistry::with_builtins();
        let result = registry
            .dispatch("read_file", json!({"file_path": "a.txt"}), &ctx)
            .await;
        assert!(result.success);
        assert_eq!(result.output, "content");
    }
}
