use async_trait::async_trait;
use omni::config::PartialConfig;
use omni::safety::SafetyLayer;
use omni::tools::approval::{ApprovalDecision, ApprovalGate, ApprovalPrompter, tool_requires_approval};
use omni::tools::{ToolContext, ToolRegistry};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn context(tmp: &TempDir) -> ToolContext {
    let config = PartialConfig {
        workspace: Some(tmp.path().to_path_buf()),
        ..Default::default()
    }
    .finalize()
    .unwrap();
    let safety = Arc::new(SafetyLayer::new(&config).unwrap());
    ToolContext::new(safety, config.memory_db_path)
}

/// Answers every prompt the same way and counts the questions.
struct Fixed {
    answer: ApprovalDecision,
    asked: AtomicUsize,
}

#[async_trait]
impl ApprovalPrompter for Fixed {
    async fn ask(&self, _tool: &str, _args: &Value) -> ApprovalDecision {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

fn gated(ctx: ToolContext, answer: ApprovalDecision) -> (ToolContext, Arc<Fixed>) {
    let prompter = Arc::new(Fixed {
        answer,
        asked: AtomicUsize::new(0),
    });
    let ctx = ToolContext {
        approval: Arc::new(ApprovalGate::new(false, Some(prompter.clone()))),
        ..ctx
    };
    (ctx, prompter)
}

#[test]
fn registered_tools_declare_approval_consistently() {
    let registry = ToolRegistry::with_builtins();
    for name in registry.names() {
        let tool = registry.get(&name).unwrap();
        assert_eq!(
            tool.requires_approval(),
            tool_requires_approval(&name),
            "approval flag mismatch for {name}"
        );
    }
}

#[tokio::test]
async fn write_edit_read_and_search_a_file() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    let tools = ToolRegistry::with_builtins();

    let written = tools
        .dispatch(
            "write_file",
            json!({"file_path": "src/app.py", "content": "def greet():\n    return 'hi'\n"}),
            &ctx,
        )
        .await;
    assert!(written.success, "{:?}", written.error);

    let edited = tools
        .dispatch(
            "edit_file",
            json!({"file_path": "src/app.py", "search_text": "'hi'", "replace_text": "'hello'"}),
            &ctx,
        )
        .await;
    assert!(edited.success, "{:?}", edited.error);
    assert!(edited.output.contains("+    return 'hello'"));

    let read = tools
        .dispatch("read_file", json!({"file_path": "src/app.py", "start_line": 2, "end_line": 2}), &ctx)
        .await;
    assert!(read.output.contains("return 'hello'"));
    assert!(!read.output.contains("def greet"));

    let grep = tools
        .dispatch("grep_search", json!({"pattern": "hello", "file_pattern": "*.py"}), &ctx)
        .await;
    assert!(grep.success);
    assert!(grep.output.contains("app.py:2:"), "{}", grep.output);
}

#[tokio::test]
async fn rejected_approval_blocks_side_effects() {
    let tmp = TempDir::new().unwrap();
    let (ctx, prompter) = gated(context(&tmp), ApprovalDecision::Rejected);
    let tools = ToolRegistry::with_builtins();

    let result = tools
        .dispatch("write_file", json!({"file_path": "x.txt", "content": "data"}), &ctx)
        .await;
    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Tool execution rejected by user: write_file")
    );
    assert!(!tmp.path().join("x.txt").exists());

    // Read-only tools never ask.
    tools.dispatch("list_directory", json!({}), &ctx).await;
    assert_eq!(prompter.asked.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn always_approve_is_remembered_per_tool() {
    let tmp = TempDir::new().unwrap();
    let (ctx, prompter) = gated(context(&tmp), ApprovalDecision::AlwaysApprove);
    let tools = ToolRegistry::with_builtins();

    for n in 0..3 {
        let result = tools
            .dispatch(
                "write_file",
                json!({"file_path": format!("f{n}.txt"), "content": "data"}),
                &ctx,
            )
            .await;
        assert!(result.success);
    }
    assert_eq!(prompter.asked.load(Ordering::SeqCst), 1);

    tools
        .dispatch("execute_shell", json!({"command": "echo hi"}), &ctx)
        .await;
    assert_eq!(prompter.asked.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn writes_outside_workspace_are_refused() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);

    let result = ToolRegistry::with_builtins()
        .dispatch(
            "write_file",
            json!({"file_path": "../outside.txt", "content": "nope"}),
            &ctx,
        )
        .await;
    assert!(!result.success);
    assert!(!tmp.path().parent().unwrap().join("outside.txt").exists());
}

#[tokio::test]
async fn blocked_shell_command_is_an_error_result() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);

    let result = ToolRegistry::with_builtins()
        .dispatch("execute_shell", json!({"command": "sudo rm -rf /"}), &ctx)
        .await;
    assert!(!result.success);
    let content: Value = serde_json::from_str(&result.to_model_content()).unwrap();
    assert!(content["error"].is_string());
}

#[tokio::test]
async fn memory_survives_a_new_context() {
    let tmp = TempDir::new().unwrap();
    let tools = ToolRegistry::with_builtins();

    let stored = tools
        .dispatch(
            "memory",
            json!({"operation": "store", "key": "style", "value": "tabs"}),
            &context(&tmp),
        )
        .await;
    assert!(stored.success, "{:?}", stored.error);

    let fetched = tools
        .dispatch(
            "memory",
            json!({"operation": "retrieve", "key": "style"}),
            &context(&tmp),
        )
        .await;
    assert!(fetched.output.contains("tabs"));
}

#[tokio::test]
async fn unknown_tool_is_an_error_result() {
    let tmp = TempDir::new().unwrap();
    let result = ToolRegistry::with_builtins()
        .dispatch("teleport", json!({}), &context(&tmp))
        .await;
    assert_eq!(result.error.as_deref(), Some("Unknown tool: teleport"));
}
