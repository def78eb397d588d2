use async_trait::async_trait;
use omni::agent::Runtime;
use omni::config::PartialConfig;
use omni::error::AgentError;
use omni::orchestration::{DelegationManager, DelegationStatus, agent_for_tool, summarize};
use omni::tools::{Delegator, ToolContext, ToolRegistry};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Records every delegation and answers with a canned reply.
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(String, String)>>,
    fail: bool,
}

#[async_trait]
impl Delegator for Recorder {
    async fn delegate(
        &self,
        _ctx: &ToolContext,
        agent: &str,
        prompt: String,
    ) -> Result<String, AgentError> {
        self.calls
            .lock()
            .unwrap()
            .push((agent.to_string(), prompt));
        if self.fail {
            Err(AgentError::Timeout {
                agent: agent.to_string(),
                timeout_secs: 5,
            })
        } else {
            Ok(format!("{agent} done"))
        }
    }
}

fn runtime(tmp: &TempDir, depth: usize) -> Arc<Runtime> {
    let config = PartialConfig {
        workspace: Some(tmp.path().to_path_buf()),
        max_delegation_depth: Some(depth),
        ..Default::default()
    }
    .finalize()
    .unwrap();
    Runtime::new(config, None).unwrap()
}

fn ctx_with(rt: &Arc<Runtime>, delegator: Arc<dyn Delegator>) -> ToolContext {
    ToolContext {
        delegator: Some(delegator),
        ..rt.context("coordinator", rt.run_token())
    }
}

// ─── Delegation tools ────────────────────────────────────────────────

#[tokio::test]
async fn delegation_tools_route_to_specialists() {
    let tmp = TempDir::new().unwrap();
    let rt = runtime(&tmp, 3);
    let recorder = Arc::new(Recorder::default());
    let ctx = ctx_with(&rt, recorder.clone());
    let tools = ToolRegistry::with_builtins();

    let result = tools
        .dispatch(
            "search_code",
            json!({"query": "fn main", "file_pattern": "*.rs"}),
            &ctx,
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output, "Search results:\ncodebase_investigator done");

    let result = tools
        .dispatch(
            "generate_code",
            json!({"description": "a fizzbuzz", "language": "rust"}),
            &ctx,
        )
        .await;
    assert!(result.output.starts_with("Generated code:\n"));

    let calls = recorder.calls.lock().unwrap();
    assert_eq!(calls[0].0, "codebase_investigator");
    assert!(calls[0].1.contains("fn main"));
    assert!(calls[0].1.contains("*.rs"));
    assert_eq!(calls[1].0, "code_generator");
    assert!(calls[1].1.contains("rust"));
}

#[tokio::test]
async fn missing_required_argument_never_delegates() {
    let tmp = TempDir::new().unwrap();
    let rt = runtime(&tmp, 3);
    let recorder = Arc::new(Recorder::default());
    let ctx = ctx_with(&rt, recorder.clone());

    let result = ToolRegistry::with_builtins()
        .dispatch("edit_files", json!({"file_context": "src/lib.rs"}), &ctx)
        .await;
    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Missing required parameter: instructions")
    );
    assert!(recorder.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn specialist_failure_is_reported_to_coordinator() {
    let tmp = TempDir::new().unwrap();
    let rt = runtime(&tmp, 3);
    let recorder = Arc::new(Recorder {
        fail: true,
        ..Default::default()
    });
    let ctx = ctx_with(&rt, recorder);

    let result = ToolRegistry::with_builtins()
        .dispatch("write_docs", json!({"target": "README.md"}), &ctx)
        .await;
    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("Documentation failed: "));
}

#[tokio::test]
async fn runtime_rejects_delegation_beyond_depth() {
    let tmp = TempDir::new().unwrap();
    let rt = runtime(&tmp, 1);
    let (parent, token) = rt
        .delegations()
        .register("file_editor", "outer task", None)
        .unwrap();

    let ctx = ToolContext {
        agent: "file_editor".into(),
        delegation_id: Some(parent),
        cancel: token,
        ..rt.context("coordinator", rt.run_token())
    };

    let result = ToolRegistry::with_builtins()
        .dispatch("refactor_code", json!({"target": "src/lib.rs"}), &ctx)
        .await;
    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.starts_with("Refactoring failed: "), "{error}");
    assert!(error.contains("depth"), "{error}");
    assert_eq!(rt.delegations().total_count(), 1);
}

#[tokio::test]
async fn runtime_rejects_delegation_after_shutdown() {
    let tmp = TempDir::new().unwrap();
    let rt = runtime(&tmp, 3);
    let ctx = rt.context("coordinator", rt.run_token());
    rt.shutdown();

    let err = rt
        .delegate(&ctx, "testing", "write tests".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::DelegationRejected(_)));
}

#[test]
fn tool_names_map_to_agents() {
    assert_eq!(agent_for_tool("analyze_codebase"), Some("codebase_investigator"));
    assert_eq!(agent_for_tool("write_tests"), Some("testing"));
    assert_eq!(agent_for_tool("read_file"), None);
}

#[test]
fn summaries_are_cut_at_200_chars() {
    assert_eq!(summarize("short"), "short");
    let long = "é".repeat(201);
    let summary = summarize(&long);
    assert!(summary.ends_with("..."));
    assert_eq!(summary.chars().count(), 203);
}

// ─── Delegation manager ──────────────────────────────────────────────

#[test]
fn cancelling_a_parent_cancels_its_subtree() {
    let manager = DelegationManager::new(CancellationToken::new(), 3, 10);
    let (root, root_token) = manager.register("coordinator", "plan", None).unwrap();
    let (child, child_token) = manager.register("file_editor", "edit", Some(&root)).unwrap();
    let (sibling, sibling_token) = manager.register("testing", "test", None).unwrap();

    assert!(manager.cancel(&root));
    assert!(root_token.is_cancelled());
    assert!(child_token.is_cancelled());
    assert!(!sibling_token.is_cancelled());

    assert_eq!(manager.get(&child).unwrap().status, DelegationStatus::Cancelled);
    assert_eq!(manager.get(&sibling).unwrap().status, DelegationStatus::Running);
    assert_eq!(manager.children_of(&root).len(), 1);
}

#[test]
fn first_terminal_status_sticks() {
    let manager = DelegationManager::new(CancellationToken::new(), 3, 10);
    let (id, _) = manager.register("testing", "run tests", None).unwrap();

    assert!(manager.complete(&id, "all green".into()));
    assert!(!manager.fail(&id, "late failure".into()));
    assert_eq!(manager.get(&id).unwrap().status, DelegationStatus::Completed);
    assert_eq!(manager.result(&id).as_deref(), Some("all green"));
    assert!(manager.get(&id).unwrap().completed_at.is_some());
}

#[test]
fn total_limit_counts_the_whole_session() {
    let manager = DelegationManager::new(CancellationToken::new(), 3, 2);
    let (a, _) = manager.register("testing", "a", None).unwrap();
    manager.complete(&a, "ok".into());
    manager.register("testing", "b", None).unwrap();

    let err = manager.register("testing", "c", None).unwrap_err();
    assert!(matches!(err, AgentError::DelegationRejected(_)));
    assert_eq!(manager.total_count(), 2);
}

#[test]
fn shutdown_cancels_everything() {
    let manager = DelegationManager::new(CancellationToken::new(), 3, 10);
    let (a, token_a) = manager.register("testing", "a", None).unwrap();
    let (_, token_b) = manager.register("file_editor", "b", Some(&a)).unwrap();

    manager.shutdown_all();
    assert!(token_a.is_cancelled() && token_b.is_cancelled());
    assert!(manager.list_all().iter().all(|d| d.status == DelegationStatus::Cancelled));
    assert!(manager.register("testing", "late", None).is_err());
}
