//! Human-in-the-loop approval for tools with side effects.

use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

/// Tools that need approval before running.
pub const TOOLS_REQUIRING_APPROVAL: [&str; 4] = ["write_file", "edit_file", "execute_shell", "fetch_url"];

pub fn tool_requires_approval(name: &str) -> bool {
    TOOLS_REQUIRING_APPROVAL.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
    /// Approve this call and every later call of the same tool this session.
    AlwaysApprove,
}

impl ApprovalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::AlwaysApprove => "always_approve",
        }
    }
}

/// Asks someone whether a tool call may proceed.
#[async_trait]
pub trait ApprovalPrompter: Send + Sync {
    async fn ask(&self, tool: &str, args: &Value) -> ApprovalDecision;
}

/// Session-scoped approval state.
pub struct ApprovalGate {
    auto_approve: bool,
    prompter: Option<Arc<dyn ApprovalPrompter>>,
    always_approved: Mutex<HashSet<String>>,
}

impl ApprovalGate {
    /// A gate that approves everything.
    pub fn auto() -> Self {
        Self {
            auto_approve: true,
            prompter: None,
            always_approved: Mutex::new(HashSet::new()),
        }
    }

    pub fn new(auto_approve: bool, prompter: Option<Arc<dyn ApprovalPrompter>>) -> Self {
        Self {
            auto_approve,
            prompter,
            always_approved: Mutex::new(HashSet::new()),
        }
    }

    fn is_always_approved(&self, tool: &str) -> bool {
        self.always_approved
            .lock()
            .map(|set| set.contains(tool))
            .unwrap_or(false)
    }

    /// Decide whether `tool` may run with `args`. Never returns
    /// `AlwaysApprove`; that answer is remembered and reported as `Approved`.
    pub async fn request(&self, tool: &str, args: &Value) -> ApprovalDecision {
        if self.auto_approve || self.is_always_approved(tool) {
            return ApprovalDecision::Approved;
        }

        let Some(prompter) = &self.prompter else {
            return ApprovalDecision::Approved;
        };

        match prompter.ask(tool, args).await {
            ApprovalDecision::AlwaysApprove => {
                if let Ok(mut set) = self.always_approved.lock() {
                    set.insert(tool.to_string());
                }
                tracing::info!(tool, "Tool approved for the rest of the session");
                ApprovalDecision::Approved
            }
            decision => decision,
        }
    }

    pub fn clear_always_approved(&self) {
        if let Ok(mut set) = self.always_approved.lock() {
            set.clear();
        }
    }
}

/// Prompts on the terminal: `[y]es / [n]o / [a]lways`.
pub struct StdinPrompter;

#[async_trait]
impl ApprovalPrompter for StdinPrompter {
    async fn ask(&self, tool: &str, args: &Value) -> ApprovalDecision {
        let summary = serde_json::to_string_pretty(args).unwrap_or_else(|_| args.to_string());
        let prompt = format!("\n[approval] {tool} wants to run with:\n{summary}\nAllow? [y]es / [n]o / [a]lways: ");

        let answer = tokio::task::spawn_blocking(move || {
            eprint!("{prompt}");
            std::io::stderr().flush().ok();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => parse_answer(&line),
            _ => ApprovalDecision::Rejected,
        }
    }
}

fn parse_answer(line: &str) -> ApprovalDecision {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => ApprovalDecision::Approved,
        "a" | "always" => ApprovalDecision::AlwaysApprove,
        _ => ApprovalDecision::Rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        answer: ApprovalDecision,
        asked: AtomicUsize,
    }

    #[async_trait]
    impl ApprovalPrompter for Scripted {
        async fn ask(&self, _tool: &str, _args: &Value) -> ApprovalDecision {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    fn scripted(answer: ApprovalDecision) -> Arc<Scripted> {
        Arc::new(Scripted {
            answer,
            asked: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn no_prompter_approves() {
        let gate = ApprovalGate::new(false, None);
        assert_eq!(
            gate.request("write_file", &Value::Null).await,
            ApprovalDecision::Approved
        );
    }

    #[tokio::test]
    async fn rejection_is_reported() {
        let prompter = scripted(ApprovalDecision::Rejected);
        let gate = ApprovalGate::new(false, Some(prompter.clone() as Arc<dyn ApprovalPrompter>));
        assert_eq!(
            gate.request("execute_shell", &Value::Null).await,
            ApprovalDecision::Rejected
        );
        assert_eq!(prompter.asked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn always_approve_is_remembered_per_tool() {
        let prompter = scripted(ApprovalDecision::AlwaysApprove);
        let gate = ApprovalGate::new(false, Some(prompter.clone() as Arc<dyn ApprovalPrompter>));

        for _ in 0..3 {
            assert_eq!(
                gate.request("edit_file", &Value::Null).await,
                ApprovalDecision::Approved
            );
        }
        assert_eq!(prompter.asked.load(Ordering::SeqCst), 1);

        gate.request("write_file", &Value::Null).await;
        assert_eq!(prompter.asked.load(Ordering::SeqCst), 2);

        gate.clear_always_approved();
        gate.request("edit_file", &Value::Null).await;
        assert_eq!(prompter.asked.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn auto_approve_skips_prompter() {
        let prompter = scripted(ApprovalDecision::Rejected);
        let gate = ApprovalGate::new(true, Some(prompter.clone() as Arc<dyn ApprovalPrompter>));
        assert_eq!(
            gate.request("fetch_url", &Value::Null).await,
            ApprovalDecision::Approved
        );
        assert_eq!(prompter.asked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn answers_parse() {
        assert_eq!(parse_answer("Y\n"), ApprovalDecision::Approved);
        assert_eq!(parse_answer("always"), ApprovalDecision::AlwaysApprove);
        assert_eq!(parse_answer(""), ApprovalDecision::Rejected);
        assert!(tool_requires_approval("execute_shell"));
        assert!(!tool_requires_approval("read_file"));
    }
}
