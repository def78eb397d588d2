//! Shared vocabulary for delegated agent runs.

use serde::Serialize;

/// Unique identifier for a delegated run (UUID v4 string).
pub type DelegationId = String;

/// Lifecycle status of a delegated run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum DelegationStatus {
    Running,
    Completed,
    Failed(String),
    Cancelled,
}

impl DelegationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Snapshot of a delegated run. The live entry may change after this is taken.
#[derive(Clone, Debug, Serialize)]
pub struct DelegationInfo {
    pub id: DelegationId,
    /// Agent that carries out the work.
    pub agent: String,
    /// Prompt handed to the agent.
    pub task: String,
    pub parent_id: Option<DelegationId>,
    pub status: DelegationStatus,
    /// 1 for runs started by a top-level agent, parent depth + 1 below that.
    pub depth: usize,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// Outcome of [`super::delegate_task`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DelegationResult {
    pub success: bool,
    pub result: String,
    /// Specialist agents the coordinator actually invoked, in first-use order.
    pub agents_used: Vec<String>,
    pub task_summary: String,
}
