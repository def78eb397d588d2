//! Registry of delegated agent runs.
//!
//! [`DelegationManager`] records every delegated run of a session as a tree:
//! each run knows its parent, its depth and its status. Limits on depth and
//! on the total number of delegations are enforced at registration.
//!
//! Each entry holds a [`CancellationToken`] that is a child of its parent's
//! token (or of the root token for top-level delegations), so cancelling a
//! run also cancels everything it delegated.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::types::{DelegationId, DelegationInfo, DelegationStatus};
use crate::error::AgentError;

struct DelegationEntry {
    info: DelegationInfo,
    cancel_token: CancellationToken,
    result: Option<String>,
}

/// Shared, cloneable handle to the delegation tree of one session.
#[derive(Clone)]
pub struct DelegationManager {
    entries: Arc<Mutex<HashMap<DelegationId, DelegationEntry>>>,
    root_cancel_token: CancellationToken,
    max_depth: usize,
    max_total: usize,
}

impl DelegationManager {
    pub fn new(root_cancel_token: CancellationToken, max_depth: usize, max_total: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            root_cancel_token,
            max_depth,
            max_total,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<DelegationId, DelegationEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn root_token(&self) -> &CancellationToken {
        &self.root_cancel_token
    }

    /// Register a new run of `agent` under `parent_id`.
    ///
    /// Returns the new id and the run's cancellation token. Fails with
    /// [`AgentError::DelegationRejected`] when a limit would be exceeded, the
    /// parent is unknown, or the session is shutting down.
    pub fn register(
        &self,
        agent: &str,
        task: &str,
        parent_id: Option<&str>,
    ) -> Result<(DelegationId, CancellationToken), AgentError> {
        if self.root_cancel_token.is_cancelled() {
            return Err(AgentError::DelegationRejected(
                "session is shutting down".to_string(),
            ));
        }

        let mut entries = self.entries();

        if entries.len() >= self.max_total {
            return Err(AgentError::DelegationRejected(format!(
                "max total delegations reached ({}/{})",
                entries.len(),
                self.max_total
            )));
        }

        let (depth, cancel_token) = match parent_id {
            Some(pid) => match entries.get(pid) {
                Some(parent) => (parent.info.depth + 1, parent.cancel_token.child_token()),
                None => {
                    return Err(AgentError::DelegationRejected(format!(
                        "parent delegation not found: {pid}"
                    )));
                }
            },
            None => (1, self.root_cancel_token.child_token()),
        };

        if depth > self.max_depth {
            return Err(AgentError::DelegationRejected(format!(
                "max delegation depth exceeded ({depth} > {})",
                self.max_depth
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let info = DelegationInfo {
            id: id.clone(),
            agent: agent.to_string(),
            task: task.to_string(),
            parent_id: parent_id.map(str::to_string),
            status: DelegationStatus::Running,
            depth,
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
        };

        entries.insert(
            id.clone(),
            DelegationEntry {
                info,
                cancel_token: cancel_token.clone(),
                result: None,
            },
        );

        tracing::debug!(id = %id, agent, depth, "Delegation registered");
        Ok((id, cancel_token))
    }

    /// Move a running entry to a terminal status. Entries that already
    /// finished keep their first terminal status.
    fn finish(&self, id: &str, status: DelegationStatus, result: Option<String>) -> bool {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(id) else {
            return false;
        };
        if entry.info.status.is_terminal() {
            return false;
        }
        entry.info.status = status;
        entry.info.completed_at = Some(Utc::now().to_rfc3339());
        if result.is_some() {
            entry.result = result;
        }
        true
    }

    pub fn complete(&self, id: &str, result: String) -> bool {
        self.finish(id, DelegationStatus::Completed, Some(result))
    }

    pub fn fail(&self, id: &str, message: String) -> bool {
        self.finish(id, DelegationStatus::Failed(message), None)
    }

    /// Cancel a run and, through its token, everything below it.
    ///
    /// Returns `true` if the entry exists.
    pub fn cancel(&self, id: &str) -> bool {
        let token = {
            let entries = self.entries();
            match entries.get(id) {
                Some(entry) => entry.cancel_token.clone(),
                None => return false,
            }
        };
        token.cancel();

        let mut entries = self.entries();
        let now = Utc::now().to_rfc3339();
        for entry in entries.values_mut() {
            if entry.cancel_token.is_cancelled() && !entry.info.status.is_terminal() {
                entry.info.status = DelegationStatus::Cancelled;
                entry.info.completed_at = Some(now.clone());
            }
        }
        true
    }

    /// Cancel the root token and mark every running entry cancelled.
    pub fn shutdown_all(&self) {
        self.root_cancel_token.cancel();

        let mut entries = self.entries();
        let now = Utc::now().to_rfc3339();
        for entry in entries.values_mut() {
            if entry.info.status == DelegationStatus::Running {
                entry.info.status = DelegationStatus::Cancelled;
                entry.info.completed_at = Some(now.clone());
            }
        }
        tracing::info!(total = entries.len(), "Delegations shut down");
    }

    pub fn get(&self, id: &str) -> Option<DelegationInfo> {
        self.entries().get(id).map(|e| e.info.clone())
    }

    pub fn result(&self, id: &str) -> Option<String> {
        self.entries().get(id).and_then(|e| e.result.clone())
    }

    /// All entries, oldest first.
    pub fn list_all(&self) -> Vec<DelegationInfo> {
        let mut all: Vec<DelegationInfo> = self.entries().values().map(|e| e.info.clone()).collect();
        all.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        all
    }

    pub fn children_of(&self, parent_id: &str) -> Vec<DelegationInfo> {
        self.list_all()
            .into_iter()
            .filter(|info| info.parent_id.as_deref() == Some(parent_id))
            .collect()
    }

    pub fn total_count(&self) -> usize {
        self.entries().len()
    }

    pub fn depth_of(&self, id: &str) -> Option<usize> {
        self.entries().get(id).map(|e| e.info.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_manager() -> DelegationManager {
        DelegationManager::new(CancellationToken::new(), 3, 10)
    }

    #[test]
    fn register_succeeds_within_limits() {
        let mgr = test_manager();
        let (id, _token) = mgr.register("file_editor", "edit a.txt", None).unwrap();

        let info = mgr.get(&id).unwrap();
        assert_eq!(info.agent, "file_editor");
        assert_eq!(info.depth, 1);
        assert_eq!(info.status, DelegationStatus::Running);
        assert!(info.completed_at.is_none());
        assert_eq!(mgr.total_count(), 1);
    }

    #[test]
    fn register_fails_when_max_total_exceeded() {
        let mgr = DelegationManager::new(CancellationToken::new(), 3, 2);
        mgr.register("a", "t", None).unwrap();
        mgr.register("b", "t", None).unwrap();

        let err = mgr.register("c", "t", None).unwrap_err();
        assert!(err.to_string().contains("max total delegations"), "{err}");
    }

    #[test]
    fn register_fails_when_max_depth_exceeded() {
        let mgr = DelegationManager::new(CancellationToken::new(), 2, 10);
        let (d1, _) = mgr.register("a", "t", None).unwrap();
        let (d2, _) = mgr.register("b", "t", Some(&d1)).unwrap();
        assert_eq!(mgr.depth_of(&d2), Some(2));

        let err = mgr.register("c", "t", Some(&d2)).unwrap_err();
        assert!(err.to_string().contains("max delegation depth"), "{err}");
    }

    #[test]
    fn register_fails_for_unknown_parent() {
        let mgr = test_manager();
        let err = mgr.register("a", "t", Some("nope")).unwrap_err();
        assert!(matches!(err, AgentError::DelegationRejected(_)));
    }

    #[test]
    fn complete_records_result_and_timestamp() {
        let mgr = test_manager();
        let (id, _) = mgr.register("a", "t", None).unwrap();

        assert!(mgr.complete(&id, "done".to_string()));
        let info = mgr.get(&id).unwrap();
        assert_eq!(info.status, DelegationStatus::Completed);
        assert!(info.completed_at.is_some());
        assert_eq!(mgr.result(&id).as_deref(), Some("done"));
    }

    #[test]
    fn terminal_status_is_not_overwritten() {
        let mgr = test_manager();
        let (id, _) = mgr.register("a", "t", None).unwrap();

        assert!(mgr.fail(&id, "boom".to_string()));
        assert!(!mgr.complete(&id, "late".to_string()));
        assert_eq!(
            mgr.get(&id).unwrap().status,
            DelegationStatus::Failed("boom".to_string())
        );
        assert!(mgr.result(&id).is_none());
    }

    #[test]
    fn cancel_cascades_to_children() {
        let mgr = test_manager();
        let (parent, parent_token) = mgr.register("coordinator", "t", None).unwrap();
        let (child, child_token) = mgr.register("file_editor", "t", Some(&parent)).unwrap();
        let (other, other_token) = mgr.register("testing", "t", None).unwrap();

        assert!(mgr.cancel(&parent));
        assert!(parent_token.is_cancelled());
        assert!(child_token.is_cancelled());
        assert!(!other_token.is_cancelled());

        assert_eq!(mgr.get(&child).unwrap().status, DelegationStatus::Cancelled);
        assert_eq!(mgr.get(&other).unwrap().status, DelegationStatus::Running);
        assert!(!mgr.cancel("missing"));
    }

    #[test]
    fn children_of_lists_direct_children_only() {
        let mgr = test_manager();
        let (root, _) = mgr.register("a", "t", None).unwrap();
        let (child, _) = mgr.register("b", "t", Some(&root)).unwrap();
        mgr.register("c", "t", Some(&child)).unwrap();

        let children = mgr.children_of(&root);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, child);
    }

    #[test]
    fn shutdown_all_cancels_everything_and_rejects_new_work() {
        let mgr = test_manager();
        let (done, _) = mgr.register("a", "t", None).unwrap();
        mgr.complete(&done, "ok".to_string());
        let (running, token) = mgr.register("b", "t", None).unwrap();

        mgr.shutdown_all();

        assert!(token.is_cancelled());
        assert_eq!(mgr.get(&running).unwrap().status, DelegationStatus::Cancelled);
        assert_eq!(mgr.get(&done).unwrap().status, DelegationStatus::Completed);
        assert!(mgr.register("c", "t", None).is_err());
    }
}
