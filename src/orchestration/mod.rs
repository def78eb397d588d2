//! Delegation between agents.
//!
//! The coordinator reaches specialist agents through delegation tools
//! ([`delegation_tools`]); every delegated run is tracked by the
//! [`DelegationManager`] of the session.

mod delegation;
pub mod manager;
pub mod types;

pub use delegation::{DelegateTool, agent_for_tool, delegate_task, delegation_tools, summarize};
pub use manager::DelegationManager;
pub use types::{DelegationId, DelegationInfo, DelegationResult, DelegationStatus};
