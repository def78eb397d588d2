//! Agents: built-in definitions, resolution from configuration, the
//! registry of a session and the tool-calling runner.

pub mod definitions;
pub mod factory;
pub mod logging;
pub mod registry;
pub mod runner;
pub mod runtime;
pub mod system_prompt;

pub use factory::{AgentFactory, AgentSpec};
pub use registry::AgentRegistry;
pub use runner::AgentOutput;
pub use runtime::Runtime;
