//! Session-wide state shared by every agent run.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::factory::{AgentFactory, AgentSpec};
use super::registry::AgentRegistry;
use super::runner::{AgentOutput, AgentRunner};
use crate::config::AppConfig;
use crate::error::AgentError;
use crate::orchestration::DelegationManager;
use crate::provider;
use crate::safety::SafetyLayer;
use crate::tools::approval::{ApprovalGate, ApprovalPrompter};
use crate::tools::{Delegator, ToolContext, ToolRegistry};

/// Owns the model client, tool set, agent registry and delegation tree of
/// one CLI session. Shared as `Arc<Runtime>` so tool calls can delegate back
/// into it.
pub struct Runtime {
    config: AppConfig,
    client: genai::Client,
    safety: Arc<SafetyLayer>,
    tools: ToolRegistry,
    approval: Arc<ApprovalGate>,
    agents: AgentRegistry,
    delegations: DelegationManager,
}

impl Runtime {
    pub fn new(
        config: AppConfig,
        prompter: Option<Arc<dyn ApprovalPrompter>>,
    ) -> anyhow::Result<Arc<Self>> {
        let safety = Arc::new(SafetyLayer::new(&config)?);
        let client = provider::build_client(&config.providers);
        let approval = Arc::new(ApprovalGate::new(config.auto_approve, prompter));

        let mut agents = AgentRegistry::new();
        for spec in AgentFactory::new(&config).list()? {
            agents.register(spec)?;
        }

        let delegations = DelegationManager::new(
            CancellationToken::new(),
            config.max_delegation_depth,
            config.max_delegation_total,
        );

        tracing::info!(
            agents = agents.len(),
            workspace = %safety.workspace_root().display(),
            "Runtime initialized"
        );

        Ok(Arc::new(Self {
            config,
            client,
            safety,
            tools: ToolRegistry::with_builtins(),
            approval,
            agents,
            delegations,
        }))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn safety(&self) -> &Arc<SafetyLayer> {
        &self.safety
    }

    pub fn delegations(&self) -> &DelegationManager {
        &self.delegations
    }

    /// A token for one top-level run; cancelled by [`Runtime::shutdown`].
    pub fn run_token(&self) -> CancellationToken {
        self.delegations.root_token().child_token()
    }

    /// The agent to run at top level, with `--model` applied.
    pub fn top_level_spec(&self, agent: &str) -> Result<AgentSpec, AgentError> {
        let spec = self.agents.get(agent)?.clone();
        match &self.config.model_override {
            Some(raw) => spec.with_model(raw),
            None => Ok(spec),
        }
    }

    /// Tool context for a top-level run of `agent`.
    pub fn context(self: &Arc<Self>, agent: &str, cancel: CancellationToken) -> ToolContext {
        ToolContext {
            safety: Arc::clone(&self.safety),
            approval: Arc::clone(&self.approval),
            memory_db: self.config.memory_db_path.clone(),
            agent: agent.to_string(),
            delegation_id: None,
            cancel,
            delegator: Some(Arc::clone(self) as Arc<dyn Delegator>),
        }
    }

    /// Run `agent` on `prompt` as a top-level (non-delegated) run.
    pub async fn run(
        self: &Arc<Self>,
        agent: &str,
        prompt: &str,
        cancel: CancellationToken,
        print_stream: bool,
    ) -> Result<AgentOutput, AgentError> {
        let spec = self.top_level_spec(agent)?;
        let ctx = self.context(agent, cancel);
        self.run_spec(&spec, prompt, &ctx, print_stream).await
    }

    pub(crate) async fn run_spec(
        &self,
        spec: &AgentSpec,
        prompt: &str,
        ctx: &ToolContext,
        print_stream: bool,
    ) -> Result<AgentOutput, AgentError> {
        let runner = AgentRunner {
            client: &self.client,
            tools: &self.tools,
            providers: &self.config.providers,
            log_dir: &self.config.log_dir,
            print_stream,
        };
        runner.run(spec, prompt, ctx).await
    }

    /// Cancel every running agent and delegation.
    pub fn shutdown(&self) {
        self.delegations.shutdown_all();
    }
}
