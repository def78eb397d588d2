//! Resolves agent definitions from built-ins, configuration and overrides.

use std::collections::BTreeMap;

use super::definitions::{self, BUILTIN_AGENTS};
use crate::config::{
    AgentEntry, AppConfig, DEFAULT_AGENT_TIMEOUT_SECS, DEFAULT_MAX_TOKENS, DEFAULT_MAX_TURNS,
};
use crate::error::AgentError;
use crate::provider::ModelSpec;

const CUSTOM_AGENT_PROMPT: &str = "You are a helpful AI assistant.";

/// A fully resolved agent, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    pub name: String,
    pub description: String,
    pub model: ModelSpec,
    pub fallback_models: Vec<ModelSpec>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub timeout_secs: u64,
    pub retries: u32,
    pub max_turns: u32,
    pub tools: Vec<String>,
    pub builtin: bool,
}

impl AgentSpec {
    /// Primary model first, then fallbacks in configured order.
    pub fn model_chain(&self) -> impl Iterator<Item = &ModelSpec> {
        std::iter::once(&self.model).chain(self.fallback_models.iter())
    }

    /// Replace the primary model (the `--model` flag for the active agent).
    pub fn with_model(mut self, raw: &str) -> Result<Self, AgentError> {
        self.model = ModelSpec::parse(raw)?;
        Ok(self)
    }
}

/// Builds [`AgentSpec`]s from the resolved configuration.
#[derive(Debug, Clone)]
pub struct AgentFactory {
    default_model: String,
    default_temperature: f32,
    entries: BTreeMap<String, AgentEntry>,
    model_overrides: BTreeMap<String, String>,
}

impl AgentFactory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            default_model: config.default_model.clone(),
            default_temperature: config.default_temperature,
            entries: config.agents.clone(),
            model_overrides: config.agent_model_overrides.clone(),
        }
    }

    /// Built-in names in definition order, then custom configured names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = BUILTIN_AGENTS.iter().map(|a| a.name.to_string()).collect();
        for name in self.entries.keys() {
            if definitions::builtin(name).is_none() {
                names.push(name.clone());
            }
        }
        names
    }

    pub fn has(&self, name: &str) -> bool {
        definitions::builtin(name).is_some() || self.entries.contains_key(name)
    }

    /// Resolve one agent.
    ///
    /// Model precedence: `<NAME>_MODEL` override, then the configured entry,
    /// then the default model. Other fields come from the configured entry,
    /// then the built-in definition, then global defaults.
    pub fn resolve(&self, name: &str) -> Result<AgentSpec, AgentError> {
        let builtin = definitions::builtin(name);
        let entry = self.entries.get(name);

        if builtin.is_none() && entry.is_none() {
            return Err(AgentError::NotFound {
                name: name.to_string(),
                available: self.names().join(", "),
            });
        }
        let entry = entry.cloned().unwrap_or_default();

        let raw_model = self
            .model_overrides
            .get(name)
            .cloned()
            .or(entry.model)
            .unwrap_or_else(|| self.default_model.clone());
        let model = ModelSpec::parse(&raw_model)?;

        let fallback_models = entry
            .fallback_models
            .unwrap_or_default()
            .iter()
            .map(|raw| ModelSpec::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let description = entry.description.unwrap_or_else(|| match builtin {
            Some(b) => b.description.to_string(),
            None => "Custom agent".to_string(),
        });
        let system_prompt = entry
            .system_prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| {
                builtin
                    .map(|b| b.system_prompt)
                    .unwrap_or(CUSTOM_AGENT_PROMPT)
                    .to_string()
            });
        let tools = entry.tools.unwrap_or_else(|| {
            builtin
                .map(|b| b.tools.iter().map(|t| t.to_string()).collect())
                .unwrap_or_default()
        });

        Ok(AgentSpec {
            name: name.to_string(),
            description,
            model,
            fallback_models,
            temperature: entry.temperature.unwrap_or(self.default_temperature),
            max_tokens: entry.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system_prompt,
            timeout_secs: entry.timeout.unwrap_or(DEFAULT_AGENT_TIMEOUT_SECS),
            retries: entry
                .retries
                .unwrap_or_else(|| builtin.map(|b| b.retries).unwrap_or(crate::config::DEFAULT_RETRIES)),
            max_turns: entry.max_turns.unwrap_or(DEFAULT_MAX_TURNS),
            tools,
            builtin: builtin.is_some(),
        })
    }

    /// Resolve every known agent.
    pub fn list(&self) -> Result<Vec<AgentSpec>, AgentError> {
        self.names().iter().map(|name| self.resolve(name)).collect()
    }
}
