use std::collections::BTreeMap;

use super::factory::AgentSpec;
use crate::error::AgentError;

/// Named agents available to a session.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, AgentSpec>,
    order: Vec<String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: AgentSpec) -> Result<(), AgentError> {
        if self.agents.contains_key(&spec.name) {
            return Err(AgentError::AlreadyRegistered(spec.name));
        }
        tracing::debug!(agent = %spec.name, model = %spec.model, "Registered agent");
        self.order.push(spec.name.clone());
        self.agents.insert(spec.name.clone(), spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&AgentSpec, AgentError> {
        self.agents.get(name).ok_or_else(|| AgentError::NotFound {
            name: name.to_string(),
            available: self.list().join(", "),
        })
    }

    /// Agent names in registration order.
    pub fn list(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn specs(&self) -> impl Iterator<Item = &AgentSpec> {
        self.order.iter().filter_map(|name| self.agents.get(name))
    }

    pub fn unregister(&mut self, name: &str) -> Result<AgentSpec, AgentError> {
        let spec = self.agents.remove(name).ok_or_else(|| AgentError::NotFound {
            name: name.to_string(),
            available: self.list().join(", "),
        })?;
        self.order.retain(|n| n != name);
        tracing::debug!(agent = name, "Unregistered agent");
        Ok(spec)
    }

    pub fn clear(&mut self) {
        let count = self.agents.len();
        self.agents.clear();
        self.order.clear();
        tracing::debug!(count, "Cleared agent registry");
    }

    pub fn has(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ModelSpec;

    fn spec(name: &str) -> AgentSpec {
        AgentSpec {
            name: name.to_string(),
            description: String::new(),
            model: ModelSpec::parse("ollama:mistral").unwrap(),
            fallback_models: Vec::new(),
            temperature: 0.7,
            max_tokens: 4096,
            system_prompt: "You are a test.".to_string(),
            timeout_secs: 300,
            retries: 2,
            max_turns: 20,
            tools: Vec::new(),
            builtin: false,
        }
    }

    #[test]
    fn register_and_get() {
        let mut registry = AgentRegistry::new();
        registry.register(spec("a")).unwrap();
        assert!(registry.has("a"));
        assert_eq!(registry.get("a").unwrap().name, "a");
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = AgentRegistry::new();
        registry.register(spec("a")).unwrap();
        let err = registry.register(spec("a")).unwrap_err();
        assert_eq!(err.to_string(), "Agent 'a' is already registered");
    }

    #[test]
    fn missing_agent_lists_available_names() {
        let mut registry = AgentRegistry::new();
        registry.register(spec("alpha")).unwrap();
        registry.register(spec("beta")).unwrap();

        let err = registry.get("gamma").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Agent 'gamma' not found. Available agents: alpha, beta"
        );
    }

    #[test]
    fn list_keeps_registration_order() {
        let mut registry = AgentRegistry::new();
        registry.register(spec("zeta")).unwrap();
        registry.register(spec("alpha")).unwrap();
        assert_eq!(registry.list(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn unregister_and_clear() {
        let mut registry = AgentRegistry::new();
        registry.register(spec("a")).unwrap();
        registry.register(spec("b")).unwrap();

        registry.unregister("a").unwrap();
        assert!(!registry.has("a"));
        assert!(registry.unregister("a").is_err());
        assert_eq!(registry.list(), vec!["b"]);

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.list().is_empty());
    }
}
