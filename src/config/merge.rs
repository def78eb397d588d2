use super::schema::*;
use crate::agent::definitions;
use crate::error::ConfigError;
use crate::provider::ModelSpec;
use crate::safety::defaults::default_blocklist;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

impl PartialConfig {
    /// Merge self with a lower-priority fallback.
    /// Self's non-None values take precedence.
    /// For blocked_patterns: REPLACE semantics (if self has Some, use it entirely).
    /// Agent entries merge field by field; model overrides merge by key.
    pub fn with_fallback(self, fallback: PartialConfig) -> PartialConfig {
        let mut agents = fallback.agents;
        for (name, entry) in self.agents {
            let merged = match agents.remove(&name) {
                Some(lower) => entry.with_fallback(lower),
                None => entry,
            };
            agents.insert(name, merged);
        }

        let mut agent_model_overrides = fallback.agent_model_overrides;
        agent_model_overrides.extend(self.agent_model_overrides);

        PartialConfig {
            app_name: self.app_name.or(fallback.app_name),
            debug: self.debug.or(fallback.debug),
            log_level: self.log_level.or(fallback.log_level),
            default_model: self.default_model.or(fallback.default_model),
            default_temperature: self.default_temperature.or(fallback.default_temperature),
            model_override: self.model_override.or(fallback.model_override),
            workspace: self.workspace.or(fallback.workspace),
            agents_file: self.agents_file.or(fallback.agents_file),
            log_dir: self.log_dir.or(fallback.log_dir),
            memory_db_path: self.memory_db_path.or(fallback.memory_db_path),
            auto_approve: self.auto_approve.or(fallback.auto_approve),
            ollama_base_url: self.ollama_base_url.or(fallback.ollama_base_url),
            openai_api_key: self.openai_api_key.or(fallback.openai_api_key),
            anthropic_api_key: self.anthropic_api_key.or(fallback.anthropic_api_key),
            gemini_api_key: self.gemini_api_key.or(fallback.gemini_api_key),
            openrouter_api_key: self.openrouter_api_key.or(fallback.openrouter_api_key),
            shell_timeout_secs: self.shell_timeout_secs.or(fallback.shell_timeout_secs),
            blocked_patterns: self.blocked_patterns.or(fallback.blocked_patterns),
            security_log_path: self.security_log_path.or(fallback.security_log_path),
            max_delegation_depth: self.max_delegation_depth.or(fallback.max_delegation_depth),
            max_delegation_total: self.max_delegation_total.or(fallback.max_delegation_total),
            agents,
            agent_model_overrides,
        }
    }

    /// Convert to AppConfig, filling any remaining gaps with defaults and
    /// validating value ranges.
    pub fn finalize(self) -> Result<AppConfig, ConfigError> {
        let workspace = self.workspace.unwrap_or_else(|| PathBuf::from("."));
        let log_dir = within(&workspace, self.log_dir, ".omni/logs");
        let memory_db_path = within(&workspace, self.memory_db_path, ".omni/memory.db");
        let security_log_path =
            within(&workspace, self.security_log_path, ".omni/security.log");
        let agents_file = self.agents_file.map(|p| resolve(&workspace, p));
        let agent_model_overrides = known_overrides(self.agent_model_overrides, &self.agents);

        let config = AppConfig {
            app_name: self
                .app_name
                .unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            debug: self.debug.unwrap_or(false),
            log_level: self
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            default_model: self
                .default_model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            default_temperature: self.default_temperature.unwrap_or(DEFAULT_TEMPERATURE),
            model_override: self.model_override,
            workspace,
            log_dir,
            memory_db_path,
            auto_approve: self.auto_approve.unwrap_or(false),
            providers: ProviderSettings {
                ollama_base_url: self
                    .ollama_base_url
                    .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
                openai_api_key: non_empty(self.openai_api_key),
                anthropic_api_key: non_empty(self.anthropic_api_key),
                gemini_api_key: non_empty(self.gemini_api_key),
                openrouter_api_key: non_empty(self.openrouter_api_key),
            },
            shell_timeout_secs: self
                .shell_timeout_secs
                .unwrap_or(DEFAULT_SHELL_TIMEOUT_SECS),
            blocked_patterns: self.blocked_patterns.unwrap_or_else(default_blocklist),
            security_log_path,
            max_delegation_depth: self
                .max_delegation_depth
                .unwrap_or(DEFAULT_MAX_DELEGATION_DEPTH),
            max_delegation_total: self
                .max_delegation_total
                .unwrap_or(DEFAULT_MAX_DELEGATION_TOTAL),
            agents: self.agents,
            agent_model_overrides,
            agents_file,
        };

        validate(&config)?;
        Ok(config)
    }
}

/// Keep `<NAME>_MODEL` overrides for built-in or configured agents only;
/// unrelated `*_MODEL` variables in the environment are ignored.
fn known_overrides(
    overrides: BTreeMap<String, String>,
    agents: &BTreeMap<String, AgentEntry>,
) -> BTreeMap<String, String> {
    overrides
        .into_iter()
        .filter(|(name, _)| {
            let known = definitions::builtin(name).is_some() || agents.contains_key(name);
            if !known {
                tracing::debug!(name = %name, "Ignoring model override for unknown agent");
            }
            known
        })
        .collect()
}

fn resolve(workspace: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        workspace.join(path)
    }
}

fn within(workspace: &Path, path: Option<PathBuf>, default: &str) -> PathBuf {
    match path {
        Some(p) => resolve(workspace, p),
        None => workspace.join(default),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_temperature(field: &str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=2.0).contains(&value) {
        return Err(invalid(field, format!("{value} is outside 0.0..=2.0")));
    }
    Ok(())
}

/// Range checks for the resolved config and every configured agent entry.
pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    validate_temperature("default_temperature", config.default_temperature)?;
    ModelSpec::parse(&config.default_model)?;
    if let Some(model) = &config.model_override {
        ModelSpec::parse(model)?;
    }

    if config.shell_timeout_secs == 0 {
        return Err(invalid("shell_timeout_secs", "must be greater than 0"));
    }
    if config.max_delegation_depth == 0 {
        return Err(invalid("delegation.max_depth", "must be greater than 0"));
    }

    for (name, entry) in &config.agents {
        validate_agent_entry(name, entry)?;
    }
    validate_overrides(&config.agent_model_overrides)
}

pub fn validate_agent_entry(name: &str, entry: &AgentEntry) -> Result<(), ConfigError> {
    let field = |f: &str| format!("agents.{name}.{f}");

    if let Some(model) = &entry.model {
        ModelSpec::parse(model)?;
    }
    for model in entry.fallback_models.iter().flatten() {
        ModelSpec::parse(model)?;
    }
    if let Some(t) = entry.temperature {
        validate_temperature(&field("temperature"), t)?;
    }
    if entry.max_tokens == Some(0) {
        return Err(invalid(field("max_tokens"), "must be greater than 0"));
    }
    if entry.timeout == Some(0) {
        return Err(invalid(field("timeout"), "must be greater than 0"));
    }
    if entry.max_turns == Some(0) {
        return Err(invalid(field("max_turns"), "must be greater than 0"));
    }
    Ok(())
}

fn validate_overrides(overrides: &BTreeMap<String, String>) -> Result<(), ConfigError> {
    for model in overrides.values() {
        ModelSpec::parse(model)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(model: &str) -> AgentEntry {
        AgentEntry {
            model: Some(model.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn higher_layer_wins_scalar_fields() {
        let high = PartialConfig {
            default_model: Some("gpt-4o".into()),
            ..Default::default()
        };
        let low = PartialConfig {
            default_model: Some("ollama:mistral".into()),
            shell_timeout_secs: Some(10),
            ..Default::default()
        };
        let merged = high.with_fallback(low);
        assert_eq!(merged.default_model.as_deref(), Some("gpt-4o"));
        assert_eq!(merged.shell_timeout_secs, Some(10));
    }

    #[test]
    fn agent_entries_merge_field_by_field() {
        let mut high = PartialConfig::default();
        high.agents.insert(
            "file_editor".into(),
            AgentEntry {
                temperature: Some(0.2),
                ..Default::default()
            },
        );
        let mut low = PartialConfig::default();
        low.agents.insert("file_editor".into(), entry("ollama:qwen2.5-coder"));
        low.agents.insert("testing".into(), entry("gpt-4o-mini"));

        let merged = high.with_fallback(low);
        let editor = &merged.agents["file_editor"];
        assert_eq!(editor.model.as_deref(), Some("ollama:qwen2.5-coder"));
        assert_eq!(editor.temperature, Some(0.2));
        assert!(merged.agents.contains_key("testing"));
    }

    #[test]
    fn finalize_fills_defaults() {
        let config = PartialConfig::default().finalize().unwrap();
        assert_eq!(config.app_name, "omni");
        assert_eq!(config.default_model, "ollama:mistral");
        assert_eq!(config.default_temperature, 0.7);
        assert_eq!(config.providers.ollama_base_url, "http://localhost:11434/v1");
        assert_eq!(config.shell_timeout_secs, 30);
        assert_eq!(config.max_delegation_depth, 3);
        assert_eq!(config.max_delegation_total, 20);
        assert!(!config.auto_approve);
        assert_eq!(config.log_dir, PathBuf::from(".").join(".omni/logs"));
        assert!(!config.blocked_patterns.is_empty());
    }

    #[test]
    fn blank_api_keys_are_dropped() {
        let partial = PartialConfig {
            openai_api_key: Some("  ".into()),
            ..Default::default()
        };
        let config = partial.finalize().unwrap();
        assert!(config.providers.openai_api_key.is_none());
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let mut partial = PartialConfig::default();
        partial.agents.insert(
            "default".into(),
            AgentEntry {
                temperature: Some(2.5),
                ..Default::default()
            },
        );
        let err = partial.finalize().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "agents.default.temperature"));
    }

    #[test]
    fn zero_limits_are_rejected() {
        for bad in [
            AgentEntry {
                max_tokens: Some(0),
                ..Default::default()
            },
            AgentEntry {
                timeout: Some(0),
                ..Default::default()
            },
            AgentEntry {
                max_turns: Some(0),
                ..Default::default()
            },
        ] {
            assert!(validate_agent_entry("x", &bad).is_err());
        }
    }

    #[test]
    fn model_overrides_for_unknown_agents_are_ignored() {
        let mut agents = BTreeMap::new();
        agents.insert("reviewer".to_string(), entry("ollama:qwen2.5-coder"));
        let config = PartialConfig {
            agents,
            agent_model_overrides: [
                ("foo", "openai:"),
                ("reviewer", "gpt-4o"),
                ("file_editor", "ollama:granite3.3:8b"),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
            ..Default::default()
        }
        .finalize()
        .unwrap();

        assert!(!config.agent_model_overrides.contains_key("foo"));
        assert_eq!(config.agent_model_overrides["reviewer"], "gpt-4o");
        assert_eq!(config.agent_model_overrides["file_editor"], "ollama:granite3.3:8b");
    }

    #[test]
    fn bad_override_for_known_agent_is_still_rejected() {
        let config = PartialConfig {
            agent_model_overrides: [("testing".to_string(), "ollama:".to_string())].into(),
            ..Default::default()
        };
        assert!(matches!(config.finalize(), Err(ConfigError::InvalidModel(_))));
    }

    #[test]
    fn empty_model_is_rejected() {
        let partial = PartialConfig {
            default_model: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            partial.finalize(),
            Err(ConfigError::InvalidModel(_))
        ));
    }
}
