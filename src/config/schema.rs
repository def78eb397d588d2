use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_APP_NAME: &str = "omni";
pub const DEFAULT_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_MODEL: &str = "ollama:mistral";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/v1";
pub const DEFAULT_SHELL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_DELEGATION_DEPTH: usize = 3;
pub const DEFAULT_MAX_DELEGATION_TOTAL: usize = 20;

pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_MAX_TURNS: u32 = 20;

/// The TOML file structure for omni.toml.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub general: Option<GeneralConfig>,
    pub providers: Option<ProvidersConfig>,
    pub safety: Option<SafetyConfig>,
    pub delegation: Option<DelegationConfig>,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentEntry>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    pub app_name: Option<String>,
    pub debug: Option<bool>,
    pub log_level: Option<String>,
    pub default_model: Option<String>,
    pub default_temperature: Option<f32>,
    pub workspace: Option<String>,
    /// YAML agents file, relative to the workspace unless absolute.
    pub agents_file: Option<String>,
    pub log_dir: Option<String>,
    pub memory_db: Option<String>,
    pub auto_approve: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ProvidersConfig {
    pub ollama_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SafetyConfig {
    pub shell_timeout_secs: Option<u64>,
    /// If specified, fully replaces the default blocklist.
    pub blocked_patterns: Option<Vec<BlocklistEntry>>,
    pub security_log: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DelegationConfig {
    pub max_depth: Option<usize>,
    pub max_total: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlocklistEntry {
    pub pattern: String,
    pub reason: String,
}

/// One agent's configuration as written in omni.toml or agents.yaml.
/// Every field is optional so entries from different layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_models: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The YAML agents file: `{debug, log_level, default_model, agents}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentEntry>,
}

/// Provider endpoints and credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub ollama_base_url: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            ollama_base_url: DEFAULT_OLLAMA_URL.to_string(),
            openai_api_key: None,
            anthropic_api_key: None,
            gemini_api_key: None,
            openrouter_api_key: None,
        }
    }
}

/// Fully-resolved runtime configuration. All fields have values.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub debug: bool,
    pub log_level: String,
    pub default_model: String,
    pub default_temperature: f32,
    /// Model forced for the active agent (`--model`).
    pub model_override: Option<String>,
    pub workspace: PathBuf,
    pub log_dir: PathBuf,
    pub memory_db_path: PathBuf,
    pub auto_approve: bool,
    pub providers: ProviderSettings,
    pub shell_timeout_secs: u64,
    pub blocked_patterns: Vec<(String, String)>,
    pub security_log_path: PathBuf,
    pub max_delegation_depth: usize,
    pub max_delegation_total: usize,
    pub agents: BTreeMap<String, AgentEntry>,
    /// `<AGENT>_MODEL` environment overrides, keyed by lowercase agent name.
    pub agent_model_overrides: BTreeMap<String, String>,
    /// Agents file that contributed to this config, if any.
    pub agents_file: Option<PathBuf>,
}

/// Partial config used during merge. All fields are Option so that
/// missing fields don't override lower-priority values.
#[derive(Debug, Clone, Default)]
pub struct PartialConfig {
    pub app_name: Option<String>,
    pub debug: Option<bool>,
    pub log_level: Option<String>,
    pub default_model: Option<String>,
    pub default_temperature: Option<f32>,
    pub model_override: Option<String>,
    pub workspace: Option<PathBuf>,
    pub agents_file: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub memory_db_path: Option<PathBuf>,
    pub auto_approve: Option<bool>,
    pub ollama_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub shell_timeout_secs: Option<u64>,
    pub blocked_patterns: Option<Vec<(String, String)>>,
    pub security_log_path: Option<PathBuf>,
    pub max_delegation_depth: Option<usize>,
    pub max_delegation_total: Option<usize>,
    pub agents: BTreeMap<String, AgentEntry>,
    pub agent_model_overrides: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Convert the parsed file into a PartialConfig. Relative paths are kept
    /// as written and resolved against the workspace at finalize time.
    pub fn to_partial(self) -> PartialConfig {
        let mut partial = PartialConfig {
            agents: self.agents,
            ..Default::default()
        };

        if let Some(general) = self.general {
            partial.app_name = general.app_name;
            partial.debug = general.debug;
            partial.log_level = general.log_level;
            partial.default_model = general.default_model;
            partial.default_temperature = general.default_temperature;
            partial.workspace = general.workspace.map(PathBuf::from);
            partial.agents_file = general.agents_file.map(PathBuf::from);
            partial.log_dir = general.log_dir.map(PathBuf::from);
            partial.memory_db_path = general.memory_db.map(PathBuf::from);
            partial.auto_approve = general.auto_approve;
        }

        if let Some(providers) = self.providers {
            partial.ollama_base_url = providers.ollama_base_url;
            partial.openai_api_key = providers.openai_api_key;
            partial.anthropic_api_key = providers.anthropic_api_key;
            partial.gemini_api_key = providers.gemini_api_key;
            partial.openrouter_api_key = providers.openrouter_api_key;
        }

        if let Some(safety) = self.safety {
            partial.shell_timeout_secs = safety.shell_timeout_secs;
            partial.blocked_patterns = safety.blocked_patterns.map(|entries| {
                entries
                    .into_iter()
                    .map(|entry| (entry.pattern, entry.reason))
                    .collect()
            });
            partial.security_log_path = safety.security_log.map(PathBuf::from);
        }

        if let Some(delegation) = self.delegation {
            partial.max_delegation_depth = delegation.max_depth;
            partial.max_delegation_total = delegation.max_total;
        }

        partial
    }
}

impl AgentsFile {
    pub fn to_partial(self) -> PartialConfig {
        PartialConfig {
            debug: self.debug,
            log_level: self.log_level,
            default_model: self.default_model,
            agents: self.agents,
            ..Default::default()
        }
    }
}

impl AgentEntry {
    /// Field-level merge: self's values win, gaps are filled from `fallback`.
    pub fn with_fallback(self, fallback: AgentEntry) -> AgentEntry {
        AgentEntry {
            model: self.model.or(fallback.model),
            fallback_models: self.fallback_models.or(fallback.fallback_models),
            temperature: self.temperature.or(fallback.temperature),
            max_tokens: self.max_tokens.or(fallback.max_tokens),
            system_prompt: self.system_prompt.or(fallback.system_prompt),
            timeout: self.timeout.or(fallback.timeout),
            retries: self.retries.or(fallback.retries),
            max_turns: self.max_turns.or(fallback.max_turns),
            tools: self.tools.or(fallback.tools),
            description: self.description.or(fallback.description),
        }
    }

    /// Drop fields whose value equals the built-in default, for writing
    /// compact agent files.
    pub fn without_defaults(mut self) -> AgentEntry {
        if self.fallback_models.as_ref().is_some_and(|m| m.is_empty()) {
            self.fallback_models = None;
        }
        if self.temperature == Some(DEFAULT_TEMPERATURE) {
            self.temperature = None;
        }
        if self.max_tokens == Some(DEFAULT_MAX_TOKENS) {
            self.max_tokens = None;
        }
        if self.system_prompt.as_deref() == Some("") {
            self.system_prompt = None;
        }
        if self.timeout == Some(DEFAULT_AGENT_TIMEOUT_SECS) {
            self.timeout = None;
        }
        if self.retries == Some(DEFAULT_RETRIES) {
            self.retries = None;
        }
        if self.max_turns == Some(DEFAULT_MAX_TURNS) {
            self.max_turns = None;
        }
        self
    }
}
