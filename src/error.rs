use std::path::PathBuf;

/// Errors related to configuration loading and parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to parse config at {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid configuration for {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("Invalid model identifier '{0}'")]
    InvalidModel(String),
}

/// Errors related to safety guardrails (command filtering, workspace enforcement).
#[derive(Debug, thiserror::Error)]
pub enum GuardrailError {
    #[error("Command blocked: `{command}` - {reason}")]
    CommandBlocked { command: String, reason: String },

    #[error("Write outside workspace: `{path}` is not within `{workspace}`")]
    WriteOutsideWorkspace { path: PathBuf, workspace: PathBuf },
}

/// Errors related to shell command execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Failed to spawn shell process: {0}")]
    SpawnFailed(String),

    #[error("Process execution failed: {0}")]
    ProcessFailed(String),
}

/// Errors raised while assembling the tool set.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },
}

/// Errors related to agents, providers and the agent loop.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent '{name}' not found. Available agents: {available}")]
    NotFound { name: String, available: String },

    #[error("Agent '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Provider '{provider}' not reachable at {url}: {message}")]
    ProviderUnavailable {
        provider: String,
        url: String,
        message: String,
    },

    #[error("Model '{model}' not available from provider '{provider}': {message}")]
    ModelNotAvailable {
        model: String,
        provider: String,
        message: String,
    },

    #[error("Missing API key for provider '{provider}' (set {env_var})")]
    MissingApiKey { provider: String, env_var: String },

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Agent '{agent}' timed out after {timeout_secs}s")]
    Timeout { agent: String, timeout_secs: u64 },

    #[error("Agent '{agent}' stopped after {turns} turns without a final answer")]
    MaxTurns { agent: String, turns: u32 },

    #[error("Agent '{0}' was cancelled")]
    Cancelled(String),

    #[error("Delegation rejected: {0}")]
    DelegationRejected(String),

    #[error("All models failed for agent '{agent}': {attempts}")]
    AllModelsFailed { agent: String, attempts: String },

    #[error("Session logging error: {0}")]
    LoggingError(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
