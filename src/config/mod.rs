pub mod env;
pub mod env_profile;
pub mod merge;
pub mod schema;
pub mod yaml;

pub use schema::*;
pub use yaml::{load_agents_yaml, save_agents_yaml};

use crate::cli::Cli;
use crate::error::ConfigError;
use anyhow::Context;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where each configuration layer comes from. `load_config` fills this from
/// the real process; tests construct it directly.
#[derive(Debug, Default)]
pub struct ConfigSources {
    /// Global omni.toml, if the platform has a config directory.
    pub global_path: Option<PathBuf>,
    /// `--config`: replaces the workspace omni.toml and must exist.
    pub explicit_path: Option<PathBuf>,
    /// Process environment.
    pub process_env: HashMap<String, String>,
    /// CLI flags.
    pub cli: PartialConfig,
}

/// Load configuration by merging every source.
/// Precedence: CLI > process env > .env > agents YAML > workspace config >
/// global config > defaults.
pub fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let sources = ConfigSources {
        global_path: global_config_path(),
        explicit_path: cli.config.clone(),
        process_env: std::env::vars().collect(),
        cli: cli_to_partial(cli),
    };
    load_layers(sources).context("Failed to load configuration")
}

/// Merge the configured layers into an [`AppConfig`].
pub fn load_layers(sources: ConfigSources) -> Result<AppConfig, ConfigError> {
    // Layer 1: global config
    let global = match &sources.global_path {
        Some(p) => load_toml_file(p).unwrap_or_default(),
        None => {
            tracing::debug!("Could not determine global config directory");
            PartialConfig::default()
        }
    };

    let process = env::env_to_partial(&sources.process_env)?;

    // The workspace decides where the remaining files live.
    let workspace_path = sources
        .cli
        .workspace
        .clone()
        .or_else(|| process.workspace.clone())
        .or_else(|| global.workspace.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    // Layer 2: workspace config, or the explicit --config file
    let workspace = match &sources.explicit_path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.clone()));
            }
            let contents = std::fs::read_to_string(path)?;
            let file: ConfigFile =
                toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            tracing::info!("Loaded config from {}", path.display());
            file.to_partial()
        }
        None => load_toml_file(&workspace_path.join("omni.toml")).unwrap_or_default(),
    };

    // Layer 3: .env in the workspace
    let dotenv = env::env_to_partial(&env::read_dotenv(&workspace_path.join(".env"))?)?;

    // Layer 4: agents YAML, named by any higher layer or found
    let named_agents_file = sources
        .cli
        .agents_file
        .clone()
        .or_else(|| process.agents_file.clone())
        .or_else(|| workspace.agents_file.clone())
        .or_else(|| global.agents_file.clone());
    let yaml = match named_agents_file {
        Some(path) => {
            let path = if path.is_absolute() {
                path
            } else {
                workspace_path.join(path)
            };
            load_agents_yaml(&path)?.to_partial()
        }
        None => {
            let candidate = workspace_path.join("config").join("agents.yaml");
            if candidate.is_file() {
                let mut partial = load_agents_yaml(&candidate)?.to_partial();
                partial.agents_file = Some(candidate);
                partial
            } else {
                PartialConfig::default()
            }
        }
    };

    let base = PartialConfig {
        workspace: Some(workspace_path),
        ..Default::default()
    };

    sources
        .cli
        .with_fallback(process)
        .with_fallback(dotenv)
        .with_fallback(yaml)
        .with_fallback(workspace)
        .with_fallback(global)
        .with_fallback(base)
        .finalize()
}

/// Log level to initialize tracing with before the full config is loaded:
/// `--log-level`, then `LOG_LEVEL` from the environment, then from the
/// workspace `.env`, then `info`.
pub fn early_log_level(cli: &Cli) -> String {
    if let Some(level) = &cli.log_level {
        return level.to_ascii_lowercase();
    }
    if let Some(level) = std::env::var("LOG_LEVEL").ok().filter(|l| !l.is_empty()) {
        return level.to_ascii_lowercase();
    }

    let workspace = cli.workspace.clone().unwrap_or_else(|| PathBuf::from("."));
    env::read_dotenv(&workspace.join(".env"))
        .ok()
        .and_then(|vars| env::lookup(&vars, "LOG_LEVEL").map(str::to_ascii_lowercase))
        .unwrap_or_else(|| "info".to_string())
}

/// Load and parse a TOML config file into a PartialConfig.
/// Returns None on file-not-found; parse errors are logged and skipped.
fn load_toml_file(path: &Path) -> Option<PartialConfig> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            match toml::from_str::<ConfigFile>(&contents)
                .context(format!("Failed to parse {}", path.display()))
            {
                Ok(config_file) => {
                    tracing::info!("Loaded config from {}", path.display());
                    Some(config_file.to_partial())
                }
                Err(e) => {
                    tracing::warn!("Config parse error: {:#}", e);
                    None
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            None
        }
        Err(e) => {
            tracing::warn!("Failed to read config at {}: {}", path.display(), e);
            None
        }
    }
}

/// Resolve the platform-specific global config path.
/// Linux: ~/.config/omni/omni.toml
/// macOS: ~/Library/Application Support/omni/omni.toml
fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "omni").map(|dirs| dirs.config_dir().join("omni.toml"))
}

/// Convert CLI arguments to a PartialConfig for merging.
fn cli_to_partial(cli: &Cli) -> PartialConfig {
    PartialConfig {
        model_override: cli.model.clone(),
        workspace: cli.workspace.clone(),
        log_level: cli.log_level.clone(),
        auto_approve: cli.yes.then_some(true),
        ..Default::default()
    }
}
