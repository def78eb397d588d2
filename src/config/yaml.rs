use super::merge::validate_agent_entry;
use super::schema::{AgentsFile, AppConfig};
use crate::error::ConfigError;
use std::path::Path;

/// Load a YAML agents file. Unlike the TOML layers, a missing file is an error
/// because the caller asked for this path explicitly.
pub fn load_agents_yaml(path: &Path) -> Result<AgentsFile, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let contents = std::fs::read_to_string(path)?;
    let file: AgentsFile =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    for (name, entry) in &file.agents {
        validate_agent_entry(name, entry)?;
    }

    tracing::info!(
        agents = file.agents.len(),
        "Loaded agents file {}",
        path.display()
    );
    Ok(file)
}

/// Write the config's agent section as YAML, creating parent directories.
/// Agent fields equal to their defaults are omitted.
pub fn save_agents_yaml(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    let file = AgentsFile {
        debug: Some(config.debug),
        log_level: Some(config.log_level.clone()),
        default_model: Some(config.default_model.clone()),
        agents: config
            .agents
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone().without_defaults()))
            .collect(),
    };

    let yaml = serde_yaml::to_string(&file).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, yaml)?;
    tracing::info!("Saved agents file {}", path.display());
    Ok(())
}
