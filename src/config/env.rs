use super::schema::PartialConfig;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Read a `.env` file into a map without touching the process environment.
/// A missing file yields an empty map.
pub fn read_dotenv(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    if !path.exists() {
        tracing::debug!("No .env file at {}", path.display());
        return Ok(HashMap::new());
    }

    let iter = dotenvy::from_path_iter(path).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        vars.insert(key, value);
    }
    tracing::info!("Loaded {} variables from {}", vars.len(), path.display());
    Ok(vars)
}

/// Look up a key case-insensitively.
pub fn lookup<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            field: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        field: key.to_string(),
        message: e.to_string(),
    })
}

/// Build a config layer from environment-style variables.
///
/// `<AGENT>_MODEL` keys (other than `DEFAULT_MODEL`) become per-agent model
/// overrides keyed by the lowercase agent name.
pub fn env_to_partial(vars: &HashMap<String, String>) -> Result<PartialConfig, ConfigError> {
    let get = |key: &str| lookup(vars, key).map(str::to_string);

    let mut partial = PartialConfig {
        app_name: get("APP_NAME"),
        log_level: get("LOG_LEVEL"),
        default_model: get("DEFAULT_MODEL"),
        ollama_base_url: get("OLLAMA_BASE_URL"),
        openai_api_key: get("OPENAI_API_KEY"),
        anthropic_api_key: get("ANTHROPIC_API_KEY"),
        gemini_api_key: get("GEMINI_API_KEY"),
        openrouter_api_key: get("OPENROUTER_API_KEY"),
        workspace: get("OMNI_WORKSPACE").map(PathBuf::from),
        ..Default::default()
    };

    if let Some(v) = lookup(vars, "DEBUG") {
        partial.debug = Some(parse_bool("DEBUG", v)?);
    }
    if let Some(v) = lookup(vars, "AUTO_APPROVE") {
        partial.auto_approve = Some(parse_bool("AUTO_APPROVE", v)?);
    }
    if let Some(v) = lookup(vars, "DEFAULT_TEMPERATURE") {
        partial.default_temperature = Some(parse_num("DEFAULT_TEMPERATURE", v)?);
    }
    if let Some(v) = lookup(vars, "SHELL_TIMEOUT_SECS") {
        partial.shell_timeout_secs = Some(parse_num("SHELL_TIMEOUT_SECS", v)?);
    }

    for (key, value) in vars {
        let upper = key.to_ascii_uppercase();
        if upper == "DEFAULT_MODEL" || value.is_empty() {
            continue;
        }
        if let Some(agent) = upper.strip_suffix("_MODEL").filter(|a| !a.is_empty()) {
            partial
                .agent_model_overrides
                .insert(agent.to_ascii_lowercase(), value.clone());
        }
    }

    Ok(partial)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn keys_are_case_insensitive() {
        let partial = env_to_partial(&vars(&[("default_model", "gpt-4o")])).unwrap();
        assert_eq!(partial.default_model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn agent_model_keys_become_overrides() {
        let partial = env_to_partial(&vars(&[
            ("FILE_EDITOR_MODEL", "ollama:granite3.1-dense"),
            ("DEFAULT_MODEL", "ollama:mistral"),
            ("_MODEL", "ignored"),
        ]))
        .unwrap();
        assert_eq!(
            partial.agent_model_overrides.get("file_editor").map(String::as_str),
            Some("ollama:granite3.1-dense")
        );
        assert!(!partial.agent_model_overrides.contains_key("default"));
        assert_eq!(partial.agent_model_overrides.len(), 1);
    }

    #[test]
    fn booleans_and_numbers_parse() {
        let partial = env_to_partial(&vars(&[
            ("DEBUG", "true"),
            ("AUTO_APPROVE", "0"),
            ("DEFAULT_TEMPERATURE", "0.2"),
            ("SHELL_TIMEOUT_SECS", "45"),
        ]))
        .unwrap();
        assert_eq!(partial.debug, Some(true));
        assert_eq!(partial.auto_approve, Some(false));
        assert_eq!(partial.default_temperature, Some(0.2));
        assert_eq!(partial.shell_timeout_secs, Some(45));
    }

    #[test]
    fn malformed_number_is_invalid() {
        let err = env_to_partial(&vars(&[("SHELL_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "SHELL_TIMEOUT_SECS"));
    }

    #[test]
    fn dotenv_file_is_read_without_exporting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "OMNI_TEST_ONLY_KEY=abc\n# comment\nLOG_LEVEL=debug\n").unwrap();

        let vars = read_dotenv(&path).unwrap();
        assert_eq!(vars.get("OMNI_TEST_ONLY_KEY").map(String::as_str), Some("abc"));
        assert_eq!(vars.get("LOG_LEVEL").map(String::as_str), Some("debug"));
        assert!(std::env::var("OMNI_TEST_ONLY_KEY").is_err());
    }

    #[test]
    fn missing_dotenv_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_dotenv(&dir.path().join(".env")).unwrap().is_empty());
    }
}
