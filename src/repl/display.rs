//! Plain-text rendering shared by the REPL and one-shot subcommands.

use crate::agent::AgentSpec;
use crate::config::AppConfig;
use crate::orchestration::DelegationResult;

/// Table of agents: name, model, tool count and description.
pub fn agents_table<'a>(specs: impl IntoIterator<Item = &'a AgentSpec>) -> String {
    let specs: Vec<&AgentSpec> = specs.into_iter().collect();
    let name_w = specs.iter().map(|s| s.name.len()).max().unwrap_or(0).max("AGENT".len());
    let model_w = specs
        .iter()
        .map(|s| s.model.to_string().len())
        .max()
        .unwrap_or(0)
        .max("MODEL".len());

    let mut out = format!("{:<name_w$}  {:<model_w$}  {:>5}  DESCRIPTION\n", "AGENT", "MODEL", "TOOLS");
    for spec in specs {
        out.push_str(&format!(
            "{:<name_w$}  {:<model_w$}  {:>5}  {}\n",
            spec.name,
            spec.model.to_string(),
            spec.tools.len(),
            spec.description
        ));
    }
    out
}

fn mask(key: &Option<String>) -> String {
    match key.as_deref() {
        None | Some("") => "(not set)".to_string(),
        Some(k) if k.chars().count() <= 8 => "****".to_string(),
        Some(k) => {
            let tail: String = k.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            format!("****{tail}")
        }
    }
}

/// The resolved configuration with API keys masked.
pub fn config_summary(config: &AppConfig) -> String {
    let rows: Vec<(&str, String)> = vec![
        ("App name", config.app_name.clone()),
        ("Debug", config.debug.to_string()),
        ("Log level", config.log_level.clone()),
        ("Default model", config.default_model.clone()),
        (
            "Model override",
            config.model_override.clone().unwrap_or_else(|| "(none)".to_string()),
        ),
        ("Temperature", config.default_temperature.to_string()),
        ("Workspace", config.workspace.display().to_string()),
        ("Log dir", config.log_dir.display().to_string()),
        ("Memory db", config.memory_db_path.display().to_string()),
        ("Ollama URL", config.providers.ollama_base_url.clone()),
        ("OpenAI key", mask(&config.providers.openai_api_key)),
        ("Anthropic key", mask(&config.providers.anthropic_api_key)),
        ("Gemini key", mask(&config.providers.gemini_api_key)),
        ("OpenRouter key", mask(&config.providers.openrouter_api_key)),
        ("Shell timeout", format!("{}s", config.shell_timeout_secs)),
        ("Blocked patterns", config.blocked_patterns.len().to_string()),
        ("Delegation depth", config.max_delegation_depth.to_string()),
        ("Delegation total", config.max_delegation_total.to_string()),
        ("Auto approve", config.auto_approve.to_string()),
        (
            "Agents file",
            config
                .agents_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string()),
        ),
    ];

    let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    rows.into_iter()
        .map(|(k, v)| format!("{k:<width$}  {v}\n"))
        .collect()
}

/// Agents used, the result, and the summary when it adds something.
pub fn delegation_result(result: &DelegationResult) -> String {
    let mut out = String::new();
    if !result.agents_used.is_empty() {
        out.push_str(&format!("Agents: {}\n\n", result.agents_used.join(", ")));
    }
    if result.success {
        out.push_str(&result.result);
    } else {
        out.push_str(&format!("Error: {}", result.result));
    }
    out.push('\n');

    let prefix: String = result.result.chars().take(200).collect();
    if result.success && !result.task_summary.is_empty() && result.task_summary != prefix {
        out.push_str(&format!("\nSummary: {}\n", result.task_summary));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartialConfig;

    #[test]
    fn keys_are_masked() {
        assert_eq!(mask(&None), "(not set)");
        assert_eq!(mask(&Some("short".into())), "****");
        assert_eq!(mask(&Some("sk-abcdefghijkl1234".into())), "****1234");

        let config = PartialConfig {
            openai_api_key: Some("sk-secretsecret9876".into()),
            ..Default::default()
        }
        .finalize()
        .unwrap();
        let summary = config_summary(&config);
        assert!(summary.contains("****9876"));
        assert!(!summary.contains("secretsecret"));
    }

    #[test]
    fn delegation_result_shows_agents_and_long_summary() {
        let text = "x".repeat(250);
        let result = DelegationResult {
            success: true,
            result: text.clone(),
            agents_used: vec!["file_editor".into()],
            task_summary: format!("{}...", &text[..200]),
        };
        let out = delegation_result(&result);
        assert!(out.starts_with("Agents: file_editor\n\n"));
        assert!(out.contains("\nSummary: "));

        let short = DelegationResult {
            success: true,
            result: "done".into(),
            agents_used: vec![],
            task_summary: "done".into(),
        };
        assert_eq!(delegation_result(&short), "done\n");
    }

    #[test]
    fn failed_delegation_is_marked() {
        let result = DelegationResult {
            success: false,
            result: "boom".into(),
            agents_used: vec![],
            task_summary: "boom".into(),
        };
        assert_eq!(delegation_result(&result), "Error: boom\n");
    }
}
