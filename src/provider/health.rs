use std::time::Duration;

use super::{ModelSpec, Provider, ProviderSettings};
use crate::error::AgentError;

/// Root of the Ollama server, without the OpenAI-compatible `/v1` suffix.
pub(crate) fn ollama_root(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    trimmed
        .strip_suffix("/v1")
        .unwrap_or(trimmed)
        .to_string()
}

/// Check that a model can be used before starting a run.
///
/// Ollama: the server must answer and `/api/show` must know the model.
/// Cloud providers: an API key must be configured.
pub async fn check_ready(spec: &ModelSpec, settings: &ProviderSettings) -> Result<(), AgentError> {
    match spec.provider {
        Provider::Ollama => check_ollama_ready(&spec.name, &settings.ollama_base_url).await,
        provider => {
            if provider.api_key(settings).is_some() {
                Ok(())
            } else {
                Err(AgentError::MissingApiKey {
                    provider: provider.to_string(),
                    env_var: provider.api_key_env().unwrap_or_default().to_string(),
                })
            }
        }
    }
}

async fn check_ollama_ready(model: &str, base_url: &str) -> Result<(), AgentError> {
    let http = reqwest::Client::new();
    let root = ollama_root(base_url);

    http.get(format!("{root}/"))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .map_err(|e| AgentError::ProviderUnavailable {
            provider: "ollama".to_string(),
            url: root.clone(),
            message: format!("Is Ollama running? {e}"),
        })?;

    let resp = http
        .post(format!("{root}/api/show"))
        .json(&serde_json::json!({ "model": model }))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| AgentError::ModelNotAvailable {
            model: model.to_string(),
            provider: "ollama".to_string(),
            message: format!("Failed to query model info: {e}"),
        })?;

    if !resp.status().is_success() {
        return Err(AgentError::ModelNotAvailable {
            model: model.to_string(),
            provider: "ollama".to_string(),
            message: format!(
                "Model not found (HTTP {}). Run `ollama pull {model}` to download it.",
                resp.status()
            ),
        });
    }

    Ok(())
}
