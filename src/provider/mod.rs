//! Model identifiers and provider routing on top of the `genai` client.

mod health;

pub use health::check_ready;

use std::fmt;

use genai::adapter::AdapterKind;
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ModelIden, ServiceTarget};

pub use crate::config::ProviderSettings;
use crate::error::ConfigError;

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/";
const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/";
const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/";
const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Ollama,
    OpenAi,
    Anthropic,
    Gemini,
    OpenRouter,
}

impl Provider {
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "gemini" | "google" => Some(Self::Gemini),
            "openrouter" => Some(Self::OpenRouter),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::OpenRouter => "openrouter",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::Ollama => None,
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
        }
    }

    pub fn api_key<'a>(&self, settings: &'a ProviderSettings) -> Option<&'a str> {
        match self {
            Self::Ollama => None,
            Self::OpenAi => settings.openai_api_key.as_deref(),
            Self::Anthropic => settings.anthropic_api_key.as_deref(),
            Self::Gemini => settings.gemini_api_key.as_deref(),
            Self::OpenRouter => settings.openrouter_api_key.as_deref(),
        }
    }

    /// Ollama is reached through its OpenAI-compatible `/v1` API.
    fn adapter_kind(&self) -> AdapterKind {
        match self {
            Self::Ollama | Self::OpenAi | Self::OpenRouter => AdapterKind::OpenAI,
            Self::Anthropic => AdapterKind::Anthropic,
            Self::Gemini => AdapterKind::Gemini,
        }
    }

    fn endpoint(&self, settings: &ProviderSettings) -> String {
        match self {
            Self::Ollama => format!("{}/v1/", health::ollama_root(&settings.ollama_base_url)),
            Self::OpenAi => OPENAI_ENDPOINT.to_string(),
            Self::Anthropic => ANTHROPIC_ENDPOINT.to_string(),
            Self::Gemini => GEMINI_ENDPOINT.to_string(),
            Self::OpenRouter => OPENROUTER_ENDPOINT.to_string(),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `provider:name` model identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub provider: Provider,
    pub name: String,
}

impl ModelSpec {
    /// Parse a model identifier.
    ///
    /// A known provider prefix is split at the first `:` so Ollama tags
    /// survive (`ollama:llama3.1:8b`). Without a prefix the provider is
    /// inferred from the name.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();

        let (provider, name) = match raw.split_once(':') {
            Some((prefix, rest)) => match Provider::from_prefix(prefix) {
                Some(provider) => (provider, rest.trim()),
                None => (infer_provider(raw), raw),
            },
            None => (infer_provider(raw), raw),
        };

        if name.is_empty() {
            return Err(ConfigError::InvalidModel(raw.to_string()));
        }

        Ok(Self {
            provider,
            name: name.to_string(),
        })
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.name)
    }
}

fn infer_provider(name: &str) -> Provider {
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("gpt-")
        || lower.starts_with("o1")
        || lower.starts_with("o3")
        || lower.starts_with("o4")
    {
        Provider::OpenAi
    } else if lower.starts_with("claude") {
        Provider::Anthropic
    } else if lower.starts_with("gemini") {
        Provider::Gemini
    } else {
        Provider::Ollama
    }
}

/// Adapter, endpoint and credential a model's requests are sent with.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Route {
    pub adapter: AdapterKind,
    pub endpoint: String,
    pub api_key: String,
}

impl ModelSpec {
    pub(crate) fn route(&self, settings: &ProviderSettings) -> Route {
        Route {
            adapter: self.provider.adapter_kind(),
            endpoint: self.provider.endpoint(settings),
            // The OpenAI adapter wants some key even for a local Ollama.
            api_key: self
                .provider
                .api_key(settings)
                .unwrap_or("ollama")
                .to_string(),
        }
    }
}

/// Build a genai client that routes `provider:name` model strings (as
/// produced by [`ModelSpec`]'s `Display`) to the right adapter, endpoint and
/// credentials.
pub fn build_client(settings: &ProviderSettings) -> Client {
    let settings = settings.clone();

    let resolver = ServiceTargetResolver::from_resolver_fn(
        move |service_target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
            let raw = service_target.model.model_name.to_string();

            let spec = ModelSpec::parse(&raw).unwrap_or_else(|_| ModelSpec {
                provider: Provider::Ollama,
                name: raw,
            });
            let route = spec.route(&settings);

            Ok(ServiceTarget {
                endpoint: Endpoint::from_owned(route.endpoint),
                auth: AuthData::from_single(route.api_key),
                model: ModelIden::new(route.adapter, spec.name),
            })
        },
    );

    Client::builder()
        .with_service_target_resolver(resolver)
        .build()
}
