//! Static table of supported chat completion providers.

use std::collections::HashSet;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::LLMError;

/// Family of request/response JSON shapes a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// `POST {model, messages, stream}`, SSE with `choices[].delta.content`.
    OpenAiCompatible,
    /// Anthropic Messages API.
    Anthropic,
    /// Cohere Chat v1 API.
    Cohere,
}

/// Immutable description of one vendor endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub id: &'static str,
    /// Alternate ids accepted by [`ProviderRegistry::get`].
    pub aliases: &'static [&'static str],
    pub display_name: &'static str,
    pub description: &'static str,
    pub endpoint_url: &'static str,
    pub default_model: &'static str,
    pub wire_format: WireFormat,
    /// Headers sent in addition to content type and credentials.
    pub extra_headers: &'static [(&'static str, &'static str)],
}

impl ProviderDescriptor {
    pub(crate) fn answers_to(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
            || self
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(id))
    }
}

const BUILTIN_PROVIDERS: [ProviderDescriptor; 8] = [
    ProviderDescriptor {
        id: "openrouter",
        aliases: &[],
        display_name: "OpenRouter",
        description: "Access to 100+ models through one API",
        endpoint_url: "https://openrouter.ai/api/v1/chat/completions",
        default_model: "meta-llama/llama-3.1-8b-instruct:free",
        wire_format: WireFormat::OpenAiCompatible,
        extra_headers: &[("X-Title", "FACE Chrome Extension")],
    },
    ProviderDescriptor {
        id: "groq",
        aliases: &[],
        display_name: "Groq",
        description: "Fastest inference for real-time chat",
        endpoint_url: "https://api.groq.com/openai/v1/chat/completions",
        default_model: "llama-3.1-70b-versatile",
        wire_format: WireFormat::OpenAiCompatible,
        extra_headers: &[],
    },
    ProviderDescriptor {
        id: "anthropic",
        aliases: &["claude"],
        display_name: "Anthropic Claude",
        description: "Best reasoning for complex tasks",
        endpoint_url: "https://api.anthropic.com/v1/messages",
        default_model: "claude-3-sonnet-20240229",
        wire_format: WireFormat::Anthropic,
        extra_headers: &[("anthropic-version", "2023-06-01")],
    },
    ProviderDescriptor {
        id: "openai",
        aliases: &[],
        display_name: "OpenAI",
        description: "Industry standard, reliable",
        endpoint_url: "https://api.openai.com/v1/chat/completions",
        default_model: "gpt-4o-mini",
        wire_format: WireFormat::OpenAiCompatible,
        extra_headers: &[],
    },
    ProviderDescriptor {
        id: "together",
        aliases: &[],
        display_name: "Together AI",
        description: "Good balance of speed and quality",
        endpoint_url: "https://api.together.xyz/v1/chat/completions",
        default_model: "meta-llama/Llama-3-8b-chat-hf",
        wire_format: WireFormat::OpenAiCompatible,
        extra_headers: &[],
    },
    ProviderDescriptor {
        id: "cohere",
        aliases: &[],
        display_name: "Cohere",
        description: "Great for generation tasks",
        endpoint_url: "https://api.cohere.ai/v1/chat",
        default_model: "command-r",
        wire_format: WireFormat::Cohere,
        extra_headers: &[],
    },
    ProviderDescriptor {
        id: "deepinfra",
        aliases: &[],
        display_name: "DeepInfra",
        description: "Affordable, wide model selection",
        endpoint_url: "https://api.deepinfra.com/v1/openai/chat/completions",
        default_model: "meta-llama/Meta-Llama-3-8B-Instruct",
        wire_format: WireFormat::OpenAiCompatible,
        extra_headers: &[],
    },
    ProviderDescriptor {
        id: "xai",
        aliases: &[],
        display_name: "XAI (Grok)",
        description: "Latest from X/Twitter team",
        endpoint_url: "https://api.x.ai/v1/chat/completions",
        default_model: "grok-beta",
        wire_format: WireFormat::OpenAiCompatible,
        extra_headers: &[],
    },
];

static BUILTIN: LazyLock<ProviderRegistry> = LazyLock::new(|| ProviderRegistry {
    providers: BUILTIN_PROVIDERS.to_vec(),
});

/// Read-only lookup table of providers, keyed by id and aliases.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    /// The eight built-in vendors, constructed once per process.
    pub fn builtin() -> &'static ProviderRegistry {
        &BUILTIN
    }

    /// Builds a registry from custom rows.
    ///
    /// A new OpenAI-compatible vendor only needs a descriptor here; no code changes.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::InvalidConfig`] when two rows share an id or alias.
    pub fn with_providers(providers: Vec<ProviderDescriptor>) -> Result<Self, LLMError> {
        let mut seen = HashSet::new();
        for provider in &providers {
            for name in std::iter::once(&provider.id).chain(provider.aliases) {
                if !seen.insert(name.to_ascii_lowercase()) {
                    return Err(LLMError::InvalidConfig {
                        field: "providers".to_string(),
                        reason: format!("duplicate provider id or alias `{name}`"),
                    });
                }
            }
        }
        Ok(Self { providers })
    }

    /// Case-insensitive lookup by id or alias.
    pub fn get(&self, id: &str) -> Option<&ProviderDescriptor> {
        let id = id.trim();
        self.providers.iter().find(|p| p.answers_to(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
