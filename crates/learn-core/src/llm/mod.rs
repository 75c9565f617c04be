//! LLM collaborator: the hosted completion and image APIs the pipelines call.
//!
//! # Architecture
//!
//! ```text
//! pipeline --CompletionRequest--> Arc<dyn CompletionProvider>
//!                                    |-- OpenAiProvider  (chat/completions)
//!                                    |-- GeminiProvider  (generateContent)
//!                                    `-- ScriptedProvider (tests)
//!          <------- raw text -------'
//! ```
//!
//! Providers return the model's text verbatim. Parsing lives in
//! [`crate::parse`].

pub mod gemini;
pub mod openai;
pub mod scripted;
pub mod trait_def;
pub mod types;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use gemini::GeminiProvider;
pub use openai::{OpenAiImageGenerator, OpenAiProvider};
pub use scripted::{ScriptedProvider, StaticImageGenerator};
pub use trait_def::{CompletionProvider, ImageGenerator};
pub use types::{CompletionRequest, ContentPart, Message, Role};

/// Transport-level failures talking to a hosted model.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} API returned {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{0} returned an empty response")]
    EmptyResponse(&'static str),
    #[error("{0}")]
    Other(String),
}

/// Which hosted API to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Gemini,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        })
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(format!(
                "unknown AI provider {other:?} (expected openai or gemini)"
            )),
        }
    }
}

/// Resolved settings for building a provider.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    /// Overrides the provider's default model.
    pub model: Option<String>,
    /// Overrides the provider's base URL (proxies, tests).
    pub endpoint: Option<String>,
    /// Key for the image API; image generation is OpenAI-only.
    pub image_api_key: Option<String>,
}

/// Build the completion provider selected by `config`.
pub fn provider_from_config(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>, LlmError> {
    let provider: Arc<dyn CompletionProvider> = match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
            &config.api_key,
            config.model.as_deref(),
            config.endpoint.as_deref(),
        )?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(
            &config.api_key,
            config.model.as_deref(),
            config.endpoint.as_deref(),
        )?),
    };
    tracing::debug!(provider = provider.name(), "completion provider configured");
    Ok(provider)
}

/// Build the image generator, if an OpenAI key is available.
pub fn image_generator_from_config(config: &LlmConfig) -> Option<Arc<dyn ImageGenerator>> {
    let key = match config.provider {
        ProviderKind::OpenAi => Some(config.api_key.as_str()),
        ProviderKind::Gemini => config.image_api_key.as_deref(),
    }?;
    let endpoint = match config.provider {
        ProviderKind::OpenAi => config.endpoint.as_deref(),
        ProviderKind::Gemini => None,
    };
    OpenAiImageGenerator::new(key, endpoint)
        .ok()
        .map(|g| Arc::new(g) as Arc<dyn ImageGenerator>)
}
