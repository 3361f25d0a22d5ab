//! Answer generation
//!
//! Remote OpenAI-compatible chat completion plus a deterministic mock for
//! offline use. Generation never fails the query: transport problems come
//! back as degraded [`Generation`] values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::query::Generation;

pub mod chat;

pub use chat::ChatClient;

/// Default model for the `openai` generator.
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-3.5-turbo";
/// Chat-completions endpoint for the `openai` generator.
pub const OPENAI_CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
/// Default model for the `qwen` generator.
pub const QWEN_DEFAULT_MODEL: &str = "qwen-plus";
/// Default chat-completions endpoint for the `qwen` generator.
pub const QWEN_CHAT_ENDPOINT: &str =
    "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";

/// Prefix of every mock answer.
pub const MOCK_ECHO_PREFIX: &str = "Mock generated answer: ";
/// How many prompt characters the mock echoes back.
const MOCK_ECHO_CHARS: usize = 50;

/// Sampling parameters forwarded with every generation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 1000,
        }
    }
}

impl GenerationParams {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Generator selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    /// OpenAI chat completions.
    OpenAi,
    /// Qwen via the DashScope OpenAI-compatible endpoint.
    Qwen,
    /// Deterministic prompt echo, no network.
    #[default]
    Mock,
}

impl GeneratorKind {
    /// All accepted generator names, in the order they are advertised.
    pub const NAMES: [&'static str; 3] = ["mock", "openai", "qwen"];

    /// Every generator, in the same order as [`NAMES`](Self::NAMES).
    pub const fn all() -> [Self; 3] {
        [GeneratorKind::Mock, GeneratorKind::OpenAi, GeneratorKind::Qwen]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorKind::OpenAi => "openai",
            GeneratorKind::Qwen => "qwen",
            GeneratorKind::Mock => "mock",
        }
    }

    /// Whether this generator calls a remote endpoint and therefore needs a
    /// credential.
    pub fn is_remote(&self) -> bool {
        !matches!(self, GeneratorKind::Mock)
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeneratorKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(GeneratorKind::OpenAi),
            "qwen" => Ok(GeneratorKind::Qwen),
            "mock" => Ok(GeneratorKind::Mock),
            other => Err(RagError::UnknownGenerator(other.to_string())),
        }
    }
}

/// Optional overrides applied when constructing a generator.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    /// Credential for remote generators.
    pub api_key: Option<String>,
    /// Model override; each kind has its own default.
    pub model: Option<String>,
    /// Endpoint override; honored by the `qwen` generator.
    pub base_url: Option<String>,
}

impl GeneratorOptions {
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }
}

/// A constructed generator.
#[derive(Debug, Clone)]
pub enum Generator {
    OpenAi(ChatClient),
    Qwen(ChatClient),
    Mock(MockGenerator),
}

impl Generator {
    /// Build the generator named by `kind`.
    ///
    /// Remote kinds fail fast with [`RagError::MissingApiKey`] when no
    /// credential is supplied; a misconfigured generator should surface at
    /// construction, not as degraded answers later.
    pub fn create(kind: GeneratorKind, options: &GeneratorOptions) -> Result<Self> {
        match kind {
            GeneratorKind::OpenAi => {
                let api_key = require_api_key(kind, options)?;
                let model = options
                    .model
                    .clone()
                    .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string());
                Ok(Generator::OpenAi(ChatClient::new(
                    OPENAI_CHAT_ENDPOINT.to_string(),
                    api_key,
                    model,
                )?))
            }
            GeneratorKind::Qwen => {
                let api_key = require_api_key(kind, options)?;
                let model = options
                    .model
                    .clone()
                    .unwrap_or_else(|| QWEN_DEFAULT_MODEL.to_string());
                let endpoint = options
                    .base_url
                    .clone()
                    .unwrap_or_else(|| QWEN_CHAT_ENDPOINT.to_string());
                Ok(Generator::Qwen(ChatClient::new(endpoint, api_key, model)?))
            }
            GeneratorKind::Mock => Ok(Generator::Mock(MockGenerator)),
        }
    }

    /// Generate an answer for `prompt`.
    ///
    /// Remote transport failures degrade into a marker answer instead of an
    /// error; see [`Generation::degraded`].
    pub async fn generate(&self, prompt: &str, params: &GenerationParams) -> Generation {
        match self {
            Generator::OpenAi(client) | Generator::Qwen(client) => {
                match client.complete(prompt, params).await {
                    Ok(text) => Generation::ok(text),
                    Err(failure) => {
                        tracing::warn!(
                            model = client.model(),
                            "generation degraded: {failure}"
                        );
                        Generation::degraded(failure)
                    }
                }
            }
            Generator::Mock(mock) => mock.generate(prompt),
        }
    }

    pub fn kind(&self) -> GeneratorKind {
        match self {
            Generator::OpenAi(_) => GeneratorKind::OpenAi,
            Generator::Qwen(_) => GeneratorKind::Qwen,
            Generator::Mock(_) => GeneratorKind::Mock,
        }
    }

    /// Model identifier this generator answers with.
    pub fn model_name(&self) -> &str {
        match self {
            Generator::OpenAi(client) | Generator::Qwen(client) => client.model(),
            Generator::Mock(_) => "mock",
        }
    }
}

fn require_api_key(kind: GeneratorKind, options: &GeneratorOptions) -> Result<String> {
    options
        .api_key
        .clone()
        .filter(|key| !key.is_empty())
        .ok_or(RagError::MissingApiKey {
            kind: kind.as_str(),
        })
}

/// Mock generator echoing a prompt prefix; used in tests and offline runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockGenerator;

impl MockGenerator {
    /// Echo the first 50 characters of the prompt behind a fixed prefix.
    pub fn generate(&self, prompt: &str) -> Generation {
        let echoed: String = prompt.chars().take(MOCK_ECHO_CHARS).collect();
        Generation::ok(format!("{MOCK_ECHO_PREFIX}{echoed}..."))
    }
}
