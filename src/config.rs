//! Service configuration
//!
//! Settings are layered: built-in defaults, then an optional `ragdex.toml`
//! file, then environment variables with the `RAGDEX` prefix and `__`
//! separator (e.g. `RAGDEX_LLM__API_KEY`, `RAGDEX_INDEX_BASE_DIR`).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RagError, Result};
use crate::retrieval::vector::EmbeddingSettings;

/// Default number of results a query asks for.
pub const DEFAULT_TOP_K: usize = 5;

/// Maximum accepted `top_k` for inbound requests.
pub const MAX_TOP_K: usize = 20;

/// Top-level settings for a [`RagService`](crate::service::RagService).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base directory holding one subdirectory per named index.
    pub index_base_dir: PathBuf,
    pub retrieval: RetrievalSettings,
    pub llm: LlmSettings,
    pub prompt: PromptSettings,
    pub embedding: EmbeddingSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            index_base_dir: PathBuf::from("./output"),
            retrieval: RetrievalSettings::default(),
            llm: LlmSettings::default(),
            prompt: PromptSettings::default(),
            embedding: EmbeddingSettings::default(),
        }
    }
}

/// Retrieval defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Default `top_k` when a request does not specify one.
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K }
    }
}

/// Credentials and endpoint for the configured remote LLM.
///
/// These are the values force-injected when a pipeline is switched to the
/// `qwen` generator (see [`RagService::update_pipeline_config`]).
///
/// [`RagService::update_pipeline_config`]: crate::service::RagService::update_pipeline_config
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub api_key: Option<String>,
    /// Full chat-completions endpoint URL.
    pub base_url: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "qwen-plus".to_string(),
            api_key: None,
            base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions"
                .to_string(),
        }
    }
}

/// Prompt template storage settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory of `.txt` templates; created and seeded on first use.
    pub template_dir: PathBuf,
    /// Template a new pipeline starts with.
    pub default_template: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("./templates"),
            default_template: crate::prompt::DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load settings from `ragdex.toml` (optional) and `RAGDEX_*` environment
    /// variables, on top of the built-in defaults.
    pub fn load() -> Result<Self> {
        let layered = config::Config::builder()
            .add_source(config::File::with_name("ragdex").required(false))
            .add_source(config::Environment::with_prefix("RAGDEX").separator("__"))
            .build()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let cfg: ServiceConfig = layered
            .try_deserialize()
            .map_err(|e| RagError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate settings values; called by [`ServiceConfig::load`].
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 || self.retrieval.top_k > MAX_TOP_K {
            return Err(RagError::Config(format!(
                "retrieval.top_k must be in 1..={MAX_TOP_K}, got {}",
                self.retrieval.top_k
            )));
        }
        if self.llm.base_url.is_empty() {
            return Err(RagError::Config("llm.base_url must not be empty".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(RagError::Config("embedding.dimension must be > 0".into()));
        }
        Ok(())
    }

    /// Set the base index directory.
    pub fn with_index_base_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.index_base_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the template directory.
    pub fn with_template_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.prompt.template_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the remote LLM credential.
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.llm.api_key = Some(key.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ServiceConfig::default();

        assert_eq!(cfg.index_base_dir, PathBuf::from("./output"));
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.llm.model, "qwen-plus");
        assert!(cfg.llm.api_key.is_none());
        assert_eq!(cfg.prompt.default_template, "basic_search_system_prompt.txt");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let cfg = ServiceConfig::default()
            .with_index_base_dir("/tmp/indexes")
            .with_template_dir("/tmp/templates")
            .with_api_key("sk-test");

        assert_eq!(cfg.index_base_dir, PathBuf::from("/tmp/indexes"));
        assert_eq!(cfg.prompt.template_dir, PathBuf::from("/tmp/templates"));
        assert_eq!(cfg.llm.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_validate_rejects_bad_top_k() {
        let mut cfg = ServiceConfig::default();
        cfg.retrieval.top_k = 0;
        assert!(cfg.validate().is_err());

        cfg.retrieval.top_k = 21;
        assert!(cfg.validate().is_err());
    }
}
