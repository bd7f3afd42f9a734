//! [`VisionModel`] adapter over `edgequake_llm` providers.
//!
//! Lets the CLI run against any vision-capable provider the factory knows
//! (OpenAI, Anthropic, Gemini, Ollama, ...). The API key comes from the
//! provider's usual environment variable.

use crate::error::{OcrError, OcrResult};
use crate::pipeline::encode::EncodedImage;
use crate::vision::anthropic::DEFAULT_MAX_TOKENS;
use crate::vision::VisionModel;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Model used with `--provider` when `--model` is not given.
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4.1-nano";

/// Vision model backed by an `edgequake_llm` provider.
pub struct ProviderVision {
    provider: Arc<dyn LLMProvider>,
    label: String,
    max_tokens: usize,
}

impl ProviderVision {
    /// Wrap an already-constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
            max_tokens: DEFAULT_MAX_TOKENS as usize,
        }
    }

    /// Create a provider by name (e.g. `"openai"`) and model.
    pub fn from_name(provider_name: &str, model: Option<&str>) -> OcrResult<Self> {
        let model = model.unwrap_or(DEFAULT_PROVIDER_MODEL);
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            OcrError::ModelNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, format!("{provider_name}/{model}")))
    }

    /// Resolve a provider from the environment.
    ///
    /// `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` win when both are set;
    /// otherwise the factory picks the first provider with an API key.
    pub fn from_env() -> OcrResult<Self> {
        if let (Ok(name), Ok(model)) = (
            std::env::var("EDGEQUAKE_LLM_PROVIDER"),
            std::env::var("EDGEQUAKE_MODEL"),
        ) {
            if !name.is_empty() && !model.is_empty() {
                return Self::from_name(&name, Some(&model));
            }
        }

        let (provider, _embedding) =
            ProviderFactory::from_env().map_err(|e| OcrError::ModelNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "No vision provider could be auto-detected from environment.\n\
                    Set ANTHROPIC_API_KEY, OPENAI_API_KEY, or pass --provider.\n\
                    Error: {}",
                    e
                ),
            })?;
        Ok(Self::new(provider, "auto"))
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn options(&self, max_tokens: usize) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl VisionModel for ProviderVision {
    fn name(&self) -> String {
        self.label.clone()
    }

    async fn describe_image(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> OcrResult<Option<String>> {
        let messages = vec![ChatMessage::user_with_images(
            instruction,
            vec![image.to_image_data()],
        )];
        let response = self
            .provider
            .chat(&messages, Some(&self.options(self.max_tokens)))
            .await
            .map_err(|e| OcrError::TranscriptionFailed {
                detail: format!("{} request failed: {}", self.label, e),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        let text = response.content;
        Ok((!text.trim().is_empty()).then_some(text))
    }

    async fn check_connection(&self) -> OcrResult<()> {
        let messages = vec![ChatMessage::user("Hello")];
        self.provider
            .chat(&messages, Some(&self.options(10)))
            .await
            .map(|_| ())
            .map_err(|e| OcrError::TranscriptionFailed {
                detail: format!("{} connection test failed: {}", self.label, e),
            })
    }
}
