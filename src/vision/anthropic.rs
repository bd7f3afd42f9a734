//! Anthropic Messages API client for page transcription.

use crate::error::{OcrError, OcrResult};
use crate::pipeline::encode::EncodedImage;
use crate::vision::VisionModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Connection settings for [`AnthropicVision`].
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    /// API root, without the `/messages` suffix.
    pub base_url: String,
    /// Whole-request timeout. Large scans at 600 DPI can take a while.
    pub timeout: Duration,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: ANTHROPIC_API_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Read the key from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> OcrResult<Self> {
        std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(Self::new)
            .ok_or_else(|| OcrError::ModelNotConfigured {
                provider: "anthropic".into(),
                hint: "Set ANTHROPIC_API_KEY or pass --api-key.".into(),
            })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Vision model backed by the Anthropic Messages API.
pub struct AnthropicVision {
    client: Client,
    config: AnthropicConfig,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl AnthropicVision {
    pub fn new(config: AnthropicConfig) -> OcrResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(OcrError::ModelNotConfigured {
                provider: "anthropic".into(),
                hint: "An API key is required (https://console.anthropic.com).".into(),
            });
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            config
                .api_key
                .trim()
                .parse()
                .map_err(|_| OcrError::InvalidConfig("Invalid API key format".into()))?,
        );
        headers.insert(
            "anthropic-version",
            reqwest::header::HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| OcrError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn send(&self, request: &MessagesRequest<'_>) -> OcrResult<MessagesResponse> {
        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| failed(format!("Anthropic API request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| failed(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(failed(format!(
                "Anthropic API error ({}): {}",
                status, message
            )));
        }

        serde_json::from_str(&body).map_err(|e| failed(format!("Failed to parse response: {}", e)))
    }
}

fn failed(detail: String) -> OcrError {
    OcrError::TranscriptionFailed { detail }
}

#[async_trait]
impl VisionModel for AnthropicVision {
    fn name(&self) -> String {
        format!("anthropic/{}", self.config.model)
    }

    async fn describe_image(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> OcrResult<Option<String>> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![RequestMessage {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: image.mime_type,
                            data: &image.data,
                        },
                    },
                    ContentBlock::Text { text: instruction },
                ],
            }],
        };

        let response = self.send(&request).await?;
        debug!("Anthropic reply with {} content blocks", response.content.len());

        Ok(response
            .content
            .into_iter()
            .find(|c| c.content_type == "text")
            .and_then(|c| c.text)
            .filter(|text| !text.trim().is_empty()))
    }

    async fn check_connection(&self) -> OcrResult<()> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: 10,
            messages: vec![RequestMessage {
                role: "user",
                content: vec![ContentBlock::Text { text: "Hello" }],
            }],
        };
        self.send(&request).await.map(|_| ())
    }
}
