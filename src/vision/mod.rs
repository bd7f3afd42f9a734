//! Vision model backends.
//!
//! The transcription client only needs "one image + one instruction in,
//! text out". [`VisionModel`] is that contract; two implementations ship:
//!
//! * [`AnthropicVision`] talks to the Anthropic Messages API directly with a
//!   key supplied per run (the upload form's key field).
//! * [`ProviderVision`] wraps any `edgequake_llm` provider, resolved by
//!   name/model or auto-detected from the environment (CLI use).

use crate::error::OcrResult;
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;

pub mod anthropic;
pub mod provider;

pub use anthropic::{AnthropicConfig, AnthropicVision};
pub use provider::ProviderVision;

/// A model that can read text out of an image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Short identifier for logs, e.g. `anthropic/claude-3-5-sonnet-20241022`.
    fn name(&self) -> String;

    /// Send one image followed by `instruction` as a single user turn.
    ///
    /// Returns `Ok(None)` when the call succeeded but the reply carried no
    /// text. Transport and API failures are `Err(TranscriptionFailed)`.
    async fn describe_image(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> OcrResult<Option<String>>;

    /// Minimal round trip to confirm the key and endpoint work.
    async fn check_connection(&self) -> OcrResult<()>;
}
