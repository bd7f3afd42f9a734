//! Transcription client: one page image + profile → text.
//!
//! All prompt wording lives in [`crate::prompts`]; all transport lives behind
//! [`VisionModel`]. This module only wires the two together and owns the
//! retry loop.
//!
//! ## Retry Strategy
//!
//! Rate-limit and overload errors from model APIs are transient. After
//! failed attempt `i` (0-based) the client sleeps `base_delay · 2^i`, so the
//! default 1 s base gives 1 s → 2 s → 4 s. There is no sleep after the final
//! attempt; the last error is returned as-is.

use crate::config::{DocumentProfile, RetryPolicy};
use crate::error::{OcrError, OcrResult};
use crate::pipeline::encode::encode_file;
use crate::pipeline::postprocess::clean_transcription;
use crate::prompts::{instruction_for, NO_TEXT_SENTINEL};
use crate::vision::VisionModel;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Sends page images to a vision model.
#[derive(Clone)]
pub struct Transcriber {
    model: Arc<dyn VisionModel>,
}

impl Transcriber {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<dyn VisionModel> {
        &self.model
    }

    /// Transcribe one image with a single model call.
    ///
    /// A reply with no text yields [`NO_TEXT_SENTINEL`], not an error.
    pub async fn transcribe(&self, image_path: &Path, profile: DocumentProfile) -> OcrResult<String> {
        let start = Instant::now();
        let image = encode_file(image_path).await.map_err(|e| OcrError::TranscriptionFailed {
            detail: e.to_string(),
        })?;

        let reply = self
            .model
            .describe_image(&image, instruction_for(profile))
            .await?;

        debug!(
            "{}: transcribed {} in {:?}",
            self.model.name(),
            image_path.display(),
            start.elapsed()
        );

        Ok(match reply {
            Some(text) => clean_transcription(&text),
            None => NO_TEXT_SENTINEL.to_string(),
        })
    }

    /// [`Transcriber::transcribe`] with exponential backoff between attempts.
    ///
    /// Only page-local failures are retried; a run-fatal error such as
    /// [`OcrError::ModelNotConfigured`] is returned after the first attempt.
    pub async fn transcribe_with_retry(
        &self,
        image_path: &Path,
        profile: DocumentProfile,
        policy: &RetryPolicy,
    ) -> OcrResult<String> {
        let attempts = policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.transcribe(image_path, profile).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt + 1 >= attempts || e.is_run_fatal() => return Err(e),
                Err(e) => {
                    let backoff = policy.backoff(attempt);
                    warn!(
                        "{}: attempt {}/{} failed, retrying in {:?}: {}",
                        image_path.display(),
                        attempt + 1,
                        attempts,
                        backoff,
                        e
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
