//! Batch orchestrator: transcribe a document's pages one after another.
//!
//! Pages are strictly sequential. A per-page failure is recorded as an
//! error-status [`PageResult`] and the loop moves on, so the result set
//! always has exactly one entry per input image.
//!
//! Result keys are 0-based positions in the input; each [`PageResult`]
//! carries the source page number of its [`PageImage`], which differs from
//! the position when a page range was requested or a page was skipped.

use crate::config::{DocumentProfile, RetryPolicy};
use crate::output::{BatchResults, PageResult};
use crate::pipeline::rasterize::PageImage;
use crate::pipeline::transcribe::Transcriber;
use crate::progress::BatchProgress;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Pacing and retry settings for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Pause between consecutive pages. Never applied after the last page.
    pub delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            retry: RetryPolicy::single_attempt(),
        }
    }
}

/// Transcribe `pages` in order.
///
/// Entry `i` of the result corresponds to `pages[i]` and carries its
/// `page` number.
pub async fn run_batch(
    transcriber: &Transcriber,
    pages: &[PageImage],
    profile: DocumentProfile,
    options: &BatchOptions,
    progress: Option<&dyn BatchProgress>,
) -> BatchResults {
    let total = pages.len();
    let mut results = BatchResults::new();

    info!(
        "Transcribing {} pages with {} (profile: {})",
        total,
        transcriber.model().name(),
        profile
    );
    if let Some(p) = progress {
        p.on_batch_start(total);
    }

    for (index, image) in pages.iter().enumerate() {
        let completed = index + 1;
        let page = image.page;
        debug!(
            "Page {} ({}/{}): {}",
            page,
            completed,
            total,
            image.path.display()
        );

        let result = match transcriber
            .transcribe_with_retry(&image.path, profile, &options.retry)
            .await
        {
            Ok(text) => PageResult::success(page, text, &image.path),
            Err(e) => {
                let message = e.to_string();
                warn!("Page {} ({}/{}) failed: {}", page, completed, total, message);
                if let Some(p) = progress {
                    p.on_page_error(page, total, &message);
                }
                PageResult::error(page, message, &image.path)
            }
        };
        results.insert(index, result);

        if let Some(p) = progress {
            p.on_page_done(completed, total);
        }

        if completed < total && !options.delay.is_zero() {
            sleep(options.delay).await;
        }
    }

    let succeeded = results.success_count();
    info!("Batch done: {}/{} pages succeeded", succeeded, total);
    if let Some(p) = progress {
        p.on_batch_complete(total, succeeded);
    }
    results
}
