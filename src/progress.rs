//! Progress observer for the batch orchestrator.
//!
//! The batch loop reports `(completed, total)` after each page through a
//! [`BatchProgress`] reference. The loop knows nothing about terminals or
//! HTTP; the CLI forwards events to an indicatif bar, the server logs them.
//!
//! Any `Fn(usize, usize)` closure is a `BatchProgress`, so simple callers
//! can pass a closure directly:
//!
//! ```rust
//! use pdf_vision_ocr::BatchProgress;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let last = AtomicUsize::new(0);
//! let cb = |done: usize, _total: usize| last.store(done, Ordering::SeqCst);
//! cb.on_page_done(2, 5);
//! assert_eq!(last.load(Ordering::SeqCst), 2);
//! ```

use tracing::info;

/// Called by the batch orchestrator as it processes pages.
///
/// All methods except [`BatchProgress::on_page_done`] have no-op defaults.
/// Pages are processed one at a time, so calls never overlap within a run;
/// `Send + Sync` only lets the observer be shared with a server task.
pub trait BatchProgress: Send + Sync {
    /// Called once before the first page.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called after page `completed` (1-based count) has been recorded,
    /// whether it succeeded or failed.
    fn on_page_done(&self, completed: usize, total: usize);

    /// Called when a page's result is recorded as an error.
    fn on_page_error(&self, page: usize, total: usize, error: &str) {
        let _ = (page, total, error);
    }

    /// Called once after the last page.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

impl<F> BatchProgress for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_page_done(&self, completed: usize, total: usize) {
        self(completed, total)
    }
}

/// Observer that only writes `tracing` events. Used by the upload server.
pub struct LogProgress;

impl BatchProgress for LogProgress {
    fn on_batch_start(&self, total: usize) {
        info!("Transcribing {} pages", total);
    }

    fn on_page_done(&self, completed: usize, total: usize) {
        info!("Page {}/{} done", completed, total);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        info!("Batch finished: {}/{} pages succeeded", success_count, total);
    }
}
