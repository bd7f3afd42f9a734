//! Result types produced by a run.

use crate::config::OutputFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Whether a page's transcription produced text or an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Success,
    Error,
}

/// The outcome of transcribing one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number within the batch.
    pub page: usize,
    /// Transcribed text, or the error message when `status` is `Error`.
    pub text: String,
    pub status: PageStatus,
    /// The page image the text was read from.
    pub image_path: PathBuf,
}

impl PageResult {
    pub fn success(page: usize, text: impl Into<String>, image_path: impl Into<PathBuf>) -> Self {
        Self {
            page,
            text: text.into(),
            status: PageStatus::Success,
            image_path: image_path.into(),
        }
    }

    pub fn error(page: usize, message: impl Into<String>, image_path: impl Into<PathBuf>) -> Self {
        Self {
            page,
            text: message.into(),
            status: PageStatus::Error,
            image_path: image_path.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PageStatus::Success
    }
}

/// Per-page results of one batch, keyed by zero-based page index.
///
/// Built by [`crate::pipeline::batch::run_batch`], which inserts every index
/// in `0..total` exactly once. Iteration is always in ascending index order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResults {
    pages: BTreeMap<usize, PageResult>,
}

impl BatchResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result for `index`. A second insert for the same index
    /// replaces the first.
    pub fn insert(&mut self, index: usize, result: PageResult) {
        self.pages.insert(index, result);
    }

    pub fn get(&self, index: usize) -> Option<&PageResult> {
        self.pages.get(&index)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// `(index, result)` pairs in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PageResult)> {
        self.pages.iter().map(|(i, r)| (*i, r))
    }

    /// Indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.pages.keys().copied()
    }

    /// Whether the key set is exactly `0..len`.
    pub fn is_contiguous(&self) -> bool {
        self.pages.keys().copied().eq(0..self.pages.len())
    }

    pub fn success_count(&self) -> usize {
        self.pages.values().filter(|r| r.is_success()).count()
    }

    pub fn error_count(&self) -> usize {
        self.len() - self.success_count()
    }

    /// Source image paths of every page, for cleanup.
    pub fn image_paths(&self) -> Vec<PathBuf> {
        self.pages.values().map(|r| r.image_path.clone()).collect()
    }
}

impl FromIterator<PageResult> for BatchResults {
    /// Collect results in order; the n-th item gets index n.
    fn from_iter<I: IntoIterator<Item = PageResult>>(iter: I) -> Self {
        Self {
            pages: iter.into_iter().enumerate().collect(),
        }
    }
}

/// Timing and outcome counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Pages the document has (after range selection, before any skips).
    pub requested_pages: usize,
    /// Pages that produced an image.
    pub rasterized_pages: usize,
    pub succeeded_pages: usize,
    pub failed_pages: usize,
    pub rasterize_duration_ms: u64,
    pub transcribe_duration_ms: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a finished run produces.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// The rendered document.
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub results: BatchResults,
    pub stats: BatchStats,
}

impl ConversionOutput {
    /// The rendered document as text, if it is the text format.
    pub fn as_text(&self) -> Option<&str> {
        match self.format {
            OutputFormat::Text => std::str::from_utf8(&self.bytes).ok(),
            OutputFormat::Pdf => None,
        }
    }
}
