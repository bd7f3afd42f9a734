//! Error types for the pdf-vision-ocr library.
//!
//! A single [`OcrError`] enum covers every failure the pipeline can report,
//! but the variants fall into two groups with different propagation rules:
//!
//! * **Run-fatal**: [`OcrError::RasterizerUnavailable`],
//!   [`OcrError::DocumentCorrupt`], [`OcrError::OutputRenderFailed`] and the
//!   configuration/I/O variants. These are returned as `Err` from the
//!   top-level entry points and nothing is produced.
//!
//! * **Page-local**: [`OcrError::PageConversionFailed`] and
//!   [`OcrError::TranscriptionFailed`]. The rasterizer logs and skips the
//!   former; the batch orchestrator records the latter as an error-status
//!   [`crate::output::PageResult`]. Only the retrying transcription call
//!   hands a `TranscriptionFailed` back to its caller.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type OcrResult<T> = Result<T, OcrError>;

/// All errors returned by the pdf-vision-ocr library.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Rasterizer errors ─────────────────────────────────────────────────
    /// The external conversion binary could not be found or launched.
    #[error("PDF rasterizer '{binary}' is not installed or not on PATH.\n{guide}")]
    RasterizerUnavailable { binary: String, guide: String },

    /// The uploaded document is not a PDF or fails structural parsing.
    #[error("PDF document is corrupt or not a PDF: {detail}\nTry re-saving or repairing the file (e.g. qpdf input.pdf output.pdf).")]
    DocumentCorrupt { detail: String },

    /// A single page could not be rasterised, decoded or written.
    #[error("Page {page}: conversion failed: {detail}")]
    PageConversionFailed { page: usize, detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The model call for one image failed.
    #[error("Transcription failed: {detail}")]
    TranscriptionFailed { detail: String },

    /// No vision model could be constructed (missing key, unknown provider).
    #[error("Vision model '{provider}' is not configured.\n{hint}")]
    ModelNotConfigured { provider: String, hint: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Assembling the requested output document failed.
    #[error("Failed to render {format} output: {detail}")]
    OutputRenderFailed { format: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A file-system operation on the run's working files failed.
    #[error("{context} '{path}': {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrError {
    /// Build an [`OcrError::Io`] with a short description of the operation.
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OcrError::Io {
            context,
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts the whole run rather than a single page.
    pub fn is_run_fatal(&self) -> bool {
        !matches!(
            self,
            OcrError::PageConversionFailed { .. } | OcrError::TranscriptionFailed { .. }
        )
    }
}
