//! # pdf-vision-ocr
//!
//! Extract text from scanned or photographed PDF documents with vision
//! language models.
//!
//! Scans carry no text layer, and classic OCR engines struggle with mixed
//! Korean/Latin text, handwriting and dense tables. This crate renders each
//! page to an image, asks a vision model to transcribe it, and assembles the
//! pages into a plain-text or PDF document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Rasterise   pdftoppm → PPM → preprocess (upscale, contrast, sharpen) → page_NNNN.png
//!  ├─ 2. Encode      PNG → base64 + MIME type
//!  ├─ 3. Transcribe  one model call per page, profile instruction, optional retry/backoff
//!  ├─ 4. Batch       strictly sequential, fixed delay between pages, per-page status
//!  └─ 5. Render      text layout or PDF (simple / flow backends)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_vision_ocr::{run, AnthropicConfig, AnthropicVision, OcrConfig, Rasterizer, RunContext};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = AnthropicVision::new(AnthropicConfig::from_env()?)?;
//!     let ctx = RunContext::new(Arc::new(model), Rasterizer::default(), OcrConfig::default());
//!     let pdf = std::fs::read("scan.pdf")?;
//!     let output = run(&ctx, &pdf, None).await?;
//!     println!("{}", output.as_text().unwrap_or_default());
//!     eprintln!("{}/{} pages ok", output.stats.succeeded_pages, output.stats.rasterized_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | The `pdf-ocr` binary (clap + indicatif + anyhow + tracing-subscriber) |
//! | `server` | on      | The [`server`] module and `pdf-ocr-server` binary (axum + tower-http + dotenvy) |
//!
//! Disable both when using only the library:
//! ```toml
//! pdf-vision-ocr = { version = "0.1", default-features = false }
//! ```
//!
//! ## External requirements
//!
//! Rasterisation shells out to poppler's `pdftoppm` and `pdfinfo`. When they
//! are missing every run fails early with
//! [`OcrError::RasterizerUnavailable`] and an installation guide.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod render;
pub mod vision;

#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    DocumentProfile, OcrConfig, OcrConfigBuilder, OutputFormat, PageRange, RetryPolicy,
};
pub use convert::{output_filename, run, run_file, write_output, RunContext};
pub use error::{OcrError, OcrResult};
pub use output::{BatchResults, BatchStats, ConversionOutput, PageResult, PageStatus};
pub use pipeline::batch::{run_batch, BatchOptions};
pub use pipeline::rasterize::{
    installation_guide, PageImage, RasterOptions, RasterizedDocument, Rasterizer,
    RasterizerConfig,
};
pub use pipeline::transcribe::Transcriber;
pub use progress::{BatchProgress, LogProgress};
pub use render::{render, PdfBackendKind, PdfRenderOptions, RenderOptions};
pub use vision::{AnthropicConfig, AnthropicVision, ProviderVision, VisionModel};
