//! Pipeline stages for PDF OCR.
//!
//! Each submodule implements one transformation step and is testable on
//! its own.
//!
//! ## Data Flow
//!
//! ```text
//! rasterize ──▶ preprocess ──▶ batch ──▶ transcribe ──▶ encode / postprocess
//! (pdftoppm)    (per image)    (loop)    (per image)    (base64 in, text out)
//! ```
//!
//! 1. [`rasterize`]: PDF bytes → `page_NNNN.png` in a run-private temp dir
//! 2. [`preprocess`]: upscale, flatten, contrast and sharpen each page
//! 3. [`batch`]: sequential per-page loop with delay and progress
//! 4. [`transcribe`]: one model call per page, with retry/backoff
//! 5. [`encode`] / [`postprocess`]: request payload and reply cleanup

pub mod batch;
pub mod encode;
pub mod postprocess;
pub mod preprocess;
pub mod rasterize;
pub mod transcribe;
