//! Output assembly: batch results → downloadable document bytes.
//!
//! Both formats carry the same logical content: a title, then one section
//! per page in ascending page order, each optionally headed "페이지 N".
//! Failed pages appear as `[오류] <message>` so the reader sees which pages
//! need a second look.

use crate::config::OutputFormat;
use crate::error::OcrResult;
use crate::output::{BatchResults, PageResult};
use std::borrow::Cow;
use std::time::Instant;
use tracing::debug;

pub mod pdf;
pub mod text;

pub use pdf::{PdfBackendKind, PdfRenderOptions};

/// Document title used by both formats.
pub const TITLE: &str = "PDF OCR 결과";

/// Prefix put in front of a failed page's error message.
pub const ERROR_PREFIX: &str = "[오류]";

/// Options shared by the output formats.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Label each page with "페이지 N". Default: true.
    pub include_page_numbers: bool,
    pub pdf: PdfRenderOptions,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            include_page_numbers: true,
            pdf: PdfRenderOptions::default(),
        }
    }
}

/// Render `results` in `format`.
pub fn render(
    results: &BatchResults,
    format: OutputFormat,
    options: &RenderOptions,
) -> OcrResult<Vec<u8>> {
    let start = Instant::now();
    let bytes = match format {
        OutputFormat::Text => text::render_text(results, options.include_page_numbers).into_bytes(),
        OutputFormat::Pdf => pdf::render_pdf(results, options.include_page_numbers, &options.pdf)?,
    };
    debug!(
        "Rendered {} pages as {} ({} bytes) in {:?}",
        results.len(),
        format,
        bytes.len(),
        start.elapsed()
    );
    Ok(bytes)
}

/// "페이지 N"
pub fn page_heading(page: usize) -> String {
    format!("페이지 {}", page)
}

/// The text shown for a page: the transcription, or the prefixed error.
pub fn page_body(result: &PageResult) -> Cow<'_, str> {
    if result.is_success() {
        Cow::Borrowed(&result.text)
    } else {
        Cow::Owned(format!("{} {}", ERROR_PREFIX, result.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_pages_are_prefixed() {
        let ok = PageResult::success(1, "본문", "p1.png");
        let bad = PageResult::error(2, "timeout", "p2.png");
        assert_eq!(page_body(&ok), "본문");
        assert_eq!(page_body(&bad), "[오류] timeout");
    }

    #[test]
    fn text_format_is_utf8() {
        let results: BatchResults = vec![PageResult::success(1, "한글", "p1.png")]
            .into_iter()
            .collect();
        let bytes = render(&results, OutputFormat::Text, &RenderOptions::default()).unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("한글"));
    }
}
