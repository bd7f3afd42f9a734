//! PDF output behind a capability-checked backend strategy.
//!
//! Two backends render the same [`PdfContent`]:
//!
//! * [`SimpleBackend`]: one PDF page per OCR page, plain lines. Needs the
//!   DejaVu Sans Condensed TTF (or a configured font file) and reports
//!   itself unavailable without it.
//! * [`FlowBackend`]: flowing paragraphs over A4 pages with a title block,
//!   headings and spacing. Always available; degrades to Helvetica when no
//!   Unicode font is installed.
//!
//! The preferred backend is tried first. If it is unavailable or fails, the
//! other one is used.

use crate::error::{OcrError, OcrResult};
use crate::output::BatchResults;
use crate::render::{page_body, page_heading, TITLE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

pub mod flow;
pub mod fonts;
pub mod layout;
pub mod simple;

pub use flow::FlowBackend;
pub use simple::SimpleBackend;

/// Which PDF backend to try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfBackendKind {
    Simple,
    /// Paragraph layout engine. (default)
    #[default]
    Flow,
}

impl std::fmt::Display for PdfBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PdfBackendKind::Simple => "simple",
            PdfBackendKind::Flow => "flow",
        })
    }
}

/// PDF-specific rendering options.
#[derive(Debug, Clone)]
pub struct PdfRenderOptions {
    pub backend: PdfBackendKind,
    /// Font file tried before any other (e.g. from `OCR_PDF_FONT`).
    pub font_path: Option<PathBuf>,
    /// Fonts the flow backend searches after `font_path`.
    pub font_candidates: Vec<PathBuf>,
}

impl Default for PdfRenderOptions {
    fn default() -> Self {
        Self {
            backend: PdfBackendKind::default(),
            font_path: None,
            font_candidates: fonts::system_font_candidates(),
        }
    }
}

impl PdfRenderOptions {
    /// `font_path` followed by `rest`.
    fn with_configured(&self, rest: Vec<PathBuf>) -> Vec<PathBuf> {
        self.font_path.iter().cloned().chain(rest).collect()
    }

    /// Fonts the flow backend tries, in order.
    pub fn flow_fonts(&self) -> Vec<PathBuf> {
        self.with_configured(self.font_candidates.clone())
    }

    /// Fonts the simple backend accepts, in order.
    pub fn simple_fonts(&self) -> Vec<PathBuf> {
        self.with_configured(fonts::dejavu_condensed_locations())
    }
}

/// Backend-neutral document content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfContent {
    pub title: String,
    pub sections: Vec<PdfSection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfSection {
    pub heading: Option<String>,
    pub body: String,
}

impl PdfContent {
    pub fn from_results(results: &BatchResults, include_page_numbers: bool) -> Self {
        Self {
            title: TITLE.to_string(),
            sections: results
                .iter()
                .map(|(_, r)| PdfSection {
                    heading: include_page_numbers.then(|| page_heading(r.page)),
                    body: page_body(r).into_owned(),
                })
                .collect(),
        }
    }
}

/// A way of turning [`PdfContent`] into PDF bytes.
pub trait PdfBackend {
    fn kind(&self) -> PdfBackendKind;

    /// `Err(reason)` when the backend cannot run with these options.
    fn check_available(&self, options: &PdfRenderOptions) -> Result<(), String>;

    fn render(&self, content: &PdfContent, options: &PdfRenderOptions) -> OcrResult<Vec<u8>>;
}

fn backends_in_order(preferred: PdfBackendKind) -> [&'static dyn PdfBackend; 2] {
    match preferred {
        PdfBackendKind::Simple => [&SimpleBackend, &FlowBackend],
        PdfBackendKind::Flow => [&FlowBackend, &SimpleBackend],
    }
}

/// Render the results as PDF, falling back between backends.
pub fn render_pdf(
    results: &BatchResults,
    include_page_numbers: bool,
    options: &PdfRenderOptions,
) -> OcrResult<Vec<u8>> {
    let content = PdfContent::from_results(results, include_page_numbers);
    render_with(&backends_in_order(options.backend), &content, options)
}

/// Try `backends` in order; the first available one that succeeds wins.
fn render_with(
    backends: &[&dyn PdfBackend],
    content: &PdfContent,
    options: &PdfRenderOptions,
) -> OcrResult<Vec<u8>> {
    let mut last_error = None;

    for backend in backends {
        if let Err(reason) = backend.check_available(options) {
            warn!("PDF backend '{}' unavailable: {}", backend.kind(), reason);
            continue;
        }
        match backend.render(content, options) {
            Ok(bytes) => {
                info!(
                    "PDF rendered with '{}' backend ({} bytes)",
                    backend.kind(),
                    bytes.len()
                );
                return Ok(bytes);
            }
            Err(e) => {
                warn!("PDF backend '{}' failed: {}", backend.kind(), e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| OcrError::OutputRenderFailed {
        format: "pdf".into(),
        detail: "no PDF backend available".into(),
    }))
}

pub(crate) fn save(doc: printpdf::PdfDocumentReference) -> OcrResult<Vec<u8>> {
    doc.save_to_bytes().map_err(|e| OcrError::OutputRenderFailed {
        format: "pdf".into(),
        detail: format!("{:?}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::PageResult;

    fn no_fonts(backend: PdfBackendKind) -> PdfRenderOptions {
        PdfRenderOptions {
            backend,
            font_path: Some(PathBuf::from("/nonexistent/font.ttf")),
            font_candidates: vec![],
        }
    }

    fn sample() -> BatchResults {
        vec![
            PageResult::success(1, "첫 페이지 <tag> & more", "p1.png"),
            PageResult::error(2, "timeout", "p2.png"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn content_follows_result_order() {
        let c = PdfContent::from_results(&sample(), true);
        assert_eq!(c.title, "PDF OCR 결과");
        assert_eq!(c.sections[0].heading.as_deref(), Some("페이지 1"));
        assert_eq!(c.sections[1].body, "[오류] timeout");

        let c = PdfContent::from_results(&sample(), false);
        assert!(c.sections.iter().all(|s| s.heading.is_none()));
    }

    /// Test double with a fixed availability and outcome.
    struct Fake {
        kind: PdfBackendKind,
        available: bool,
        output: Result<&'static [u8], &'static str>,
    }

    impl PdfBackend for Fake {
        fn kind(&self) -> PdfBackendKind {
            self.kind
        }

        fn check_available(&self, _: &PdfRenderOptions) -> Result<(), String> {
            if self.available {
                Ok(())
            } else {
                Err("missing asset".into())
            }
        }

        fn render(&self, _: &PdfContent, _: &PdfRenderOptions) -> OcrResult<Vec<u8>> {
            self.output
                .map(|b| b.to_vec())
                .map_err(|d| OcrError::OutputRenderFailed {
                    format: "pdf".into(),
                    detail: d.into(),
                })
        }
    }

    fn content() -> PdfContent {
        PdfContent::from_results(&sample(), true)
    }

    #[test]
    fn unavailable_preferred_backend_is_skipped() {
        let first = Fake { kind: PdfBackendKind::Simple, available: false, output: Ok(&b"simple"[..]) };
        let second = Fake { kind: PdfBackendKind::Flow, available: true, output: Ok(&b"flow"[..]) };
        let out = render_with(&[&first, &second], &content(), &PdfRenderOptions::default()).unwrap();
        assert_eq!(out, b"flow");
    }

    #[test]
    fn failing_preferred_backend_falls_back() {
        let first = Fake { kind: PdfBackendKind::Flow, available: true, output: Err("boom") };
        let second = Fake { kind: PdfBackendKind::Simple, available: true, output: Ok(&b"simple"[..]) };
        let out = render_with(&[&first, &second], &content(), &PdfRenderOptions::default()).unwrap();
        assert_eq!(out, b"simple");
    }

    #[test]
    fn all_backends_failing_surfaces_last_error() {
        let first = Fake { kind: PdfBackendKind::Flow, available: true, output: Err("first") };
        let second = Fake { kind: PdfBackendKind::Simple, available: false, output: Ok(&b""[..]) };
        let err = render_with(&[&first, &second], &content(), &PdfRenderOptions::default()).unwrap_err();
        assert!(err.to_string().contains("first"), "got: {err}");
    }

    #[test]
    fn configured_font_is_tried_first() {
        let opts = no_fonts(PdfBackendKind::Simple);
        assert_eq!(opts.simple_fonts()[0], PathBuf::from("/nonexistent/font.ttf"));
        assert_eq!(opts.flow_fonts(), vec![PathBuf::from("/nonexistent/font.ttf")]);
    }

    #[test]
    fn flow_with_no_fonts_still_produces_pdf() {
        let bytes = render_pdf(&sample(), true, &no_fonts(PdfBackendKind::Flow)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn empty_results_render_a_valid_pdf() {
        let bytes = render_pdf(&BatchResults::new(), true, &no_fonts(PdfBackendKind::Flow)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
