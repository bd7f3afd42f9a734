//! Lightweight backend: every OCR page starts a new PDF page.
//!
//! Mirrors a plain "cell per line" writer: 10 mm side margins, a 15 mm
//! bottom break margin, a bold centred heading and 8 mm line height for
//! body text. Blank lines in the transcription are dropped.

use crate::error::{OcrError, OcrResult};
use crate::render::pdf::fonts::{DocFonts, DEJAVU_CONDENSED};
use crate::render::pdf::layout::{
    PageMetrics, PageWriter, TextStyle, A4_HEIGHT_MM, A4_WIDTH_MM, LAYER_NAME,
};
use crate::render::pdf::{save, PdfBackend, PdfBackendKind, PdfContent, PdfRenderOptions};
use printpdf::{Mm, PdfDocument};
use std::path::PathBuf;

const HEADING: TextStyle = TextStyle {
    size_pt: 14.0,
    leading_mm: 10.0,
    bold: true,
    centered: true,
};

const BODY: TextStyle = TextStyle {
    size_pt: 10.0,
    leading_mm: 8.0,
    bold: false,
    centered: false,
};

const AFTER_HEADING_MM: f32 = 5.0;
const AFTER_LINE_MM: f32 = 2.0;

pub struct SimpleBackend;

fn first_existing(paths: &[PathBuf]) -> Option<&PathBuf> {
    paths.iter().find(|p| p.is_file())
}

impl PdfBackend for SimpleBackend {
    fn kind(&self) -> PdfBackendKind {
        PdfBackendKind::Simple
    }

    fn check_available(&self, options: &PdfRenderOptions) -> Result<(), String> {
        let fonts = options.simple_fonts();
        match first_existing(&fonts) {
            Some(_) => Ok(()),
            None => Err(format!(
                "{} not found (looked in {})",
                DEJAVU_CONDENSED,
                fonts
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }

    fn render(&self, content: &PdfContent, options: &PdfRenderOptions) -> OcrResult<Vec<u8>> {
        let (doc, page, layer) =
            PdfDocument::new(&content.title, Mm(A4_WIDTH_MM), Mm(A4_HEIGHT_MM), LAYER_NAME);
        let fonts = DocFonts::try_embed(&doc, &options.simple_fonts()).ok_or_else(|| {
            OcrError::OutputRenderFailed {
                format: "pdf".into(),
                detail: format!("{} could not be loaded", DEJAVU_CONDENSED),
            }
        })?;

        let first_layer = doc.get_page(page).get_layer(layer);
        let mut w = PageWriter::new(&doc, first_layer, &fonts, PageMetrics::a4(10.0, 10.0, 15.0));

        w.line(&content.title, &HEADING);
        w.space(AFTER_HEADING_MM);

        for (i, section) in content.sections.iter().enumerate() {
            if i > 0 {
                w.new_page();
            }
            if let Some(heading) = &section.heading {
                w.line(heading, &HEADING);
                w.space(AFTER_HEADING_MM);
            }
            for line in section.body.lines().filter(|l| !l.trim().is_empty()) {
                w.wrapped(line, &BODY);
                w.space(AFTER_LINE_MM);
            }
        }

        drop(w);
        save(doc)
    }
}
