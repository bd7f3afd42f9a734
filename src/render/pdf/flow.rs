//! Layout-engine backend: a story of title, headings, paragraphs and
//! spacers flowed over A4 pages with one-inch margins.
//!
//! Each page's text is escaped into paragraph markup (see
//! [`escape_markup`]) before layout, so tags or entities in OCR output are
//! printed literally instead of being interpreted.

use crate::error::OcrResult;
use crate::render::pdf::fonts::DocFonts;
use crate::render::pdf::layout::{
    escape_markup, markup_lines, PageMetrics, PageWriter, TextStyle, A4_HEIGHT_MM, A4_WIDTH_MM,
    LAYER_NAME, PT_TO_MM,
};
use crate::render::pdf::{save, PdfBackend, PdfBackendKind, PdfContent, PdfRenderOptions};
use printpdf::{Mm, PdfDocument};
use tracing::debug;

const MARGIN_MM: f32 = 25.4;

const TITLE: TextStyle = TextStyle {
    size_pt: 14.0,
    leading_mm: 18.0 * PT_TO_MM,
    bold: true,
    centered: true,
};

const BODY: TextStyle = TextStyle {
    size_pt: 10.0,
    leading_mm: 14.0 * PT_TO_MM,
    bold: false,
    centered: false,
};

const TITLE_SPACE_AFTER_PT: f32 = 12.0;
const BODY_SPACE_AFTER_PT: f32 = 6.0;
const SPACER_AFTER_TITLE_PT: f32 = 12.0;
const SPACER_AFTER_HEADING_PT: f32 = 8.0;
const SPACER_AFTER_SECTION_PT: f32 = 20.0;

/// One element of the document story.
#[derive(Debug, Clone, PartialEq)]
enum Flowable {
    Heading(String),
    /// Escaped markup, `<br/>` for line breaks.
    Paragraph(String),
    Spacer(f32),
}

fn build_story(content: &PdfContent) -> Vec<Flowable> {
    let mut story = vec![
        Flowable::Heading(content.title.clone()),
        Flowable::Spacer(SPACER_AFTER_TITLE_PT),
    ];
    for section in &content.sections {
        if let Some(heading) = &section.heading {
            story.push(Flowable::Heading(heading.clone()));
            story.push(Flowable::Spacer(SPACER_AFTER_HEADING_PT));
        }
        story.push(Flowable::Paragraph(escape_markup(&section.body)));
        story.push(Flowable::Spacer(SPACER_AFTER_SECTION_PT));
    }
    story
}

pub struct FlowBackend;

impl PdfBackend for FlowBackend {
    fn kind(&self) -> PdfBackendKind {
        PdfBackendKind::Flow
    }

    fn check_available(&self, _options: &PdfRenderOptions) -> Result<(), String> {
        Ok(())
    }

    fn render(&self, content: &PdfContent, options: &PdfRenderOptions) -> OcrResult<Vec<u8>> {
        let (doc, page, layer) =
            PdfDocument::new(&content.title, Mm(A4_WIDTH_MM), Mm(A4_HEIGHT_MM), LAYER_NAME);
        let fonts = DocFonts::install(&doc, &options.flow_fonts())?;

        let first_layer = doc.get_page(page).get_layer(layer);
        let mut w = PageWriter::new(
            &doc,
            first_layer,
            &fonts,
            PageMetrics::a4(MARGIN_MM, MARGIN_MM, MARGIN_MM),
        );

        for flowable in build_story(content) {
            match flowable {
                Flowable::Heading(text) => {
                    w.wrapped(&text, &TITLE);
                    w.space(TITLE_SPACE_AFTER_PT * PT_TO_MM);
                }
                Flowable::Paragraph(markup) => {
                    for line in markup_lines(&markup) {
                        w.wrapped(&line, &BODY);
                    }
                    w.space(BODY_SPACE_AFTER_PT * PT_TO_MM);
                }
                Flowable::Spacer(pt) => w.space(pt * PT_TO_MM),
            }
        }

        debug!("Flow layout used {} pages", w.pages());
        drop(w);
        save(doc)
    }
}
