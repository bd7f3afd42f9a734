//! Minimal text layout on top of printpdf: markup escaping, line wrapping
//! and a top-down page writer with automatic page breaks.
//!
//! printpdf only places strings at coordinates, it does not measure them.
//! Widths are estimated per character (full-width scripts 1 em, spaces
//! 0.28 em, everything else 0.55 em), which is close enough for left-aligned
//! body text and centred headings.

use crate::render::pdf::fonts::DocFonts;
use printpdf::{IndirectFontRef, Mm, PdfDocumentReference, PdfLayerReference};

pub const PT_TO_MM: f32 = 0.352_778;
pub const A4_WIDTH_MM: f32 = 210.0;
pub const A4_HEIGHT_MM: f32 = 297.0;
pub const LAYER_NAME: &str = "Layer 1";

// ── Markup ──────────────────────────────────────────────────────────────────

/// Escape `&`, `<`, `>` and turn newlines into `<br/>`.
pub fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "<br/>")
}

/// Split escaped paragraph markup into display lines.
///
/// Only `<br/>` is treated as a tag; entities are decoded so that text which
/// went through [`escape_markup`] comes back verbatim.
pub fn markup_lines(markup: &str) -> Vec<String> {
    markup
        .split("<br/>")
        .map(|line| {
            line.replace("&lt;", "<")
                .replace("&gt;", ">")
                .replace("&amp;", "&")
        })
        .collect()
}

// ── Measurement ─────────────────────────────────────────────────────────────

/// Estimated advance width of `c` in ems.
pub fn char_width_em(c: char) -> f32 {
    match c {
        ' ' => 0.28,
        '\u{1100}'..='\u{11FF}'
        | '\u{2E80}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FF00}'..='\u{FFEF}' => 1.0,
        _ => 0.55,
    }
}

pub fn text_width_mm(text: &str, size_pt: f32) -> f32 {
    text.chars().map(char_width_em).sum::<f32>() * size_pt * PT_TO_MM
}

/// Wrap one line to `max_width_mm`.
///
/// Breaks at the last space that fits; a word wider than the line is broken
/// between characters. An empty input yields one empty line.
pub fn wrap_line(line: &str, max_width_mm: f32, size_pt: f32) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut width = 0.0_f32;
    let em_mm = size_pt * PT_TO_MM;

    for c in line.chars() {
        let w = char_width_em(c) * em_mm;
        if width + w > max_width_mm && !current.is_empty() {
            match current.rfind(' ') {
                Some(pos) if pos > 0 && c != ' ' => {
                    let rest = current[pos + 1..].to_string();
                    current.truncate(pos);
                    out.push(std::mem::take(&mut current));
                    current = rest;
                }
                _ => out.push(std::mem::take(&mut current)),
            }
            if c == ' ' && current.is_empty() {
                width = 0.0;
                continue;
            }
            width = text_width_mm(&current, size_pt);
        }
        current.push(c);
        width += w;
    }
    out.push(current);
    out
}

// ── Page writer ─────────────────────────────────────────────────────────────

/// Page size and margins, in millimetres.
#[derive(Debug, Clone, Copy)]
pub struct PageMetrics {
    pub width: f32,
    pub height: f32,
    pub margin_x: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
}

impl PageMetrics {
    pub fn a4(margin_x: f32, margin_top: f32, margin_bottom: f32) -> Self {
        Self {
            width: A4_WIDTH_MM,
            height: A4_HEIGHT_MM,
            margin_x,
            margin_top,
            margin_bottom,
        }
    }

    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin_x
    }
}

/// How a run of text is set.
#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    pub size_pt: f32,
    /// Baseline-to-baseline distance.
    pub leading_mm: f32,
    pub bold: bool,
    pub centered: bool,
}

/// Writes lines top-down, starting a new page when the bottom margin is hit.
pub struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    fonts: &'a DocFonts,
    metrics: PageMetrics,
    layer: PdfLayerReference,
    /// Distance from the top edge of the current page.
    cursor: f32,
    pages: usize,
}

impl<'a> PageWriter<'a> {
    pub fn new(
        doc: &'a PdfDocumentReference,
        first_layer: PdfLayerReference,
        fonts: &'a DocFonts,
        metrics: PageMetrics,
    ) -> Self {
        Self {
            doc,
            fonts,
            metrics,
            layer: first_layer,
            cursor: metrics.margin_top,
            pages: 1,
        }
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Whether nothing has been written on the current page yet.
    pub fn at_page_top(&self) -> bool {
        self.cursor <= self.metrics.margin_top
    }

    pub fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(self.metrics.width), Mm(self.metrics.height), LAYER_NAME);
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor = self.metrics.margin_top;
        self.pages += 1;
    }

    /// Vertical gap. Gaps at the top of a page are dropped.
    pub fn space(&mut self, mm: f32) {
        if !self.at_page_top() {
            self.cursor += mm;
        }
    }

    fn font(&self, style: &TextStyle) -> &IndirectFontRef {
        if style.bold {
            &self.fonts.bold
        } else {
            &self.fonts.regular
        }
    }

    /// Place one already-wrapped line.
    pub fn line(&mut self, text: &str, style: &TextStyle) {
        if self.cursor + style.leading_mm > self.metrics.height - self.metrics.margin_bottom
            && !self.at_page_top()
        {
            self.new_page();
        }
        if !text.is_empty() {
            let text = self.fonts.prepare(text);
            let x = if style.centered {
                let w = text_width_mm(&text, style.size_pt);
                ((self.metrics.width - w) / 2.0).max(self.metrics.margin_x)
            } else {
                self.metrics.margin_x
            };
            let baseline = self.metrics.height - self.cursor - style.size_pt * PT_TO_MM;
            self.layer.use_text(
                text.into_owned(),
                style.size_pt,
                Mm(x),
                Mm(baseline),
                self.font(style),
            );
        }
        self.cursor += style.leading_mm;
    }

    /// Wrap `text` to the content width and place every resulting line.
    pub fn wrapped(&mut self, text: &str, style: &TextStyle) {
        for line in wrap_line(text, self.metrics.content_width(), style.size_pt) {
            self.line(&line, style);
        }
    }
}
