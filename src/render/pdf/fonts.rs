//! Font discovery for PDF output.
//!
//! Page text is mostly Hangul, which none of the 14 standard PDF fonts
//! cover. A TrueType font is embedded when one can be found; otherwise the
//! document falls back to Helvetica and every character outside Latin-1 is
//! replaced with `?` so the file still opens everywhere.

use crate::error::{OcrError, OcrResult};
use printpdf::{BuiltinFont, IndirectFontRef, PdfDocumentReference};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Font file the simple backend is built around.
pub const DEJAVU_CONDENSED: &str = "DejaVuSansCondensed.ttf";

/// System fonts known to cover Hangul (or at least Latin + symbols), in
/// preference order.
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "C:/Windows/Fonts/malgun.ttf",
    "/System/Library/Fonts/AppleGothic.ttf",
    "/System/Library/Fonts/Supplemental/AppleGothic.ttf",
    "/usr/share/fonts/truetype/nanum/NanumGothic.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
];

/// Locations of the DejaVu Sans Condensed asset: working directory, a
/// `fonts/` folder next to it, then the usual Linux package path.
pub fn dejavu_condensed_locations() -> Vec<PathBuf> {
    vec![
        PathBuf::from(DEJAVU_CONDENSED),
        Path::new("fonts").join(DEJAVU_CONDENSED),
        Path::new("/usr/share/fonts/truetype/dejavu").join(DEJAVU_CONDENSED),
    ]
}

/// The system candidate list as paths.
pub fn system_font_candidates() -> Vec<PathBuf> {
    SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from).collect()
}

/// Where the document's glyphs come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    Embedded(PathBuf),
    /// Built-in Helvetica; text is reduced to Latin-1.
    Builtin,
}

/// Regular and heading fonts registered with one document.
pub struct DocFonts {
    pub regular: IndirectFontRef,
    pub bold: IndirectFontRef,
    pub source: FontSource,
}

impl DocFonts {
    /// Embed the first candidate that loads; fall back to Helvetica.
    pub fn install(doc: &PdfDocumentReference, candidates: &[PathBuf]) -> OcrResult<Self> {
        if let Some(fonts) = Self::try_embed(doc, candidates) {
            return Ok(fonts);
        }
        warn!(
            "No Unicode font found (tried {} locations); using Helvetica, non-Latin text will show as '?'",
            candidates.len()
        );
        Self::builtin(doc)
    }

    /// Embed the first candidate that loads, or `None`.
    pub fn try_embed(doc: &PdfDocumentReference, candidates: &[PathBuf]) -> Option<Self> {
        for path in candidates {
            let bytes = match std::fs::read(path) {
                Ok(b) => b,
                Err(e) => {
                    debug!("Font {} not usable: {}", path.display(), e);
                    continue;
                }
            };
            match doc.add_external_font(&bytes[..]) {
                Ok(font) => {
                    info!("Embedding font {}", path.display());
                    return Some(Self {
                        regular: font.clone(),
                        bold: font,
                        source: FontSource::Embedded(path.clone()),
                    });
                }
                Err(e) => debug!("Font {} failed to load: {:?}", path.display(), e),
            }
        }
        None
    }

    fn builtin(doc: &PdfDocumentReference) -> OcrResult<Self> {
        let load = |font: BuiltinFont| {
            doc.add_builtin_font(font)
                .map_err(|e| OcrError::OutputRenderFailed {
                    format: "pdf".into(),
                    detail: format!("built-in font: {:?}", e),
                })
        };
        Ok(Self {
            regular: load(BuiltinFont::Helvetica)?,
            bold: load(BuiltinFont::HelveticaBold)?,
            source: FontSource::Builtin,
        })
    }

    pub fn is_builtin(&self) -> bool {
        self.source == FontSource::Builtin
    }

    /// Text as it can be drawn with these fonts.
    pub fn prepare<'t>(&self, text: &'t str) -> Cow<'t, str> {
        if self.is_builtin() {
            latin1_lossy(text)
        } else {
            Cow::Borrowed(text)
        }
    }
}

/// Replace every character above U+00FF with `?`.
pub fn latin1_lossy(text: &str) -> Cow<'_, str> {
    if text.chars().all(|c| (c as u32) <= 0xFF) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(
            text.chars()
                .map(|c| if (c as u32) <= 0xFF { c } else { '?' })
                .collect(),
        )
    }
}
