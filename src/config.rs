//! Configuration types for a PDF OCR run.
//!
//! Everything a run needs besides the model handle lives in [`OcrConfig`],
//! built via [`OcrConfigBuilder`]. The builder clamps numeric knobs into
//! their supported ranges and `build()` rejects combinations that cannot
//! work (an inverted page range, zero retry attempts).

use crate::error::OcrError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Lowest accepted rendering DPI.
pub const MIN_DPI: u32 = 150;
/// Highest accepted rendering DPI.
pub const MAX_DPI: u32 = 600;
/// Default rendering DPI.
pub const DEFAULT_DPI: u32 = 300;

/// Configuration for one OCR run.
///
/// # Example
/// ```rust
/// use pdf_vision_ocr::{DocumentProfile, OcrConfig, OutputFormat};
///
/// let config = OcrConfig::builder()
///     .profile(DocumentProfile::Table)
///     .output_format(OutputFormat::Pdf)
///     .dpi(200)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Rendering DPI. Range: 150–600. Default: 300.
    ///
    /// Scans are usually photographed at low effective resolution; 300 DPI
    /// keeps small print legible for the model while page images stay well
    /// under typical upload limits.
    pub dpi: u32,

    /// Optional contiguous page subrange (1-based, inclusive). Default: all pages.
    pub page_range: Option<PageRange>,

    /// Document-type profile selecting the transcription instruction. Default: general.
    pub profile: DocumentProfile,

    /// Output document format. Default: text.
    pub output_format: OutputFormat,

    /// Emit a "페이지 N" label before each page. Default: true.
    pub include_page_numbers: bool,

    /// Pause between consecutive model calls. Default: 1 s.
    ///
    /// Model APIs rate-limit per minute; a fixed pause between pages keeps a
    /// long document under the limit without any token accounting.
    #[serde(with = "duration_secs")]
    pub inter_page_delay: Duration,

    /// Retry policy applied to every page of the batch. Default: single attempt.
    pub retry: RetryPolicy,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            page_range: None,
            profile: DocumentProfile::default(),
            output_format: OutputFormat::default(),
            include_page_numbers: true,
            inter_page_delay: Duration::from_secs(1),
            retry: RetryPolicy::single_attempt(),
        }
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(MIN_DPI, MAX_DPI);
        self
    }

    pub fn page_range(mut self, range: PageRange) -> Self {
        self.config.page_range = Some(range);
        self
    }

    pub fn profile(mut self, profile: DocumentProfile) -> Self {
        self.config.profile = profile;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn include_page_numbers(mut self, v: bool) -> Self {
        self.config.include_page_numbers = v;
        self
    }

    pub fn inter_page_delay(mut self, delay: Duration) -> Self {
        self.config.inter_page_delay = delay;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, OcrError> {
        let c = &self.config;
        if c.dpi < MIN_DPI || c.dpi > MAX_DPI {
            return Err(OcrError::InvalidConfig(format!(
                "DPI must be {MIN_DPI}–{MAX_DPI}, got {}",
                c.dpi
            )));
        }
        if let Some(range) = c.page_range {
            range.validate()?;
        }
        if c.retry.max_attempts == 0 {
            return Err(OcrError::InvalidConfig(
                "Retry policy needs at least one attempt".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Document-type profile. Each profile maps to one fixed instruction in
/// [`crate::prompts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentProfile {
    /// Ordinary prose documents: keep line breaks and heading hierarchy. (default)
    #[default]
    General,
    /// Table-heavy documents: keep row/column structure and numbers.
    Table,
    /// Handwriting: mark illegible or guessed words.
    Handwritten,
    /// Forms: separate field names from filled-in values.
    Form,
}

impl DocumentProfile {
    /// Every profile, in UI order.
    pub const ALL: [DocumentProfile; 4] = [
        DocumentProfile::General,
        DocumentProfile::Table,
        DocumentProfile::Handwritten,
        DocumentProfile::Form,
    ];

    /// Stable identifier used in forms, CLI flags and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentProfile::General => "general",
            DocumentProfile::Table => "table",
            DocumentProfile::Handwritten => "handwritten",
            DocumentProfile::Form => "form",
        }
    }

    /// Human-facing label shown in the upload form.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentProfile::General => "일반 문서",
            DocumentProfile::Table => "표가 많은 문서",
            DocumentProfile::Handwritten => "손글씨",
            DocumentProfile::Form => "양식/폼",
        }
    }
}

impl fmt::Display for DocumentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentProfile {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(DocumentProfile::General),
            "table" => Ok(DocumentProfile::Table),
            "handwritten" => Ok(DocumentProfile::Handwritten),
            "form" => Ok(DocumentProfile::Form),
            other => Err(OcrError::InvalidConfig(format!(
                "Unknown document profile '{other}' (expected general, table, handwritten or form)"
            ))),
        }
    }
}

/// Output document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// UTF-8 plain text. (default)
    #[default]
    Text,
    /// Styled PDF document.
    Pdf,
}

impl OutputFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Pdf => "pdf",
        }
    }

    /// MIME type of the rendered bytes.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text/plain; charset=utf-8",
            OutputFormat::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(OutputFormat::Text),
            "pdf" => Ok(OutputFormat::Pdf),
            other => Err(OcrError::InvalidConfig(format!(
                "Unknown output format '{other}' (expected txt or pdf)"
            ))),
        }
    }
}

/// A contiguous page subrange, 1-based and inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub first: usize,
    pub last: usize,
}

impl PageRange {
    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }

    /// A range covering exactly one page.
    pub fn single(page: usize) -> Self {
        Self {
            first: page,
            last: page,
        }
    }

    /// Number of pages covered.
    pub fn len(&self) -> usize {
        self.last.saturating_sub(self.first) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }

    /// Consecutive subranges of at most `size` pages covering this range.
    pub fn chunks(self, size: usize) -> impl Iterator<Item = PageRange> {
        let size = size.max(1);
        (self.first..=self.last)
            .step_by(size)
            .map(move |first| PageRange::new(first, (first + size - 1).min(self.last)))
    }

    pub fn validate(&self) -> Result<(), OcrError> {
        if self.first == 0 {
            return Err(OcrError::InvalidConfig(
                "Pages are 1-indexed, minimum is 1 (got 0)".into(),
            ));
        }
        if self.first > self.last {
            return Err(OcrError::InvalidConfig(format!(
                "Invalid page range '{}-{}': first must be <= last",
                self.first, self.last
            )));
        }
        Ok(())
    }
}

/// How often a page's model call is attempted, and how long to wait between
/// attempts.
///
/// The wait after failed attempt `i` (0-based) is `base_delay · 2^i`: with
/// the default 1 s base that is 1 s → 2 s → 4 s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "duration_secs")]
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_secs(1),
        }
    }

    /// One attempt, no backoff.
    pub fn single_attempt() -> Self {
        Self::new(1)
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Backoff after failed attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upload_form() {
        let c = OcrConfig::default();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.profile, DocumentProfile::General);
        assert_eq!(c.output_format, OutputFormat::Text);
        assert!(c.include_page_numbers);
        assert_eq!(c.inter_page_delay, Duration::from_secs(1));
        assert_eq!(c.retry.max_attempts, 1);
    }

    #[test]
    fn dpi_is_clamped() {
        let c = OcrConfig::builder().dpi(1200).build().unwrap();
        assert_eq!(c.dpi, MAX_DPI);
        let c = OcrConfig::builder().dpi(72).build().unwrap();
        assert_eq!(c.dpi, MIN_DPI);
    }

    #[test]
    fn inverted_page_range_rejected() {
        let err = OcrConfig::builder()
            .page_range(PageRange::new(5, 2))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("5-2"), "got: {err}");

        let err = OcrConfig::builder()
            .page_range(PageRange::new(0, 2))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("1-indexed"));
    }

    #[test]
    fn zero_attempts_rejected() {
        assert!(OcrConfig::builder()
            .retry(RetryPolicy::new(0))
            .build()
            .is_err());
    }

    #[test]
    fn profile_parsing() {
        for p in DocumentProfile::ALL {
            assert_eq!(p.as_str().parse::<DocumentProfile>().unwrap(), p);
        }
        assert_eq!(
            " Table ".parse::<DocumentProfile>().unwrap(),
            DocumentProfile::Table
        );
        assert!("receipt".parse::<DocumentProfile>().is_err());
    }

    #[test]
    fn output_format_parsing_and_extension() {
        assert_eq!("txt".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("PDF".parse::<OutputFormat>().unwrap(), OutputFormat::Pdf);
        assert_eq!(OutputFormat::Pdf.extension(), "pdf");
        assert_eq!(OutputFormat::Pdf.mime_type(), "application/pdf");
    }

    #[test]
    fn backoff_doubles_from_one_second() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(0), Duration::from_secs(1));
        assert_eq!(p.backoff(1), Duration::from_secs(2));
        assert_eq!(p.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn page_range_chunks_cover_the_range() {
        let chunks: Vec<PageRange> = PageRange::new(3, 25).chunks(10).collect();
        assert_eq!(
            chunks,
            vec![
                PageRange::new(3, 12),
                PageRange::new(13, 22),
                PageRange::new(23, 25)
            ]
        );
        assert_eq!(PageRange::single(4).chunks(10).collect::<Vec<_>>(), vec![PageRange::single(4)]);
        assert_eq!(PageRange::new(1, 3).chunks(0).count(), 3);
    }

    #[test]
    fn page_range_len() {
        assert_eq!(PageRange::new(3, 5).len(), 3);
        assert_eq!(PageRange::single(7).len(), 1);
    }

    #[test]
    fn config_round_trips_through_json() {
        let c = OcrConfig::builder()
            .inter_page_delay(Duration::from_millis(500))
            .build()
            .unwrap();
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"inter_page_delay\":0.5"), "got: {json}");
        let back: OcrConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.inter_page_delay, Duration::from_millis(500));
    }
}
