//! End-to-end run: PDF bytes in, rendered document out.
//!
//! A run is rasterise → transcribe each page → render. Everything the run
//! needs is carried by a [`RunContext`] passed by reference; there is no
//! global or session state, so the CLI and every server request build their
//! own context.
//!
//! Page-local failures (a page that cannot be converted, a model call that
//! fails) never abort the run. A missing rasterizer, a corrupt document or a
//! render failure does, and nothing is produced.

use crate::config::{OcrConfig, OutputFormat};
use crate::error::{OcrError, OcrResult};
use crate::output::{BatchStats, ConversionOutput};
use crate::pipeline::batch::{run_batch, BatchOptions};
use crate::pipeline::rasterize::{RasterOptions, Rasterizer};
use crate::pipeline::transcribe::Transcriber;
use crate::progress::BatchProgress;
use crate::render::{render, PdfRenderOptions, RenderOptions};
use crate::vision::VisionModel;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Stem used when the upload has no usable name.
const FALLBACK_STEM: &str = "document";

/// Everything one run needs.
#[derive(Clone)]
pub struct RunContext {
    pub model: Arc<dyn VisionModel>,
    pub rasterizer: Rasterizer,
    pub config: OcrConfig,
    pub pdf: PdfRenderOptions,
}

impl RunContext {
    pub fn new(model: Arc<dyn VisionModel>, rasterizer: Rasterizer, config: OcrConfig) -> Self {
        Self {
            model,
            rasterizer,
            config,
            pdf: PdfRenderOptions::default(),
        }
    }

    pub fn with_pdf_options(mut self, pdf: PdfRenderOptions) -> Self {
        self.pdf = pdf;
        self
    }

    fn raster_options(&self) -> RasterOptions {
        RasterOptions {
            dpi: self.config.dpi,
            page_range: self.config.page_range,
        }
    }

    fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            delay: self.config.inter_page_delay,
            retry: self.config.retry,
        }
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            include_page_numbers: self.config.include_page_numbers,
            pdf: self.pdf.clone(),
        }
    }
}

/// Run the whole pipeline on `pdf`.
///
/// # Errors
/// Only run-fatal errors are returned: rasterizer unavailable, corrupt
/// document, working-directory I/O, output rendering. A document whose pages
/// all failed still renders, with every page marked as an error.
pub async fn run(
    ctx: &RunContext,
    pdf: &[u8],
    progress: Option<&dyn BatchProgress>,
) -> OcrResult<ConversionOutput> {
    let total_start = Instant::now();
    info!(
        "Starting OCR run: {} bytes, profile={}, format={}, model={}",
        pdf.len(),
        ctx.config.profile,
        ctx.config.output_format,
        ctx.model.name()
    );

    // ── Step 1: Rasterise ────────────────────────────────────────────────
    let raster_start = Instant::now();
    let doc = ctx.rasterizer.rasterize(pdf, &ctx.raster_options()).await?;
    let rasterize_duration_ms = raster_start.elapsed().as_millis() as u64;
    debug!("Page images in {}", doc.work_dir().display());

    // ── Step 2: Transcribe page by page ──────────────────────────────────
    let transcribe_start = Instant::now();
    let transcriber = Transcriber::new(Arc::clone(&ctx.model));
    let results = run_batch(
        &transcriber,
        doc.pages(),
        ctx.config.profile,
        &ctx.batch_options(),
        progress,
    )
    .await;
    let transcribe_duration_ms = transcribe_start.elapsed().as_millis() as u64;

    let requested_pages = doc.rendered_pages();
    let rasterized_pages = doc.len();
    if let Err(e) = doc.close() {
        warn!("{}", e);
    }

    // ── Step 3: Render ───────────────────────────────────────────────────
    let render_start = Instant::now();
    let format = ctx.config.output_format;
    let options = ctx.render_options();
    let to_render = results.clone();
    let bytes = tokio::task::spawn_blocking(move || render(&to_render, format, &options))
        .await
        .map_err(|e| OcrError::Internal(format!("Render task panicked: {}", e)))??;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let stats = BatchStats {
        requested_pages,
        rasterized_pages,
        succeeded_pages: results.success_count(),
        failed_pages: results.error_count(),
        rasterize_duration_ms,
        transcribe_duration_ms,
        render_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "OCR run complete: {}/{} pages succeeded, {} failed, {}ms total \
         (rasterise {}ms, transcribe {}ms, render {}ms)",
        stats.succeeded_pages,
        stats.rasterized_pages,
        stats.failed_pages,
        stats.total_duration_ms,
        stats.rasterize_duration_ms,
        stats.transcribe_duration_ms,
        stats.render_duration_ms
    );

    Ok(ConversionOutput {
        bytes,
        format,
        results,
        stats,
    })
}

/// Read a PDF from disk and [`run`] it.
pub async fn run_file(
    ctx: &RunContext,
    path: impl AsRef<Path>,
    progress: Option<&dyn BatchProgress>,
) -> OcrResult<ConversionOutput> {
    let path = path.as_ref();
    let pdf = tokio::fs::read(path)
        .await
        .map_err(|e| OcrError::io("Failed to read input", path, e))?;
    run(ctx, &pdf, progress).await
}

/// Write `bytes` to `path` atomically.
///
/// The data goes to a temp file next to `path` which is then renamed over
/// it, so a failed write never leaves a partial document behind.
pub fn write_output(path: impl AsRef<Path>, bytes: &[u8]) -> OcrResult<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .map_err(|e| OcrError::io("Failed to create output directory", parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| OcrError::io("Failed to create temp file in", parent, e))?;
    tmp.write_all(bytes)
        .map_err(|e| OcrError::io("Failed to write", tmp.path().to_path_buf(), e))?;
    tmp.persist(path)
        .map_err(|e| OcrError::io("Failed to write output", path, e.error))?;
    Ok(())
}

/// Download name for a run's output: `<stem>_ocr.<ext>`.
///
/// `source` is the uploaded file name; any directory part is ignored.
pub fn output_filename(source: &str, format: OutputFormat) -> String {
    // Browsers on Windows may send the full client path.
    let base = source.rsplit(['/', '\\']).next().unwrap_or(source);
    let stem = Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_STEM);
    format!("{}_ocr.{}", stem, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::EncodedImage;
    use crate::pipeline::rasterize::RasterizerConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VisionModel for CountingModel {
        fn name(&self) -> String {
            "counting".into()
        }

        async fn describe_image(
            &self,
            _image: &EncodedImage,
            _instruction: &str,
        ) -> OcrResult<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some("text".into()))
        }

        async fn check_connection(&self) -> OcrResult<()> {
            Ok(())
        }
    }

    #[test]
    fn output_name_uses_stem_and_extension() {
        assert_eq!(output_filename("scan.pdf", OutputFormat::Text), "scan_ocr.txt");
        assert_eq!(output_filename("scan.PDF", OutputFormat::Pdf), "scan_ocr.pdf");
        assert_eq!(
            output_filename("계약서 사본.pdf", OutputFormat::Text),
            "계약서 사본_ocr.txt"
        );
    }

    #[test]
    fn output_name_ignores_client_directories() {
        assert_eq!(
            output_filename(r"C:\Users\kim\scan.pdf", OutputFormat::Pdf),
            "scan_ocr.pdf"
        );
        assert_eq!(output_filename("a/b/c.pdf", OutputFormat::Text), "c_ocr.txt");
    }

    #[test]
    fn output_name_falls_back_for_empty_names() {
        assert_eq!(output_filename("", OutputFormat::Text), "document_ocr.txt");
        assert_eq!(output_filename("dir/", OutputFormat::Pdf), "document_ocr.pdf");
    }

    #[test]
    fn write_output_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("scan_ocr.txt");
        write_output(&path, b"first").unwrap();
        write_output(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn missing_rasterizer_aborts_before_any_model_call() {
        let model = Arc::new(CountingModel {
            calls: AtomicUsize::new(0),
        });
        let rasterizer = Rasterizer::new(RasterizerConfig {
            poppler_dir: Some("/nonexistent/poppler/bin".into()),
            work_root: None,
        });
        let ctx = RunContext::new(model.clone(), rasterizer, OcrConfig::default());

        let err = run(&ctx, b"%PDF-1.4\n", None).await.unwrap_err();
        assert!(
            matches!(err, OcrError::RasterizerUnavailable { .. }),
            "got: {err:?}"
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_file_reports_missing_input_as_io() {
        let ctx = RunContext::new(
            Arc::new(CountingModel {
                calls: AtomicUsize::new(0),
            }),
            Rasterizer::default(),
            OcrConfig::default(),
        );
        let err = run_file(&ctx, "/nonexistent/scan.pdf", None)
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::Io { .. }), "got: {err:?}");
    }

    #[cfg(unix)]
    mod with_fake_poppler {
        use super::*;
        use crate::config::PageRange;
        use crate::pipeline::rasterize::fake_poppler::FakePoppler;
        use std::time::Duration;

        fn context(fake: &FakePoppler, config: OcrConfig) -> RunContext {
            let model = Arc::new(CountingModel {
                calls: AtomicUsize::new(0),
            });
            RunContext::new(model, Rasterizer::new(fake.config()), config)
        }

        fn labelled_pages(output: &ConversionOutput) -> Vec<usize> {
            output.results.iter().map(|(_, r)| r.page).collect()
        }

        #[tokio::test]
        async fn page_range_output_keeps_source_page_numbers() {
            let fake = FakePoppler::new(9, &[]);
            let config = OcrConfig::builder()
                .page_range(PageRange::new(5, 7))
                .inter_page_delay(Duration::ZERO)
                .build()
                .unwrap();

            let output = run(&context(&fake, config), b"%PDF-1.4\n", None)
                .await
                .unwrap();

            assert_eq!(labelled_pages(&output), vec![5, 6, 7]);
            assert!(output.results.is_contiguous());
            for (_, r) in output.results.iter() {
                assert!(r.image_path.ends_with(format!("page_{:04}.png", r.page)));
            }
            let text = output.as_text().unwrap();
            assert!(text.contains("총 페이지 수: 3"));
            assert!(text.contains("페이지 5\n"));
            assert!(text.contains("페이지 7\n"));
            assert!(!text.contains("페이지 1\n"));
            assert_eq!(std::fs::read_dir(fake.work.path()).unwrap().count(), 0);
        }

        #[tokio::test]
        async fn skipped_page_does_not_shift_later_labels() {
            let fake = FakePoppler::new(3, &[2]);
            let config = OcrConfig::builder()
                .inter_page_delay(Duration::ZERO)
                .build()
                .unwrap();

            let output = run(&context(&fake, config), b"%PDF-1.4\n", None)
                .await
                .unwrap();

            assert_eq!(labelled_pages(&output), vec![1, 3]);
            assert_eq!(output.stats.requested_pages, 3);
            assert_eq!(output.stats.rasterized_pages, 2);
            assert!(output.as_text().unwrap().contains("페이지 3\n"));
        }
    }
}
