//! PDF rasterisation: PDF bytes → ordered `page_NNNN.png` files via poppler.
//!
//! Pages are rendered by the `pdftoppm` binary rather than an in-process
//! library so the service has no native link-time dependency; poppler is a
//! one-line install on every platform (see [`installation_guide`]).
//!
//! ## Lifecycle
//!
//! 1. Locate `pdftoppm` (configured directory, else `PATH`). Nothing touches
//!    the file system before this succeeds.
//! 2. Check the `%PDF` magic, create a run-private [`TempDir`], write the
//!    input there, and count its pages (`pdfinfo`).
//! 3. Render the requested pages to uncompressed PPM, [`CHUNK_PAGES`] at a
//!    time.
//! 4. In `spawn_blocking`, per chunk: decode each PPM, run
//!    [`prepare_for_ocr`](crate::pipeline::preprocess::prepare_for_ocr), write
//!    `page_NNNN.png`, delete the PPM. A page that fails here is logged and
//!    skipped.
//!
//! The returned [`RasterizedDocument`] owns the directory; dropping it
//! deletes every page image.

use crate::config::{PageRange, DEFAULT_DPI};
use crate::error::{OcrError, OcrResult};
use crate::pipeline::preprocess::prepare_for_ocr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const PDFTOPPM: &str = "pdftoppm";
pub const PDFINFO: &str = "pdfinfo";

/// Resolution used when counting pages by conversion.
const COUNT_FALLBACK_DPI: u32 = 20;
/// Pages rendered per pdftoppm call.
pub const CHUNK_PAGES: usize = 10;
const RAW_PREFIX: &str = "raw";
const INPUT_NAME: &str = "input.pdf";

/// Where to find poppler and where to put working files.
#[derive(Debug, Clone, Default)]
pub struct RasterizerConfig {
    /// Directory holding `pdftoppm`/`pdfinfo`. `None` searches `PATH`.
    pub poppler_dir: Option<PathBuf>,
    /// Parent for per-run temp directories. `None` uses the system temp dir.
    pub work_root: Option<PathBuf>,
}

/// Per-call rendering options.
#[derive(Debug, Clone, Copy)]
pub struct RasterOptions {
    pub dpi: u32,
    pub page_range: Option<PageRange>,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            page_range: None,
        }
    }
}

/// One rasterised page on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-based page number in the source document.
    pub page: usize,
    pub path: PathBuf,
}

/// The page images of one run, plus the temp directory that holds them.
#[derive(Debug)]
pub struct RasterizedDocument {
    pages: Vec<PageImage>,
    /// Pages pdftoppm produced, including any skipped during conversion.
    rendered: usize,
    dir: TempDir,
}

impl RasterizedDocument {
    /// Pages in ascending page-number order.
    pub fn pages(&self) -> &[PageImage] {
        &self.pages
    }

    pub fn image_paths(&self) -> Vec<PathBuf> {
        self.pages.iter().map(|p| p.path.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Pages rendered by poppler. Larger than [`len`](Self::len) when some
    /// failed to convert.
    pub fn rendered_pages(&self) -> usize {
        self.rendered
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn work_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Delete the working directory now, reporting any failure.
    pub fn close(self) -> OcrResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| OcrError::io("Failed to remove work directory", path, e))
    }
}

/// Renders PDF pages to preprocessed PNG files.
#[derive(Debug, Clone, Default)]
pub struct Rasterizer {
    config: RasterizerConfig,
}

impl Rasterizer {
    pub fn new(config: RasterizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RasterizerConfig {
        &self.config
    }

    /// Render the requested pages of `pdf`.
    pub async fn rasterize(
        &self,
        pdf: &[u8],
        options: &RasterOptions,
    ) -> OcrResult<RasterizedDocument> {
        let pdftoppm = self.locate(PDFTOPPM).await?;
        check_pdf_magic(pdf)?;
        if let Some(range) = options.page_range {
            range.validate()?;
        }

        let work = self.create_work_dir()?;
        let input = write_input(work.path(), pdf).await?;

        let count = self.count_pages(&pdftoppm, &input, work.path()).await?;
        let wanted = options.page_range.unwrap_or(PageRange::new(1, count));
        if count == 0 || wanted.first > count {
            warn!(
                "Page range {}-{} is outside the document ({} pages); nothing to render",
                wanted.first, wanted.last, count
            );
            return Ok(RasterizedDocument {
                pages: Vec::new(),
                rendered: 0,
                dir: work,
            });
        }
        let range = PageRange::new(wanted.first, wanted.last.min(count));

        info!(
            "Rasterising pages {}-{} at {} DPI",
            range.first, range.last, options.dpi
        );
        let start = Instant::now();
        let raw_prefix = work.path().join(RAW_PREFIX);
        let mut pages = Vec::with_capacity(range.len());
        let mut rendered = 0;

        // At most CHUNK_PAGES raw PPMs exist at a time.
        for chunk in range.chunks(CHUNK_PAGES) {
            run_pdftoppm(&pdftoppm, &input, &raw_prefix, options.dpi, Some(chunk)).await?;
            let raws = list_raw_pages(work.path(), RAW_PREFIX)?;
            rendered += raws.len();
            let dir = work.path().to_path_buf();
            let converted = tokio::task::spawn_blocking(move || convert_raw_pages(&dir, raws))
                .await
                .map_err(|e| OcrError::Internal(format!("Page conversion task panicked: {}", e)))?;
            debug!(
                "Pages {}-{}: {} converted",
                chunk.first,
                chunk.last,
                converted.len()
            );
            pages.extend(converted);
        }
        remove_quietly(&input);

        info!(
            "Rasterised {} pages in {:?}",
            pages.len(),
            start.elapsed()
        );
        if pages.len() < rendered {
            warn!(
                "{} of {} pages could not be converted and were skipped",
                rendered - pages.len(),
                rendered
            );
        }
        Ok(RasterizedDocument {
            pages,
            rendered,
            dir: work,
        })
    }

    /// Render exactly one page.
    pub async fn rasterize_page(
        &self,
        pdf: &[u8],
        page: usize,
        dpi: u32,
    ) -> OcrResult<RasterizedDocument> {
        let options = RasterOptions {
            dpi,
            page_range: Some(PageRange::single(page)),
        };
        let doc = self.rasterize(pdf, &options).await?;
        if doc.is_empty() {
            return Err(OcrError::PageConversionFailed {
                page,
                detail: "page could not be rendered".into(),
            });
        }
        Ok(doc)
    }

    /// Number of pages in `pdf`.
    ///
    /// Reads `pdfinfo`; if that is missing or fails, converts the whole
    /// document at a very low DPI and counts the output.
    pub async fn page_count(&self, pdf: &[u8]) -> OcrResult<usize> {
        let pdftoppm = self.locate(PDFTOPPM).await?;
        check_pdf_magic(pdf)?;
        let work = self.create_work_dir()?;
        let input = write_input(work.path(), pdf).await?;
        self.count_pages(&pdftoppm, &input, work.path()).await
    }

    /// Delete the given files. Missing files are not an error.
    ///
    /// Returns how many files were actually removed.
    pub fn cleanup(paths: &[PathBuf]) -> usize {
        paths
            .iter()
            .filter(|path| match std::fs::remove_file(path) {
                Ok(()) => {
                    debug!("Removed {}", path.display());
                    true
                }
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => {
                    warn!("Failed to remove {}: {}", path.display(), e);
                    false
                }
            })
            .count()
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn binary_path(&self, name: &str) -> PathBuf {
        let file = format!("{name}{}", std::env::consts::EXE_SUFFIX);
        match &self.config.poppler_dir {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        }
    }

    /// Resolve a poppler binary and check it runs by launching it with `-v`.
    async fn locate(&self, name: &str) -> OcrResult<PathBuf> {
        let path = self.binary_path(name);
        let check = Command::new(&path)
            .arg("-v")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match check {
            Ok(_) => Ok(path),
            Err(e) => {
                debug!("Launching {} -v failed: {}", path.display(), e);
                Err(OcrError::RasterizerUnavailable {
                    binary: name.to_string(),
                    guide: installation_guide(),
                })
            }
        }
    }

    fn create_work_dir(&self) -> OcrResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pdf-ocr-");
        match &self.config.work_root {
            Some(root) => builder
                .tempdir_in(root)
                .map_err(|e| OcrError::io("Failed to create work directory in", root, e)),
            None => builder
                .tempdir()
                .map_err(|e| OcrError::io("Failed to create work directory in", std::env::temp_dir(), e)),
        }
    }

    async fn count_pages(&self, pdftoppm: &Path, input: &Path, work: &Path) -> OcrResult<usize> {
        match self.pdfinfo_pages(input).await {
            Ok(n) => return Ok(n),
            Err(detail) => warn!("pdfinfo failed ({}); counting pages by conversion", detail),
        }

        let scratch = work.join("count");
        tokio::fs::create_dir_all(&scratch)
            .await
            .map_err(|e| OcrError::io("Failed to create directory", &scratch, e))?;
        run_pdftoppm(pdftoppm, input, &scratch.join(RAW_PREFIX), COUNT_FALLBACK_DPI, None).await?;
        let count = list_raw_pages(&scratch, RAW_PREFIX)?.len();
        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            warn!("Failed to remove {}: {}", scratch.display(), e);
        }
        Ok(count)
    }

    async fn pdfinfo_pages(&self, input: &Path) -> Result<usize, String> {
        let output = Command::new(self.binary_path(PDFINFO))
            .arg(input)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| e.to_string())?;
        if !output.status.success() {
            return Err(format!(
                "exit status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        parse_pdfinfo_pages(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| "no 'Pages:' line in output".to_string())
    }
}

/// Per-platform instructions for installing poppler.
pub fn installation_guide() -> String {
    "Poppler installation guide:

[Windows]
1. Download the Windows binaries (https://github.com/oschwartz10612/poppler-windows/releases)
2. Extract and add the bin folder to PATH, or pass --poppler-path / set POPPLER_PATH

[macOS]
brew install poppler

[Ubuntu/Debian]
sudo apt-get install poppler-utils

[CentOS/RHEL]
sudo yum install poppler-utils

[Arch Linux]
sudo pacman -S poppler"
        .to_string()
}

fn check_pdf_magic(pdf: &[u8]) -> OcrResult<()> {
    if pdf.starts_with(b"%PDF") {
        Ok(())
    } else {
        Err(OcrError::DocumentCorrupt {
            detail: "missing %PDF header".into(),
        })
    }
}

async fn write_input(dir: &Path, pdf: &[u8]) -> OcrResult<PathBuf> {
    let path = dir.join(INPUT_NAME);
    tokio::fs::write(&path, pdf)
        .await
        .map_err(|e| OcrError::io("Failed to write input PDF", &path, e))?;
    Ok(path)
}

async fn run_pdftoppm(
    pdftoppm: &Path,
    input: &Path,
    out_prefix: &Path,
    dpi: u32,
    range: Option<PageRange>,
) -> OcrResult<()> {
    let mut cmd = Command::new(pdftoppm);
    cmd.arg("-r").arg(dpi.to_string());
    if let Some(r) = range {
        cmd.arg("-f")
            .arg(r.first.to_string())
            .arg("-l")
            .arg(r.last.to_string());
    }
    cmd.arg(input).arg(out_prefix).stdin(Stdio::null());

    let output = cmd
        .output()
        .await
        .map_err(|e| OcrError::RasterizerUnavailable {
            binary: format!("{} ({})", pdftoppm.display(), e),
            guide: installation_guide(),
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    match output.status.code() {
        Some(0) => Ok(()),
        // pdftoppm: 1 = error opening the PDF
        Some(1) => Err(OcrError::DocumentCorrupt { detail: stderr }),
        _ => Err(OcrError::Internal(format!(
            "pdftoppm exited with {}: {}",
            output.status, stderr
        ))),
    }
}

/// `Pages:` value from `pdfinfo` output.
fn parse_pdfinfo_pages(stdout: &str) -> Option<usize> {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|v| v.trim().parse().ok())
}

/// Page number from a pdftoppm output name such as `raw-07.ppm`.
///
/// pdftoppm pads the number to the digit count of the last page, so
/// lexical order is not reliable across documents; the number is parsed.
fn parse_raw_page(file_name: &str, prefix: &str) -> Option<usize> {
    file_name
        .strip_prefix(prefix)?
        .strip_prefix('-')?
        .strip_suffix(".ppm")?
        .parse()
        .ok()
}

fn list_raw_pages(dir: &Path, prefix: &str) -> OcrResult<Vec<(usize, PathBuf)>> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| OcrError::io("Failed to list directory", dir, e))?;
    let mut pages: Vec<(usize, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            parse_raw_page(name.to_str()?, prefix).map(|n| (n, entry.path()))
        })
        .collect();
    pages.sort_by_key(|(n, _)| *n);
    Ok(pages)
}

/// File name for a page image: `page_0001.png`.
pub fn page_file_name(page: usize) -> String {
    format!("page_{:04}.png", page)
}

fn convert_raw_pages(dir: &Path, raws: Vec<(usize, PathBuf)>) -> Vec<PageImage> {
    raws.into_iter()
        .filter_map(|(page, raw)| {
            let result = convert_one(dir, page, &raw);
            remove_quietly(&raw);
            match result {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!("{} (skipped)", e);
                    None
                }
            }
        })
        .collect()
}

fn convert_one(dir: &Path, page: usize, raw: &Path) -> OcrResult<PageImage> {
    let decoded = image::open(raw).map_err(|e| OcrError::PageConversionFailed {
        page,
        detail: format!("decode: {}", e),
    })?;
    let prepared = prepare_for_ocr(decoded);
    let path = dir.join(page_file_name(page));
    prepared
        .save_with_format(&path, image::ImageFormat::Png)
        .map_err(|e| OcrError::PageConversionFailed {
            page,
            detail: format!("write {}: {}", path.display(), e),
        })?;
    debug!("Page {} → {}", page, path.display());
    Ok(PageImage { page, path })
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn missing_poppler(work_root: &Path) -> Rasterizer {
        Rasterizer::new(RasterizerConfig {
            poppler_dir: Some(PathBuf::from("/nonexistent/poppler/bin")),
            work_root: Some(work_root.to_path_buf()),
        })
    }

    #[test]
    fn parses_padded_raw_names() {
        assert_eq!(parse_raw_page("raw-1.ppm", "raw"), Some(1));
        assert_eq!(parse_raw_page("raw-012.ppm", "raw"), Some(12));
        assert_eq!(parse_raw_page("raw-3.png", "raw"), None);
        assert_eq!(parse_raw_page("input.pdf", "raw"), None);
        assert_eq!(parse_raw_page("rawx-1.ppm", "raw"), None);
    }

    #[test]
    fn raw_pages_sort_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["raw-10.ppm", "raw-9.ppm", "raw-1.ppm", "other.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let pages: Vec<usize> = list_raw_pages(dir.path(), "raw")
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(pages, vec![1, 9, 10]);
    }

    #[test]
    fn parses_pdfinfo_output() {
        let out = "Title:          scan\nProducer:       x\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_pdfinfo_pages(out), Some(12));
        assert_eq!(parse_pdfinfo_pages("Title: x\n"), None);
    }

    #[test]
    fn page_file_names_are_zero_padded() {
        assert_eq!(page_file_name(1), "page_0001.png");
        assert_eq!(page_file_name(123), "page_0123.png");
    }

    #[test]
    fn guide_covers_every_platform() {
        let guide = installation_guide();
        for needle in ["Windows", "brew install poppler", "apt-get", "yum", "pacman"] {
            assert!(guide.contains(needle), "missing {needle}");
        }
    }

    #[tokio::test]
    async fn missing_binary_fails_before_touching_disk() {
        let root = tempfile::tempdir().unwrap();
        let err = missing_poppler(root.path())
            .rasterize(b"%PDF-1.4 whatever", &RasterOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::RasterizerUnavailable { .. }), "got: {err:?}");
        assert!(err.to_string().contains("brew install poppler"));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_binary_also_blocks_page_count() {
        let root = tempfile::tempdir().unwrap();
        let err = missing_poppler(root.path())
            .page_count(b"%PDF-1.4")
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::RasterizerUnavailable { .. }));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn non_pdf_is_corrupt() {
        let err = check_pdf_magic(b"<html>").unwrap_err();
        assert!(matches!(err, OcrError::DocumentCorrupt { .. }));
        assert!(check_pdf_magic(b"%PDF-1.7\n").is_ok());
    }

    #[test]
    fn cleanup_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("page_0001.png");
        std::fs::write(&present, b"x").unwrap();
        let missing = dir.path().join("page_0002.png");
        let removed = Rasterizer::cleanup(&[present.clone(), missing]);
        assert_eq!(removed, 1);
        assert!(!present.exists());
    }

    #[cfg(unix)]
    mod with_fake_poppler {
        use super::super::fake_poppler::FakePoppler;
        use super::*;

        fn numbers(doc: &RasterizedDocument) -> Vec<usize> {
            doc.pages().iter().map(|p| p.page).collect()
        }

        fn options(page_range: Option<PageRange>) -> RasterOptions {
            RasterOptions {
                dpi: 150,
                page_range,
            }
        }

        #[tokio::test]
        async fn renders_in_bounded_chunks() {
            let fake = FakePoppler::new(12, &[]);
            let doc = Rasterizer::new(fake.config())
                .rasterize(b"%PDF-1.4\n", &options(None))
                .await
                .unwrap();

            assert_eq!(numbers(&doc), (1..=12).collect::<Vec<_>>());
            assert_eq!(doc.rendered_pages(), 12);
            // each render starts with no raw pages left over
            assert_eq!(fake.calls(), vec!["1-10 0", "11-12 0"]);
        }

        #[tokio::test]
        async fn range_keeps_source_page_numbers() {
            let fake = FakePoppler::new(9, &[]);
            let doc = Rasterizer::new(fake.config())
                .rasterize(b"%PDF-1.4\n", &options(Some(PageRange::new(5, 7))))
                .await
                .unwrap();

            assert_eq!(numbers(&doc), vec![5, 6, 7]);
            let names: Vec<String> = doc
                .image_paths()
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect();
            assert_eq!(names, vec!["page_0005.png", "page_0006.png", "page_0007.png"]);
            assert_eq!(fake.calls(), vec!["5-7 0"]);
        }

        #[tokio::test]
        async fn unconvertible_page_is_skipped_without_renumbering() {
            let fake = FakePoppler::new(4, &[2]);
            let doc = Rasterizer::new(fake.config())
                .rasterize(b"%PDF-1.4\n", &options(None))
                .await
                .unwrap();

            assert_eq!(numbers(&doc), vec![1, 3, 4]);
            assert_eq!(doc.rendered_pages(), 4);
            assert!(doc.pages()[1].path.ends_with("page_0003.png"));
        }

        #[tokio::test]
        async fn range_past_the_end_renders_nothing() {
            let fake = FakePoppler::new(3, &[]);
            let doc = Rasterizer::new(fake.config())
                .rasterize(b"%PDF-1.4\n", &options(Some(PageRange::new(5, 6))))
                .await
                .unwrap();

            assert!(doc.is_empty());
            assert!(fake.calls().is_empty());
        }
    }
}
