//! CLI binary for pdf-vision-ocr.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `RunContext`, drives an indicatif bar from the batch progress events and
//! prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_vision_ocr::{
    output_filename, run, write_output, AnthropicConfig, AnthropicVision, BatchProgress,
    BatchStats, DocumentProfile, OcrConfig, OutputFormat, PageRange, PdfBackendKind,
    PdfRenderOptions, ProviderVision, Rasterizer, RasterizerConfig, RetryPolicy, RunContext,
    VisionModel,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Characters shown by `--preview`.
const PREVIEW_CHARS: usize = 2000;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress observer using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Live progress bar plus one log line per page.
struct CliProgress {
    bar: ProgressBar,
    /// When the page currently being transcribed started.
    page_started: Mutex<Instant>,
    errors: AtomicUsize,
}

impl CliProgress {
    /// Spinner until the page count is known.
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rasterising PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Self {
            bar,
            page_started: Mutex::new(Instant::now()),
            errors: AtomicUsize::new(0),
        }
    }

    fn page_elapsed(&self) -> Duration {
        match self.page_started.lock() {
            Ok(mut started) => {
                let elapsed = started.elapsed();
                *started = Instant::now();
                elapsed
            }
            Err(_) => Duration::ZERO,
        }
    }
}

impl BatchProgress for CliProgress {
    fn on_batch_start(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transcribing");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Transcribing {total} pages…"))
        ));
        self.page_elapsed();
    }

    fn on_page_error(&self, page: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page,
            total,
            red(&msg),
        ));
    }

    fn on_page_done(&self, completed: usize, total: usize) {
        let elapsed = self.page_elapsed();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            completed,
            total,
            dim(&format!("{:.1}s", elapsed.as_secs_f64())),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} pages transcribed",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages transcribed  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Text to stdout
  pdf-ocr scan.pdf

  # Styled PDF next to the input (scan_ocr.pdf)
  pdf-ocr scan.pdf --format pdf

  # A table-heavy document, pages 3-7, with retries
  pdf-ocr report.pdf --profile table --first-page 3 --last-page 7 --max-attempts 3 -o report.txt

  # Any edgequake-llm vision provider instead of Anthropic
  pdf-ocr scan.pdf --provider openai --model gpt-4.1-mini

  # Page count only (no API key needed)
  pdf-ocr --inspect-only scan.pdf

DOCUMENT PROFILES:
  general      Ordinary prose: keep line breaks and heading hierarchy
  table        Table-heavy: keep row/column structure and numbers
  handwritten  Handwriting: mark illegible or guessed words
  form         Forms: separate field names from filled-in values

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY       Anthropic API key (default backend)
  EDGEQUAKE_LLM_PROVIDER  Provider for the edgequake-llm backend
  ANTHROPIC_MODEL         Model for the Anthropic backend
  EDGEQUAKE_MODEL         Model for the edgequake-llm backend
  POPPLER_PATH            Directory containing pdftoppm/pdfinfo
  OCR_PDF_FONT            TTF used for PDF output
  RUST_LOG                Log filter override

SETUP:
  1. Install poppler:  brew install poppler  |  sudo apt-get install poppler-utils
  2. Set API key:      export ANTHROPIC_API_KEY=sk-ant-...
  3. Run:              pdf-ocr scan.pdf -o scan.txt
"#;

/// Extract text from scanned PDFs with vision language models.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-ocr",
    version,
    about = "Extract text from scanned PDFs with vision language models",
    long_about = "Renders each page of a scanned or photographed PDF, sends it to a vision \
language model for transcription and writes the result as plain text or a PDF document.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to read.
    input: PathBuf,

    /// Output file. Default: stdout for text, `<stem>_ocr.pdf` for PDF.
    #[arg(short, long, env = "PDF_OCR_OUTPUT")]
    output: Option<PathBuf>,

    /// Document type: general, table, handwritten, form.
    #[arg(long, env = "PDF_OCR_PROFILE", default_value = "general")]
    profile: DocumentProfile,

    /// Output format: txt or pdf.
    #[arg(long, env = "PDF_OCR_FORMAT", default_value = "txt")]
    format: OutputFormat,

    /// Rendering DPI (150–600).
    #[arg(long, env = "PDF_OCR_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(150..=600))]
    dpi: u32,

    /// Omit the "페이지 N" labels.
    #[arg(long)]
    no_page_numbers: bool,

    /// First page to process (1-based).
    #[arg(long)]
    first_page: Option<usize>,

    /// Last page to process (inclusive).
    #[arg(long)]
    last_page: Option<usize>,

    /// Seconds to wait between pages.
    #[arg(long, env = "PDF_OCR_DELAY", default_value_t = 1.0)]
    delay: f64,

    /// Model calls per page before the page is recorded as failed.
    #[arg(long, env = "PDF_OCR_MAX_ATTEMPTS", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..=10))]
    max_attempts: u32,

    /// Anthropic API key.
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// edgequake-llm provider (openai, anthropic, gemini, ollama, …).
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "Use an edgequake-llm provider instead of the built-in Anthropic client.\n\
          The provider reads its own API key variable (OPENAI_API_KEY, GEMINI_API_KEY, …)."
    )]
    provider: Option<String>,

    /// Model ID for the chosen backend. Overrides the per-backend variables.
    #[arg(long)]
    model: Option<String>,

    /// edgequake-llm model used when --model is not given.
    #[arg(long, env = "EDGEQUAKE_MODEL", hide = true)]
    provider_model: Option<String>,

    /// Anthropic model used when --model is not given.
    #[arg(long, env = "ANTHROPIC_MODEL", hide = true)]
    anthropic_model: Option<String>,

    /// Max output tokens per page.
    #[arg(long, env = "PDF_OCR_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: u32,

    /// Preferred PDF backend: simple or flow.
    #[arg(long, env = "OCR_PDF_BACKEND", value_enum, default_value = "flow")]
    pdf_backend: BackendArg,

    /// TTF font for PDF output.
    #[arg(long, env = "OCR_PDF_FONT")]
    font: Option<PathBuf>,

    /// Directory containing pdftoppm/pdfinfo.
    #[arg(long, env = "POPPLER_PATH")]
    poppler_path: Option<PathBuf>,

    /// Print the page count only.
    #[arg(long)]
    inspect_only: bool,

    /// Print the first 2000 characters of text written to a file.
    #[arg(long)]
    preview: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF_OCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_OCR_QUIET")]
    quiet: bool,
}

impl Cli {
    /// Model for the edgequake-llm backend.
    fn model_for_provider(&self) -> Option<&str> {
        self.model.as_deref().or(self.provider_model.as_deref())
    }

    /// Model for the built-in Anthropic client. Never taken from
    /// `EDGEQUAKE_MODEL`, which names a model of another provider.
    fn model_for_anthropic(&self) -> Option<&str> {
        self.model.as_deref().or(self.anthropic_model.as_deref())
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum BackendArg {
    Simple,
    Flow,
}

impl From<BackendArg> for PdfBackendKind {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Simple => PdfBackendKind::Simple,
            BackendArg::Flow => PdfBackendKind::Flow,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would fight with the bar; keep them off while it runs.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let pdf = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let rasterizer = Rasterizer::new(RasterizerConfig {
        poppler_dir: cli.poppler_path.clone(),
        work_root: None,
    });

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let pages = rasterizer
            .page_count(&pdf)
            .await
            .context("Failed to inspect PDF")?;
        println!("File:   {}", cli.input.display());
        println!("Size:   {} bytes", pdf.len());
        println!("Pages:  {}", pages);
        return Ok(());
    }

    // ── Build context ────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let model = build_model(&cli)?;
    let pdf_options = PdfRenderOptions {
        backend: cli.pdf_backend.clone().into(),
        font_path: cli.font.clone(),
        ..PdfRenderOptions::default()
    };
    let ctx = RunContext::new(model, rasterizer, config).with_pdf_options(pdf_options);

    // ── Run ──────────────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgress::new);
    let output = run(
        &ctx,
        &pdf,
        progress.as_ref().map(|p| p as &dyn BatchProgress),
    )
    .await
    .context("OCR failed")?;

    // ── Write ────────────────────────────────────────────────────────────
    let destination = match (&cli.output, output.format) {
        (Some(path), _) => Some(path.clone()),
        (None, OutputFormat::Pdf) => Some(default_output_path(&cli.input, output.format)),
        (None, OutputFormat::Text) => None,
    };

    match &destination {
        Some(path) => {
            write_output(path, &output.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if cli.preview {
                if let Some(text) = output.as_text() {
                    println!("{}", preview(text));
                }
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(&output.bytes)
                .context("Failed to write to stdout")?;
            if !output.bytes.ends_with(b"\n") {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if !cli.quiet {
        print_summary(&output.stats, destination.as_deref());
    }
    Ok(())
}

/// Map CLI args to `OcrConfig`.
fn build_config(cli: &Cli) -> Result<OcrConfig> {
    let delay = Duration::try_from_secs_f64(cli.delay)
        .with_context(|| format!("Invalid --delay {}", cli.delay))?;

    let mut builder = OcrConfig::builder()
        .profile(cli.profile)
        .output_format(cli.format)
        .dpi(cli.dpi)
        .include_page_numbers(!cli.no_page_numbers)
        .inter_page_delay(delay)
        .retry(RetryPolicy::new(cli.max_attempts));

    if cli.first_page.is_some() || cli.last_page.is_some() {
        builder = builder.page_range(PageRange::new(
            cli.first_page.unwrap_or(1),
            cli.last_page.unwrap_or(usize::MAX),
        ));
    }

    builder.build().context("Invalid configuration")
}

/// `--provider` selects edgequake-llm; otherwise an Anthropic key is used
/// when present, and the environment is auto-detected as a last resort.
fn build_model(cli: &Cli) -> Result<Arc<dyn VisionModel>> {
    if let Some(ref name) = cli.provider {
        let model = ProviderVision::from_name(name, cli.model_for_provider())
            .context("Failed to create vision provider")?
            .with_max_tokens(cli.max_tokens as usize);
        return Ok(Arc::new(model));
    }

    if let Some(key) = cli.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        let mut config = AnthropicConfig::new(key);
        config.max_tokens = cli.max_tokens;
        if let Some(model) = cli.model_for_anthropic() {
            config = config.with_model(model);
        }
        let model = AnthropicVision::new(config).context("Failed to create Anthropic client")?;
        return Ok(Arc::new(model));
    }

    let model = ProviderVision::from_env()
        .context("No vision model configured")?
        .with_max_tokens(cli.max_tokens as usize);
    Ok(Arc::new(model))
}

fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(output_filename(&name, format))
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn print_summary(stats: &BatchStats, destination: Option<&Path>) {
    eprintln!(
        "{}  {}/{} pages  {}ms  {}",
        if stats.failed_pages == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.succeeded_pages,
        stats.rasterized_pages,
        stats.total_duration_ms,
        destination
            .map(|p| format!("→  {}", bold(&p.display().to_string())))
            .unwrap_or_default(),
    );
    eprintln!(
        "   {}",
        dim(&format!(
            "rasterise {}ms  /  transcribe {}ms  /  render {}ms",
            stats.rasterize_duration_ms, stats.transcribe_duration_ms, stats.render_duration_ms
        )),
    );
    if stats.rasterized_pages < stats.requested_pages {
        eprintln!(
            "   {}",
            red(&format!(
                "{} pages could not be rasterised",
                stats.requested_pages - stats.rasterized_pages
            ))
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edgequake_model_stays_with_the_provider_backend() {
        std::env::set_var("EDGEQUAKE_MODEL", "gpt-4.1-nano");
        std::env::remove_var("ANTHROPIC_MODEL");
        let cli = Cli::try_parse_from(["pdf-ocr", "scan.pdf", "--api-key", "sk-ant-test"]);
        std::env::remove_var("EDGEQUAKE_MODEL");
        let cli = cli.unwrap();

        assert_eq!(cli.model_for_provider(), Some("gpt-4.1-nano"));
        assert_eq!(cli.model_for_anthropic(), None);
    }

    #[test]
    fn explicit_model_applies_to_either_backend() {
        let cli = Cli::try_parse_from([
            "pdf-ocr",
            "scan.pdf",
            "--model",
            "claude-3-5-haiku-20241022",
        ])
        .unwrap();

        assert_eq!(cli.model_for_provider(), Some("claude-3-5-haiku-20241022"));
        assert_eq!(cli.model_for_anthropic(), Some("claude-3-5-haiku-20241022"));
    }
}
