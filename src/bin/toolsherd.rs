//! CLI binary for toolsherd.
//!
//! A thin shim over the library crate: each subcommand resolves its inputs,
//! builds one `TransformRequest`, and writes the artifact to disk.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use toolsherd::pipeline::input::{default_output_path, is_url, resolve_input, resolve_inputs};
use toolsherd::{
    inspect, run_to_file, CompressionLevel, Format, JobProgressCallback, JobState, JobStats,
    PipelineConfig, PipelineError, ProgressCallback, SourceDocument, TransformKind,
    TransformRequest,
};
use tracing_subscriber::EnvFilter;

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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner that names the current job state, switching
/// to a page counter once Rasterize starts reporting pages.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Set once the bar has been switched to the per-page style.
    counting: AtomicBool,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            counting: AtomicBool::new(false),
        })
    }

    fn activate_bar(&self, total: usize) {
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
        self.bar.set_prefix("Encoding");
        self.bar.reset_eta();
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_job_start(&self, kind: TransformKind) {
        self.bar
            .println(format!("{} {}", cyan("◆"), bold(&format!("Running {kind}…"))));
    }

    fn on_state_change(&self, _from: JobState, to: JobState) {
        if !self.counting.load(Ordering::SeqCst) {
            self.bar.set_prefix(to.to_string());
        }
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize) {
        if !self.counting.swap(true, Ordering::SeqCst) {
            self.activate_bar(total_pages);
        }
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}",
            green("✓"),
            page_num,
            total_pages
        ));
        self.bar.inc(1);
    }

    fn on_job_complete(&self, format: Format, output_bytes: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} written  {}",
            green("✔"),
            bold(&format.to_string()),
            dim(&format!("{output_bytes} bytes"))
        );
    }

    fn on_job_failed(&self, error: &PipelineError) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), red(&error.to_string()));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge two PDFs and a scan into one PDF
  toolsherd merge intro.pdf body.pdf scan.jpg -o book.pdf

  # Move the third page to the front
  toolsherd reorder slides.pdf --order 2,0,1 -o slides-fixed.pdf

  # Render every page at twice the natural size
  toolsherd rasterize slides.pdf --scale 2 -o slides_pages/

  # Pull the text of a PDF into a Word document
  toolsherd extract-text paper.pdf -o paper.docx

  # Shrink a photo or a PDF
  toolsherd compress holiday.jpg --level high -o holiday-small.jpg

  # Change format
  toolsherd convert diagram.png --to pdf
  toolsherd convert report.docx --to pdf -o report.pdf

  # Describe a document (no renderer needed)
  toolsherd inspect https://example.com/paper.pdf --json

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH            Path to libpdfium (needed only to rasterize PDF or Word input)
  TOOLSHERD_CONCURRENCY      Pages encoded in parallel during rasterize
  TOOLSHERD_DOWNLOAD_TIMEOUT Timeout in seconds for URL inputs
  RUST_LOG                   Overrides the log filter chosen by --verbose/--quiet
"#;

/// Merge, reorder, rasterise, extract text from, compress and convert
/// PDFs, images and Word documents.
#[derive(Parser, Debug)]
#[command(
    name = "toolsherd",
    version,
    about = "Merge, reorder, rasterise, compress and convert PDFs, images and Word documents",
    long_about = "Document and image conversion pipeline. Every command decodes its inputs \
into pages, transforms the page list and encodes the result. Inputs may be local files or \
HTTP/HTTPS URLs; formats are detected from file contents.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TOOLSHERD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "TOOLSHERD_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "TOOLSHERD_NO_PROGRESS")]
    no_progress: bool,

    /// Number of pages encoded concurrently.
    #[arg(short, long, global = true, env = "TOOLSHERD_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "TOOLSHERD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Combine several documents or images into one PDF, in argument order.
    Merge {
        /// Two or more files or URLs.
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<String>,

        /// Output PDF path.
        #[arg(short, long, default_value = "merged.pdf")]
        output: PathBuf,
    },

    /// Rearrange the pages of a document.
    Reorder {
        input: String,

        /// Zero-based page indices in their new order, e.g. 2,0,1.
        #[arg(long, required = true, value_delimiter = ',')]
        order: Vec<usize>,

        /// Output PDF path [default: <input stem>-reordered.pdf].
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render every page to a PNG.
    Rasterize {
        input: String,

        /// Pixels per PDF point (1.0 is 72 DPI).
        #[arg(long, env = "TOOLSHERD_SCALE")]
        scale: Option<f32>,

        /// Output directory [default: <input stem>_pages].
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the text of each page into a Word document.
    ExtractText {
        input: String,

        /// Output .docx path [default: <input stem>.docx].
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Reduce file size, keeping the format.
    Compress {
        input: String,

        /// low keeps the most detail, high saves the most space.
        #[arg(long, value_enum, default_value = "medium")]
        level: LevelArg,

        /// Stop lowering JPEG quality once the output is at most this many bytes.
        #[arg(long, env = "TOOLSHERD_TARGET_SIZE")]
        target_size: Option<u64>,

        /// Output path [default: <input stem>-compressed.<ext>].
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Change format: PDF, PNG, JPEG, WebP or Word.
    Convert {
        input: String,

        /// Target format.
        #[arg(long, value_enum)]
        to: FormatArg,

        /// Output path [default: <input stem>.<ext>].
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print format, page count and page sizes.
    Inspect {
        input: String,

        /// Output JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LevelArg {
    Low,
    Medium,
    High,
}

impl From<LevelArg> for CompressionLevel {
    fn from(v: LevelArg) -> Self {
        match v {
            LevelArg::Low => CompressionLevel::Low,
            LevelArg::Medium => CompressionLevel::Medium,
            LevelArg::High => CompressionLevel::High,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Pdf,
    Png,
    #[value(alias = "jpg")]
    Jpeg,
    Webp,
    Docx,
}

impl From<FormatArg> for Format {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Pdf => Format::Pdf,
            FormatArg::Png => Format::Png,
            FormatArg::Jpeg => Format::Jpeg,
            FormatArg::Webp => Format::Webp,
            FormatArg::Docx => Format::Docx,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let g = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let is_inspect = matches!(cli.command, Command::Inspect { .. });
    let show_progress = !g.quiet && !g.no_progress && !is_inspect;
    let filter = if g.verbose {
        "debug"
    } else if g.quiet || show_progress {
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

    // ── Inspect needs no job ─────────────────────────────────────────────
    if let Command::Inspect { input, json } = &cli.command {
        return run_inspect(input, *json, g.download_timeout).await;
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn JobProgressCallback>)
    } else {
        None
    };

    let target_size = match &cli.command {
        Command::Compress { target_size, .. } => *target_size,
        _ => None,
    };
    let config = build_config(g, target_size, progress_cb)?;
    let (request, output) = build_request(&cli.command, &config).await?;

    let (written, stats) = run_to_file(request, &output, &config)
        .await
        .context("Conversion failed")?;

    if !g.quiet {
        print_summary(&output, &written, &stats);
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(
    g: &GlobalArgs,
    target_size: Option<u64>,
    progress: Option<ProgressCallback>,
) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .concurrency(g.concurrency)
        .download_timeout_secs(g.download_timeout);
    if target_size.is_some() {
        builder = builder.target_size_bytes(target_size);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// Resolve the subcommand's inputs and pick its output path.
async fn build_request(
    command: &Command,
    config: &PipelineConfig,
) -> Result<(TransformRequest, PathBuf)> {
    let timeout = config.download_timeout_secs;

    Ok(match command {
        Command::Merge { inputs, output } => {
            let docs = resolve_inputs(inputs, timeout)
                .await
                .context("Failed to read inputs")?;
            (TransformRequest::merge(docs), output.clone())
        }
        Command::Reorder {
            input,
            order,
            output,
        } => (
            TransformRequest::reorder(load(input, timeout).await?, order.clone()),
            output.clone().unwrap_or_else(|| {
                with_stem_suffix(
                    &default_output_path(input, Format::Pdf),
                    "-reordered",
                    Some(Format::Pdf.extension()),
                )
            }),
        ),
        Command::Rasterize {
            input,
            scale,
            output,
        } => {
            let scale = scale.unwrap_or(config.default_scale);
            let dir = output.clone().unwrap_or_else(|| {
                with_stem_suffix(&default_output_path(input, Format::Png), "_pages", None)
            });
            (TransformRequest::rasterize(load(input, timeout).await?, scale), dir)
        }
        Command::ExtractText { input, output } => (
            TransformRequest::extract_text(load(input, timeout).await?),
            output
                .clone()
                .unwrap_or_else(|| default_output(input, Format::Docx, "-text")),
        ),
        Command::Compress {
            input,
            level,
            output,
            ..
        } => {
            let doc = load(input, timeout).await?;
            let path = output.clone().unwrap_or_else(|| {
                let fmt = doc.format();
                with_stem_suffix(
                    &default_output_path(input, fmt),
                    "-compressed",
                    Some(fmt.extension()),
                )
            });
            (TransformRequest::compress(doc, (*level).into()), path)
        }
        Command::Convert { input, to, output } => {
            let target: Format = (*to).into();
            (
                TransformRequest::convert(load(input, timeout).await?, target),
                output
                    .clone()
                    .unwrap_or_else(|| default_output(input, target, "-converted")),
            )
        }
        Command::Inspect { .. } => anyhow::bail!("inspect does not run a job"),
    })
}

async fn load(input: &str, timeout: u64) -> Result<SourceDocument> {
    resolve_input(input, timeout)
        .await
        .with_context(|| format!("Failed to read input '{input}'"))
}

/// `report.pdf` + `-compressed` → `report-compressed.pdf`; with no extension
/// the result has none (used for directories).
fn with_stem_suffix(path: &Path, suffix: &str, ext: Option<&str>) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    match ext {
        Some(ext) => path.with_file_name(format!("{stem}{suffix}.{ext}")),
        None => path.with_file_name(format!("{stem}{suffix}")),
    }
}

/// `<stem>.<ext>` in the working directory, with `suffix` added to the stem
/// when that would be the input file itself.
fn default_output(input: &str, format: Format, suffix: &str) -> PathBuf {
    keep_off_input(default_output_path(input, format), input, suffix, format.extension())
}

fn keep_off_input(path: PathBuf, input: &str, suffix: &str, ext: &str) -> PathBuf {
    if same_file(&path, input) {
        with_stem_suffix(&path, suffix, Some(ext))
    } else {
        path
    }
}

/// Whether `path` names the local file `input`, however either is spelled.
/// `path` need not exist yet; its directory must.
fn same_file(path: &Path, input: &str) -> bool {
    if is_url(input) {
        return false;
    }
    let Ok(input) = Path::new(input).canonicalize() else {
        return false;
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    match (dir.canonicalize(), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name) == input,
        _ => false,
    }
}

async fn run_inspect(input: &str, json: bool, timeout: u64) -> Result<()> {
    let doc = load(input, timeout).await?;
    let meta = tokio::task::spawn_blocking(move || inspect(&doc))
        .await
        .context("Inspect task failed")?
        .context("Failed to inspect document")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
        );
        return Ok(());
    }

    println!("File:         {}", input);
    if let Some(format) = meta.format {
        println!("Format:       {}", format);
    }
    println!("Size:         {} bytes", meta.byte_len);
    println!("Pages:        {}", meta.page_count);
    if let Some(ref v) = meta.pdf_version {
        println!("PDF Version:  {}", v);
    }
    if meta.format == Some(Format::Pdf) {
        println!("Encrypted:    {}", meta.is_encrypted);
    }
    if let Some(ref t) = meta.title {
        println!("Title:        {}", t);
    }
    if let Some(ref a) = meta.author {
        println!("Author:       {}", a);
    }
    if let Some(ref p) = meta.producer {
        println!("Producer:     {}", p);
    }
    for (i, size) in meta.page_sizes.iter().enumerate() {
        println!(
            "  page {:>3}    {} × {}",
            i + 1,
            size.width,
            size.height
        );
    }
    Ok(())
}

fn print_summary(output: &Path, written: &[PathBuf], stats: &JobStats) {
    let target = if written.len() > 1 {
        format!("{} ({} files)", output.display(), written.len())
    } else {
        output.display().to_string()
    };
    eprintln!(
        "{}  {} → {} pages  {}ms  →  {}",
        green("✔"),
        stats.decoded_pages,
        stats.output_pages,
        stats.total_duration_ms,
        bold(&target),
    );
    eprintln!(
        "   {} bytes in  /  {} bytes out",
        dim(&stats.input_bytes.to_string()),
        dim(&stats.output_bytes.to_string()),
    );
}
