//! CLI binary for slidecast.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use slidecast::{
    convert, inspect, ConversionConfig, PipelineProgressCallback, ProgressCallback, Stage,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one live progress bar that follows the
/// pipeline through its stages, plus per-slide log lines. Handles slides
/// completing out-of-order (concurrent mode).
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-slide wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically once
    /// rasterization has established the slide count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        // Spinner only until the slide count is known.
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading deck…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style for a per-slide stage.
    fn activate_bar(&self, prefix: &str, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix(prefix.to_string());
        self.bar.set_position(0);
        self.bar.reset_eta();
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, total_slides: usize) {
        match stage {
            Stage::Init => self.bar.set_prefix("Preparing"),
            Stage::Extract => self.bar.set_message("Extracting text…"),
            Stage::Rasterize => {
                self.bar.println(format!(
                    "{} {}",
                    cyan("◆"),
                    bold("Rendering slide frames…")
                ));
                self.bar.set_message("rasterizing");
            }
            Stage::Narrate => self.activate_bar("Narrating", total_slides),
            Stage::Encode => self.activate_bar("Encoding", total_slides),
            Stage::Assemble => {
                self.bar.set_style(
                    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                self.bar.set_prefix("Assembling");
                self.bar.set_message("concatenating clips…");
            }
            Stage::Done | Stage::Failed => {}
        }
    }

    fn on_slide_start(&self, index: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(index, Instant::now());
        self.bar.set_message(format!("slide {index}"));
    }

    fn on_slide_complete(&self, index: usize, total: usize, detail: &str) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {:<16}  {}",
            green("✓"),
            index,
            total,
            dim(detail),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_slide_error(&self, index: usize, total: usize, error: &str) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 80 {
            let mut end = 79;
            while !error.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}\u{2026}", &error[..end])
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_pipeline_complete(&self, total_slides: usize, encoded_clips: usize) {
        let failed = total_slides.saturating_sub(encoded_clips);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} slides converted successfully",
                green("✔"),
                bold(&encoded_clips.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} slides converted  ({} failed)",
                cyan("⚠"),
                bold(&encoded_clips.to_string()),
                total_slides,
                red(&failed.to_string()),
            );
        }
    }

    fn on_pipeline_failed(&self, stage: Stage, error: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {} failed: {}", red("✘"), stage, red(error));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion
  slidecast talk.pptx

  # Indonesian narration, custom output
  slidecast --language id --output-dir dist --output-name talk.mp4 talk.pptx

  # PDF input (skips the presentation → PDF step)
  slidecast handout.pdf

  # Composite every slide over a branded backdrop
  slidecast --background backdrop.png talk.pptx

  # Fresh run, no reuse of earlier narration audio
  slidecast --clean talk.pptx

  # Fail instead of degrading when LibreOffice/poppler are missing
  slidecast --strict-engines talk.pptx

  # Inspect deck metadata (no ffmpeg needed)
  slidecast --inspect-only talk.pptx

  # Structured JSON result for scripting
  slidecast --json talk.pptx > result.json

EXTERNAL TOOLS:
  Tool        Role                                   Required
  ─────────   ────────────────────────────────────   ────────
  ffmpeg      clip encoding, silence, assembly       yes
  soffice     presentation → PDF (preferred path)    no
  pdftoppm    PDF → PNG frames (preferred path)      no
  pdftotext   fixed-layout text extraction           no

  Without soffice/pdftoppm the degraded renderer paints extracted text
  onto solid-background frames instead — legible, not pixel-faithful.

ENVIRONMENT VARIABLES:
  SLIDECAST_LANGUAGE     Narration language code (default: en)
  SLIDECAST_WORKDIR      Working directory for intermediates (default: temp)
  SLIDECAST_CONCURRENCY  Slides processed at once (default: 1)
"#;

/// Convert slide decks into narrated videos.
#[derive(Parser, Debug)]
#[command(
    name = "slidecast",
    version,
    about = "Convert slide decks (PPTX/PDF) into narrated MP4 videos",
    long_about = "Convert a slide deck into a narrated video: every slide becomes a still frame \
shown for the duration of its synthesized narration, and the per-slide clips are concatenated \
into one MP4. Requires ffmpeg; uses LibreOffice and poppler when available for pixel-faithful \
rendering, with an in-process fallback renderer otherwise.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the input deck (.pptx or .pdf).
    input: String,

    /// Narration language code passed to the TTS engine.
    #[arg(short, long, env = "SLIDECAST_LANGUAGE", default_value = "en")]
    language: String,

    /// Directory receiving the final video.
    #[arg(long, env = "SLIDECAST_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Filename of the final video inside the output directory.
    #[arg(long, env = "SLIDECAST_OUTPUT_NAME", default_value = "output.mp4")]
    output_name: String,

    /// Working directory for intermediate artifacts.
    #[arg(long, env = "SLIDECAST_WORKDIR", default_value = "temp")]
    working_dir: PathBuf,

    /// Rasterization DPI for the preferred rendering path (72–600).
    #[arg(long, env = "SLIDECAST_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Background PNG composited behind every slide frame.
    #[arg(long, env = "SLIDECAST_BACKGROUND")]
    background: Option<PathBuf>,

    /// Duration in seconds of the silent track substituted on TTS failure.
    #[arg(long, env = "SLIDECAST_SILENT_DURATION", default_value_t = 2.0)]
    silent_duration: f64,

    /// AAC audio bitrate for the encoded clips.
    #[arg(long, env = "SLIDECAST_AUDIO_BITRATE", default_value = "192k")]
    audio_bitrate: String,

    /// Remove the working directory before the run (disables narration reuse).
    #[arg(long, env = "SLIDECAST_CLEAN")]
    clean: bool,

    /// Fail instead of degrading when soffice/pdftoppm are missing.
    #[arg(long, env = "SLIDECAST_STRICT_ENGINES")]
    strict_engines: bool,

    /// Number of slides narrated/encoded at once.
    #[arg(short, long, env = "SLIDECAST_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Bound on any single external tool invocation, in seconds.
    #[arg(long, env = "SLIDECAST_ENGINE_TIMEOUT", default_value_t = 300)]
    engine_timeout: u64,

    /// TTF font for the degraded renderer (system fonts probed when unset).
    #[arg(long, env = "SLIDECAST_FONT")]
    font: Option<PathBuf>,

    /// Output structured JSON (ConversionOutput) instead of the summary.
    #[arg(long, env = "SLIDECAST_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "SLIDECAST_NO_PROGRESS")]
    no_progress: bool,

    /// Print deck metadata only, no conversion (no external tools needed).
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SLIDECAST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SLIDECAST_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect deck")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            println!("Format:       {}", meta.format);
            match meta.slide_count {
                Some(n) => println!("Slides:       {n}"),
                None => println!("Slides:       (known after rasterization)"),
            }
            println!("Canvas:       {}×{}", meta.width_px, meta.height_px);
            println!("With text:    {}", meta.slides_with_text);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert(&cli.input, config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        // Summary line (the callback already printed the per-slide log).
        let s = &output.stats;
        eprintln!(
            "{}  {}/{} clips  {}ms  →  {}",
            if s.failed_clips == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            s.encoded_clips,
            s.slide_count,
            s.total_duration_ms,
            bold(&output.output_path.display().to_string()),
        );
        eprintln!(
            "   {} path  /  {} synthesized, {} silent, {} reused  /  {} bytes",
            dim(&s.strategy.to_string()),
            dim(&s.synthesized.to_string()),
            dim(&s.silent.to_string()),
            dim(&s.reused.to_string()),
            dim(&s.output_bytes.to_string()),
        );
    }

    if output.stats.failed_clips > 0 && !cli.quiet {
        for slide in output.slides.iter().filter(|s| s.error.is_some()) {
            if let Some(err) = &slide.error {
                eprintln!("  {} {}", red("✗"), err);
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .language(&cli.language)
        .dpi(cli.dpi)
        .silent_duration_secs(cli.silent_duration)
        .audio_bitrate(&cli.audio_bitrate)
        .working_dir(&cli.working_dir)
        .output_dir(&cli.output_dir)
        .output_filename(&cli.output_name)
        .clean(cli.clean)
        .strict_engines(cli.strict_engines)
        .concurrency(cli.concurrency)
        .engine_timeout_secs(cli.engine_timeout);

    if let Some(bg) = &cli.background {
        builder = builder.background(bg);
    }
    if let Some(font) = &cli.font {
        builder = builder.font_path(font);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
