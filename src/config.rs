//! Configuration for deck-to-video conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs, log them, and diff two runs to understand why
//! their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::SlidecastError;
use crate::narration::NarrationEngine;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a deck-to-video conversion.
///
/// Built via [`ConversionConfig::builder()`] or
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use slidecast::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .language("id")
///     .working_dir("temp")
///     .output_dir("output")
///     .clean(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Language code passed to the narration engine. Default: "en".
    pub language: String,

    /// Rasterization DPI for the preferred (pdftoppm) path. Range: 72–600.
    /// Default: 300.
    ///
    /// 300 DPI reproduces small slide text crisply at full-screen playback.
    /// Lower it for faster runs on large decks; raising it past 300 mostly
    /// costs disk and encode time.
    pub dpi: u32,

    /// Duration of the silent-audio fallback track in seconds. Default: 2.0.
    pub silent_duration_secs: f64,

    /// AAC bitrate for clip audio. Default: "192k".
    pub audio_bitrate: String,

    /// Working directory for intermediate artifacts (`pdf/`, `slides/`,
    /// `audio/`, `slide_videos/`). Default: "temp".
    pub working_dir: PathBuf,

    /// Directory receiving the final video. Default: "output".
    pub output_dir: PathBuf,

    /// Filename of the final video inside `output_dir`. Default: "output.mp4".
    pub output_filename: String,

    /// Optional background PNG composited behind every slide frame.
    /// A missing file is recoverable: the run proceeds without the overlay.
    pub background: Option<PathBuf>,

    /// Remove the working directory before the run. Default: false.
    ///
    /// Leaving it in place makes re-runs partially idempotent: narration
    /// audio that already exists for an index is reused byte-for-byte.
    pub clean: bool,

    /// Treat absence of the preferred rasterization engines (soffice,
    /// pdftoppm) as a fatal precondition instead of selecting the degraded
    /// path. Default: false.
    pub strict_engines: bool,

    /// Number of slides processed at once within the narrate and encode
    /// stages. Default: 1 (strictly sequential).
    ///
    /// Per-slide work is independent and writes to distinct files, so
    /// raising this is safe; alignment checks still run only after a stage
    /// fully completes.
    pub concurrency: usize,

    /// Bound on any single external engine invocation, in seconds.
    /// Default: 300. Expiry is classified as that engine call failing.
    pub engine_timeout_secs: u64,

    /// TTF font used by the degraded renderer. When unset, a list of common
    /// system fonts (DejaVu, Liberation) is probed; if none resolves, the
    /// degraded path emits background-only frames.
    pub font_path: Option<PathBuf>,

    /// Pre-constructed narration engine. When unset, the default
    /// [`crate::narration::GoogleTranslateTts`] engine is used.
    pub narration_engine: Option<Arc<dyn NarrationEngine>>,

    /// Optional per-stage / per-slide progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            dpi: 300,
            silent_duration_secs: 2.0,
            audio_bitrate: "192k".to_string(),
            working_dir: PathBuf::from("temp"),
            output_dir: PathBuf::from("output"),
            output_filename: "output.mp4".to_string(),
            background: None,
            clean: false,
            strict_engines: false,
            concurrency: 1,
            engine_timeout_secs: 300,
            font_path: None,
            narration_engine: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("language", &self.language)
            .field("dpi", &self.dpi)
            .field("silent_duration_secs", &self.silent_duration_secs)
            .field("audio_bitrate", &self.audio_bitrate)
            .field("working_dir", &self.working_dir)
            .field("output_dir", &self.output_dir)
            .field("output_filename", &self.output_filename)
            .field("background", &self.background)
            .field("clean", &self.clean)
            .field("strict_engines", &self.strict_engines)
            .field("concurrency", &self.concurrency)
            .field("engine_timeout_secs", &self.engine_timeout_secs)
            .field("font_path", &self.font_path)
            .field(
                "narration_engine",
                &self.narration_engine.as_ref().map(|_| "<dyn NarrationEngine>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The engine invocation bound as a [`Duration`].
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    /// Absolute-ish path of the final output video.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_filename)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn silent_duration_secs(mut self, secs: f64) -> Self {
        self.config.silent_duration_secs = secs;
        self
    }

    pub fn audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.config.audio_bitrate = bitrate.into();
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.working_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn output_filename(mut self, name: impl Into<String>) -> Self {
        self.config.output_filename = name.into();
        self
    }

    pub fn background(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.background = Some(path.into());
        self
    }

    pub fn clean(mut self, v: bool) -> Self {
        self.config.clean = v;
        self
    }

    pub fn strict_engines(mut self, v: bool) -> Self {
        self.config.strict_engines = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs;
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    pub fn narration_engine(mut self, engine: Arc<dyn NarrationEngine>) -> Self {
        self.config.narration_engine = Some(engine);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, SlidecastError> {
        let c = &self.config;
        if c.language.trim().is_empty() {
            return Err(SlidecastError::InvalidConfig(
                "Language code must not be empty".into(),
            ));
        }
        if !(c.silent_duration_secs > 0.0) {
            return Err(SlidecastError::InvalidConfig(format!(
                "Silent fallback duration must be positive, got {}",
                c.silent_duration_secs
            )));
        }
        if c.engine_timeout_secs == 0 {
            return Err(SlidecastError::InvalidConfig(
                "Engine timeout must be ≥ 1 second".into(),
            ));
        }
        if c.output_filename.trim().is_empty() {
            return Err(SlidecastError::InvalidConfig(
                "Output filename must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
