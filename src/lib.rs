//! # slidecast
//!
//! Convert slide decks into narrated videos: each slide becomes a still
//! frame shown for the duration of its synthesized narration, and the
//! per-slide clips are concatenated into one MP4.
//!
//! The pipeline runs in fixed stages — INIT, EXTRACT, RASTERIZE, NARRATE,
//! ENCODE, ASSEMBLE — and degrades rather than fails: missing rendering
//! engines select an in-process renderer, narration outages substitute
//! silent tracks, and a single bad slide never sinks the deck. Only ffmpeg
//! is a hard requirement.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), slidecast::SlidecastError> {
//! use slidecast::ConversionConfig;
//!
//! let config = ConversionConfig::builder()
//!     .language("en")
//!     .output_dir("output")
//!     .build()?;
//!
//! let output = slidecast::convert("talk.pptx", config).await?;
//! println!(
//!     "{} slides → {}",
//!     output.stats.slide_count,
//!     output.output_path.display()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Inputs
//!
//! * `.pptx` presentations — parsed directly for text, geometry, and
//!   backgrounds; rendered via LibreOffice + poppler when available.
//! * `.pdf` fixed-layout documents — already paginated; the conversion
//!   step is skipped.
//!
//! ## Swapping the narration engine
//!
//! Implement [`NarrationEngine`] and pass it through the config builder to
//! replace the default Google Translate TTS engine with a local model, a
//! different service, or a test fake.

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod model;
pub mod narration;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod workspace;

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert, convert_sync, inspect, Stage};
pub use error::{SlideError, SlidecastError};
pub use model::{Clip, Deck, DeckFormat, DeckMetadata, Frame, Narration, NarrationSource, Slide};
pub use narration::{GoogleTranslateTts, NarrationEngine, NarrationError};
pub use output::{ConversionOutput, ConversionStats, SlideResult};
pub use pipeline::raster::RasterStrategy;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use workspace::Workspace;
