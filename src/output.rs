//! Result types returned by the conversion entry points.

use crate::error::SlideError;
use crate::model::{DeckFormat, NarrationSource};
use crate::pipeline::raster::RasterStrategy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The outcome of one full pipeline run.
///
/// Returned by [`crate::convert`] on success — which may still include
/// per-slide encode failures; check [`ConversionStats::failed_clips`] or the
/// individual [`SlideResult::error`] fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Path of the final concatenated video.
    pub output_path: PathBuf,
    /// Per-slide artifact records in ordinal order, one per slide.
    pub slides: Vec<SlideResult>,
    pub stats: ConversionStats,
}

/// Artifacts and status for one slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideResult {
    /// 1-based ordinal index.
    pub index: usize,
    pub frame_path: PathBuf,
    pub narration_path: PathBuf,
    pub narration_source: NarrationSource,
    /// The encoded clip; `None` when encoding failed for this slide.
    pub clip_path: Option<PathBuf>,
    /// Set when this slide's clip was dropped from the output.
    pub error: Option<SlideError>,
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionStats {
    pub format: DeckFormat,
    pub slide_count: usize,
    pub strategy: RasterStrategy,
    /// Narrations actually synthesized by the engine.
    pub synthesized: usize,
    /// Narrations substituted with the silent fallback.
    pub silent: usize,
    /// Narrations reused from a prior run's audio files.
    pub reused: usize,
    pub encoded_clips: usize,
    pub failed_clips: usize,
    pub total_duration_ms: u64,
    pub raster_duration_ms: u64,
    pub narrate_duration_ms: u64,
    pub encode_duration_ms: u64,
    pub assemble_duration_ms: u64,
    /// Size of the final video in bytes.
    pub output_bytes: u64,
}
