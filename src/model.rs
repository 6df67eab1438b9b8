//! Core data model: the deck and the per-slide artifacts each pipeline stage
//! produces.
//!
//! The backbone invariant of the whole pipeline lives here: [`Frame`],
//! [`Narration`], and [`Clip`] all carry the same 1-based slide index, and
//! every stage must produce exactly one artifact per slide. The controller
//! checks sequence lengths after each stage; the types make the indexing
//! explicit so a mismatch is detectable rather than silent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// English Metric Units per pixel at 96 DPI. PPTX geometry (slide size,
/// shape offsets and extents) is expressed in EMU.
pub const EMU_PER_PIXEL: u64 = 9525;

/// Minimum acceptable canvas width; decks declaring less are upscaled.
pub const MIN_WIDTH: u32 = 1280;
/// Minimum acceptable canvas height; decks declaring less are upscaled.
pub const MIN_HEIGHT: u32 = 720;
/// Upscale target when the deck's declared size is under the minimum.
pub const FALLBACK_WIDTH: u32 = 1920;
/// Upscale target when the deck's declared size is under the minimum.
pub const FALLBACK_HEIGHT: u32 = 1080;

/// Format tag of the input deck, derived from its file extension and
/// verified against magic bytes before any stage runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeckFormat {
    /// A PPTX presentation (ZIP of OOXML parts).
    Presentation,
    /// A PDF fixed-layout document; already paginated, no conversion step.
    FixedLayout,
}

impl fmt::Display for DeckFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeckFormat::Presentation => write!(f, "presentation"),
            DeckFormat::FixedLayout => write!(f, "fixed-layout document"),
        }
    }
}

/// The input document. Immutable once read.
#[derive(Debug, Clone)]
pub struct Deck {
    pub path: PathBuf,
    pub format: DeckFormat,
    /// Canvas size in pixels after EMU conversion and the 1280×720 floor.
    pub width_px: u32,
    pub height_px: u32,
    /// Parsed slides, in ordinal order. Empty for fixed-layout decks, whose
    /// authoritative page count comes from rasterization.
    pub slides: Vec<Slide>,
}

/// One logical page of the deck.
#[derive(Debug, Clone)]
pub struct Slide {
    /// 1-based ordinal index.
    pub index: usize,
    /// All extracted plain text, shape texts joined with spaces. May be empty.
    pub text: String,
    /// Text-bearing shapes with pixel geometry, for the degraded renderer.
    pub shapes: Vec<TextShape>,
    /// Resolved background fill: slide background, else the master layout's,
    /// else white. Picture fills degrade to white during extraction.
    pub background: [u8; 3],
}

/// A text-bearing shape with its declared position and size in pixels.
///
/// Geometry is `None` when the shape inherits placement from its layout;
/// the degraded renderer assigns such shapes a stacked fallback band.
#[derive(Debug, Clone)]
pub struct TextShape {
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub text: String,
}

/// A rasterized still image for one slide, at its canonical zero-padded path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub index: usize,
    pub path: PathBuf,
}

/// How a slide's narration audio was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NarrationSource {
    /// Speech synthesized by the narration engine.
    Synthesized,
    /// Fixed-duration silent track substituted after a synthesis failure.
    Silent,
    /// Audio file from a prior run reused as-is.
    Reused,
}

/// An audio track for one slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Narration {
    pub index: usize,
    pub path: PathBuf,
    pub source: NarrationSource,
}

/// One encoded video segment (frame + narration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clip {
    pub index: usize,
    pub path: PathBuf,
}

/// Deck metadata for `--inspect-only`; requires no external engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckMetadata {
    pub format: DeckFormat,
    /// Slide count as declared by the deck itself. `None` for fixed-layout
    /// decks, where the count is only known after rasterization.
    pub slide_count: Option<usize>,
    pub width_px: u32,
    pub height_px: u32,
    /// Number of slides with non-blank extracted text.
    pub slides_with_text: usize,
}

/// Convert an EMU length to pixels at 96 DPI.
pub fn emu_to_px(emu: u64) -> u32 {
    (emu / EMU_PER_PIXEL) as u32
}

/// Compute the canvas size for a deck's declared EMU dimensions.
///
/// Applies the 1280×720 floor (upscaling to 1920×1080 below it) and rounds
/// down to even values, since yuv420p encoding requires even dimensions.
pub fn canvas_size(width_emu: u64, height_emu: u64) -> (u32, u32) {
    let w = emu_to_px(width_emu);
    let h = emu_to_px(height_emu);
    if w < MIN_WIDTH || h < MIN_HEIGHT {
        (FALLBACK_WIDTH, FALLBACK_HEIGHT)
    } else {
        (w & !1, h & !1)
    }
}
