//! Error types for the slidecast library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SlidecastError`] — **Fatal**: the conversion cannot proceed at all
//!   (missing input, unsupported format, no frames, empty concat manifest).
//!   Returned as `Err(SlidecastError)` from the top-level `convert*` entry
//!   points and mapped to a non-zero exit status by the CLI.
//!
//! * [`SlideError`] — **Non-fatal**: one slide failed (a single clip did not
//!   encode) but the rest of the deck is fine. Stored inside
//!   [`crate::output::SlideResult`]; the run only becomes fatal when no clip
//!   at all survives.
//!
//! Degraded substitutions (silent narration, placeholder text, white
//! background, degraded rasterization) are *not* errors — they are logged via
//! `tracing` and recorded in the per-slide results, but every slide still
//! receives an artifact.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the slidecast library.
///
/// Per-slide failures use [`SlideError`] and are stored in
/// [`crate::output::SlideResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum SlidecastError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input deck was not found at the given path.
    #[error("Input deck not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// File extension does not map to a supported format tag.
    #[error("Unsupported input format '.{extension}' for '{path}'\nSupported: .pptx (presentation), .pdf (fixed-layout document).")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The file exists but its magic bytes do not match the declared format.
    #[error("'{path}' does not look like a {expected} file.\nFirst bytes: {magic:?}")]
    BadMagic {
        path: PathBuf,
        expected: &'static str,
        magic: [u8; 4],
    },

    /// The deck could be opened but its structure cannot be parsed.
    #[error("Deck '{path}' could not be read: {detail}")]
    CorruptDeck { path: PathBuf, detail: String },

    // ── External engine errors ────────────────────────────────────────────
    /// A required external tool is not on PATH and there is no fallback.
    #[error("Required external tool '{tool}' was not found on PATH.\n{hint}")]
    EngineMissing { tool: &'static str, hint: String },

    /// An external tool ran but failed (non-zero exit, transport error, or
    /// timeout expiry).
    #[error("{tool} failed: {detail}")]
    EngineFailed { tool: &'static str, detail: String },

    // ── Pipeline invariant errors ─────────────────────────────────────────
    /// Rasterization produced zero frames; nothing downstream can run.
    #[error("Rasterization produced no frames for '{path}'")]
    NoFrames { path: PathBuf },

    /// Frame and narration sequences diverged in length — the 1-based index
    /// alignment that every later stage depends on no longer holds.
    #[error("Produced {frames} frames but {narrations} narrations; slide indices are no longer aligned")]
    AlignmentBroken { frames: usize, narrations: usize },

    /// Every clip failed to encode; the output would be empty.
    #[error("All {total} slides failed to encode.\nFirst error: {first_error}")]
    NoClips { total: usize, first_error: String },

    /// Assembly was invoked with zero clips.
    #[error("Concatenation manifest is empty; nothing to assemble")]
    EmptyManifest,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a pipeline artifact.
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single slide.
///
/// Stored alongside [`crate::output::SlideResult`] when one slide's clip
/// cannot be produced. The overall conversion continues unless every slide
/// fails.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SlideError {
    /// The slide's frame could not be rendered.
    #[error("Slide {index}: frame rendering failed: {detail}")]
    RenderFailed { index: usize, detail: String },

    /// ffmpeg could not mux the frame and narration into a clip.
    #[error("Slide {index}: clip encoding failed: {detail}")]
    EncodeFailed { index: usize, detail: String },
}

impl SlideError {
    /// 1-based slide index this error belongs to.
    pub fn index(&self) -> usize {
        match self {
            SlideError::RenderFailed { index, .. } => *index,
            SlideError::EncodeFailed { index, .. } => *index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = SlidecastError::UnsupportedFormat {
            path: PathBuf::from("notes.txt"),
            extension: "txt".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains(".txt"), "got: {msg}");
        assert!(msg.contains(".pptx"));
    }

    #[test]
    fn alignment_broken_display() {
        let e = SlidecastError::AlignmentBroken {
            frames: 5,
            narrations: 4,
        };
        assert!(e.to_string().contains("5 frames"));
        assert!(e.to_string().contains("4 narrations"));
    }

    #[test]
    fn engine_missing_display_carries_hint() {
        let e = SlidecastError::EngineMissing {
            tool: "ffmpeg",
            hint: "Install FFmpeg: https://ffmpeg.org/download.html".into(),
        };
        assert!(e.to_string().contains("ffmpeg"));
        assert!(e.to_string().contains("ffmpeg.org"));
    }

    #[test]
    fn slide_error_index() {
        let e = SlideError::EncodeFailed {
            index: 3,
            detail: "exit status 1".into(),
        };
        assert_eq!(e.index(), 3);
        assert!(e.to_string().contains("Slide 3"));
    }
}
