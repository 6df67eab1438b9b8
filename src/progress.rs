//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the controller moves through stages and slides.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a log, or a terminal progress bar without the
//! library knowing anything about how the host application communicates. The
//! trait is `Send + Sync` because per-slide work inside a stage may run
//! concurrently when `concurrency > 1`.

use crate::convert::Stage;
use std::sync::Arc;

/// Called by the pipeline controller as it processes stages and slides.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. When `concurrency > 1`, the per-slide methods may be
/// called from different tasks at once; protect shared mutable state
/// accordingly.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called when the controller enters a stage.
    ///
    /// `total_slides` is 0 during INIT and EXTRACT, before rasterization has
    /// established the authoritative slide count.
    fn on_stage_start(&self, stage: Stage, total_slides: usize) {
        let _ = (stage, total_slides);
    }

    /// Called just before a slide's work within the current stage begins.
    fn on_slide_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a slide's work within the current stage finishes.
    /// `detail` is a short human-readable note ("synthesized", "silent
    /// fallback", "clip 3.2s", …).
    fn on_slide_complete(&self, index: usize, total: usize, detail: &str) {
        let _ = (index, total, detail);
    }

    /// Called when a slide's work fails (the slide is dropped or substituted
    /// per the error policy; the run may still continue).
    fn on_slide_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after ASSEMBLE succeeds.
    fn on_pipeline_complete(&self, total_slides: usize, encoded_clips: usize) {
        let _ = (total_slides, encoded_clips);
    }

    /// Called once if the run ends in FAILED, with the stage that failed.
    fn on_pipeline_failed(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
