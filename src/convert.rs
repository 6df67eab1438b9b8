//! The pipeline controller: drives the stages in order and enforces the
//! cross-stage invariants.
//!
//! Stage order is fixed: INIT → EXTRACT → RASTERIZE → NARRATE → ENCODE →
//! ASSEMBLE → DONE. Any fatal error short-circuits to FAILED; per-slide
//! encode failures are collected instead and only become fatal when no clip
//! at all survives. After every producing stage the controller re-checks the
//! index alignment between artifact sequences — a divergence means the
//! 1-based naming contract is broken and nothing downstream can be trusted.

use crate::config::ConversionConfig;
use crate::engine;
use crate::error::SlidecastError;
use crate::model::{DeckFormat, DeckMetadata, NarrationSource};
use crate::narration::{GoogleTranslateTts, NarrationEngine};
use crate::output::{ConversionOutput, ConversionStats, SlideResult};
use crate::pipeline::{assemble, encode, extract, input, narrate, raster};
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Pipeline stage, as reported to progress callbacks and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Init,
    Extract,
    Rasterize,
    Narrate,
    Encode,
    Assemble,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "INIT",
            Stage::Extract => "EXTRACT",
            Stage::Rasterize => "RASTERIZE",
            Stage::Narrate => "NARRATE",
            Stage::Encode => "ENCODE",
            Stage::Assemble => "ASSEMBLE",
            Stage::Done => "DONE",
            Stage::Failed => "FAILED",
        };
        write!(f, "{name}")
    }
}

/// Convert a deck into a narrated video.
///
/// This is the primary entry point. The returned [`ConversionOutput`] may
/// still record per-slide encode failures; the run is only an `Err` when the
/// pipeline cannot produce any output at all.
///
/// # Example
/// ```rust,no_run
/// # async fn demo() -> Result<(), slidecast::SlidecastError> {
/// let config = slidecast::ConversionConfig::builder()
///     .language("en")
///     .build()?;
/// let output = slidecast::convert("deck.pptx", config).await?;
/// println!("wrote {}", output.output_path.display());
/// # Ok(())
/// # }
/// ```
#[instrument(skip(config), fields(input = %input))]
pub async fn convert(
    input: &str,
    config: ConversionConfig,
) -> Result<ConversionOutput, SlidecastError> {
    let mut stage = Stage::Init;
    match run_stages(input, &config, &mut stage).await {
        Ok(output) => {
            if let Some(cb) = &config.progress_callback {
                cb.on_pipeline_complete(output.stats.slide_count, output.stats.encoded_clips);
            }
            Ok(output)
        }
        Err(e) => {
            if let Some(cb) = &config.progress_callback {
                cb.on_pipeline_failed(stage, &e.to_string());
            }
            Err(e)
        }
    }
}

/// Blocking wrapper around [`convert`] for non-async callers. Spins up a
/// private runtime; must not be called from inside one.
pub fn convert_sync(
    input: &str,
    config: ConversionConfig,
) -> Result<ConversionOutput, SlidecastError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| SlidecastError::Internal(format!("failed to start runtime: {e}")))?;
    runtime.block_on(convert(input, config))
}

/// Read deck metadata without running any external engine and without
/// creating any file.
pub async fn inspect(input: &str) -> Result<DeckMetadata, SlidecastError> {
    let (path, format) = input::resolve_input(input)?;
    let deck = extract::extract_deck(&path, format)?;
    let slides_with_text = deck
        .slides
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .count();
    Ok(DeckMetadata {
        format,
        slide_count: match format {
            DeckFormat::Presentation => Some(deck.slides.len()),
            // Page count is only knowable by rasterizing.
            DeckFormat::FixedLayout => None,
        },
        width_px: deck.width_px,
        height_px: deck.height_px,
        slides_with_text,
    })
}

async fn run_stages(
    input: &str,
    config: &ConversionConfig,
    stage: &mut Stage,
) -> Result<ConversionOutput, SlidecastError> {
    let started = Instant::now();
    let notify = |s: Stage, total: usize| {
        if let Some(cb) = &config.progress_callback {
            cb.on_stage_start(s, total);
        }
    };

    // INIT: validate before touching the filesystem, so a rejected input
    // leaves zero files behind.
    *stage = Stage::Init;
    notify(Stage::Init, 0);
    let (path, format) = input::resolve_input(input)?;
    engine::require_ffmpeg().await?;
    if config.clean {
        Workspace::clean(&config.working_dir).await?;
    }
    let workspace = Workspace::new(&config.working_dir);
    workspace.bootstrap().await?;
    info!("converting {} ({})", path.display(), format);

    *stage = Stage::Extract;
    notify(Stage::Extract, 0);
    let deck = extract::extract_deck(&path, format)?;
    let texts = extract::extract_texts(&deck, config.engine_timeout()).await;

    *stage = Stage::Rasterize;
    let raster_started = Instant::now();
    let requested = raster::select_strategy(format, config.strict_engines).await?;
    notify(Stage::Rasterize, deck.slides.len());
    let (frames, strategy) = raster::rasterize(&deck, &texts, &workspace, config, requested).await?;
    if frames.is_empty() {
        return Err(SlidecastError::NoFrames { path });
    }
    let raster_duration_ms = raster_started.elapsed().as_millis() as u64;
    let total = frames.len();
    info!("rasterized {total} frame(s) via the {strategy} path");

    // The frame count is authoritative; texts align to it or get placeholders.
    let texts = extract::align_texts(texts, total);

    *stage = Stage::Narrate;
    notify(Stage::Narrate, total);
    let narrate_started = Instant::now();
    let tts = resolve_engine(config)?;
    let narrations = narrate::narrate_all(&texts, &workspace, config, &tts).await?;
    if narrations.len() != frames.len() {
        return Err(SlidecastError::AlignmentBroken {
            frames: frames.len(),
            narrations: narrations.len(),
        });
    }
    let narrate_duration_ms = narrate_started.elapsed().as_millis() as u64;

    *stage = Stage::Encode;
    notify(Stage::Encode, total);
    let encode_started = Instant::now();
    let (clips, slide_errors) = encode::encode_all(&frames, &narrations, &workspace, config).await?;
    if clips.is_empty() {
        let first_error = slide_errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no clips were attempted".to_string());
        return Err(SlidecastError::NoClips { total, first_error });
    }
    let encode_duration_ms = encode_started.elapsed().as_millis() as u64;

    *stage = Stage::Assemble;
    notify(Stage::Assemble, total);
    let assemble_started = Instant::now();
    let output_path = assemble::assemble(&clips, &workspace, config).await?;
    let assemble_duration_ms = assemble_started.elapsed().as_millis() as u64;
    let output_bytes = tokio::fs::metadata(&output_path)
        .await
        .map(|m| m.len())
        .unwrap_or(0);

    *stage = Stage::Done;

    let clip_by_index: HashMap<usize, _> = clips.iter().map(|c| (c.index, c)).collect();
    let error_by_index: HashMap<usize, _> =
        slide_errors.iter().map(|e| (e.index(), e)).collect();
    let slides: Vec<SlideResult> = frames
        .iter()
        .zip(&narrations)
        .map(|(frame, narration)| SlideResult {
            index: frame.index,
            frame_path: frame.path.clone(),
            narration_path: narration.path.clone(),
            narration_source: narration.source,
            clip_path: clip_by_index.get(&frame.index).map(|c| c.path.clone()),
            error: error_by_index.get(&frame.index).map(|e| (*e).clone()),
        })
        .collect();

    let count_source = |s: NarrationSource| narrations.iter().filter(|n| n.source == s).count();
    let stats = ConversionStats {
        format,
        slide_count: total,
        strategy,
        synthesized: count_source(NarrationSource::Synthesized),
        silent: count_source(NarrationSource::Silent),
        reused: count_source(NarrationSource::Reused),
        encoded_clips: clips.len(),
        failed_clips: slide_errors.len(),
        total_duration_ms: started.elapsed().as_millis() as u64,
        raster_duration_ms,
        narrate_duration_ms,
        encode_duration_ms,
        assemble_duration_ms,
        output_bytes,
    };
    info!(
        "conversion finished: {}/{} clips, {} bytes, {}ms",
        stats.encoded_clips, stats.slide_count, stats.output_bytes, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        output_path,
        slides,
        stats,
    })
}

fn resolve_engine(
    config: &ConversionConfig,
) -> Result<Arc<dyn NarrationEngine>, SlidecastError> {
    match &config.narration_engine {
        Some(engine) => Ok(engine.clone()),
        None => {
            let tts = GoogleTranslateTts::new(config.engine_timeout())
                .map_err(|e| SlidecastError::Internal(e.to_string()))?;
            Ok(Arc::new(tts))
        }
    }
}
