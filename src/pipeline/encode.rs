//! Clip encoding: one MP4 per slide from its frame + narration pair.
//!
//! Each clip loops the still frame for exactly the narration's duration
//! (`-shortest`), encoded H.264/AAC so the assembler can concatenate with
//! stream copy. Failures here are per-slide: a failed clip is recorded and
//! dropped from assembly, and the run only dies when *every* clip fails.

use crate::config::ConversionConfig;
use crate::engine::{self, FFMPEG};
use crate::error::{SlideError, SlidecastError};
use crate::model::{Clip, Frame, Narration};
use crate::workspace::Workspace;
use futures::stream::{self, StreamExt};
use std::ffi::OsString;
use std::path::Path;
use tracing::{debug, warn};

/// Encode every frame/narration pair into a clip.
///
/// Inputs must be index-aligned (the controller verifies this before calling).
/// Returns the successful clips in ordinal order plus the per-slide errors
/// for the ones that failed.
pub async fn encode_all(
    frames: &[Frame],
    narrations: &[Narration],
    workspace: &Workspace,
    config: &ConversionConfig,
) -> Result<(Vec<Clip>, Vec<SlideError>), SlidecastError> {
    debug_assert_eq!(frames.len(), narrations.len());
    let total = frames.len();

    // A configured-but-missing background is recoverable: encode without it.
    let background = match &config.background {
        Some(path) if tokio::fs::metadata(path).await.is_ok() => Some(path.clone()),
        Some(path) => {
            warn!(
                "background image {} not found; encoding without overlay",
                path.display()
            );
            None
        }
        None => None,
    };

    let jobs = frames.iter().zip(narrations).map(|(frame, narration)| {
        let background = background.as_deref();
        async move {
            let index = frame.index;
            if let Some(cb) = &config.progress_callback {
                cb.on_slide_start(index, total);
            }
            let clip_path = workspace.clip_path(index);
            let args = encode_args(&frame.path, &narration.path, &clip_path, config, background);
            match engine::run_tool(FFMPEG, args, config.engine_timeout()).await {
                Ok(_) => {
                    if let Some(cb) = &config.progress_callback {
                        cb.on_slide_complete(index, total, "encoded");
                    }
                    Ok(Clip {
                        index,
                        path: clip_path,
                    })
                }
                Err(e) => {
                    warn!("slide {index}: clip encoding failed: {e}");
                    if let Some(cb) = &config.progress_callback {
                        cb.on_slide_error(index, total, &e.to_string());
                    }
                    Err(SlideError::EncodeFailed {
                        index,
                        detail: e.to_string(),
                    })
                }
            }
        }
    });

    let results: Vec<Result<Clip, SlideError>> = stream::iter(jobs)
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    let mut clips = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(clip) => clips.push(clip),
            Err(e) => errors.push(e),
        }
    }
    clips.sort_unstable_by_key(|c| c.index);
    errors.sort_unstable_by_key(|e| e.index());
    debug!("encoded {} clip(s), {} failed", clips.len(), errors.len());
    Ok((clips, errors))
}

/// Build the ffmpeg argument list for one clip.
///
/// Without a background the frame is padded to even dimensions (yuv420p
/// requires them; pdftoppm output can be odd-sized). With a background the
/// backdrop is scaled to the frame's size and the slide overlaid at 90%,
/// centered.
fn encode_args(
    frame: &Path,
    audio: &Path,
    clip: &Path,
    config: &ConversionConfig,
    background: Option<&Path>,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();

    if let Some(bg) = background {
        args.extend(["-loop".into(), "1".into(), "-i".into(), bg.into()]);
        args.extend(["-loop".into(), "1".into(), "-i".into(), frame.into()]);
        args.extend(["-i".into(), audio.into()]);
        args.extend([
            "-filter_complex".into(),
            "[0:v][1:v]scale2ref[bg][fg];\
             [fg]scale=iw*0.9:-2[fgs];\
             [bg][fgs]overlay=(W-w)/2:(H-h)/2,pad=ceil(iw/2)*2:ceil(ih/2)*2[outv]"
                .into(),
            "-map".into(),
            "[outv]".into(),
            "-map".into(),
            "2:a".into(),
        ]);
    } else {
        args.extend(["-loop".into(), "1".into(), "-i".into(), frame.into()]);
        args.extend(["-i".into(), audio.into()]);
        args.extend([
            "-vf".into(),
            "pad=ceil(iw/2)*2:ceil(ih/2)*2".into(),
        ]);
    }

    args.extend([
        "-c:v".into(),
        "libx264".into(),
        "-tune".into(),
        "stillimage".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        config.audio_bitrate.clone().into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-shortest".into(),
        "-y".into(),
        clip.into(),
    ]);
    args
}
