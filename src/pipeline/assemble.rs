//! Final assembly: concatenate the per-slide clips into one video.
//!
//! Clips are listed in a concat-demuxer manifest and joined with stream copy
//! (`-c copy`), so assembly re-encodes nothing. The manifest references
//! absolute paths and is passed with `-safe 0`, which the demuxer requires
//! for paths outside the manifest's own directory. The manifest is left in
//! the working tree after the run for inspection.

use crate::config::ConversionConfig;
use crate::engine::{self, concat_escape, FFMPEG};
use crate::error::SlidecastError;
use crate::model::Clip;
use crate::workspace::Workspace;
use std::path::PathBuf;
use tracing::{debug, info};

/// Concatenate `clips` (already in ordinal order) into the configured output
/// file. Returns the output path.
pub async fn assemble(
    clips: &[Clip],
    workspace: &Workspace,
    config: &ConversionConfig,
) -> Result<PathBuf, SlidecastError> {
    if clips.is_empty() {
        return Err(SlidecastError::EmptyManifest);
    }

    let mut absolute = Vec::with_capacity(clips.len());
    for clip in clips {
        let path = tokio::fs::canonicalize(&clip.path)
            .await
            .map_err(|e| SlidecastError::Io {
                path: clip.path.clone(),
                source: e,
            })?;
        absolute.push(path);
    }

    let manifest = manifest_lines(&absolute);
    let manifest_path = workspace.manifest_path();
    tokio::fs::write(&manifest_path, &manifest)
        .await
        .map_err(|e| SlidecastError::Io {
            path: manifest_path.clone(),
            source: e,
        })?;
    debug!("wrote concat manifest with {} entries", clips.len());

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| SlidecastError::Io {
            path: config.output_dir.clone(),
            source: e,
        })?;

    let output = config.output_path();
    engine::run_tool(
        FFMPEG,
        [
            "-f".as_ref(),
            "concat".as_ref(),
            "-safe".as_ref(),
            "0".as_ref(),
            "-i".as_ref(),
            manifest_path.as_os_str(),
            "-c".as_ref(),
            "copy".as_ref(),
            "-y".as_ref(),
            output.as_os_str(),
        ],
        config.engine_timeout(),
    )
    .await?;

    info!("assembled {} clip(s) into {}", clips.len(), output.display());
    Ok(output)
}

/// Render concat-demuxer manifest lines, one `file '…'` directive per clip.
fn manifest_lines(paths: &[PathBuf]) -> String {
    let mut out = String::new();
    for path in paths {
        out.push_str("file '");
        out.push_str(&concat_escape(path));
        out.push_str("'\n");
    }
    out
}
