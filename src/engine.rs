//! External engine invocation: probe, run with a bounded timeout, classify.
//!
//! Every external dependency (ffmpeg, soffice, pdftoppm, pdftotext) is a
//! subprocess, never a linked library — the engines are collaborators with a
//! call contract, and spawning them keeps the crate free of native build
//! requirements. All invocations run under one configurable timeout; expiry
//! is reported as that call failing, so the controller classifies it like any
//! other engine error instead of hanging the pipeline.
//!
//! Nothing here decides whether a failure is fatal. Callers map
//! [`SlidecastError::EngineFailed`] / [`SlidecastError::EngineMissing`] to
//! the recoverable or fatal branch that their stage's policy dictates.

use crate::error::SlidecastError;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Video/audio encoder and muxer. Required; probed at INIT.
pub const FFMPEG: &str = "ffmpeg";
/// LibreOffice, the presentation → fixed-layout conversion engine. Optional.
pub const SOFFICE: &str = "soffice";
/// Poppler's PDF rasterizer. Optional; preferred rasterization path.
pub const PDFTOPPM: &str = "pdftoppm";
/// Poppler's PDF text extractor. Optional; fixed-layout text extraction.
pub const PDFTOTEXT: &str = "pdftotext";

/// Captured output of a successful tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
}

/// Check whether `tool` is runnable by invoking its version flag.
pub async fn probe(tool: &'static str) -> bool {
    let version_flag = match tool {
        FFMPEG => "-version",
        SOFFICE => "--version",
        _ => "-v",
    };
    Command::new(tool)
        .arg(version_flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Run `tool` with `args`, capturing stdout, under `timeout`.
///
/// Errors:
/// * binary not found → [`SlidecastError::EngineMissing`]
/// * non-zero exit → [`SlidecastError::EngineFailed`] carrying trimmed stderr
/// * timeout expiry → [`SlidecastError::EngineFailed`] (the child is killed)
pub async fn run_tool<I, S>(
    tool: &'static str,
    args: I,
    timeout: Duration,
) -> Result<ToolOutput, SlidecastError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<std::ffi::OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
    debug!("running {} {:?}", tool, args);

    let mut child = Command::new(tool)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SlidecastError::EngineMissing {
                    tool,
                    hint: install_hint(tool).to_string(),
                }
            } else {
                SlidecastError::EngineFailed {
                    tool,
                    detail: format!("failed to spawn: {e}"),
                }
            }
        })?;

    let waited = tokio::time::timeout(timeout, child.wait_with_output()).await;

    let output = match waited {
        Ok(result) => result.map_err(|e| SlidecastError::EngineFailed {
            tool,
            detail: format!("wait failed: {e}"),
        })?,
        // kill_on_drop reaps the child when the future is dropped here.
        Err(_) => {
            return Err(SlidecastError::EngineFailed {
                tool,
                detail: format!("timed out after {}s", timeout.as_secs()),
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SlidecastError::EngineFailed {
            tool,
            detail: format!(
                "exit status {}: {}",
                output.status,
                truncate(stderr.trim(), 400)
            ),
        });
    }

    Ok(ToolOutput {
        stdout: output.stdout,
    })
}

/// Fail fast when ffmpeg is absent — every downstream stage needs it.
pub async fn require_ffmpeg() -> Result<(), SlidecastError> {
    if probe(FFMPEG).await {
        Ok(())
    } else {
        Err(SlidecastError::EngineMissing {
            tool: FFMPEG,
            hint: install_hint(FFMPEG).to_string(),
        })
    }
}

fn install_hint(tool: &str) -> &'static str {
    match tool {
        FFMPEG => "Install FFmpeg: https://ffmpeg.org/download.html",
        SOFFICE => "Install LibreOffice for pixel-faithful slide rendering, or rely on the degraded renderer.",
        PDFTOPPM | PDFTOTEXT => "Install poppler-utils (provides pdftoppm and pdftotext).",
        _ => "Install the tool and make sure it is on PATH.",
    }
}

/// Escape a path for embedding in an ffmpeg concat manifest line.
///
/// The concat demuxer's quoted-string syntax closes the quote, inserts an
/// escaped quote, and reopens: `it's` → `it'\''s`.
pub fn concat_escape(path: &Path) -> String {
    path.display().to_string().replace('\'', r"'\''")
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn missing_binary_maps_to_engine_missing() {
        let err = run_tool(
            "slidecast-test-no-such-binary",
            ["--version"],
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        // The tool constant is 'static; the fake name goes through the same path.
        assert!(matches!(err, SlidecastError::EngineMissing { .. }));
    }

    #[test]
    fn concat_escape_handles_quotes() {
        let p = PathBuf::from("/tmp/it's here/clip.mp4");
        assert_eq!(concat_escape(&p), r"/tmp/it'\''s here/clip.mp4");
    }

    #[test]
    fn concat_escape_passes_plain_paths_through() {
        let p = PathBuf::from("/tmp/work/slide001.mp4");
        assert_eq!(concat_escape(&p), "/tmp/work/slide001.mp4");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "äääää";
        let t = truncate(s, 3);
        assert!(t.starts_with('ä'));
        assert!(t.ends_with('…'));
    }
}
