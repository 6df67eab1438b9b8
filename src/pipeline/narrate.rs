//! Narration production: one MP3 per slide, named `slide{NNN}.mp3`.
//!
//! This stage is total by construction: every slide gets an audio file no
//! matter what. The fallback chain per slide is
//!
//! 1. an audio file already on disk for this index is reused byte-for-byte
//!    (partial idempotence across re-runs without `--clean`),
//! 2. blank extracted text is replaced with the deterministic placeholder
//!    before synthesis, so the engine always receives speakable input,
//! 3. engine failure substitutes a fixed-duration silent track rendered by
//!    ffmpeg.
//!
//! Only the silent fallback itself failing is fatal — at that point ffmpeg
//! is broken and nothing downstream could run anyway.

use crate::config::ConversionConfig;
use crate::engine::{self, FFMPEG};
use crate::error::SlidecastError;
use crate::model::{Narration, NarrationSource};
use crate::narration::NarrationEngine;
use crate::pipeline::extract;
use crate::workspace::Workspace;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Produce narration audio for every slide, in ordinal order.
///
/// `texts[i]` belongs to slide `i + 1`. Slides are processed with up to
/// `config.concurrency` in flight; results are re-sorted so the returned
/// sequence is index-aligned regardless of completion order.
pub async fn narrate_all(
    texts: &[String],
    workspace: &Workspace,
    config: &ConversionConfig,
    engine: &Arc<dyn NarrationEngine>,
) -> Result<Vec<Narration>, SlidecastError> {
    let total = texts.len();
    let jobs = texts.iter().enumerate().map(|(i, text)| {
        let index = i + 1;
        async move {
            if let Some(cb) = &config.progress_callback {
                cb.on_slide_start(index, total);
            }
            let narration = narrate_slide(index, text, workspace, config, engine).await?;
            if let Some(cb) = &config.progress_callback {
                cb.on_slide_complete(index, total, source_detail(narration.source));
            }
            Ok::<_, SlidecastError>(narration)
        }
    });

    let mut narrations: Vec<Narration> = stream::iter(jobs)
        .buffer_unordered(config.concurrency)
        .try_collect()
        .await?;
    narrations.sort_unstable_by_key(|n| n.index);
    Ok(narrations)
}

fn source_detail(source: NarrationSource) -> &'static str {
    match source {
        NarrationSource::Synthesized => "synthesized",
        NarrationSource::Silent => "silent fallback",
        NarrationSource::Reused => "reused",
    }
}

async fn narrate_slide(
    index: usize,
    text: &str,
    workspace: &Workspace,
    config: &ConversionConfig,
    engine: &Arc<dyn NarrationEngine>,
) -> Result<Narration, SlidecastError> {
    let path = workspace.audio_path(index);

    if tokio::fs::metadata(&path).await.is_ok() {
        debug!("slide {index}: reusing existing narration {}", path.display());
        return Ok(Narration {
            index,
            path,
            source: NarrationSource::Reused,
        });
    }

    let spoken = effective_text(text, index);
    match engine.synthesize(&spoken, &config.language).await {
        Ok(bytes) => {
            tokio::fs::write(&path, &bytes)
                .await
                .map_err(|e| SlidecastError::Io {
                    path: path.clone(),
                    source: e,
                })?;
            debug!("slide {index}: synthesized {} bytes", bytes.len());
            Ok(Narration {
                index,
                path,
                source: NarrationSource::Synthesized,
            })
        }
        Err(e) => {
            warn!(
                "slide {index}: narration engine '{}' failed ({e}); substituting {}s of silence",
                engine.name(),
                config.silent_duration_secs
            );
            silent_audio(&path, config).await?;
            Ok(Narration {
                index,
                path,
                source: NarrationSource::Silent,
            })
        }
    }
}

/// Blank text narrates as the slide's placeholder, never as dead air with
/// unknown duration.
fn effective_text(text: &str, index: usize) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        extract::placeholder_text(index)
    } else {
        trimmed.to_string()
    }
}

/// Render a fixed-duration silent MP3 matching the synthesized tracks'
/// sample rate and channel layout, so the concat step never sees a stream
/// mismatch.
async fn silent_audio(path: &Path, config: &ConversionConfig) -> Result<(), SlidecastError> {
    engine::run_tool(
        FFMPEG,
        [
            "-f".as_ref(),
            "lavfi".as_ref(),
            "-i".as_ref(),
            "anullsrc=r=44100:cl=stereo".as_ref(),
            "-t".as_ref(),
            config.silent_duration_secs.to_string().as_ref(),
            "-q:a".as_ref(),
            "9".as_ref(),
            "-acodec".as_ref(),
            "libmp3lame".as_ref(),
            "-y".as_ref(),
            path.as_os_str(),
        ],
        config.engine_timeout(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narration::NarrationError;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeEngine {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeEngine {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    impl NarrationEngine for FakeEngine {
        fn name(&self) -> &str {
            "fake"
        }

        fn synthesize<'a>(
            &'a self,
            text: &'a str,
            _language: &'a str,
        ) -> BoxFuture<'a, Result<Vec<u8>, NarrationError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if self.fail {
                    Err(NarrationError("fake outage".into()))
                } else {
                    Ok(format!("mp3:{text}").into_bytes())
                }
            })
        }
    }

    async fn test_workspace() -> (tempfile::TempDir, Workspace) {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::new(tmp.path().join("work"));
        ws.bootstrap().await.unwrap();
        (tmp, ws)
    }

    #[test]
    fn blank_text_narrates_the_placeholder() {
        assert_eq!(effective_text("  ", 4), "Slide 4");
        assert_eq!(effective_text("Hello", 4), "Hello");
    }

    #[tokio::test]
    async fn synthesis_writes_one_file_per_slide() {
        let (_tmp, ws) = test_workspace().await;
        let config = ConversionConfig::default();
        let engine: Arc<dyn NarrationEngine> = FakeEngine::new(false);

        let texts = vec!["Hello".to_string(), String::new(), "World".to_string()];
        let narrations = narrate_all(&texts, &ws, &config, &engine).await.unwrap();

        assert_eq!(narrations.len(), 3);
        for (i, n) in narrations.iter().enumerate() {
            assert_eq!(n.index, i + 1);
            assert_eq!(n.source, NarrationSource::Synthesized);
            assert!(n.path.exists());
        }
        // The blank slide spoke its placeholder.
        let bytes = std::fs::read(&narrations[1].path).unwrap();
        assert_eq!(bytes, b"mp3:Slide 2");
    }

    #[tokio::test]
    async fn existing_audio_is_reused_without_calling_the_engine() {
        let (_tmp, ws) = test_workspace().await;
        let config = ConversionConfig::default();
        let fake = FakeEngine::new(false);
        let engine: Arc<dyn NarrationEngine> = fake.clone();

        std::fs::write(ws.audio_path(1), b"previous-run-audio").unwrap();

        let texts = vec!["Hello".to_string()];
        let narrations = narrate_all(&texts, &ws, &config, &engine).await.unwrap();

        assert_eq!(narrations[0].source, NarrationSource::Reused);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            std::fs::read(ws.audio_path(1)).unwrap(),
            b"previous-run-audio"
        );
    }

    #[tokio::test]
    async fn engine_failure_falls_back_to_silence() {
        if !engine::probe(FFMPEG).await {
            // Fallback rendering needs ffmpeg; nothing to verify without it.
            return;
        }
        let (_tmp, ws) = test_workspace().await;
        let config = ConversionConfig::builder()
            .silent_duration_secs(0.3)
            .build()
            .unwrap();
        let engine: Arc<dyn NarrationEngine> = FakeEngine::new(true);

        let texts = vec!["doomed".to_string()];
        let narrations = narrate_all(&texts, &ws, &config, &engine).await.unwrap();

        assert_eq!(narrations[0].source, NarrationSource::Silent);
        let metadata = std::fs::metadata(&narrations[0].path).unwrap();
        assert!(metadata.len() > 0);
    }

    #[tokio::test]
    async fn concurrent_narration_stays_index_aligned() {
        let (_tmp, ws) = test_workspace().await;
        let config = ConversionConfig::builder().concurrency(4).build().unwrap();
        let engine: Arc<dyn NarrationEngine> = FakeEngine::new(false);

        let texts: Vec<String> = (1..=9).map(|i| format!("slide number {i}")).collect();
        let narrations = narrate_all(&texts, &ws, &config, &engine).await.unwrap();

        let indices: Vec<usize> = narrations.iter().map(|n| n.index).collect();
        assert_eq!(indices, (1..=9).collect::<Vec<_>>());
    }
}
