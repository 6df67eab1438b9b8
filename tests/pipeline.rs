//! Integration tests for the full conversion pipeline.
//!
//! Most tests here run against a minimal in-memory PPTX and a fake narration
//! engine, so they need no network access. Tests that encode real video are
//! skipped automatically when ffmpeg is not on PATH.
//!
//! The live end-to-end test (real deck, real TTS endpoint) is gated behind
//! the `SLIDECAST_E2E` environment variable so it does not run in CI unless
//! explicitly requested:
//!
//!   SLIDECAST_E2E=1 SLIDECAST_E2E_DECK=talk.pptx cargo test --test pipeline -- --nocapture

use futures::future::BoxFuture;
use slidecast::{
    convert, inspect, ConversionConfig, DeckFormat, NarrationEngine, NarrationError,
    NarrationSource, SlidecastError,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Write a minimal three-slide PPTX (texts "Hello", blank, "World").
fn write_test_deck(path: &Path) {
    const PRESENTATION: &str = r#"<?xml version="1.0"?>
<p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
  <p:sldSz cx="12192000" cy="6858000"/>
</p:presentation>"#;

    fn slide(text: &str) -> String {
        let body = if text.is_empty() {
            String::new()
        } else {
            format!(
                r#"<p:sp><p:spPr><a:xfrm><a:off x="914400" y="457200"/><a:ext cx="9144000" cy="914400"/></a:xfrm></p:spPr>
                   <p:txBody><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#
            )
        };
        format!(
            r#"<?xml version="1.0"?>
<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"
       xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
  <p:cSld><p:spTree>{body}</p:spTree></p:cSld>
</p:sld>"#
        )
    }

    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let parts = [
        ("ppt/presentation.xml", PRESENTATION.to_string()),
        ("ppt/slides/slide1.xml", slide("Hello")),
        ("ppt/slides/slide2.xml", slide("")),
        ("ppt/slides/slide3.xml", slide("World")),
    ];
    for (name, content) in parts {
        writer.start_file(name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

/// Engine that always fails, driving every slide through the silent-audio
/// fallback. Because the fallback is rendered by ffmpeg, the resulting files
/// are real MP3s that the encoder can consume.
struct OutageEngine {
    calls: AtomicUsize,
}

impl OutageEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

impl NarrationEngine for OutageEngine {
    fn name(&self) -> &str {
        "outage"
    }

    fn synthesize<'a>(
        &'a self,
        _text: &'a str,
        _language: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, NarrationError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(NarrationError("synthetic outage".into())) })
    }
}

/// Engine that records what it was asked to speak.
struct RecordingEngine {
    spoken: std::sync::Mutex<Vec<String>>,
}

impl RecordingEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            spoken: std::sync::Mutex::new(Vec::new()),
        })
    }
}

impl NarrationEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn synthesize<'a>(
        &'a self,
        text: &'a str,
        _language: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, NarrationError>> {
        self.spoken.lock().unwrap().push(text.to_string());
        // Failing afterwards keeps the audio files real (silent fallback).
        Box::pin(async { Err(NarrationError("recorded, now failing".into())) })
    }
}

async fn ffmpeg_available() -> bool {
    slidecast::engine::probe(slidecast::engine::FFMPEG).await
}

/// Container duration in seconds via ffprobe; `None` when ffprobe is not on
/// PATH or its output is unusable.
async fn container_duration_secs(path: &Path) -> Option<f64> {
    let output = slidecast::engine::run_tool(
        "ffprobe",
        [
            "-v".as_ref(),
            "error".as_ref(),
            "-show_entries".as_ref(),
            "format=duration".as_ref(),
            "-of".as_ref(),
            "default=noprint_wrappers=1:nokey=1".as_ref(),
            path.as_os_str(),
        ],
        std::time::Duration::from_secs(30),
    )
    .await
    .ok()?;
    String::from_utf8(output.stdout)
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
}

fn test_config(
    root: &Path,
    engine: Arc<dyn NarrationEngine>,
) -> ConversionConfig {
    ConversionConfig::builder()
        .working_dir(root.join("work"))
        .output_dir(root.join("out"))
        .silent_duration_secs(0.2)
        .narration_engine(engine)
        .build()
        .unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn inspect_reports_deck_metadata() {
    let tmp = tempfile::tempdir().unwrap();
    let deck = tmp.path().join("deck.pptx");
    write_test_deck(&deck);

    let meta = inspect(deck.to_str().unwrap()).await.unwrap();
    assert_eq!(meta.format, DeckFormat::Presentation);
    assert_eq!(meta.slide_count, Some(3));
    assert_eq!(meta.slides_with_text, 2);
    assert_eq!((meta.width_px, meta.height_px), (1280, 720));
}

#[tokio::test]
async fn unsupported_input_creates_no_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    let notes = tmp.path().join("notes.txt");
    std::fs::write(&notes, b"not a deck").unwrap();
    let config = test_config(tmp.path(), OutageEngine::new());
    let working_dir = config.working_dir.clone();

    let err = convert(notes.to_str().unwrap(), config).await.unwrap_err();
    assert!(matches!(err, SlidecastError::UnsupportedFormat { .. }));
    assert!(!working_dir.exists());
}

#[tokio::test]
async fn full_pipeline_produces_a_video_with_silent_fallbacks() {
    if !ffmpeg_available().await {
        println!("SKIP — ffmpeg not on PATH");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let deck = tmp.path().join("deck.pptx");
    write_test_deck(&deck);
    let engine = OutageEngine::new();
    let config = test_config(tmp.path(), engine.clone());

    let output = convert(deck.to_str().unwrap(), config).await.unwrap();

    assert!(output.output_path.exists());
    assert!(std::fs::metadata(&output.output_path).unwrap().len() > 0);
    assert_eq!(output.stats.slide_count, output.slides.len());
    assert!(output.stats.slide_count >= 1);
    // Every narration went through the silent fallback.
    assert_eq!(output.stats.silent, output.stats.slide_count);
    assert_eq!(output.stats.synthesized, 0);
    assert_eq!(output.stats.failed_clips, 0);
    assert!(engine.calls.load(Ordering::SeqCst) >= output.stats.slide_count);

    for slide in &output.slides {
        assert!(slide.frame_path.exists());
        assert!(slide.narration_path.exists());
        assert!(slide.clip_path.as_ref().is_some_and(|p| p.exists()));
        assert!(slide.error.is_none());
        assert_eq!(slide.narration_source, NarrationSource::Silent);
    }
    // Indices are 1-based and contiguous.
    let indices: Vec<usize> = output.slides.iter().map(|s| s.index).collect();
    assert_eq!(indices, (1..=output.slides.len()).collect::<Vec<_>>());
}

#[tokio::test]
async fn output_duration_tracks_slide_count_and_silent_length() {
    if !ffmpeg_available().await {
        println!("SKIP — ffmpeg not on PATH");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let deck = tmp.path().join("deck.pptx");
    write_test_deck(&deck);
    let mut config = test_config(tmp.path(), OutageEngine::new());
    config.silent_duration_secs = 1.0;

    let output = convert(deck.to_str().unwrap(), config).await.unwrap();
    assert_eq!(output.stats.silent, output.stats.slide_count);

    let Some(duration) = container_duration_secs(&output.output_path).await else {
        println!("SKIP — ffprobe not on PATH");
        return;
    };
    // Three 1-second silent narrations concatenate to roughly three seconds.
    // mp3/aac frame granularity pads each clip slightly, so the bound is
    // loose upward but a dropped or duplicated clip still lands outside it.
    let expected = output.stats.slide_count as f64 * 1.0;
    assert!(
        duration >= expected - 0.5 && duration <= expected + 1.5,
        "output duration {duration:.2}s too far from expected {expected:.2}s"
    );
}

#[tokio::test]
async fn second_run_reuses_narration_audio() {
    if !ffmpeg_available().await {
        println!("SKIP — ffmpeg not on PATH");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let deck = tmp.path().join("deck.pptx");
    write_test_deck(&deck);

    let first = convert(
        deck.to_str().unwrap(),
        test_config(tmp.path(), OutageEngine::new()),
    )
    .await
    .unwrap();
    assert_eq!(first.stats.reused, 0);

    let engine = OutageEngine::new();
    let second = convert(deck.to_str().unwrap(), test_config(tmp.path(), engine.clone()))
        .await
        .unwrap();
    assert_eq!(second.stats.reused, second.stats.slide_count);
    // The engine was never consulted for audio that already existed.
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn clean_flag_discards_prior_audio() {
    if !ffmpeg_available().await {
        println!("SKIP — ffmpeg not on PATH");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let deck = tmp.path().join("deck.pptx");
    write_test_deck(&deck);

    convert(
        deck.to_str().unwrap(),
        test_config(tmp.path(), OutageEngine::new()),
    )
    .await
    .unwrap();

    let engine = OutageEngine::new();
    let mut config = test_config(tmp.path(), engine.clone());
    config.clean = true;
    let output = convert(deck.to_str().unwrap(), config).await.unwrap();

    assert_eq!(output.stats.reused, 0);
    assert!(engine.calls.load(Ordering::SeqCst) >= output.stats.slide_count);
}

#[tokio::test]
async fn blank_slides_speak_their_placeholder() {
    if !ffmpeg_available().await {
        println!("SKIP — ffmpeg not on PATH");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let deck = tmp.path().join("deck.pptx");
    write_test_deck(&deck);
    let engine = RecordingEngine::new();
    let config = test_config(tmp.path(), engine.clone());

    convert(deck.to_str().unwrap(), config).await.unwrap();

    let spoken = engine.spoken.lock().unwrap().clone();
    // Slide 2 is blank; the engine must have been asked to speak its
    // placeholder, never an empty string.
    assert!(spoken.iter().all(|t| !t.trim().is_empty()));
    assert!(spoken.iter().any(|t| t == "Slide 2" || t == "Hello"));
}

#[tokio::test]
async fn corrupt_deck_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let deck = tmp.path().join("deck.pptx");
    // Valid ZIP magic, invalid archive.
    std::fs::write(&deck, b"PK\x03\x04garbage-that-is-not-a-zip").unwrap();
    let config = test_config(tmp.path(), OutageEngine::new());

    let err = convert(deck.to_str().unwrap(), config).await.unwrap_err();
    match err {
        SlidecastError::CorruptDeck { .. } | SlidecastError::EngineMissing { .. } => {}
        other => panic!("expected CorruptDeck, got {other}"),
    }
}

// ── Live end-to-end test (opt-in) ────────────────────────────────────────────

#[tokio::test]
async fn e2e_real_deck_and_live_tts() {
    if std::env::var("SLIDECAST_E2E").is_err() {
        println!("SKIP — set SLIDECAST_E2E=1 to run the live e2e test");
        return;
    }
    let deck = std::env::var("SLIDECAST_E2E_DECK")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/deck.pptx")
        });
    if !deck.exists() {
        println!("SKIP — test deck not found: {}", deck.display());
        return;
    }

    let tmp = tempfile::tempdir().unwrap();
    let config = ConversionConfig::builder()
        .working_dir(tmp.path().join("work"))
        .output_dir(tmp.path().join("out"))
        .build()
        .unwrap();

    let output = convert(deck.to_str().unwrap(), config).await.unwrap();
    assert!(output.output_path.exists());
    assert!(output.stats.encoded_clips > 0);
    println!(
        "e2e: {} slides via {} path, {} synthesized / {} silent, {} bytes",
        output.stats.slide_count,
        output.stats.strategy,
        output.stats.synthesized,
        output.stats.silent,
        output.stats.output_bytes
    );
}
