//! The narration engine seam: text + language code → compressed audio bytes.
//!
//! The engine is a trait object so callers (and tests) can swap the network
//! service for a local model or a fake without touching the pipeline. The
//! default implementation speaks the Google Translate TTS endpoint, which
//! returns MP3 and accepts only short inputs — longer texts are chunked on
//! whitespace and the resulting MP3 streams concatenated, which is valid
//! because MP3 frames are self-contained.
//!
//! Engine failures are *expected* here (network blips, quota): the narrator
//! stage composes this primary producer with a total silent-audio fallback,
//! so errors from this module never abort a run.

use futures::future::BoxFuture;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Upper bound on characters per TTS request. The endpoint rejects long
/// inputs; 200 keeps each request comfortably inside the limit.
pub const MAX_TTS_CHARS: usize = 200;

/// Error returned by a narration engine. Always recoverable: the narrator
/// substitutes a silent track.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct NarrationError(pub String);

/// Synthesizes speech for one slide's text.
///
/// Implementations must be `Send + Sync`; per-slide narration may run
/// concurrently. The returned bytes are a complete compressed audio stream
/// (MP3 for the default engine) ready to be written to the slide's audio
/// path.
pub trait NarrationEngine: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Synthesize `text` in `language` into compressed audio bytes.
    fn synthesize<'a>(
        &'a self,
        text: &'a str,
        language: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, NarrationError>>;
}

/// Default engine: the unofficial Google Translate TTS endpoint.
pub struct GoogleTranslateTts {
    client: reqwest::Client,
    endpoint: String,
}

impl GoogleTranslateTts {
    pub const DEFAULT_ENDPOINT: &'static str = "https://translate.google.com/translate_tts";

    /// Build an engine with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, NarrationError> {
        Self::with_endpoint(Self::DEFAULT_ENDPOINT, timeout)
    }

    /// Build an engine against a custom endpoint (used by tests to point at
    /// a local mock server).
    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, NarrationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NarrationError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn fetch_chunk(&self, chunk: &str, language: &str) -> Result<Vec<u8>, NarrationError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", language),
                ("q", chunk),
            ])
            .send()
            .await
            .map_err(|e| NarrationError(format!("TTS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(NarrationError(format!(
                "TTS endpoint returned HTTP {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NarrationError(format!("TTS body read failed: {e}")))?;
        if bytes.is_empty() {
            return Err(NarrationError("TTS endpoint returned an empty body".into()));
        }
        Ok(bytes.to_vec())
    }
}

impl NarrationEngine for GoogleTranslateTts {
    fn name(&self) -> &str {
        "google-translate-tts"
    }

    fn synthesize<'a>(
        &'a self,
        text: &'a str,
        language: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, NarrationError>> {
        Box::pin(async move {
            let chunks = chunk_text(text, MAX_TTS_CHARS);
            debug!("synthesizing {} chars in {} chunk(s)", text.len(), chunks.len());

            let mut audio = Vec::new();
            for chunk in &chunks {
                audio.extend(self.fetch_chunk(chunk, language).await?);
            }
            Ok(audio)
        })
    }
}

/// Split `text` into whitespace-separated chunks of at most `max_chars`
/// characters each.
///
/// A single word longer than the limit is hard-split on character
/// boundaries rather than rejected. Whitespace runs collapse to single
/// spaces; the TTS engine does not voice them anyway.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    let mut flush = |current: &mut String, current_chars: &mut usize, chunks: &mut Vec<String>| {
        if !current.is_empty() {
            chunks.push(std::mem::take(current));
            *current_chars = 0;
        }
    };

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();

        if word_chars > max_chars {
            // Oversized word: emit what we have, then hard-split the word.
            flush(&mut current, &mut current_chars, &mut chunks);
            let mut piece = String::new();
            let mut piece_chars = 0;
            for ch in word.chars() {
                piece.push(ch);
                piece_chars += 1;
                if piece_chars == max_chars {
                    chunks.push(std::mem::take(&mut piece));
                    piece_chars = 0;
                }
            }
            if !piece.is_empty() {
                current_chars = piece_chars;
                current = piece;
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_chars
        } else {
            word_chars + 1
        };
        if current_chars + needed > max_chars {
            flush(&mut current, &mut current_chars, &mut chunks);
            current.push_str(word);
            current_chars = word_chars;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_chars += needed;
        }
    }
    flush(&mut current, &mut current_chars, &mut chunks);

    if chunks.is_empty() {
        chunks.push(String::new());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("Hello world", 200), vec!["Hello world"]);
    }

    #[test]
    fn chunks_never_exceed_limit() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        for chunk in chunk_text(text, 12) {
            assert!(chunk.chars().count() <= 12, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn words_are_not_split_when_they_fit() {
        let chunks = chunk_text("one two three", 7);
        assert_eq!(chunks, vec!["one two", "three"]);
    }

    #[test]
    fn oversized_word_is_hard_split() {
        let chunks = chunk_text("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn unicode_counts_chars_not_bytes() {
        // 6 chars, 12 bytes; must fit in one 6-char chunk.
        let chunks = chunk_text("ääääää", 6);
        assert_eq!(chunks, vec!["ääääää"]);
    }

    #[test]
    fn empty_text_yields_single_empty_chunk() {
        assert_eq!(chunk_text("   ", 10), vec![String::new()]);
    }

    #[test]
    fn engine_name_is_stable() {
        let engine = GoogleTranslateTts::new(Duration::from_secs(10)).unwrap();
        assert_eq!(engine.name(), "google-translate-tts");
    }
}
