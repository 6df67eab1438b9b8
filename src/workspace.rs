//! Working-directory layout: one subdirectory per stage, stable names.
//!
//! Each stage writes only to its own subdirectory and never mutates another
//! stage's output files, so no locking is needed between stages. The names
//! are stable on purpose — intermediate artifacts are meant to be inspectable
//! when a run goes wrong:
//!
//! ```text
//! <working_dir>/
//! ├── pdf/            normalized fixed-layout document (deck.pdf)
//! ├── slides/         slide001.png, slide002.png, …
//! ├── audio/          slide001.mp3, …
//! ├── slide_videos/   slide001.mp4, …
//! └── concat_list.txt assembly manifest
//! ```

use crate::error::SlidecastError;
use std::path::{Path, PathBuf};

/// Paths of the per-stage working subdirectories.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub pdf_dir: PathBuf,
    pub slides_dir: PathBuf,
    pub audio_dir: PathBuf,
    pub videos_dir: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            pdf_dir: root.join("pdf"),
            slides_dir: root.join("slides"),
            audio_dir: root.join("audio"),
            videos_dir: root.join("slide_videos"),
            root,
        }
    }

    /// Create every stage subdirectory. Called only after INIT has validated
    /// the input, so a rejected deck leaves no files behind.
    pub async fn bootstrap(&self) -> Result<(), SlidecastError> {
        for dir in [
            &self.root,
            &self.pdf_dir,
            &self.slides_dir,
            &self.audio_dir,
            &self.videos_dir,
        ] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| SlidecastError::Io {
                    path: dir.clone(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Remove the whole working tree (the `--clean` flag).
    pub async fn clean(root: &Path) -> Result<(), SlidecastError> {
        match tokio::fs::remove_dir_all(root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SlidecastError::Io {
                path: root.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Canonical frame path for a 1-based slide index.
    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.slides_dir.join(format!("slide{index:03}.png"))
    }

    /// Canonical narration path for a 1-based slide index.
    pub fn audio_path(&self, index: usize) -> PathBuf {
        self.audio_dir.join(format!("slide{index:03}.mp3"))
    }

    /// Canonical clip path for a 1-based slide index.
    pub fn clip_path(&self, index: usize) -> PathBuf {
        self.videos_dir.join(format!("slide{index:03}.mp4"))
    }

    /// Path of the concat manifest consumed by the assembler.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("concat_list.txt")
    }

    /// Path of the normalized fixed-layout document.
    pub fn normalized_pdf_path(&self) -> PathBuf {
        self.pdf_dir.join("deck.pdf")
    }
}
