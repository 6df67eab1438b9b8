//! Input resolution: validate the deck path and derive its format tag.
//!
//! Runs before anything else touches the filesystem — an unsupported
//! extension or bad magic must be rejected with *zero* files created in the
//! working tree. Magic bytes are checked up front (PPTX is a ZIP container,
//! PDF starts with `%PDF`) so callers get a meaningful error instead of a
//! confusing engine failure three stages later.

use crate::error::SlidecastError;
use crate::model::DeckFormat;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Map a file extension to a format tag. Case-insensitive.
pub fn detect_format(path: &Path) -> Result<DeckFormat, SlidecastError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pptx" => Ok(DeckFormat::Presentation),
        "pdf" => Ok(DeckFormat::FixedLayout),
        _ => Err(SlidecastError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        }),
    }
}

/// Resolve the input path: existence, readability, format tag, magic bytes.
pub fn resolve_input(input: &str) -> Result<(PathBuf, DeckFormat), SlidecastError> {
    let path = PathBuf::from(input);

    if !path.exists() {
        return Err(SlidecastError::InputNotFound { path });
    }

    let format = detect_format(&path)?;

    let mut magic = [0u8; 4];
    match std::fs::File::open(&path) {
        Ok(mut f) => {
            if f.read_exact(&mut magic).is_err() {
                return Err(SlidecastError::CorruptDeck {
                    path,
                    detail: "file is shorter than 4 bytes".into(),
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(SlidecastError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(SlidecastError::InputNotFound { path });
        }
    }

    let (expected_magic, expected_name): (&[u8], &'static str) = match format {
        // PPTX is an OOXML package, i.e. a ZIP archive.
        DeckFormat::Presentation => (b"PK\x03\x04", "PPTX (ZIP)"),
        DeckFormat::FixedLayout => (b"%PDF", "PDF"),
    };

    if &magic != expected_magic {
        return Err(SlidecastError::BadMagic {
            path,
            expected: expected_name,
            magic,
        });
    }

    debug!("resolved {} deck: {}", format, path.display());
    Ok((path, format))
}
