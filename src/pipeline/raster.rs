//! Frame production: one PNG per slide, named `slide{NNN}.png`.
//!
//! Two strategies exist and exactly one is resolved per run:
//!
//! * **Preferred** — pixel-faithful: `soffice` converts the presentation to
//!   PDF (skipped for fixed-layout input, which is already a PDF), then
//!   `pdftoppm` rasterizes every page at the configured DPI.
//! * **Degraded** — in-process: each slide's extracted text is painted onto a
//!   solid-background canvas with an embedded font. Legible, not faithful.
//!
//! Strategy selection happens once, before any frame is produced, so a run
//! never mixes faithful and degraded frames. A *runtime* failure of the
//! preferred engines still falls back to the degraded renderer for the whole
//! deck rather than failing the run.

use crate::config::ConversionConfig;
use crate::engine::{self, PDFTOPPM, PDFTOTEXT, SOFFICE};
use crate::error::SlidecastError;
use crate::model::{Deck, DeckFormat, Frame, Slide, TextShape};
use crate::workspace::Workspace;
use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Which rasterization path this run uses. Resolved once at stage entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterStrategy {
    /// soffice + pdftoppm, pixel-faithful slide renders.
    Preferred,
    /// In-process text-on-background rendering.
    Degraded,
}

impl fmt::Display for RasterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterStrategy::Preferred => write!(f, "preferred"),
            RasterStrategy::Degraded => write!(f, "degraded"),
        }
    }
}

/// Probe the external engines and pick the strategy for this run.
///
/// With `strict_engines`, a missing preferred engine is fatal instead of
/// selecting the degraded path. Independently of strictness, a fixed-layout
/// deck with *neither* `pdftoppm` nor `pdftotext` available is unprocessable:
/// the degraded renderer would not even know the page count.
pub async fn select_strategy(
    format: DeckFormat,
    strict_engines: bool,
) -> Result<RasterStrategy, SlidecastError> {
    let have_pdftoppm = engine::probe(PDFTOPPM).await;
    let missing: Option<&'static str> = match format {
        DeckFormat::Presentation => {
            if !engine::probe(SOFFICE).await {
                Some(SOFFICE)
            } else if !have_pdftoppm {
                Some(PDFTOPPM)
            } else {
                None
            }
        }
        DeckFormat::FixedLayout => (!have_pdftoppm).then_some(PDFTOPPM),
    };

    let Some(tool) = missing else {
        info!("preferred rasterization engines available");
        return Ok(RasterStrategy::Preferred);
    };

    if strict_engines {
        return Err(SlidecastError::EngineMissing {
            tool,
            hint: format!("'{tool}' is required because strict engine mode is enabled."),
        });
    }

    if format == DeckFormat::FixedLayout && !engine::probe(PDFTOTEXT).await {
        // No rasterizer and no text extractor: the page count itself is
        // unknowable.
        return Err(SlidecastError::EngineMissing {
            tool: PDFTOPPM,
            hint: engine_hint_for_pdf(),
        });
    }

    warn!("'{tool}' not found; falling back to degraded in-process rendering");
    Ok(RasterStrategy::Degraded)
}

fn engine_hint_for_pdf() -> String {
    "Install poppler-utils: a fixed-layout deck needs pdftoppm (or at least pdftotext) \
     to determine its page count."
        .to_string()
}

/// Produce one frame per slide using `strategy`.
///
/// `texts` is the EXTRACT stage's per-slide output; the degraded renderer
/// uses it for fixed-layout decks, whose page count it carries. Returns the
/// frames in ordinal order together with the strategy that actually produced
/// them, which may be [`RasterStrategy::Degraded`] even when `Preferred` was
/// requested, if the engines failed at runtime.
pub async fn rasterize(
    deck: &Deck,
    texts: &[String],
    workspace: &Workspace,
    config: &ConversionConfig,
    strategy: RasterStrategy,
) -> Result<(Vec<Frame>, RasterStrategy), SlidecastError> {
    match strategy {
        RasterStrategy::Preferred => {
            match rasterize_preferred(deck, workspace, config).await {
                Ok(frames) => Ok((frames, RasterStrategy::Preferred)),
                Err(e) => {
                    warn!("preferred rasterization failed ({e}); retrying with degraded renderer");
                    let frames = rasterize_degraded(deck, texts, workspace, config).await?;
                    Ok((frames, RasterStrategy::Degraded))
                }
            }
        }
        RasterStrategy::Degraded => {
            let frames = rasterize_degraded(deck, texts, workspace, config).await?;
            Ok((frames, RasterStrategy::Degraded))
        }
    }
}

// ── Preferred path ───────────────────────────────────────────────────────

async fn rasterize_preferred(
    deck: &Deck,
    workspace: &Workspace,
    config: &ConversionConfig,
) -> Result<Vec<Frame>, SlidecastError> {
    let timeout = config.engine_timeout();
    let pdf = workspace.normalized_pdf_path();

    match deck.format {
        DeckFormat::Presentation => {
            engine::run_tool(
                SOFFICE,
                [
                    "--headless".as_ref(),
                    "--convert-to".as_ref(),
                    "pdf".as_ref(),
                    "--outdir".as_ref(),
                    workspace.pdf_dir.as_os_str(),
                    deck.path.as_os_str(),
                ],
                timeout,
            )
            .await?;

            // soffice names its output after the input stem.
            let stem = deck
                .path
                .file_stem()
                .ok_or_else(|| SlidecastError::Internal("input path has no file stem".into()))?;
            let produced = workspace
                .pdf_dir
                .join(Path::new(stem).with_extension("pdf"));
            tokio::fs::rename(&produced, &pdf)
                .await
                .map_err(|e| SlidecastError::Io {
                    path: produced,
                    source: e,
                })?;
        }
        DeckFormat::FixedLayout => {
            tokio::fs::copy(&deck.path, &pdf)
                .await
                .map_err(|e| SlidecastError::Io {
                    path: pdf.clone(),
                    source: e,
                })?;
        }
    }

    // An interrupted prior run can leave page files behind; they must not
    // be swept into this run's frame sequence.
    clear_stale_pages(workspace).await?;

    let prefix = workspace.slides_dir.join("page");
    engine::run_tool(
        PDFTOPPM,
        [
            "-png".as_ref(),
            "-r".as_ref(),
            config.dpi.to_string().as_ref(),
            pdf.as_os_str(),
            prefix.as_os_str(),
        ],
        timeout,
    )
    .await?;

    let frames = collect_rendered_pages(workspace).await?;
    debug!("pdftoppm produced {} frame(s) at {} DPI", frames.len(), config.dpi);
    if deck.format == DeckFormat::Presentation
        && !deck.slides.is_empty()
        && frames.len() != deck.slides.len()
    {
        warn!(
            "deck declares {} slides but rasterization produced {} frames; \
             the frame count is authoritative",
            deck.slides.len(),
            frames.len()
        );
    }
    Ok(frames)
}

/// Remove leftover `page-*.png` files from `slides/` before rasterizing.
async fn clear_stale_pages(workspace: &Workspace) -> Result<(), SlidecastError> {
    let io_err = |e| SlidecastError::Io {
        path: workspace.slides_dir.clone(),
        source: e,
    };
    let mut entries = tokio::fs::read_dir(&workspace.slides_dir)
        .await
        .map_err(io_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with("page-") && name.ends_with(".png") {
            tokio::fs::remove_file(entry.path())
                .await
                .map_err(|e| SlidecastError::Io {
                    path: entry.path(),
                    source: e,
                })?;
        }
    }
    Ok(())
}

/// Renumber pdftoppm's `page-N.png` output into the canonical zero-padded
/// `slideNNN.png` names. pdftoppm pads N to the page-count width, so both
/// `page-1.png` and `page-001.png` must parse.
async fn collect_rendered_pages(workspace: &Workspace) -> Result<Vec<Frame>, SlidecastError> {
    let mut pages: Vec<(usize, PathBuf)> = Vec::new();
    let mut entries = tokio::fs::read_dir(&workspace.slides_dir)
        .await
        .map_err(|e| SlidecastError::Io {
            path: workspace.slides_dir.clone(),
            source: e,
        })?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| SlidecastError::Io {
        path: workspace.slides_dir.clone(),
        source: e,
    })? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(number) = name
            .strip_prefix("page-")
            .and_then(|rest| rest.strip_suffix(".png"))
            .and_then(|digits| digits.parse::<usize>().ok())
        else {
            continue;
        };
        pages.push((number, entry.path()));
    }
    pages.sort_unstable_by_key(|(n, _)| *n);

    let mut frames = Vec::with_capacity(pages.len());
    for (ordinal, (_, source)) in pages.into_iter().enumerate() {
        let index = ordinal + 1;
        let target = workspace.frame_path(index);
        tokio::fs::rename(&source, &target)
            .await
            .map_err(|e| SlidecastError::Io {
                path: target.clone(),
                source: e,
            })?;
        frames.push(Frame {
            index,
            path: target,
        });
    }
    Ok(frames)
}

// ── Degraded path ────────────────────────────────────────────────────────

async fn rasterize_degraded(
    deck: &Deck,
    texts: &[String],
    workspace: &Workspace,
    config: &ConversionConfig,
) -> Result<Vec<Frame>, SlidecastError> {
    let painter = TextPainter::load(config.font_path.as_deref());
    if painter.is_none() {
        warn!("no usable font found; degraded frames will carry backgrounds only");
    }

    let slides: Vec<Slide> = match deck.format {
        DeckFormat::Presentation => deck.slides.clone(),
        DeckFormat::FixedLayout => {
            // The EXTRACT stage's page texts double as the page count here;
            // an empty set means pdftotext was unavailable or failed.
            if texts.is_empty() {
                return Err(SlidecastError::EngineMissing {
                    tool: PDFTOPPM,
                    hint: engine_hint_for_pdf(),
                });
            }
            texts
                .iter()
                .enumerate()
                .map(|(i, text)| Slide {
                    index: i + 1,
                    text: text.clone(),
                    shapes: Vec::new(),
                    background: [255, 255, 255],
                })
                .collect()
        }
    };

    let mut frames = Vec::with_capacity(slides.len());
    for slide in &slides {
        let path = workspace.frame_path(slide.index);
        render_slide_frame(slide, deck.width_px, deck.height_px, painter.as_ref(), &path)?;
        frames.push(Frame {
            index: slide.index,
            path,
        });
    }
    debug!("degraded renderer produced {} frame(s)", frames.len());
    Ok(frames)
}

/// Paint one slide onto its canvas and save the PNG.
fn render_slide_frame(
    slide: &Slide,
    width: u32,
    height: u32,
    painter: Option<&TextPainter>,
    path: &Path,
) -> Result<(), SlidecastError> {
    let bg = image::Rgb(slide.background);
    let mut canvas = RgbImage::from_pixel(width, height, bg);

    if let Some(painter) = painter {
        let color = text_color(slide.background);
        let mut band = FallbackBands::new(width, height);

        if slide.shapes.is_empty() && !slide.text.trim().is_empty() {
            // Fixed-layout degraded frames: the whole page text, one region.
            painter.paint(
                &mut canvas,
                &slide.text,
                body_size(height),
                false,
                band.full_region(),
                color,
            );
        } else {
            for shape in &slide.shapes {
                let region = shape_region(shape, width, height).unwrap_or_else(|| band.next());
                let title = is_title(shape, height);
                let size = if title {
                    title_size(height)
                } else {
                    body_size(height)
                };
                painter.paint(&mut canvas, &shape.text, size, title, region, color);
            }
        }
    }

    canvas.save(path).map_err(|e| SlidecastError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })
}

/// A shape is treated as a title when its top edge lies in the upper 30%
/// of the canvas.
fn is_title(shape: &TextShape, canvas_height: u32) -> bool {
    match shape.y {
        Some(y) => (y as f64) < canvas_height as f64 * 0.30,
        None => false,
    }
}

fn title_size(canvas_height: u32) -> f32 {
    canvas_height as f32 / 15.0
}

fn body_size(canvas_height: u32) -> f32 {
    canvas_height as f32 / 25.0
}

/// Black on light backgrounds, white on dark ones.
fn text_color(background: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = background;
    let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    if luma < 128.0 {
        [255, 255, 255]
    } else {
        [0, 0, 0]
    }
}

/// A rectangular paint target in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Region {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

/// Clamp a shape's declared geometry to the canvas; `None` when the shape
/// has no usable placement.
fn shape_region(shape: &TextShape, canvas_w: u32, canvas_h: u32) -> Option<Region> {
    let (x, y, w, h) = (shape.x?, shape.y?, shape.width?, shape.height?);
    if w <= 0 || h <= 0 {
        return None;
    }
    let x = x.clamp(0, canvas_w as i64 - 1) as f32;
    let y = y.clamp(0, canvas_h as i64 - 1) as f32;
    let width = (w as f32).min(canvas_w as f32 - x);
    let height = (h as f32).min(canvas_h as f32 - y);
    Some(Region {
        x,
        y,
        width,
        height,
    })
}

/// Stacked full-width bands handed to shapes that carry no geometry, so
/// several such shapes never paint over each other.
struct FallbackBands {
    canvas_w: f32,
    canvas_h: f32,
    next_y: f32,
}

impl FallbackBands {
    fn new(canvas_w: u32, canvas_h: u32) -> Self {
        let canvas_h = canvas_h as f32;
        Self {
            canvas_w: canvas_w as f32,
            canvas_h,
            next_y: canvas_h * 0.05,
        }
    }

    fn next(&mut self) -> Region {
        let margin = self.canvas_w * 0.05;
        let height = self.canvas_h / 6.0;
        let region = Region {
            x: margin,
            y: self.next_y.min(self.canvas_h - height),
            width: self.canvas_w - 2.0 * margin,
            height,
        };
        self.next_y += height;
        region
    }

    fn full_region(&self) -> Region {
        let margin_x = self.canvas_w * 0.08;
        let margin_y = self.canvas_h * 0.08;
        Region {
            x: margin_x,
            y: margin_y,
            width: self.canvas_w - 2.0 * margin_x,
            height: self.canvas_h - 2.0 * margin_y,
        }
    }
}

/// Wraps loaded fontdue faces with word-wrapped region painting.
struct TextPainter {
    font: Font,
    /// Bold face for title shapes; regular is reused when none resolves.
    bold: Option<Font>,
}

/// (regular, bold) pairs probed when no explicit font is configured.
const FONT_CANDIDATES: &[(&str, &str)] = &[
    (
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    ),
    (
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    ),
    (
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    ),
    (
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    ),
    (
        "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    ),
];

impl TextPainter {
    /// Load the configured font, or probe the system candidates. `None` when
    /// nothing resolves; callers then emit background-only frames.
    fn load(explicit: Option<&Path>) -> Option<Self> {
        let candidates: Vec<(PathBuf, Option<PathBuf>)> = match explicit {
            Some(p) => vec![(p.to_path_buf(), None)],
            None => FONT_CANDIDATES
                .iter()
                .map(|(regular, bold)| (PathBuf::from(regular), Some(PathBuf::from(bold))))
                .collect(),
        };
        for (candidate, bold_path) in candidates {
            let Ok(bytes) = std::fs::read(&candidate) else {
                continue;
            };
            match Font::from_bytes(bytes, FontSettings::default()) {
                Ok(font) => {
                    debug!("degraded renderer using font {}", candidate.display());
                    let bold = bold_path
                        .and_then(|p| std::fs::read(p).ok())
                        .and_then(|b| Font::from_bytes(b, FontSettings::default()).ok());
                    return Some(Self { font, bold });
                }
                Err(e) => warn!("unusable font {}: {e}", candidate.display()),
            }
        }
        None
    }

    /// Lay out `text` word-wrapped inside `region` and alpha-blend the glyph
    /// coverage onto the canvas. Text that overflows the region is clipped
    /// by the layout's max height.
    fn paint(
        &self,
        canvas: &mut RgbImage,
        text: &str,
        px: f32,
        bold: bool,
        region: Region,
        color: [u8; 3],
    ) {
        if text.trim().is_empty() || region.width < px || region.height < px {
            return;
        }

        let face = if bold {
            self.bold.as_ref().unwrap_or(&self.font)
        } else {
            &self.font
        };
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x: region.x,
            y: region.y,
            max_width: Some(region.width),
            max_height: Some(region.height),
            ..LayoutSettings::default()
        });
        layout.append(&[face], &TextStyle::new(text, px, 0));

        let (canvas_w, canvas_h) = canvas.dimensions();
        let region_bottom = region.y + region.height;
        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            if glyph.y + glyph.height as f32 > region_bottom {
                // max_height stops layout, not glyph overflow on the last line.
                continue;
            }
            let (metrics, coverage) = face.rasterize_config(glyph.key);
            for row in 0..metrics.height {
                for col in 0..metrics.width {
                    let x = glyph.x as i64 + col as i64;
                    let y = glyph.y as i64 + row as i64;
                    if x < 0 || y < 0 || x >= canvas_w as i64 || y >= canvas_h as i64 {
                        continue;
                    }
                    let alpha = coverage[row * metrics.width + col] as u16;
                    if alpha == 0 {
                        continue;
                    }
                    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
                    for (channel, target) in pixel.0.iter_mut().zip(color) {
                        let blended =
                            (*channel as u16 * (255 - alpha) + target as u16 * alpha) / 255;
                        *channel = blended as u8;
                    }
                }
            }
        }
    }
}
