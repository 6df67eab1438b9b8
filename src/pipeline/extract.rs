//! Per-slide text and geometry extraction.
//!
//! For presentations this reads the PPTX package directly: slide parts are
//! XML under `ppt/slides/`, geometry is EMU, and text lives in `<a:t>` runs.
//! Only the handful of elements the pipeline needs are parsed — shape
//! offsets/extents for the degraded renderer, text runs for narration, and
//! background fills. Everything else in the OOXML schema is skipped.
//!
//! For fixed-layout decks, text comes from `pdftotext` (pages are separated
//! by form feeds on stdout). Its absence or failure is recoverable: the
//! controller substitutes placeholder text per index, because extraction is
//! a *total* producer — it must never be the reason a run fails.

use crate::engine::{self, PDFTOTEXT};
use crate::error::SlidecastError;
use crate::model::{
    canvas_size, emu_to_px, Deck, DeckFormat, Slide, TextShape, FALLBACK_HEIGHT, FALLBACK_WIDTH,
};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Deterministic placeholder narrated for slides with no extracted text.
pub fn placeholder_text(index: usize) -> String {
    format!("Slide {index}")
}

/// Align extracted texts to the authoritative slide count established by
/// rasterization: missing indices get placeholders, surplus entries are
/// dropped. Extracted-but-empty strings pass through; the narrator applies
/// its own placeholder substitution at synthesis time.
pub fn align_texts(mut texts: Vec<String>, count: usize) -> Vec<String> {
    if texts.len() != count {
        warn!(
            "extracted {} texts but {} slides exist; padding with placeholders",
            texts.len(),
            count
        );
    }
    texts.truncate(count);
    for index in texts.len() + 1..=count {
        texts.push(placeholder_text(index));
    }
    texts
}

/// Read the deck's structure.
///
/// Presentations are fully parsed (slides, shapes, backgrounds). Fixed-layout
/// decks return an empty slide list — their authoritative page count comes
/// from rasterization, and their canvas is the Full-HD fallback.
pub fn extract_deck(path: &Path, format: DeckFormat) -> Result<Deck, SlidecastError> {
    match format {
        DeckFormat::Presentation => parse_pptx(path),
        DeckFormat::FixedLayout => Ok(Deck {
            path: path.to_path_buf(),
            format,
            width_px: FALLBACK_WIDTH,
            height_px: FALLBACK_HEIGHT,
            slides: Vec::new(),
        }),
    }
}

/// Extract per-slide text for the whole deck. Total: on any failure the
/// result is simply shorter (or empty) and alignment pads with placeholders.
pub async fn extract_texts(
    deck: &Deck,
    timeout: Duration,
) -> Vec<String> {
    match deck.format {
        DeckFormat::Presentation => deck.slides.iter().map(|s| s.text.clone()).collect(),
        DeckFormat::FixedLayout => match pdf_texts(&deck.path, timeout).await {
            Ok(texts) => texts,
            Err(e) => {
                warn!("text extraction failed ({e}); placeholders will be used");
                Vec::new()
            }
        },
    }
}

/// Run `pdftotext` and split its output on form feeds, one entry per page.
async fn pdf_texts(path: &Path, timeout: Duration) -> Result<Vec<String>, SlidecastError> {
    let output = engine::run_tool(
        PDFTOTEXT,
        [
            "-enc".as_ref(),
            "UTF-8".as_ref(),
            path.as_os_str(),
            "-".as_ref(),
        ],
        timeout,
    )
    .await?;

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    let mut pages: Vec<String> = text
        .split('\u{c}')
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();
    // pdftotext terminates every page with a form feed, leaving one empty
    // trailing entry.
    if pages.last().is_some_and(|p| p.is_empty()) {
        pages.pop();
    }
    debug!("pdftotext extracted {} page(s)", pages.len());
    Ok(pages)
}

// ── PPTX parsing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackgroundFill {
    Solid([u8; 3]),
    /// Picture fills are explicitly unsupported and degrade to white.
    Picture,
    Unset,
}

#[derive(Debug, Default)]
struct RawShape {
    x: Option<u64>,
    y: Option<u64>,
    cx: Option<u64>,
    cy: Option<u64>,
    text: String,
}

#[derive(Debug)]
struct SlideXml {
    shapes: Vec<RawShape>,
    background: BackgroundFill,
}

fn parse_pptx(path: &Path) -> Result<Deck, SlidecastError> {
    let corrupt = |detail: String| SlidecastError::CorruptDeck {
        path: path.to_path_buf(),
        detail,
    };

    let file = std::fs::File::open(path).map_err(|e| corrupt(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

    let presentation_xml = read_part(&mut archive, "ppt/presentation.xml")
        .ok_or_else(|| corrupt("missing ppt/presentation.xml".into()))?;
    let (width_emu, height_emu) = parse_slide_size(&presentation_xml)
        .ok_or_else(|| corrupt("missing p:sldSz in ppt/presentation.xml".into()))?;

    let (canvas_w, canvas_h) = canvas_size(width_emu, height_emu);
    let declared_w = emu_to_px(width_emu).max(1);
    let declared_h = emu_to_px(height_emu).max(1);
    let scale_x = canvas_w as f64 / declared_w as f64;
    let scale_y = canvas_h as f64 / declared_h as f64;

    // Master layout background, the middle rung of the fill fallback.
    let master_fill = read_part(&mut archive, "ppt/slideMasters/slideMaster1.xml")
        .and_then(|xml| parse_slide_xml(&xml).ok())
        .map(|m| m.background)
        .unwrap_or(BackgroundFill::Unset);

    // Slide parts in ordinal order. PowerPoint writes slideN.xml with
    // sequential N; relationship-graph resolution is not worth its weight
    // for extraction that is allowed to fall back to placeholders.
    let mut slide_parts: Vec<(usize, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse::<usize>()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    slide_parts.sort_unstable_by_key(|(n, _)| *n);

    let mut slides = Vec::with_capacity(slide_parts.len());
    for (ordinal, (_, part_name)) in slide_parts.iter().enumerate() {
        let index = ordinal + 1;
        let xml = read_part(&mut archive, part_name)
            .ok_or_else(|| corrupt(format!("unreadable slide part {part_name}")))?;
        let parsed = parse_slide_xml(&xml).map_err(|e| corrupt(format!("{part_name}: {e}")))?;

        let background = resolve_background(parsed.background, master_fill);
        let text = parsed
            .shapes
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let shapes = parsed
            .shapes
            .into_iter()
            .filter(|s| !s.text.trim().is_empty())
            .map(|s| TextShape {
                x: s.x.map(|v| (emu_to_px(v) as f64 * scale_x) as i64),
                y: s.y.map(|v| (emu_to_px(v) as f64 * scale_y) as i64),
                width: s.cx.map(|v| (emu_to_px(v) as f64 * scale_x) as i64),
                height: s.cy.map(|v| (emu_to_px(v) as f64 * scale_y) as i64),
                text: s.text.trim().to_string(),
            })
            .collect();

        slides.push(Slide {
            index,
            text,
            shapes,
            background,
        });
    }

    debug!(
        "parsed presentation: {} slides, canvas {}x{}",
        slides.len(),
        canvas_w,
        canvas_h
    );

    Ok(Deck {
        path: path.to_path_buf(),
        format: DeckFormat::Presentation,
        width_px: canvas_w,
        height_px: canvas_h,
        slides,
    })
}

/// Slide fill → master fill → white. Picture fills at either level
/// degrade to white; they are explicitly unsupported.
fn resolve_background(slide: BackgroundFill, master: BackgroundFill) -> [u8; 3] {
    match slide {
        BackgroundFill::Solid(rgb) => rgb,
        BackgroundFill::Picture => [255, 255, 255],
        BackgroundFill::Unset => match master {
            BackgroundFill::Solid(rgb) => rgb,
            _ => [255, 255, 255],
        },
    }
}

fn read_part<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Option<String> {
    let mut part = archive.by_name(name).ok()?;
    let mut xml = String::new();
    part.read_to_string(&mut xml).ok()?;
    Some(xml)
}

/// Pull `cx`/`cy` off the `<p:sldSz>` element.
fn parse_slide_size(presentation_xml: &str) -> Option<(u64, u64)> {
    let mut reader = Reader::from_str(presentation_xml);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"p:sldSz" => {
                let cx = attr_u64(&e, b"cx")?;
                let cy = attr_u64(&e, b"cy")?;
                return Some((cx, cy));
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
    }
}

fn attr_u64(e: &quick_xml::events::BytesStart<'_>, name: &[u8]) -> Option<u64> {
    let attr = e.try_get_attribute(name).ok()??;
    std::str::from_utf8(&attr.value).ok()?.parse().ok()
}

/// Parse one slide (or master) part: text-bearing shapes with declared
/// geometry, and the background fill.
fn parse_slide_xml(xml: &str) -> Result<SlideXml, String> {
    let mut reader = Reader::from_str(xml);

    let mut shapes: Vec<RawShape> = Vec::new();
    let mut current: Option<RawShape> = None;
    let mut background = BackgroundFill::Unset;
    let mut in_background = false;
    let mut in_text_run = false;

    loop {
        let event = reader.read_event().map_err(|e| e.to_string())?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.name().as_ref() {
                    b"p:sp" if !is_empty => {
                        current = Some(RawShape::default());
                    }
                    b"p:bg" if !is_empty => {
                        in_background = true;
                    }
                    b"a:t" if !is_empty => {
                        in_text_run = current.is_some();
                    }
                    b"a:off" => {
                        if let Some(shape) = current.as_mut() {
                            if shape.x.is_none() {
                                shape.x = attr_u64(e, b"x");
                                shape.y = attr_u64(e, b"y");
                            }
                        }
                    }
                    b"a:ext" => {
                        if let Some(shape) = current.as_mut() {
                            if shape.cx.is_none() {
                                shape.cx = attr_u64(e, b"cx");
                                shape.cy = attr_u64(e, b"cy");
                            }
                        }
                    }
                    b"a:srgbClr" if in_background => {
                        if background == BackgroundFill::Unset {
                            if let Some(rgb) = e
                                .try_get_attribute("val")
                                .ok()
                                .flatten()
                                .and_then(|a| parse_hex_rgb(&a.value))
                            {
                                background = BackgroundFill::Solid(rgb);
                            }
                        }
                    }
                    b"a:blipFill" if in_background => {
                        if background == BackgroundFill::Unset {
                            background = BackgroundFill::Picture;
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) if in_text_run => {
                if let Some(shape) = current.as_mut() {
                    let run = t.unescape().map_err(|e| e.to_string())?;
                    shape.text.push_str(&run);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"p:sp" => {
                    if let Some(shape) = current.take() {
                        shapes.push(shape);
                    }
                    in_text_run = false;
                }
                b"p:bg" => in_background = false,
                b"a:t" => in_text_run = false,
                // Paragraph break inside a shape's text frame.
                b"a:p" => {
                    if let Some(shape) = current.as_mut() {
                        if !shape.text.is_empty() && !shape.text.ends_with('\n') {
                            shape.text.push('\n');
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(SlideXml { shapes, background })
}

fn parse_hex_rgb(value: &[u8]) -> Option<[u8; 3]> {
    let s = std::str::from_utf8(value).ok()?;
    if s.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&s[0..2], 16).ok()?;
    let g = u8::from_str_radix(&s[2..4], 16).ok()?;
    let b = u8::from_str_radix(&s[4..6], 16).ok()?;
    Some([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SLIDE_SIZE: &str = r#"<?xml version="1.0"?>
<p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
  <p:sldSz cx="12192000" cy="6858000"/>
</p:presentation>"#;

    fn slide_xml(body: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"
       xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
  <p:cSld>{body}</p:cSld>
</p:sld>"#
        )
    }

    fn shape(x: u64, y: u64, cx: u64, cy: u64, text: &str) -> String {
        format!(
            r#"<p:sp><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm></p:spPr>
               <p:txBody><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#
        )
    }

    fn write_test_pptx(parts: &[(&str, &str)]) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let file = std::fs::File::create(tmp.path().join("deck.pptx")).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, content) in parts {
            writer.start_file(name.to_string(), options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        tmp
    }

    #[test]
    fn placeholder_is_deterministic() {
        assert_eq!(placeholder_text(2), "Slide 2");
    }

    #[test]
    fn align_pads_missing_indices_with_placeholders() {
        let texts = vec!["Hello".to_string()];
        let aligned = align_texts(texts, 3);
        assert_eq!(aligned, vec!["Hello", "Slide 2", "Slide 3"]);
    }

    #[test]
    fn align_truncates_surplus() {
        let texts = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(align_texts(texts, 2), vec!["a", "b"]);
    }

    #[test]
    fn align_keeps_empty_strings() {
        // The narrator, not alignment, owns the empty-text substitution.
        let aligned = align_texts(vec!["Hello".into(), String::new()], 2);
        assert_eq!(aligned[1], "");
    }

    #[test]
    fn slide_size_parses_from_presentation_xml() {
        assert_eq!(parse_slide_size(SLIDE_SIZE), Some((12_192_000, 6_858_000)));
    }

    #[test]
    fn shape_text_and_geometry_parse() {
        let xml = slide_xml(&format!(
            "<p:spTree>{}</p:spTree>",
            shape(914_400, 457_200, 3_657_600, 914_400, "Title text")
        ));
        let parsed = parse_slide_xml(&xml).unwrap();
        assert_eq!(parsed.shapes.len(), 1);
        let s = &parsed.shapes[0];
        assert_eq!(s.text.trim(), "Title text");
        assert_eq!(s.x, Some(914_400));
        assert_eq!(s.cy, Some(914_400));
    }

    #[test]
    fn paragraphs_become_line_breaks() {
        let xml = slide_xml(
            r#"<p:spTree><p:sp><p:txBody>
                 <a:p><a:r><a:t>first</a:t></a:r></a:p>
                 <a:p><a:r><a:t>second</a:t></a:r></a:p>
               </p:txBody></p:sp></p:spTree>"#,
        );
        let parsed = parse_slide_xml(&xml).unwrap();
        assert_eq!(parsed.shapes[0].text.trim(), "first\nsecond");
    }

    #[test]
    fn solid_background_parses() {
        let xml = slide_xml(
            r#"<p:bg><p:bgPr><a:solidFill><a:srgbClr val="1A2B3C"/></a:solidFill></p:bgPr></p:bg>"#,
        );
        let parsed = parse_slide_xml(&xml).unwrap();
        assert_eq!(parsed.background, BackgroundFill::Solid([0x1A, 0x2B, 0x3C]));
    }

    #[test]
    fn picture_fill_degrades_to_white() {
        let xml = slide_xml(r#"<p:bg><p:bgPr><a:blipFill/></p:bgPr></p:bg>"#);
        let parsed = parse_slide_xml(&xml).unwrap();
        assert_eq!(parsed.background, BackgroundFill::Picture);
        assert_eq!(
            resolve_background(parsed.background, BackgroundFill::Solid([0, 0, 0])),
            [255, 255, 255]
        );
    }

    #[test]
    fn unset_background_falls_back_to_master_then_white() {
        assert_eq!(
            resolve_background(BackgroundFill::Unset, BackgroundFill::Solid([9, 9, 9])),
            [9, 9, 9]
        );
        assert_eq!(
            resolve_background(BackgroundFill::Unset, BackgroundFill::Unset),
            [255, 255, 255]
        );
    }

    #[test]
    fn full_deck_parses_with_slide_order_and_text() {
        let slide1 = slide_xml(&format!(
            "<p:spTree>{}</p:spTree>",
            shape(0, 0, 9_144_000, 914_400, "Hello")
        ));
        let slide2 = slide_xml("<p:spTree/>");
        let slide10 = slide_xml(&format!(
            "<p:spTree>{}</p:spTree>",
            shape(0, 5_000_000, 9_144_000, 914_400, "World")
        ));
        let tmp = write_test_pptx(&[
            ("ppt/presentation.xml", SLIDE_SIZE),
            ("ppt/slides/slide10.xml", &slide10),
            ("ppt/slides/slide1.xml", &slide1),
            ("ppt/slides/slide2.xml", &slide2),
        ]);

        let deck = parse_pptx(&tmp.path().join("deck.pptx")).unwrap();
        assert_eq!(deck.slides.len(), 3);
        // Numeric ordering: slide10 comes last, not second.
        assert_eq!(deck.slides[0].text, "Hello");
        assert_eq!(deck.slides[1].text, "");
        assert_eq!(deck.slides[2].text, "World");
        assert_eq!(deck.slides[2].index, 3);
        // 12192000 EMU = 1280 px; meets the floor, keeps declared size.
        assert_eq!((deck.width_px, deck.height_px), (1280, 720));
    }

    #[test]
    fn zero_shape_slide_still_yields_a_slide() {
        let tmp = write_test_pptx(&[
            ("ppt/presentation.xml", SLIDE_SIZE),
            ("ppt/slides/slide1.xml", &slide_xml("<p:spTree/>")),
        ]);
        let deck = parse_pptx(&tmp.path().join("deck.pptx")).unwrap();
        assert_eq!(deck.slides.len(), 1);
        assert!(deck.slides[0].shapes.is_empty());
        assert_eq!(deck.slides[0].background, [255, 255, 255]);
    }

    #[test]
    fn missing_presentation_xml_is_corrupt() {
        let tmp = write_test_pptx(&[("ppt/slides/slide1.xml", "<p:sld/>")]);
        let err = parse_pptx(&tmp.path().join("deck.pptx")).unwrap_err();
        assert!(matches!(err, SlidecastError::CorruptDeck { .. }));
    }
}
