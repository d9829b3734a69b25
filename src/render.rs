//! Markdown → PDF rendering.
//!
//! The renderer is split in two passes so the interesting part stays
//! testable without a PDF library:
//!
//! 1. [`layout_blocks`] — a pure, deterministic pass from Markdown text to a
//!    flat list of [`Block`]s (headings, bullets, numbered items,
//!    paragraphs, rules). Identical markup always produces an identical
//!    layout.
//! 2. [`render_pdf`] — walks the blocks onto A4 pages with `printpdf`
//!    builtin fonts, word-wrapping long lines and starting a new page when
//!    the cursor reaches the bottom margin.
//!
//! Only the structural subset of Markdown the report prompts ask for is
//! handled; unknown constructs degrade to plain paragraphs, never to an
//! error.

use once_cell::sync::Lazy;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use regex::Regex;
use std::io::BufWriter;
use std::path::Path;

use crate::error::ReportError;

/// One renderable unit of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// `#`/`##`/`###` heading with the marker stripped. Level is 1-3.
    Heading { level: u8, text: String },
    /// `-` or `*` list item.
    Bullet(String),
    /// `1.`-style list item, renumbered in document order.
    Numbered { number: usize, text: String },
    /// Plain paragraph line.
    Paragraph(String),
    /// Horizontal rule (`---`).
    Rule,
}

static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)[.)]\s+(.*)$").unwrap());
static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static RE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").unwrap());

/// Remove inline emphasis markers, keeping the text. Builtin PDF fonts
/// carry no style variants per run, so emphasis becomes plain text.
fn strip_inline(text: &str) -> String {
    let s = RE_LINK.replace_all(text, "$1");
    let s = RE_BOLD.replace_all(&s, "$1");
    let s = RE_ITALIC.replace_all(&s, "$1");
    RE_CODE.replace_all(&s, "$1").to_string()
}

/// Parse Markdown into a flat block list. Pure and deterministic.
pub fn layout_blocks(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();

    for raw in markdown.lines() {
        let line = raw.trim_end();
        let trimmed = line.trim_start();

        if trimmed.is_empty() {
            continue;
        }

        if trimmed == "---" || trimmed == "***" {
            blocks.push(Block::Rule);
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("### ") {
            blocks.push(Block::Heading {
                level: 3,
                text: strip_inline(rest),
            });
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("## ") {
            blocks.push(Block::Heading {
                level: 2,
                text: strip_inline(rest),
            });
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("# ") {
            blocks.push(Block::Heading {
                level: 1,
                text: strip_inline(rest),
            });
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            blocks.push(Block::Bullet(strip_inline(rest)));
            continue;
        }

        if let Some(caps) = RE_NUMBERED.captures(trimmed) {
            blocks.push(Block::Numbered {
                number: caps[1].parse().unwrap_or(1),
                text: strip_inline(&caps[2]),
            });
            continue;
        }

        blocks.push(Block::Paragraph(strip_inline(trimmed)));
    }

    blocks
}

/// Greedy word wrap at `width` characters. Words longer than the width get
/// a line of their own rather than being split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

// A4 layout constants, in millimetres.
const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN_L: f32 = 20.0;
const MARGIN_BOTTOM: f32 = 20.0;
const TOP_Y: f32 = 280.0;
const BODY_WIDTH_CHARS: usize = 90;

/// Render a Markdown report to PDF bytes.
///
/// `title` becomes the PDF document title. The body is laid out with
/// Helvetica builtin fonts: headings bold and stepped down in size, list
/// items indented, rules drawn as a dashed text line.
pub fn render_pdf(markdown: &str, title: &str) -> Result<Vec<u8>, ReportError> {
    let blocks = layout_blocks(markdown);

    let (doc, page1, layer1) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::RenderFailed(format!("font: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::RenderFailed(format!("font: {e}")))?;

    let mut layer = doc.get_page(page1).get_layer(layer1);
    let mut y = TOP_Y;

    // Start a new page when fewer than `needed` mm remain.
    fn ensure_room(
        doc: &printpdf::PdfDocumentReference,
        layer: &mut printpdf::PdfLayerReference,
        y: &mut f32,
        needed: f32,
    ) {
        if *y - needed < MARGIN_BOTTOM {
            let (page, l) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
            *layer = doc.get_page(page).get_layer(l);
            *y = TOP_Y;
        }
    }

    for block in &blocks {
        match block {
            Block::Heading { level, text } => {
                let (size, gap_before, gap_after) = match *level {
                    1 => (16.0, 4.0, 8.0),
                    2 => (12.0, 6.0, 6.0),
                    _ => (10.5, 4.0, 5.0),
                };
                y -= gap_before;
                ensure_room(&doc, &mut layer, &mut y, 12.0);
                layer.use_text(text.as_str(), size, Mm(MARGIN_L), Mm(y), &bold);
                y -= gap_after;
            }
            Block::Bullet(text) => {
                for (i, line) in wrap_text(text, BODY_WIDTH_CHARS - 4).iter().enumerate() {
                    ensure_room(&doc, &mut layer, &mut y, 6.0);
                    let prefix = if i == 0 { "\u{2022} " } else { "  " };
                    layer.use_text(
                        format!("{prefix}{line}"),
                        9.5,
                        Mm(MARGIN_L + 4.0),
                        Mm(y),
                        &font,
                    );
                    y -= 4.5;
                }
                y -= 1.0;
            }
            Block::Numbered { number, text } => {
                for (i, line) in wrap_text(text, BODY_WIDTH_CHARS - 5).iter().enumerate() {
                    ensure_room(&doc, &mut layer, &mut y, 6.0);
                    let prefix = if i == 0 {
                        format!("{number}. ")
                    } else {
                        "   ".to_string()
                    };
                    layer.use_text(
                        format!("{prefix}{line}"),
                        9.5,
                        Mm(MARGIN_L + 4.0),
                        Mm(y),
                        &font,
                    );
                    y -= 4.5;
                }
                y -= 1.0;
            }
            Block::Paragraph(text) => {
                for line in wrap_text(text, BODY_WIDTH_CHARS) {
                    ensure_room(&doc, &mut layer, &mut y, 6.0);
                    layer.use_text(line, 9.5, Mm(MARGIN_L), Mm(y), &font);
                    y -= 4.5;
                }
                y -= 2.0;
            }
            Block::Rule => {
                ensure_room(&doc, &mut layer, &mut y, 8.0);
                layer.use_text(
                    "\u{2014}".repeat(40),
                    8.0,
                    Mm(MARGIN_L),
                    Mm(y),
                    &font,
                );
                y -= 6.0;
            }
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ReportError::RenderFailed(format!("save: {e}")))?;
    buf.into_inner()
        .map_err(|e| ReportError::RenderFailed(format!("buffer: {e}")))
}

/// Render and write the PDF to `path`.
pub fn render_pdf_to_file(
    markdown: &str,
    title: &str,
    path: impl AsRef<Path>,
) -> Result<(), ReportError> {
    let path = path.as_ref();
    let bytes = render_pdf(markdown, title)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| ReportError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
    }
    std::fs::write(path, bytes).map_err(|e| ReportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
