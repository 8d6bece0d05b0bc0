//! HTML to PDF conversion.
//!
//! `PrintPdfConverter` lays out the blocks produced by `markup::parse_blocks`
//! with greedy word-wrap over the Helvetica metric tables and paginates onto
//! US-letter pages using printpdf's built-in fonts.

use std::collections::HashMap;

use printpdf::{Color, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rgb};

use crate::render::font_metrics::{get_metrics, FontFace, PT_TO_MM};
use crate::render::markup::{parse_blocks, Block, BlockKind};
use crate::render::RenderError;

const LETTER_WIDTH_MM: f32 = 215.9;
const LETTER_HEIGHT_MM: f32 = 279.4;
const LIST_INDENT_MM: f32 = 7.0;

/// Page geometry and type sizes for one document style.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub margin_mm: f32,
    pub base_font_pt: f32,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
    pub name_pt: f32,
    pub contact_pt: f32,
}

impl PageLayout {
    /// 2 cm margins, 11 pt body.
    pub fn resume() -> Self {
        PageLayout {
            page_width_mm: LETTER_WIDTH_MM,
            page_height_mm: LETTER_HEIGHT_MM,
            margin_mm: 20.0,
            base_font_pt: 11.0,
            line_height: 1.4,
            name_pt: 24.0,
            contact_pt: 10.0,
        }
    }

    /// Compact single-page letter: 1.5 cm margins, 10.5 pt body.
    pub fn cover_letter() -> Self {
        PageLayout {
            page_width_mm: LETTER_WIDTH_MM,
            page_height_mm: LETTER_HEIGHT_MM,
            margin_mm: 15.0,
            base_font_pt: 10.5,
            line_height: 1.3,
            name_pt: 20.0,
            contact_pt: 9.0,
        }
    }

    fn text_width_mm(&self) -> f32 {
        self.page_width_mm - 2.0 * self.margin_mm
    }
}

/// Converts document HTML into PDF bytes.
pub trait PdfConverter: Send + Sync {
    fn convert(&self, html: &str, layout: &PageLayout) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, Clone, Default)]
pub struct PrintPdfConverter;

impl PdfConverter for PrintPdfConverter {
    fn convert(&self, html: &str, layout: &PageLayout) -> Result<Vec<u8>, RenderError> {
        let blocks = parse_blocks(html)?;
        if blocks.is_empty() {
            return Err(RenderError::Empty);
        }

        let (doc, page, layer) = PdfDocument::new(
            "CareerOS document",
            Mm(layout.page_width_mm),
            Mm(layout.page_height_mm),
            "Layer 1",
        );
        let mut fonts = HashMap::new();
        for face in FontFace::ALL {
            let font = doc
                .add_builtin_font(face.builtin())
                .map_err(|e| RenderError::Pdf(e.to_string()))?;
            fonts.insert(face, font);
        }

        let mut cursor = PageCursor {
            layer: doc.get_page(page).get_layer(layer),
            y: layout.page_height_mm - layout.margin_mm,
            at_top: true,
            layout,
        };

        for block in &blocks {
            let style = BlockStyle::for_kind(block.kind, layout);
            let indent = style.indent_mm;
            let lines = wrap_block(block, &style, layout.text_width_mm() - indent);

            if !cursor.at_top && !block.continuation {
                cursor.y -= style.space_before_mm;
            }
            for (i, line) in lines.iter().enumerate() {
                let line_height = style.size_pt * layout.line_height * PT_TO_MM;
                if cursor.y - line_height < layout.margin_mm {
                    let (page, layer) = doc.add_page(
                        Mm(layout.page_width_mm),
                        Mm(layout.page_height_mm),
                        "Layer 1",
                    );
                    cursor.layer = doc.get_page(page).get_layer(layer);
                    cursor.y = layout.page_height_mm - layout.margin_mm;
                }
                cursor.y -= line_height;
                let marker = (i == 0).then_some(style.marker).flatten();
                cursor.draw_line(line, &style, marker, &fonts);
            }
        }

        doc.save_to_bytes()
            .map_err(|e| RenderError::Pdf(e.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Block styling
// ────────────────────────────────────────────────────────────────────────────

struct BlockStyle {
    size_pt: f32,
    centered: bool,
    indent_mm: f32,
    space_before_mm: f32,
    color: (f32, f32, f32),
    marker: Option<&'static str>,
}

const INK: (f32, f32, f32) = (0.2, 0.2, 0.2);
const ACCENT: (f32, f32, f32) = (0.17, 0.24, 0.31);
const MUTED: (f32, f32, f32) = (0.4, 0.4, 0.4);

impl BlockStyle {
    fn for_kind(kind: BlockKind, layout: &PageLayout) -> Self {
        let base = layout.base_font_pt;
        let plain = BlockStyle {
            size_pt: base,
            centered: false,
            indent_mm: 0.0,
            space_before_mm: base * 0.5 * PT_TO_MM,
            color: INK,
            marker: None,
        };
        match kind {
            BlockKind::Name => BlockStyle {
                size_pt: layout.name_pt,
                centered: true,
                color: ACCENT,
                ..plain
            },
            BlockKind::Contact => BlockStyle {
                size_pt: layout.contact_pt,
                centered: true,
                space_before_mm: 1.0,
                color: MUTED,
                ..plain
            },
            BlockKind::Heading => BlockStyle {
                size_pt: base * 18.0 / 11.0,
                space_before_mm: 6.0,
                color: ACCENT,
                ..plain
            },
            BlockKind::Subheading => BlockStyle {
                size_pt: base * 14.0 / 11.0,
                space_before_mm: 4.0,
                color: ACCENT,
                ..plain
            },
            BlockKind::Meta => BlockStyle {
                size_pt: base * 10.0 / 11.0,
                space_before_mm: 0.5,
                color: MUTED,
                ..plain
            },
            BlockKind::ListItem => BlockStyle {
                indent_mm: LIST_INDENT_MM,
                space_before_mm: 0.8,
                marker: Some("-"),
                ..plain
            },
            BlockKind::Paragraph => plain,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Word wrap
// ────────────────────────────────────────────────────────────────────────────

/// A printed line as runs of uniform face; spaces are part of the run text.
type Line = Vec<(FontFace, String)>;

fn run_width(runs: &[(FontFace, String)], size_pt: f32) -> f32 {
    runs.iter()
        .map(|(face, text)| get_metrics(*face).measure_mm(text, size_pt))
        .sum()
}

/// Splits a block into words, each word a list of face runs (a word may change face mid-way).
fn words_of(block: &Block) -> Vec<Line> {
    let mut words: Vec<Line> = Vec::new();
    let mut current: Line = Vec::new();

    for span in &block.spans {
        let face = FontFace::from_flags(span.bold, span.italic);
        for c in span.text.chars().map(pdf_safe_char) {
            if c.is_whitespace() {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                continue;
            }
            match current.last_mut() {
                Some((last_face, text)) if *last_face == face => text.push(c),
                _ => current.push((face, c.to_string())),
            }
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Splits a word wider than `max_width_mm` into pieces that each fit, at
/// character granularity. Every piece holds at least one character.
fn break_word(word: Line, size_pt: f32, max_width_mm: f32) -> Vec<Line> {
    if run_width(&word, size_pt) <= max_width_mm {
        return vec![word];
    }

    let mut pieces = Vec::new();
    let mut piece: Line = Vec::new();
    let mut width = 0.0_f32;
    let mut buf = [0u8; 4];

    for (face, text) in word {
        let metrics = get_metrics(face);
        for c in text.chars() {
            let char_width = metrics.measure_mm(c.encode_utf8(&mut buf), size_pt);
            if !piece.is_empty() && width + char_width > max_width_mm {
                pieces.push(std::mem::take(&mut piece));
                width = 0.0;
            }
            match piece.last_mut() {
                Some((last_face, last_text)) if *last_face == face => last_text.push(c),
                _ => piece.push((face, c.to_string())),
            }
            width += char_width;
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

fn wrap_block(block: &Block, style: &BlockStyle, max_width_mm: f32) -> Vec<Line> {
    let space_width = get_metrics(FontFace::Regular).space_width * style.size_pt * PT_TO_MM;
    let mut lines = Vec::new();
    let mut line: Line = Vec::new();
    let mut width = 0.0_f32;

    let words = words_of(block)
        .into_iter()
        .flat_map(|word| break_word(word, style.size_pt, max_width_mm));
    for word in words {
        let word_width = run_width(&word, style.size_pt);
        if !line.is_empty() && width + space_width + word_width > max_width_mm {
            lines.push(std::mem::take(&mut line));
            width = 0.0;
        }
        if let Some((_, text)) = line.last_mut() {
            text.push(' ');
            width += space_width;
        }
        for (face, text) in word {
            match line.last_mut() {
                Some((last_face, last_text)) if *last_face == face => last_text.push_str(&text),
                _ => line.push((face, text)),
            }
        }
        width += word_width;
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Maps typographic punctuation onto the WinAnsi range the built-in fonts cover.
fn pdf_safe_char(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201B}' => '\'',
        '\u{201C}' | '\u{201D}' => '"',
        '\u{2010}'..='\u{2015}' | '\u{2022}' | '\u{2212}' => '-',
        '\u{00A0}' | '\u{2002}'..='\u{200A}' => ' ',
        c if (c as u32) < 0x100 => c,
        _ => '?',
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Drawing
// ────────────────────────────────────────────────────────────────────────────

struct PageCursor<'a> {
    layer: PdfLayerReference,
    /// Top of the next line, in mm from the page bottom.
    y: f32,
    at_top: bool,
    layout: &'a PageLayout,
}

impl PageCursor<'_> {
    fn draw_line(
        &mut self,
        line: &Line,
        style: &BlockStyle,
        marker: Option<&str>,
        fonts: &HashMap<FontFace, IndirectFontRef>,
    ) {
        let (r, g, b) = style.color;
        self.layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));

        let baseline = self.y + style.size_pt * PT_TO_MM * (self.layout.line_height - 1.0) * 0.5
            + style.size_pt * PT_TO_MM * 0.2;
        let left = self.layout.margin_mm + style.indent_mm;
        let mut x = if style.centered {
            let free = self.layout.text_width_mm() - run_width(line, style.size_pt);
            left + free.max(0.0) / 2.0
        } else {
            left
        };

        if let (Some(marker), Some(font)) = (marker, fonts.get(&FontFace::Regular)) {
            self.layer.use_text(
                marker,
                style.size_pt,
                Mm(left - LIST_INDENT_MM * 0.6),
                Mm(baseline),
                font,
            );
        }

        for (face, text) in line {
            if let Some(font) = fonts.get(face) {
                self.layer
                    .use_text(text.as_str(), style.size_pt, Mm(x), Mm(baseline), font);
            }
            x += get_metrics(*face).measure_mm(text, style.size_pt);
        }
        self.at_top = false;
    }
}
