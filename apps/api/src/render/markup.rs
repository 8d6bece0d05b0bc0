//! Reduces the document HTML to a flat list of styled text blocks.
//!
//! Only the markup this crate generates is understood: the header classes,
//! headings, paragraphs, lists and inline emphasis. Input must be well-formed
//! XHTML; anything quick-xml rejects, or an element left open, is an error.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::render::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Name,
    Contact,
    Heading,
    Subheading,
    Meta,
    Paragraph,
    ListItem,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub spans: Vec<Span>,
    /// Set when the block continues the previous one after a `<br/>`.
    pub continuation: bool,
}

impl Block {
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

struct Element {
    name: Vec<u8>,
    kind: Option<BlockKind>,
    bold: bool,
    italic: bool,
    hidden: bool,
}

#[derive(Default)]
struct Collector {
    stack: Vec<Element>,
    spans: Vec<Span>,
    blocks: Vec<Block>,
    after_break: bool,
}

impl Collector {
    fn kind(&self) -> BlockKind {
        self.stack
            .iter()
            .rev()
            .find_map(|e| e.kind)
            .unwrap_or(BlockKind::Paragraph)
    }

    fn push_text(&mut self, raw: &str) {
        if self.stack.iter().any(|e| e.hidden) {
            return;
        }
        let text = collapse_whitespace(raw);
        if text.is_empty() {
            return;
        }
        let bold = self.stack.iter().any(|e| e.bold);
        let italic = self.stack.iter().any(|e| e.italic);

        match self.spans.last_mut() {
            Some(last) if last.bold == bold && last.italic == italic => last.text.push_str(&text),
            _ => self.spans.push(Span { text, bold, italic }),
        }
    }

    fn flush(&mut self, continuation_follows: bool) {
        let mut spans = std::mem::take(&mut self.spans);
        if let Some(first) = spans.first_mut() {
            first.text = first.text.trim_start().to_string();
        }
        if let Some(last) = spans.last_mut() {
            last.text = last.text.trim_end().to_string();
        }
        spans.retain(|s| !s.text.is_empty());

        if !spans.is_empty() {
            self.blocks.push(Block {
                kind: self.kind(),
                spans,
                continuation: self.after_break,
            });
            self.after_break = continuation_follows;
        } else if !continuation_follows {
            self.after_break = false;
        }
    }

    fn open(&mut self, start: &BytesStart) -> Result<(), RenderError> {
        let name = start.name().as_ref().to_ascii_lowercase();
        let class = class_of(start)?;
        let element = element_for(name, class.as_deref());
        if is_block(&element.name) {
            self.flush(false);
        }
        self.stack.push(element);
        Ok(())
    }

    fn close(&mut self, name: &[u8]) -> Result<(), RenderError> {
        let name = name.to_ascii_lowercase();
        if is_block(&name) {
            self.flush(false);
        }
        match self.stack.pop() {
            Some(open) if open.name == name => Ok(()),
            _ => Err(RenderError::Markup(format!(
                "unexpected closing tag </{}>",
                String::from_utf8_lossy(&name)
            ))),
        }
    }

    fn empty(&mut self, start: &BytesStart) {
        match start.name().as_ref().to_ascii_lowercase().as_slice() {
            b"br" => self.flush(true),
            b"hr" => self.flush(false),
            _ => {}
        }
    }
}

/// Parses generated HTML into blocks. Empty output is not an error here.
pub fn parse_blocks(html: &str) -> Result<Vec<Block>, RenderError> {
    let mut reader = Reader::from_str(html);
    let mut collector = Collector::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| RenderError::Markup(e.to_string()))?;
        match event {
            Event::Start(start) => collector.open(&start)?,
            Event::End(end) => collector.close(end.name().as_ref())?,
            Event::Empty(start) => collector.empty(&start),
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| RenderError::Markup(e.to_string()))?;
                collector.push_text(&text);
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                collector.push_text(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = collector.stack.last() {
        return Err(RenderError::Markup(format!(
            "element <{}> is never closed",
            String::from_utf8_lossy(&open.name)
        )));
    }
    collector.flush(false);
    Ok(collector.blocks)
}

fn class_of(start: &BytesStart) -> Result<Option<String>, RenderError> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| RenderError::Markup(e.to_string()))?;
        if attr.key.as_ref() == b"class" {
            return Ok(Some(String::from_utf8_lossy(&attr.value).into_owned()));
        }
    }
    Ok(None)
}

fn element_for(name: Vec<u8>, class: Option<&str>) -> Element {
    let has_class = |wanted: &str| class.is_some_and(|c| c.split_whitespace().any(|c| c == wanted));

    let (kind, bold, italic) = match name.as_slice() {
        b"h1" => (Some(BlockKind::Heading), true, false),
        b"h2" | b"h3" | b"h4" => (Some(BlockKind::Subheading), true, false),
        b"li" => (Some(BlockKind::ListItem), false, false),
        b"p" | b"blockquote" | b"pre" => (Some(BlockKind::Paragraph), false, false),
        b"strong" | b"b" => (None, true, false),
        b"em" | b"i" => (None, false, true),
        b"div" if has_class("name") => (Some(BlockKind::Name), true, false),
        b"div" if has_class("contact-info") => (Some(BlockKind::Contact), false, false),
        b"div" if has_class("job-meta") => (Some(BlockKind::Meta), false, true),
        b"div" if has_class("school") => (Some(BlockKind::Paragraph), true, false),
        _ => (None, false, false),
    };
    let hidden = matches!(name.as_slice(), b"head" | b"style" | b"title" | b"script");

    Element {
        name,
        kind,
        bold,
        italic,
        hidden,
    }
}

fn is_block(name: &[u8]) -> bool {
    matches!(
        name,
        b"html"
            | b"body"
            | b"div"
            | b"section"
            | b"p"
            | b"h1"
            | b"h2"
            | b"h3"
            | b"h4"
            | b"ul"
            | b"ol"
            | b"li"
            | b"blockquote"
            | b"pre"
    )
}

/// HTML whitespace rules: any run collapses to one space; edges are kept for joining.
fn collapse_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_space = false;
    for c in raw.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_paragraphs_and_lists() {
        let html = "<html><head><style>h1 { color: red; }</style></head><body>\
            <h1>Professional Summary</h1><p>Builds   things\n well.</p>\
            <ul><li>Led Zephyr</li><li>Cut costs</li></ul></body></html>";
        let blocks = parse_blocks(html).unwrap();

        let kinds: Vec<BlockKind> = blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::Heading,
                BlockKind::Paragraph,
                BlockKind::ListItem,
                BlockKind::ListItem
            ]
        );
        assert_eq!(blocks[1].text(), "Builds things well.");
        assert!(blocks.iter().all(|b| !b.text().contains("color")));
    }

    #[test]
    fn test_inline_emphasis_becomes_spans() {
        let blocks = parse_blocks("<p>Worked on <strong>Zephyr</strong>, <em>fast</em>.</p>").unwrap();
        let spans = &blocks[0].spans;
        assert_eq!(spans.len(), 5);
        assert_eq!(spans[1].text, "Zephyr");
        assert!(spans[1].bold);
        assert!(spans[3].italic);
    }

    #[test]
    fn test_header_classes_and_breaks() {
        let html = "<div class=\"header\"><div class=\"name\">Ada Lovelace</div>\
            <div class=\"contact-info\">ada@example.com | 555-0100</div></div>\
            <div><strong>Hiring Team</strong><br/>Acme</div>";
        let blocks = parse_blocks(html).unwrap();
        assert_eq!(blocks[0].kind, BlockKind::Name);
        assert!(blocks[0].spans[0].bold);
        assert_eq!(blocks[1].kind, BlockKind::Contact);
        assert_eq!(blocks[2].text(), "Hiring Team");
        assert!(!blocks[2].continuation);
        assert_eq!(blocks[3].text(), "Acme");
        assert!(blocks[3].continuation);
    }

    #[test]
    fn test_entities_are_unescaped() {
        let blocks = parse_blocks("<p>R&amp;D &lt;team&gt;</p>").unwrap();
        assert_eq!(blocks[0].text(), "R&D <team>");
    }

    #[test]
    fn test_malformed_markup_is_an_error() {
        assert!(parse_blocks("<div><p>unclosed</div>").is_err());
        assert!(parse_blocks("<div>never closed").is_err());
    }
}
