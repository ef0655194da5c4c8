//! Conversion of invoice HTML into layout [`Block`]s.
//!
//! The converter is lenient: it never fails, unknown tags are ignored, and
//! unbalanced markup is closed implicitly. Supported constructs:
//!
//! - `h1`–`h6` headings, `p`/`div`/`li`/`address` paragraphs, `br` line breaks, `hr` gaps
//! - `table`/`tr`/`td`/`th` tables (header cells are bold)
//! - `b`/`strong`, `i`/`em`, and `color` from `<font color>` or an inline `style`
//! - `align` attributes and inline `text-align`
//!
//! Content of `head`, `style`, `script` and `title` is dropped.

use log::debug;
use quick_xml::escape::unescape_with;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::model::{Block, HorizontalAlignment, RichText};
use crate::richtext::{parse_hex_color, InlineStyle, Span};

const SKIPPED_TAGS: &[&str] = &["head", "style", "script", "title", "template"];

const PARAGRAPH_TAGS: &[&str] = &[
    "p", "div", "li", "address", "section", "article", "header", "footer", "main", "ul", "ol",
    "blockquote", "center", "body", "html",
];

/// Converts an HTML document into layout blocks.
pub fn html_to_blocks(html: &str) -> Vec<Block> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;

    let mut converter = Converter::default();
    loop {
        let token = match reader.read_event() {
            Ok(Event::Start(tag)) => open_token(&tag, false),
            Ok(Event::Empty(tag)) => open_token(&tag, true),
            Ok(Event::End(tag)) => Token::Close(tag_name(tag.name().as_ref())),
            Ok(Event::Text(text)) => Token::Text(String::from_utf8_lossy(&text).into_owned()),
            Ok(Event::CData(text)) => Token::Text(String::from_utf8_lossy(&text).into_owned()),
            Ok(Event::GeneralRef(reference)) => {
                Token::Text(expand_reference(&String::from_utf8_lossy(&reference)))
            }
            Ok(Event::Eof) => break,
            Ok(_) => continue,
            Err(err) => {
                // Keep what was converted so far.
                debug!(
                    "Stopped reading invoice HTML at byte {}: {}",
                    reader.error_position(),
                    err
                );
                break;
            }
        };
        converter.feed(token);
    }
    converter.finish()
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Text(String),
    Open { name: String, attributes: Vec<(String, String)>, self_closing: bool },
    Close(String),
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn open_token(tag: &BytesStart<'_>, self_closing: bool) -> Token {
    let mut attributes = tag.html_attributes();
    attributes.with_checks(false);
    let attributes = attributes
        .flatten()
        .map(|attribute| {
            let raw = String::from_utf8_lossy(&attribute.value);
            let value = match unescape_with(&raw, html_entity) {
                Ok(value) => value.into_owned(),
                Err(_) => raw.into_owned(),
            };
            (tag_name(attribute.key.as_ref()), value)
        })
        .collect();
    Token::Open {
        name: tag_name(tag.name().as_ref()),
        attributes,
        self_closing,
    }
}

/// Expands `&name;` or a numeric reference. Unknown names are kept literally.
fn expand_reference(name: &str) -> String {
    let raw = format!("&{name};");
    match unescape_with(&raw, html_entity) {
        Ok(text) => text.into_owned(),
        Err(_) => raw,
    }
}

fn html_entity(name: &str) -> Option<&'static str> {
    match name {
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "quot" => Some("\""),
        "apos" => Some("'"),
        "nbsp" => Some("\u{a0}"),
        "ndash" => Some("\u{2013}"),
        "euro" => Some("\u{20ac}"),
        "copy" => Some("\u{a9}"),
        _ => None,
    }
}

fn attribute<'a>(attributes: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

fn css_property<'a>(attributes: &'a [(String, String)], property: &str) -> Option<&'a str> {
    attribute(attributes, "style")?
        .split(';')
        .filter_map(|declaration| declaration.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(property))
        .map(|(_, value)| value.trim())
}

fn alignment_of(attributes: &[(String, String)]) -> Option<HorizontalAlignment> {
    attribute(attributes, "align")
        .or_else(|| css_property(attributes, "text-align"))
        .and_then(HorizontalAlignment::from_keyword)
}

#[derive(Default)]
struct TableState {
    rows: Vec<Vec<RichText>>,
    row: Option<Vec<RichText>>,
}

#[derive(Default)]
struct Converter {
    blocks: Vec<Block>,
    spans: Vec<Span>,
    alignment: HorizontalAlignment,
    heading: Option<u8>,
    styles: Vec<(String, InlineStyle)>,
    skip_depth: usize,
    list_depth: usize,
    trailing_space: bool,
    table: Option<TableState>,
    cell: Option<HorizontalAlignment>,
}

impl Converter {
    fn style(&self) -> InlineStyle {
        self.styles
            .last()
            .map(|(_, state)| *state)
            .unwrap_or_default()
    }

    fn feed(&mut self, token: Token) {
        match token {
            Token::Text(text) => {
                if self.skip_depth == 0 {
                    self.push_text(&text);
                }
            }
            Token::Open {
                name,
                attributes,
                self_closing,
            } => {
                if SKIPPED_TAGS.contains(&name.as_str()) {
                    if !self_closing {
                        self.skip_depth += 1;
                    }
                } else if self.skip_depth == 0 {
                    self.open(&name, &attributes, self_closing);
                }
            }
            Token::Close(name) => {
                if SKIPPED_TAGS.contains(&name.as_str()) {
                    self.skip_depth = self.skip_depth.saturating_sub(1);
                } else if self.skip_depth == 0 {
                    self.close(&name);
                }
            }
        }
    }

    fn open(&mut self, name: &str, attributes: &[(String, String)], self_closing: bool) {
        match name {
            "br" => self.line_break(),
            "hr" => {
                self.flush_paragraph();
                if self.table.is_none() {
                    self.blocks.push(Block::Gap);
                }
            }
            "table" => {
                self.flush_paragraph();
                self.finish_table();
                self.table = Some(TableState::default());
            }
            "tr" => {
                self.finish_row();
                if let Some(table) = self.table.as_mut() {
                    table.row = Some(Vec::new());
                }
            }
            "td" | "th" => {
                self.finish_cell();
                if self.table.is_some() {
                    let default = if name == "th" {
                        HorizontalAlignment::Center
                    } else {
                        HorizontalAlignment::Left
                    };
                    self.cell = Some(alignment_of(attributes).unwrap_or(default));
                }
                if name == "th" && !self_closing {
                    self.push_style(name, |state| state.bold = true);
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush_paragraph();
                self.heading = name[1..].parse().ok();
                self.alignment = alignment_of(attributes).unwrap_or_default();
            }
            "b" | "strong" if !self_closing => self.push_style(name, |state| state.bold = true),
            "i" | "em" if !self_closing => self.push_style(name, |state| state.italic = true),
            "span" | "font" if !self_closing => {
                let color = attribute(attributes, "color")
                    .or_else(|| css_property(attributes, "color"))
                    .and_then(parse_hex_color);
                let bold = css_property(attributes, "font-weight")
                    .is_some_and(|weight| weight == "bold" || weight == "700");
                self.push_style(name, |state| {
                    if color.is_some() {
                        state.color = color;
                    }
                    state.bold |= bold;
                });
            }
            _ if PARAGRAPH_TAGS.contains(&name) => {
                self.flush_paragraph();
                if matches!(name, "ul" | "ol") && !self_closing {
                    self.list_depth += 1;
                }
                if self.cell.is_none() {
                    if let Some(alignment) = alignment_of(attributes) {
                        self.alignment = alignment;
                    } else if name == "center" {
                        self.alignment = HorizontalAlignment::Center;
                    }
                }
                if name == "li" && self.list_depth > 0 {
                    self.push_text("\u{2022} ");
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &str) {
        match name {
            "table" => {
                self.finish_table();
            }
            "tr" => self.finish_row(),
            "td" | "th" => {
                self.pop_style(name);
                self.finish_cell();
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush_paragraph();
                self.heading = None;
                self.alignment = HorizontalAlignment::Left;
            }
            "b" | "strong" | "i" | "em" | "span" | "font" => self.pop_style(name),
            _ if PARAGRAPH_TAGS.contains(&name) => {
                self.flush_paragraph();
                if matches!(name, "ul" | "ol") {
                    self.list_depth = self.list_depth.saturating_sub(1);
                }
                if self.cell.is_none() {
                    self.alignment = HorizontalAlignment::Left;
                }
            }
            _ => {}
        }
    }

    fn push_style(&mut self, tag: &str, apply: impl FnOnce(&mut InlineStyle)) {
        let mut state = self.style();
        apply(&mut state);
        self.styles.push((tag.to_owned(), state));
    }

    fn pop_style(&mut self, tag: &str) {
        if let Some(position) = self.styles.iter().rposition(|(name, _)| name == tag) {
            self.styles.truncate(position);
        }
    }

    fn push_text(&mut self, text: &str) {
        let state = self.style();
        let mut collapsed = String::with_capacity(text.len());
        for ch in text.chars() {
            if ch.is_whitespace() && ch != '\u{a0}' {
                let at_start = self.spans.is_empty() && collapsed.is_empty();
                if !at_start && !self.trailing_space {
                    collapsed.push(' ');
                    self.trailing_space = true;
                }
                continue;
            }
            self.trailing_space = false;
            collapsed.push(if ch == '\u{a0}' { ' ' } else { ch });
        }
        if collapsed.is_empty() {
            return;
        }

        match self.spans.last_mut() {
            Some(last) if last.style == state => last.text.push_str(&collapsed),
            _ => self.spans.push(Span::new(collapsed, state)),
        }
    }

    fn line_break(&mut self) {
        if self.cell.is_some() {
            self.push_text(" ");
        } else {
            self.flush_paragraph();
        }
    }

    fn take_text(&mut self, alignment: HorizontalAlignment) -> Option<RichText> {
        self.trailing_space = false;
        let mut spans = std::mem::take(&mut self.spans);
        if let Some(last) = spans.last_mut() {
            let kept = last.text.trim_end().len();
            last.text.truncate(kept);
        }
        spans.retain(|span| !span.text.is_empty());
        let text = RichText::new(spans, alignment);
        (!text.is_blank()).then_some(text)
    }

    fn flush_paragraph(&mut self) {
        // Inside a cell the text belongs to the cell, not to a standalone paragraph.
        if self.cell.is_some() {
            return;
        }
        if self.table.is_some() && self.spans.is_empty() {
            return;
        }
        let Some(text) = self.take_text(self.alignment) else {
            return;
        };
        match self.heading {
            Some(level) => self.blocks.push(Block::Heading { level, text }),
            None => self.blocks.push(Block::Text(text)),
        }
    }

    fn finish_cell(&mut self) {
        let Some(alignment) = self.cell.take() else {
            return;
        };
        let text = self
            .take_text(alignment)
            .unwrap_or_else(|| RichText::new(Vec::new(), alignment));
        if let Some(table) = self.table.as_mut() {
            table.row.get_or_insert_with(Vec::new).push(text);
        }
    }

    fn finish_row(&mut self) {
        self.finish_cell();
        if let Some(table) = self.table.as_mut() {
            if let Some(row) = table.row.take() {
                if !row.is_empty() {
                    table.rows.push(row);
                }
            }
        }
    }

    fn finish_table(&mut self) {
        self.finish_row();
        if let Some(table) = self.table.take() {
            if !table.rows.is_empty() {
                self.blocks.push(Block::Table(table.rows));
            }
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.finish_table();
        self.flush_paragraph();
        self.blocks
    }
}
