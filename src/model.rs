//! Layout-independent document content produced from invoice HTML.
//!
//! Nothing here touches fonts or the PDF backend, so the HTML conversion can be tested
//! on machines without a font family installed.

use crate::richtext::Span;

/// Horizontal placement of text within its column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HorizontalAlignment {
    #[default]
    Left,
    Center,
    Right,
}

impl HorizontalAlignment {
    /// Parses an HTML `align` attribute or CSS `text-align` value. `justify` falls back
    /// to left alignment.
    pub fn from_keyword(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "start" | "justify" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" | "end" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Styled runs of text laid out as one paragraph or table cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RichText {
    pub spans: Vec<Span>,
    pub alignment: HorizontalAlignment,
}

impl RichText {
    pub fn new(spans: Vec<Span>, alignment: HorizontalAlignment) -> Self {
        Self { spans, alignment }
    }

    pub fn is_blank(&self) -> bool {
        self.spans.iter().all(|span| span.text.trim().is_empty())
    }

    /// The text without styling.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }
}

/// One unit of document flow.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    /// `h1`..`h6`; `level` is 1-based.
    Heading { level: u8, text: RichText },
    Text(RichText),
    /// Rows of cells. Rows may have different lengths.
    Table(Vec<Vec<RichText>>),
    /// Vertical gap, from `<hr>`.
    Gap,
}

/// Width in cells of the longest row.
pub fn column_count(rows: &[Vec<RichText>]) -> usize {
    rows.iter().map(Vec::len).max().unwrap_or(0)
}
