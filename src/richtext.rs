//! Inline text styling carried from the invoice HTML into the PDF.
//!
//! Only what the layout engine can reproduce survives the conversion: bold, italic and
//! a solid text colour.

use genpdf::style::{Color, Style, StyledString};

/// Inline style in effect for a run of text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InlineStyle {
    pub bold: bool,
    pub italic: bool,
    pub color: Option<Color>,
}

impl InlineStyle {
    pub fn bold(self) -> Self {
        Self { bold: true, ..self }
    }

    pub fn italic(self) -> Self {
        Self {
            italic: true,
            ..self
        }
    }

    pub fn with_color(self, color: Color) -> Self {
        Self {
            color: Some(color),
            ..self
        }
    }

    /// The equivalent `genpdf` style.
    pub fn to_style(self) -> Style {
        let mut style = Style::new();
        if self.bold {
            style.set_bold();
        }
        if self.italic {
            style.set_italic();
        }
        if let Some(color) = self.color {
            style.set_color(color);
        }
        style
    }
}

/// A run of text sharing one [`InlineStyle`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: InlineStyle,
}

impl Span {
    pub fn new(text: impl Into<String>, style: InlineStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// Unstyled text.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, InlineStyle::default())
    }

    pub fn styled_string(&self) -> StyledString {
        StyledString::new(self.text.clone(), self.style.to_style())
    }
}

/// Parses a CSS hex colour, either `#rrggbb` or the short `#rgb` form.
pub fn parse_hex_color(value: &str) -> Option<Color> {
    let digits = value.trim().strip_prefix('#')?;
    if !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }

    let nibbles: Vec<u8> = digits
        .chars()
        .filter_map(|ch| ch.to_digit(16))
        .map(|nibble| nibble as u8)
        .collect();
    match nibbles.as_slice() {
        [r, g, b] => Some(Color::Rgb(r * 17, g * 17, b * 17)),
        [r1, r2, g1, g2, b1, b2] => Some(Color::Rgb(
            r1 * 16 + r2,
            g1 * 16 + g2,
            b1 * 16 + b2,
        )),
        _ => None,
    }
}
