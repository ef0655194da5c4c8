//! The HTML → PDF rendering capability.
//!
//! [`PdfRenderer`] is the seam the writer depends on. [`GenpdfRenderer`] is the bundled
//! implementation: it lays out the HTML with `genpdf` and then uses `lopdf` to write the
//! document information and embed the attachments.

use std::fs;
use std::io;

use genpdf::elements::{Break, FrameCellDecorator, Paragraph, TableLayout};
use genpdf::style::Style;
use genpdf::{Alignment, Element, Margins, PaperSize};
use log::debug;
use thiserror::Error;

use crate::embed::{self, EmbedError, EmbeddedFile};
use crate::markup;
use crate::metadata::DocumentMetadata;
use crate::model::{self, Block, HorizontalAlignment, RichText};
use crate::page::{PageFooter, PageSetup};
use crate::staging::AttachmentDescriptor;

const BODY_FONT_SIZE: u8 = 10;
const FOOTER_FONT_SIZE: u8 = 8;
const FOOTER_HEIGHT_MM: i32 = 10;
const PAGE_MARGIN_MM: i32 = 15;

/// Failure inside the rendering capability.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No usable font family was found.
    #[error("failed to load fonts")]
    FontLoad(#[source] genpdf::error::Error),
    /// `genpdf` could not lay out or write the document.
    #[error("failed to lay out document")]
    Layout(#[source] genpdf::error::Error),
    /// A staged attachment could not be read back.
    #[error("failed to read attachment {name}")]
    AttachmentRead { name: String, source: io::Error },
    /// The rendered PDF could not be post-processed.
    #[error(transparent)]
    Embed(#[from] EmbedError),
}

/// Turns rendered invoice HTML into PDF bytes.
pub trait PdfRenderer {
    /// Renders `html` with the given metadata and embeds `attachments`.
    fn render(
        &self,
        html: &str,
        metadata: &DocumentMetadata,
        attachments: &[AttachmentDescriptor],
    ) -> Result<Vec<u8>, RenderError>;
}

/// Renderer built on `genpdf` layout and `lopdf` post-processing.
///
/// The footer needs the page count, which is only known after layout, so the document is
/// laid out once to count pages and a second time with the count filled in.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenpdfRenderer;

impl GenpdfRenderer {
    fn layout(
        &self,
        blocks: &[Block],
        metadata: &DocumentMetadata,
        page_count: usize,
    ) -> Result<Vec<u8>, RenderError> {
        let footer = PageFooter::new(metadata.footer_template.clone(), page_count)
            .with_height(FOOTER_HEIGHT_MM)
            .with_font_size(FOOTER_FONT_SIZE);
        let mut document = PageSetup::default()
            .with_paper(PaperSize::A4)
            .with_margins(Margins::trbl(
                PAGE_MARGIN_MM,
                PAGE_MARGIN_MM,
                PAGE_MARGIN_MM,
                PAGE_MARGIN_MM,
            ))
            .with_font_size(BODY_FONT_SIZE)
            .with_footer(footer)
            .document(&metadata.title)
            .map_err(RenderError::FontLoad)?;

        for block in blocks {
            push_block(&mut document, block)?;
        }

        let mut buffer = Vec::new();
        document.render(&mut buffer).map_err(RenderError::Layout)?;
        Ok(buffer)
    }
}

impl PdfRenderer for GenpdfRenderer {
    fn render(
        &self,
        html: &str,
        metadata: &DocumentMetadata,
        attachments: &[AttachmentDescriptor],
    ) -> Result<Vec<u8>, RenderError> {
        let blocks = markup::html_to_blocks(html);
        debug!("Converted HTML into {} layout blocks", blocks.len());

        let draft = self.layout(&blocks, metadata, 0)?;
        let page_count = embed::page_count(&draft)?;
        let laid_out = self.layout(&blocks, metadata, page_count)?;

        let contents = attachments
            .iter()
            .map(|attachment| {
                fs::read(attachment.staged_path()).map_err(|source| RenderError::AttachmentRead {
                    name: attachment.name().to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let files: Vec<EmbeddedFile<'_>> = attachments
            .iter()
            .zip(&contents)
            .map(|(descriptor, content)| EmbeddedFile {
                descriptor,
                content: content.as_slice(),
            })
            .collect();

        let bytes = embed::finalize_pdf(&laid_out, metadata, &files)?;
        debug!(
            "Rendered {} page(s) with {} attachment(s), {} bytes",
            page_count,
            files.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

fn alignment(alignment: HorizontalAlignment) -> Alignment {
    match alignment {
        HorizontalAlignment::Left => Alignment::Left,
        HorizontalAlignment::Center => Alignment::Center,
        HorizontalAlignment::Right => Alignment::Right,
    }
}

fn paragraph(text: &RichText) -> Paragraph {
    let mut paragraph = Paragraph::default();
    for span in &text.spans {
        paragraph.push(span.styled_string());
    }
    paragraph.aligned(alignment(text.alignment))
}

fn heading_size(level: u8) -> u8 {
    match level {
        1 => 16,
        2 => 13,
        _ => 11,
    }
}

fn push_block(document: &mut genpdf::Document, block: &Block) -> Result<(), RenderError> {
    match block {
        Block::Heading { level, text } => {
            let style = Style::new().bold().with_font_size(heading_size(*level));
            document.push(paragraph(text).styled(style));
            document.push(Break::new(0.5));
        }
        Block::Text(text) => document.push(paragraph(text)),
        Block::Table(rows) => {
            let columns = model::column_count(rows);
            let mut table = TableLayout::new(vec![1; columns]);
            table.set_cell_decorator(FrameCellDecorator::new(true, true, false));
            for row in rows {
                let mut layout_row = table.row();
                for column in 0..columns {
                    let cell = row.get(column).cloned().unwrap_or_default();
                    layout_row.push_element(paragraph(&cell).padded(Margins::trbl(1, 1, 1, 1)));
                }
                layout_row.push().map_err(RenderError::Layout)?;
            }
            document.push(table);
            document.push(Break::new(1));
        }
        Block::Gap => document.push(Break::new(1)),
    }
    Ok(())
}
