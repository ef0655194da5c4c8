//! `genpdf` page setup for invoices: paper, margins and the numbered footer.

use genpdf::elements::Paragraph;
use genpdf::error::{Error, ErrorKind};
use genpdf::render::Area;
use genpdf::style::Style;
use genpdf::{Alignment, Context, Element, Margins, Mm, PageDecorator, PaperSize, Position, Size};

use crate::fonts;
use crate::metadata;

/// Footer printed at the bottom of every page.
///
/// `template` is expanded with [`metadata::expand_footer`], so it may reference both the
/// current page and the total page count.
#[derive(Clone, Debug)]
pub struct PageFooter {
    template: String,
    page_count: usize,
    height: Mm,
    font_size: u8,
}

impl PageFooter {
    pub fn new(template: impl Into<String>, page_count: usize) -> Self {
        Self {
            template: template.into(),
            page_count,
            height: Mm::from(10),
            font_size: 8,
        }
    }

    pub fn with_height(mut self, height: impl Into<Mm>) -> Self {
        self.height = height.into();
        self
    }

    pub fn with_font_size(mut self, font_size: u8) -> Self {
        self.font_size = font_size;
        self
    }

    /// Footer text for the 1-indexed `page`.
    pub fn text(&self, page: usize) -> String {
        metadata::expand_footer(&self.template, page, self.page_count)
    }
}

/// Paper, margins, base font size and footer shared by every page of an invoice.
#[derive(Clone, Debug)]
pub struct PageSetup {
    paper: Size,
    margins: Margins,
    font_size: u8,
    footer: Option<PageFooter>,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            paper: PaperSize::A4.into(),
            margins: Margins::trbl(15, 15, 15, 15),
            font_size: 10,
            footer: None,
        }
    }
}

impl PageSetup {
    pub fn with_paper(mut self, paper: impl Into<Size>) -> Self {
        self.paper = paper.into();
        self
    }

    pub fn with_margins(mut self, margins: impl Into<Margins>) -> Self {
        self.margins = margins.into();
        self
    }

    pub fn with_font_size(mut self, font_size: u8) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn with_footer(mut self, footer: PageFooter) -> Self {
        self.footer = Some(footer);
        self
    }

    /// Creates an empty document titled `title` using the default font family.
    pub fn document(&self, title: &str) -> Result<genpdf::Document, Error> {
        let mut document = genpdf::Document::new(fonts::default_font_family()?);
        document.set_title(title);
        document.set_paper_size(self.paper);
        document.set_font_size(self.font_size);
        document.set_page_decorator(InvoicePageDecorator {
            pages: 0,
            margins: self.margins,
            footer: self.footer.clone(),
        });
        Ok(document)
    }
}

struct InvoicePageDecorator {
    pages: usize,
    margins: Margins,
    footer: Option<PageFooter>,
}

impl PageDecorator for InvoicePageDecorator {
    fn decorate_page<'a>(
        &mut self,
        context: &Context,
        mut area: Area<'a>,
        style: Style,
    ) -> Result<Area<'a>, Error> {
        self.pages += 1;
        area.add_margins(self.margins);

        let Some(footer) = &self.footer else {
            return Ok(area);
        };

        let height = area.size().height;
        if height < footer.height {
            return Err(Error::new(
                "page is too small for the footer",
                ErrorKind::InvalidData,
            ));
        }
        let body_height = height - footer.height;

        let mut footer_area = area.clone();
        footer_area.add_offset(Position::new(0, body_height));
        let mut text = Paragraph::new(footer.text(self.pages))
            .aligned(Alignment::Center)
            .styled(Style::new().with_font_size(footer.font_size));
        if text.render(context, footer_area, style)?.has_more {
            return Err(Error::new(
                format!("footer for page {} overflows its reserved height", self.pages),
                ErrorKind::PageSizeExceeded,
            ));
        }

        area.set_height(body_height);
        Ok(area)
    }
}
