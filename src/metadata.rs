//! Document metadata written into the PDF information dictionary.

use crate::invoice::Invoice;

/// Footer used when no template is configured. `{PAGENO}` and `{nbpg}` are replaced by the
/// current page number and the page count.
pub const DEFAULT_FOOTER_TEMPLATE: &str = "Pagina {PAGENO} din {nbpg}";

/// Placeholder replaced by the current page number in footer templates.
pub const PAGE_NUMBER_PLACEHOLDER: &str = "{PAGENO}";

/// Placeholder replaced by the total page count in footer templates.
pub const PAGE_COUNT_PLACEHOLDER: &str = "{nbpg}";

/// Subject assigned to every invoice document.
pub const INVOICE_SUBJECT: &str = "Factura electronica";

/// Title, authorship, and attachment switches for one rendered document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: String,
    pub author: String,
    pub creator: String,
    pub subject: String,
    pub keywords: String,
    /// Embed the source UBL XML as `original-ubl.xml`.
    pub include_original_xml: bool,
    /// Embed the detached signature as `signature.xml` when one is supplied.
    pub include_signature: bool,
    pub footer_template: String,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            creator: String::new(),
            subject: String::new(),
            keywords: String::new(),
            include_original_xml: true,
            include_signature: true,
            footer_template: DEFAULT_FOOTER_TEMPLATE.to_owned(),
        }
    }
}

impl DocumentMetadata {
    /// Creates empty metadata with both attachments enabled and the default footer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the metadata for an invoice document.
    ///
    /// The supplier display name becomes both author and creator; a supplier without a
    /// name yields empty values rather than an error.
    pub fn from_invoice(invoice: &Invoice) -> Self {
        let supplier = invoice.supplier.display_name();
        Self {
            title: format!("Fact. {}", invoice.id),
            author: supplier.clone(),
            creator: supplier,
            subject: INVOICE_SUBJECT.to_owned(),
            keywords: format!("{}, {}", INVOICE_SUBJECT, invoice.id),
            ..Self::default()
        }
    }

    /// Enables or disables embedding of the original XML and returns the updated metadata.
    pub fn with_include_original_xml(mut self, include: bool) -> Self {
        self.include_original_xml = include;
        self
    }

    /// Enables or disables embedding of the signature and returns the updated metadata.
    pub fn with_include_signature(mut self, include: bool) -> Self {
        self.include_signature = include;
        self
    }

    /// Replaces the footer template and returns the updated metadata.
    pub fn with_footer_template(mut self, template: impl Into<String>) -> Self {
        self.footer_template = template.into();
        self
    }

    /// Expands the footer template for the given 1-indexed page.
    pub fn footer_text(&self, page: usize, page_count: usize) -> String {
        expand_footer(&self.footer_template, page, page_count)
    }
}

/// Substitutes the page number and page count placeholders in `template`.
pub fn expand_footer(template: &str, page: usize, page_count: usize) -> String {
    template
        .replace(PAGE_NUMBER_PLACEHOLDER, &page.to_string())
        .replace(PAGE_COUNT_PLACEHOLDER, &page_count.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::Party;

    #[test]
    fn derives_fields_from_invoice() {
        let invoice = Invoice::new("INV-001").with_supplier(Party::new("Acme"));
        let metadata = DocumentMetadata::from_invoice(&invoice);

        assert_eq!(metadata.title, "Fact. INV-001");
        assert_eq!(metadata.author, "Acme");
        assert_eq!(metadata.creator, "Acme");
        assert_eq!(metadata.subject, "Factura electronica");
        assert_eq!(metadata.keywords, "Factura electronica, INV-001");
        assert!(metadata.include_original_xml);
        assert!(metadata.include_signature);
        assert_eq!(metadata.footer_template, DEFAULT_FOOTER_TEMPLATE);
    }

    #[test]
    fn nameless_supplier_gives_empty_author() {
        let metadata = DocumentMetadata::from_invoice(&Invoice::new("X"));
        assert_eq!(metadata.author, "");
        assert_eq!(metadata.creator, "");
        assert_eq!(metadata.title, "Fact. X");
    }

    #[test]
    fn footer_expands_placeholders() {
        let metadata = DocumentMetadata::new();
        assert_eq!(metadata.footer_text(2, 5), "Pagina 2 din 5");

        let custom = metadata.with_footer_template("{PAGENO}/{nbpg}");
        assert_eq!(custom.footer_text(1, 1), "1/1");
    }
}
