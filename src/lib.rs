//! Turns UBL electronic invoices into PDF documents.
//!
//! The PDF carries document metadata derived from the invoice, a paginated footer, and
//! (optionally) the original UBL XML and its detached signature as embedded files.
//!
//! ```no_run
//! use ubl_pdf::{html, DocumentMetadata, Invoice, PdfWriter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let xml = std::fs::read_to_string("invoice.xml")?;
//! let invoice = Invoice::from_ubl(&xml)?;
//! let writer = PdfWriter::new(DocumentMetadata::from_invoice(&invoice))
//!     .with_output_path("invoice.pdf")
//!     .with_original_xml(xml);
//! let outcome = writer.write_content(&html::render_invoice(&invoice), &invoice)?;
//! for warning in &outcome.warnings {
//!     eprintln!("{warning}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod embed;
pub mod fonts;
pub mod html;
pub mod invoice;
pub mod markup;
pub mod metadata;
pub mod model;
pub mod page;
pub mod paths;
pub mod render;
pub mod richtext;
pub mod staging;
pub mod writer;

pub use invoice::{Invoice, InvoiceError, InvoiceLine, Party};
pub use metadata::DocumentMetadata;
pub use paths::{OutputDirResolver, PathResolver};
pub use render::{GenpdfRenderer, PdfRenderer, RenderError};
pub use staging::{
    AttachmentDescriptor, AttachmentStager, CleanupReport, StageOutcome, TempDirStager, Warning,
};
pub use writer::{OutputMode, PdfWriter, RenderResult, WriteError, WriteFailure, WriteOutcome};
