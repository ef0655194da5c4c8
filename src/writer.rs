//! The invoice PDF writer.
//!
//! A [`PdfWriter`] is configured once and can then write any number of documents. Each
//! [`PdfWriter::write_content`] call stages the enabled attachments, invokes the renderer
//! exactly once, removes the staged files, and then either persists the PDF or hands the
//! bytes back, depending on the [`OutputMode`]. Warnings are returned with the call's result
//! instead of being kept on the writer.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use crate::invoice::Invoice;
use crate::metadata::DocumentMetadata;
use crate::paths::{OutputDirResolver, PathResolver};
use crate::render::{GenpdfRenderer, PdfRenderer, RenderError};
use crate::staging::{
    AttachmentStager, StagedAttachments, TempDirStager, Warning, ORIGINAL_XML_NAME,
    SIGNATURE_NAME,
};

/// Extension of the documents produced by the writer.
pub const PDF_EXTENSION: &str = "pdf";

/// Whether the rendered PDF is persisted or only returned in memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Persist the PDF at the resolved output path.
    #[default]
    Disk,
    /// Return the PDF bytes without touching the output location.
    MemoryOnly,
}

/// The document produced by a write call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderResult {
    /// The PDF was persisted at `path`; `bytes` is what was written.
    File { path: PathBuf, bytes: Vec<u8> },
    /// The PDF was kept in memory only.
    Memory(Vec<u8>),
}

impl RenderResult {
    /// The rendered PDF bytes, in either mode.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::File { bytes, .. } | Self::Memory(bytes) => bytes,
        }
    }

    /// The persisted location, if the PDF was written to disk.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Memory(_) => None,
        }
    }

    /// Consumes the result and returns the PDF bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::File { bytes, .. } | Self::Memory(bytes) => bytes,
        }
    }
}

/// Successful outcome of [`PdfWriter::write_content`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOutcome {
    pub output: RenderResult,
    pub warnings: Vec<Warning>,
}

/// Fatal failures that abort a write.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The output location could not be resolved.
    #[error("failed to resolve output path")]
    Resolve(#[source] io::Error),
    /// The renderer failed; the error is passed through unchanged.
    #[error("failed to render PDF")]
    Render(#[source] RenderError),
    /// The rendered PDF could not be written to disk.
    #[error("failed to write PDF to {}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A fatal [`WriteError`] together with the warnings recorded before it occurred.
#[derive(Debug)]
pub struct WriteFailure {
    pub error: WriteError,
    pub warnings: Vec<Warning>,
}

impl WriteFailure {
    fn new(error: WriteError, warnings: Vec<Warning>) -> Self {
        Self { error, warnings }
    }
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for WriteFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}

impl From<WriteFailure> for WriteError {
    fn from(failure: WriteFailure) -> Self {
        failure.error
    }
}

/// Writes invoice PDFs with the original XML and signature embedded as attachments.
pub struct PdfWriter {
    metadata: DocumentMetadata,
    output_path: Option<PathBuf>,
    original_xml: Option<String>,
    signature: Option<String>,
    mode: OutputMode,
    renderer: Box<dyn PdfRenderer>,
    resolver: Box<dyn PathResolver>,
    stager: Box<dyn AttachmentStager>,
}

impl fmt::Debug for PdfWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfWriter")
            .field("metadata", &self.metadata)
            .field("output_path", &self.output_path)
            .field("has_original_xml", &self.original_xml.is_some())
            .field("has_signature", &self.signature.is_some())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl PdfWriter {
    /// Creates a disk-mode writer using the bundled renderer, the default output
    /// directory, and the system temporary directory for staging.
    pub fn new(metadata: DocumentMetadata) -> Self {
        Self {
            metadata,
            output_path: None,
            original_xml: None,
            signature: None,
            mode: OutputMode::Disk,
            renderer: Box::new(GenpdfRenderer),
            resolver: Box::new(OutputDirResolver::default()),
            stager: Box::new(TempDirStager::default()),
        }
    }

    /// Sets the output file or directory. Without one, documents go to the resolver's
    /// default directory.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Supplies the source XML embedded as `original-ubl.xml`.
    pub fn with_original_xml(mut self, xml: impl Into<String>) -> Self {
        self.original_xml = Some(xml.into());
        self
    }

    /// Supplies the detached signature embedded as `signature.xml`.
    pub fn with_signature(mut self, signature: impl Into<Option<String>>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for [`OutputMode::MemoryOnly`].
    pub fn memory_only(self) -> Self {
        self.with_mode(OutputMode::MemoryOnly)
    }

    pub fn with_renderer(mut self, renderer: impl PdfRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn with_path_resolver(mut self, resolver: impl PathResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_stager(mut self, stager: impl AttachmentStager + 'static) -> Self {
        self.stager = Box::new(stager);
        self
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Renders `html` for `invoice` and persists or returns the PDF.
    ///
    /// Attachment staging problems are reported as warnings and never fail the call.
    /// Staged files are removed before this returns, on success and on failure.
    pub fn write_content(
        &self,
        html: &str,
        invoice: &Invoice,
    ) -> Result<WriteOutcome, WriteFailure> {
        let mut warnings = Vec::new();

        let target = match self.mode {
            OutputMode::Disk => {
                match self
                    .resolver
                    .resolve(self.output_path.as_deref(), &invoice.id, PDF_EXTENSION)
                {
                    Ok(path) => Some(path),
                    Err(err) => return Err(WriteFailure::new(WriteError::Resolve(err), warnings)),
                }
            }
            OutputMode::MemoryOnly => None,
        };

        let mut staged = StagedAttachments::new();
        if self.metadata.include_original_xml {
            if let Some(xml) = &self.original_xml {
                self.stage(&mut staged, &mut warnings, xml, ORIGINAL_XML_NAME);
            }
        }
        if self.metadata.include_signature {
            if let Some(signature) = &self.signature {
                self.stage(&mut staged, &mut warnings, signature, SIGNATURE_NAME);
            }
        }

        let bytes = match self
            .renderer
            .render(html, &self.metadata, staged.descriptors())
        {
            Ok(bytes) => bytes,
            Err(err) => return Err(WriteFailure::new(WriteError::Render(err), warnings)),
        };

        let cleanup = staged.cleanup();
        if !cleanup.is_clean() {
            warn!(
                "{} staged attachment(s) could not be removed after rendering invoice {}",
                cleanup.leftovers.len(),
                invoice.id
            );
        }

        let Some(path) = target else {
            debug!("Rendered invoice {} in memory ({} bytes)", invoice.id, bytes.len());
            return Ok(WriteOutcome {
                output: RenderResult::Memory(bytes),
                warnings,
            });
        };

        if let Err(source) = fs::write(&path, &bytes) {
            return Err(WriteFailure::new(
                WriteError::Persist { path, source },
                warnings,
            ));
        }
        info!("Wrote invoice {} to {}", invoice.id, path.display());

        Ok(WriteOutcome {
            output: RenderResult::File { path, bytes },
            warnings,
        })
    }

    fn stage(
        &self,
        staged: &mut StagedAttachments,
        warnings: &mut Vec<Warning>,
        content: &str,
        name: &str,
    ) {
        let outcome = self.stager.stage(content, name);
        if let Some(attachment) = outcome.attachment {
            staged.push(attachment);
        }
        if let Some(warning) = outcome.warning {
            warnings.push(warning);
        }
    }
}
