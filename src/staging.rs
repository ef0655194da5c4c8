//! Temporary staging of attachment content prior to embedding.
//!
//! The renderer embeds attachments from files on disk, so each attachment is first written
//! into its own freshly created directory below a staging root. Staging failures never
//! abort a document: they are reported as [`Warning`]s and the attachment is omitted.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;
use uuid::Uuid;

/// File name used for the embedded source XML.
pub const ORIGINAL_XML_NAME: &str = "original-ubl.xml";

/// File name used for the embedded detached signature.
pub const SIGNATURE_NAME: &str = "signature.xml";

/// MIME type of every staged attachment.
pub const XML_MIME_TYPE: &str = "text/xml";

/// `AFRelationship` value assigned to staged attachments.
pub const UNSPECIFIED_RELATIONSHIP: &str = "Unspecified";

/// Prefix of the warning code emitted when an attachment could not be staged.
pub const STAGING_FAILURE_CODE_PREFIX: &str = "INC_FAIL_";

/// Non-fatal problem recorded while writing a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    message: String,
    code: String,
}

impl Warning {
    /// Creates a new warning.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
        }
    }

    /// Human-readable description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Machine-readable code, e.g. `INC_FAIL_signature.xml`.
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// A file to embed in the PDF together with the location of its staged content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentDescriptor {
    name: String,
    mime_type: String,
    description: String,
    relationship: String,
    staged_path: PathBuf,
}

impl AttachmentDescriptor {
    /// Describes an XML attachment staged at `staged_path`.
    pub fn xml(name: impl Into<String>, staged_path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            description: description_for(&name).to_owned(),
            name,
            mime_type: XML_MIME_TYPE.to_owned(),
            relationship: UNSPECIFIED_RELATIONSHIP.to_owned(),
            staged_path: staged_path.into(),
        }
    }

    /// Target file name inside the PDF.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Value written to the file specification's `/AFRelationship` entry.
    pub fn relationship(&self) -> &str {
        &self.relationship
    }

    /// Filesystem location of the staged content.
    pub fn staged_path(&self) -> &Path {
        &self.staged_path
    }
}

fn description_for(name: &str) -> &'static str {
    match name {
        ORIGINAL_XML_NAME => "Original UBL invoice",
        SIGNATURE_NAME => "Signature",
        _ => "Attachment",
    }
}

/// IO failure while staging a single attachment.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("failed to create staging directory {}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write staged file {}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Result of staging one attachment: either a descriptor or a warning, never an error.
#[derive(Debug, Default)]
pub struct StageOutcome {
    pub attachment: Option<AttachmentDescriptor>,
    pub warning: Option<Warning>,
}

impl StageOutcome {
    fn staged(attachment: AttachmentDescriptor) -> Self {
        Self {
            attachment: Some(attachment),
            warning: None,
        }
    }

    /// Converts a staging failure into the warning reported to callers.
    pub fn failed(name: &str, error: &StagingError) -> Self {
        let reason = match std::error::Error::source(error) {
            Some(source) => format!("{error}: {source}"),
            None => error.to_string(),
        };
        warn!("Could not include {} in PDF: {}", name, reason);
        Self {
            attachment: None,
            warning: Some(Warning::new(
                format!("Could not include {} in PDF: {}", name, reason),
                format!("{}{}", STAGING_FAILURE_CODE_PREFIX, name),
            )),
        }
    }
}

/// Writes attachment content somewhere the renderer can read it from.
pub trait AttachmentStager {
    /// Stages `content` under the file name `name`.
    fn stage(&self, content: &str, name: &str) -> StageOutcome;
}

/// Stages each attachment in a uniquely named directory below a root directory.
///
/// Directory names are random UUIDs. A name that already exists is regenerated, and the
/// directory is created with `create_dir`, which fails instead of reusing an existing
/// directory, so two stagers sharing a root never hand out the same location.
#[derive(Clone, Debug)]
pub struct TempDirStager {
    root: PathBuf,
}

impl Default for TempDirStager {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl TempDirStager {
    /// Creates a stager rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory below which attachments are staged.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn create_unique_dir(&self) -> Result<PathBuf, StagingError> {
        loop {
            let candidate = self.root.join(Uuid::new_v4().simple().to_string());
            if candidate.exists() {
                continue;
            }
            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(StagingError::CreateDir {
                        path: candidate,
                        source,
                    })
                }
            }
        }
    }

    fn try_stage(&self, content: &str, name: &str) -> Result<AttachmentDescriptor, StagingError> {
        let directory = self.create_unique_dir()?;
        let path = directory.join(name);
        if let Err(source) = fs::write(&path, content) {
            let _ = fs::remove_dir_all(&directory);
            return Err(StagingError::Write { path, source });
        }
        debug!("Staged attachment {} at {}", name, path.display());
        Ok(AttachmentDescriptor::xml(name, path))
    }
}

impl AttachmentStager for TempDirStager {
    fn stage(&self, content: &str, name: &str) -> StageOutcome {
        match self.try_stage(content, name) {
            Ok(attachment) => StageOutcome::staged(attachment),
            Err(err) => StageOutcome::failed(name, &err),
        }
    }
}

/// Summary of a cleanup pass over staged attachments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub leftovers: Vec<PathBuf>,
}

impl CleanupReport {
    /// Returns whether every staged file and directory was removed.
    pub fn is_clean(&self) -> bool {
        self.leftovers.is_empty()
    }
}

/// Attachments staged for one write call.
///
/// The staged files are removed by [`StagedAttachments::cleanup`], or on drop if cleanup
/// was never called, so nothing is left behind when rendering fails.
#[derive(Debug, Default)]
pub struct StagedAttachments {
    attachments: Vec<AttachmentDescriptor>,
}

impl StagedAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a staged attachment.
    pub fn push(&mut self, attachment: AttachmentDescriptor) {
        self.attachments.push(attachment);
    }

    /// Descriptors in staging order.
    pub fn descriptors(&self) -> &[AttachmentDescriptor] {
        &self.attachments
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }

    /// Deletes every staged file and its containing directory.
    ///
    /// Failures are logged and reported but never returned as errors.
    pub fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for attachment in self.attachments.drain(..) {
            let file = attachment.staged_path();
            let mut leftover = remove_path(file, fs::remove_file(file));
            if let Some(directory) = file.parent() {
                leftover |= remove_path(directory, fs::remove_dir(directory));
            }
            if leftover {
                report.leftovers.push(file.to_path_buf());
            } else {
                report.removed += 1;
            }
        }
        report
    }
}

fn remove_path(path: &Path, result: io::Result<()>) -> bool {
    match result {
        Ok(()) => false,
        Err(err) if err.kind() == io::ErrorKind::NotFound => false,
        Err(err) => {
            warn!(
                "Leftover staged attachment at {}: {}",
                path.display(),
                err
            );
            true
        }
    }
}

impl Drop for StagedAttachments {
    fn drop(&mut self) {
        if !self.attachments.is_empty() {
            self.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_writes_content_into_fresh_directory() {
        let root = tempfile::tempdir().expect("create temp root");
        let stager = TempDirStager::new(root.path());

        let outcome = stager.stage("<xml/>", ORIGINAL_XML_NAME);
        assert!(outcome.warning.is_none());
        let attachment = outcome.attachment.expect("attachment staged");

        assert_eq!(attachment.name(), ORIGINAL_XML_NAME);
        assert_eq!(attachment.mime_type(), "text/xml");
        assert_eq!(attachment.relationship(), "Unspecified");
        assert_eq!(attachment.description(), "Original UBL invoice");
        assert!(attachment.staged_path().ends_with(ORIGINAL_XML_NAME));
        assert_eq!(
            fs::read_to_string(attachment.staged_path()).expect("read staged file"),
            "<xml/>"
        );
        let directory = attachment.staged_path().parent().expect("staging dir");
        assert_eq!(directory.parent(), Some(root.path()));
    }

    #[test]
    fn each_stage_gets_its_own_directory() {
        let root = tempfile::tempdir().expect("create temp root");
        let stager = TempDirStager::new(root.path());

        let first = stager.stage("a", SIGNATURE_NAME).attachment.expect("first");
        let second = stager.stage("b", SIGNATURE_NAME).attachment.expect("second");
        assert_ne!(first.staged_path(), second.staged_path());
    }

    #[test]
    fn failure_becomes_warning() {
        let root = tempfile::tempdir().expect("create temp root");
        let not_a_directory = root.path().join("occupied");
        fs::write(&not_a_directory, "file").expect("create blocker file");
        let stager = TempDirStager::new(&not_a_directory);

        let outcome = stager.stage("<xml/>", SIGNATURE_NAME);
        assert!(outcome.attachment.is_none());
        let warning = outcome.warning.expect("warning recorded");
        assert_eq!(warning.code(), "INC_FAIL_signature.xml");
        assert!(warning.message().contains(SIGNATURE_NAME));
        assert_eq!(
            warning
                .message()
                .matches("failed to create staging directory")
                .count(),
            1
        );
        assert!(warning.message().contains("os error"));
    }

    #[test]
    fn cleanup_removes_files_and_directories() {
        let root = tempfile::tempdir().expect("create temp root");
        let stager = TempDirStager::new(root.path());
        let mut staged = StagedAttachments::new();
        staged.push(stager.stage("one", ORIGINAL_XML_NAME).attachment.expect("staged"));
        staged.push(stager.stage("two", SIGNATURE_NAME).attachment.expect("staged"));

        let report = staged.cleanup();
        assert_eq!(report.removed, 2);
        assert!(report.is_clean());
        assert!(staged.is_empty());
        assert_eq!(fs::read_dir(root.path()).expect("list root").count(), 0);
    }

    #[test]
    fn drop_cleans_up_uncollected_attachments() {
        let root = tempfile::tempdir().expect("create temp root");
        let stager = TempDirStager::new(root.path());
        {
            let mut staged = StagedAttachments::new();
            staged.push(stager.stage("one", ORIGINAL_XML_NAME).attachment.expect("staged"));
        }
        assert_eq!(fs::read_dir(root.path()).expect("list root").count(), 0);
    }

    #[test]
    fn cleanup_tolerates_missing_files() {
        let root = tempfile::tempdir().expect("create temp root");
        let mut staged = StagedAttachments::new();
        staged.push(AttachmentDescriptor::xml(
            SIGNATURE_NAME,
            root.path().join("gone").join(SIGNATURE_NAME),
        ));

        let report = staged.cleanup();
        assert!(report.is_clean());
    }
}
