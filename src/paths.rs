//! Output path resolution.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Directory used by [`OutputDirResolver::default`].
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Turns a caller-supplied output location into a concrete file path.
pub trait PathResolver {
    /// Resolves the output file for the document identified by `invoice_id`.
    ///
    /// `supplied` may be absent, name a directory, or name the output file itself.
    fn resolve(
        &self,
        supplied: Option<&Path>,
        invoice_id: &str,
        extension: &str,
    ) -> io::Result<PathBuf>;
}

/// Resolver that names documents `<invoice id>.<extension>` inside a directory.
///
/// A supplied path that is not an existing directory is used verbatim. Without a supplied
/// path the document goes to the resolver's output directory, which is created on demand.
#[derive(Clone, Debug)]
pub struct OutputDirResolver {
    output_dir: PathBuf,
}

impl Default for OutputDirResolver {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

impl OutputDirResolver {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl PathResolver for OutputDirResolver {
    fn resolve(
        &self,
        supplied: Option<&Path>,
        invoice_id: &str,
        extension: &str,
    ) -> io::Result<PathBuf> {
        match supplied {
            Some(path) if path.is_dir() => Ok(path.join(file_name(invoice_id, extension))),
            Some(path) => Ok(path.to_path_buf()),
            None => {
                fs::create_dir_all(&self.output_dir)?;
                Ok(self.output_dir.join(file_name(invoice_id, extension)))
            }
        }
    }
}

/// File name for an invoice, with path separators in the identifier neutralised.
pub fn file_name(invoice_id: &str, extension: &str) -> String {
    let stem: String = invoice_id
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '\0' => '_',
            other => other,
        })
        .collect();
    let stem = if stem.is_empty() || stem == "." || stem == ".." {
        "invoice".to_owned()
    } else {
        stem
    };
    format!("{}.{}", stem, extension)
}
