//! Font lookup for the invoice renderer.
//!
//! The first directory holding all four styles of a family wins:
//!
//! 1. `Roboto-*.ttf` in `UBL_PDF_FONTS_DIR`
//! 2. `Roboto-*.ttf` in `assets/fonts` next to the executable, then in the crate sources
//! 3. `LiberationSans-*.ttf` in the usual Linux system font directories
//! 4. `arial*.ttf` in `UBL_PDF_WINDOWS_FONTS_DIR`, `%WINDIR%\Fonts` or `%SystemRoot%\Fonts`

use std::env;
use std::io;
use std::path::PathBuf;

use genpdf::error::Error;
use genpdf::fonts::{FontData, FontFamily};
use log::debug;

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

/// Environment variable naming a directory with the bundled family.
pub const FONTS_DIR_ENV: &str = "UBL_PDF_FONTS_DIR";

/// Environment variable naming a Windows fonts directory.
pub const WINDOWS_FONTS_DIR_ENV: &str = "UBL_PDF_WINDOWS_FONTS_DIR";

const SYSTEM_FAMILY_NAME: &str = "LiberationSans";

const SYSTEM_FONT_DIRECTORIES: &[&str] = &[
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/liberation2",
    "/usr/share/fonts/liberation-sans",
    "/usr/share/fonts/liberation",
    "/usr/share/fonts/TTF",
];

const ARIAL_FILES: [&str; 4] = ["arial.ttf", "arialbd.ttf", "ariali.ttf", "arialbi.ttf"];

/// How the regular, bold, italic and bold italic files of a family are named.
#[derive(Clone, Debug, PartialEq, Eq)]
enum FileNames {
    /// `<family>-Regular.ttf`, `<family>-Bold.ttf`, ...
    Suffixed(&'static str),
    Fixed([&'static str; 4]),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct FontSource {
    directory: PathBuf,
    names: FileNames,
}

impl FontSource {
    fn suffixed(directory: impl Into<PathBuf>, family: &'static str) -> Self {
        Self {
            directory: directory.into(),
            names: FileNames::Suffixed(family),
        }
    }

    fn fixed(directory: impl Into<PathBuf>, files: [&'static str; 4]) -> Self {
        Self {
            directory: directory.into(),
            names: FileNames::Fixed(files),
        }
    }

    fn files(&self) -> [String; 4] {
        match &self.names {
            FileNames::Suffixed(family) => ["Regular", "Bold", "Italic", "BoldItalic"]
                .map(|style| format!("{family}-{style}.ttf")),
            FileNames::Fixed(files) => files.map(str::to_owned),
        }
    }

    fn missing_files(&self) -> Vec<String> {
        self.files()
            .into_iter()
            .filter(|file| !self.directory.join(file).is_file())
            .collect()
    }

    fn load(&self) -> Result<FontFamily<FontData>, Error> {
        let [regular, bold, italic, bold_italic] = self
            .files()
            .map(|file| FontData::load(self.directory.join(file), None));
        Ok(FontFamily {
            regular: regular?,
            bold: bold?,
            italic: italic?,
            bold_italic: bold_italic?,
        })
    }
}

/// Directory holding the fonts shipped with the crate sources.
pub fn bundled_fonts_source_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts")
}

fn env_dir(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn search_path() -> Vec<FontSource> {
    let mut sources = Vec::new();

    if let Some(directory) = env_dir(FONTS_DIR_ENV) {
        sources.push(FontSource::suffixed(directory, DEFAULT_FONT_FAMILY_NAME));
    }
    if let Some(bin_dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("assets/fonts")))
    {
        sources.push(FontSource::suffixed(bin_dir, DEFAULT_FONT_FAMILY_NAME));
    }
    sources.push(FontSource::suffixed(
        bundled_fonts_source_dir(),
        DEFAULT_FONT_FAMILY_NAME,
    ));
    sources.extend(
        SYSTEM_FONT_DIRECTORIES
            .iter()
            .map(|directory| FontSource::suffixed(*directory, SYSTEM_FAMILY_NAME)),
    );

    let windows_roots = ["WINDIR", "SystemRoot"]
        .into_iter()
        .filter_map(env_dir)
        .map(|root| root.join("Fonts"));
    sources.extend(
        env_dir(WINDOWS_FONTS_DIR_ENV)
            .into_iter()
            .chain(windows_roots)
            .map(|directory| FontSource::fixed(directory, ARIAL_FILES)),
    );

    sources.dedup();
    sources
}

/// Loads the first complete font family on the search path.
pub fn default_font_family() -> Result<FontFamily<FontData>, Error> {
    let mut checked = Vec::new();
    for source in search_path() {
        let missing = source.missing_files();
        if missing.is_empty() {
            debug!("Loading fonts from {}", source.directory.display());
            return source.load();
        }
        checked.push(format!(
            "{} (missing {})",
            source.directory.display(),
            missing.join(", ")
        ));
    }

    Err(Error::new(
        format!(
            "no complete font family found; checked {}. See assets/fonts/README.md or set {}",
            checked.join("; "),
            FONTS_DIR_ENV
        ),
        io::Error::new(io::ErrorKind::NotFound, "font family not found"),
    ))
}

/// Whether [`default_font_family`] will find a complete family.
pub fn default_fonts_available() -> bool {
    search_path()
        .iter()
        .any(|source| source.missing_files().is_empty())
}
