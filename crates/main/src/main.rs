use std::error::Error;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use log::debug;
use ubl_pdf::{html, DocumentMetadata, Invoice, PdfWriter};

/// Converts a UBL invoice into a PDF with the source XML embedded.
///
/// Fonts are taken from `assets/fonts` next to the binary or from the directory named by
/// `UBL_PDF_FONTS_DIR`.
#[derive(Parser)]
#[command(
    name = "ubl2pdf",
    version,
    about = "Render a UBL invoice to PDF",
    override_usage = "ubl2pdf <input.xml> <output.pdf> [--signature <signature.xml>]"
)]
struct Cli {
    /// UBL invoice or credit note to render.
    input: PathBuf,

    /// Destination PDF; must not exist yet.
    output: PathBuf,

    /// Detached signature to embed next to the invoice XML.
    #[arg(long, value_name = "PATH")]
    signature: Option<PathBuf>,
}

const EXIT_SUCCESS: u8 = 0;
const EXIT_FAILURE: u8 = 1;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let status = run_cli(
        std::env::args_os(),
        &mut io::stdout(),
        &mut io::stderr(),
        PdfWriter::new,
    );
    ExitCode::from(status)
}

/// Runs the command line and returns the process exit status.
///
/// `make_writer` builds the writer from the invoice metadata; the output path and
/// attachments are set on top of whatever it returns.
fn run_cli<I, T>(
    args: I,
    out: &mut dyn Write,
    err: &mut dyn Write,
    make_writer: impl FnOnce(DocumentMetadata) -> PdfWriter,
) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let wants_help = args.get(1).is_some_and(|arg| arg == "help");
    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) if !wants_help => cli,
        _ => {
            let _ = writeln!(out, "{}", Cli::command().render_usage());
            return EXIT_SUCCESS;
        }
    };

    if !cli.input.exists() {
        let _ = writeln!(err, "Input file does not exist!");
        return EXIT_FAILURE;
    }
    if cli.output.exists() {
        let _ = writeln!(err, "Output file already exists!");
        return EXIT_FAILURE;
    }
    if is_zip(&cli.input) {
        let _ = writeln!(
            err,
            "ZIP bundles are not supported; extract the invoice XML from {} first.",
            cli.input.display()
        );
        return EXIT_FAILURE;
    }

    match run(&cli, err, make_writer) {
        Ok(()) => {
            let _ = writeln!(out, "Written to {}", cli.output.display());
            EXIT_SUCCESS
        }
        Err(error) => {
            let _ = writeln!(err, "Error: {}", error);
            print_error_sources(err, error.as_ref());
            EXIT_FAILURE
        }
    }
}

fn run(
    cli: &Cli,
    err: &mut dyn Write,
    make_writer: impl FnOnce(DocumentMetadata) -> PdfWriter,
) -> Result<(), Box<dyn Error>> {
    let xml = fs::read_to_string(&cli.input)?;
    let signature = cli
        .signature
        .as_deref()
        .map(fs::read_to_string)
        .transpose()?;

    let invoice = Invoice::from_ubl(&xml)?;
    debug!("Parsed invoice {} with {} line(s)", invoice.id, invoice.lines.len());

    let writer = make_writer(DocumentMetadata::from_invoice(&invoice))
        .with_output_path(&cli.output)
        .with_original_xml(xml)
        .with_signature(signature);

    let outcome = match writer.write_content(&html::render_invoice(&invoice), &invoice) {
        Ok(outcome) => outcome,
        Err(failure) => {
            print_warnings(err, &failure.warnings);
            return Err(failure.into());
        }
    };
    print_warnings(err, &outcome.warnings);
    Ok(())
}

fn print_warnings(err: &mut dyn Write, warnings: &[ubl_pdf::Warning]) {
    for warning in warnings {
        let _ = writeln!(err, "Warning: {}", warning);
    }
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("zip"))
}

fn print_error_sources(err: &mut dyn Write, mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        let _ = writeln!(err, "  caused by: {}", source);
        error = source;
    }
}
