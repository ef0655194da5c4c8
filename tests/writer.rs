use std::cell::{Cell, RefCell};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::TempDir;
use ubl_pdf::staging::{ORIGINAL_XML_NAME, SIGNATURE_NAME};
use ubl_pdf::{
    AttachmentDescriptor, AttachmentStager, DocumentMetadata, Invoice, OutputDirResolver,
    OutputMode, Party, PathResolver, PdfRenderer, PdfWriter, RenderError, RenderResult,
    StageOutcome, TempDirStager, WriteError,
};

const HTML: &str = "<h1>Factura INV-001</h1>";
const XML: &str = "<xml/>";
const SIGNATURE: &str = "<Signature/>";
const PDF_BYTES: &[u8] = b"%PDF-1.4 fake";

#[derive(Clone, Debug)]
struct StagedView {
    name: String,
    mime_type: String,
    path: PathBuf,
    content: String,
}

#[derive(Clone, Debug)]
struct RenderCall {
    html: String,
    title: String,
    attachments: Vec<StagedView>,
}

/// Renderer that records each call and reads the staged files while they exist.
#[derive(Clone, Default)]
struct RecordingRenderer {
    calls: Rc<RefCell<Vec<RenderCall>>>,
    fail: bool,
}

impl RecordingRenderer {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<RenderCall> {
        self.calls.borrow().clone()
    }
}

impl PdfRenderer for RecordingRenderer {
    fn render(
        &self,
        html: &str,
        metadata: &DocumentMetadata,
        attachments: &[AttachmentDescriptor],
    ) -> Result<Vec<u8>, RenderError> {
        let attachments = attachments
            .iter()
            .map(|attachment| StagedView {
                name: attachment.name().to_owned(),
                mime_type: attachment.mime_type().to_owned(),
                path: attachment.staged_path().to_path_buf(),
                content: fs::read_to_string(attachment.staged_path()).unwrap_or_default(),
            })
            .collect();
        self.calls.borrow_mut().push(RenderCall {
            html: html.to_owned(),
            title: metadata.title.clone(),
            attachments,
        });

        if self.fail {
            return Err(RenderError::AttachmentRead {
                name: "renderer".into(),
                source: io::Error::new(io::ErrorKind::Other, "renderer crashed"),
            });
        }
        Ok(PDF_BYTES.to_vec())
    }
}

/// Stages the original XML below a file, which cannot hold directories, and everything
/// else normally.
struct BrokenXmlStager {
    broken: TempDirStager,
    working: TempDirStager,
}

impl BrokenXmlStager {
    fn new(root: &Path) -> Self {
        let blocker = root.join("not-a-directory");
        fs::write(&blocker, b"").expect("create blocking file");
        Self {
            broken: TempDirStager::new(blocker),
            working: TempDirStager::new(root),
        }
    }
}

impl AttachmentStager for BrokenXmlStager {
    fn stage(&self, content: &str, name: &str) -> StageOutcome {
        if name == ORIGINAL_XML_NAME {
            self.broken.stage(content, name)
        } else {
            self.working.stage(content, name)
        }
    }
}

/// Resolver that counts calls and always fails.
#[derive(Clone, Default)]
struct FailingResolver {
    calls: Rc<Cell<usize>>,
}

impl PathResolver for FailingResolver {
    fn resolve(&self, _: Option<&Path>, _: &str, _: &str) -> io::Result<PathBuf> {
        self.calls.set(self.calls.get() + 1);
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only output"))
    }
}

struct Fixture {
    staging: TempDir,
    output: TempDir,
    invoice: Invoice,
}

impl Fixture {
    fn new() -> Self {
        Self {
            staging: tempfile::tempdir().expect("create staging root"),
            output: tempfile::tempdir().expect("create output dir"),
            invoice: Invoice::new("INV-001").with_supplier(Party::new("Acme")),
        }
    }

    fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata::from_invoice(&self.invoice)
    }

    fn writer(&self, metadata: DocumentMetadata, renderer: &RecordingRenderer) -> PdfWriter {
        PdfWriter::new(metadata)
            .with_renderer(renderer.clone())
            .with_stager(TempDirStager::new(self.staging.path()))
            .with_path_resolver(OutputDirResolver::new(self.output.path()))
    }

    fn staging_entries(&self) -> Vec<PathBuf> {
        fs::read_dir(self.staging.path())
            .expect("read staging root")
            .map(|entry| entry.expect("staging entry").path())
            .collect()
    }

    fn output_entries(&self) -> Vec<PathBuf> {
        fs::read_dir(self.output.path())
            .expect("read output dir")
            .map(|entry| entry.expect("output entry").path())
            .collect()
    }
}

#[test]
fn writes_pdf_with_staged_attachments_and_cleans_up() {
    let fixture = Fixture::new();
    let renderer = RecordingRenderer::default();
    let writer = fixture
        .writer(fixture.metadata(), &renderer)
        .with_original_xml(XML)
        .with_signature(Some(SIGNATURE.to_owned()));

    let outcome = writer
        .write_content(HTML, &fixture.invoice)
        .expect("write succeeds");

    assert!(outcome.warnings.is_empty());
    let expected_path = fixture.output.path().join("INV-001.pdf");
    assert_eq!(
        outcome.output,
        RenderResult::File {
            path: expected_path.clone(),
            bytes: PDF_BYTES.to_vec(),
        }
    );
    assert_eq!(fs::read(&expected_path).expect("read output"), PDF_BYTES);

    let calls = renderer.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].html, HTML);
    assert_eq!(calls[0].title, "Fact. INV-001");

    let attachments = &calls[0].attachments;
    assert_eq!(attachments.len(), 2);
    assert_eq!(attachments[0].name, ORIGINAL_XML_NAME);
    assert_eq!(attachments[0].mime_type, "text/xml");
    assert_eq!(attachments[0].content, XML);
    assert_eq!(attachments[1].name, SIGNATURE_NAME);
    assert_eq!(attachments[1].content, SIGNATURE);

    for attachment in attachments {
        assert!(attachment.path.starts_with(fixture.staging.path()));
        assert!(!attachment.path.exists(), "{:?} left behind", attachment.path);
    }
    assert!(fixture.staging_entries().is_empty());
}

#[test]
fn disabled_attachments_render_with_empty_list() {
    let fixture = Fixture::new();
    let renderer = RecordingRenderer::default();
    let metadata = fixture
        .metadata()
        .with_include_original_xml(false)
        .with_include_signature(false);
    let writer = fixture
        .writer(metadata, &renderer)
        .with_original_xml(XML)
        .with_signature(Some(SIGNATURE.to_owned()));

    let outcome = writer
        .write_content(HTML, &fixture.invoice)
        .expect("write succeeds");

    assert!(outcome.warnings.is_empty());
    let calls = renderer.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].attachments.is_empty());
    assert!(fixture.staging_entries().is_empty());
}

#[test]
fn absent_signature_is_not_staged() {
    let fixture = Fixture::new();
    let renderer = RecordingRenderer::default();
    let writer = fixture
        .writer(fixture.metadata(), &renderer)
        .with_original_xml(XML)
        .with_signature(None::<String>);

    let outcome = writer
        .write_content(HTML, &fixture.invoice)
        .expect("write succeeds");

    assert!(outcome.warnings.is_empty());
    let names: Vec<String> = renderer.calls()[0]
        .attachments
        .iter()
        .map(|attachment| attachment.name.clone())
        .collect();
    assert_eq!(names, vec![ORIGINAL_XML_NAME.to_owned()]);
}

#[test]
fn staging_failure_becomes_warning_and_render_continues() {
    let fixture = Fixture::new();
    let renderer = RecordingRenderer::default();
    let writer = fixture
        .writer(fixture.metadata(), &renderer)
        .with_stager(BrokenXmlStager::new(fixture.staging.path()))
        .with_original_xml(XML)
        .with_signature(Some(SIGNATURE.to_owned()));

    let outcome = writer
        .write_content(HTML, &fixture.invoice)
        .expect("write succeeds despite staging failure");

    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].code(), "INC_FAIL_original-ubl.xml");
    assert!(outcome.warnings[0]
        .message()
        .starts_with("Could not include original-ubl.xml in PDF"));

    let calls = renderer.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].attachments.len(), 1);
    assert_eq!(calls[0].attachments[0].name, SIGNATURE_NAME);
    assert_eq!(outcome.output.bytes(), PDF_BYTES);

    let leftovers: Vec<PathBuf> = fixture
        .staging_entries()
        .into_iter()
        .filter(|path| path.is_dir())
        .collect();
    assert!(leftovers.is_empty(), "staged directories left: {leftovers:?}");
}

#[test]
fn memory_mode_matches_disk_bytes_without_writing() {
    let fixture = Fixture::new();
    let memory_renderer = RecordingRenderer::default();
    let resolver = FailingResolver::default();
    let memory_writer = fixture
        .writer(fixture.metadata(), &memory_renderer)
        .with_path_resolver(resolver.clone())
        .with_original_xml(XML)
        .memory_only();
    assert_eq!(memory_writer.mode(), OutputMode::MemoryOnly);

    let in_memory = memory_writer
        .write_content(HTML, &fixture.invoice)
        .expect("memory write succeeds");
    assert_eq!(resolver.calls.get(), 0);
    assert!(fixture.output_entries().is_empty());
    assert!(in_memory.output.path().is_none());

    let disk_renderer = RecordingRenderer::default();
    let on_disk = fixture
        .writer(fixture.metadata(), &disk_renderer)
        .with_original_xml(XML)
        .write_content(HTML, &fixture.invoice)
        .expect("disk write succeeds");

    let persisted = fs::read(on_disk.output.path().expect("persisted path")).expect("read pdf");
    assert_eq!(in_memory.output.bytes(), persisted.as_slice());
    assert_eq!(in_memory.output.into_bytes(), on_disk.output.into_bytes());
}

#[test]
fn render_failure_propagates_and_still_cleans_up() {
    let fixture = Fixture::new();
    let renderer = RecordingRenderer::failing();
    let writer = fixture
        .writer(fixture.metadata(), &renderer)
        .with_stager(BrokenXmlStager::new(fixture.staging.path()))
        .with_original_xml(XML)
        .with_signature(Some(SIGNATURE.to_owned()));

    let failure = writer
        .write_content(HTML, &fixture.invoice)
        .expect_err("render failure is fatal");

    assert!(matches!(
        failure.error,
        WriteError::Render(RenderError::AttachmentRead { ref name, .. }) if name == "renderer"
    ));
    assert_eq!(failure.warnings.len(), 1);
    assert_eq!(failure.warnings[0].code(), "INC_FAIL_original-ubl.xml");

    let calls = renderer.calls();
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].attachments[0].path.exists());
    assert!(fixture.output_entries().is_empty());
}

#[test]
fn resolve_failure_aborts_before_rendering() {
    let fixture = Fixture::new();
    let renderer = RecordingRenderer::default();
    let writer = fixture
        .writer(fixture.metadata(), &renderer)
        .with_path_resolver(FailingResolver::default())
        .with_original_xml(XML);

    let failure = writer
        .write_content(HTML, &fixture.invoice)
        .expect_err("resolution failure is fatal");

    assert!(matches!(failure.error, WriteError::Resolve(_)));
    assert!(failure.warnings.is_empty());
    assert!(renderer.calls().is_empty());
    assert!(fixture.staging_entries().is_empty());
}

#[test]
fn persist_failure_reports_path() {
    let fixture = Fixture::new();
    let renderer = RecordingRenderer::default();
    let target = fixture.output.path().join("missing").join("invoice.pdf");
    let writer = fixture
        .writer(fixture.metadata(), &renderer)
        .with_output_path(&target);

    let failure = writer
        .write_content(HTML, &fixture.invoice)
        .expect_err("persisting into a missing directory fails");

    match failure.error {
        WriteError::Persist { ref path, .. } => assert_eq!(path, &target),
        ref other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(renderer.calls().len(), 1);
}

#[test]
fn writer_is_reusable_and_warnings_do_not_accumulate() {
    let fixture = Fixture::new();
    let renderer = RecordingRenderer::default();
    let writer = fixture
        .writer(fixture.metadata(), &renderer)
        .with_stager(BrokenXmlStager::new(fixture.staging.path()))
        .with_original_xml(XML)
        .memory_only();

    let first = writer
        .write_content(HTML, &fixture.invoice)
        .expect("first write");
    let second = writer
        .write_content(HTML, &fixture.invoice)
        .expect("second write");

    assert_eq!(first.warnings.len(), 1);
    assert_eq!(second.warnings.len(), 1);
    assert_eq!(second.warnings[0].code(), first.warnings[0].code());
    assert_eq!(renderer.calls().len(), 2);
}

#[test]
fn supplied_file_path_is_used_verbatim() {
    let fixture = Fixture::new();
    let renderer = RecordingRenderer::default();
    let target = fixture.output.path().join("custom-name.pdf");
    let writer = fixture
        .writer(fixture.metadata(), &renderer)
        .with_output_path(&target);

    let outcome = writer
        .write_content(HTML, &fixture.invoice)
        .expect("write succeeds");

    assert_eq!(outcome.output.path(), Some(target.as_path()));
    assert_eq!(fs::read(&target).expect("read output"), PDF_BYTES);
}
