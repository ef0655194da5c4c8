//! PDF post-processing built on top of `lopdf`: document information and embedded files.

use std::io;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use thiserror::Error;

use crate::metadata::DocumentMetadata;
use crate::staging::AttachmentDescriptor;

/// Errors that can occur while rewriting a rendered PDF document.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The PDF bytes could not be parsed by `lopdf`.
    #[error("failed to parse rendered PDF")]
    Pdf(#[from] lopdf::Error),
    /// The rewritten document could not be serialised.
    #[error("failed to serialise PDF")]
    Io(#[from] io::Error),
    /// The trailer has no `/Root` reference.
    #[error("PDF catalog entry is missing")]
    MissingCatalog,
    /// The catalog (or its `/Names` entry) is not a dictionary.
    #[error("PDF catalog entry is not a dictionary")]
    InvalidCatalog,
}

/// Attachment content ready to be embedded.
#[derive(Clone, Copy, Debug)]
pub struct EmbeddedFile<'a> {
    pub descriptor: &'a AttachmentDescriptor,
    pub content: &'a [u8],
}

/// Counts the pages of a rendered PDF.
pub fn page_count(pdf_bytes: &[u8]) -> Result<usize, EmbedError> {
    let document = Document::load_mem(pdf_bytes)?;
    Ok(document.get_pages().len())
}

/// Writes the metadata into the information dictionary and embeds `files`.
///
/// Each file becomes an `/EmbeddedFile` stream referenced from a `/Filespec` that is
/// listed both in the catalog's `/Names /EmbeddedFiles` tree and in its `/AF` array.
pub fn finalize_pdf(
    pdf_bytes: &[u8],
    metadata: &DocumentMetadata,
    files: &[EmbeddedFile<'_>],
) -> Result<Vec<u8>, EmbedError> {
    let mut document = Document::load_mem(pdf_bytes)?;

    apply_document_info(&mut document, metadata);
    if !files.is_empty() {
        embed_files(&mut document, files)?;
    }

    let mut buffer = Vec::new();
    document.save_to(&mut buffer)?;
    Ok(buffer)
}

/// Encodes `text` as a PDF text string: a literal for ASCII, UTF-16BE with BOM otherwise.
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        Object::string_literal(text)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

fn apply_document_info(document: &mut Document, metadata: &DocumentMetadata) {
    let referenced = document
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .ok();

    let info_id = match referenced {
        Some(id) if document.get_object(id).and_then(Object::as_dict).is_ok() => id,
        _ => {
            let inline = document
                .trailer
                .get(b"Info")
                .and_then(Object::as_dict)
                .cloned()
                .unwrap_or_else(|_| Dictionary::new());
            let id = document.add_object(inline);
            document.trailer.set("Info", Object::Reference(id));
            id
        }
    };

    if let Ok(info) = document
        .get_object_mut(info_id)
        .and_then(Object::as_dict_mut)
    {
        info.set("Title", text_string(&metadata.title));
        info.set("Author", text_string(&metadata.author));
        info.set("Creator", text_string(&metadata.creator));
        info.set("Subject", text_string(&metadata.subject));
        info.set("Keywords", text_string(&metadata.keywords));
    }
}

fn embed_files(document: &mut Document, files: &[EmbeddedFile<'_>]) -> Result<(), EmbedError> {
    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| EmbedError::MissingCatalog)?;

    let mut sorted: Vec<&EmbeddedFile<'_>> = files.iter().collect();
    sorted.sort_by(|a, b| a.descriptor.name().cmp(b.descriptor.name()));

    let mut name_tree = Vec::with_capacity(sorted.len() * 2);
    let mut associated = Vec::with_capacity(sorted.len());
    for file in sorted {
        let spec_id = add_file_specification(document, file);
        name_tree.push(text_string(file.descriptor.name()));
        name_tree.push(Object::Reference(spec_id));
        associated.push(Object::Reference(spec_id));
    }

    let mut embedded_files = Dictionary::new();
    embedded_files.set("Names", Object::Array(name_tree));

    let names_ref = document
        .get_object(catalog_id)
        .and_then(Object::as_dict)
        .map_err(|_| EmbedError::InvalidCatalog)?
        .get(b"Names")
        .and_then(Object::as_reference)
        .ok();

    match names_ref {
        Some(names_id) => document
            .get_object_mut(names_id)
            .and_then(Object::as_dict_mut)
            .map_err(|_| EmbedError::InvalidCatalog)?
            .set("EmbeddedFiles", embedded_files),
        None => {
            let catalog = catalog_mut(document, catalog_id)?;
            let mut names = catalog
                .get(b"Names")
                .and_then(Object::as_dict)
                .cloned()
                .unwrap_or_else(|_| Dictionary::new());
            names.set("EmbeddedFiles", embedded_files);
            catalog.set("Names", names);
        }
    }

    catalog_mut(document, catalog_id)?.set("AF", Object::Array(associated));

    Ok(())
}

fn catalog_mut(document: &mut Document, id: ObjectId) -> Result<&mut Dictionary, EmbedError> {
    document
        .get_object_mut(id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| EmbedError::InvalidCatalog)
}

fn add_file_specification(document: &mut Document, file: &EmbeddedFile<'_>) -> ObjectId {
    let descriptor = file.descriptor;

    let mut params = Dictionary::new();
    params.set("Size", Object::Integer(file.content.len() as i64));

    let mut stream_dictionary = Dictionary::new();
    stream_dictionary.set("Type", Object::Name(b"EmbeddedFile".to_vec()));
    stream_dictionary.set(
        "Subtype",
        Object::Name(descriptor.mime_type().as_bytes().to_vec()),
    );
    stream_dictionary.set("Params", params);
    let stream_id = document.add_object(Stream::new(stream_dictionary, file.content.to_vec()));

    let mut streams = Dictionary::new();
    streams.set("F", Object::Reference(stream_id));
    streams.set("UF", Object::Reference(stream_id));

    let mut specification = Dictionary::new();
    specification.set("Type", Object::Name(b"Filespec".to_vec()));
    specification.set("F", text_string(descriptor.name()));
    specification.set("UF", text_string(descriptor.name()));
    specification.set("Desc", text_string(descriptor.description()));
    specification.set(
        "AFRelationship",
        Object::Name(descriptor.relationship().as_bytes().to_vec()),
    );
    specification.set("EF", streams);

    document.add_object(specification)
}
