//! Text extraction for `.docx` documents.
//!
//! A `.docx` file is a ZIP archive whose body lives in `word/document.xml`.
//! Paragraph text is the concatenation of the `<w:t>` runs inside each
//! `<w:p>`; non-empty paragraphs are joined with `\n`.

use std::io::Read;

use quick_xml::events::Event;
use thiserror::Error;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const DOCUMENT_XML: &str = "word/document.xml";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("not a readable docx archive: {0}")]
    Archive(String),
    #[error("word/document.xml not found")]
    MissingBody,
    #[error("word/document.xml exceeds size limit")]
    TooLarge,
    #[error("malformed document xml: {0}")]
    Xml(String),
}

/// Extract paragraph text from the bytes of a `.docx` file.
pub fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Archive(e.to_string()))?;
    let entry = archive.by_name(DOCUMENT_XML).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => ExtractError::MissingBody,
        other => ExtractError::Archive(other.to_string()),
    })?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Archive(e.to_string()))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::TooLarge);
    }

    paragraphs_from_xml(&xml).map(|paragraphs| paragraphs.join("\n"))
}

fn paragraphs_from_xml(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !current.is_empty() {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                }
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| ExtractError::Xml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    // Runs outside any paragraph element.
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs)
}
