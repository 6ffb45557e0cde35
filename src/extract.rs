//! Format-specific text extraction for uploaded documents.
//!
//! Extraction is pipeline-layer: the ingestion loop supplies raw bytes and
//! the stored extension; this module returns plain UTF-8 text. Errors are
//! per-document — the pipeline records them and moves on.

use std::io::Read;

use crate::error::{EngineError, Result};

/// Maximum decompressed bytes to read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extensions whose content is read directly as (lossy) UTF-8 text.
const TEXT_EXTENSIONS: &[&str] = &[
    ".txt", ".md", ".csv", ".json", ".py", ".js", ".jsx", ".ts", ".tsx", ".html", ".css",
];

/// Extracts plain text from document bytes based on the stored extension.
pub fn extract_text(bytes: &[u8], extension: &str) -> Result<String> {
    if TEXT_EXTENSIONS.contains(&extension) {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }
    match extension {
        ".pdf" => extract_pdf(bytes),
        ".docx" | ".doc" => extract_docx(bytes),
        other => Err(EngineError::DocumentProcessing(format!(
            "unsupported extension: {}",
            other
        ))),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| EngineError::DocumentProcessing(format!("PDF extraction failed: {}", e)))
}

/// Pulls the `w:t` text runs out of `word/document.xml`.
fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| EngineError::DocumentProcessing(format!("OOXML open failed: {}", e)))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive.by_name("word/document.xml").map_err(|_| {
            EngineError::DocumentProcessing("word/document.xml not found".to_string())
        })?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| EngineError::DocumentProcessing(e.to_string()))?;
    }
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(EngineError::DocumentProcessing(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    extract_t_elements(&doc_xml)
}

fn extract_t_elements(xml: &[u8]) -> Result<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(EngineError::DocumentProcessing(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
