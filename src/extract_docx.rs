//! Word-processing (OOXML) extraction.
//!
//! Streams `word/document.xml` with quick-xml: one text unit per non-blank
//! body paragraph in document order, plus one table entry per `w:tbl` with
//! rows as literal cell text. Table-cell paragraphs contribute to their
//! cell, not to the body text units.

use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::Event;

use crate::extract::ExtractError;
use crate::models::{NormalizedRecord, Table, TextUnit};

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

pub(crate) fn read_entry_bounded(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

pub fn extract(path: &Path) -> Result<NormalizedRecord, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice()))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let doc_xml = read_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    parse_document(&doc_xml, path)
}

fn parse_document(xml: &[u8], path: &Path) -> Result<NormalizedRecord, ExtractError> {
    let mut record = NormalizedRecord::new(path);

    // Text is only collected inside `w:t`, where whitespace is
    // significant, so text nodes are taken untrimmed.
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut table_depth = 0usize;
    let mut in_t = false;
    let mut paragraph = String::new();
    let mut cell = String::new();
    let mut row: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        rows.clear();
                    }
                }
                b"tr" if table_depth > 0 => row.clear(),
                b"tc" if table_depth > 0 => cell.clear(),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                let text = te.unescape().unwrap_or_default();
                if table_depth > 0 {
                    cell.push_str(text.as_ref());
                } else {
                    paragraph.push_str(text.as_ref());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"p" => {
                    if table_depth > 0 {
                        // Paragraph break inside a cell.
                        if !cell.is_empty() && !cell.ends_with(' ') {
                            cell.push(' ');
                        }
                    } else {
                        if !paragraph.trim().is_empty() {
                            record
                                .text_units
                                .push(TextUnit::of_kind("paragraph", paragraph.clone()));
                        }
                        paragraph.clear();
                    }
                }
                b"tc" if table_depth > 0 => row.push(cell.trim().to_string()),
                b"tr" if table_depth > 0 => rows.push(std::mem::take(&mut row)),
                b"tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 && !rows.is_empty() {
                        record.tables.push(Table {
                            page: None,
                            index: record.tables.len() + 1,
                            rows: std::mem::take(&mut rows),
                        });
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(record)
}
