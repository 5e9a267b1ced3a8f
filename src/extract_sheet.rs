//! Workbook extraction, modern (`.xlsx`) and legacy (`.xls`).
//!
//! Modern workbooks are streamed straight off the ZIP container with
//! quick-xml; legacy BIFF files go through calamine. Either way each
//! worksheet becomes one named entry in `tabular_rows`: the first row is
//! the header row (blank headers fall back to `column_{i}` by zero-based
//! position) and every following row becomes a header-to-value map with
//! absent cells omitted. Worksheets never produce text units.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xls};
use quick_xml::events::Event;

use crate::extract::ExtractError;
use crate::extract_docx::read_entry_bounded;
use crate::models::{NormalizedRecord, SheetRows};

const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

pub fn extract_modern(path: &Path) -> Result<NormalizedRecord, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice()))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;

    let workbook_xml = read_entry_bounded(&mut archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES)?;
    let sheet_names = parse_workbook_names(&workbook_xml)?;

    let shared = if archive.by_name("xl/sharedStrings.xml").is_ok() {
        let xml = read_entry_bounded(&mut archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
        parse_shared_strings(&xml)?
    } else {
        Vec::new()
    };

    let mut sheet_files: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(String::from)
        .collect();
    sheet_files.sort_by_key(|n| (sheet_number(n), n.clone()));

    let mut tabular: BTreeMap<String, SheetRows> = BTreeMap::new();
    for (i, file) in sheet_files.iter().enumerate() {
        // Workbook order matches the sorted worksheet parts; fall back to
        // the part name if the manifest disagrees.
        let name = if sheet_names.len() == sheet_files.len() {
            sheet_names[i].clone()
        } else {
            Path::new(file)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(file)
                .to_string()
        };
        let xml = read_entry_bounded(&mut archive, file, MAX_XML_ENTRY_BYTES)?;
        let grid = parse_worksheet(&xml, &shared)?;
        tabular.insert(name, grid_to_rows(grid));
    }

    let mut record = NormalizedRecord::new(path);
    record.tabular_rows = Some(tabular);
    Ok(record)
}

pub fn extract_legacy(path: &Path) -> Result<NormalizedRecord, ExtractError> {
    let mut workbook =
        open_workbook::<Xls<_>, _>(path).map_err(|e| ExtractError::Sheet(e.to_string()))?;
    let names = workbook.sheet_names().to_owned();

    let mut tabular: BTreeMap<String, SheetRows> = BTreeMap::new();
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExtractError::Sheet(e.to_string()))?;
        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(first) => first
                .iter()
                .enumerate()
                .map(|(i, cell)| header_or_fallback(cell_text(cell), i))
                .collect(),
            None => {
                tabular.insert(name, Vec::new());
                continue;
            }
        };
        let mut sheet_rows: SheetRows = Vec::new();
        for row in rows {
            let mut mapped = BTreeMap::new();
            for (i, cell) in row.iter().enumerate() {
                if matches!(cell, Data::Empty) {
                    continue;
                }
                let header = headers
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("column_{}", i));
                mapped.insert(header, cell_text(cell));
            }
            sheet_rows.push(mapped);
        }
        tabular.insert(name, sheet_rows);
    }

    let mut record = NormalizedRecord::new(path);
    record.tabular_rows = Some(tabular);
    Ok(record)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn header_or_fallback(text: String, index: usize) -> String {
    if text.trim().is_empty() {
        format!("column_{}", index)
    } else {
        text
    }
}

fn sheet_number(name: &str) -> u32 {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.trim_start_matches("sheet").parse().ok())
        .unwrap_or(u32::MAX)
}

/// Worksheet names in manifest (document) order.
fn parse_workbook_names(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut names = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"name" {
                        let value = attr
                            .unescape_value()
                            .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                        names.push(value.into_owned());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(names)
}

/// The shared-string table: one entry per `<si>`, runs concatenated.
fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Cell grid in document order; each row is `(column index, value)` pairs.
fn parse_worksheet(
    xml: &[u8],
    shared: &[String],
) -> Result<Vec<Vec<(usize, String)>>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut grid: Vec<Vec<(usize, String)>> = Vec::new();
    let mut row: Vec<(usize, String)> = Vec::new();
    let mut in_row = false;
    let mut in_value = false;
    let mut in_inline = false;
    let mut cell_col: usize = 0;
    let mut next_col: usize = 0;
    let mut cell_type = String::new();
    let mut cell_value = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                match e.local_name().as_ref() {
                    b"row" => {
                        in_row = true;
                        next_col = 0;
                        row.clear();
                    }
                    b"c" if in_row => {
                        cell_type.clear();
                        cell_value.clear();
                        cell_col = next_col;
                        for attr in e.attributes().flatten() {
                            match attr.key.local_name().as_ref() {
                                b"r" => {
                                    let r = attr
                                        .unescape_value()
                                        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                                    if let Some(col) = column_index(&r) {
                                        cell_col = col;
                                    }
                                }
                                b"t" => {
                                    cell_type = attr
                                        .unescape_value()
                                        .map_err(|e| ExtractError::Ooxml(e.to_string()))?
                                        .into_owned();
                                }
                                _ => {}
                            }
                        }
                        next_col = cell_col + 1;
                    }
                    b"v" => in_value = true,
                    b"is" => in_inline = true,
                    b"t" if in_inline => in_value = true,
                    _ => {}
                }
            }
            Ok(Event::Text(te)) if in_value => {
                cell_value.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"is" => in_inline = false,
                b"c" if in_row => {
                    let resolved = if cell_type == "s" {
                        cell_value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared.get(i).cloned())
                            .unwrap_or_default()
                    } else {
                        cell_value.clone()
                    };
                    if !resolved.is_empty() {
                        row.push((cell_col, resolved));
                    }
                }
                b"row" => {
                    in_row = false;
                    grid.push(std::mem::take(&mut row));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(grid)
}

/// Zero-based column index from a cell reference such as `B2`.
fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for c in letters.chars() {
        index = index * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}

fn grid_to_rows(grid: Vec<Vec<(usize, String)>>) -> SheetRows {
    let mut iter = grid.into_iter();
    let header_cells = match iter.next() {
        Some(cells) => cells,
        None => return Vec::new(),
    };
    let mut headers: BTreeMap<usize, String> = BTreeMap::new();
    for (col, value) in header_cells {
        headers.insert(col, header_or_fallback(value, col));
    }

    let mut rows: SheetRows = Vec::new();
    for cells in iter {
        let mut mapped = BTreeMap::new();
        for (col, value) in cells {
            let header = headers
                .get(&col)
                .cloned()
                .unwrap_or_else(|| format!("column_{}", col));
            mapped.insert(header, value);
        }
        rows.push(mapped);
    }
    rows
}
