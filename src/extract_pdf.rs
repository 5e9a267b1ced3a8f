//! Portable-document extraction.
//!
//! Produces one text unit per page that has extractable text (empty pages
//! are omitted) and detects tables per page with a line-run heuristic:
//! consecutive lines that split into two or more cells on tab or wide-space
//! boundaries form a table.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::extract::ExtractError;
use crate::models::{NormalizedRecord, Table, TextUnit};

static CELL_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\t|[ ]{2,}").expect("cell split pattern"));

pub fn extract(path: &Path) -> Result<NormalizedRecord, ExtractError> {
    let doc = lopdf::Document::load(path).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(ExtractError::Pdf("document has no pages".to_string()));
    }

    let mut record = NormalizedRecord::new(path);
    let mut table_index = 0;
    for &page_no in pages.keys() {
        // A page that fails text extraction is treated as empty, the same
        // as a page with no text.
        let text = doc.extract_text(&[page_no]).unwrap_or_default();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        record
            .text_units
            .push(TextUnit::page(page_no as usize, trimmed));

        for rows in detect_line_tables(trimmed) {
            table_index += 1;
            record.tables.push(Table {
                page: Some(page_no as usize),
                index: table_index,
                rows,
            });
        }
    }
    Ok(record)
}

/// Group runs of two or more consecutive multi-cell lines into tables, in
/// page order. Each row keeps its cells as literal text.
fn detect_line_tables(text: &str) -> Vec<Vec<Vec<String>>> {
    let mut tables = Vec::new();
    let mut run: Vec<Vec<String>> = Vec::new();

    for line in text.lines() {
        let cells: Vec<String> = CELL_SPLIT
            .split(line.trim())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();
        if cells.len() >= 2 {
            run.push(cells);
        } else {
            if run.len() >= 2 {
                tables.push(std::mem::take(&mut run));
            }
            run.clear();
        }
    }
    if run.len() >= 2 {
        tables.push(run);
    }
    tables
}
