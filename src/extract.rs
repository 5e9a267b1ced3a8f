//! Format resolution and extraction dispatch.
//!
//! A file's lower-cased extension selects exactly one extractor; files
//! without an extension run through a fixed-order cascade of trial parses.
//! Unsupported and undetectable formats surface as a populated `error`
//! field on the record, never as a raised fault past this boundary.
//! Extraction failure of a recognized format propagates as an error so
//! batch callers can count it.

use std::path::Path;

use crate::models::{FormatKind, NormalizedRecord, TextUnit};
use crate::{extract_csv, extract_doc, extract_docx, extract_pdf, extract_sheet};

/// Extraction error. Carried per-file; the pipeline skips the item.
#[derive(Debug)]
pub enum ExtractError {
    Io(String),
    Pdf(String),
    Ooxml(String),
    Sheet(String),
    Csv(String),
    LegacyDoc(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Io(e) => write!(f, "read failed: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Ooxml(e) => write!(f, "OOXML extraction failed: {}", e),
            ExtractError::Sheet(e) => write!(f, "workbook extraction failed: {}", e),
            ExtractError::Csv(e) => write!(f, "CSV extraction failed: {}", e),
            ExtractError::LegacyDoc(e) => write!(f, "legacy document extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Outcome of pure path classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Known(FormatKind),
    NoExtension,
    Unsupported(String),
}

/// Classify a path by its lower-cased extension. Pure; touches no bytes.
pub fn classify(path: &Path) -> Classification {
    match path.extension().and_then(|e| e.to_str()) {
        None => Classification::NoExtension,
        Some(ext) => match FormatKind::from_extension(ext) {
            Some(kind) => Classification::Known(kind),
            None => Classification::Unsupported(ext.to_ascii_lowercase()),
        },
    }
}

/// One extractor per format variant. All implementations produce the same
/// normalized record shape.
pub trait Extractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<NormalizedRecord, ExtractError>;
}

struct PdfExtractor;
struct DocxExtractor;
struct LegacyDocExtractor;
struct ModernSheetExtractor;
struct LegacySheetExtractor;
struct CsvExtractor;
struct PlainTextExtractor;

impl Extractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<NormalizedRecord, ExtractError> {
        extract_pdf::extract(path)
    }
}

impl Extractor for DocxExtractor {
    fn extract(&self, path: &Path) -> Result<NormalizedRecord, ExtractError> {
        extract_docx::extract(path)
    }
}

impl Extractor for LegacyDocExtractor {
    fn extract(&self, path: &Path) -> Result<NormalizedRecord, ExtractError> {
        extract_doc::extract(path)
    }
}

impl Extractor for ModernSheetExtractor {
    fn extract(&self, path: &Path) -> Result<NormalizedRecord, ExtractError> {
        extract_sheet::extract_modern(path)
    }
}

impl Extractor for LegacySheetExtractor {
    fn extract(&self, path: &Path) -> Result<NormalizedRecord, ExtractError> {
        extract_sheet::extract_legacy(path)
    }
}

impl Extractor for CsvExtractor {
    fn extract(&self, path: &Path) -> Result<NormalizedRecord, ExtractError> {
        extract_csv::extract(path)
    }
}

impl Extractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<NormalizedRecord, ExtractError> {
        extract_plain_text(path)
    }
}

/// Capability table: exactly one extractor per format.
pub fn extractor_for(kind: FormatKind) -> &'static dyn Extractor {
    match kind {
        FormatKind::Pdf => &PdfExtractor,
        FormatKind::Docx => &DocxExtractor,
        FormatKind::Doc => &LegacyDocExtractor,
        FormatKind::Xlsx => &ModernSheetExtractor,
        FormatKind::Xls => &LegacySheetExtractor,
        FormatKind::Csv => &CsvExtractor,
        FormatKind::Txt => &PlainTextExtractor,
    }
}

/// Single unit holding the full file content.
fn extract_plain_text(path: &Path) -> Result<NormalizedRecord, ExtractError> {
    let content = std::fs::read_to_string(path).map_err(|e| ExtractError::Io(e.to_string()))?;
    let mut record = NormalizedRecord::new(path);
    record.text_units.push(TextUnit::of_kind("text", content));
    Ok(record)
}

/// Process one file. Unsupported or undetectable formats yield an
/// error-marked record; extraction failure of a recognized format is
/// returned as `Err` for the caller's failure accounting.
pub fn process_file(path: &Path) -> Result<NormalizedRecord, ExtractError> {
    match classify(path) {
        Classification::Known(kind) => extractor_for(kind).extract(path),
        Classification::Unsupported(_) => Ok(NormalizedRecord::failed(path, "unsupported type")),
        Classification::NoExtension => Ok(detect_and_extract(path)),
    }
}

/// No-extension cascade: trial-parse in fixed priority order, accepting the
/// first extractor that completes. All failing yields an error record.
fn detect_and_extract(path: &Path) -> NormalizedRecord {
    let attempts: [&dyn Extractor; 6] = [
        &PdfExtractor,
        &DocxExtractor,
        &ModernSheetExtractor,
        &LegacySheetExtractor,
        &CsvExtractor,
        &PlainTextExtractor,
    ];
    for extractor in attempts {
        if let Ok(record) = extractor.extract(path) {
            return record;
        }
    }
    NormalizedRecord::failed(path, "could not detect file type")
}
