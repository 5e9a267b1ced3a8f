//! Best-effort content sniffing for downloaded files.
//!
//! Remote downloads often arrive without an extension. The sniffer is an
//! optional capability: when it resolves a format the saved file is renamed
//! to carry the matching extension, and when it cannot (or is absent) the
//! original name is kept. Sniffing failure is never fatal.

use std::io::Cursor;

use crate::models::FormatKind;

/// Detects a document format from raw bytes.
pub trait SignatureSniffer: Send + Sync {
    /// Return the detected format, or `None` when the bytes are not
    /// conclusive. Must not panic on arbitrary input.
    fn sniff(&self, bytes: &[u8]) -> Option<FormatKind>;
}

/// Built-in sniffer driven by byte signatures: PDF magic, OOXML archive
/// entry names, and a CSV/plain-text heuristic over UTF-8 content.
///
/// OLE compound files (legacy `.doc`/`.xls`) share one signature and cannot
/// be told apart cheaply, so they are reported as inconclusive.
pub struct ByteSignatureSniffer;

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const OLE_MAGIC: [u8; 8] = [0xd0, 0xcf, 0x11, 0xe0, 0xa1, 0xb1, 0x1a, 0xe1];

impl SignatureSniffer for ByteSignatureSniffer {
    fn sniff(&self, bytes: &[u8]) -> Option<FormatKind> {
        if bytes.is_empty() {
            return None;
        }
        if bytes.starts_with(b"%PDF") {
            return Some(FormatKind::Pdf);
        }
        if bytes.starts_with(&ZIP_MAGIC) {
            return sniff_ooxml(bytes);
        }
        if bytes.starts_with(&OLE_MAGIC) {
            return None;
        }
        let text = std::str::from_utf8(bytes).ok()?;
        if looks_like_csv(text) {
            Some(FormatKind::Csv)
        } else {
            Some(FormatKind::Txt)
        }
    }
}

fn sniff_ooxml(bytes: &[u8]) -> Option<FormatKind> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).ok()?;
    let mut has_word = false;
    let mut has_sheet = false;
    for name in archive.file_names() {
        if name.starts_with("word/") {
            has_word = true;
        } else if name.starts_with("xl/") {
            has_sheet = true;
        }
    }
    if has_word {
        Some(FormatKind::Docx)
    } else if has_sheet {
        Some(FormatKind::Xlsx)
    } else {
        None
    }
}

/// Two or more non-empty lines with a matching, non-zero comma count.
fn looks_like_csv(text: &str) -> bool {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    match (lines.next(), lines.next()) {
        (Some(first), Some(second)) => {
            let commas = first.matches(',').count();
            commas > 0 && second.matches(',').count() == commas
        }
        _ => false,
    }
}
