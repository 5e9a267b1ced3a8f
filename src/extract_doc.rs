//! Legacy Word (`.doc`) extraction.
//!
//! There is no single reliable reader for the old binary format, so every
//! available strategy runs independently and the fragments that succeed are
//! concatenated. The strategies, in order: a headless `soffice` conversion
//! to plain text, a raw byte-salvage pass over the file itself, a ZIP
//! reinterpretation (files misnamed `.doc` that are really OOXML), and the
//! `antiword` and `catdoc` command-line converters. A strategy failure is
//! recorded, never raised; only when all five fail does the record carry an
//! error, and even then as a failed record rather than an extraction error.

use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::extract::ExtractError;
use crate::extract_docx;
use crate::models::{NormalizedRecord, TextUnit};

static CONVERT_SEQ: AtomicU64 = AtomicU64::new(0);

pub fn extract(path: &Path) -> Result<NormalizedRecord, ExtractError> {
    let mut fragments: Vec<String> = Vec::new();
    let mut reasons: Vec<String> = Vec::new();

    match convert_with_soffice(path) {
        Ok(text) if !text.trim().is_empty() => fragments.push(text),
        Ok(_) => reasons.push("soffice: empty output".to_string()),
        Err(reason) => reasons.push(format!("soffice: {}", reason)),
    }

    match std::fs::read(path) {
        Ok(bytes) => {
            let salvaged = salvage_text(&bytes);
            if salvaged.trim().is_empty() {
                reasons.push("salvage: no readable text".to_string());
            } else {
                fragments.push(salvaged);
            }
        }
        Err(e) => reasons.push(format!("salvage: {}", e)),
    }

    match extract_docx::extract(path) {
        Ok(record) if !record.text_units.is_empty() => {
            let joined = record
                .text_units
                .iter()
                .map(|u| u.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            fragments.push(joined);
        }
        Ok(_) => reasons.push("ooxml: no paragraphs".to_string()),
        Err(e) => reasons.push(format!("ooxml: {}", e)),
    }

    for tool in ["antiword", "catdoc"] {
        match convert_with_tool(tool, path) {
            Ok(text) if !text.trim().is_empty() => fragments.push(text),
            Ok(_) => reasons.push(format!("{}: empty output", tool)),
            Err(reason) => reasons.push(format!("{}: {}", tool, reason)),
        }
    }

    if fragments.is_empty() {
        return Ok(NormalizedRecord::failed(
            path,
            format!("no strategy produced text ({})", reasons.join("; ")),
        ));
    }

    let mut record = NormalizedRecord::new(path);
    record
        .text_units
        .push(TextUnit::of_kind("extracted_text", fragments.join("\n\n")));
    Ok(record)
}

/// Converts via `soffice --headless --convert-to txt` into a unique temp
/// directory and reads the resulting `.txt` back.
fn convert_with_soffice(path: &Path) -> Result<String, String> {
    let seq = CONVERT_SEQ.fetch_add(1, Ordering::Relaxed);
    let outdir = std::env::temp_dir().join(format!(
        "docharvest-soffice-{}-{}",
        std::process::id(),
        seq
    ));
    std::fs::create_dir_all(&outdir).map_err(|e| e.to_string())?;

    let result = Command::new("soffice")
        .arg("--headless")
        .arg("--convert-to")
        .arg("txt")
        .arg("--outdir")
        .arg(&outdir)
        .arg(path)
        .output();

    let text = match result {
        Ok(output) if output.status.success() => {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
            let converted = outdir.join(format!("{}.txt", stem));
            std::fs::read_to_string(&converted).map_err(|e| e.to_string())
        }
        Ok(output) => Err(format!("exit status {}", output.status)),
        Err(e) => Err(e.to_string()),
    };

    let _ = std::fs::remove_dir_all(&outdir);
    text
}

fn convert_with_tool(tool: &str, path: &Path) -> Result<String, String> {
    let output = Command::new(tool).arg(path).output().map_err(|e| e.to_string())?;
    if !output.status.success() {
        return Err(format!("exit status {}", output.status));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Pulls readable runs out of raw bytes: printable-ASCII sequences of at
/// least 16 characters, then UTF-16LE sequences of the same length.
pub(crate) fn salvage_text(bytes: &[u8]) -> String {
    const MIN_RUN: usize = 16;
    let mut runs: Vec<String> = Vec::new();

    let mut current = String::new();
    for &b in bytes {
        if (0x20..0x7f).contains(&b) || b == b'\n' || b == b'\t' {
            current.push(b as char);
        } else {
            if current.trim().len() >= MIN_RUN {
                runs.push(current.trim().to_string());
            }
            current.clear();
        }
    }
    if current.trim().len() >= MIN_RUN {
        runs.push(current.trim().to_string());
    }

    let mut wide = String::new();
    for pair in bytes.chunks_exact(2) {
        let code = u16::from_le_bytes([pair[0], pair[1]]);
        match char::from_u32(code as u32) {
            Some(c) if (' '..='~').contains(&c) || c == '\n' || c == '\t' => wide.push(c),
            _ => {
                if wide.trim().len() >= MIN_RUN {
                    runs.push(wide.trim().to_string());
                }
                wide.clear();
            }
        }
    }
    if wide.trim().len() >= MIN_RUN {
        runs.push(wide.trim().to_string());
    }

    runs.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salvage_keeps_long_ascii_runs() {
        let mut bytes = vec![0u8; 32];
        bytes.extend_from_slice(b"This sentence survives the binary noise.");
        bytes.extend_from_slice(&[0xff, 0xfe, 0x01]);
        bytes.extend_from_slice(b"short");
        bytes.push(0);
        let salvaged = salvage_text(&bytes);
        assert!(salvaged.contains("This sentence survives the binary noise."));
        assert!(!salvaged.contains("short"));
    }

    #[test]
    fn salvage_decodes_utf16le_runs() {
        let text = "Wide characters also count as content";
        let mut bytes = vec![0xd0u8, 0xcf, 0x11, 0xe0];
        for c in text.chars() {
            bytes.extend_from_slice(&(c as u16).to_le_bytes());
        }
        let salvaged = salvage_text(&bytes);
        assert!(salvaged.contains(text));
    }

    #[test]
    fn misnamed_ooxml_file_contributes_its_paragraphs() {
        use std::io::Write;
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("renamed.doc");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(
            br#"<w:document xmlns:w="x"><w:body>
                <w:p><w:r><w:t>Recovered paragraph body</w:t></w:r></w:p>
            </w:body></w:document>"#,
        )
        .unwrap();
        zip.finish().unwrap();

        let record = extract(&path).unwrap();
        assert!(!record.is_failed());
        assert_eq!(record.text_units.len(), 1);
        assert_eq!(record.text_units[0].kind.as_deref(), Some("extracted_text"));
        assert!(record.text_units[0].text.contains("Recovered paragraph body"));
    }

    #[test]
    fn all_strategies_failing_yields_failed_record_not_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("hopeless.doc");
        // Pure control bytes: nothing salvageable, not a ZIP.
        std::fs::write(&path, [0u8, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        let record = extract(&path).unwrap();
        assert!(record.is_failed());
        assert!(record.error.as_deref().unwrap().contains("no strategy produced text"));
    }
}
