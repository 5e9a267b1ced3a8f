//! Directory batch processing.
//!
//! Walks an input directory, filters to the configured extension set, and
//! runs every survivor through [`crate::extract::process_file`] in sorted
//! path order. One file's failure never aborts the batch: hard extraction
//! errors and oversize files are counted, error-marked records are kept in
//! the output, and a cancellation flag is honored between files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::cancel::CancelFlag;
use crate::config::ProcessingConfig;
use crate::diag::{DiagnosticsSink, PipelineEvent};
use crate::extract::process_file;
use crate::models::NormalizedRecord;

/// Always excluded, on top of the configured globs.
const DEFAULT_EXCLUDES: [&str; 3] = ["**/.git/**", "**/target/**", "**/node_modules/**"];

/// The result of one directory sweep. `records` includes error-marked
/// records; `failed` counts files that produced no record at all.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub records: Vec<NormalizedRecord>,
    pub failed: usize,
    pub cancelled: bool,
}

pub fn process_directory(
    dir: &Path,
    config: &ProcessingConfig,
    cancel: &CancelFlag,
    diag: &dyn DiagnosticsSink,
) -> Result<BatchOutcome> {
    if !dir.is_dir() {
        bail!("input directory {} does not exist", dir.display());
    }
    let excludes = build_excludes(&config.exclude_globs)?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        if excludes.is_match(relative) {
            continue;
        }
        if !is_supported(entry.path(), &config.supported_extensions) {
            continue;
        }
        paths.push(entry.into_path());
    }
    paths.sort();

    let mut outcome = BatchOutcome::default();
    for path in paths {
        if cancel.is_cancelled() {
            diag.emit(PipelineEvent::Cancelled { at: "batch" });
            outcome.cancelled = true;
            break;
        }
        let bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if bytes > config.max_file_bytes {
            diag.emit(PipelineEvent::ExtractFailed {
                path: path.clone(),
                reason: format!("file exceeds size limit ({} bytes)", bytes),
            });
            outcome.failed += 1;
            continue;
        }
        diag.emit(PipelineEvent::Extracting { path: path.clone() });
        match process_file(&path) {
            Ok(record) => outcome.records.push(record),
            Err(e) => {
                diag.emit(PipelineEvent::ExtractFailed {
                    path: path.clone(),
                    reason: e.to_string(),
                });
                outcome.failed += 1;
            }
        }
    }
    Ok(outcome)
}

fn is_supported(path: &Path, supported: &[String]) -> bool {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!(".{}", ext.to_lowercase()),
        None => return false,
    };
    supported.iter().any(|s| s == &ext)
}

fn build_excludes(extra: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in DEFAULT_EXCLUDES
        .iter()
        .copied()
        .chain(extra.iter().map(String::as_str))
    {
        let glob =
            Glob::new(pattern).with_context(|| format!("invalid exclude glob {:?}", pattern))?;
        builder.add(glob);
    }
    builder.build().context("building exclude set")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::NullSink;

    fn default_config() -> ProcessingConfig {
        ProcessingConfig::default()
    }

    #[test]
    fn missing_directory_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let result = process_directory(
            &missing,
            &default_config(),
            &CancelFlag::new(),
            &NullSink,
        );
        assert!(result.is_err());
    }

    #[test]
    fn records_plus_failed_accounts_for_every_candidate() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.csv"), "x,y\n1,2\n").unwrap();
        std::fs::write(tmp.path().join("b.txt"), "plain body").unwrap();
        // Recognized extension, corrupt content: a hard failure.
        std::fs::write(tmp.path().join("c.pdf"), "not a pdf at all").unwrap();
        // Unsupported extension: filtered out before processing.
        std::fs::write(tmp.path().join("d.xyz"), "ignored").unwrap();

        let outcome = process_directory(
            tmp.path(),
            &default_config(),
            &CancelFlag::new(),
            &NullSink,
        )
        .unwrap();
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.failed, 1);
        assert!(!outcome.cancelled);
        // Sorted path order.
        assert!(outcome.records[0].source_path.ends_with("a.csv"));
        assert!(outcome.records[1].source_path.ends_with("b.txt"));
    }

    #[test]
    fn oversize_files_count_as_failures() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("big.txt"), "0123456789").unwrap();
        let config = ProcessingConfig {
            max_file_bytes: 5,
            ..default_config()
        };
        let outcome =
            process_directory(tmp.path(), &config, &CancelFlag::new(), &NullSink).unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.failed, 1);
    }

    #[test]
    fn excluded_directories_are_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let nested = tmp.path().join("node_modules").join("pkg");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("skip.txt"), "hidden").unwrap();
        std::fs::write(tmp.path().join("keep.txt"), "kept").unwrap();

        let outcome = process_directory(
            tmp.path(),
            &default_config(),
            &CancelFlag::new(),
            &NullSink,
        )
        .unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.records[0].source_path.ends_with("keep.txt"));
    }

    #[test]
    fn preset_cancellation_processes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "body").unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let outcome =
            process_directory(tmp.path(), &default_config(), &cancel, &NullSink).unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.failed, 0);
    }
}
