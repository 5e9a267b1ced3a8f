//! JSON artifact persistence and dataset aggregation.
//!
//! Two artifact shapes leave the pipeline: one processed-document file per
//! annotated record, and a single aggregated training dataset across the
//! batch. Both are pretty-printed JSON under the configured output
//! directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::models::{
    AnnotatedRecord, DatasetMetadata, DocumentSummary, QaPair, TrainingDataset,
};

/// Aggregates annotated records in input order: all question/answer pairs
/// concatenated, plus a per-document index of section labels and counts.
pub fn build_training_dataset(records: &[AnnotatedRecord]) -> TrainingDataset {
    let mut qa_pairs: Vec<QaPair> = Vec::new();
    let mut documents: Vec<DocumentSummary> = Vec::new();
    for annotated in records {
        qa_pairs.extend(annotated.qa_pairs.iter().cloned());
        documents.push(DocumentSummary {
            file_path: annotated.record.source_path.clone(),
            sections: annotated.sections.keys().cloned().collect(),
            // Number of metric kinds present, not matched literals.
            metrics_count: annotated.metrics.len(),
            qa_pairs_count: annotated.qa_pairs.len(),
        });
    }
    TrainingDataset {
        metadata: DatasetMetadata {
            created_at: Utc::now(),
            total_documents: documents.len(),
            total_qa_pairs: qa_pairs.len(),
            version: "1.0".to_string(),
        },
        qa_pairs,
        documents,
    }
}

/// Writes one processed-document artifact. Without an explicit name the
/// file is timestamped `processed_data_YYYYMMDD_HHMMSS.json`.
pub fn save_processed_record(
    output_dir: &Path,
    record: &AnnotatedRecord,
    file_name: Option<&str>,
) -> Result<PathBuf> {
    let name = match file_name {
        Some(name) => name.to_string(),
        None => format!(
            "processed_data_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S")
        ),
    };
    write_json(output_dir, &name, record)
}

pub fn save_training_dataset(output_dir: &Path, dataset: &TrainingDataset) -> Result<PathBuf> {
    write_json(output_dir, "training_dataset.json", dataset)
}

/// Reads a previously saved dataset. A missing file is not an error; it
/// loads as an empty corpus.
pub fn load_training_dataset(path: &Path) -> Result<TrainingDataset> {
    if !path.exists() {
        return Ok(TrainingDataset::empty());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: serde::Serialize>(output_dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let path = output_dir.join(name);
    let json = serde_json::to_string_pretty(value).context("serializing artifact")?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::annotate;
    use crate::models::{NormalizedRecord, TextUnit};

    fn annotated(path: &str, text: &str) -> AnnotatedRecord {
        let mut record = NormalizedRecord::new(Path::new(path));
        record.text_units.push(TextUnit::page(1, text.to_string()));
        annotate(&record)
    }

    #[test]
    fn dataset_totals_match_contents() {
        let records = vec![
            annotated("a.pdf", "Summary: revenue rose 10% on 2,000 units in 2023."),
            annotated("b.pdf", "Methodology was sound."),
        ];
        let dataset = build_training_dataset(&records);
        assert_eq!(dataset.metadata.total_documents, 2);
        assert_eq!(dataset.metadata.total_qa_pairs, dataset.qa_pairs.len());
        assert_eq!(
            dataset.metadata.total_qa_pairs,
            records.iter().map(|r| r.qa_pairs.len()).sum::<usize>()
        );
        assert_eq!(dataset.documents[0].file_path, "a.pdf");
        assert!(dataset.documents[0]
            .sections
            .contains(&"executive_summary".to_string()));
        // Two kinds (percentage, numbers), not four matched literals.
        assert_eq!(
            dataset.documents[0].metrics_count,
            records[0].metrics.len()
        );
        assert_eq!(dataset.documents[0].metrics_count, 2);
    }

    #[test]
    fn missing_dataset_loads_as_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dataset = load_training_dataset(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(dataset.metadata.total_documents, 0);
        assert!(dataset.qa_pairs.is_empty());
    }

    #[test]
    fn save_and_reload_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dataset = build_training_dataset(&[annotated("a.pdf", "Findings: growth of 5%.")]);
        let path = save_training_dataset(tmp.path(), &dataset).unwrap();
        assert!(path.ends_with("training_dataset.json"));
        let reloaded = load_training_dataset(&path).unwrap();
        assert_eq!(reloaded, dataset);
    }

    #[test]
    fn processed_record_uses_explicit_name() {
        let tmp = tempfile::TempDir::new().unwrap();
        let record = annotated("a.pdf", "Overview of the quarter.");
        let path =
            save_processed_record(tmp.path(), &record, Some("processed_a.json")).unwrap();
        assert!(path.ends_with("processed_a.json"));
        let raw = std::fs::read_to_string(&path).unwrap();
        let reloaded: AnnotatedRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(reloaded, record);
    }
}
