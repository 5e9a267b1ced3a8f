//! Core data models used throughout docharvest.
//!
//! These types represent the references, files, and records that flow
//! through the acquisition, extraction, and annotation pipeline, plus the
//! JSON artifacts handed to the downstream narrative stage.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logical format of a document, selected by extension or content probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    Pdf,
    Docx,
    Doc,
    Xlsx,
    Xls,
    Csv,
    Txt,
}

impl FormatKind {
    /// Map an extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FormatKind::Pdf),
            "docx" => Some(FormatKind::Docx),
            "doc" => Some(FormatKind::Doc),
            "xlsx" => Some(FormatKind::Xlsx),
            "xls" => Some(FormatKind::Xls),
            "csv" => Some(FormatKind::Csv),
            "txt" => Some(FormatKind::Txt),
            _ => None,
        }
    }

    /// Canonical extension for this format, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FormatKind::Pdf => "pdf",
            FormatKind::Docx => "docx",
            FormatKind::Doc => "doc",
            FormatKind::Xlsx => "xlsx",
            FormatKind::Xls => "xls",
            FormatKind::Csv => "csv",
            FormatKind::Txt => "txt",
        }
    }
}

/// Whether a remote reference points at a single file or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    File,
    Collection,
}

/// A resolved remote locator. A reference that cannot be decoded into an
/// identifier is a terminal input error and never produces this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReference {
    /// The URL as supplied by the caller.
    pub raw: String,
    /// The unique identifier extracted from the URL.
    pub id: String,
    pub kind: ReferenceKind,
}

/// A local byte-identical copy of a remote or local document. Never mutated
/// after creation; re-fetching overwrites rather than appends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedFile {
    pub path: PathBuf,
    /// Format inferred from the filename or sniffed from content, if any.
    pub format: Option<FormatKind>,
    pub bytes: u64,
}

/// One page, paragraph, or plain-text block of extracted text.
///
/// Page-oriented formats set `page`; structural formats set `kind`
/// (`"paragraph"`, `"extracted_text"`, `"text"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextUnit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub text: String,
}

impl TextUnit {
    pub fn page(page: usize, text: impl Into<String>) -> Self {
        Self {
            page: Some(page),
            kind: None,
            text: text.into(),
        }
    }

    pub fn of_kind(kind: &str, text: impl Into<String>) -> Self {
        Self {
            page: None,
            kind: Some(kind.to_string()),
            text: text.into(),
        }
    }
}

/// A table detected in a document, rows as literal cell text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Page the table appears on, when the format is page-oriented.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    /// 1-based position of the table within the document.
    pub index: usize,
    pub rows: Vec<Vec<String>>,
}

/// Ordered rows of one sheet, each row a column-name to cell-value mapping.
pub type SheetRows = Vec<BTreeMap<String, String>>;

/// Canonical extraction output, identical in shape regardless of source
/// format. Exactly one of {content populated} or {`error` populated} holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NormalizedRecord {
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_units: Vec<TextUnit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<Table>,
    /// Present only for spreadsheet/CSV sources: sheet name to rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tabular_rows: Option<BTreeMap<String, SheetRows>>,
    /// Terminal-failure marker; when present all content fields are empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NormalizedRecord {
    pub fn new(path: &Path) -> Self {
        Self {
            source_path: path.display().to_string(),
            ..Self::default()
        }
    }

    /// A record carrying a terminal failure and no content.
    pub fn failed(path: &Path, error: impl Into<String>) -> Self {
        Self {
            source_path: path.display().to_string(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// All text units joined with a single separating space, in source order.
    pub fn joined_text(&self) -> String {
        self.text_units
            .iter()
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One occurrence of a named report section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionHit {
    pub excerpt: String,
    pub start_offset: usize,
}

/// A synthesized question/answer pair with provenance and confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    /// Which analysis step produced this pair (`document_analysis` or
    /// `table_analysis`).
    pub provenance: String,
    pub confidence: f64,
}

/// Per-document counters carried on the processed artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TextSummary {
    pub total_pages: usize,
    pub total_tables: usize,
    pub total_qa_pairs: usize,
}

/// A [`NormalizedRecord`] plus derived structure. Created once per record
/// by the annotator and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedRecord {
    #[serde(flatten)]
    pub record: NormalizedRecord,
    pub processed_at: DateTime<Utc>,
    pub sections: BTreeMap<String, Vec<SectionHit>>,
    /// Metric kind to distinct matched literals. Kinds with zero matches
    /// are omitted entirely.
    pub metrics: BTreeMap<String, BTreeSet<String>>,
    pub qa_pairs: Vec<QaPair>,
    pub text_summary: TextSummary,
}

/// Entry in the training dataset's per-document index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub file_path: String,
    pub sections: Vec<String>,
    pub metrics_count: usize,
    pub qa_pairs_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub created_at: DateTime<Utc>,
    pub total_documents: usize,
    pub total_qa_pairs: usize,
    pub version: String,
}

/// Aggregated corpus handed to the external narrative generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDataset {
    pub metadata: DatasetMetadata,
    pub qa_pairs: Vec<QaPair>,
    pub documents: Vec<DocumentSummary>,
}

impl TrainingDataset {
    /// An empty corpus, used when the dataset artifact is absent.
    pub fn empty() -> Self {
        Self {
            metadata: DatasetMetadata {
                created_at: Utc::now(),
                total_documents: 0,
                total_qa_pairs: 0,
                version: "1.0".to_string(),
            },
            qa_pairs: Vec::new(),
            documents: Vec::new(),
        }
    }
}
