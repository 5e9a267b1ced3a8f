//! Structural annotation of normalized records.
//!
//! Scans the joined text for report-section headings and quantitative
//! metrics, then synthesizes question/answer pairs from the document body
//! and from any extracted tables. Annotation is pure with respect to its
//! input: the same record always yields the same sections, metrics, and
//! question/answer pairs (`processed_at` is the only varying field).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use crate::models::{
    AnnotatedRecord, NormalizedRecord, QaPair, SectionHit, Table, TextSummary,
};

/// Section label and its heading pattern, in reporting order.
static SECTION_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("executive_summary", r"(?i)(executive\s+summary|summary|overview)"),
        ("introduction", r"(?i)(introduction|background|context)"),
        ("methodology", r"(?i)(methodology|methods|approach)"),
        ("results", r"(?i)(results|findings|analysis)"),
        ("conclusion", r"(?i)(conclusion|conclusions|summary)"),
        ("recommendations", r"(?i)(recommendations|suggestions|next\s+steps)"),
    ]
    .into_iter()
    .map(|(label, pattern)| (label, Regex::new(pattern).expect("section pattern")))
    .collect()
});

static METRIC_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("percentage", r"(\d+(?:\.\d+)?\s*%)"),
        ("currency", r"(\$[\d,]+(?:\.\d{2})?)"),
        ("numbers", r"(\d+(?:,\d{3})*(?:\.\d+)?)"),
        ("dates", r"(\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}-\d{2}-\d{2})"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("metric pattern")))
    .collect()
});

const BASIC_QUESTIONS: [&str; 5] = [
    "What is the main topic of this document?",
    "What are the key findings?",
    "What are the main conclusions?",
    "What recommendations are provided?",
    "What methodology was used?",
];

/// Characters of leading context kept before a section heading match.
const EXCERPT_BEFORE: usize = 100;
/// Characters of excerpt kept after the match position.
const EXCERPT_AFTER: usize = 1000;

pub fn annotate(record: &NormalizedRecord) -> AnnotatedRecord {
    let text = record.joined_text();

    let sections = find_sections(&text);
    let metrics = find_metrics(&text);
    let mut qa_pairs = basic_qa(&text);
    for table in &record.tables {
        qa_pairs.extend(table_qa(table));
    }

    let text_summary = TextSummary {
        total_pages: record.text_units.len(),
        total_tables: record.tables.len(),
        total_qa_pairs: qa_pairs.len(),
    };

    AnnotatedRecord {
        record: record.clone(),
        processed_at: Utc::now(),
        sections,
        metrics,
        qa_pairs,
        text_summary,
    }
}

fn find_sections(text: &str) -> BTreeMap<String, Vec<SectionHit>> {
    let mut sections = BTreeMap::new();
    for (label, pattern) in SECTION_PATTERNS.iter() {
        let hits: Vec<SectionHit> = pattern
            .find_iter(text)
            .map(|m| SectionHit {
                excerpt: excerpt_around(text, m.start()),
                start_offset: m.start(),
            })
            .collect();
        if !hits.is_empty() {
            sections.insert((*label).to_string(), hits);
        }
    }
    sections
}

fn find_metrics(text: &str) -> BTreeMap<String, BTreeSet<String>> {
    let mut metrics = BTreeMap::new();
    for (kind, pattern) in METRIC_PATTERNS.iter() {
        let values: BTreeSet<String> = pattern
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        if !values.is_empty() {
            metrics.insert((*kind).to_string(), values);
        }
    }
    metrics
}

// The question set is fixed and always produced, even for documents with
// no free text (spreadsheets answer with an empty lead).
fn basic_qa(text: &str) -> Vec<QaPair> {
    let lead: String = text.chars().take(200).collect();
    BASIC_QUESTIONS
        .iter()
        .map(|question| QaPair {
            question: (*question).to_string(),
            answer: format!("Based on the document content: {}...", lead),
            provenance: "document_analysis".to_string(),
            confidence: 0.8,
        })
        .collect()
}

/// Column and row-count questions for a table with at least a header row
/// and one data row.
fn table_qa(table: &Table) -> Vec<QaPair> {
    if table.rows.len() < 2 {
        return Vec::new();
    }
    let location = match table.page {
        Some(page) => format!("on page {}", page),
        None => format!("in table {}", table.index),
    };

    let mut pairs = Vec::new();
    let headers: Vec<&str> = table.rows[0]
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .collect();
    if !headers.is_empty() {
        pairs.push(QaPair {
            question: format!("What are the columns in the table {}?", location),
            answer: format!(
                "The table has the following columns: {}",
                headers.join(", ")
            ),
            provenance: "table_analysis".to_string(),
            confidence: 0.9,
        });
    }
    pairs.push(QaPair {
        question: format!("How many rows are in the table {}?", location),
        answer: format!("The table has {} data rows.", table.rows.len() - 1),
        provenance: "table_analysis".to_string(),
        confidence: 0.95,
    });
    pairs
}

/// A trimmed window around a match: up to [`EXCERPT_BEFORE`] characters of
/// context before it and [`EXCERPT_AFTER`] after, snapped to char
/// boundaries.
fn excerpt_around(text: &str, position: usize) -> String {
    let start = floor_char_boundary(text, position.saturating_sub(EXCERPT_BEFORE));
    let end = floor_char_boundary(text, (position + EXCERPT_AFTER).min(text.len()));
    text[start..end].trim().to_string()
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
