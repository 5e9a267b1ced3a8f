//! CSV extraction.
//!
//! A CSV file is treated as a single-sheet workbook: the header row maps
//! every following row into header-to-value pairs under the implicit sheet
//! name `data`. Unlike worksheet cells, CSV fields are always present, so
//! empty fields are kept as empty strings.

use std::collections::BTreeMap;
use std::path::Path;

use crate::extract::ExtractError;
use crate::models::{NormalizedRecord, SheetRows};

pub fn extract(path: &Path) -> Result<NormalizedRecord, ExtractError> {
    let mut reader =
        csv::Reader::from_path(path).map_err(|e| ExtractError::Csv(e.to_string()))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ExtractError::Csv(e.to_string()))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if h.trim().is_empty() {
                format!("column_{}", i)
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut rows: SheetRows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ExtractError::Csv(e.to_string()))?;
        let mut mapped = BTreeMap::new();
        for (i, field) in record.iter().enumerate() {
            let header = headers
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("column_{}", i));
            mapped.insert(header, field.to_string());
        }
        rows.push(mapped);
    }

    let mut tabular = BTreeMap::new();
    tabular.insert("data".to_string(), rows);

    let mut record = NormalizedRecord::new(path);
    record.tabular_rows = Some(tabular);
    Ok(record)
}
