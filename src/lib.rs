//! # docharvest
//!
//! A document acquisition and normalization pipeline.
//!
//! docharvest fetches documents from a remote file-sharing service (with an
//! interstitial-bypass and multi-stage collection fallback), resolves each
//! file's format by extension or content sniffing, extracts it into a
//! format-independent [`models::NormalizedRecord`], and annotates the result
//! with report sections, quantitative metrics, and synthesized
//! question/answer pairs ready for dataset aggregation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Fetcher    │──▶│  Extractors  │──▶│  Annotator   │
//! │ HTTP + sniff │   │ pdf/docx/doc │   │ sections,    │
//! │ + fallbacks  │   │ xlsx/xls/csv │   │ metrics, QA  │
//! └──────────────┘   └──────┬───────┘   └──────┬───────┘
//!                           │                  │
//!                           ▼                  ▼
//!                    ┌──────────────┐   ┌──────────────┐
//!                    │    Batch     │   │   Dataset    │
//!                    │  directory   │   │ JSON output  │
//!                    └──────────────┘   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`fetch`] | Remote acquisition with fallback chains |
//! | [`sniff`] | Content-based format detection |
//! | [`extract`] | Format resolution and extractor dispatch |
//! | [`extract_pdf`] | Page-oriented PDF extraction |
//! | [`extract_docx`] | OOXML word-processing extraction |
//! | [`extract_doc`] | Legacy `.doc` strategy chain |
//! | [`extract_sheet`] | Workbook extraction, modern and legacy |
//! | [`extract_csv`] | CSV extraction |
//! | [`annotate`] | Sections, metrics, and QA synthesis |
//! | [`batch`] | Directory sweep with failure accounting |
//! | [`dataset`] | JSON artifacts and dataset aggregation |
//! | [`diag`] | Pipeline diagnostics sinks |
//! | [`cancel`] | Cooperative cancellation |

pub mod annotate;
pub mod batch;
pub mod cancel;
pub mod config;
pub mod dataset;
pub mod diag;
pub mod extract;
pub mod extract_csv;
pub mod extract_doc;
pub mod extract_docx;
pub mod extract_pdf;
pub mod extract_sheet;
pub mod fetch;
pub mod models;
pub mod sniff;
