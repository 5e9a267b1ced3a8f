//! Pipeline diagnostics reporting.
//!
//! Components receive an explicit [`DiagnosticsSink`] instead of writing to
//! a process-wide logger. Events are emitted on **stderr** by the default
//! sink so stdout remains parseable for scripts.

use std::io::Write;
use std::path::PathBuf;

/// A single observable event from the acquisition or extraction pipeline.
#[derive(Clone, Debug)]
pub enum PipelineEvent {
    /// A remote reference is being resolved.
    Resolving { url: String },
    /// A single-file download is starting.
    Downloading { id: String },
    /// Bytes landed on disk.
    Downloaded { path: PathBuf, bytes: u64 },
    /// A confirmation interstitial was detected and its secondary link followed.
    InterstitialBypassed { id: String },
    /// An interstitial had no secondary link; the HTML body was kept as-is.
    InterstitialKept { id: String },
    /// A collection download stage finished with the given file count.
    CollectionStage { stage: &'static str, files: usize },
    /// One collection member failed; the collection continues.
    ItemFailed { id: String, reason: String },
    /// A file is being handed to an extractor.
    Extracting { path: PathBuf },
    /// Extraction of one file failed; the batch continues.
    ExtractFailed { path: PathBuf, reason: String },
    /// A cancellation signal was observed at the named point.
    Cancelled { at: &'static str },
}

/// Receives pipeline events. Implementations must be shareable across the
/// acquisition and batch stages.
pub trait DiagnosticsSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Human-oriented diagnostics on stderr, one line per event.
pub struct StderrSink;

impl DiagnosticsSink for StderrSink {
    fn emit(&self, event: PipelineEvent) {
        let line = match &event {
            PipelineEvent::Resolving { url } => format!("resolve {}\n", url),
            PipelineEvent::Downloading { id } => format!("download {}  fetching...\n", id),
            PipelineEvent::Downloaded { path, bytes } => {
                format!("download {}  {} bytes\n", path.display(), bytes)
            }
            PipelineEvent::InterstitialBypassed { id } => {
                format!("download {}  interstitial bypassed\n", id)
            }
            PipelineEvent::InterstitialKept { id } => {
                format!("download {}  interstitial kept as body\n", id)
            }
            PipelineEvent::CollectionStage { stage, files } => {
                format!("collection {}  {} files\n", stage, files)
            }
            PipelineEvent::ItemFailed { id, reason } => {
                format!("item {}  failed: {}\n", id, reason)
            }
            PipelineEvent::Extracting { path } => format!("extract {}\n", path.display()),
            PipelineEvent::ExtractFailed { path, reason } => {
                format!("extract {}  failed: {}\n", path.display(), reason)
            }
            PipelineEvent::Cancelled { at } => format!("cancelled at {}\n", at),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
    }
}

/// Discards all events. Used by tests and embedders that bring their own
/// reporting.
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn emit(&self, _event: PipelineEvent) {}
}
