//! Remote acquisition manager.
//!
//! Resolves shareable-link identifiers, fetches file bytes over HTTPS, and
//! bypasses confirmation interstitials (an HTML page returned in place of
//! file bytes). Collection downloads run through an ordered fallback chain:
//! an external bulk tool, manual enumeration of pre-known member ids, and a
//! recovery scan of the destination directory. Per-item failures never abort
//! a collection; each network call is attempted exactly once.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::cancel::CancelFlag;
use crate::config::AcquisitionConfig;
use crate::diag::{DiagnosticsSink, PipelineEvent, StderrSink};
use crate::models::{
    FormatKind, NormalizedRecord, ReferenceKind, RetrievedFile, SourceReference,
};
use crate::sniff::{ByteSignatureSniffer, SignatureSniffer};

/// Acquisition error taxonomy. Reference errors are terminal; HTTP and IO
/// errors are terminal for a single item only.
#[derive(Debug)]
pub enum AcquireError {
    /// The URL matches none of the known shapes and has no `id` parameter.
    UnresolvableReference(String),
    /// A collection URL without the expected collection-path marker.
    InvalidCollectionReference(String),
    Http(String),
    Io(String),
}

impl std::fmt::Display for AcquireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquireError::UnresolvableReference(url) => {
                write!(f, "could not extract file id from URL: {}", url)
            }
            AcquireError::InvalidCollectionReference(url) => {
                write!(f, "invalid collection URL format: {}", url)
            }
            AcquireError::Http(e) => write!(f, "download failed: {}", e),
            AcquireError::Io(e) => write!(f, "file write failed: {}", e),
        }
    }
}

impl std::error::Error for AcquireError {}

/// External bulk-download capability over a whole collection. Success or
/// failure is observed by scanning the destination directory afterward, not
/// via the return value.
pub trait BulkDownloader: Send + Sync {
    fn fetch_collection(&self, collection_url: &str, dest: &Path) -> anyhow::Result<()>;
}

static INTERSTITIAL_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="([^"]*export=download[^"]*)""#).expect("interstitial link pattern")
});

/// First `href` attribute in the HTML body whose value carries the
/// export-download marker.
pub(crate) fn find_interstitial_link(html: &str) -> Option<String> {
    INTERSTITIAL_LINK
        .captures(html)
        .map(|c| c[1].replace("&amp;", "&"))
}

fn strip_query(token: &str) -> &str {
    token.split('?').next().unwrap_or(token)
}

/// Extract the file identifier from any of the known URL shapes:
/// path-embedded (`/file/d/<id>`), `open?id=`, `uc?id=`, or a generic `id`
/// query parameter. A bare, already-resolved identifier resolves to itself,
/// so the function is idempotent over its own output. Trailing `?...`
/// fragments are stripped from the extracted token.
pub fn extract_file_id(url: &str) -> Result<String, AcquireError> {
    if let Some((_, rest)) = url.split_once("/file/d/") {
        let token = strip_query(rest.split('/').next().unwrap_or(""));
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }

    if let Some((_, rest)) = url
        .split_once("open?id=")
        .or_else(|| url.split_once("uc?id="))
    {
        let token = strip_query(rest.split('&').next().unwrap_or(""));
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }

    if let Some((_, query)) = url.split_once('?') {
        for pair in query.split('&') {
            if let Some(value) = pair.strip_prefix("id=") {
                let token = strip_query(value);
                if !token.is_empty() {
                    return Ok(token.to_string());
                }
            }
        }
    }

    // An already-resolved identifier carries no path or query structure.
    if !url.is_empty() && !url.contains('/') && !url.contains('?') && !url.contains('=') {
        return Ok(url.to_string());
    }

    Err(AcquireError::UnresolvableReference(url.to_string()))
}

/// Extract the collection identifier from a `/folders/` URL.
pub fn extract_collection_id(url: &str) -> Result<String, AcquireError> {
    let Some((_, rest)) = url.split_once("/folders/") else {
        return Err(AcquireError::InvalidCollectionReference(url.to_string()));
    };
    let token = strip_query(rest.split('/').next().unwrap_or(""));
    if token.is_empty() {
        return Err(AcquireError::InvalidCollectionReference(url.to_string()));
    }
    Ok(token.to_string())
}

/// Default saved name for a single-file download, with an extension hint
/// when the identifier itself ends in a known extension token.
fn default_file_name(id: &str) -> String {
    let base = format!("downloaded_file_{}", id);
    let lower = id.to_ascii_lowercase();
    for ext in ["pdf", "docx", "xlsx", "csv", "txt"] {
        if lower.ends_with(ext) {
            return format!("{}.{}", base, ext);
        }
    }
    base
}

pub struct Fetcher {
    client: reqwest::blocking::Client,
    config: AcquisitionConfig,
    sniffer: Option<Box<dyn SignatureSniffer>>,
    bulk: Option<Box<dyn BulkDownloader>>,
    diag: Box<dyn DiagnosticsSink>,
}

impl Fetcher {
    /// Create a fetcher with the built-in byte-signature sniffer, no bulk
    /// downloader, and stderr diagnostics.
    pub fn new(config: AcquisitionConfig) -> Result<Self, AcquireError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AcquireError::Http(e.to_string()))?;
        Ok(Self {
            client,
            config,
            sniffer: Some(Box::new(ByteSignatureSniffer)),
            bulk: None,
            diag: Box::new(StderrSink),
        })
    }

    /// Replace or remove the content sniffer. With `None` downloaded files
    /// always keep their original name.
    pub fn with_sniffer(mut self, sniffer: Option<Box<dyn SignatureSniffer>>) -> Self {
        self.sniffer = sniffer;
        self
    }

    pub fn with_bulk_downloader(mut self, bulk: Box<dyn BulkDownloader>) -> Self {
        self.bulk = Some(bulk);
        self
    }

    pub fn with_diagnostics(mut self, diag: Box<dyn DiagnosticsSink>) -> Self {
        self.diag = diag;
        self
    }

    /// Classify a URL as a file or collection reference and resolve its
    /// identifier. Decoding failure is terminal, never a partial result.
    pub fn resolve_reference(&self, url: &str) -> Result<SourceReference, AcquireError> {
        self.diag.emit(PipelineEvent::Resolving {
            url: url.to_string(),
        });
        if url.contains("/folders/") {
            Ok(SourceReference {
                raw: url.to_string(),
                id: extract_collection_id(url)?,
                kind: ReferenceKind::Collection,
            })
        } else {
            Ok(SourceReference {
                raw: url.to_string(),
                id: extract_file_id(url)?,
                kind: ReferenceKind::File,
            })
        }
    }

    /// Canonical direct-download URL for a resolved identifier.
    pub fn direct_download_url(&self, id: &str) -> String {
        format!(
            "{}/uc?export=download&id={}",
            self.config.service_base_url.trim_end_matches('/'),
            id
        )
    }

    /// Download a single file, bypassing a confirmation interstitial when
    /// one is returned. Saved under a deterministic name derived from the
    /// identifier unless `filename` is given; a successful sniff renames
    /// the file to carry the matching extension.
    pub fn download_file(
        &self,
        url: &str,
        filename: Option<&str>,
    ) -> Result<RetrievedFile, AcquireError> {
        let id = extract_file_id(url)?;
        self.diag
            .emit(PipelineEvent::Downloading { id: id.clone() });

        fs::create_dir_all(&self.config.download_dir)
            .map_err(|e| AcquireError::Io(e.to_string()))?;

        let name = filename
            .map(str::to_string)
            .unwrap_or_else(|| default_file_name(&id));
        let mut path = self.config.download_dir.join(name);
        let bytes = self.fetch_to_path(&id, &path)?;

        let mut format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(FormatKind::from_extension);

        // Best-effort rename by detected signature; failure keeps the name.
        if let Some(sniffer) = &self.sniffer {
            if let Ok(data) = fs::read(&path) {
                if let Some(kind) = sniffer.sniff(&data) {
                    let renamed = path.with_extension(kind.extension());
                    if renamed == path || fs::rename(&path, &renamed).is_ok() {
                        path = renamed;
                        format = Some(kind);
                    }
                }
            }
        }

        self.diag.emit(PipelineEvent::Downloaded {
            path: path.clone(),
            bytes,
        });
        Ok(RetrievedFile {
            path,
            format,
            bytes,
        })
    }

    /// Download every member of a collection through the fallback chain.
    /// Each stage runs only if the previous produced zero files; an empty
    /// result after all three stages is `Ok(vec![])`, not an error.
    pub fn download_collection(
        &self,
        url: &str,
        cancel: &CancelFlag,
    ) -> Result<Vec<RetrievedFile>, AcquireError> {
        let folder_id = extract_collection_id(url)?;
        let dest = self
            .config
            .download_dir
            .join(format!("folder_{}", folder_id));
        fs::create_dir_all(&dest).map_err(|e| AcquireError::Io(e.to_string()))?;

        if let Some(bulk) = &self.bulk {
            let clean_url = url.split('?').next().unwrap_or(url);
            if let Err(e) = bulk.fetch_collection(clean_url, &dest) {
                self.diag.emit(PipelineEvent::ItemFailed {
                    id: folder_id.clone(),
                    reason: e.to_string(),
                });
            }
            let found = scan_files(&dest);
            self.diag.emit(PipelineEvent::CollectionStage {
                stage: "bulk",
                files: found.len(),
            });
            if !found.is_empty() {
                return Ok(found);
            }
        }

        let mut files = Vec::new();
        for (i, member) in self.config.manual_members.iter().enumerate() {
            if cancel.is_cancelled() {
                self.diag.emit(PipelineEvent::Cancelled { at: "collection" });
                break;
            }
            let name = format!("file_{:02}_{}.{}", i + 1, member.id, member.extension);
            let path = dest.join(name);
            match self.fetch_to_path(&member.id, &path) {
                Ok(bytes) => files.push(RetrievedFile {
                    format: FormatKind::from_extension(&member.extension),
                    path,
                    bytes,
                }),
                Err(e) => {
                    self.diag.emit(PipelineEvent::ItemFailed {
                        id: member.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        self.diag.emit(PipelineEvent::CollectionStage {
            stage: "manual",
            files: files.len(),
        });
        if !files.is_empty() {
            return Ok(files);
        }

        // Recovery: pick up anything partially written by earlier stages.
        let found = scan_files(&dest);
        self.diag.emit(PipelineEvent::CollectionStage {
            stage: "recovery",
            files: found.len(),
        });
        Ok(found)
    }

    /// Acquire a reference and run format resolution over every retrieved
    /// file. Files that disappear or fail to extract are skipped, never
    /// aborting the batch.
    pub fn download_and_process(
        &self,
        reference: &SourceReference,
        cancel: &CancelFlag,
    ) -> Result<Vec<NormalizedRecord>, AcquireError> {
        let files = match reference.kind {
            ReferenceKind::File => vec![self.download_file(&reference.raw, None)?],
            ReferenceKind::Collection => self.download_collection(&reference.raw, cancel)?,
        };

        let mut records = Vec::new();
        for file in files {
            if !file.path.exists() {
                continue;
            }
            self.diag.emit(PipelineEvent::Extracting {
                path: file.path.clone(),
            });
            match crate::extract::process_file(&file.path) {
                Ok(record) => records.push(record),
                Err(e) => self.diag.emit(PipelineEvent::ExtractFailed {
                    path: file.path.clone(),
                    reason: e.to_string(),
                }),
            }
        }
        Ok(records)
    }

    /// Issue the direct-download GET for `id` and stream the response body
    /// to `dest`. An HTML response is treated as a confirmation
    /// interstitial: its embedded secondary link is followed when present;
    /// otherwise the HTML body itself is persisted (documented behavior,
    /// not escalated to a failure).
    fn fetch_to_path(&self, id: &str, dest: &Path) -> Result<u64, AcquireError> {
        let url = self.direct_download_url(id);
        let resp = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| AcquireError::Http(e.to_string()))?;

        let is_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/html"));

        if !is_html {
            return write_stream(resp, dest);
        }

        let body = resp.text().map_err(|e| AcquireError::Http(e.to_string()))?;
        match find_interstitial_link(&body) {
            Some(link) => {
                let link = if link.starts_with('/') {
                    format!(
                        "{}{}",
                        self.config.service_base_url.trim_end_matches('/'),
                        link
                    )
                } else {
                    link
                };
                let resp = self
                    .client
                    .get(&link)
                    .send()
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| AcquireError::Http(e.to_string()))?;
                self.diag.emit(PipelineEvent::InterstitialBypassed {
                    id: id.to_string(),
                });
                write_stream(resp, dest)
            }
            None => {
                // Some small files legitimately have no interstitial; keep
                // whatever bytes came back.
                fs::write(dest, body.as_bytes()).map_err(|e| AcquireError::Io(e.to_string()))?;
                self.diag
                    .emit(PipelineEvent::InterstitialKept { id: id.to_string() });
                Ok(body.len() as u64)
            }
        }
    }
}

fn write_stream(mut resp: reqwest::blocking::Response, dest: &Path) -> Result<u64, AcquireError> {
    let mut file = fs::File::create(dest).map_err(|e| AcquireError::Io(e.to_string()))?;
    resp.copy_to(&mut file)
        .map_err(|e| AcquireError::Http(e.to_string()))
}

/// All regular files under `dir`, sorted for deterministic ordering.
fn scan_files(dir: &Path) -> Vec<RetrievedFile> {
    let mut files: Vec<RetrievedFile> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let path: PathBuf = e.path().to_path_buf();
            let format = path
                .extension()
                .and_then(|x| x.to_str())
                .and_then(FormatKind::from_extension);
            let bytes = e.metadata().map(|m| m.len()).unwrap_or(0);
            RetrievedFile {
                path,
                format,
                bytes,
            }
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::NullSink;

    #[test]
    fn file_id_from_path_embedded_url() {
        let id = extract_file_id("https://drive.google.com/file/d/1AbC_dEf/view?usp=sharing")
            .unwrap();
        assert_eq!(id, "1AbC_dEf");
    }

    #[test]
    fn file_id_from_open_and_uc_shapes() {
        assert_eq!(
            extract_file_id("https://drive.google.com/open?id=1xyz&authuser=0").unwrap(),
            "1xyz"
        );
        assert_eq!(
            extract_file_id("https://drive.google.com/uc?id=1xyz").unwrap(),
            "1xyz"
        );
    }

    #[test]
    fn file_id_from_generic_query_parameter() {
        assert_eq!(
            extract_file_id("https://example.com/download?foo=1&id=1pqr").unwrap(),
            "1pqr"
        );
    }

    #[test]
    fn file_id_strips_trailing_query_fragment() {
        assert_eq!(
            extract_file_id("https://drive.google.com/file/d/1abc?usp=drivesdk").unwrap(),
            "1abc"
        );
    }

    #[test]
    fn file_id_extraction_is_idempotent() {
        let id = extract_file_id("https://drive.google.com/file/d/1AbC/view").unwrap();
        assert_eq!(extract_file_id(&id).unwrap(), id);
    }

    #[test]
    fn unresolvable_url_is_an_error() {
        let err = extract_file_id("https://example.com/nothing/here").unwrap_err();
        assert!(matches!(err, AcquireError::UnresolvableReference(_)));
    }

    #[test]
    fn collection_id_requires_folders_segment() {
        let err = extract_collection_id("https://drive.google.com/drive/u/0/my-drive")
            .unwrap_err();
        assert!(matches!(err, AcquireError::InvalidCollectionReference(_)));
        assert_eq!(
            extract_collection_id("https://drive.google.com/drive/folders/1Fff?usp=sharing")
                .unwrap(),
            "1Fff"
        );
    }

    #[test]
    fn default_name_carries_identifier_extension_hint() {
        assert_eq!(default_file_name("1abc"), "downloaded_file_1abc");
        assert_eq!(
            default_file_name("1abcPDF"),
            "downloaded_file_1abcPDF.pdf"
        );
    }

    #[test]
    fn interstitial_link_takes_first_export_download_href() {
        let html = r#"<a href="/other">x</a>
            <a href="/uc?export=download&amp;id=1abc&amp;confirm=t">Download anyway</a>
            <a href="/uc?export=download&amp;id=2def">second</a>"#;
        let link = find_interstitial_link(html).unwrap();
        assert_eq!(link, "/uc?export=download&id=1abc&confirm=t");
        assert!(find_interstitial_link("<html>no links</html>").is_none());
    }

    #[test]
    fn invalid_collection_reference_creates_no_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let download_dir = tmp.path().join("input");
        let config = AcquisitionConfig {
            download_dir: download_dir.clone(),
            ..Default::default()
        };
        let fetcher = Fetcher::new(config)
            .unwrap()
            .with_diagnostics(Box::new(NullSink));
        let err = fetcher
            .download_collection("https://drive.google.com/drive/my-drive", &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, AcquireError::InvalidCollectionReference(_)));
        assert!(!download_dir.exists());
    }

    #[test]
    fn direct_url_has_canonical_shape() {
        let config = AcquisitionConfig::default();
        let fetcher = Fetcher::new(config).unwrap();
        assert_eq!(
            fetcher.direct_download_url("1abc"),
            "https://drive.google.com/uc?export=download&id=1abc"
        );
    }
}
