use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            acquisition: AcquisitionConfig::default(),
            processing: ProcessingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    /// Base URL of the file-sharing service.
    #[serde(default = "default_service_base_url")]
    pub service_base_url: String,
    /// Directory downloaded files are written to.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Pre-known collection members for the manual enumeration fallback:
    /// identifier plus the extension the member is saved with.
    #[serde(default)]
    pub manual_members: Vec<ManualMember>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            service_base_url: default_service_base_url(),
            download_dir: default_download_dir(),
            manual_members: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ManualMember {
    pub id: String,
    /// Extension without the dot, e.g. `"pdf"`.
    pub extension: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingConfig {
    /// Extensions (with leading dot) accepted by batch processing.
    #[serde(default = "default_supported_extensions")]
    pub supported_extensions: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Files larger than this are skipped and counted as failures.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            supported_extensions: default_supported_extensions(),
            exclude_globs: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// Directory JSON artifacts are written to.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_service_base_url() -> String {
    "https://drive.google.com".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("data/input")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/output")
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_supported_extensions() -> Vec<String> {
    [".pdf", ".docx", ".doc", ".xlsx", ".xls", ".csv", ".txt"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_file_bytes() -> u64 {
    100 * 1024 * 1024
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.acquisition.timeout_secs == 0 {
        anyhow::bail!("acquisition.timeout_secs must be > 0");
    }

    if config.acquisition.service_base_url.trim().is_empty() {
        anyhow::bail!("acquisition.service_base_url must not be empty");
    }

    for member in &config.acquisition.manual_members {
        if member.id.trim().is_empty() {
            anyhow::bail!("acquisition.manual_members entries must have a non-empty id");
        }
        if member.extension.trim().is_empty() || member.extension.starts_with('.') {
            anyhow::bail!(
                "manual member '{}': extension must be given without a dot",
                member.id
            );
        }
    }

    if config.processing.supported_extensions.is_empty() {
        anyhow::bail!("processing.supported_extensions must not be empty");
    }

    for ext in &config.processing.supported_extensions {
        if !ext.starts_with('.') {
            anyhow::bail!("supported extension '{}' must start with a dot", ext);
        }
    }

    if config.processing.max_file_bytes == 0 {
        anyhow::bail!("processing.max_file_bytes must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn defaults_apply_for_empty_config() {
        let f = write_config("");
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.acquisition.service_base_url, "https://drive.google.com");
        assert!(config
            .processing
            .supported_extensions
            .contains(&".pdf".to_string()));
        assert!(config.acquisition.manual_members.is_empty());
    }

    #[test]
    fn manual_members_parse_as_id_extension_pairs() {
        let f = write_config(
            r#"
[[acquisition.manual_members]]
id = "1abcDEF"
extension = "pdf"

[[acquisition.manual_members]]
id = "2ghiJKL"
extension = "doc"
"#,
        );
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.acquisition.manual_members.len(), 2);
        assert_eq!(config.acquisition.manual_members[0].id, "1abcDEF");
        assert_eq!(config.acquisition.manual_members[1].extension, "doc");
    }

    #[test]
    fn dotted_member_extension_is_rejected() {
        let f = write_config(
            r#"
[[acquisition.manual_members]]
id = "1abc"
extension = ".pdf"
"#,
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let f = write_config("[acquisition]\ntimeout_secs = 0\n");
        assert!(load_config(f.path()).is_err());
    }
}
