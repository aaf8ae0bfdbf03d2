use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_data_directory")]
    pub data_directory: String,
    /// Holding area for uploaded PDFs; `<data_directory>/uploads` when unset.
    #[serde(default)]
    pub upload_directory: Option<String>,
    /// One `page_{id}.png` per stored page; `<data_directory>/pages` when unset.
    #[serde(default)]
    pub pages_directory: Option<String>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub raster: RasterConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_data_directory() -> String {
    dirs::home_dir()
        .map(|h| h.join(".pagevault"))
        .unwrap_or_else(|| PathBuf::from(".pagevault"))
        .to_string_lossy()
        .into_owned()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_directory: default_data_directory(),
            upload_directory: None,
            pages_directory: None,
            store: StoreConfig::default(),
            raster: RasterConfig::default(),
            ocr: OcrConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Config {
    /// Builds a default config rooted at `data_directory`.
    pub fn with_data_directory<P: Into<PathBuf>>(data_directory: P) -> Self {
        Self {
            data_directory: data_directory.into().to_string_lossy().into_owned(),
            ..Self::default()
        }
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_directory)
    }

    pub fn upload_path(&self) -> PathBuf {
        match &self.upload_directory {
            Some(dir) => PathBuf::from(dir),
            None => self.data_path().join("uploads"),
        }
    }

    pub fn pages_path(&self) -> PathBuf {
        match &self.pages_directory {
            Some(dir) => PathBuf::from(dir),
            None => self.data_path().join("pages"),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        match &self.store.path {
            Some(path) => PathBuf::from(path),
            None => self.data_path().join(self.store.backend.default_file_name()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Json,
    Sqlite,
}

impl StoreBackend {
    fn default_file_name(self) -> &'static str {
        match self {
            StoreBackend::Json => "page_data.json",
            StoreBackend::Sqlite => "pagevault.db",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterConfig {
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm_path: String,
}

fn default_dpi() -> u32 {
    300
}

fn default_pdftoppm() -> String {
    "pdftoppm".to_string()
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            dpi: default_dpi(),
            pdftoppm_path: default_pdftoppm(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackendKind {
    Local,
    Cloud,
}

impl OcrBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrBackendKind::Local => "local",
            OcrBackendKind::Cloud => "cloud",
        }
    }
}

impl std::fmt::Display for OcrBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Preference order; the first available backend is tried first.
    #[serde(default = "default_backends")]
    pub backends: Vec<OcrBackendKind>,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default)]
    pub cloud: CloudOcrConfig,
}

fn default_backends() -> Vec<OcrBackendKind> {
    vec![OcrBackendKind::Local, OcrBackendKind::Cloud]
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            languages: default_languages(),
            cloud: CloudOcrConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudOcrConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://vision.googleapis.com/v1/images:annotate".to_string()
}

fn default_api_key_env_var() -> Option<String> {
    Some("GOOGLE_VISION_API_KEY".to_string())
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for CloudOcrConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Word-overlap ratio above which two pages count as the same text.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// How long finished jobs stay queryable.
    #[serde(default = "default_job_retention_secs")]
    pub job_retention_secs: u64,
}

fn default_max_upload_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_max_concurrent_jobs() -> usize {
    num_cpus::get()
}

fn default_similarity_threshold() -> f64 {
    0.9
}

fn default_job_retention_secs() -> u64 {
    3600
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            similarity_threshold: default_similarity_threshold(),
            job_retention_secs: default_job_retention_secs(),
        }
    }
}
