use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PagevaultError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rasterization error: {0}")]
    Raster(#[from] RasterError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Upload too large: {size} bytes exceeds the limit of {limit} bytes")]
    UploadTooLarge { size: u64, limit: u64 },

    #[error("Failed to save upload to '{path}': {source}")]
    SaveUpload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Too many ingestion jobs running (limit {limit})")]
    TooManyJobs { limit: usize },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Page not found: {0}")]
    PageNotFound(String),
}

impl PagevaultError {
    /// True for the lookup failures a caller should report as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PagevaultError::JobNotFound(_) | PagevaultError::PageNotFound(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("Unreadable PDF '{path}': {reason}")]
    UnreadablePdf { path: PathBuf, reason: String },

    #[error("Failed to render page {page} of '{path}': {reason}")]
    Render {
        path: PathBuf,
        page: u32,
        reason: String,
    },

    #[error("Failed to prepare raster output directory '{path}': {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read page store '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write page store '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Page store '{path}' is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Failed to serialize page store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to read page image '{path}': {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn ingestion thread: {0}")]
    Spawn(String),
}

pub type Result<T> = std::result::Result<T, PagevaultError>;
