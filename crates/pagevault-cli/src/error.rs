use std::path::PathBuf;

use pagevault::{ConfigError, PagevaultError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Library(#[from] PagevaultError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read '{path}': {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("{failed} of {total} uploads were not ingested")]
    IngestFailed { failed: usize, total: usize },
}
