pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod library;
pub mod ocr;
pub mod raster;
pub mod sanitize;
pub mod search;
pub mod secrets;
pub mod store;

pub use config::{load_config, load_config_or_default, Config};
pub use dedup::{DuplicateDetector, DuplicateReason, Verdict};
pub use error::{ConfigError, IngestError, PagevaultError, RasterError, Result, StoreError};
pub use extract::ExtractedFields;
pub use ingest::{IngestEvent, JobStatus, ProgressReport};
pub use library::{Library, PageView};
pub use ocr::{OcrBackend, OcrChain, OcrError};
pub use raster::{PageRasterizer, PopplerRasterizer};
pub use search::{SearchHit, SearchQuery};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use store::{PageId, PageRecord, PageStore};
