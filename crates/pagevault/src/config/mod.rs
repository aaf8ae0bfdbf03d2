pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, load_config_or_default, validate_config};
pub use schema::{
    CloudOcrConfig, Config, IngestConfig, OcrBackendKind, OcrConfig, RasterConfig, StoreBackend,
    StoreConfig,
};

/// Returns the canonical config path: `~/.pagevault/config.json`.
pub fn default_config_path() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|h| h.join(".pagevault").join("config.json"))
}
