//! Turning page images into text.
//!
//! Backends sit behind [`OcrBackend`]; [`OcrChain`] tries them in a fixed
//! preference order and never fails: when every backend is unavailable or
//! errors, the page gets empty text and the failures are reported back.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::config::{OcrBackendKind, OcrConfig};

pub mod local;
pub mod vision;

pub use local::TesseractBackend;
pub use vision::VisionBackend;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    NotAvailable(String),

    #[error("OCR failed: {0}")]
    Failed(String),

    #[error("Failed to read image '{path}': {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image error: {0}")]
    Image(String),
}

pub trait OcrBackend: Send + Sync {
    fn kind(&self) -> OcrBackendKind;

    /// Whether the backend can run at all (engine installed, key configured).
    fn is_available(&self) -> bool;

    fn recognize(&self, image: &Path) -> Result<String, OcrError>;
}

/// Collapses whitespace runs to single spaces and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug)]
pub struct OcrFailure {
    pub backend: OcrBackendKind,
    pub error: OcrError,
}

#[derive(Debug)]
pub struct OcrOutcome {
    pub text: String,
    /// The backend that produced `text`; `None` when every backend failed.
    pub backend: Option<OcrBackendKind>,
    pub failures: Vec<OcrFailure>,
}

impl OcrOutcome {
    pub fn is_unavailable(&self) -> bool {
        self.backend.is_none()
    }
}

/// Clones share the "already warned" flags, so an unavailable backend is
/// reported once per chain rather than once per page.
#[derive(Clone, Default)]
pub struct OcrChain {
    backends: Vec<Arc<dyn OcrBackend>>,
    unavailable_warned: Arc<Vec<AtomicBool>>,
}

impl OcrChain {
    /// Backends are tried in the order given.
    pub fn new(backends: Vec<Arc<dyn OcrBackend>>) -> Self {
        let unavailable_warned =
            Arc::new(backends.iter().map(|_| AtomicBool::new(false)).collect());
        Self {
            backends,
            unavailable_warned,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        let backends = config
            .backends
            .iter()
            .map(|kind| -> Arc<dyn OcrBackend> {
                match kind {
                    OcrBackendKind::Local => Arc::new(TesseractBackend::new(&config.languages)),
                    OcrBackendKind::Cloud => Arc::new(VisionBackend::from_config(&config.cloud)),
                }
            })
            .collect();
        Self::new(backends)
    }

    pub fn kinds(&self) -> Vec<OcrBackendKind> {
        self.backends.iter().map(|b| b.kind()).collect()
    }

    /// Logs that backend `index` is unavailable: a warning the first time,
    /// debug afterwards. Returns whether the warning was emitted.
    fn report_unavailable(&self, index: usize, kind: OcrBackendKind) -> bool {
        let first = self
            .unavailable_warned
            .get(index)
            .is_some_and(|flag| !flag.swap(true, Ordering::Relaxed));
        if first {
            tracing::warn!(backend = %kind, "OCR backend unavailable, skipping (repeats logged at debug)");
        } else {
            tracing::debug!(backend = %kind, "OCR backend unavailable, skipping");
        }
        first
    }

    pub fn recognize(&self, image: &Path) -> OcrOutcome {
        let mut failures = Vec::new();

        for (index, backend) in self.backends.iter().enumerate() {
            let kind = backend.kind();
            if !backend.is_available() {
                self.report_unavailable(index, kind);
                failures.push(OcrFailure {
                    backend: kind,
                    error: OcrError::NotAvailable(format!("{} backend is not configured", kind)),
                });
                continue;
            }

            match backend.recognize(image) {
                Ok(text) => {
                    if !failures.is_empty() {
                        tracing::info!(backend = %kind, "OCR succeeded on fallback backend");
                    }
                    return OcrOutcome {
                        text,
                        backend: Some(kind),
                        failures,
                    };
                }
                Err(error) => {
                    tracing::warn!(backend = %kind, error = %error, "OCR backend failed");
                    failures.push(OcrFailure {
                        backend: kind,
                        error,
                    });
                }
            }
        }

        OcrOutcome {
            text: String::new(),
            backend: None,
            failures,
        }
    }
}
