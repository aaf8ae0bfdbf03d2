//! Stand-ins for the rasterizer and OCR engines.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use pagevault::config::OcrBackendKind;
use pagevault::raster::{PageRasterizer, PopplerRasterizer};
use pagevault::{OcrBackend, OcrError, RasterError};

/// Dictionary key under which fixture PDFs store each page's text.
pub const FIXTURE_TEXT_KEY: &[u8] = b"FixtureText";

/// Counts pages the way production does (lopdf) and "renders" a page by
/// writing the text stored in its fixture key.
#[derive(Default)]
pub struct FixtureRasterizer {
    counter: PopplerRasterizer,
}

impl PageRasterizer for FixtureRasterizer {
    fn page_count(&self, pdf: &Path) -> Result<u32, RasterError> {
        self.counter.page_count(pdf)
    }

    fn render_page(&self, pdf: &Path, page: u32, out_dir: &Path) -> Result<PathBuf, RasterError> {
        let render_err = |reason: String| RasterError::Render {
            path: pdf.to_path_buf(),
            page,
            reason,
        };

        let doc = lopdf::Document::load(pdf).map_err(|e| render_err(e.to_string()))?;
        let page_id = *doc
            .get_pages()
            .get(&page)
            .ok_or_else(|| render_err("no such page".to_string()))?;
        let text = doc
            .get_object(page_id)
            .and_then(|o| o.as_dict())
            .and_then(|d| d.get(FIXTURE_TEXT_KEY))
            .and_then(|o| o.as_str())
            .map_err(|e| render_err(e.to_string()))?
            .to_vec();

        let path = out_dir.join(format!("render-{}.png", page));
        std::fs::write(&path, text).map_err(|e| render_err(e.to_string()))?;
        Ok(path)
    }
}

/// Returns the "image" contents as text.
pub struct EchoOcr {
    kind: OcrBackendKind,
    delay: Duration,
    calls: AtomicUsize,
}

impl EchoOcr {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            kind: OcrBackendKind::Local,
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn cloud() -> Self {
        Self {
            kind: OcrBackendKind::Cloud,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrBackend for EchoOcr {
    fn kind(&self) -> OcrBackendKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&self, image: &Path) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        std::fs::read_to_string(image).map_err(|e| OcrError::ReadImage {
            path: image.to_path_buf(),
            source: e,
        })
    }
}

/// Always fails, like a local engine with missing language data.
pub struct FailingOcr;

impl OcrBackend for FailingOcr {
    fn kind(&self) -> OcrBackendKind {
        OcrBackendKind::Local
    }

    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&self, _image: &Path) -> Result<String, OcrError> {
        Err(OcrError::Failed("tessdata not found".to_string()))
    }
}

/// Echoes text, but blocks every call after the first `free` ones until
/// `open` is called.
pub struct GatedOcr {
    free: usize,
    calls: AtomicUsize,
    open: Mutex<bool>,
    opened: Condvar,
}

impl GatedOcr {
    pub fn new(free: usize) -> Self {
        Self {
            free,
            calls: AtomicUsize::new(0),
            open: Mutex::new(false),
            opened: Condvar::new(),
        }
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }
}

impl OcrBackend for GatedOcr {
    fn kind(&self) -> OcrBackendKind {
        OcrBackendKind::Local
    }

    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&self, image: &Path) -> Result<String, OcrError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call > self.free {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.opened.wait(open).unwrap();
            }
        }
        std::fs::read_to_string(image).map_err(|e| OcrError::ReadImage {
            path: image.to_path_buf(),
            source: e,
        })
    }
}
