//! Test harness for isolated library instances.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lopdf::{dictionary, Document, Object, Stream};
use tempfile::TempDir;

use pagevault::config::StoreBackend;
use pagevault::store::{open_store, PageImages, StoredPage};
use pagevault::{Config, Library, OcrBackend, OcrChain, PageStore};

use super::fakes::{FixtureRasterizer, FIXTURE_TEXT_KEY};

/// Builds a PDF with one page per entry; each page carries its text under
/// the fixture key for `FixtureRasterizer`.
pub fn fixture_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for (n, text) in pages.iter().enumerate() {
        let content = format!("BT /F1 12 Tf 50 700 Td (Page {}) Tj ET", n + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        };
        page.set(FIXTURE_TEXT_KEY, Object::string_literal(*text));
        kids.push(Object::from(doc.add_object(page)));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to serialize fixture PDF");
    bytes
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Isolated data directory plus a config rooted in it.
pub struct TestHarness {
    temp_dir: TempDir,
    pub config: Config,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config<F: FnOnce(&mut Config)>(customize: F) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut config = Config::with_data_directory(temp_dir.path().join("vault"));
        config.ingest.max_concurrent_jobs = 4;
        customize(&mut config);
        Self { temp_dir, config }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.config.upload_path()
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.config.pages_path()
    }

    pub fn images(&self) -> PageImages {
        PageImages::new(self.pages_dir())
    }

    /// Opens the configured store backend fresh from disk.
    pub fn open_store(&self) -> Arc<dyn PageStore> {
        open_store(&self.config).expect("Failed to open page store")
    }

    /// Pages as persisted on disk, read through a new store instance.
    pub fn persisted_pages(&self) -> Vec<StoredPage> {
        self.open_store().snapshot().expect("Failed to read page store")
    }

    pub fn library(&self, ocr: Arc<dyn OcrBackend>) -> Library {
        self.library_with_chain(OcrChain::new(vec![ocr]))
    }

    pub fn library_with_chain(&self, ocr: OcrChain) -> Library {
        Library::with_components(
            self.config.clone(),
            Arc::new(FixtureRasterizer::default()),
            ocr,
            self.open_store(),
        )
        .expect("Failed to build library")
    }

    /// Files left in the holding area (uploads and scratch directories).
    pub fn holding_area_entries(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.uploads_dir()) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn use_sqlite(&mut self) {
        self.config.store.backend = StoreBackend::Sqlite;
    }
}
