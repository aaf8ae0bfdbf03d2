//! The page library: upload, progress, cancel, search, view, correct, delete.
//!
//! Every operation that does not start a job answers immediately. Uploads
//! are handed to a background thread per job and polled by id.

use std::collections::HashMap;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::{validate_config, Config};
use crate::dedup::DuplicateDetector;
use crate::error::{IngestError, PagevaultError, Result, StoreError};
use crate::extract::ExtractedFields;
use crate::ingest::{
    IngestBroadcaster, IngestEvent, IngestPipeline, IngestionJob, JobRegistry, JobStatus,
    ProgressReport,
};
use crate::ocr::OcrChain;
use crate::raster::{PageRasterizer, PopplerRasterizer};
use crate::sanitize;
use crate::search::{self, SearchHit, SearchQuery};
use crate::store::{open_store, PageId, PageRecord, PageStore};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// A stored page with its image location and freshly extracted fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageView {
    pub page_id: PageId,
    #[serde(flatten)]
    pub record: PageRecord,
    pub image_path: PathBuf,
    pub fields: ExtractedFields,
}

pub struct Library {
    config: Config,
    pipeline: Arc<IngestPipeline>,
    jobs: Arc<JobRegistry>,
    events: IngestBroadcaster,
    workers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Library {
    /// Production constructor: poppler rasterizer, configured OCR chain and
    /// the configured store backend.
    pub fn open(config: Config) -> Result<Self> {
        validate_config(&config)?;
        let store = open_store(&config)?;
        let rasterizer = Arc::new(PopplerRasterizer::new(
            config.raster.dpi,
            &config.raster.pdftoppm_path,
        ));
        let ocr = OcrChain::from_config(&config.ocr);
        tracing::info!(backends = ?ocr.kinds(), dpi = config.raster.dpi, "library opened");
        Self::with_components(config, rasterizer, ocr, store)
    }

    /// Builds a library around injected components.
    pub fn with_components(
        config: Config,
        rasterizer: Arc<dyn PageRasterizer>,
        ocr: OcrChain,
        store: Arc<dyn PageStore>,
    ) -> Result<Self> {
        let images = crate::store::PageImages::new(config.pages_path());
        images.ensure_directory()?;

        let uploads = config.upload_path();
        std::fs::create_dir_all(&uploads).map_err(|e| StoreError::CreateDirectory {
            path: uploads.clone(),
            source: e,
        })?;

        let detector = DuplicateDetector::new(config.ingest.similarity_threshold);
        let pipeline = Arc::new(IngestPipeline::new(rasterizer, ocr, detector, store, images));
        let jobs = Arc::new(JobRegistry::new(
            config.ingest.max_concurrent_jobs,
            Duration::from_secs(config.ingest.job_retention_secs),
        ));

        Ok(Self {
            config,
            pipeline,
            jobs,
            events: IngestBroadcaster::default(),
            workers: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.events.subscribe()
    }

    fn workers(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        match self.workers.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("Worker table lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Validates and stores an upload, then starts its ingestion job in the
    /// background. Returns the job id.
    pub fn submit_upload(&self, filename: &str, data: &[u8]) -> Result<String> {
        validate_upload(filename, data, self.config.ingest.max_upload_bytes)?;

        let job_id = Uuid::new_v4().to_string();
        let display_name = sanitize::redact_path(Path::new(filename));
        let upload_path = self.config.upload_path().join(format!(
            "{}_{}",
            job_id,
            sanitize::safe_file_name(filename)
        ));
        save_upload(&upload_path, data)?;

        let job = match self
            .jobs
            .admit(IngestionJob::new(&job_id, &display_name, upload_path.clone()))
        {
            Ok(job) => job,
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_file(&upload_path) {
                    tracing::warn!(error = %cleanup, "failed to remove refused upload");
                }
                return Err(e);
            }
        };

        let pipeline = Arc::clone(&self.pipeline);
        let events = self.events.clone();
        let worker_job = Arc::clone(&job);
        let spawned = std::thread::Builder::new()
            .name(format!("ingest-{}", &job_id[..8]))
            .spawn(move || {
                let outcome =
                    std::panic::catch_unwind(AssertUnwindSafe(|| pipeline.run(&worker_job, &events)));
                if outcome.is_err() {
                    tracing::error!(job_id = %worker_job.id(), "ingestion thread panicked");
                    worker_job.finish(JobStatus::Error, Some("ingestion thread panicked".to_string()));
                    events.send(IngestEvent::Finished {
                        job_id: worker_job.id().to_string(),
                        report: worker_job.report(),
                    });
                }
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                let err = IngestError::Spawn(e.to_string());
                job.finish(JobStatus::Error, Some(err.to_string()));
                return Err(err.into());
            }
        };

        let mut workers = self.workers();
        workers.retain(|_, h| !h.is_finished());
        workers.insert(job_id.clone(), handle);

        tracing::info!(
            job_id = %job_id,
            filename = %display_name,
            bytes = data.len(),
            "upload accepted"
        );
        Ok(job_id)
    }

    fn job(&self, job_id: &str) -> Result<Arc<IngestionJob>> {
        self.jobs
            .get(job_id)
            .ok_or_else(|| PagevaultError::JobNotFound(job_id.to_string()))
    }

    pub fn progress(&self, job_id: &str) -> Result<ProgressReport> {
        Ok(self.job(job_id)?.report())
    }

    /// Asks a job to stop. The job finishes the page it is on first.
    pub fn cancel(&self, job_id: &str) -> Result<()> {
        let job = self.job(job_id)?;
        job.cancel();
        tracing::info!(job_id = %job_id, "cancellation requested");
        Ok(())
    }

    /// Cancels every job still running; returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let active = self.jobs.active();
        for job in &active {
            job.cancel();
        }
        active.len()
    }

    /// Blocks until the job's thread exits and returns its final report.
    pub fn wait(&self, job_id: &str) -> Result<ProgressReport> {
        let job = self.job(job_id)?;
        let handle = self.workers().remove(job_id);
        if let Some(handle) = handle {
            // Panics are caught inside the thread.
            let _ = handle.join();
        }
        Ok(job.report())
    }

    pub fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let pages = self.pipeline.store().snapshot()?;
        Ok(search::search(&pages, self.pipeline.images(), query))
    }

    pub fn view(&self, page_id: PageId) -> Result<PageView> {
        let record = self
            .pipeline
            .store()
            .get(page_id)?
            .ok_or_else(|| PagevaultError::PageNotFound(page_id.to_string()))?;

        Ok(PageView {
            page_id,
            image_path: self.pipeline.images().path_for(page_id),
            fields: ExtractedFields::from_text(&record.text),
            record,
        })
    }

    /// Replaces a page's text. The OCR output stays in `original_text`.
    pub fn update_text(&self, page_id: PageId, text: &str) -> Result<()> {
        let store = self.pipeline.store();
        let _guard = self.pipeline.lock_writes();

        let mut record = store
            .get(page_id)?
            .ok_or_else(|| PagevaultError::PageNotFound(page_id.to_string()))?;
        record.text = text.to_string();
        store.put(page_id, record)?;
        store.persist()?;

        tracing::info!(page_id = %page_id, "page text corrected");
        Ok(())
    }

    /// Removes a page's image, then its record, then persists the store.
    /// If the image cannot be removed the record is left untouched.
    pub fn delete(&self, page_id: PageId) -> Result<()> {
        let store = self.pipeline.store();
        let _guard = self.pipeline.lock_writes();

        if !store.contains(page_id)? {
            return Err(PagevaultError::PageNotFound(page_id.to_string()));
        }
        if !self.pipeline.images().remove(page_id)? {
            tracing::warn!(page_id = %page_id, "deleted page had no image file");
        }
        store.delete(page_id)?;
        store.persist()?;

        tracing::info!(page_id = %page_id, "page deleted");
        Ok(())
    }

    pub fn page_count(&self) -> Result<usize> {
        Ok(self.pipeline.store().len()?)
    }
}

fn validate_upload(filename: &str, data: &[u8], limit: u64) -> Result<()> {
    let name = filename.trim();
    if name.is_empty() {
        return Err(PagevaultError::InvalidUpload("no file selected".to_string()));
    }
    if !name.to_lowercase().ends_with(".pdf") {
        return Err(PagevaultError::InvalidUpload(
            "only PDF files are accepted".to_string(),
        ));
    }
    if data.is_empty() {
        return Err(PagevaultError::InvalidUpload("upload is empty".to_string()));
    }

    let size = data.len() as u64;
    if size > limit {
        return Err(PagevaultError::UploadTooLarge { size, limit });
    }
    if !data.starts_with(PDF_MAGIC) {
        return Err(PagevaultError::InvalidUpload(
            "file is not a PDF document".to_string(),
        ));
    }
    Ok(())
}

fn save_upload(path: &Path, data: &[u8]) -> Result<()> {
    let to_err = |e| PagevaultError::SaveUpload {
        path: path.to_path_buf(),
        source: e,
    };
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(to_err)?;
    file.write_all(data).map_err(to_err)?;
    file.sync_all().map_err(to_err)?;
    Ok(())
}
