//! The ingestion state machine for one upload:
//! `starting → converting → processing → completed | cancelled | error`.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, info_span, warn};

use super::job::{IngestionJob, JobStatus, PagePreview};
use super::progress::{IngestEvent, ProgressReporter};
use crate::dedup::{self, DuplicateDetector, Verdict};
use crate::error::{IngestError, RasterError};
use crate::extract::ExtractedFields;
use crate::ocr::OcrChain;
use crate::raster::{self, PageRasterizer, RasterOutcome, RasterPage, RasterProgress};
use crate::sanitize;
use crate::store::{allocate_page_id, PageImages, PageRecord, PageStore};

enum PageOutcome {
    Accepted(PagePreview),
    Skipped {
        reason: String,
        matched: crate::store::PageId,
    },
}

pub struct IngestPipeline {
    rasterizer: Arc<dyn PageRasterizer>,
    ocr: OcrChain,
    detector: DuplicateDetector,
    store: Arc<dyn PageStore>,
    images: PageImages,
    /// Serializes check-then-commit against the store across jobs.
    write_lock: Mutex<()>,
}

impl IngestPipeline {
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        ocr: OcrChain,
        detector: DuplicateDetector,
        store: Arc<dyn PageStore>,
        images: PageImages,
    ) -> Self {
        Self {
            rasterizer,
            ocr,
            detector,
            store,
            images,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn PageStore> {
        &self.store
    }

    pub fn images(&self) -> &PageImages {
        &self.images
    }

    /// Held by every writer of the store, so a duplicate check always sees
    /// the pages committed before it.
    pub(crate) fn lock_writes(&self) -> MutexGuard<'_, ()> {
        match self.write_lock.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Store write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Runs `job` to a terminal state. Failures end up in the job's status,
    /// never in the caller.
    pub fn run(&self, job: &IngestionJob, progress: &dyn ProgressReporter) {
        let filename = sanitize::redact_path(Path::new(job.filename()));
        let _span = info_span!("ingest", job_id = %job.id(), filename = %filename).entered();
        info!("ingestion started");

        match self.execute(job, progress) {
            Ok(status) => {
                job.finish(status, None);
                discard_upload(job.upload_path());
            }
            Err(e) => {
                // The upload stays in the holding area so it can be retried.
                error!(error = %e, "ingestion failed");
                job.finish(JobStatus::Error, Some(e.to_string()));
            }
        }

        progress.report(IngestEvent::Finished {
            job_id: job.id().to_string(),
            report: job.report(),
        });
    }

    fn set_status(&self, job: &IngestionJob, status: JobStatus, progress: &dyn ProgressReporter) {
        job.update(|s| s.status = status);
        progress.report(IngestEvent::StatusChanged {
            job_id: job.id().to_string(),
            status,
        });
    }

    fn execute(
        &self,
        job: &IngestionJob,
        progress: &dyn ProgressReporter,
    ) -> Result<JobStatus, IngestError> {
        let holding = job.upload_path().parent().unwrap_or(Path::new("."));
        // Dropped on every exit path, taking uncommitted renders with it.
        let scratch = tempfile::Builder::new()
            .prefix(".raster-")
            .tempdir_in(holding)
            .map_err(|e| RasterError::OutputDirectory {
                path: holding.to_path_buf(),
                source: e,
            })?;

        // Step 1: Rasterize
        let pages = {
            let _step = info_span!("convert").entered();
            self.set_status(job, JobStatus::Converting, progress);

            let outcome = raster::rasterize(
                self.rasterizer.as_ref(),
                job.upload_path(),
                scratch.path(),
                job.cancel_flag(),
                |event| {
                    if let RasterProgress::PageCount(total) = event {
                        job.update(|s| s.total_pages = total);
                        progress.report(IngestEvent::PageCount {
                            job_id: job.id().to_string(),
                            total_pages: total,
                        });
                    }
                },
            )?;

            match outcome {
                RasterOutcome::Complete(pages) => pages,
                RasterOutcome::Cancelled(_) => return self.finalize(job, JobStatus::Cancelled),
            }
        };

        // Step 2: OCR, de-duplicate and commit page by page
        self.images.ensure_directory()?;
        self.set_status(job, JobStatus::Processing, progress);

        for page in &pages {
            if job.is_cancelled() {
                info!(page = page.page, "cancellation observed");
                return self.finalize(job, JobStatus::Cancelled);
            }

            let _step = info_span!("process_page", page = page.page).entered();
            let outcome = self.process_page(job, page)?;

            job.update(|s| {
                s.processed_pages += 1;
                match &outcome {
                    PageOutcome::Accepted(preview) => {
                        s.pages_added += 1;
                        s.current_preview = Some(preview.clone());
                    }
                    PageOutcome::Skipped { .. } => s.duplicates_skipped += 1,
                }
            });

            progress.report(match outcome {
                PageOutcome::Accepted(preview) => IngestEvent::PageAccepted {
                    job_id: job.id().to_string(),
                    local_page: page.page,
                    preview,
                },
                PageOutcome::Skipped { reason, matched } => IngestEvent::PageSkipped {
                    job_id: job.id().to_string(),
                    local_page: page.page,
                    reason,
                    matched,
                },
            });
        }

        // Step 3: Persist
        self.finalize(job, JobStatus::Completed)
    }

    fn process_page(&self, job: &IngestionJob, page: &RasterPage) -> Result<PageOutcome, IngestError> {
        let image_hash = dedup::file_hash(&page.path).map_err(|e| IngestError::ReadImage {
            path: page.path.clone(),
            source: e,
        })?;

        let ocr = self.ocr.recognize(&page.path);
        match ocr.backend {
            Some(backend) => debug!(
                backend = %backend,
                excerpt = %sanitize::text_excerpt(&ocr.text, 40),
                "page recognized"
            ),
            None => {
                let tried: Vec<String> = ocr
                    .failures
                    .iter()
                    .map(|f| format!("{}: {}", f.backend, f.error))
                    .collect();
                warn!(
                    page = page.page,
                    failures = ?tried,
                    "no OCR backend succeeded, storing page with empty text"
                );
            }
        }
        let text = ocr.text;

        let _guard = self.lock_writes();
        let existing = self.store.snapshot()?;

        match self.detector.check(&image_hash, &text, &existing) {
            Verdict::Duplicate { reason, matched } => {
                info!(page = page.page, reason = %reason, matched = %matched, "duplicate page skipped");
                if let Err(e) = std::fs::remove_file(&page.path) {
                    debug!(error = %e, "failed to remove skipped render");
                }
                Ok(PageOutcome::Skipped {
                    reason: reason.to_string(),
                    matched,
                })
            }
            Verdict::Unique => {
                let page_id = allocate_page_id(self.store.as_ref(), &self.images)?;
                self.images.commit(&page.path, page_id)?;

                let fields = ExtractedFields::from_text(&text);
                let record = PageRecord::new(text, job.filename(), page.page, image_hash);
                if let Err(e) = self.store.put(page_id, record) {
                    if let Err(cleanup) = self.images.remove(page_id) {
                        warn!(page_id = %page_id, error = %cleanup, "failed to remove orphaned page image");
                    }
                    return Err(e.into());
                }

                info!(page = page.page, page_id = %page_id, "page stored");
                Ok(PageOutcome::Accepted(PagePreview::new(page_id, &fields)))
            }
        }
    }

    fn finalize(&self, job: &IngestionJob, status: JobStatus) -> Result<JobStatus, IngestError> {
        let _step = info_span!("finalize").entered();
        {
            let _guard = self.lock_writes();
            self.store.persist()?;
        }

        let report = job.report();
        info!(
            status = %status,
            total_pages = report.total_pages,
            pages_added = report.pages_added,
            duplicates_skipped = report.duplicates_skipped,
            "ingestion finished"
        );
        Ok(status)
    }
}

fn discard_upload(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            file = %sanitize::redact_path(path),
            error = %e,
            "failed to remove processed upload"
        ),
    }
}
