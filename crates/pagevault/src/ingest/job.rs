//! Ingestion job state shared between the job thread and progress readers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::ExtractedFields;
use crate::store::PageId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Starting,
    Converting,
    Processing,
    Completed,
    Cancelled,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::Converting => "converting",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Error
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fields extracted from the most recently committed page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PagePreview {
    pub page_id: PageId,
    pub dob: Option<String>,
    pub occupation_place: Option<String>,
    pub native_address: Option<String>,
}

impl PagePreview {
    pub fn new(page_id: PageId, fields: &ExtractedFields) -> Self {
        Self {
            page_id,
            dob: fields.dob.clone(),
            occupation_place: fields.occupation_place.clone(),
            native_address: fields.native_address.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct JobState {
    pub status: JobStatus,
    pub total_pages: u32,
    pub processed_pages: u32,
    pub pages_added: u32,
    pub duplicates_skipped: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub current_preview: Option<PagePreview>,
}

/// Point-in-time view of a job, as returned by a progress query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressReport {
    pub job_id: String,
    pub filename: String,
    pub status: JobStatus,
    /// Percent of pages processed, 0-100.
    pub progress: u8,
    pub total_pages: u32,
    pub processed_pages: u32,
    pub pages_added: u32,
    pub duplicates_skipped: u32,
    pub elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_remaining: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_preview: Option<PagePreview>,
}

fn round_tenths(secs: f64) -> f64 {
    (secs * 10.0).round() / 10.0
}

/// One upload being ingested.
///
/// The job thread is the only writer of the state; `cancel` is the single
/// externally writable field.
#[derive(Debug)]
pub struct IngestionJob {
    id: String,
    filename: String,
    upload_path: PathBuf,
    cancelled: AtomicBool,
    state: RwLock<JobState>,
}

impl IngestionJob {
    pub fn new(id: impl Into<String>, filename: impl Into<String>, upload_path: PathBuf) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            upload_path,
            cancelled: AtomicBool::new(false),
            state: RwLock::new(JobState {
                status: JobStatus::Starting,
                total_pages: 0,
                processed_pages: 0,
                pages_added: 0,
                duplicates_skipped: 0,
                start_time: Utc::now(),
                end_time: None,
                error: None,
                current_preview: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Where the uploaded PDF waits in the holding area.
    pub fn upload_path(&self) -> &Path {
        &self.upload_path
    }

    /// Requests cancellation. The job notices before its next page.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel_flag(&self) -> &AtomicBool {
        &self.cancelled
    }

    pub fn status(&self) -> JobStatus {
        self.read().status
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.read().end_time
    }

    fn read(&self) -> RwLockReadGuard<'_, JobState> {
        match self.state.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!(job_id = %self.id, "Job state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, JobState> {
        match self.state.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!(job_id = %self.id, "Job state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub(crate) fn update<F: FnOnce(&mut JobState)>(&self, f: F) {
        f(&mut self.write());
    }

    /// Moves the job into a terminal state and stamps `end_time`.
    pub(crate) fn finish(&self, status: JobStatus, error: Option<String>) {
        let mut state = self.write();
        state.status = status;
        state.error = error;
        state.end_time = Some(Utc::now());
    }

    pub fn report(&self) -> ProgressReport {
        self.report_at(Utc::now())
    }

    pub fn report_at(&self, now: DateTime<Utc>) -> ProgressReport {
        let state = self.read().clone();

        let until = state.end_time.unwrap_or(now);
        let elapsed = (until - state.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let progress = if state.total_pages > 0 {
            (u64::from(state.processed_pages) * 100 / u64::from(state.total_pages)).min(100) as u8
        } else {
            0
        };

        let estimated_remaining = if state.processed_pages > 0 && state.total_pages > 0 {
            let remaining = state.total_pages.saturating_sub(state.processed_pages);
            Some(round_tenths(
                elapsed / f64::from(state.processed_pages) * f64::from(remaining),
            ))
        } else {
            None
        };

        ProgressReport {
            job_id: self.id.clone(),
            filename: self.filename.clone(),
            status: state.status,
            progress,
            total_pages: state.total_pages,
            processed_pages: state.processed_pages,
            pages_added: state.pages_added,
            duplicates_skipped: state.duplicates_skipped,
            elapsed_secs: round_tenths(elapsed),
            estimated_remaining,
            error: state.error,
            current_preview: state.current_preview,
        }
    }
}
