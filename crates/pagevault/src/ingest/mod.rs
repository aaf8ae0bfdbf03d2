//! Background ingestion of uploaded PDFs.

pub mod job;
pub mod progress;
pub mod registry;
pub mod runner;

pub use job::{IngestionJob, JobStatus, PagePreview, ProgressReport};
pub use progress::{IngestBroadcaster, IngestEvent, NoopProgress, ProgressReporter};
pub use registry::JobRegistry;
pub use runner::IngestPipeline;
