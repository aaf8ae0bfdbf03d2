//! Live ingestion events for subscribers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::job::{JobStatus, PagePreview, ProgressReport};
use crate::store::PageId;

/// Events emitted while a job runs. Page text is never included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IngestEvent {
    StatusChanged {
        job_id: String,
        status: JobStatus,
    },
    PageCount {
        job_id: String,
        total_pages: u32,
    },
    PageAccepted {
        job_id: String,
        local_page: u32,
        preview: PagePreview,
    },
    PageSkipped {
        job_id: String,
        local_page: u32,
        reason: String,
        matched: PageId,
    },
    Finished {
        job_id: String,
        report: ProgressReport,
    },
}

impl IngestEvent {
    pub fn job_id(&self) -> &str {
        match self {
            IngestEvent::StatusChanged { job_id, .. }
            | IngestEvent::PageCount { job_id, .. }
            | IngestEvent::PageAccepted { job_id, .. }
            | IngestEvent::PageSkipped { job_id, .. }
            | IngestEvent::Finished { job_id, .. } => job_id,
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: IngestEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: IngestEvent) {}
}

/// Fans ingestion events out to every subscriber.
#[derive(Clone)]
pub struct IngestBroadcaster {
    sender: Arc<broadcast::Sender<IngestEvent>>,
}

impl IngestBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: IngestEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.sender.subscribe()
    }
}

impl Default for IngestBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ProgressReporter for IngestBroadcaster {
    fn report(&self, event: IngestEvent) {
        self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_subscribers() {
        IngestBroadcaster::new(4).send(IngestEvent::PageCount {
            job_id: "j".to_string(),
            total_pages: 3,
        });
    }

    #[test]
    fn test_subscriber_receives_events_in_order() {
        let broadcaster = IngestBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();

        broadcaster.report(IngestEvent::StatusChanged {
            job_id: "job-1".to_string(),
            status: JobStatus::Converting,
        });
        broadcaster.report(IngestEvent::PageSkipped {
            job_id: "job-1".to_string(),
            local_page: 2,
            reason: "identical image".to_string(),
            matched: PageId(7),
        });

        let first = rx.try_recv().unwrap();
        assert_eq!(first.job_id(), "job-1");
        assert!(matches!(
            first,
            IngestEvent::StatusChanged {
                status: JobStatus::Converting,
                ..
            }
        ));
        match rx.try_recv().unwrap() {
            IngestEvent::PageSkipped { matched, reason, .. } => {
                assert_eq!(matched, PageId(7));
                assert_eq!(reason, "identical image");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = IngestEvent::PageCount {
            job_id: "job-1".to_string(),
            total_pages: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "page_count");
        assert_eq!(json["total_pages"], 5);
    }
}
