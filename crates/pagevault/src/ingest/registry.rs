//! In-memory table of ingestion jobs, keyed by job id.
//!
//! Admission is bounded by the number of jobs not yet in a terminal state.
//! Terminal jobs stay queryable for the retention window counted from
//! their end time and are swept lazily on submit and lookup.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::job::IngestionJob;
use crate::error::PagevaultError;

pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Arc<IngestionJob>>>,
    max_active: usize,
    retention: TimeDelta,
}

impl JobRegistry {
    pub fn new(max_active: usize, retention: Duration) -> Self {
        let retention = TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX);
        Self {
            jobs: RwLock::new(HashMap::new()),
            max_active,
            retention,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<IngestionJob>>> {
        match self.jobs.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<IngestionJob>>> {
        match self.jobs.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Registers `job` unless the active-job limit is reached.
    pub fn admit(&self, job: IngestionJob) -> Result<Arc<IngestionJob>, PagevaultError> {
        let now = Utc::now();
        let mut jobs = self.write();
        self.sweep_locked(&mut jobs, now);

        let active = jobs.values().filter(|j| !j.status().is_terminal()).count();
        if active >= self.max_active {
            return Err(PagevaultError::TooManyJobs {
                limit: self.max_active,
            });
        }

        let job = Arc::new(job);
        jobs.insert(job.id().to_string(), Arc::clone(&job));
        Ok(job)
    }

    pub fn get(&self, id: &str) -> Option<Arc<IngestionJob>> {
        self.sweep_at(Utc::now());
        self.read().get(id).cloned()
    }

    /// Jobs that have not reached a terminal state.
    pub fn active(&self) -> Vec<Arc<IngestionJob>> {
        self.read()
            .values()
            .filter(|j| !j.status().is_terminal())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops terminal jobs whose retention has expired at `now`.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut jobs = self.write();
        self.sweep_locked(&mut jobs, now)
    }

    fn sweep_locked(&self, jobs: &mut HashMap<String, Arc<IngestionJob>>, now: DateTime<Utc>) -> usize {
        let before = jobs.len();
        jobs.retain(|_, job| match job.end_time() {
            Some(end) if job.status().is_terminal() => now.signed_duration_since(end) <= self.retention,
            _ => true,
        });
        let evicted = before - jobs.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted finished ingestion jobs");
        }
        evicted
    }
}
