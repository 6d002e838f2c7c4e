use std::collections::BTreeMap;
use std::time::Instant;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::harvest::{JobResult, JobStatus};

/// Tally of a harvest run, fed by the aggregator
#[derive(Debug)]
pub struct MetricsCollector {
    /// Wall clock start of the run
    started_at: DateTime<Utc>,

    /// Monotonic start of the run
    timer: Instant,

    /// Jobs per terminal status
    by_status: BTreeMap<JobStatus, u64>,

    /// Jobs that carried an error
    errors: u64,
}

/// Snapshot of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub processed: u64,
    pub downloaded: u64,

    /// Access denied, captcha or no image
    pub skipped: u64,
    pub errors: u64,

    /// Status name -> job count, only statuses that occurred
    pub by_status: BTreeMap<String, u64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            timer: Instant::now(),
            by_status: BTreeMap::new(),
            errors: 0,
        }
    }

    /// Record a finished job
    pub fn record(&mut self, result: &JobResult) {
        *self.by_status.entry(result.job.status).or_default() += 1;

        if result.error.is_some() {
            self.errors += 1;
        }
    }

    pub fn snapshot(&self) -> Metrics {
        let count = |keep: fn(JobStatus) -> bool| -> u64 {
            self.by_status.iter()
                .filter(|(status, _)| keep(**status))
                .map(|(_, count)| *count)
                .sum()
        };

        Metrics {
            started_at: self.started_at,
            elapsed_ms: self.timer.elapsed().as_millis() as u64,
            processed: self.by_status.values().sum(),
            downloaded: count(JobStatus::wrote_file),
            skipped: count(JobStatus::is_soft_outcome),
            errors: self.errors,
            by_status: self.by_status.iter()
                .map(|(status, count)| (status.name().to_string(), *count))
                .collect(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
