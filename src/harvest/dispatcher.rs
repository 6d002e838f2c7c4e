use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use super::pipeline::Pipeline;
use super::task::{Job, JobResult};

/// Inclusive range of screenshot indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    start: u64,
    end: u64,
}

impl IndexRange {
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if end < start {
            anyhow::bail!("Final index {} is below starting index {}", end, start);
        }

        Ok(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of indices, saturating for the full `u64` range
    pub fn len(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }
}

/// One result together with its place in the run
#[derive(Debug)]
pub struct Report {
    /// 1-based count of results received so far
    pub position: u64,

    /// Results expected in total
    pub total: u64,

    pub result: JobResult,
}

/// Results of a dispatched range, in the order workers finish them
pub struct ResultStream {
    results: mpsc::Receiver<JobResult>,
    received: u64,
    total: u64,
}

impl ResultStream {
    /// Next finished job, `None` once every index has been reported
    pub async fn next(&mut self) -> Option<Report> {
        if self.received >= self.total {
            return None;
        }

        let result = self.results.recv().await?;
        self.received += 1;

        Some(Report {
            position: self.received,
            total: self.total,
            result,
        })
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Fixed pool of workers fed from a bounded job queue
pub struct Dispatcher {
    pipeline: Arc<Pipeline>,
    worker_count: usize,
}

impl Dispatcher {
    pub fn new(pipeline: Arc<Pipeline>, worker_count: usize) -> Result<Self> {
        if worker_count == 0 {
            anyhow::bail!("Worker count must be at least 1");
        }

        Ok(Self { pipeline, worker_count })
    }

    /// Spawn the workers and the producer for a range
    ///
    /// Both queues hold `worker_count` items. Must be called from within a
    /// Tokio runtime.
    pub fn dispatch(&self, range: IndexRange) -> ResultStream {
        let (job_tx, job_rx) = mpsc::channel::<Job>(self.worker_count);
        let (result_tx, result_rx) = mpsc::channel::<JobResult>(self.worker_count);
        let job_rx = Arc::new(Mutex::new(job_rx));

        info!(
            "Dispatching indices {}..={} to {} workers",
            range.start(),
            range.end(),
            self.worker_count
        );

        for worker_id in 0..self.worker_count {
            tokio::spawn(run_worker(
                worker_id,
                self.pipeline.clone(),
                job_rx.clone(),
                result_tx.clone(),
            ));
        }

        tokio::spawn(produce(range, job_tx));

        ResultStream {
            results: result_rx,
            received: 0,
            total: range.len(),
        }
    }
}

/// Send one job per index in ascending order, then close the queue
async fn produce(range: IndexRange, jobs: mpsc::Sender<Job>) {
    for index in range.start()..=range.end() {
        if jobs.send(Job::new(index)).await.is_err() {
            debug!("Job queue closed before index {}", index);
            return;
        }
    }

    debug!("All {} jobs queued", range.len());
}

async fn run_worker(
    worker_id: usize,
    pipeline: Arc<Pipeline>,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    results: mpsc::Sender<JobResult>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        let next = {
            let mut jobs = jobs.lock().await;
            jobs.recv().await
        };

        let Some(job) = next else {
            break;
        };

        debug!("Worker {} processing index {}", worker_id, job.index);
        let result = pipeline.process(job).await;

        if results.send(result).await.is_err() {
            debug!("Worker {} lost the result stream", worker_id);
            break;
        }
    }

    debug!("Worker {} stopped", worker_id);
}
