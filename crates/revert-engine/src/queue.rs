//! Serial work queues
//!
//! Each queue is an unbounded channel drained by one dedicated task. The
//! task hands jobs to its consumer one at a time and starts the next job only
//! after the previous consumer call has settled, so a queue never has more
//! than one job in flight.

use crate::error::{ConsumerError, Result, RevertError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Executes one job taken from a queue
#[async_trait]
pub trait Consumer<T>: Send + Sync {
    async fn consume(&self, job: T) -> std::result::Result<(), ConsumerError>;
}

/// Counters collected by a queue worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueReport {
    pub name: String,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Cloneable handle for pushing jobs onto a queue
pub struct QueueSender<T> {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<T> QueueSender<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a job; fails only if the worker is gone
    pub fn enqueue(&self, job: T) -> Result<()> {
        self.tx
            .send(job)
            .map_err(|_| RevertError::QueueClosed(self.name.to_string()))
    }
}

/// A queue bound to one consumer, drained by a background task
pub struct WorkQueue<T> {
    sender: QueueSender<T>,
    worker: JoinHandle<QueueReport>,
}

impl<T: Send + 'static> WorkQueue<T> {
    /// Spawn the worker task on the current runtime
    pub fn spawn(name: &str, consumer: Arc<dyn Consumer<T>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let name: Arc<str> = Arc::from(name);
        let worker = tokio::spawn(drain(name.clone(), rx, consumer));
        Self {
            sender: QueueSender { name, tx },
            worker,
        }
    }

    pub fn sender(&self) -> QueueSender<T> {
        self.sender.clone()
    }

    pub fn enqueue(&self, job: T) -> Result<()> {
        self.sender.enqueue(job)
    }

    /// Stop accepting work and wait until everything queued has been consumed
    ///
    /// The worker exits once this handle and every cloned sender are dropped.
    pub async fn close(self) -> Result<QueueReport> {
        let Self { sender, worker } = self;
        let name = sender.name.to_string();
        drop(sender);
        worker
            .await
            .map_err(|e| RevertError::Dispatch(format!("{} worker: {}", name, e)))
    }
}

async fn drain<T>(
    name: Arc<str>,
    mut rx: mpsc::UnboundedReceiver<T>,
    consumer: Arc<dyn Consumer<T>>,
) -> QueueReport {
    let mut report = QueueReport {
        name: name.to_string(),
        ..Default::default()
    };

    while let Some(job) = rx.recv().await {
        report.processed += 1;
        debug!(queue = %name, job = report.processed, "Dispatching job");
        match consumer.consume(job).await {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                report.failed += 1;
                error!(queue = %name, job = report.processed, error = %e, "Consumer failed");
            }
        }
    }

    info!(
        queue = %name,
        processed = report.processed,
        failed = report.failed,
        "Queue drained"
    );
    report
}

/// Push `jobs` onto a queue in order, sleeping `interval` before each one
///
/// Returns the number of jobs handed over.
pub async fn replay_paced<T>(
    sender: &QueueSender<T>,
    jobs: Vec<T>,
    interval: Duration,
) -> Result<usize> {
    let mut sent = 0;
    for job in jobs {
        tokio::time::sleep(interval).await;
        sender.enqueue(job)?;
        sent += 1;
    }
    Ok(sent)
}

/// A consumer that keeps every job it receives
///
/// Useful for dry runs and for asserting dispatch order in tests. Each job
/// is stored with the instant its consumer call started.
pub struct RecordingConsumer<T> {
    jobs: Mutex<Vec<(tokio::time::Instant, T)>>,
    fail: bool,
    delay: Duration,
}

impl<T> RecordingConsumer<T> {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            fail: false,
            delay: Duration::ZERO,
        }
    }

    /// Record jobs but report every one as failed
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Hold each consumer call open for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(tokio::time::Instant, T)>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> RecordingConsumer<T> {
    /// Jobs in the order they were consumed
    pub fn jobs(&self) -> Vec<T> {
        self.lock().iter().map(|(_, job)| job.clone()).collect()
    }

    /// Jobs with the instant each consumer call started
    pub fn timed_jobs(&self) -> Vec<(tokio::time::Instant, T)> {
        self.lock().clone()
    }
}

impl<T> Default for RecordingConsumer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send + 'static> Consumer<T> for RecordingConsumer<T> {
    async fn consume(&self, job: T) -> std::result::Result<(), ConsumerError> {
        self.lock().push((tokio::time::Instant::now(), job));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ConsumerError::Request("recording consumer set to fail".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Tracks how many calls are open at once
    struct ConcurrencyGauge {
        open: AtomicUsize,
        max_open: AtomicUsize,
    }

    #[async_trait]
    impl Consumer<u32> for ConcurrencyGauge {
        async fn consume(&self, _job: u32) -> std::result::Result<(), ConsumerError> {
            let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_open.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.open.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn drains_in_fifo_order() {
        let consumer = Arc::new(RecordingConsumer::<u32>::new());
        let queue = WorkQueue::<u32>::spawn("test", consumer.clone());
        for i in 0..5u32 {
            queue.enqueue(i).unwrap();
        }
        let report = queue.close().await.unwrap();

        assert_eq!(consumer.jobs(), vec![0, 1, 2, 3, 4]);
        assert_eq!(report.processed, 5);
        assert_eq!(report.succeeded, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn one_job_in_flight_at_a_time() {
        let gauge = Arc::new(ConcurrencyGauge {
            open: AtomicUsize::new(0),
            max_open: AtomicUsize::new(0),
        });
        let queue = WorkQueue::<u32>::spawn("gauge", gauge.clone());
        for i in 0..4 {
            queue.enqueue(i).unwrap();
        }
        queue.close().await.unwrap();
        assert_eq!(gauge.max_open.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_counted_not_fatal() {
        let consumer = Arc::new(RecordingConsumer::<u32>::failing());
        let queue = WorkQueue::<u32>::spawn("failing", consumer.clone());
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        let report = queue.close().await.unwrap();

        assert_eq!(consumer.len(), 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.succeeded, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn paced_replay_waits_before_each_job() {
        let consumer = Arc::new(RecordingConsumer::<char>::new());
        let queue = WorkQueue::<char>::spawn("paced", consumer.clone());
        let start = tokio::time::Instant::now();

        let sent = replay_paced(&queue.sender(), vec!['a', 'b', 'c'], Duration::from_secs(3))
            .await
            .unwrap();
        queue.close().await.unwrap();

        assert_eq!(sent, 3);
        let offsets: Vec<u64> = consumer
            .timed_jobs()
            .iter()
            .map(|(at, _)| (*at - start).as_secs())
            .collect();
        assert_eq!(offsets, vec![3, 6, 9]);
    }
}
