//! Dual queue dispatch
//!
//! Unpublish batches are enqueued the instant the reconciler flushes them.
//! Publish batches are held back until the whole pending list is released,
//! then replayed in order with a fixed pause before each batch. The two
//! queues drain independently of each other.

use crate::context::ReconcileContext;
use crate::error::{Result, RevertError};
use crate::model::{PublishBatch, UnpublishBatch};
use crate::queue::{replay_paced, QueueReport, QueueSender, WorkQueue};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Final counters of both queues
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub unpublish: QueueReport,
    pub publish: QueueReport,
    /// Publish batches handed over by the paced replay
    pub paced_batches: usize,
}

impl DispatchReport {
    pub fn failed(&self) -> usize {
        self.unpublish.failed + self.publish.failed
    }
}

/// Owns the unpublish queue, the publish queue and the paced replay task
pub struct Dispatcher {
    unpublish: WorkQueue<UnpublishBatch>,
    publish: WorkQueue<PublishBatch>,
    release: Option<oneshot::Sender<Vec<PublishBatch>>>,
    replay: JoinHandle<Result<usize>>,
}

impl Dispatcher {
    /// Spawn both queue workers and the (gated) replay task
    pub fn start(ctx: &ReconcileContext) -> Self {
        let unpublish = WorkQueue::spawn("unpublish", ctx.unpublish_consumer.clone());
        let publish = WorkQueue::spawn("publish", ctx.publish_consumer.clone());

        let (release_tx, release_rx) = oneshot::channel::<Vec<PublishBatch>>();
        let sender = publish.sender();
        let interval = ctx.config.publish_interval;
        let replay = tokio::spawn(async move {
            match release_rx.await {
                Ok(pending) => {
                    info!(
                        batches = pending.len(),
                        interval_ms = interval.as_millis() as u64,
                        "Starting paced publish replay"
                    );
                    replay_paced(&sender, pending, interval).await
                }
                // Released nothing: the run ended before reconciliation finished.
                Err(_) => Ok(0),
            }
        });

        Self {
            unpublish,
            publish,
            release: Some(release_tx),
            replay,
        }
    }

    /// Handle for pushing unpublish batches as they are discovered
    pub fn unpublish_sender(&self) -> QueueSender<UnpublishBatch> {
        self.unpublish.sender()
    }

    pub fn enqueue_unpublish(&self, batch: UnpublishBatch) -> Result<()> {
        self.unpublish.enqueue(batch)
    }

    /// Signal that the pending publish list is complete and start the replay
    pub fn release_publish(&mut self, pending: Vec<PublishBatch>) -> Result<()> {
        let release = self
            .release
            .take()
            .ok_or_else(|| RevertError::Dispatch("publish batches already released".into()))?;
        release
            .send(pending)
            .map_err(|_| RevertError::Dispatch("publish replay task is gone".into()))
    }

    /// Wait for the replay to finish and both queues to drain
    pub async fn finish(self) -> Result<DispatchReport> {
        let Self {
            unpublish,
            publish,
            release,
            replay,
        } = self;
        drop(release);

        let paced_batches = replay
            .await
            .map_err(|e| RevertError::Dispatch(format!("publish replay: {}", e)))??;

        let (unpublish, publish) = tokio::join!(unpublish.close(), publish.close());
        Ok(DispatchReport {
            unpublish: unpublish?,
            publish: publish?,
            paced_batches,
        })
    }

    /// Drain what was already queued after a failed run, without releasing publish work
    ///
    /// The outcome is logged rather than returned as an error, so the caller
    /// can report the failure that stopped the run.
    pub async fn abandon(self) -> Option<DispatchReport> {
        match self.finish().await {
            Ok(report) => {
                warn!(
                    unpublished = report.unpublish.succeeded,
                    failed = report.failed(),
                    "Run aborted; queued unpublish batches drained"
                );
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, "Run aborted; draining queued work failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EngineConfig;
    use crate::environment::StaticDirectory;
    use crate::model::{Batch, ContentKind, PublishDetail, PublishWorkItem, UnpublishWorkItem};
    use crate::queue::RecordingConsumer;
    use std::sync::Arc;
    use std::time::Duration;

    fn unpublish_batch(env: &str) -> UnpublishBatch {
        Batch {
            content_kind: ContentKind::Asset,
            environment: env.into(),
            locale: None,
            items: vec![UnpublishWorkItem {
                uid: "a1".into(),
                locale: None,
                content_type: None,
            }],
        }
    }

    fn publish_batch(env: &str) -> PublishBatch {
        Batch {
            content_kind: ContentKind::Asset,
            environment: env.into(),
            locale: None,
            items: vec![PublishWorkItem {
                uid: "a2".into(),
                version: 4,
                locale: None,
                content_type: None,
                publish_detail: PublishDetail {
                    environment: format!("u-{}", env),
                    locale: None,
                    version: 4,
                },
            }],
        }
    }

    struct Harness {
        ctx: ReconcileContext,
        unpublished: Arc<RecordingConsumer<UnpublishBatch>>,
        published: Arc<RecordingConsumer<PublishBatch>>,
    }

    fn harness(interval: Duration) -> Harness {
        let unpublished = Arc::new(RecordingConsumer::<UnpublishBatch>::new());
        let published = Arc::new(RecordingConsumer::<PublishBatch>::new());
        let ctx = ReconcileContext::new(
            EngineConfig::default().with_publish_interval(interval),
            Arc::new(StaticDirectory::default()),
            unpublished.clone(),
            published.clone(),
        );
        Harness {
            ctx,
            unpublished,
            published,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publish_waits_for_release() {
        let h = harness(Duration::from_secs(3));
        let mut dispatcher = Dispatcher::start(&h.ctx);

        dispatcher.enqueue_unpublish(unpublish_batch("prod")).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.unpublished.len(), 1);
        assert!(h.published.is_empty());

        dispatcher
            .release_publish(vec![publish_batch("prod"), publish_batch("dev")])
            .unwrap();
        let released_at = tokio::time::Instant::now();
        let report = dispatcher.finish().await.unwrap();

        assert_eq!(report.paced_batches, 2);
        assert_eq!(report.publish.processed, 2);
        assert_eq!(report.unpublish.processed, 1);
        let offsets: Vec<u64> = h
            .published
            .timed_jobs()
            .iter()
            .map(|(at, _)| (*at - released_at).as_secs())
            .collect();
        assert_eq!(offsets, vec![3, 6]);
    }

    #[tokio::test]
    async fn finish_without_release_drains_unpublish_only() {
        let h = harness(Duration::from_millis(1));
        let dispatcher = Dispatcher::start(&h.ctx);
        dispatcher.enqueue_unpublish(unpublish_batch("prod")).unwrap();

        let report = dispatcher.finish().await.unwrap();
        assert_eq!(report.paced_batches, 0);
        assert_eq!(report.unpublish.succeeded, 1);
        assert!(h.published.is_empty());
    }

    #[tokio::test]
    async fn abandon_drains_queued_unpublish_work() {
        let h = harness(Duration::from_millis(1));
        let dispatcher = Dispatcher::start(&h.ctx);
        dispatcher.enqueue_unpublish(unpublish_batch("prod")).unwrap();
        dispatcher.enqueue_unpublish(unpublish_batch("dev")).unwrap();

        let report = dispatcher.abandon().await.unwrap();
        assert_eq!(report.unpublish.processed, 2);
        assert_eq!(report.paced_batches, 0);
        assert_eq!(h.unpublished.len(), 2);
        assert!(h.published.is_empty());
    }

    #[tokio::test]
    async fn release_twice_is_rejected() {
        let h = harness(Duration::from_millis(1));
        let mut dispatcher = Dispatcher::start(&h.ctx);
        dispatcher.release_publish(vec![]).unwrap();
        assert!(dispatcher.release_publish(vec![]).is_err());
        dispatcher.finish().await.unwrap();
    }
}
