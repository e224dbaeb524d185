//! Revert run orchestration
//!
//! Format (one directory lookup) → reconcile (unpublish batches dispatched
//! inline) → release the pending publish list to the paced replay → wait for
//! both queues to drain.

use crate::context::ReconcileContext;
use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::error::Result;
use crate::formatter::format_log;
use crate::log::RawLogRecord;
use crate::model::ContentKind;
use crate::reconciler::Reconciler;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// What a revert run did
#[derive(Debug, Clone, PartialEq)]
pub enum RevertOutcome {
    /// The log had no records; no queue was started
    EmptyLog,
    Completed(RevertSummary),
}

/// Counters of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RevertSummary {
    pub run_id: Uuid,
    pub kind: ContentKind,
    /// Environment names that survived resolution
    pub environments: Vec<String>,
    pub items: usize,
    pub partitions: usize,
    pub unpublish_batches: usize,
    pub publish_batches: usize,
    pub dispatch: DispatchReport,
}

/// Runs reconciliation and dispatch for one log
#[derive(Debug, Clone)]
pub struct RevertEngine {
    ctx: ReconcileContext,
}

impl RevertEngine {
    pub fn new(ctx: ReconcileContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ReconcileContext {
        &self.ctx
    }

    /// Revert using the given log records
    pub async fn run(&self, records: &[RawLogRecord]) -> Result<RevertOutcome> {
        if records.is_empty() {
            warn!("Log file is empty, nothing to revert");
            return Ok(RevertOutcome::EmptyLog);
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("revert", %run_id);
        self.run_inner(run_id, records).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, records: &[RawLogRecord]) -> Result<RevertOutcome> {
        let log = format_log(records, self.ctx.directory.as_ref()).await?;
        let kind = log.kind();
        info!(
            kind = %kind,
            environments = log.environments.len(),
            locales = log.locales().len(),
            items = log.items.item_count(),
            "Log formatted"
        );

        let mut dispatcher = Dispatcher::start(&self.ctx);
        let reconciler = Reconciler::new(self.ctx.config.batch_capacity);
        let reconciled = reconciler.reconcile(&log, |batch| dispatcher.enqueue_unpublish(batch));
        let plan = match reconciled {
            Ok(plan) => plan,
            Err(e) => {
                // Let already-queued unpublish work finish before reporting.
                dispatcher.abandon().await;
                return Err(e);
            }
        };

        let publish_batches = plan.pending_publish.len();
        dispatcher.release_publish(plan.pending_publish)?;
        let dispatch = dispatcher.finish().await?;

        info!(
            unpublish_batches = plan.unpublish_batches,
            publish_batches,
            failed = dispatch.failed(),
            "Revert finished"
        );

        Ok(RevertOutcome::Completed(RevertSummary {
            run_id,
            kind,
            environments: log.environments.iter().map(|e| e.name.clone()).collect(),
            items: log.items.item_count(),
            partitions: plan.partitions,
            unpublish_batches: plan.unpublish_batches,
            publish_batches,
            dispatch,
        }))
    }
}
