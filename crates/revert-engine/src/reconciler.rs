//! Reconciliation and batch assembly
//!
//! For every (environment, locale) partition the reconciler walks the items
//! in log order. An item that still has a publish detail for the partition's
//! environment is re-published at that version; any other item is
//! unpublished. Work is grouped into batches that never cross a partition
//! boundary.
//!
//! Unpublish batches are handed to the caller the moment they fill up.
//! Publish batches are collected and returned once the walk is complete.

use crate::chunker::Chunker;
use crate::error::Result;
use crate::formatter::{FormattedLog, LogItems};
use crate::model::{
    Batch, ContentItem, ContentKind, PublishBatch, PublishWorkItem, ResolvedEnvironment,
    UnpublishBatch, UnpublishWorkItem,
};
use tracing::debug;

/// One (environment, locale) slice of a formatted log
#[derive(Debug, Clone, Copy)]
pub struct Partition<'a> {
    pub environment: &'a ResolvedEnvironment,
    /// Locale for entry logs, `None` for assets
    pub locale: Option<&'a str>,
    pub items: &'a [ContentItem],
}

/// Partitions in traversal order: environments, then locales, then items
pub fn partitions(log: &FormattedLog) -> Vec<Partition<'_>> {
    let mut out = Vec::new();
    for environment in &log.environments {
        match &log.items {
            LogItems::Entries(groups) => {
                for group in groups {
                    out.push(Partition {
                        environment,
                        locale: Some(group.locale.as_str()),
                        items: &group.items,
                    });
                }
            }
            LogItems::Assets(items) => out.push(Partition {
                environment,
                locale: None,
                items,
            }),
        }
    }
    out
}

/// Result of a reconciliation walk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Publish batches in flush order, ready for paced replay
    pub pending_publish: Vec<PublishBatch>,
    /// Unpublish batches handed out during the walk
    pub unpublish_batches: usize,
    /// Partitions visited
    pub partitions: usize,
}

/// Builds batches from a formatted log
#[derive(Debug, Clone)]
pub struct Reconciler {
    batch_capacity: usize,
}

impl Reconciler {
    pub fn new(batch_capacity: usize) -> Self {
        Self { batch_capacity }
    }

    /// Walk every partition
    ///
    /// `on_unpublish` is called inline for every unpublish batch as soon as it
    /// is flushed. An error from it stops the walk.
    pub fn reconcile<F>(&self, log: &FormattedLog, mut on_unpublish: F) -> Result<ReconcilePlan>
    where
        F: FnMut(UnpublishBatch) -> Result<()>,
    {
        let kind = log.kind();
        let mut plan = ReconcilePlan::default();

        for partition in partitions(log) {
            self.reconcile_partition(kind, partition, &mut plan, &mut on_unpublish)?;
            plan.partitions += 1;
        }

        debug!(
            partitions = plan.partitions,
            unpublish_batches = plan.unpublish_batches,
            publish_batches = plan.pending_publish.len(),
            "Reconciliation complete"
        );
        Ok(plan)
    }

    fn reconcile_partition<F>(
        &self,
        kind: ContentKind,
        partition: Partition<'_>,
        plan: &mut ReconcilePlan,
        on_unpublish: &mut F,
    ) -> Result<()>
    where
        F: FnMut(UnpublishBatch) -> Result<()>,
    {
        let mut publish = Chunker::new(self.batch_capacity);
        let mut unpublish = Chunker::new(self.batch_capacity);
        let env_uid = partition.environment.uid.as_str();

        for item in partition.items {
            let mut matched = false;
            for detail in item.details_in(env_uid) {
                matched = true;
                let work = PublishWorkItem::from_detail(item, detail, partition.locale);
                if let Some(items) = publish.push(work) {
                    plan.pending_publish.push(batch(kind, &partition, items));
                }
            }

            if !matched {
                let work = UnpublishWorkItem::for_item(item, partition.locale);
                if let Some(items) = unpublish.push(work) {
                    plan.unpublish_batches += 1;
                    on_unpublish(batch(kind, &partition, items))?;
                }
            }
        }

        if let Some(items) = unpublish.flush_remainder() {
            plan.unpublish_batches += 1;
            on_unpublish(batch(kind, &partition, items))?;
        }
        if let Some(items) = publish.flush_remainder() {
            plan.pending_publish.push(batch(kind, &partition, items));
        }
        Ok(())
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(crate::model::BATCH_CAPACITY)
    }
}

fn batch<T>(kind: ContentKind, partition: &Partition<'_>, items: Vec<T>) -> Batch<T> {
    debug!(
        environment = %partition.environment.name,
        locale = partition.locale.unwrap_or("-"),
        size = items.len(),
        "Batch flushed"
    );
    Batch {
        content_kind: kind,
        environment: partition.environment.name.clone(),
        locale: partition.locale.map(str::to_owned),
        items,
    }
}
