//! Queue consumers backed by the management API
//!
//! Every consumer writes a success or failure record for what it did to its
//! run log, then reports the outcome to the queue worker.

use crate::client::{
    AssetPublishRequest, BulkUnpublishRequest, EntryPublishRequest, ManagementClient,
    PublishTarget,
};
use crate::error::{CliError, CliResult};
use crate::run_log::RunLog;
use async_trait::async_trait;
use revert_engine::{
    AssetRetryItem, Batch, Consumer, ConsumerError, ContentKind, EntryRetryItem, PublishBatch,
    PublishWorkItem, UnpublishBatch,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

fn note_write(result: CliResult<()>) {
    if let Err(e) = result {
        warn!(error = %e, "Failed to write run log");
    }
}

/// Unpublishes a whole batch with one bulk request
pub struct BulkUnpublishConsumer {
    client: Arc<ManagementClient>,
    log: Arc<RunLog>,
}

impl BulkUnpublishConsumer {
    pub fn new(client: Arc<ManagementClient>, log: Arc<RunLog>) -> Self {
        Self { client, log }
    }
}

#[async_trait]
impl Consumer<UnpublishBatch> for BulkUnpublishConsumer {
    async fn consume(&self, batch: UnpublishBatch) -> Result<(), ConsumerError> {
        let request = BulkUnpublishRequest::from_batch(&batch);
        match self.client.bulk_unpublish(&request).await {
            Ok(_) => {
                info!(
                    environment = %batch.environment,
                    locale = batch.locale.as_deref().unwrap_or("-"),
                    items = batch.len(),
                    "Unpublish request accepted"
                );
                note_write(self.log.success(&batch).await);
                Ok(())
            }
            Err(e) => {
                note_write(self.log.failure(&batch, &e.to_string()).await);
                Err(ConsumerError::Request(e.to_string()))
            }
        }
    }
}

/// Publishes each batch item at its recorded version, one request per item
pub struct VersionedPublishConsumer {
    client: Arc<ManagementClient>,
    log: Arc<RunLog>,
    asset_locale: String,
}

impl VersionedPublishConsumer {
    pub fn new(client: Arc<ManagementClient>, log: Arc<RunLog>, asset_locale: String) -> Self {
        Self {
            client,
            log,
            asset_locale,
        }
    }

    async fn publish(&self, batch: &PublishBatch, item: &PublishWorkItem) -> CliResult<()> {
        match batch.content_kind {
            ContentKind::Entry => {
                let content_type = item.content_type.as_deref().ok_or_else(|| {
                    CliError::InvalidInput(format!("entry {} has no content type", item.uid))
                })?;
                let locale = item.locale.clone().or_else(|| batch.locale.clone());
                let request = EntryPublishRequest {
                    entry: PublishTarget {
                        environments: vec![batch.environment.clone()],
                        locales: locale.iter().cloned().collect(),
                    },
                    locale,
                    version: Some(item.version),
                };
                self.client
                    .publish_entry(content_type, &item.uid, &request)
                    .await?;
            }
            ContentKind::Asset => {
                let request = AssetPublishRequest {
                    asset: PublishTarget {
                        environments: vec![batch.environment.clone()],
                        locales: vec![self.asset_locale.clone()],
                    },
                    version: Some(item.version),
                };
                self.client.publish_asset(&item.uid, &request).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Consumer<PublishBatch> for VersionedPublishConsumer {
    async fn consume(&self, batch: PublishBatch) -> Result<(), ConsumerError> {
        let total = batch.len();
        let mut published = Vec::with_capacity(total);
        let mut failed = 0;

        for item in &batch.items {
            match self.publish(&batch, item).await {
                Ok(()) => published.push(item.clone()),
                Err(e) => {
                    failed += 1;
                    warn!(
                        uid = %item.uid,
                        version = item.version,
                        environment = %batch.environment,
                        error = %e,
                        "Versioned publish failed"
                    );
                    // Failed items are logged one per line so each can be retried alone.
                    let single = Batch {
                        content_kind: batch.content_kind,
                        environment: batch.environment.clone(),
                        locale: batch.locale.clone(),
                        items: vec![item.clone()],
                    };
                    note_write(self.log.failure(&single, &e.to_string()).await);
                }
            }
        }

        if !published.is_empty() {
            info!(
                environment = %batch.environment,
                published = published.len(),
                "Publish batch done"
            );
            let done = Batch {
                items: published,
                ..batch
            };
            note_write(self.log.success(&done).await);
        }

        if failed > 0 {
            Err(ConsumerError::Partial { failed, total })
        } else {
            Ok(())
        }
    }
}

/// Re-publishes an entry from a failure log, without a version
pub struct EntryRetryConsumer {
    client: Arc<ManagementClient>,
    log: Arc<RunLog>,
}

impl EntryRetryConsumer {
    pub fn new(client: Arc<ManagementClient>, log: Arc<RunLog>) -> Self {
        Self { client, log }
    }

    async fn publish(&self, item: &EntryRetryItem) -> CliResult<()> {
        let content_type = item.content_type.as_deref().ok_or_else(|| {
            CliError::InvalidInput(format!("entry {} has no content type", item.entry_uid))
        })?;
        let request = EntryPublishRequest {
            entry: PublishTarget {
                environments: item.environments.clone(),
                locales: item.locale.iter().cloned().collect(),
            },
            locale: item.locale.clone(),
            version: None,
        };
        self.client
            .publish_entry(content_type, &item.entry_uid, &request)
            .await?;
        Ok(())
    }
}

/// Failure-log shape of an entry retry, readable by typed retry again
fn entry_record(item: &EntryRetryItem) -> serde_json::Value {
    json!({
        "Type": ContentKind::Entry.as_str(),
        "entryUid": item.entry_uid,
        "content_type": item.content_type,
        "locale": item.locale,
        "environments": item.environments,
        "publish_details": item.publish_details,
    })
}

fn asset_record(item: &AssetRetryItem) -> serde_json::Value {
    json!({
        "Type": ContentKind::Asset.as_str(),
        "assetUid": item.asset_uid,
        "environments": item.environments,
        "publish_assets": item.publish_details,
    })
}

#[async_trait]
impl Consumer<EntryRetryItem> for EntryRetryConsumer {
    async fn consume(&self, item: EntryRetryItem) -> Result<(), ConsumerError> {
        match self.publish(&item).await {
            Ok(()) => {
                info!(entry = %item.entry_uid, "Entry re-published");
                note_write(self.log.success(&entry_record(&item)).await);
                Ok(())
            }
            Err(e) => {
                note_write(self.log.failure(&entry_record(&item), &e.to_string()).await);
                Err(ConsumerError::Request(e.to_string()))
            }
        }
    }
}

/// Re-publishes an asset from a failure log, without a version
pub struct AssetRetryConsumer {
    client: Arc<ManagementClient>,
    log: Arc<RunLog>,
    asset_locale: String,
}

impl AssetRetryConsumer {
    pub fn new(client: Arc<ManagementClient>, log: Arc<RunLog>, asset_locale: String) -> Self {
        Self {
            client,
            log,
            asset_locale,
        }
    }
}

#[async_trait]
impl Consumer<AssetRetryItem> for AssetRetryConsumer {
    async fn consume(&self, item: AssetRetryItem) -> Result<(), ConsumerError> {
        let request = AssetPublishRequest {
            asset: PublishTarget {
                environments: item.environments.clone(),
                locales: vec![self.asset_locale.clone()],
            },
            version: None,
        };
        match self.client.publish_asset(&item.asset_uid, &request).await {
            Ok(_) => {
                info!(asset = %item.asset_uid, "Asset re-published");
                note_write(self.log.success(&asset_record(&item)).await);
                Ok(())
            }
            Err(e) => {
                note_write(self.log.failure(&asset_record(&item), &e.to_string()).await);
                Err(ConsumerError::Request(e.to_string()))
            }
        }
    }
}
