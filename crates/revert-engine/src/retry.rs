//! Replay of failed operations straight from a failure log
//!
//! Bypasses reconciliation entirely. In raw mode every record's payload is
//! pushed unchanged onto one queue. In typed mode records are reshaped into
//! entry or asset retry items according to their kind tag.

use crate::error::{Result, RevertError};
use crate::log::RawLogRecord;
use crate::model::ContentKind;
use crate::queue::QueueSender;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What a replay did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The log had no records; nothing was enqueued
    NoFailureLogs,
    /// Records were enqueued
    Replayed(RetryCounts),
}

/// Items enqueued per destination
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryCounts {
    pub raw: usize,
    pub entries: usize,
    pub assets: usize,
    /// Records that could not be turned into a job and were left out
    pub skipped: usize,
}

/// Entry publish retried from a failure log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRetryItem {
    #[serde(rename = "entryUid")]
    pub entry_uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Environment names to publish to
    #[serde(default)]
    pub environments: Vec<String>,
    /// Publish details exactly as logged
    #[serde(default)]
    pub publish_details: serde_json::Value,
}

/// Asset publish retried from a failure log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRetryItem {
    #[serde(rename = "assetUid")]
    pub asset_uid: String,
    #[serde(default)]
    pub environments: Vec<String>,
    #[serde(default)]
    pub publish_details: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct FailedOptions {
    #[serde(rename = "Type", default)]
    kind_tag: Option<String>,
    #[serde(rename = "entryUid", default)]
    entry_uid: Option<String>,
    #[serde(rename = "assetUid", default)]
    asset_uid: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    locale: Option<String>,
    #[serde(default)]
    environments: Option<Vec<String>>,
    #[serde(default)]
    publish_details: serde_json::Value,
    #[serde(default)]
    publish_assets: serde_json::Value,
}

/// Push every record's payload onto `queue` unchanged
///
/// A record whose payload does not fit the queue's job type is skipped with
/// a warning and counted; the rest of the log is still replayed.
pub fn replay_raw<T: DeserializeOwned>(
    records: &[RawLogRecord],
    queue: &QueueSender<T>,
) -> Result<RetryOutcome> {
    if records.is_empty() {
        info!("No failure logs found");
        return Ok(RetryOutcome::NoFailureLogs);
    }

    let mut counts = RetryCounts::default();
    for (index, record) in records.iter().enumerate() {
        match T::deserialize(&record.message.options) {
            Ok(job) => {
                queue.enqueue(job)?;
                counts.raw += 1;
            }
            Err(e) => skip(&mut counts, index, &e.to_string()),
        }
    }

    info!(
        queue = queue.name(),
        replayed = counts.raw,
        skipped = counts.skipped,
        "Failure log replayed"
    );
    Ok(RetryOutcome::Replayed(counts))
}

/// Reshape records by kind tag onto the entry and asset queues
///
/// Records tagged `entry` go to `entries`; anything else is treated as an
/// asset. Records without the uid their kind needs are skipped and counted.
pub fn replay_typed(
    records: &[RawLogRecord],
    entries: &QueueSender<EntryRetryItem>,
    assets: &QueueSender<AssetRetryItem>,
) -> Result<RetryOutcome> {
    if records.is_empty() {
        info!("No failure logs found");
        return Ok(RetryOutcome::NoFailureLogs);
    }

    let mut counts = RetryCounts::default();
    for (index, record) in records.iter().enumerate() {
        let options = match FailedOptions::deserialize(&record.message.options) {
            Ok(options) => options,
            Err(e) => {
                skip(&mut counts, index, &e.to_string());
                continue;
            }
        };

        let kind = options
            .kind_tag
            .as_deref()
            .and_then(ContentKind::from_tag)
            .unwrap_or(ContentKind::Asset);

        match kind {
            ContentKind::Entry => match entry_item(index, options) {
                Ok(item) => {
                    entries.enqueue(item)?;
                    counts.entries += 1;
                }
                Err(e) => skip(&mut counts, index, &e.to_string()),
            },
            ContentKind::Asset => match asset_item(index, options) {
                Ok(item) => {
                    assets.enqueue(item)?;
                    counts.assets += 1;
                }
                Err(e) => skip(&mut counts, index, &e.to_string()),
            },
        }
    }

    info!(
        entries = counts.entries,
        assets = counts.assets,
        skipped = counts.skipped,
        "Failure log replayed"
    );
    Ok(RetryOutcome::Replayed(counts))
}

fn skip(counts: &mut RetryCounts, index: usize, reason: &str) {
    warn!(index, reason, "Skipping malformed failure record");
    counts.skipped += 1;
}

fn entry_item(index: usize, options: FailedOptions) -> Result<EntryRetryItem> {
    let entry_uid = options.entry_uid.ok_or_else(|| RevertError::MalformedRecord {
        index,
        reason: "entry failure record has no entryUid".into(),
    })?;
    Ok(EntryRetryItem {
        entry_uid,
        content_type: options.content_type,
        locale: options.locale,
        environments: options.environments.unwrap_or_default(),
        publish_details: options.publish_details,
    })
}

fn asset_item(index: usize, options: FailedOptions) -> Result<AssetRetryItem> {
    let asset_uid = options.asset_uid.ok_or_else(|| RevertError::MalformedRecord {
        index,
        reason: "asset failure record has no assetUid".into(),
    })?;
    if options.environments.is_none() {
        warn!(index, asset = %asset_uid, "Asset failure record has no environments");
    }
    Ok(AssetRetryItem {
        asset_uid,
        environments: options.environments.unwrap_or_default(),
        publish_details: options.publish_assets,
    })
}
