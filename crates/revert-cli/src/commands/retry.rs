//! Retry failed operations from a revert failure log

use super::load_log;
use super::revert::{PUBLISH_LOG, UNPUBLISH_LOG};
use crate::client::ManagementClient;
use crate::config::RevertConfig;
use crate::consumers::{
    AssetRetryConsumer, BulkUnpublishConsumer, EntryRetryConsumer, VersionedPublishConsumer,
};
use crate::error::{CliError, CliResult};
use crate::output::{failure_lines, print_info, print_retry, print_warning};
use crate::run_log::RunLog;
use revert_engine::{
    replay_raw, replay_typed, AssetRetryItem, EntryRetryItem, PublishBatch, RetryOutcome,
    UnpublishBatch, WorkQueue,
};
use std::path::Path;
use std::sync::Arc;

/// Run log written by typed retries
const RETRY_LOG: &str = "revert-retry";

/// Queue a raw retry replays onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RetryTarget {
    /// Bulk unpublish queue
    Unpublish,
    /// Versioned publish queue
    Publish,
}

impl RetryTarget {
    /// Infer the target from a run log name such as `revert-unpublish.error`
    pub fn from_file_name(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.starts_with(UNPUBLISH_LOG) {
            Some(Self::Unpublish)
        } else if name.starts_with(PUBLISH_LOG) {
            Some(Self::Publish)
        } else {
            None
        }
    }
}

/// Execute a retry of `log_file`
pub async fn execute(
    log_file: &str,
    target: Option<RetryTarget>,
    typed: bool,
    config: &RevertConfig,
) -> CliResult<()> {
    let path = config.resolve_log_path(log_file);
    let Some(log) = load_log(&path).await? else {
        return Ok(());
    };
    if log.is_empty() {
        print_info("No failure logs found");
        return Ok(());
    }

    let target = if typed {
        None
    } else {
        let target = target
            .or_else(|| RetryTarget::from_file_name(&path))
            .ok_or_else(|| {
                CliError::InvalidInput(format!(
                    "cannot infer retry target from {}; pass --target",
                    path.display()
                ))
            })?;
        Some(target)
    };

    let client = Arc::new(ManagementClient::new(config)?);
    let api_key = config.api_key.clone();

    // Failures are written to their own log, never back into the one being replayed.
    let (outcome, reports) = match target {
        Some(RetryTarget::Unpublish) => {
            let run_log = Arc::new(
                RunLog::start(&config.log_dir, &retry_log_name(UNPUBLISH_LOG), api_key).await?,
            );
            let consumer = BulkUnpublishConsumer::new(client, run_log.clone());
            let queue = WorkQueue::<UnpublishBatch>::spawn("unpublish", Arc::new(consumer));
            let outcome = replay_raw(&log.records, &queue.sender());
            let report = queue.close().await?;
            (outcome?, vec![(report, run_log)])
        }
        Some(RetryTarget::Publish) => {
            let run_log = Arc::new(
                RunLog::start(&config.log_dir, &retry_log_name(PUBLISH_LOG), api_key).await?,
            );
            let consumer = VersionedPublishConsumer::new(
                client,
                run_log.clone(),
                config.default_asset_locale.clone(),
            );
            let queue = WorkQueue::<PublishBatch>::spawn("publish", Arc::new(consumer));
            let outcome = replay_raw(&log.records, &queue.sender());
            let report = queue.close().await?;
            (outcome?, vec![(report, run_log)])
        }
        None => {
            let run_log = Arc::new(RunLog::start(&config.log_dir, RETRY_LOG, api_key).await?);
            let entries = WorkQueue::<EntryRetryItem>::spawn(
                "entries",
                Arc::new(EntryRetryConsumer::new(client.clone(), run_log.clone())),
            );
            let assets = WorkQueue::<AssetRetryItem>::spawn(
                "assets",
                Arc::new(AssetRetryConsumer::new(
                    client,
                    run_log.clone(),
                    config.default_asset_locale.clone(),
                )),
            );
            let outcome = replay_typed(&log.records, &entries.sender(), &assets.sender());
            let (entries, assets) = tokio::join!(entries.close(), assets.close());
            (
                outcome?,
                vec![(entries?, run_log.clone()), (assets?, run_log)],
            )
        }
    };

    match outcome {
        RetryOutcome::NoFailureLogs => print_info("No failure logs found"),
        RetryOutcome::Replayed(counts) => {
            print_retry(&counts);
            let queues: Vec<_> = reports
                .iter()
                .map(|(report, run_log)| (report, run_log.failure_path()))
                .collect();
            for line in failure_lines(&queues) {
                print_warning(&line);
            }
        }
    }
    Ok(())
}

/// Run log a raw retry of `source` writes, e.g. `revert-unpublish-retry`
fn retry_log_name(source: &str) -> String {
    format!("{}-retry", source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::config_for;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn line_count(path: &Path) -> usize {
        std::fs::read_to_string(path).unwrap().lines().count()
    }

    #[tokio::test]
    async fn test_repeated_retry_replays_same_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/bulk/unpublish"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let config = RevertConfig {
            log_dir: dir.path().to_path_buf(),
            ..config_for(&server)
        };

        let source = dir.path().join("revert-unpublish.error");
        let record = json!({
            "level": "error",
            "message": {
                "api_key": "blt-stack",
                "options": {
                    "Type": "entry",
                    "environment": "blt-env-prod",
                    "locale": "en-us",
                    "items": [{"uid": "e1", "locale": "en-us", "content_type": "article"}],
                },
            },
            "error": "API error: 500",
        });
        std::fs::write(&source, format!("{}\n", record)).unwrap();

        let retry_failures = dir.path().join("revert-unpublish-retry.error");
        for attempt in 1..=2 {
            execute("revert-unpublish.error", None, false, &config)
                .await
                .unwrap();
            assert_eq!(server.received_requests().await.unwrap().len(), attempt);
            assert_eq!(line_count(&source), 1);
            assert_eq!(line_count(&retry_failures), 1);
        }

        // Retrying the retry log rewrites it in place without growing it.
        execute("revert-unpublish-retry.error", None, false, &config)
            .await
            .unwrap();
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
        assert_eq!(line_count(&retry_failures), 1);
    }

    #[test]
    fn test_target_from_file_name() {
        assert_eq!(
            RetryTarget::from_file_name(Path::new("logs/revert-unpublish.error")),
            Some(RetryTarget::Unpublish)
        );
        assert_eq!(
            RetryTarget::from_file_name(Path::new("revert-publish.error")),
            Some(RetryTarget::Publish)
        );
        assert_eq!(
            RetryTarget::from_file_name(Path::new("revert-publish-retry.error")),
            Some(RetryTarget::Publish)
        );
        assert_eq!(
            RetryTarget::from_file_name(Path::new("1587.publish-entries.error")),
            None
        );
    }
}
