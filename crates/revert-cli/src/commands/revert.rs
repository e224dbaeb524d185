//! Revert a publish log

use super::load_log;
use crate::client::ManagementClient;
use crate::config::RevertConfig;
use crate::consumers::{BulkUnpublishConsumer, VersionedPublishConsumer};
use crate::error::CliResult;
use crate::output::{print_error, print_info, print_summary};
use crate::run_log::RunLog;
use dialoguer::Confirm;
use revert_engine::{ReconcileContext, RevertEngine, RevertOutcome};
use std::sync::Arc;

/// Run logs written by a revert
pub const UNPUBLISH_LOG: &str = "revert-unpublish";
pub const PUBLISH_LOG: &str = "revert-publish";

/// Execute a revert of `log_file`
pub async fn execute(log_file: &str, assume_yes: bool, config: &RevertConfig) -> CliResult<()> {
    let path = config.resolve_log_path(log_file);
    let Some(log) = load_log(&path).await? else {
        return Ok(());
    };
    if log.is_empty() {
        print_error("Log file is empty");
        return Ok(());
    }

    if !assume_yes {
        let proceed = Confirm::new()
            .with_prompt(format!(
                "Revert {} records from {}? Items will be unpublished or re-published",
                log.len(),
                path.display()
            ))
            .default(false)
            .interact()?;
        if !proceed {
            print_info("Revert cancelled");
            return Ok(());
        }
    }

    let client = Arc::new(ManagementClient::new(config)?);
    let unpublish_log = Arc::new(
        RunLog::start(&config.log_dir, UNPUBLISH_LOG, config.api_key.clone()).await?,
    );
    let publish_log =
        Arc::new(RunLog::start(&config.log_dir, PUBLISH_LOG, config.api_key.clone()).await?);

    let ctx = ReconcileContext::new(
        config.engine_config(),
        client.clone(),
        Arc::new(BulkUnpublishConsumer::new(
            client.clone(),
            unpublish_log.clone(),
        )),
        Arc::new(VersionedPublishConsumer::new(
            client,
            publish_log.clone(),
            config.default_asset_locale.clone(),
        )),
    );

    match RevertEngine::new(ctx).run(&log.records).await? {
        RevertOutcome::EmptyLog => print_error("Log file is empty"),
        RevertOutcome::Completed(summary) => print_summary(
            &summary,
            [unpublish_log.failure_path(), publish_log.failure_path()],
        ),
    }
    Ok(())
}
