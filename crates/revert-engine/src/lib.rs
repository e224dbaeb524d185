//! Revert Engine
//!
//! Replays a historical publish log against the environments a stack still
//! has. Items that were published when the log was written are re-published
//! at their recorded version; items that were not are unpublished.
//!
//! ## Pipeline
//!
//! 1. [`environment`] resolves logged environment names to live uids
//! 2. [`formatter`] classifies the log and groups its records
//! 3. [`filter`] narrows publish details to resolved environments/locales
//! 4. [`reconciler`] walks each (environment, locale) partition and builds
//!    batches of at most [`BATCH_CAPACITY`] items
//! 5. [`dispatcher`] feeds the unpublish queue immediately and the publish
//!    queue through a paced replay once reconciliation is done
//!
//! [`retry`] replays a failure log directly onto the queues.
//!
//! ## Usage
//!
//! ```no_run
//! use revert_engine::{
//!     EngineConfig, PublishBatch, RecordingConsumer, ReconcileContext, RevertEngine,
//!     StaticDirectory, UnpublishBatch,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> revert_engine::Result<()> {
//! let ctx = ReconcileContext::new(
//!     EngineConfig::default(),
//!     Arc::new(StaticDirectory::from_pairs([("production", "blt-env-1")])),
//!     Arc::new(RecordingConsumer::<UnpublishBatch>::new()),
//!     Arc::new(RecordingConsumer::<PublishBatch>::new()),
//! );
//! let log = revert_engine::read_log(Path::new("bulk-publish-logs/entries.success")).await?;
//! let _outcome = RevertEngine::new(ctx).run(&log.records).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod chunker;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod environment;
pub mod error;
pub mod filter;
pub mod formatter;
pub mod log;
pub mod model;
pub mod queue;
pub mod reconciler;
pub mod retry;

// Re-exports
pub use chunker::Chunker;
pub use context::{EngineConfig, ReconcileContext, DEFAULT_PUBLISH_INTERVAL};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use engine::{RevertEngine, RevertOutcome, RevertSummary};
pub use environment::{
    resolve_environments, DirectoryError, EnvironmentDirectory, EnvironmentRecord,
    StaticDirectory,
};
pub use error::{ConsumerError, Result, RevertError};
pub use formatter::{format_log, FormattedLog, LocaleGroup, LogItems};
pub use log::{read_log, LogFile, LogMessage, RawLogRecord};
pub use model::{
    Batch, BatchKind, ContentItem, ContentKind, PublishBatch, PublishDetail, PublishWorkItem,
    ResolvedEnvironment, UnpublishBatch, UnpublishWorkItem, WorkItem, BATCH_CAPACITY,
};
pub use queue::{
    replay_paced, Consumer, QueueReport, QueueSender, RecordingConsumer, WorkQueue,
};
pub use reconciler::{ReconcilePlan, Reconciler};
pub use retry::{
    replay_raw, replay_typed, AssetRetryItem, EntryRetryItem, RetryCounts, RetryOutcome,
};
