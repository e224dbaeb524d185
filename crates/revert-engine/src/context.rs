//! Per-run reconciliation context
//!
//! Carries configuration and the external collaborators of one run. Nothing
//! here is global, so independent runs can execute side by side.

use crate::environment::EnvironmentDirectory;
use crate::model::{PublishBatch, UnpublishBatch, BATCH_CAPACITY};
use crate::queue::Consumer;
use std::sync::Arc;
use std::time::Duration;

/// Default pause before each paced publish batch
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_secs(3);

/// Engine tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Work items per batch
    pub batch_capacity: usize,
    /// Delay inserted before each publish batch is handed to its consumer
    pub publish_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_capacity: BATCH_CAPACITY,
            publish_interval: DEFAULT_PUBLISH_INTERVAL,
        }
    }
}

impl EngineConfig {
    pub fn with_publish_interval(mut self, interval: Duration) -> Self {
        self.publish_interval = interval;
        self
    }
}

/// Everything one reconciliation run needs
#[derive(Clone)]
pub struct ReconcileContext {
    pub config: EngineConfig,
    /// Environment directory consulted once per run
    pub directory: Arc<dyn EnvironmentDirectory>,
    /// Executes unpublish batches
    pub unpublish_consumer: Arc<dyn Consumer<UnpublishBatch>>,
    /// Executes versioned publish batches
    pub publish_consumer: Arc<dyn Consumer<PublishBatch>>,
}

impl ReconcileContext {
    pub fn new(
        config: EngineConfig,
        directory: Arc<dyn EnvironmentDirectory>,
        unpublish_consumer: Arc<dyn Consumer<UnpublishBatch>>,
        publish_consumer: Arc<dyn Consumer<PublishBatch>>,
    ) -> Self {
        Self {
            config,
            directory,
            unpublish_consumer,
            publish_consumer,
        }
    }
}

impl std::fmt::Debug for ReconcileContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
