//! Periodic scheduling of the pipeline passes.
//!
//! Each pass runs on its own tokio task as a sequential loop: run the
//! pass, log any failure, then sleep for the configured interval (or wake
//! on cancellation). Because the sleep only starts after the pass
//! returns, two invocations of the same pass can never overlap; a slow
//! pass simply delays its own next tick. The clock is injected so tests
//! can drive the cadence without real time.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tally_core::{storage::Storage, Clock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    classifier::Classifier, error::Result, reconciler::Reconciler, sweeper::Sweeper,
    DEFAULT_CLASSIFIER_BATCH_SIZE, DEFAULT_CLASSIFIER_INTERVAL_SECS,
    DEFAULT_RECENCY_WINDOW_SECS, DEFAULT_RECONCILE_INTERVAL_SECS, DEFAULT_RETENTION_WINDOW_SECS,
    DEFAULT_SWEEP_INTERVAL_SECS,
};

/// Configuration for the background pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How often the classifier pass runs.
    pub classifier_interval: Duration,

    /// Maximum events examined per classification pass.
    pub classifier_batch_size: i64,

    /// How often the reconciliation pass runs.
    pub reconcile_interval: Duration,

    /// How far back a marker touch still counts as "recently active".
    ///
    /// Must comfortably exceed the reconcile interval so an aging-out
    /// campaign gets at least one in-window recompute before its marker
    /// is evicted.
    pub recency_window: Duration,

    /// How often the retention sweep runs.
    pub sweep_interval: Duration,

    /// How long processed raw events are retained.
    pub retention_window: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classifier_interval: Duration::from_secs(DEFAULT_CLASSIFIER_INTERVAL_SECS),
            classifier_batch_size: DEFAULT_CLASSIFIER_BATCH_SIZE,
            reconcile_interval: Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
            recency_window: Duration::from_secs(DEFAULT_RECENCY_WINDOW_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            retention_window: Duration::from_secs(DEFAULT_RETENTION_WINDOW_SECS),
        }
    }
}

/// A pass the runner schedules on a fixed interval.
#[async_trait]
trait PeriodicTask: Send + Sync {
    /// Task name for logging.
    fn name(&self) -> &'static str;

    /// Runs one pass.
    async fn run(&self) -> Result<()>;
}

#[async_trait]
impl PeriodicTask for Classifier {
    fn name(&self) -> &'static str {
        "classifier"
    }

    async fn run(&self) -> Result<()> {
        self.run_pass().await.map(|_| ())
    }
}

#[async_trait]
impl PeriodicTask for Reconciler {
    fn name(&self) -> &'static str {
        "reconciler"
    }

    async fn run(&self) -> Result<()> {
        self.run_pass().await.map(|_| ())
    }
}

#[async_trait]
impl PeriodicTask for Sweeper {
    fn name(&self) -> &'static str {
        "sweeper"
    }

    async fn run(&self) -> Result<()> {
        self.run_pass().await.map(|_| ())
    }
}

/// Coordinates the three background passes.
pub struct Pipeline {
    storage: Storage,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
    cancellation_token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Creates a pipeline over the given storage and clock.
    pub fn new(storage: Storage, clock: Arc<dyn Clock>, config: PipelineConfig) -> Self {
        Self {
            storage,
            clock,
            config,
            cancellation_token: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Spawns the three pass loops.
    ///
    /// Returns immediately; the passes run until `shutdown` is called or
    /// the pipeline is dropped.
    pub fn start(&mut self) {
        info!(
            classifier_interval = ?self.config.classifier_interval,
            reconcile_interval = ?self.config.reconcile_interval,
            sweep_interval = ?self.config.sweep_interval,
            "starting pipeline"
        );

        let classifier = Arc::new(Classifier::new(
            self.storage.clone(),
            self.clock.clone(),
            self.config.classifier_batch_size,
        ));
        let reconciler = Arc::new(Reconciler::new(
            self.storage.clone(),
            self.clock.clone(),
            self.config.recency_window,
        ));
        let sweeper = Arc::new(Sweeper::new(
            self.storage.clone(),
            self.clock.clone(),
            self.config.retention_window,
        ));

        self.tasks.push(self.spawn_periodic(classifier, self.config.classifier_interval));
        self.tasks.push(self.spawn_periodic(reconciler, self.config.reconcile_interval));
        self.tasks.push(self.spawn_periodic(sweeper, self.config.sweep_interval));
    }

    /// Stops the pass loops and waits for in-flight passes to finish.
    pub async fn shutdown(self) {
        info!("shutting down pipeline");
        self.cancellation_token.cancel();

        for task in self.tasks {
            if let Err(error) = task.await {
                error!(error = %error, "pipeline task did not shut down cleanly");
            }
        }

        info!("pipeline stopped");
    }

    /// Spawns one sequential pass loop.
    fn spawn_periodic(&self, task: Arc<dyn PeriodicTask>, interval: Duration) -> JoinHandle<()> {
        let token = self.cancellation_token.clone();
        let clock = self.clock.clone();

        tokio::spawn(async move {
            info!(task = task.name(), "pipeline task starting");

            loop {
                if token.is_cancelled() {
                    break;
                }

                if let Err(error) = task.run().await {
                    // The pass is retried on its next tick; periodic task
                    // failures never propagate past this loop.
                    error!(task = task.name(), error = %error, "pass failed");
                }

                tokio::select! {
                    () = clock.sleep(interval) => {},
                    () = token.cancelled() => break,
                }
            }

            info!(task = task.name(), "pipeline task stopped");
        })
    }
}
