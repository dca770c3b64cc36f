//! Background pipeline for campaign engagement state.
//!
//! Three independently scheduled passes drain the work the ingestion
//! endpoint defers:
//!
//! 1. **Classifier** - folds unprocessed raw events into campaign
//!    engagement state, in arrival order, and marks them processed.
//! 2. **Reconciler** - recomputes cached stats for campaigns touched
//!    within the recency window, then evicts stale activity markers.
//! 3. **Sweeper** - deletes processed raw events past the retention
//!    window.
//!
//! Each pass runs as a sequential loop on its own tokio task: the next
//! tick is not scheduled until the current pass returns, so passes of the
//! same kind never overlap. Failures inside a pass are logged and the
//! affected items retried on the next tick; a pass never crashes the
//! process or halts subsequent runs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod classifier;
pub mod error;
pub mod reconciler;
pub mod runner;
pub mod sweeper;

pub use classifier::{Classifier, FoldAction, FoldOutcome, PassSummary, SkipReason};
pub use error::{PipelineError, Result};
pub use reconciler::{ReconcileSummary, Reconciler};
pub use runner::{Pipeline, PipelineConfig};
pub use sweeper::Sweeper;

/// Default interval between classification passes.
pub const DEFAULT_CLASSIFIER_INTERVAL_SECS: u64 = 10;

/// Default maximum events examined per classification pass.
pub const DEFAULT_CLASSIFIER_BATCH_SIZE: i64 = 500;

/// Default interval between reconciliation passes.
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 30;

/// Default recency window for active-campaign markers.
pub const DEFAULT_RECENCY_WINDOW_SECS: u64 = 120;

/// Default interval between retention sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Default retention window for processed raw events.
pub const DEFAULT_RETENTION_WINDOW_SECS: u64 = 600;

/// Converts a std duration into a chrono duration for cutoff arithmetic.
pub(crate) fn chrono_window(window: std::time::Duration) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(window.as_secs()).unwrap_or(i64::MAX))
}
