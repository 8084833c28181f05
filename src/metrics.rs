//! Pipeline counters
//!
//! Row losses in the transformer (duplicates, non-positive net sales) are
//! recorded here so they are never silent. `init_metrics` installs a
//! Prometheus recorder whose snapshot the binary logs at the end of a run.

use crate::transform::TransformStats;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::warn;

pub const ROWS_LOADED: &str = "sales_etl_rows_loaded_total";
pub const DUPLICATES_DROPPED: &str = "sales_etl_duplicates_dropped_total";
pub const NON_POSITIVE_DROPPED: &str = "sales_etl_non_positive_dropped_total";
pub const ROWS_WRITTEN: &str = "sales_etl_rows_written_total";
pub const BATCHES_REJECTED: &str = "sales_etl_batches_rejected_total";

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global recorder. Idempotent; returns `false` if another
/// recorder was already installed.
pub fn init_metrics() -> bool {
    if HANDLE.get().is_some() {
        return true;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            true
        }
        Err(e) => {
            warn!("Failed to install metrics recorder: {}", e);
            false
        }
    }
}

/// Prometheus text snapshot of every counter recorded so far.
pub fn render() -> Option<String> {
    HANDLE.get().map(PrometheusHandle::render)
}

pub struct PipelineMetrics;

impl PipelineMetrics {
    /// Record the outcome of a successful transform
    pub fn record_transform(stats: &TransformStats) {
        ::metrics::counter!(ROWS_LOADED).increment(stats.input_rows as u64);
        ::metrics::counter!(DUPLICATES_DROPPED).increment(stats.duplicates_dropped as u64);
        ::metrics::counter!(NON_POSITIVE_DROPPED).increment(stats.non_positive_dropped as u64);
    }

    pub fn record_rows_written(rows: usize) {
        ::metrics::counter!(ROWS_WRITTEN).increment(rows as u64);
    }

    pub fn record_rejection() {
        ::metrics::counter!(BATCHES_REJECTED).increment(1);
    }
}
