use crate::config::SourceConfig;
use crate::error::Result;
use crate::loader::load_orders;
use crate::metrics::PipelineMetrics;
use crate::storage::SalesSink;
use crate::transform::{transform, DedupPolicy, TransformOutcome, TransformStats};
use crate::types::OrderTable;
use crate::validate::ValidationReport;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Rows read from one regional export
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub path: PathBuf,
    pub region: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Written {
        stats: TransformStats,
        rows_written: usize,
    },
    /// Required columns were missing; the store was not touched.
    Rejected { missing_columns: Vec<String> },
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub sources: Vec<SourceSummary>,
    pub outcome: RunOutcome,
}

impl PipelineResult {
    pub fn is_written(&self) -> bool {
        matches!(self.outcome, RunOutcome::Written { .. })
    }
}

/// Everything a run prints, as one document: the pipeline result and, when
/// the validation queries ran, their report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run: PipelineResult,
    pub validation: Option<ValidationReport>,
}

impl RunReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct Pipeline;

impl Pipeline {
    /// Load every source and stack them in the given order.
    #[instrument(skip(sources), fields(sources = sources.len()))]
    pub fn extract(sources: &[SourceConfig]) -> Result<(OrderTable, Vec<SourceSummary>)> {
        let mut tables = Vec::with_capacity(sources.len());
        let mut summaries = Vec::with_capacity(sources.len());
        for source in sources {
            let table = load_orders(&source.path, &source.region)?;
            summaries.push(SourceSummary {
                path: source.path.clone(),
                region: source.region.clone(),
                rows: table.len(),
            });
            tables.push(table);
        }
        Ok((OrderTable::concat(tables), summaries))
    }

    /// Run extract, transform and load against `sink`.
    ///
    /// Any source failure aborts before the sink is touched, and a rejected
    /// batch returns [`RunOutcome::Rejected`] without calling the sink.
    #[instrument(skip_all)]
    pub fn run<S: SalesSink + ?Sized>(
        sources: &[SourceConfig],
        dedup: DedupPolicy,
        sink: &mut S,
    ) -> Result<PipelineResult> {
        let (combined, summaries) = Self::extract(sources)?;
        info!("Combined {} rows from {} sources", combined.len(), summaries.len());

        let outcome = match transform(&combined, dedup)? {
            TransformOutcome::Rejected(missing) => {
                warn!("Transformation failed due to missing columns; store left unchanged");
                RunOutcome::Rejected {
                    missing_columns: missing.0,
                }
            }
            TransformOutcome::Clean(batch) => {
                let rows_written = sink.replace_sales(&batch.rows)?;
                PipelineMetrics::record_rows_written(rows_written);
                RunOutcome::Written {
                    stats: batch.stats,
                    rows_written,
                }
            }
        };

        Ok(PipelineResult {
            sources: summaries,
            outcome,
        })
    }
}
