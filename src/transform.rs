use crate::constants;
use crate::error::{EtlError, Result};
use crate::metrics::PipelineMetrics;
use crate::types::{MissingColumns, OrderRow, OrderTable};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, instrument, warn};

/// Which occurrence of a repeated `OrderId` survives deduplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Keep the first row in table order (region order of concatenation).
    #[default]
    FirstSeen,
}

/// Row accounting for one transform run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformStats {
    pub input_rows: usize,
    pub duplicates_dropped: usize,
    pub non_positive_dropped: usize,
    pub output_rows: usize,
}

#[derive(Debug, Clone)]
pub struct TransformedBatch {
    pub rows: Vec<OrderRow>,
    pub stats: TransformStats,
}

/// Result of the transformer. A rejection is reported, not raised, and the
/// caller must not write anything to the store when it sees one.
#[derive(Debug, Clone)]
pub enum TransformOutcome {
    Clean(TransformedBatch),
    Rejected(MissingColumns),
}

struct ColumnIndexes {
    order_id: usize,
    order_item_id: usize,
    quantity_ordered: usize,
    item_price: usize,
    promotion_discount: usize,
    region: Option<usize>,
}

/// Apply the sales business rules to a combined order table.
///
/// Steps run in a fixed order: derive `total_sales` and `net_sale`, drop
/// repeated `OrderId`s, then drop rows whose net sale is not positive.
#[instrument(skip(table), fields(rows = table.len()))]
pub fn transform(table: &OrderTable, policy: DedupPolicy) -> Result<TransformOutcome> {
    let idx = match resolve_indexes(table) {
        Ok(idx) => idx,
        Err(missing) => {
            warn!("Error: Missing columns - {}", missing);
            PipelineMetrics::record_rejection();
            return Ok(TransformOutcome::Rejected(missing));
        }
    };

    let mut derived = Vec::with_capacity(table.len());
    for (i, cells) in table.rows().iter().enumerate() {
        let mut row = parse_row(cells, &idx, i + 1)?;
        row.derive_sales();
        derived.push(row);
    }

    let input_rows = derived.len();
    let deduped = dedup(derived, policy);
    let duplicates_dropped = input_rows - deduped.len();

    let after_dedup = deduped.len();
    let rows: Vec<OrderRow> = deduped
        .into_iter()
        .filter(OrderRow::has_positive_net_sale)
        .collect();

    let stats = TransformStats {
        input_rows,
        duplicates_dropped,
        non_positive_dropped: after_dedup - rows.len(),
        output_rows: rows.len(),
    };
    info!(
        input_rows = stats.input_rows,
        duplicates_dropped = stats.duplicates_dropped,
        non_positive_dropped = stats.non_positive_dropped,
        output_rows = stats.output_rows,
        "Transform complete"
    );
    PipelineMetrics::record_transform(&stats);

    Ok(TransformOutcome::Clean(TransformedBatch { rows, stats }))
}

fn dedup(rows: Vec<OrderRow>, policy: DedupPolicy) -> Vec<OrderRow> {
    match policy {
        DedupPolicy::FirstSeen => {
            let mut seen = HashSet::new();
            rows.into_iter()
                .filter(|row| seen.insert(row.order_id))
                .collect()
        }
    }
}

fn resolve_indexes(table: &OrderTable) -> std::result::Result<ColumnIndexes, MissingColumns> {
    match (
        table.column_index(constants::ORDER_ID),
        table.column_index(constants::ORDER_ITEM_ID),
        table.column_index(constants::QUANTITY_ORDERED),
        table.column_index(constants::ITEM_PRICE),
        table.column_index(constants::PROMOTION_DISCOUNT),
    ) {
        (
            Some(order_id),
            Some(order_item_id),
            Some(quantity_ordered),
            Some(item_price),
            Some(promotion_discount),
        ) => Ok(ColumnIndexes {
            order_id,
            order_item_id,
            quantity_ordered,
            item_price,
            promotion_discount,
            region: table.column_index(constants::REGION),
        }),
        _ => Err(MissingColumns::check(table).unwrap_or_default()),
    }
}

fn parse_row(cells: &[String], idx: &ColumnIndexes, row: usize) -> Result<OrderRow> {
    // Blank ids cannot be deduplicated or stored as a key.
    let order_id = parse_int(&cells[idx.order_id], row, constants::ORDER_ID)?
        .ok_or_else(|| invalid(row, constants::ORDER_ID, &cells[idx.order_id]))?;

    Ok(OrderRow {
        order_id,
        order_item_id: parse_int(&cells[idx.order_item_id], row, constants::ORDER_ITEM_ID)?,
        quantity_ordered: parse_int(
            &cells[idx.quantity_ordered],
            row,
            constants::QUANTITY_ORDERED,
        )?,
        item_price: parse_decimal(&cells[idx.item_price], row, constants::ITEM_PRICE)?,
        promotion_discount: parse_decimal(
            &cells[idx.promotion_discount],
            row,
            constants::PROMOTION_DISCOUNT,
        )?,
        region: idx
            .region
            .map(|i| cells[i].clone())
            .unwrap_or_default(),
        total_sales: None,
        net_sale: None,
    })
}

fn invalid(row: usize, column: &str, value: &str) -> EtlError {
    EtlError::InvalidValue {
        row,
        column: column.to_string(),
        value: value.to_string(),
    }
}

/// Integer cell; accepts integral float text such as `2.0` from spreadsheet exports.
fn parse_int(cell: &str, row: usize, column: &str) -> Result<Option<i64>> {
    let text = cell.trim();
    if text.is_empty() {
        return Ok(None);
    }
    if let Ok(v) = text.parse::<i64>() {
        return Ok(Some(v));
    }
    // `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
    match text.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 => {
            Ok(Some(v as i64))
        }
        _ => Err(invalid(row, column, cell)),
    }
}

fn parse_decimal(cell: &str, row: usize, column: &str) -> Result<Option<f64>> {
    let text = cell.trim();
    if text.is_empty() {
        return Ok(None);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(invalid(row, column, cell)),
    }
}
