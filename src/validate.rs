use crate::constants::SALES_TABLE;
use crate::error::Result;
use crate::storage::SqliteStore;
use serde::Serialize;
use std::fmt;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSales {
    pub region: String,
    pub total_sales: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateOrderId {
    pub order_id: i64,
    pub count: i64,
}

/// Read-only diagnostics over the persisted sales table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub total_records: i64,
    pub sales_by_region: Vec<RegionSales>,
    pub average_net_sale: Option<f64>,
    pub duplicate_order_ids: Vec<DuplicateOrderId>,
}

impl ValidationReport {
    /// `false` when the store holds repeated order ids, which a successful
    /// run never produces.
    pub fn is_consistent(&self) -> bool {
        self.duplicate_order_ids.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Records: {}", self.total_records)?;

        writeln!(f, "Total Sales by Region:")?;
        for entry in &self.sales_by_region {
            writeln!(f, "   {:<10} {:.2}", entry.region, entry.total_sales)?;
        }

        writeln!(f, "Average Sales per Transaction:")?;
        match self.average_net_sale {
            Some(avg) => writeln!(f, "   {avg:.2}")?,
            None => writeln!(f, "   n/a")?,
        }

        writeln!(f, "Duplicate OrderId Check:")?;
        if self.duplicate_order_ids.is_empty() {
            writeln!(f, "   none")?;
        }
        for dup in &self.duplicate_order_ids {
            writeln!(f, "   OrderId {} appears {} times", dup.order_id, dup.count)?;
        }
        Ok(())
    }
}

/// Run the validation queries against `store`. Nothing is written.
#[instrument(skip(store), fields(store = %store.path().display()))]
pub fn validate(store: &SqliteStore) -> Result<ValidationReport> {
    let conn = store.connection();

    let total_records: i64 =
        conn.query_row(&format!("SELECT COUNT(*) FROM {SALES_TABLE}"), [], |row| {
            row.get(0)
        })?;

    let mut stmt = conn.prepare(&format!(
        "SELECT region, SUM(total_sales) FROM {SALES_TABLE} GROUP BY region ORDER BY region"
    ))?;
    let sales_by_region = stmt
        .query_map([], |row| {
            Ok(RegionSales {
                region: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                total_sales: row.get::<_, Option<f64>>(1)?.unwrap_or_default(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let average_net_sale: Option<f64> = conn.query_row(
        &format!("SELECT AVG(net_sale) FROM {SALES_TABLE}"),
        [],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT OrderId, COUNT(*) FROM {SALES_TABLE}
         GROUP BY OrderId HAVING COUNT(*) > 1 ORDER BY OrderId"
    ))?;
    let duplicate_order_ids = stmt
        .query_map([], |row| {
            Ok(DuplicateOrderId {
                order_id: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(ValidationReport {
        total_records,
        sales_by_region,
        average_net_sale,
        duplicate_order_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::storage::SalesSink;
    use crate::types::OrderRow;

    fn row(order_id: i64, region: &str, total: f64, net: f64) -> OrderRow {
        OrderRow {
            order_id,
            order_item_id: Some(1),
            quantity_ordered: Some(1),
            item_price: Some(total),
            promotion_discount: Some(total - net),
            region: region.to_string(),
            total_sales: Some(total),
            net_sale: Some(net),
        }
    }

    #[test]
    fn test_report_aggregates() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .replace_sales(&[
                row(1, "A", 20.0, 15.0),
                row(2, "B", 10.0, 10.0),
                row(3, "A", 5.0, 5.0),
            ])
            .unwrap();

        let report = validate(&store).unwrap();

        assert_eq!(report.total_records, 3);
        assert_eq!(
            report.sales_by_region,
            vec![
                RegionSales { region: "A".into(), total_sales: 25.0 },
                RegionSales { region: "B".into(), total_sales: 10.0 },
            ]
        );
        assert_eq!(report.average_net_sale, Some(10.0));
        assert!(report.is_consistent());
    }

    #[test]
    fn test_empty_table_has_no_average() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.replace_sales(&[]).unwrap();

        let report = validate(&store).unwrap();

        assert_eq!(report.total_records, 0);
        assert!(report.sales_by_region.is_empty());
        assert_eq!(report.average_net_sale, None);
    }

    #[test]
    fn test_duplicates_are_reported() {
        // A table written outside the pipeline, without the primary key.
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TABLE sales_data (OrderId INTEGER, OrderItemId INTEGER,
                     QuantityOrdered INTEGER, ItemPrice REAL, PromotionDiscount REAL,
                     region TEXT, total_sales REAL, net_sale REAL);
                 INSERT INTO sales_data VALUES (4, 1, 1, 2.0, 0.0, 'A', 2.0, 2.0);
                 INSERT INTO sales_data VALUES (4, 2, 1, 3.0, 0.0, 'B', 3.0, 3.0);",
            )
            .unwrap();

        let report = validate(&store).unwrap();

        assert!(!report.is_consistent());
        assert_eq!(
            report.duplicate_order_ids,
            vec![DuplicateOrderId { order_id: 4, count: 2 }]
        );
        assert!(report.to_string().contains("OrderId 4 appears 2 times"));
    }

    #[test]
    fn test_missing_table_is_store_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = validate(&store).unwrap_err();
        assert!(matches!(err, EtlError::Store(_)));
    }
}
