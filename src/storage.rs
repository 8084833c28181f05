use crate::constants::SALES_TABLE;
use crate::error::{EtlError, Result};
use crate::types::OrderRow;
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Destination for cleaned order rows.
///
/// Each call replaces the full contents of the sales table; implementations
/// must make the new rows visible all at once or not at all.
pub trait SalesSink {
    /// Replace every stored row with `rows`, returning the number written.
    fn replace_sales(&mut self, rows: &[OrderRow]) -> Result<usize>;
}

/// SQLite-backed sales store holding the `sales_data` table.
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path)?;
        debug!("Opened sales store at {}", path.display());
        Ok(Self { conn, path })
    }

    /// Open an existing store without write access. Nothing is created when
    /// `path` is missing.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(EtlError::StoreNotFound(path));
        }
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!("Opened sales store read-only at {}", path.display());
        Ok(Self { conn, path })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn has_sales_table(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![SALES_TABLE],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// All stored rows ordered by `OrderId`.
    pub fn fetch_sales(&self) -> Result<Vec<OrderRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT OrderId, OrderItemId, QuantityOrdered, ItemPrice, PromotionDiscount,
                    region, total_sales, net_sale
             FROM {SALES_TABLE} ORDER BY OrderId"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(OrderRow {
                order_id: row.get(0)?,
                order_item_id: row.get(1)?,
                quantity_ordered: row.get(2)?,
                item_price: row.get(3)?,
                promotion_discount: row.get(4)?,
                region: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                total_sales: row.get(6)?,
                net_sale: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

impl SalesSink for SqliteStore {
    #[instrument(skip(self, rows), fields(store = %self.path.display(), rows = rows.len()))]
    fn replace_sales(&mut self, rows: &[OrderRow]) -> Result<usize> {
        // Dropping the transaction without commit rolls back, so an error
        // anywhere below leaves the previous table untouched.
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            r#"
            DROP TABLE IF EXISTS {SALES_TABLE};
            CREATE TABLE {SALES_TABLE} (
                OrderId           INTEGER PRIMARY KEY,
                OrderItemId       INTEGER,
                QuantityOrdered   INTEGER,
                ItemPrice         REAL,
                PromotionDiscount REAL,
                region            TEXT,
                total_sales       REAL,
                net_sale          REAL
            );
            "#
        ))?;

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {SALES_TABLE} (OrderId, OrderItemId, QuantityOrdered, ItemPrice,
                     PromotionDiscount, region, total_sales, net_sale)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ))?;
            for row in rows {
                stmt.execute(params![
                    row.order_id,
                    row.order_item_id,
                    row.quantity_ordered,
                    row.item_price,
                    row.promotion_discount,
                    row.region,
                    row.total_sales,
                    row.net_sale,
                ])?;
            }
        }

        tx.commit()?;
        info!("Replaced {} with {} rows", SALES_TABLE, rows.len());
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(order_id: i64, region: &str, qty: i64, price: f64, discount: f64) -> OrderRow {
        let mut row = OrderRow {
            order_id,
            order_item_id: Some(1),
            quantity_ordered: Some(qty),
            item_price: Some(price),
            promotion_discount: Some(discount),
            region: region.to_string(),
            total_sales: None,
            net_sale: None,
        };
        row.derive_sales();
        row
    }

    #[test]
    fn test_replace_overwrites_previous_contents() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .replace_sales(&[row(1, "A", 1, 5.0, 0.0), row(2, "A", 1, 6.0, 0.0)])
            .unwrap();
        store.replace_sales(&[row(3, "B", 2, 2.0, 1.0)]).unwrap();

        let stored = store.fetch_sales().unwrap();
        assert_eq!(stored, vec![row(3, "B", 2, 2.0, 1.0)]);
    }

    #[test]
    fn test_failed_write_keeps_prior_rows() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.replace_sales(&[row(1, "A", 1, 5.0, 0.0)]).unwrap();

        // Duplicate primary keys abort the insert mid-way.
        let err = store
            .replace_sales(&[row(9, "B", 1, 1.0, 0.0), row(9, "B", 1, 2.0, 0.0)])
            .unwrap_err();
        assert!(matches!(err, EtlError::Store(_)));

        let stored = store.fetch_sales().unwrap();
        assert_eq!(stored, vec![row(1, "A", 1, 5.0, 0.0)]);
    }

    #[test]
    fn test_read_only_open_leaves_missing_store_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub").join("sales.db");

        let err = SqliteStore::open_read_only(&path).err().unwrap();

        assert!(matches!(err, EtlError::StoreNotFound(_)));
        assert!(!path.exists());
        assert!(!dir.path().join("sub").exists());
    }

    #[test]
    fn test_read_only_store_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales.db");
        SqliteStore::open(&path)
            .unwrap()
            .replace_sales(&[row(1, "A", 1, 5.0, 0.0)])
            .unwrap();

        let mut store = SqliteStore::open_read_only(&path).unwrap();

        assert_eq!(store.fetch_sales().unwrap(), vec![row(1, "A", 1, 5.0, 0.0)]);
        assert!(matches!(
            store.replace_sales(&[]).unwrap_err(),
            EtlError::Store(_)
        ));
        assert_eq!(store.fetch_sales().unwrap().len(), 1);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("sales.db");
        let mut store = SqliteStore::open(&path).unwrap();
        assert!(!store.has_sales_table().unwrap());

        store.replace_sales(&[]).unwrap();
        assert!(store.has_sales_table().unwrap());
        assert!(path.exists());
    }
}
