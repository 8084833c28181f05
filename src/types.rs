use crate::constants;

/// An in-memory table of order lines as read from one or more regional exports.
///
/// Cells are kept as raw text until the transformer parses them; a column that
/// is absent from one source is represented by blank cells for that source's rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl OrderTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding short rows with blank cells and dropping any
    /// cells beyond the table's width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Set `name` to `value` on every row, adding the column if needed.
    pub fn set_constant_column(&mut self, name: &str, value: &str) {
        match self.column_index(name) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = value.to_string();
                }
            }
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(value.to_string());
                }
            }
        }
    }

    /// Stack tables top to bottom. Row order is preserved and the resulting
    /// columns are the union of all inputs in first-seen order.
    pub fn concat<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = OrderTable>,
    {
        let tables: Vec<OrderTable> = tables.into_iter().collect();

        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut combined = OrderTable::new(columns);
        for table in tables {
            let mapping: Vec<Option<usize>> = combined
                .columns
                .iter()
                .map(|c| table.column_index(c))
                .collect();
            for row in table.rows {
                let aligned = mapping
                    .iter()
                    .map(|idx| idx.map(|i| row[i].clone()).unwrap_or_default())
                    .collect();
                combined.rows.push(aligned);
            }
        }
        combined
    }
}

/// One cleaned order line, ready for the sales store.
///
/// Operands read from blank cells are `None`, as are derived values that depend
/// on them. Rows leaving the transformer always carry a positive `net_sale`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub order_id: i64,
    pub order_item_id: Option<i64>,
    pub quantity_ordered: Option<i64>,
    pub item_price: Option<f64>,
    pub promotion_discount: Option<f64>,
    pub region: String,
    pub total_sales: Option<f64>,
    pub net_sale: Option<f64>,
}

impl OrderRow {
    /// Fill `total_sales` and then `net_sale`, which depends on it.
    pub fn derive_sales(&mut self) {
        self.total_sales = match (self.quantity_ordered, self.item_price) {
            (Some(qty), Some(price)) => Some(qty as f64 * price),
            _ => None,
        };
        self.net_sale = match (self.total_sales, self.promotion_discount) {
            (Some(total), Some(discount)) => Some(total - discount),
            _ => None,
        };
    }

    pub fn has_positive_net_sale(&self) -> bool {
        matches!(self.net_sale, Some(net) if net > 0.0)
    }
}

/// Required columns absent from a combined table, in required-set order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingColumns(pub Vec<String>);

impl MissingColumns {
    /// Check `table` against the required columns, returning `None` when all are present.
    pub fn check(table: &OrderTable) -> Option<Self> {
        let missing: Vec<String> = constants::REQUIRED_COLUMNS
            .iter()
            .filter(|c| !table.has_column(c))
            .map(|c| c.to_string())
            .collect();
        if missing.is_empty() {
            None
        } else {
            Some(Self(missing))
        }
    }
}

impl std::fmt::Display for MissingColumns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}
