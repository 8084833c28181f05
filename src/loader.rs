use crate::constants;
use crate::error::{EtlError, Result};
use crate::types::OrderTable;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Read a regional order export and tag every row with `region`.
///
/// The first record is the header. Header names are trimmed of surrounding
/// whitespace since some exports pad them (`" OrderId"`).
#[instrument(skip_all, fields(path = %path.as_ref().display(), region = %region))]
pub fn load_orders(path: impl AsRef<Path>, region: &str) -> Result<OrderTable> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|source| EtlError::DataAccess {
            path: path.to_path_buf(),
            source,
        })?;

    let table = read_table(reader, region).map_err(|source| EtlError::DataAccess {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        "Column names for {}: {:?}",
        path.display(),
        table.columns()
    );
    debug!("Loaded {} rows", table.len());
    Ok(table)
}

/// Same as [`load_orders`] but over an already-open reader.
#[cfg(test)]
pub(crate) fn load_orders_from_reader<R: Read>(input: R, region: &str) -> Result<OrderTable> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input);
    read_table(reader, region).map_err(|source| EtlError::DataAccess {
        path: "<reader>".into(),
        source,
    })
}

fn read_table<R: Read>(
    mut reader: csv::Reader<R>,
    region: &str,
) -> std::result::Result<OrderTable, csv::Error> {
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut table = OrderTable::new(columns);
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(str::to_string).collect());
    }

    table.set_constant_column(constants::REGION, region);
    Ok(table)
}
