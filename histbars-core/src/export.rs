//! CSV export of a response's records.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::response::HistoricalDataResponse;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV output is not valid UTF-8")]
    Utf8,
}

/// Write records as CSV: a header of column names, then one row per record.
///
/// Columns come from the first record; a field missing from a later record
/// is written as an empty cell. Nothing is written for an empty response.
pub fn write_csv<W: Write>(response: &HistoricalDataResponse, writer: W) -> Result<(), ExportError> {
    let columns = response.column_names();
    if columns.is_empty() {
        return Ok(());
    }

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&columns)?;
    for record in response.data() {
        wtr.write_record(
            columns
                .iter()
                .map(|name| record.get(name).map(|v| v.to_string()).unwrap_or_default()),
        )?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn to_csv_string(response: &HistoricalDataResponse) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_csv(response, &mut buf)?;
    String::from_utf8(buf).map_err(|_| ExportError::Utf8)
}

pub fn save_csv(response: &HistoricalDataResponse, path: &Path) -> Result<(), ExportError> {
    let file = File::create(path)?;
    write_csv(response, file)
}
