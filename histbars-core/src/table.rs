//! Tabular view of records as a polars `DataFrame`.
//!
//! The first column is `date`, parsed into a millisecond `Datetime` and
//! serving as the row index; the remaining fields follow in emission order.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::{Column, DataFrame, DataType as PolarsType, PolarsError, TimeUnit};
use thiserror::Error;

use crate::record::{FieldValue, Record};

/// Name of the index column.
pub const DATE_COLUMN: &str = "date";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("record {row} has no '{DATE_COLUMN}' field")]
    MissingDate { row: usize },

    #[error("record {row} has an unparseable date: '{value}'")]
    InvalidDate { row: usize, value: String },

    #[error("dataframe construction failed: {0}")]
    Polars(#[from] PolarsError),
}

/// Parse a bar date as the gateway formats it.
///
/// Accepts `YYYYMMDD`, `YYYYMMDD HH:MM:SS` with an optional trailing
/// time-zone token, ISO-style dates, and epoch seconds.
pub fn parse_bar_date(raw: &str) -> Option<NaiveDateTime> {
    let mut parts = raw.split_whitespace();
    let day = parts.next()?;
    let time = parts.next();

    if day.len() > 8 && day.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = day.parse().ok()?;
        return DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc());
    }

    let date = NaiveDate::parse_from_str(day, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(day, "%Y-%m-%d"))
        .ok()?;
    let time = match time {
        Some(t) => NaiveTime::parse_from_str(t, "%H:%M:%S").ok()?,
        None => NaiveTime::MIN,
    };
    Some(date.and_time(time))
}

/// Build a frame from records in arrival order.
pub fn records_to_dataframe(records: &[Record]) -> Result<DataFrame, TableError> {
    let Some(first) = records.first() else {
        return Ok(DataFrame::empty());
    };

    let mut stamps = Vec::with_capacity(records.len());
    for (row, record) in records.iter().enumerate() {
        let raw = match record.get(DATE_COLUMN) {
            Some(FieldValue::Text(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => return Err(TableError::MissingDate { row }),
        };
        let parsed = parse_bar_date(&raw).ok_or(TableError::InvalidDate { row, value: raw })?;
        stamps.push(parsed.and_utc().timestamp_millis());
    }

    let mut columns = vec![Column::new(DATE_COLUMN.into(), stamps)
        .cast(&PolarsType::Datetime(TimeUnit::Milliseconds, None))?];

    for name in first.names().filter(|n| *n != DATE_COLUMN) {
        let sample = records.iter().find_map(|r| r.get(name));
        let column = match sample {
            Some(FieldValue::Int(_)) => {
                let values: Vec<Option<i64>> = records
                    .iter()
                    .map(|r| r.get(name).and_then(FieldValue::as_i64))
                    .collect();
                Column::new(name.into(), values)
            }
            Some(FieldValue::Float(_)) => {
                let values: Vec<Option<f64>> = records
                    .iter()
                    .map(|r| r.get(name).and_then(FieldValue::as_f64))
                    .collect();
                Column::new(name.into(), values)
            }
            _ => {
                let values: Vec<Option<String>> = records
                    .iter()
                    .map(|r| r.get(name).map(|v| v.to_string()))
                    .collect();
                Column::new(name.into(), values)
            }
        };
        columns.push(column);
    }

    Ok(DataFrame::new(columns)?)
}
