//! Result of a completed historical-data request.

use chrono::{DateTime, Local};
use polars::prelude::DataFrame;
use serde::Serialize;

use crate::record::Record;
use crate::request::HistoricalDataRequest;
use crate::table::{self, TableError};

/// Snapshot of the records collected for one request.
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalDataResponse {
    request: HistoricalDataRequest,
    data: Vec<Record>,
    record_count: usize,
    retrieved_at: DateTime<Local>,
}

impl HistoricalDataResponse {
    pub fn new(request: HistoricalDataRequest, data: Vec<Record>) -> Self {
        Self {
            request,
            record_count: data.len(),
            data,
            retrieved_at: Local::now(),
        }
    }

    pub fn request(&self) -> &HistoricalDataRequest {
        &self.request
    }

    /// Records in arrival order.
    pub fn data(&self) -> &[Record] {
        &self.data
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn retrieved_at(&self) -> DateTime<Local> {
        self.retrieved_at
    }

    /// Field names of the first record; empty when there are no records.
    pub fn column_names(&self) -> Vec<&str> {
        self.data
            .first()
            .map(|r| r.names().collect())
            .unwrap_or_default()
    }

    /// Records as a frame indexed by `date`.
    pub fn to_dataframe(&self) -> Result<DataFrame, TableError> {
        table::records_to_dataframe(&self.data)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> HistoricalDataRequest {
        HistoricalDataRequest::builder("aapl").build().unwrap()
    }

    #[test]
    fn count_matches_records() {
        let records = vec![
            Record::new().with("date", "20240115").with("close", 1.0),
            Record::new().with("date", "20240116").with("close", 2.0),
        ];
        let resp = HistoricalDataResponse::new(request(), records);
        assert_eq!(resp.record_count(), 2);
        assert_eq!(resp.data().len(), 2);
        assert_eq!(resp.request().symbol(), "AAPL");
        assert_eq!(resp.column_names(), vec!["date", "close"]);
    }

    #[test]
    fn empty_response() {
        let resp = HistoricalDataResponse::new(request(), Vec::new());
        assert!(resp.is_empty());
        assert!(resp.column_names().is_empty());
        assert_eq!(resp.to_dataframe().unwrap().height(), 0);
    }

    #[test]
    fn json_embeds_request_and_records() {
        let resp = HistoricalDataResponse::new(
            request(),
            vec![Record::new().with("date", "20240115").with("volume", 5i64)],
        );
        let json: serde_json::Value = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
        assert_eq!(json["request"]["symbol"], "AAPL");
        assert_eq!(json["request"]["bar_size"], "5 mins");
        assert_eq!(json["record_count"], 1);
        assert_eq!(json["data"][0]["volume"], 5);
    }
}
