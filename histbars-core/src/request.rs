//! Historical data request: a validated, immutable description of a query.
//!
//! Construction normalizes the symbol and option right and checks field
//! formats. Whether an option request carries all of expiry, strike and right
//! is checked later, when the contract is built.

use serde::{Deserialize, Serialize};

use crate::enums::{AssetType, BarSize, DataType, Duration};
use crate::error::ClientError;

/// Default routing exchange.
pub const DEFAULT_EXCHANGE: &str = "SMART";

const OPTION_RIGHTS: [&str; 4] = ["C", "P", "CALL", "PUT"];

/// Parameters of one historical-data query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalDataRequest {
    symbol: String,
    duration: Duration,
    bar_size: BarSize,
    asset_type: AssetType,
    exchange: String,
    data_type: DataType,
    expiry: Option<String>,
    strike: Option<f64>,
    right: Option<String>,
}

impl HistoricalDataRequest {
    /// Start building a request for `symbol` with default settings.
    pub fn builder(symbol: impl Into<String>) -> HistoricalDataRequestBuilder {
        HistoricalDataRequestBuilder::new(symbol)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn bar_size(&self) -> BarSize {
        self.bar_size
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Option expiry as `YYYYMMDD`.
    pub fn expiry(&self) -> Option<&str> {
        self.expiry.as_deref()
    }

    pub fn strike(&self) -> Option<f64> {
        self.strike
    }

    /// Option right, upper-cased (`C`, `P`, `CALL` or `PUT`).
    pub fn right(&self) -> Option<&str> {
        self.right.as_deref()
    }

    /// Re-check structural well-formedness.
    ///
    /// Values built through the builder always pass; this catches requests
    /// that arrived through deserialization.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.symbol.trim().is_empty() {
            return Err(ClientError::Validation("symbol cannot be empty".into()));
        }
        if self.symbol != self.symbol.trim().to_uppercase() {
            return Err(ClientError::Validation(format!(
                "symbol '{}' is not normalized",
                self.symbol
            )));
        }
        if self.exchange.trim().is_empty() {
            return Err(ClientError::Validation("exchange cannot be empty".into()));
        }
        if let Some(expiry) = &self.expiry {
            check_expiry(expiry)?;
        }
        if let Some(strike) = self.strike {
            check_strike(strike)?;
        }
        if let Some(right) = &self.right {
            if normalize_right(right)? != *right {
                return Err(ClientError::Validation(format!(
                    "right '{right}' is not normalized"
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`HistoricalDataRequest`].
#[derive(Debug, Clone)]
pub struct HistoricalDataRequestBuilder {
    symbol: String,
    duration: Duration,
    bar_size: BarSize,
    asset_type: AssetType,
    exchange: String,
    data_type: DataType,
    expiry: Option<String>,
    strike: Option<f64>,
    right: Option<String>,
}

impl HistoricalDataRequestBuilder {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            duration: Duration::default(),
            bar_size: BarSize::default(),
            asset_type: AssetType::default(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            data_type: DataType::default(),
            expiry: None,
            strike: None,
            right: None,
        }
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn bar_size(mut self, bar_size: BarSize) -> Self {
        self.bar_size = bar_size;
        self
    }

    pub fn asset_type(mut self, asset_type: AssetType) -> Self {
        self.asset_type = asset_type;
        self
    }

    pub fn exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn expiry(mut self, expiry: impl Into<String>) -> Self {
        self.expiry = Some(expiry.into());
        self
    }

    pub fn strike(mut self, strike: f64) -> Self {
        self.strike = Some(strike);
        self
    }

    pub fn right(mut self, right: impl Into<String>) -> Self {
        self.right = Some(right.into());
        self
    }

    /// Normalize and validate, producing the immutable request.
    pub fn build(self) -> Result<HistoricalDataRequest, ClientError> {
        let symbol = self.symbol.trim();
        if symbol.is_empty() {
            return Err(ClientError::Validation("symbol cannot be empty".into()));
        }

        let exchange = self.exchange.trim();
        if exchange.is_empty() {
            return Err(ClientError::Validation("exchange cannot be empty".into()));
        }

        if let Some(expiry) = &self.expiry {
            check_expiry(expiry)?;
        }
        if let Some(strike) = self.strike {
            check_strike(strike)?;
        }
        let right = self.right.as_deref().map(normalize_right).transpose()?;

        Ok(HistoricalDataRequest {
            symbol: symbol.to_uppercase(),
            duration: self.duration,
            bar_size: self.bar_size,
            asset_type: self.asset_type,
            exchange: exchange.to_string(),
            data_type: self.data_type,
            expiry: self.expiry,
            strike: self.strike,
            right,
        })
    }
}

fn check_expiry(expiry: &str) -> Result<(), ClientError> {
    if expiry.chars().count() != 8 {
        return Err(ClientError::Validation(
            "expiry must be in YYYYMMDD format".into(),
        ));
    }
    Ok(())
}

fn check_strike(strike: f64) -> Result<(), ClientError> {
    if !strike.is_finite() || strike <= 0.0 {
        return Err(ClientError::Validation(
            "strike must be a positive number".into(),
        ));
    }
    Ok(())
}

fn normalize_right(right: &str) -> Result<String, ClientError> {
    let upper = right.trim().to_uppercase();
    if OPTION_RIGHTS.contains(&upper.as_str()) {
        Ok(upper)
    } else {
        Err(ClientError::Validation(
            "right must be C, P, CALL, or PUT".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_is_trimmed_and_uppercased() {
        let req = HistoricalDataRequest::builder("  aapl  ").build().unwrap();
        assert_eq!(req.symbol(), "AAPL");
    }

    #[test]
    fn defaults_are_applied() {
        let req = HistoricalDataRequest::builder("SPY").build().unwrap();
        assert_eq!(req.asset_type(), AssetType::Stk);
        assert_eq!(req.exchange(), "SMART");
        assert_eq!(req.data_type(), DataType::Trades);
        assert_eq!(req.duration(), Duration::Day1);
        assert_eq!(req.bar_size(), BarSize::Min5);
        assert!(req.expiry().is_none());
        assert!(req.strike().is_none());
        assert!(req.right().is_none());
    }

    #[test]
    fn empty_symbol_is_rejected() {
        for symbol in ["", "   ", "\t"] {
            let err = HistoricalDataRequest::builder(symbol).build().unwrap_err();
            assert_eq!(err, ClientError::Validation("symbol cannot be empty".into()));
        }
    }

    #[test]
    fn expiry_must_have_eight_characters() {
        assert!(HistoricalDataRequest::builder("AAPL")
            .expiry("20240119")
            .build()
            .is_ok());

        for bad in ["2024011", "202401190", "2024-01-19"] {
            let err = HistoricalDataRequest::builder("AAPL")
                .expiry(bad)
                .build()
                .unwrap_err();
            assert!(err.message().contains("YYYYMMDD"), "{bad}: {err}");
        }
    }

    #[test]
    fn rights_are_normalized() {
        for (input, expected) in [("c", "C"), ("p", "P"), ("call", "CALL"), ("Put", "PUT")] {
            let req = HistoricalDataRequest::builder("AAPL")
                .right(input)
                .build()
                .unwrap();
            assert_eq!(req.right(), Some(expected));
        }
    }

    #[test]
    fn invalid_right_is_rejected() {
        let err = HistoricalDataRequest::builder("AAPL")
            .right("X")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::Validation("right must be C, P, CALL, or PUT".into())
        );
    }

    #[test]
    fn strike_must_be_positive() {
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(HistoricalDataRequest::builder("AAPL")
                .strike(bad)
                .build()
                .is_err());
        }
        assert!(HistoricalDataRequest::builder("AAPL")
            .strike(150.0)
            .build()
            .is_ok());
    }

    #[test]
    fn option_without_fields_still_builds() {
        // Completeness of option fields is checked by the contract builder.
        let req = HistoricalDataRequest::builder("AAPL")
            .asset_type(AssetType::Opt)
            .build();
        assert!(req.is_ok());
    }

    #[test]
    fn validate_catches_deserialized_garbage() {
        let json = r#"{
            "symbol": "aapl", "duration": "1 D", "bar_size": "5 mins",
            "asset_type": "STK", "exchange": "SMART", "data_type": "TRADES",
            "expiry": null, "strike": null, "right": null
        }"#;
        let req: HistoricalDataRequest = serde_json::from_str(json).unwrap();
        assert!(req.validate().is_err());

        let good = HistoricalDataRequest::builder("aapl").build().unwrap();
        assert!(good.validate().is_ok());
    }
}
