//! Instrument descriptor derived from a request.

use serde::{Deserialize, Serialize};

use crate::enums::AssetType;
use crate::error::ClientError;
use crate::request::HistoricalDataRequest;

/// Every contract is quoted in this currency.
pub const DEFAULT_CURRENCY: &str = "USD";

/// A tradable instrument as the gateway identifies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub symbol: String,
    pub sec_type: AssetType,
    pub exchange: String,
    pub currency: String,
    pub last_trade_date_or_contract_month: Option<String>,
    pub strike: Option<f64>,
    pub right: Option<String>,
}

impl Contract {
    /// Build the contract for `request`.
    ///
    /// Option requests must carry expiry, strike and right; anything else
    /// ignores those fields.
    pub fn from_request(request: &HistoricalDataRequest) -> Result<Self, ClientError> {
        let mut contract = Contract {
            symbol: request.symbol().to_string(),
            sec_type: request.asset_type(),
            exchange: request.exchange().to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            last_trade_date_or_contract_month: None,
            strike: None,
            right: None,
        };

        if request.asset_type() == AssetType::Opt {
            let missing: Vec<&str> = [
                ("expiry", request.expiry().is_none()),
                ("strike", request.strike().is_none()),
                ("right", request.right().is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();

            if !missing.is_empty() {
                return Err(ClientError::Validation(format!(
                    "options require expiry, strike, and right (missing: {})",
                    missing.join(", ")
                )));
            }

            contract.last_trade_date_or_contract_month = request.expiry().map(str::to_string);
            contract.strike = request.strike();
            contract.right = request.right().map(str::to_string);
        }

        Ok(contract)
    }
}
