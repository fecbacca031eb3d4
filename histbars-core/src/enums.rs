//! Closed value sets accepted by the gateway's historical-data request.
//!
//! Every enum carries two spellings: the wire value the gateway expects
//! (`"5 mins"`, `"BID_ASK"`) and a symbolic name (`MIN_5`). Parsing accepts
//! either, case-insensitively; serde uses the wire value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rejected enum input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: '{input}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub input: String,
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => ($symbol:literal, $wire:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Value sent on the wire.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }

            /// Symbolic name, e.g. for listings.
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $symbol),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| {
                        v.as_str().eq_ignore_ascii_case(needle)
                            || v.name().eq_ignore_ascii_case(needle)
                    })
                    .ok_or_else(|| ParseEnumError {
                        kind: $kind,
                        input: s.to_string(),
                    })
            }
        }
    };
}

wire_enum! {
    /// Security type of the requested instrument.
    AssetType, "asset type" {
        /// Stock.
        Stk => ("STK", "STK"),
        /// Option.
        Opt => ("OPT", "OPT"),
        /// Future.
        Fut => ("FUT", "FUT"),
        /// Currency pair.
        Cash => ("CASH", "CASH"),
        /// Index.
        Ind => ("IND", "IND"),
    }
}

wire_enum! {
    /// Bar interval.
    BarSize, "bar size" {
        Sec1 => ("SEC_1", "1 sec"),
        Sec5 => ("SEC_5", "5 secs"),
        Sec10 => ("SEC_10", "10 secs"),
        Sec15 => ("SEC_15", "15 secs"),
        Sec30 => ("SEC_30", "30 secs"),
        Min1 => ("MIN_1", "1 min"),
        Min2 => ("MIN_2", "2 mins"),
        Min3 => ("MIN_3", "3 mins"),
        Min5 => ("MIN_5", "5 mins"),
        Min10 => ("MIN_10", "10 mins"),
        Min15 => ("MIN_15", "15 mins"),
        Min20 => ("MIN_20", "20 mins"),
        Min30 => ("MIN_30", "30 mins"),
        Hour1 => ("HOUR_1", "1 hour"),
        Hour2 => ("HOUR_2", "2 hours"),
        Hour3 => ("HOUR_3", "3 hours"),
        Hour4 => ("HOUR_4", "4 hours"),
        Hour8 => ("HOUR_8", "8 hours"),
        Day1 => ("DAY_1", "1 day"),
        Week1 => ("WEEK_1", "1 week"),
        Month1 => ("MONTH_1", "1 month"),
    }
}

wire_enum! {
    /// How far back from the end time the request reaches.
    Duration, "duration" {
        Day1 => ("DAY_1", "1 D"),
        Days2 => ("DAYS_2", "2 D"),
        Days3 => ("DAYS_3", "3 D"),
        Days5 => ("DAYS_5", "5 D"),
        Week1 => ("WEEK_1", "1 W"),
        Weeks2 => ("WEEKS_2", "2 W"),
        Month1 => ("MONTH_1", "1 M"),
        Months2 => ("MONTHS_2", "2 M"),
        Months3 => ("MONTHS_3", "3 M"),
        Months6 => ("MONTHS_6", "6 M"),
        Year1 => ("YEAR_1", "1 Y"),
        Years2 => ("YEARS_2", "2 Y"),
    }
}

wire_enum! {
    /// What the gateway should put into each bar ("what to show").
    DataType, "data type" {
        Trades => ("TRADES", "TRADES"),
        BidAsk => ("BID_ASK", "BID_ASK"),
        Midpoint => ("MIDPOINT", "MIDPOINT"),
        Bid => ("BID", "BID"),
        Ask => ("ASK", "ASK"),
    }
}

impl Default for AssetType {
    fn default() -> Self {
        AssetType::Stk
    }
}

impl Default for BarSize {
    fn default() -> Self {
        BarSize::Min5
    }
}

impl Default for Duration {
    fn default() -> Self {
        Duration::Day1
    }
}

impl Default for DataType {
    fn default() -> Self {
        DataType::Trades
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_value_and_symbolic_name() {
        assert_eq!("5 mins".parse::<BarSize>().unwrap(), BarSize::Min5);
        assert_eq!("min_5".parse::<BarSize>().unwrap(), BarSize::Min5);
        assert_eq!("1 d".parse::<Duration>().unwrap(), Duration::Day1);
        assert_eq!("bid_ask".parse::<DataType>().unwrap(), DataType::BidAsk);
        assert_eq!("opt".parse::<AssetType>().unwrap(), AssetType::Opt);
    }

    #[test]
    fn rejects_unknown_values() {
        let err = "7 mins".parse::<BarSize>().unwrap_err();
        assert_eq!(err.to_string(), "invalid bar size: '7 mins'");
    }

    #[test]
    fn listings_are_complete() {
        assert_eq!(AssetType::ALL.len(), 5);
        assert_eq!(BarSize::ALL.len(), 21);
        assert_eq!(Duration::ALL.len(), 12);
        assert_eq!(DataType::ALL.len(), 5);
    }

    #[test]
    fn serde_uses_wire_value() {
        let json = serde_json::to_string(&BarSize::Hour1).unwrap();
        assert_eq!(json, "\"1 hour\"");
        let back: BarSize = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BarSize::Hour1);
    }

    #[test]
    fn defaults_match_request_defaults() {
        assert_eq!(AssetType::default(), AssetType::Stk);
        assert_eq!(DataType::default(), DataType::Trades);
        assert_eq!(BarSize::default().as_str(), "5 mins");
        assert_eq!(Duration::default().as_str(), "1 D");
    }
}
