//! histbars core — historical bars from a brokerage gateway, as records and tables.
//!
//! This crate contains:
//! - Enumerations of asset types, bar sizes, durations and data types
//! - Validated request and immutable response types
//! - The contract builder
//! - Record processors and the per-client processor registry
//! - The data client: connect handshake, single in-flight request, timeouts
//! - A session abstraction plus a TCP implementation of the gateway protocol
//! - Table conversion (polars) and CSV export

pub mod client;
pub mod config;
pub mod contract;
pub mod enums;
pub mod error;
pub mod export;
pub mod processor;
pub mod record;
pub mod request;
pub mod response;
pub mod table;
pub mod transport;

pub use client::{ConnectionState, DataClient, Notice};
pub use config::{ClientConfig, ConfigError};
pub use contract::Contract;
pub use enums::{AssetType, BarSize, DataType, Duration, ParseEnumError};
pub use error::ClientError;
pub use processor::{
    BarProcessor, BidAskProcessor, MidpointProcessor, ProcessorError, ProcessorRegistry,
    TradesProcessor,
};
pub use record::{FieldValue, Record};
pub use request::{HistoricalDataRequest, HistoricalDataRequestBuilder};
pub use response::HistoricalDataResponse;
pub use transport::{
    BarData, GatewayEvents, HistoricalDataParams, ReceiveLoop, Session, TransportError,
    TwsSession,
};
