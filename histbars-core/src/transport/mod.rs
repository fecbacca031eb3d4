//! Session abstraction over the brokerage gateway.
//!
//! Outbound calls live on [`Session`]; inbound callbacks are delivered to a
//! [`GatewayEvents`] implementation that the data client installs when it
//! starts the [`ReceiveLoop`]. The client's state machine only sees these
//! traits, so it can be driven by a scripted session in tests.

pub mod tws;
pub mod wire;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contract::Contract;

pub use tws::TwsSession;

/// One price bar as delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarData {
    /// Bar start, formatted by the gateway (`YYYYMMDD` or `YYYYMMDD HH:MM:SS`).
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub wap: f64,
    pub bar_count: i64,
}

/// Arguments of a historical-data request on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalDataParams {
    pub req_id: i64,
    pub contract: Contract,
    /// Empty means "now".
    pub end_date_time: String,
    pub duration: String,
    pub bar_size: String,
    pub what_to_show: String,
    pub use_rth: bool,
    /// 1 = formatted date strings, 2 = epoch seconds.
    pub format_date: i32,
    pub keep_up_to_date: bool,
    pub chart_options: Vec<(String, String)>,
}

/// Failures of the transport itself.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("malformed message: {0}")]
    Decode(String),

    #[error("session is not connected")]
    NotConnected,

    /// The gateway did not answer within the connect budget.
    #[error("timed out waiting for the gateway")]
    TimedOut,
}

/// Callbacks raised by the receive loop.
pub trait GatewayEvents: Send + Sync {
    /// Handshake acknowledgement carrying the next usable request id.
    fn next_valid_id(&self, id: i64);

    /// Error or informational notice from the gateway.
    fn error(&self, req_id: i64, code: i32, message: &str);

    /// One bar of a historical-data response.
    fn historical_data(&self, req_id: i64, bar: &BarData);

    /// All bars for `req_id` have been delivered.
    fn historical_data_end(&self, req_id: i64, start: &str, end: &str);
}

/// Inbound half of an open session, driven on a background thread.
pub trait ReceiveLoop: Send {
    /// Read and dispatch messages until the transport closes.
    fn run(self: Box<Self>, events: Arc<dyn GatewayEvents>);
}

/// Outbound half of a gateway session.
pub trait Session: Send {
    /// Open the transport and return the loop that delivers its callbacks.
    ///
    /// Opening the socket and any synchronous exchange must finish within
    /// `timeout`, or fail with [`TransportError::TimedOut`].
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        client_id: i32,
        timeout: Duration,
    ) -> Result<Box<dyn ReceiveLoop>, TransportError>;

    /// Close the transport. Calling it on a closed session is a no-op.
    fn disconnect(&mut self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    fn request_historical_data(
        &mut self,
        params: &HistoricalDataParams,
    ) -> Result<(), TransportError>;
}
