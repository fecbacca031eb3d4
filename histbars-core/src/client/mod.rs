//! The data client: connection lifecycle and the single-request protocol.
//!
//! The caller's thread blocks in [`DataClient::connect`] and
//! [`DataClient::fetch`]; a background receive loop delivers gateway
//! callbacks into shared state. Two one-shot signals carry the handoff:
//! "connected" (raised by the handshake acknowledgement) and "data ready"
//! (raised by the end-of-data notification). Both are cleared before reuse.
//!
//! Only one request can be awaiting completion at a time; a concurrent
//! second `fetch` fails immediately.

mod events;
pub mod signal;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use polars::prelude::DataFrame;

use crate::config::{ClientConfig, ConfigError};
use crate::contract::Contract;
use crate::error::ClientError;
use crate::processor::ProcessorRegistry;
use crate::request::HistoricalDataRequest;
use crate::response::HistoricalDataResponse;
use crate::transport::{
    GatewayEvents, HistoricalDataParams, Session, TransportError, TwsSession,
};

use events::SharedState;
pub use events::Notice;

/// Where the connection stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Blocking client for historical bars.
pub struct DataClient<S: Session = TwsSession> {
    config: ClientConfig,
    session: Mutex<S>,
    state: Mutex<ConnectionState>,
    shared: Arc<SharedState>,
    registry: ProcessorRegistry,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl DataClient<TwsSession> {
    /// Client for the gateway described by `config`, with built-in processors.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_session(config, TwsSession::new(), ProcessorRegistry::new())
    }

    /// Client configured from `TWS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(ClientConfig::from_env()?))
    }
}

impl<S: Session> DataClient<S> {
    pub fn with_session(config: ClientConfig, session: S, registry: ProcessorRegistry) -> Self {
        Self {
            config,
            session: Mutex::new(session),
            state: Mutex::new(ConnectionState::Disconnected),
            shared: Arc::new(SharedState::default()),
            registry,
            receiver: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    /// Register processors before issuing requests.
    pub fn registry_mut(&mut self) -> &mut ProcessorRegistry {
        &mut self.registry
    }

    pub fn state(&self) -> ConnectionState {
        *self.lock_state()
    }

    /// Handshake completed and the transport is still open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected && self.lock_session().is_connected()
    }

    /// Request id acknowledged by the gateway, advanced by each fetch.
    pub fn next_request_id(&self) -> Option<i64> {
        self.shared.next_id()
    }

    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_session(&self) -> MutexGuard<'_, S> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.lock_state() = state;
    }

    // ─── Connection ──────────────────────────────────────────────────

    /// Open the session and wait up to `timeout` for the handshake.
    ///
    /// The whole exchange, socket open included, shares one `timeout`. On
    /// timeout the partially opened transport is left as is; the caller may
    /// retry or drop the client.
    pub fn connect(&self, timeout: Duration) -> Result<(), ClientError> {
        let host = self.config.host.as_str();
        let port = self.config.port;
        info!("connecting to gateway at {host}:{port} (client id {})", self.config.client_id);

        let started = Instant::now();
        self.shared.connected.clear();
        self.set_state(ConnectionState::Connecting);
        self.retire_receiver();

        let opened = self
            .lock_session()
            .connect(host, port, self.config.client_id, timeout);
        let receive_loop = match opened {
            Ok(receive_loop) => receive_loop,
            Err(TransportError::TimedOut) => {
                self.set_state(ConnectionState::Disconnected);
                warn!("gateway did not answer within {}s", timeout.as_secs_f64());
                return Err(connect_timeout(timeout));
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                warn!("failed to connect to gateway: {e}");
                return Err(ClientError::Connection(format!(
                    "failed to connect to gateway: {e}"
                )));
            }
        };

        let events: Arc<dyn GatewayEvents> = self.shared.clone();
        let handle = thread::Builder::new()
            .name("histbars-recv".into())
            .spawn(move || receive_loop.run(events))
            .map_err(|e| {
                self.set_state(ConnectionState::Disconnected);
                ClientError::Connection(format!("failed to start receive loop: {e}"))
            })?;
        *self.receiver.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        if !self.shared.connected.wait(timeout.saturating_sub(started.elapsed())) {
            self.set_state(ConnectionState::Disconnected);
            warn!("gateway handshake not acknowledged within {}s", timeout.as_secs_f64());
            return Err(connect_timeout(timeout));
        }

        self.set_state(ConnectionState::Connected);
        info!("connected to gateway");
        Ok(())
    }

    /// Close the session. Safe to call at any time; never fails.
    pub fn disconnect(&self) {
        let was_connected = {
            let mut state = self.lock_state();
            let was = *state != ConnectionState::Disconnected;
            *state = ConnectionState::Disconnected;
            was
        };

        let mut session = self.lock_session();
        if !was_connected && !session.is_connected() {
            return;
        }
        info!("disconnecting from gateway");
        if let Err(e) = session.disconnect() {
            warn!("error while disconnecting: {e}");
        }
        drop(session);

        self.join_receiver();
    }

    /// Close a transport left half-open by an earlier attempt and wait for
    /// its receive loop to finish.
    fn retire_receiver(&self) {
        let mut session = self.lock_session();
        if session.is_connected() {
            debug!("closing transport from an earlier connection attempt");
            if let Err(e) = session.disconnect() {
                warn!("error while closing stale transport: {e}");
            }
        }
        drop(session);
        self.join_receiver();
    }

    fn join_receiver(&self) {
        let handle = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("receive loop panicked");
            }
        }
    }

    // ─── Requests ────────────────────────────────────────────────────

    /// Request bars and block until the gateway signals the end of data.
    pub fn fetch(
        &self,
        request: &HistoricalDataRequest,
        timeout: Duration,
    ) -> Result<HistoricalDataResponse, ClientError> {
        request
            .validate()
            .map_err(|e| ClientError::Validation(format!("invalid request: {}", e.message())))?;

        if !self.is_connected() {
            self.connect(self.config.timeout())?;
        }

        let _slot = self.claim_slot()?;

        let req_id = match self.issue(request) {
            Ok(req_id) => req_id,
            Err(e @ (ClientError::Validation(_) | ClientError::Timeout(_))) => return Err(e),
            Err(e) => {
                return Err(ClientError::DataRequest(format!(
                    "failed to retrieve data: {}",
                    e.message()
                )))
            }
        };

        if !self.shared.data_ready.wait(timeout) {
            warn!("request {req_id} for {} timed out", request.symbol());
            return Err(ClientError::Timeout(format!(
                "data request timed out after {} seconds",
                format_secs(timeout)
            )));
        }

        let records = self.shared.pending().records.clone();
        let response = HistoricalDataResponse::new(request.clone(), records);
        info!(
            "retrieved {} records for {}",
            response.record_count(),
            request.symbol()
        );
        Ok(response)
    }

    /// [`fetch`](Self::fetch), then convert the records into a frame indexed
    /// by date. Zero records give an empty frame.
    pub fn fetch_as_table(
        &self,
        request: &HistoricalDataRequest,
        timeout: Duration,
    ) -> Result<DataFrame, ClientError> {
        let response = self.fetch(request, timeout)?;
        if response.is_empty() {
            return Ok(DataFrame::empty());
        }
        response.to_dataframe().map_err(|e| {
            ClientError::DataRequest(format!("failed to build table: {e}"))
        })
    }

    /// Reserve the request slot for the duration of one fetch.
    fn claim_slot(&self) -> Result<SlotGuard<'_>, ClientError> {
        let mut pending = self.shared.pending();
        if pending.in_flight {
            return Err(ClientError::DataRequest("request already in flight".into()));
        }
        pending.in_flight = true;
        pending.reset();
        drop(pending);
        self.shared.data_ready.clear();
        Ok(SlotGuard {
            shared: &self.shared,
        })
    }

    /// Bind contract and processor, then send the request.
    fn issue(&self, request: &HistoricalDataRequest) -> Result<i64, ClientError> {
        let contract = Contract::from_request(request)?;
        let processor = self
            .registry
            .create(request.data_type())
            .map_err(|e| ClientError::DataRequest(e.to_string()))?;

        let req_id = self.shared.take_request_id();
        {
            let mut pending = self.shared.pending();
            pending.req_id = Some(req_id);
            pending.processor = Some(processor);
        }

        let params = HistoricalDataParams {
            req_id,
            contract,
            end_date_time: String::new(),
            duration: request.duration().as_str().to_string(),
            bar_size: request.bar_size().as_str().to_string(),
            what_to_show: request.data_type().as_str().to_string(),
            use_rth: true,
            format_date: 1,
            keep_up_to_date: false,
            chart_options: Vec::new(),
        };

        info!(
            "requesting {} {} bars for {} (request {req_id})",
            request.data_type(),
            request.bar_size(),
            request.symbol()
        );
        self.lock_session()
            .request_historical_data(&params)
            .map_err(|e| ClientError::DataRequest(e.to_string()))?;
        Ok(req_id)
    }
}

impl<S: Session> Drop for DataClient<S> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Releases the request slot; collected records stay until the next fetch.
struct SlotGuard<'a> {
    shared: &'a SharedState,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.shared.pending().in_flight = false;
    }
}

fn connect_timeout(timeout: Duration) -> ClientError {
    ClientError::Connection(format!(
        "connection timeout after {} seconds",
        format_secs(timeout)
    ))
}

fn format_secs(timeout: Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        timeout.as_secs().to_string()
    } else {
        format!("{:.3}", timeout.as_secs_f64())
    }
}
