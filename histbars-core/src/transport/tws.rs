//! TCP session speaking the TWS / IB Gateway socket protocol.

use std::io::{BufReader, ErrorKind, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::wire::{self, FieldReader};
use super::{GatewayEvents, HistoricalDataParams, ReceiveLoop, Session, TransportError};

/// Default bound on TCP connect and the handshake reply.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// A socket session with the gateway.
pub struct TwsSession {
    io_timeout: Duration,
    stream: Option<TcpStream>,
    server_version: i32,
    open: Arc<AtomicBool>,
}

impl TwsSession {
    pub fn new() -> Self {
        Self {
            io_timeout: DEFAULT_IO_TIMEOUT,
            stream: None,
            server_version: 0,
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    /// Version negotiated during the last handshake.
    pub fn server_version(&self) -> Option<i32> {
        self.stream.as_ref().map(|_| self.server_version)
    }

    fn open_stream(
        &self,
        host: &str,
        port: u16,
        budget: Duration,
    ) -> Result<TcpStream, TransportError> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, budget) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("connect to {addr} failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err
            .map(TransportError::Io)
            .unwrap_or_else(|| TransportError::Handshake(format!("{host} did not resolve"))))
    }
}

impl Default for TwsSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Session for TwsSession {
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        client_id: i32,
        timeout: Duration,
    ) -> Result<Box<dyn ReceiveLoop>, TransportError> {
        if self.stream.is_some() {
            self.disconnect()?;
        }

        let started = Instant::now();
        let mut stream = self
            .open_stream(host, port, io_budget(self.io_timeout, timeout))
            .map_err(timed_out)?;
        stream.set_nodelay(true)?;
        let remaining = timeout.saturating_sub(started.elapsed());
        stream.set_read_timeout(Some(io_budget(self.io_timeout, remaining)))?;
        stream.write_all(&wire::handshake_prefix())?;

        let reply = wire::split_fields(&wire::read_frame(&mut stream).map_err(timed_out)?);
        let mut fields = FieldReader::new(&reply);
        let server_version = fields
            .next_i32("server version")
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        let connection_time = fields.next_str("connection time").unwrap_or_default();
        if server_version < wire::MIN_CLIENT_VERSION {
            return Err(TransportError::Handshake(format!(
                "server version {server_version} is below the supported minimum {}",
                wire::MIN_CLIENT_VERSION
            )));
        }
        info!("gateway server version {server_version}, connection time {connection_time}");

        stream.set_read_timeout(None)?;
        stream.write_all(&wire::encode_fields(&wire::start_api_fields(
            client_id,
            server_version,
        )))?;

        let reader = stream.try_clone()?;
        let open = Arc::new(AtomicBool::new(true));
        self.open = Arc::clone(&open);
        self.stream = Some(stream);
        self.server_version = server_version;

        Ok(Box::new(TwsReceiveLoop {
            reader: BufReader::new(reader),
            server_version,
            open,
        }))
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        self.open.store(false, Ordering::SeqCst);
        match stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != ErrorKind::NotConnected => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some() && self.open.load(Ordering::SeqCst)
    }

    fn request_historical_data(
        &mut self,
        params: &HistoricalDataParams,
    ) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let fields = wire::historical_request_fields(params, self.server_version);
        stream.write_all(&wire::encode_fields(&fields))?;
        stream.flush()?;
        Ok(())
    }
}

/// Socket timeouts must be non-zero.
fn io_budget(io_timeout: Duration, remaining: Duration) -> Duration {
    io_timeout.min(remaining).max(Duration::from_millis(1))
}

/// Expired socket timeouts surface as `WouldBlock` or `TimedOut` depending on
/// the platform.
fn timed_out(err: TransportError) -> TransportError {
    match err {
        TransportError::Io(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
            TransportError::TimedOut
        }
        other => other,
    }
}

/// Read half of a [`TwsSession`].
struct TwsReceiveLoop {
    reader: BufReader<TcpStream>,
    server_version: i32,
    open: Arc<AtomicBool>,
}

impl ReceiveLoop for TwsReceiveLoop {
    fn run(mut self: Box<Self>, events: Arc<dyn GatewayEvents>) {
        loop {
            match wire::read_frame(&mut self.reader) {
                Ok(payload) => {
                    let fields = wire::split_fields(&payload);
                    if fields.is_empty() {
                        continue;
                    }
                    if let Err(e) = wire::dispatch(&fields, self.server_version, events.as_ref()) {
                        warn!("dropping malformed gateway message: {e}");
                    }
                }
                Err(TransportError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    info!("gateway closed the connection");
                    break;
                }
                Err(e) => {
                    debug!("receive loop stopped: {e}");
                    break;
                }
            }
        }
        self.open.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_disconnected() {
        let mut session = TwsSession::new();
        assert!(!session.is_connected());
        assert_eq!(session.server_version(), None);
        assert!(session.disconnect().is_ok());
    }

    #[test]
    fn request_before_connect_fails() {
        use crate::contract::Contract;
        use crate::enums::AssetType;

        let mut session = TwsSession::new();
        let params = HistoricalDataParams {
            req_id: 1,
            contract: Contract {
                symbol: "SPY".into(),
                sec_type: AssetType::Stk,
                exchange: "SMART".into(),
                currency: "USD".into(),
                last_trade_date_or_contract_month: None,
                strike: None,
                right: None,
            },
            end_date_time: String::new(),
            duration: "1 D".into(),
            bar_size: "1 min".into(),
            what_to_show: "TRADES".into(),
            use_rth: true,
            format_date: 1,
            keep_up_to_date: false,
            chart_options: Vec::new(),
        };
        assert!(matches!(
            session.request_historical_data(&params),
            Err(TransportError::NotConnected)
        ));
    }

    #[test]
    fn socket_budget_is_bounded_and_non_zero() {
        let io = Duration::from_secs(10);
        assert_eq!(io_budget(io, Duration::from_millis(300)), Duration::from_millis(300));
        assert_eq!(io_budget(io, Duration::from_secs(60)), io);
        assert_eq!(io_budget(io, Duration::ZERO), Duration::from_millis(1));
    }

    #[test]
    fn expired_reads_map_to_timed_out() {
        for kind in [ErrorKind::WouldBlock, ErrorKind::TimedOut] {
            let err = TransportError::Io(std::io::Error::from(kind));
            assert!(matches!(timed_out(err), TransportError::TimedOut));
        }
        let refused = TransportError::Io(std::io::Error::from(ErrorKind::ConnectionRefused));
        assert!(matches!(timed_out(refused), TransportError::Io(_)));
    }

    #[test]
    fn refused_connection_surfaces_io_error() {
        // Bind then drop a listener to obtain a port nobody is listening on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut session = TwsSession::new().with_io_timeout(Duration::from_millis(500));
        assert!(session
            .connect("127.0.0.1", port, 1, Duration::from_secs(1))
            .is_err());
        assert!(!session.is_connected());
    }
}
