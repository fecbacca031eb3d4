//! Gateway wire format: length-prefixed frames of NUL-terminated fields.
//!
//! Only the handful of messages the historical-data exchange needs are
//! decoded; everything else is skipped.

use std::io::Read;

use super::{BarData, GatewayEvents, HistoricalDataParams, TransportError};

/// Protocol range offered during the handshake.
pub const MIN_CLIENT_VERSION: i32 = 100;
pub const MAX_CLIENT_VERSION: i32 = 176;

/// Frames larger than this are treated as corruption.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Server versions that change message layouts.
pub mod min_server_ver {
    pub const TRADING_CLASS: i32 = 68;
    pub const OPTIONAL_CAPABILITIES: i32 = 72;
    pub const SYNT_REALTIME_BARS: i32 = 124;
    pub const ERROR_TIME: i32 = 194;
    pub const HISTORICAL_DATA_END: i32 = 196;
}

/// Incoming message ids.
pub mod incoming {
    pub const ERR_MSG: i32 = 4;
    pub const NEXT_VALID_ID: i32 = 9;
    pub const HISTORICAL_DATA: i32 = 17;
    pub const HISTORICAL_DATA_END: i32 = 108;
}

/// Outgoing message ids.
pub mod outgoing {
    pub const REQ_HISTORICAL_DATA: i32 = 20;
    pub const START_API: i32 = 71;
}

// ─── Framing ─────────────────────────────────────────────────────────

/// Prefix a payload with its big-endian length.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Encode fields as a framed message.
pub fn encode_fields<S: AsRef<str>>(fields: &[S]) -> Vec<u8> {
    let mut payload = Vec::new();
    for field in fields {
        payload.extend_from_slice(field.as_ref().as_bytes());
        payload.push(0);
    }
    frame(&payload)
}

/// Opening bytes of a session: the API marker and the supported version range.
pub fn handshake_prefix() -> Vec<u8> {
    let mut out = b"API\0".to_vec();
    out.extend(frame(
        format!("v{MIN_CLIENT_VERSION}..{MAX_CLIENT_VERSION}").as_bytes(),
    ));
    out
}

/// Read one frame's payload.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, TransportError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::Decode(format!(
            "frame of {len} bytes exceeds limit"
        )));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

/// Split a payload into its fields.
pub fn split_fields(payload: &[u8]) -> Vec<String> {
    let body = payload.strip_suffix(&[0u8]).unwrap_or(payload);
    if body.is_empty() {
        return Vec::new();
    }
    body.split(|b| *b == 0)
        .map(|f| String::from_utf8_lossy(f).into_owned())
        .collect()
}

// ─── Field reader ────────────────────────────────────────────────────

/// Sequential typed access to a message's fields.
pub struct FieldReader<'a> {
    fields: &'a [String],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(fields: &'a [String]) -> Self {
        Self { fields, pos: 0 }
    }

    pub fn next_str(&mut self, name: &str) -> Result<&'a str, TransportError> {
        let field = self
            .fields
            .get(self.pos)
            .ok_or_else(|| TransportError::Decode(format!("missing field '{name}'")))?;
        self.pos += 1;
        Ok(field.as_str())
    }

    /// Empty fields decode as zero, as the gateway sends them for unset values.
    pub fn next_i64(&mut self, name: &str) -> Result<i64, TransportError> {
        let raw = self.next_str(name)?;
        if raw.is_empty() {
            return Ok(0);
        }
        raw.parse()
            .map_err(|_| TransportError::Decode(format!("field '{name}' is not an integer: '{raw}'")))
    }

    pub fn next_i32(&mut self, name: &str) -> Result<i32, TransportError> {
        let value = self.next_i64(name)?;
        i32::try_from(value)
            .map_err(|_| TransportError::Decode(format!("field '{name}' out of range: {value}")))
    }

    pub fn next_f64(&mut self, name: &str) -> Result<f64, TransportError> {
        let raw = self.next_str(name)?;
        if raw.is_empty() {
            return Ok(0.0);
        }
        raw.parse()
            .map_err(|_| TransportError::Decode(format!("field '{name}' is not a number: '{raw}'")))
    }

    pub fn skip(&mut self, name: &str) -> Result<(), TransportError> {
        self.next_str(name).map(|_| ())
    }

    pub fn remaining(&self) -> usize {
        self.fields.len().saturating_sub(self.pos)
    }
}

// ─── Outgoing messages ───────────────────────────────────────────────

/// START_API fields sent right after the handshake reply.
pub fn start_api_fields(client_id: i32, server_version: i32) -> Vec<String> {
    let mut fields = vec![
        outgoing::START_API.to_string(),
        "2".to_string(),
        client_id.to_string(),
    ];
    if server_version >= min_server_ver::OPTIONAL_CAPABILITIES {
        fields.push(String::new());
    }
    fields
}

/// REQ_HISTORICAL_DATA fields in protocol order.
pub fn historical_request_fields(params: &HistoricalDataParams, server_version: i32) -> Vec<String> {
    let contract = &params.contract;
    let flag = |b: bool| if b { "1" } else { "0" }.to_string();

    let mut fields = vec![outgoing::REQ_HISTORICAL_DATA.to_string()];
    if server_version < min_server_ver::SYNT_REALTIME_BARS {
        fields.push("6".to_string());
    }
    fields.push(params.req_id.to_string());
    fields.push("0".to_string()); // conId
    fields.push(contract.symbol.clone());
    fields.push(contract.sec_type.as_str().to_string());
    fields.push(
        contract
            .last_trade_date_or_contract_month
            .clone()
            .unwrap_or_default(),
    );
    fields.push(contract.strike.map_or_else(|| "0".to_string(), |s| s.to_string()));
    fields.push(contract.right.clone().unwrap_or_default());
    fields.push(String::new()); // multiplier
    fields.push(contract.exchange.clone());
    fields.push(String::new()); // primary exchange
    fields.push(contract.currency.clone());
    fields.push(String::new()); // local symbol
    if server_version >= min_server_ver::TRADING_CLASS {
        fields.push(String::new());
    }
    fields.push("0".to_string()); // include expired
    fields.push(params.end_date_time.clone());
    fields.push(params.bar_size.clone());
    fields.push(params.duration.clone());
    fields.push(flag(params.use_rth));
    fields.push(params.what_to_show.clone());
    fields.push(params.format_date.to_string());
    if server_version >= min_server_ver::SYNT_REALTIME_BARS {
        fields.push(flag(params.keep_up_to_date));
    }
    fields.push(
        params
            .chart_options
            .iter()
            .map(|(tag, value)| format!("{tag}={value};"))
            .collect(),
    );
    fields
}

// ─── Incoming messages ───────────────────────────────────────────────

/// Decode one message and raise the matching callback.
pub fn dispatch(
    fields: &[String],
    server_version: i32,
    events: &dyn GatewayEvents,
) -> Result<(), TransportError> {
    let mut r = FieldReader::new(fields);
    let msg_id = r.next_i32("message id")?;

    match msg_id {
        incoming::NEXT_VALID_ID => {
            r.skip("version")?;
            events.next_valid_id(r.next_i64("order id")?);
        }
        incoming::ERR_MSG => {
            if server_version < min_server_ver::ERROR_TIME {
                r.skip("version")?;
            }
            let req_id = r.next_i64("request id")?;
            let code = r.next_i32("error code")?;
            let message = r.next_str("error message")?;
            events.error(req_id, code, message);
        }
        incoming::HISTORICAL_DATA => decode_historical_data(&mut r, server_version, events)?,
        incoming::HISTORICAL_DATA_END => {
            let req_id = r.next_i64("request id")?;
            let start = r.next_str("start date")?;
            let end = r.next_str("end date")?;
            events.historical_data_end(req_id, start, end);
        }
        other => log::trace!("ignoring message id {other}"),
    }
    Ok(())
}

fn decode_historical_data(
    r: &mut FieldReader<'_>,
    server_version: i32,
    events: &dyn GatewayEvents,
) -> Result<(), TransportError> {
    if server_version < min_server_ver::SYNT_REALTIME_BARS {
        r.skip("version")?;
    }
    let req_id = r.next_i64("request id")?;

    let range = if server_version < min_server_ver::HISTORICAL_DATA_END {
        Some((r.next_str("start date")?, r.next_str("end date")?))
    } else {
        None
    };

    let count = r.next_i64("bar count")?;
    for _ in 0..count {
        let date = r.next_str("bar date")?.to_string();
        let open = r.next_f64("open")?;
        let high = r.next_f64("high")?;
        let low = r.next_f64("low")?;
        let close = r.next_f64("close")?;
        let volume = r.next_f64("volume")?;
        let wap = r.next_f64("wap")?;
        if server_version < min_server_ver::SYNT_REALTIME_BARS {
            r.skip("has gaps")?;
        }
        let bar_count = r.next_i64("bar trade count")?;
        let bar = BarData {
            date,
            open,
            high,
            low,
            close,
            volume,
            wap,
            bar_count,
        };
        events.historical_data(req_id, &bar);
    }

    if let Some((start, end)) = range {
        events.historical_data_end(req_id, start, end);
    }
    Ok(())
}
