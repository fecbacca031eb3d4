//! State shared between the caller and the receive loop, and the callbacks
//! that mutate it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, trace, warn};

use super::signal::Signal;
use crate::processor::BarProcessor;
use crate::record::Record;
use crate::transport::{BarData, GatewayEvents};

/// Category of a gateway error notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// A data farm connection is healthy (2104, 2106, 2158).
    FarmOk,
    /// Degraded connectivity (321).
    FarmDegraded,
    /// Fault in the historical data service (502).
    HistoricalServiceFault,
    /// Anything else.
    Other,
}

impl Notice {
    pub fn classify(code: i32) -> Self {
        match code {
            2104 | 2106 | 2158 => Notice::FarmOk,
            321 => Notice::FarmDegraded,
            502 => Notice::HistoricalServiceFault,
            _ => Notice::Other,
        }
    }
}

/// The single request slot.
#[derive(Default)]
pub(crate) struct Pending {
    pub req_id: Option<i64>,
    pub processor: Option<Box<dyn BarProcessor>>,
    pub records: Vec<Record>,
    pub in_flight: bool,
}

impl Pending {
    /// Prepare the slot for a new request.
    pub fn reset(&mut self) {
        self.req_id = None;
        self.processor = None;
        self.records.clear();
    }
}

#[derive(Default)]
pub(crate) struct SharedState {
    pending: Mutex<Pending>,
    next_id: Mutex<Option<i64>>,
    pub connected: Signal,
    pub data_ready: Signal,
}

impl SharedState {
    pub fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn next_id(&self) -> Option<i64> {
        *self.next_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand out the next request id, advancing the counter.
    pub fn take_request_id(&self) -> i64 {
        let mut next = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        let id = next.unwrap_or(1);
        *next = Some(id + 1);
        id
    }
}

impl GatewayEvents for SharedState {
    fn next_valid_id(&self, id: i64) {
        debug!("next valid id: {id}");
        *self.next_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
        self.connected.set();
    }

    fn error(&self, req_id: i64, code: i32, message: &str) {
        match Notice::classify(code) {
            Notice::FarmOk => info!("market data farm connection is OK ({code}): {message}"),
            Notice::FarmDegraded => warn!("market data farm connection is degraded ({code}): {message}"),
            Notice::HistoricalServiceFault => {
                error!("historical data service error for request {req_id}: {message}")
            }
            Notice::Other => error!("gateway error {code} for request {req_id}: {message}"),
        }
    }

    fn historical_data(&self, req_id: i64, bar: &BarData) {
        let mut pending = self.pending();
        if pending.req_id != Some(req_id) {
            trace!("dropping bar for inactive request {req_id}");
            return;
        }
        let Some(processor) = pending.processor.as_ref() else {
            return;
        };
        let record = processor.process(bar);
        pending.records.push(record);
        trace!("received bar {} for request {req_id}", pending.records.len());
    }

    fn historical_data_end(&self, req_id: i64, start: &str, end: &str) {
        let pending = self.pending();
        if pending.req_id != Some(req_id) {
            debug!("ignoring end of data for inactive request {req_id}");
            return;
        }
        info!(
            "historical data complete for request {req_id} ({start} to {end}): {} records",
            pending.records.len()
        );
        drop(pending);
        self.data_ready.set();
    }
}
