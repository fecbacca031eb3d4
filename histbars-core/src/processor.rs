//! Record processors: shape a raw bar into a flat record per data type.
//!
//! Processors are selected through a [`ProcessorRegistry`] owned by each
//! client, so tests and callers can register their own variants without
//! touching shared state.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::enums::DataType;
use crate::record::Record;
use crate::transport::BarData;

/// Lookup failure in a [`ProcessorRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorError {
    #[error("unsupported data type: {0}")]
    Unsupported(DataType),
}

/// Converts bars of one data type into records.
pub trait BarProcessor: Send + Sync {
    fn process(&self, bar: &BarData) -> Record;

    fn data_type(&self) -> DataType;
}

// ─── Built-in processors ─────────────────────────────────────────────

/// TRADES: full OHLCV.
#[derive(Debug, Clone, Copy, Default)]
pub struct TradesProcessor;

impl BarProcessor for TradesProcessor {
    fn process(&self, bar: &BarData) -> Record {
        Record::new()
            .with("date", bar.date.as_str())
            .with("open", bar.open)
            .with("high", bar.high)
            .with("low", bar.low)
            .with("close", bar.close)
            .with("volume", bar.volume.trunc() as i64)
    }

    fn data_type(&self) -> DataType {
        DataType::Trades
    }
}

/// BID_ASK: the gateway packs bid/ask quotes into the OHLC slots.
///
/// open = average bid, high = average ask, low and close carry the bid and
/// ask sizes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BidAskProcessor;

impl BarProcessor for BidAskProcessor {
    fn process(&self, bar: &BarData) -> Record {
        Record::new()
            .with("date", bar.date.as_str())
            .with("bid_price", bar.open)
            .with("ask_price", bar.high)
            .with("bid_size", bar.low.trunc() as i64)
            .with("ask_size", bar.close.trunc() as i64)
    }

    fn data_type(&self) -> DataType {
        DataType::BidAsk
    }
}

/// MIDPOINT: mean of open and high.
#[derive(Debug, Clone, Copy, Default)]
pub struct MidpointProcessor;

impl BarProcessor for MidpointProcessor {
    fn process(&self, bar: &BarData) -> Record {
        Record::new()
            .with("date", bar.date.as_str())
            .with("midpoint", (bar.open + bar.high) / 2.0)
            .with("volume", bar.volume.trunc() as i64)
    }

    fn data_type(&self) -> DataType {
        DataType::Midpoint
    }
}

// ─── Registry ────────────────────────────────────────────────────────

/// Constructor stored in a registry.
pub type ProcessorCtor = Arc<dyn Fn() -> Box<dyn BarProcessor> + Send + Sync>;

/// Maps a data type to the processor that handles it.
#[derive(Clone)]
pub struct ProcessorRegistry {
    ctors: HashMap<DataType, ProcessorCtor>,
}

impl ProcessorRegistry {
    /// Registry with the built-in TRADES, BID_ASK and MIDPOINT processors.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(DataType::Trades, || Box::new(TradesProcessor));
        registry.register(DataType::BidAsk, || Box::new(BidAskProcessor));
        registry.register(DataType::Midpoint, || Box::new(MidpointProcessor));
        registry
    }

    pub fn empty() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// Register `ctor` for `data_type`, replacing any previous entry.
    pub fn register<F>(&mut self, data_type: DataType, ctor: F)
    where
        F: Fn() -> Box<dyn BarProcessor> + Send + Sync + 'static,
    {
        if self.ctors.insert(data_type, Arc::new(ctor)).is_some() {
            log::debug!("replaced processor for {data_type}");
        }
    }

    pub fn create(&self, data_type: DataType) -> Result<Box<dyn BarProcessor>, ProcessorError> {
        self.ctors
            .get(&data_type)
            .map(|ctor| ctor())
            .ok_or(ProcessorError::Unsupported(data_type))
    }

    pub fn supports(&self, data_type: DataType) -> bool {
        self.ctors.contains_key(&data_type)
    }

    /// Registered data types, in enum declaration order.
    pub fn supported(&self) -> Vec<DataType> {
        DataType::ALL
            .iter()
            .copied()
            .filter(|dt| self.ctors.contains_key(dt))
            .collect()
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("supported", &self.supported())
            .finish()
    }
}
