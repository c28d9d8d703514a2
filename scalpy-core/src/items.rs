use std::time::Duration;

use smol_str::SmolStr;

use crate::enums::{DataType, OrderbookKind};
use crate::error::ScalpyError;

/// Routing key for market events: `(symbol, type, period)`. `period` is
/// only meaningful for [`DataType::Kline`]; every other type carries
/// `None`, which canonical sort treats as the smallest period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct EventInfo {
    pub symbol: SmolStr,
    pub kind: DataType,
    pub period: Option<u32>,
}

impl EventInfo {
    pub fn new(symbol: impl Into<SmolStr>, kind: DataType, period: Option<u32>) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            period,
        }
    }

    /// Sort key used to impose the canonical preload/stream ordering:
    /// ties on timestamp break by ascending period, with trades and other
    /// non-periodic types (period `None`) sorting first.
    pub(crate) fn period_sort_key(&self) -> u32 {
        self.period.unwrap_or(0)
    }
}

/// Closed time interval in milliseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Result<Self, ScalpyError> {
        if start > end {
            return Err(ScalpyError::Validation(format!(
                "interval start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PriceVolume {
    pub price: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Trade {
    pub is_buy: bool,
    pub size: f64,
    pub price: f64,
    pub trade_id: SmolStr,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Ohlc {
    pub start_timestamp: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
    pub turnover: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Orderbook {
    pub kind: OrderbookKind,
    pub asks: Vec<PriceVolume>,
    pub bids: Vec<PriceVolume>,
}

/// Concrete payload of a market [`Event`]. `Tick` is a catch-all for data
/// types with no dedicated struct; connectors that don't support it
/// surface [`ScalpyError::NotImplemented`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum MarketPayload {
    Tick(serde_json::Value),
    Trade(Trade),
    Ohlc(Ohlc),
    Orderbook(Orderbook),
}

/// A produced market event: a timestamped, producer-tagged payload routed
/// by [`EventInfo`]. `timestamp` is the close-time for `Ohlc` payloads.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Event {
    pub timestamp: f64,
    pub producer_id: i64,
    pub info: EventInfo,
    pub data: MarketPayload,
}

/// Output of an `EventHandler`, consumed by `SignalHandler`s. The payload
/// is intentionally opaque (`serde_json::Value`): signal shape is defined
/// entirely by the handler pipeline that produces and consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub timestamp: f64,
    pub producer_id: i64,
    pub payload: serde_json::Value,
}

/// Output of a `SignalHandler` that still requires an `AdviseHandler` pass
/// before becoming an [`Order`].
#[derive(Debug, Clone, PartialEq)]
pub struct Advise {
    pub timestamp: f64,
    pub producer_id: i64,
    pub payload: serde_json::Value,
}

/// Terminal item emitted to the outside world.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub timestamp: f64,
    pub producer_id: i64,
    pub payload: serde_json::Value,
}

/// Uniform container over every item shape that flows through the engine,
/// used where handler callback signatures don't need concrete types:
/// diagrams, test fixtures, and storage payloads. Handler callbacks
/// themselves take the concrete `Event` / `Signal` / `Advise` / `Order`
/// types directly, matching the call sites this was distilled from.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(Event),
    Signal(Signal),
    Advise(Advise),
    Order(Order),
}

/// Either outcome a `SignalHandler` may produce for one input `Signal`.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Advise(Advise),
    Order(Order),
}

/// A handler's subscription to one [`EventInfo`]: bulk preload over
/// `preload` (a lookback window ending at the run's start), and/or live
/// streaming. At least one of the two must be set.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketRequest {
    pub info: EventInfo,
    pub preload: Option<Duration>,
    pub stream: bool,
}

impl MarketRequest {
    pub fn new(info: EventInfo, preload: Option<Duration>, stream: bool) -> Result<Self, ScalpyError> {
        if preload.is_none() && !stream {
            return Err(ScalpyError::Validation(format!(
                "market request for {info:?} sets neither preload nor stream"
            )));
        }
        Ok(Self {
            info,
            preload,
            stream,
        })
    }
}
