use async_trait::async_trait;
use chrono::NaiveDate;
use scalpy_core::{DataType, Event, EventInfo, Interval};

use crate::error::StorageError;

/// Persistence multiplier applied to a timestamp before it is stored,
/// inverted on retrieval (distilled spec §6.4): trade and orderbook
/// timestamps are stored as microseconds, kline timestamps as seconds.
pub fn time_multiplier(kind: DataType) -> f64 {
    match kind {
        DataType::Trade | DataType::Orderbook => 1_000_000.0,
        DataType::Kline => 0.001,
        DataType::Tick => 1.0,
    }
}

pub fn to_stored_timestamp(ts: f64, kind: DataType) -> i64 {
    (ts * time_multiplier(kind)) as i64
}

pub fn from_stored_timestamp(stored: i64, kind: DataType) -> f64 {
    stored as f64 / time_multiplier(kind)
}

/// Narrow persistence interface the history provider is built against
/// (distilled spec §6.4): a downloaded-day registry plus save/get of
/// market events for one [`EventInfo`].
#[async_trait]
pub trait Storage: Send + Sync {
    async fn is_downloaded(&self, info: &EventInfo, day: NaiveDate) -> Result<bool, StorageError>;

    async fn set_downloaded(
        &self,
        info: &EventInfo,
        day: NaiveDate,
        downloaded: bool,
    ) -> Result<(), StorageError>;

    /// Dispatched by `info.kind`: trades and candles are row-inserted in
    /// chunks of 1000; orderbook items are split by snapshot/delta into
    /// separate tables.
    async fn save(&self, info: &EventInfo, items: Vec<Event>) -> Result<(), StorageError>;

    /// For orderbooks, reconstructs from the closest snapshot at or before
    /// `interval.start`, applies deltas up to `interval.start`, then
    /// streams subsequent deltas through `interval.end`.
    async fn get(&self, info: &EventInfo, interval: Interval) -> Result<Vec<Event>, StorageError>;
}
