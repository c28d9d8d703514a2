use async_trait::async_trait;
use chrono::NaiveDate;
use scalpy_core::{DataType, EventInfo, Interval, MarketPayload, Ohlc};

use crate::error::ConnectorError;

/// Narrow interface an exchange connector exposes to the history provider
/// (distilled spec §6.3): whether batched multi-day downloads make sense
/// for a data type, a single calendar day of trade/orderbook ticks, and a
/// batched interval of candles.
#[async_trait]
pub trait Connector: Send + Sync {
    fn can_batch_download(&self, kind: DataType) -> bool;

    async fn get_day(
        &self,
        info: &EventInfo,
        day: NaiveDate,
    ) -> Result<Vec<MarketPayload>, ConnectorError>;

    async fn get_days(
        &self,
        info: &EventInfo,
        interval: Interval,
    ) -> Result<Vec<Ohlc>, ConnectorError>;
}
