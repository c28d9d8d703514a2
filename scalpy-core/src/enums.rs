use std::fmt;

/// The market-data kinds an [`crate::items::EventInfo`] can route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum DataType {
    Tick,
    Trade,
    Orderbook,
    Kline,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Tick => "TICK",
            DataType::Trade => "TRADE",
            DataType::Orderbook => "ORDERBOOK",
            DataType::Kline => "KLINE",
        };
        f.write_str(s)
    }
}

/// Whether an [`crate::items::Orderbook`] carries a full book or an
/// incremental update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum OrderbookKind {
    Snapshot,
    Delta,
}
