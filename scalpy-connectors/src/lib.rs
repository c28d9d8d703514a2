//! Exchange connector interface plus a Bybit-flavored reference connector.
//!
//! [`Connector`] is the narrow surface a [`scalpy_core`] history provider
//! needs: whether a data type supports batched multi-day downloads, a
//! single calendar day of trade/orderbook ticks, and a batched interval of
//! candles. [`bybit::BybitConnector`] implements it against Bybit's public
//! download-list-files API, preserving the bit-exact URL template, period
//! codes, and CSV/NDJSON row formats this connector was distilled from.

pub mod archive;
pub mod bybit;
pub mod connector;
pub mod error;

pub use bybit::BybitConnector;
pub use connector::Connector;
pub use error::ConnectorError;
