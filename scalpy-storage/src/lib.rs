//! Persistence interface, Redis-backed reference implementation, and
//! history provider.
//!
//! [`Storage`] is the narrow surface the backtest engine's iterators need:
//! a downloaded-day registry plus save/get of market events.
//! [`RedisStorage`] implements it over sorted sets keyed by a per-data-type
//! timestamp multiplier. [`HistoryProvider`] ties a [`scalpy_connectors::Connector`]
//! and a [`Storage`] together, hydrating storage from the connector for
//! whatever isn't already downloaded (coalescing batch-downloadable runs
//! of missing days) before serving the requested interval back out of
//! storage.

pub mod error;
pub mod history_provider;
pub mod redis_storage;
pub mod storage;

pub use error::StorageError;
pub use history_provider::HistoryProvider;
pub use redis_storage::{Config, RedisStorage};
pub use storage::{from_stored_timestamp, time_multiplier, to_stored_timestamp, Storage};
