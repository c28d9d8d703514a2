//! Handler-graph driven market-event backtest engine.
//!
//! A tree of capability-tagged [`Handler`]s declares, via [`MarketRequest`],
//! which [`EventInfo`]s it wants preloaded (bulk historical data) and/or
//! streamed (time-ordered replay). [`Engine::new`] walks that tree once to
//! build dispatch tables keyed by `EventInfo`; [`Engine::run`] then drives
//! the preload phase to completion before replaying the stream phase,
//! pushing every event through trade conversion, event handlers, signal
//! handlers, and advise handlers in turn, emitting [`Order`]s as they fall
//! out the end of the pipeline. [`Pacing`] selects whether the stream
//! phase is driven by the unpaced [`StreamIterator`] or the wall-clock
//! paced [`ReplayIterator`].

pub mod engine;
pub mod enums;
pub mod error;
pub mod handler;
pub mod items;
pub mod iterators;

pub use engine::{Engine, Pacing};
pub use enums::{DataType, OrderbookKind};
pub use error::ScalpyError;
pub use handler::{DispatchTables, Handler};
pub use items::{
    Advise, Event, EventInfo, Interval, MarketPayload, MarketRequest, Ohlc, Order, Orderbook,
    PriceVolume, Signal, SignalOutcome, StreamItem, Trade,
};
pub use iterators::{History, Preloader, ReplayIterator, StreamIterator};
