use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::ScalpyError;
use crate::handler::{DispatchTables, Handler};
use crate::items::{Event, EventInfo, Interval, Order, SignalOutcome, StreamItem};
use crate::iterators::{History, Preloader, ReplayIterator, StreamIterator};

/// How the stream phase delivers events once fetched (distilled spec
/// §4.7). A caller backtesting as fast as possible wants `Immediate`;
/// one driving a paper-trading or dry-run loop against real time wants
/// `WallClock`, which paces delivery through [`ReplayIterator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    Immediate,
    WallClock,
}

/// Drives a handler tree through its preload then stream phases
/// (distilled spec §4.8). Construction walks the handler tree once,
/// building the dispatch tables `run` then repeatedly consults.
pub struct Engine {
    tables: DispatchTables,
}

impl Engine {
    pub fn new(handlers: &[Handler]) -> Self {
        Self {
            tables: DispatchTables::build(handlers),
        }
    }

    /// Runs the preload phase followed by the stream phase. `run_start` is
    /// the wall/event-time boundary preload lookback windows end at;
    /// `interval` bounds the stream phase; `pacing` selects the stream
    /// iterator driving it. Every produced [`Order`] is passed to
    /// `on_order` as it's emitted.
    pub async fn run(
        &mut self,
        history: &dyn History,
        run_start: f64,
        interval: Interval,
        pacing: Pacing,
        mut on_order: impl FnMut(Order),
    ) -> Result<(), ScalpyError> {
        info!(run_start, interval.start, interval.end, ?pacing, "starting engine run");
        self.run_preload(history, run_start).await?;
        self.run_stream(history, interval, pacing, &mut on_order).await
    }

    async fn run_preload(&mut self, history: &dyn History, run_start: f64) -> Result<(), ScalpyError> {
        let mut preloader = Preloader::new(self.tables.preload_requests.clone(), run_start);
        preloader.run(history).await?;
        let events = preloader.drain();
        debug!(count = events.len(), "preload phase fetched events");

        let mut buckets: HashMap<EventInfo, Vec<Event>> = HashMap::new();
        for event in events {
            buckets.entry(event.info.clone()).or_default().push(event);
        }

        // Iterate `(info, handle)` pairs, not values alone: the source
        // this engine generalizes unpacks `values()` as `(info, handle)`,
        // which only works when iterating `items()`. That mismatch is
        // fixed here.
        for (info, converter) in &self.tables.preload_trade_converters {
            if let Some(bucket) = buckets.get(info).cloned() {
                let produced = converter.borrow_mut()(bucket);
                for event in produced {
                    buckets.entry(event.info.clone()).or_default().push(event);
                }
            }
        }

        let mut signals = Vec::new();
        for (info, handlers) in &self.tables.preload_event_handlers {
            if let Some(bucket) = buckets.get(info) {
                for handler in handlers {
                    for item in handler.borrow_mut()(bucket.clone()) {
                        if let StreamItem::Signal(signal) = item {
                            signals.push(signal);
                        }
                    }
                }
            }
        }

        // Outputs are discarded; invoking each handler still materializes
        // any state-accumulating side effects a preload signal handler
        // performs. `Vec` collection already forces full evaluation, so
        // there is no separate "drain the generator" step to perform.
        for handler in &self.tables.preload_signal_handlers {
            for signal in &signals {
                let _ = handler.borrow_mut()(signal.clone());
            }
        }

        Ok(())
    }

    async fn run_stream(
        &mut self,
        history: &dyn History,
        interval: Interval,
        pacing: Pacing,
        on_order: &mut impl FnMut(Order),
    ) -> Result<(), ScalpyError> {
        match pacing {
            Pacing::Immediate => {
                let mut stream = StreamIterator::new(self.tables.stream_requests.clone());
                stream.run(history, interval).await?;

                let events = stream.drain();
                debug!(count = events.len(), "stream phase fetched events");
                for event in events {
                    self.convert_and_dispatch(event, on_order);
                }
            }
            Pacing::WallClock => {
                let mut stream = ReplayIterator::new(self.tables.stream_requests.clone());
                stream.run(history, interval).await?;

                debug!("stream phase pacing events against wall clock");
                while let Some(event) = stream.next().await {
                    self.convert_and_dispatch(event, on_order);
                }
            }
        }

        Ok(())
    }

    fn convert_and_dispatch(&self, event: Event, on_order: &mut impl FnMut(Order)) {
        let mut batch = vec![event.clone()];
        if let Some(converter) = self.tables.trade_converters.get(&event.info) {
            batch.extend(converter.borrow_mut()(event));
        }

        for derived in batch {
            self.dispatch_event(derived, on_order);
        }
    }

    fn dispatch_event(&self, event: Event, on_order: &mut impl FnMut(Order)) {
        let Some(handlers) = self.tables.event_handlers.get(&event.info) else {
            // Edge case: no event handler subscribed to this info. Trade
            // conversion upstream may still have produced derived events
            // under other infos; this branch simply has nothing to do.
            return;
        };

        for handler in handlers {
            for item in handler.borrow_mut()(event.clone()) {
                let StreamItem::Signal(signal) = item else {
                    continue;
                };

                for signal_handler in &self.tables.signal_handlers {
                    for outcome in signal_handler.borrow_mut()(signal.clone()) {
                        match outcome {
                            SignalOutcome::Order(order) => on_order(order),
                            SignalOutcome::Advise(advise) => {
                                for advise_handler in &self.tables.advise_handlers {
                                    for order in advise_handler.borrow_mut()(advise.clone()) {
                                        on_order(order);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
