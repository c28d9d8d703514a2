use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::items::{Advise, Event, EventInfo, MarketRequest, Order, Signal, SignalOutcome, StreamItem};

pub type TradeConverterFn = Rc<RefCell<dyn FnMut(Event) -> Vec<Event>>>;
pub type PreloadTradeConverterFn = Rc<RefCell<dyn FnMut(Vec<Event>) -> Vec<Event>>>;
pub type EventHandlerFn = Rc<RefCell<dyn FnMut(Event) -> Vec<StreamItem>>>;
pub type PreloadEventHandlerFn = Rc<RefCell<dyn FnMut(Vec<Event>) -> Vec<StreamItem>>>;
pub type SignalHandlerFn = Rc<RefCell<dyn FnMut(Signal) -> Vec<SignalOutcome>>>;
pub type PreloadSignalHandlerFn = Rc<RefCell<dyn FnMut(Signal) -> Vec<SignalOutcome>>>;
pub type AdviseHandlerFn = Rc<RefCell<dyn FnMut(Advise) -> Vec<Order>>>;

/// A capability-tagged handler record, standing in for the source's
/// dynamic class-hierarchy probing: each capability is an optional
/// callback slot rather than a base class, and a capability is "active"
/// iff its slot is `Some`. A handler may carry several capabilities at
/// once (e.g. both `EventHandler` and `SignalHandler`).
#[derive(Clone, Default)]
pub struct Handler {
    pub requests: Vec<MarketRequest>,
    pub on_trade: Option<TradeConverterFn>,
    pub on_preload_trades: Option<PreloadTradeConverterFn>,
    pub on_event: Option<EventHandlerFn>,
    pub on_preload_events: Option<PreloadEventHandlerFn>,
    pub on_signal: Option<SignalHandlerFn>,
    pub on_preload_signals: Option<PreloadSignalHandlerFn>,
    pub on_advise: Option<AdviseHandlerFn>,
    /// Only walked by the analyzer when this handler is itself an active
    /// `SignalHandler` or `AdviseHandler`.
    pub children: Vec<Handler>,
}

impl Handler {
    pub fn new(requests: Vec<MarketRequest>) -> Self {
        Self {
            requests,
            ..Default::default()
        }
    }

    pub fn with_trade_converter(mut self, f: impl FnMut(Event) -> Vec<Event> + 'static) -> Self {
        self.on_trade = Some(Rc::new(RefCell::new(f)));
        self
    }

    pub fn with_preload_trade_converter(
        mut self,
        f: impl FnMut(Vec<Event>) -> Vec<Event> + 'static,
    ) -> Self {
        self.on_preload_trades = Some(Rc::new(RefCell::new(f)));
        self
    }

    pub fn with_event_handler(mut self, f: impl FnMut(Event) -> Vec<StreamItem> + 'static) -> Self {
        self.on_event = Some(Rc::new(RefCell::new(f)));
        self
    }

    pub fn with_preload_event_handler(
        mut self,
        f: impl FnMut(Vec<Event>) -> Vec<StreamItem> + 'static,
    ) -> Self {
        self.on_preload_events = Some(Rc::new(RefCell::new(f)));
        self
    }

    pub fn with_signal_handler(
        mut self,
        f: impl FnMut(Signal) -> Vec<SignalOutcome> + 'static,
        children: Vec<Handler>,
    ) -> Self {
        self.on_signal = Some(Rc::new(RefCell::new(f)));
        self.children = children;
        self
    }

    pub fn with_preload_signal_handler(
        mut self,
        f: impl FnMut(Signal) -> Vec<SignalOutcome> + 'static,
    ) -> Self {
        self.on_preload_signals = Some(Rc::new(RefCell::new(f)));
        self
    }

    pub fn with_advise_handler(
        mut self,
        f: impl FnMut(Advise) -> Vec<Order> + 'static,
        children: Vec<Handler>,
    ) -> Self {
        self.on_advise = Some(Rc::new(RefCell::new(f)));
        self.children = children;
        self
    }

    fn is_signal_or_advise_handler(&self) -> bool {
        self.on_signal.is_some() || self.on_advise.is_some()
    }
}

/// Dispatch tables built by walking a handler tree (distilled spec §4.4).
#[derive(Default)]
pub struct DispatchTables {
    pub trade_converters: HashMap<EventInfo, TradeConverterFn>,
    pub event_handlers: HashMap<EventInfo, Vec<EventHandlerFn>>,
    pub signal_handlers: Vec<SignalHandlerFn>,
    pub advise_handlers: Vec<AdviseHandlerFn>,

    pub preload_trade_converters: HashMap<EventInfo, PreloadTradeConverterFn>,
    pub preload_event_handlers: HashMap<EventInfo, Vec<PreloadEventHandlerFn>>,
    pub preload_signal_handlers: Vec<PreloadSignalHandlerFn>,

    pub stream_requests: Vec<MarketRequest>,
    pub preload_requests: Vec<MarketRequest>,
}

impl DispatchTables {
    /// Recursively walk `handlers`, populating every table. Mirrors the
    /// analyzer's per-request rule ordering: stream subscriptions first,
    /// then preload subscriptions, for each request in turn; children are
    /// visited once per handler, after all of its own requests.
    pub fn build(handlers: &[Handler]) -> Self {
        let mut tables = Self::default();
        for handler in handlers {
            tables.analyze(handler);
        }
        tables
    }

    fn analyze(&mut self, handler: &Handler) {
        for request in &handler.requests {
            if request.stream {
                self.stream_requests.push(request.clone());

                if let Some(on_trade) = &handler.on_trade {
                    self.trade_converters
                        .insert(request.info.clone(), Rc::clone(on_trade));
                }
                if let Some(on_event) = &handler.on_event {
                    self.event_handlers
                        .entry(request.info.clone())
                        .or_default()
                        .push(Rc::clone(on_event));
                }
                if let Some(on_signal) = &handler.on_signal {
                    self.signal_handlers.push(Rc::clone(on_signal));
                }
                if let Some(on_advise) = &handler.on_advise {
                    self.advise_handlers.push(Rc::clone(on_advise));
                }
            }

            if request.preload.is_some() {
                self.preload_requests.push(request.clone());

                if let Some(on_preload_trades) = &handler.on_preload_trades {
                    self.preload_trade_converters
                        .insert(request.info.clone(), Rc::clone(on_preload_trades));
                }
                if let Some(on_preload_events) = &handler.on_preload_events {
                    self.preload_event_handlers
                        .entry(request.info.clone())
                        .or_default()
                        .push(Rc::clone(on_preload_events));
                }
                if let Some(on_preload_signals) = &handler.on_preload_signals {
                    self.preload_signal_handlers
                        .push(Rc::clone(on_preload_signals));
                }
            }
        }

        if handler.is_signal_or_advise_handler() {
            for child in &handler.children {
                self.analyze(child);
            }
        }
    }
}
