use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::error::ScalpyError;
use crate::items::{Event, EventInfo, Interval, MarketRequest};

/// Delegated to by the preloader and stream iterators to materialize
/// events for one subscription. Implemented by `scalpy-storage`'s
/// `HistoryProvider`, which resolves this against connectors and a
/// persistence backend; defined here so `scalpy-core` depends on neither.
#[async_trait]
pub trait History: Send + Sync {
    async fn get(&self, info: &EventInfo, interval: Interval) -> Result<Vec<Event>, ScalpyError>;
}

/// Ascending timestamp, with ties broken by ascending period (trades and
/// other non-periodic types, whose period is `None`, sort first) — the
/// canonical order distilled spec §4.5 requires of both the preloader and
/// the stream iterator.
fn sort_canonical(events: &mut [Event]) {
    events.sort_by(|a, b| {
        a.timestamp
            .partial_cmp(&b.timestamp)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.info.period_sort_key().cmp(&b.info.period_sort_key()))
    });
}

pub(crate) fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs_f64()
        * 1000.0
}

/// Bulk-phase iterator: one `History::get` call per preload-subscribed
/// request, covering `[run_start - preload, run_start]`, merged into
/// canonical order. `run` materializes; `next`/`drain` iterate, restarting
/// from the beginning once exhausted (distilled spec §4.5 "restart
/// semantics").
pub struct Preloader {
    requests: Vec<MarketRequest>,
    run_start: f64,
    events: Vec<Event>,
    cursor: usize,
}

impl Preloader {
    pub fn new(requests: Vec<MarketRequest>, run_start: f64) -> Self {
        Self {
            requests,
            run_start,
            events: Vec::new(),
            cursor: 0,
        }
    }

    pub async fn run(&mut self, history: &dyn History) -> Result<(), ScalpyError> {
        let mut events = Vec::new();
        for request in &self.requests {
            let Some(preload) = request.preload else {
                continue;
            };
            let interval = Interval::new(self.run_start - preload.as_millis() as f64, self.run_start)?;
            events.extend(history.get(&request.info, interval).await?);
        }
        sort_canonical(&mut events);
        self.events = events;
        self.cursor = 0;
        Ok(())
    }

    pub fn next(&mut self) -> Option<Event> {
        if self.cursor >= self.events.len() {
            self.cursor = 0;
            return None;
        }
        let event = self.events[self.cursor].clone();
        self.cursor += 1;
        Some(event)
    }

    /// Drain every event from the current position through end-of-iteration.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Some(event) = self.next() {
            out.push(event);
        }
        out
    }
}

/// Live-replay-phase iterator: one `History::get` call per
/// stream-subscribed request over the caller-supplied `Interval`, merged
/// into canonical order. Same restart-on-exhaustion contract as
/// [`Preloader`].
pub struct StreamIterator {
    requests: Vec<MarketRequest>,
    events: Vec<Event>,
    cursor: usize,
}

impl StreamIterator {
    pub fn new(requests: Vec<MarketRequest>) -> Self {
        Self {
            requests,
            events: Vec::new(),
            cursor: 0,
        }
    }

    pub async fn run(&mut self, history: &dyn History, interval: Interval) -> Result<(), ScalpyError> {
        let mut events = Vec::new();
        for request in &self.requests {
            if !request.stream {
                continue;
            }
            events.extend(history.get(&request.info, interval).await?);
        }
        sort_canonical(&mut events);
        self.events = events;
        self.cursor = 0;
        Ok(())
    }

    pub fn next(&mut self) -> Option<Event> {
        if self.cursor >= self.events.len() {
            self.cursor = 0;
            return None;
        }
        let event = self.events[self.cursor].clone();
        self.cursor += 1;
        Some(event)
    }

    pub fn drain(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Some(event) = self.next() {
            out.push(event);
        }
        out
    }
}

/// Wraps [`StreamIterator`], pacing emission against wall-clock time
/// (distilled spec §4.7). On the first event of a run, `time_shift` is
/// fixed to `now - first_event.timestamp`; every later event waits until
/// wall-clock reaches `event.timestamp + time_shift`, clamped so a
/// back-dated event never produces a negative sleep (the spec's one
/// explicitly resolved open question). `time_shift` is cleared on
/// exhaustion so the next run recomputes it from its own first event.
pub struct ReplayIterator {
    inner: StreamIterator,
    time_shift: Option<f64>,
}

impl ReplayIterator {
    pub fn new(requests: Vec<MarketRequest>) -> Self {
        Self {
            inner: StreamIterator::new(requests),
            time_shift: None,
        }
    }

    pub async fn run(&mut self, history: &dyn History, interval: Interval) -> Result<(), ScalpyError> {
        self.inner.run(history, interval).await
    }

    /// Yields the next event after sleeping however long wall-clock
    /// pacing requires. `None` signals end-of-iteration and clears
    /// `time_shift`.
    pub async fn next(&mut self) -> Option<Event> {
        let Some(event) = self.inner.next() else {
            self.time_shift = None;
            return None;
        };

        let now = now_ms();
        let shift = *self.time_shift.get_or_insert_with(|| now - event.timestamp);
        let target = event.timestamp + shift;
        let delay_ms = (target - now).max(0.0);

        if delay_ms > 0.0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms as u64)).await;
        }

        Some(event)
    }
}
