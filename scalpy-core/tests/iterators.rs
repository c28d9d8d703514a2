use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use scalpy_core::{
    DataType, Event, EventInfo, History, Interval, MarketPayload, MarketRequest, Preloader,
    ReplayIterator, ScalpyError, StreamIterator, Trade,
};

struct FixtureHistory {
    events: HashMap<String, Vec<Event>>,
}

fn key(info: &EventInfo) -> String {
    format!("{}:{:?}:{:?}", info.symbol, info.kind, info.period)
}

#[async_trait]
impl History for FixtureHistory {
    async fn get(&self, info: &EventInfo, _interval: Interval) -> Result<Vec<Event>, ScalpyError> {
        Ok(self.events.get(&key(info)).cloned().unwrap_or_default())
    }
}

fn event(symbol: &str, kind: DataType, period: Option<u32>, timestamp: f64) -> Event {
    let info = EventInfo::new(symbol, kind, period);
    Event {
        timestamp,
        producer_id: 1,
        info,
        data: MarketPayload::Trade(Trade {
            is_buy: true,
            size: 1.0,
            price: 1.0,
            trade_id: "id".into(),
        }),
    }
}

fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs_f64()
        * 1000.0
}

/// Equal timestamps break ties by ascending period; trades (period None)
/// sort before any KLINE period.
#[tokio::test]
async fn stream_iterator_sorts_by_timestamp_then_period() {
    let trade = event("BTCUSDT", DataType::Trade, None, 100.0);
    let kline_big = event("BTCUSDT", DataType::Kline, Some(60), 100.0);
    let kline_small = event("BTCUSDT", DataType::Kline, Some(1), 100.0);

    let mut events = HashMap::new();
    events.insert(key(&trade.info), vec![trade.clone()]);
    events.insert(key(&kline_big.info), vec![kline_big.clone()]);
    events.insert(key(&kline_small.info), vec![kline_small.clone()]);

    let history = FixtureHistory { events };

    let requests = vec![
        MarketRequest::new(trade.info.clone(), None, true).unwrap(),
        MarketRequest::new(kline_big.info.clone(), None, true).unwrap(),
        MarketRequest::new(kline_small.info.clone(), None, true).unwrap(),
    ];

    let mut stream = StreamIterator::new(requests);
    stream.run(&history, Interval::new(0.0, 1000.0).unwrap()).await.unwrap();

    let drained = stream.drain();
    assert_eq!(drained.len(), 3);
    assert_eq!(drained[0].info.period, None);
    assert_eq!(drained[1].info.period, Some(1));
    assert_eq!(drained[2].info.period, Some(60));
}

/// A `StreamIterator` restarts from the beginning once it has been
/// fully drained.
#[tokio::test]
async fn stream_iterator_restarts_after_exhaustion() {
    let e = event("BTCUSDT", DataType::Trade, None, 1.0);
    let mut events = HashMap::new();
    events.insert(key(&e.info), vec![e.clone()]);
    let history = FixtureHistory { events };

    let requests = vec![MarketRequest::new(e.info.clone(), None, true).unwrap()];
    let mut stream = StreamIterator::new(requests);
    stream.run(&history, Interval::new(0.0, 10.0).unwrap()).await.unwrap();

    assert_eq!(stream.next().unwrap().timestamp, 1.0);
    assert!(stream.next().is_none());
    assert_eq!(stream.next().unwrap().timestamp, 1.0);
}

/// Preloader materializes only preload-flagged requests over a window
/// ending at `run_start`.
#[tokio::test]
async fn preloader_only_materializes_preload_requests() {
    let preload_event = event("BTCUSDT", DataType::Trade, None, 1.0);
    let mut events = HashMap::new();
    events.insert(key(&preload_event.info), vec![preload_event.clone()]);
    let history = FixtureHistory { events };

    let requests = vec![MarketRequest::new(
        preload_event.info.clone(),
        Some(std::time::Duration::from_secs(60)),
        false,
    )
    .unwrap()];

    let mut preloader = Preloader::new(requests, 10_000.0);
    preloader.run(&history).await.unwrap();

    assert_eq!(preloader.drain(), vec![preload_event]);
}

/// Replay pacing: the wait before the second event equals the gap between
/// the two events' timestamps (within scheduling slack), and never goes
/// negative for a back-dated event.
#[tokio::test]
async fn replay_iterator_paces_by_timestamp_gap() {
    let first = event("BTCUSDT", DataType::Trade, None, 0.0);
    let second = event("BTCUSDT", DataType::Trade, None, 50.0);

    let mut events = HashMap::new();
    events.insert(key(&first.info), vec![first.clone(), second.clone()]);
    let history = FixtureHistory { events };

    let requests = vec![MarketRequest::new(first.info.clone(), None, true).unwrap()];
    let mut replay = ReplayIterator::new(requests);
    replay.run(&history, Interval::new(0.0, 100.0).unwrap()).await.unwrap();

    let start = now_ms();
    let got_first = replay.next().await.unwrap();
    assert_eq!(got_first.timestamp, 0.0);

    let got_second = replay.next().await.unwrap();
    assert_eq!(got_second.timestamp, 50.0);
    let elapsed = now_ms() - start;

    assert!(elapsed >= 49.0, "elapsed {elapsed} should be at least ~50ms");
}
