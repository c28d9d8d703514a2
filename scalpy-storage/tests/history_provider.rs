use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use scalpy_connectors::{Connector, ConnectorError};
use scalpy_core::{DataType, Event, EventInfo, History, Interval, MarketPayload, Ohlc, Trade};
use scalpy_storage::{HistoryProvider, Storage, StorageError};

/// In-memory `Connector` + `Storage` pair, standing in for a live
/// exchange/Redis backend so the history provider's hydrate/coalesce flow
/// is exercised without any network or database dependency.
struct FakeConnector {
    batch_download: bool,
    day_calls: Mutex<Vec<NaiveDate>>,
    days_calls: Mutex<Vec<Interval>>,
}

#[async_trait]
impl Connector for FakeConnector {
    fn can_batch_download(&self, _kind: DataType) -> bool {
        self.batch_download
    }

    async fn get_day(
        &self,
        _info: &EventInfo,
        day: NaiveDate,
    ) -> Result<Vec<MarketPayload>, ConnectorError> {
        self.day_calls.lock().unwrap().push(day);
        Ok(vec![MarketPayload::Trade(Trade {
            is_buy: true,
            size: 1.0,
            price: 1.0,
            trade_id: "id".into(),
        })])
    }

    async fn get_days(
        &self,
        _info: &EventInfo,
        interval: Interval,
    ) -> Result<Vec<Ohlc>, ConnectorError> {
        self.days_calls.lock().unwrap().push(interval);
        Ok(vec![Ohlc {
            start_timestamp: interval.start,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: None,
            turnover: None,
        }])
    }
}

#[derive(Default)]
struct FakeStorage {
    downloaded: Mutex<HashSet<(String, NaiveDate)>>,
    saved: Mutex<Vec<Event>>,
}

#[async_trait]
impl Storage for FakeStorage {
    async fn is_downloaded(&self, info: &EventInfo, day: NaiveDate) -> Result<bool, StorageError> {
        Ok(self
            .downloaded
            .lock()
            .unwrap()
            .contains(&(info.symbol.to_string(), day)))
    }

    async fn set_downloaded(
        &self,
        info: &EventInfo,
        day: NaiveDate,
        downloaded: bool,
    ) -> Result<(), StorageError> {
        let mut guard = self.downloaded.lock().unwrap();
        if downloaded {
            guard.insert((info.symbol.to_string(), day));
        } else {
            guard.remove(&(info.symbol.to_string(), day));
        }
        Ok(())
    }

    async fn save(&self, _info: &EventInfo, items: Vec<Event>) -> Result<(), StorageError> {
        self.saved.lock().unwrap().extend(items);
        Ok(())
    }

    async fn get(&self, _info: &EventInfo, interval: Interval) -> Result<Vec<Event>, StorageError> {
        Ok(self
            .saved
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.timestamp >= interval.start && e.timestamp <= interval.end)
            .cloned()
            .collect())
    }
}

fn day_ms(y: i32, m: u32, d: u32) -> f64 {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis() as f64
}

/// Per-day hydration: one `get_day` call per missing day, each day marked
/// downloaded afterward.
#[tokio::test]
async fn hydrates_missing_days_one_at_a_time() {
    let connector = Arc::new(FakeConnector {
        batch_download: false,
        day_calls: Mutex::new(Vec::new()),
        days_calls: Mutex::new(Vec::new()),
    });
    let storage = Arc::new(FakeStorage::default());
    let provider = HistoryProvider::new(Arc::clone(&connector), Arc::clone(&storage));

    let info = EventInfo::new("BTCUSDT", DataType::Trade, None);
    let interval = Interval::new(day_ms(2024, 1, 1), day_ms(2024, 1, 3)).unwrap();

    provider.get(&info, interval).await.unwrap();

    assert_eq!(connector.day_calls.lock().unwrap().len(), 3);
    assert!(storage
        .is_downloaded(&info, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        .await
        .unwrap());
}

/// A second hydration over the same interval makes no further connector
/// calls once every day is marked downloaded.
#[tokio::test]
async fn already_downloaded_days_are_not_refetched() {
    let connector = Arc::new(FakeConnector {
        batch_download: false,
        day_calls: Mutex::new(Vec::new()),
        days_calls: Mutex::new(Vec::new()),
    });
    let storage = Arc::new(FakeStorage::default());
    let provider = HistoryProvider::new(Arc::clone(&connector), Arc::clone(&storage));

    let info = EventInfo::new("BTCUSDT", DataType::Trade, None);
    let interval = Interval::new(day_ms(2024, 1, 1), day_ms(2024, 1, 2)).unwrap();

    provider.get(&info, interval).await.unwrap();
    provider.get(&info, interval).await.unwrap();

    assert_eq!(connector.day_calls.lock().unwrap().len(), 2);
}

/// Batch-downloadable data types coalesce contiguous missing-day runs into
/// one `get_days` call per run instead of one call per day.
#[tokio::test]
async fn batch_downloadable_types_coalesce_missing_runs() {
    let connector = Arc::new(FakeConnector {
        batch_download: true,
        day_calls: Mutex::new(Vec::new()),
        days_calls: Mutex::new(Vec::new()),
    });
    let storage = Arc::new(FakeStorage::default());

    let info = EventInfo::new("BTCUSDT", DataType::Kline, Some(60));
    storage
        .set_downloaded(&info, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), true)
        .await
        .unwrap();

    let provider = HistoryProvider::new(Arc::clone(&connector), Arc::clone(&storage));
    let interval = Interval::new(day_ms(2024, 1, 1), day_ms(2024, 1, 3)).unwrap();

    provider.get(&info, interval).await.unwrap();

    // D1 is missing (run 1), D2 already downloaded, D3 missing (run 2):
    // exactly two get_days calls, not three get_day calls.
    assert_eq!(connector.days_calls.lock().unwrap().len(), 2);
    assert!(connector.day_calls.lock().unwrap().is_empty());
}
