use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use scalpy_core::{Event, EventInfo, History, Interval, MarketPayload, Ohlc, ScalpyError};
use scalpy_connectors::Connector;
use tracing::debug;

use crate::storage::Storage;

/// Resolves `History::get` against a [`Connector`] and a [`Storage`]
/// backend: walk the requested interval day by day, download and persist
/// whatever isn't already in storage, then serve the full interval back
/// out of storage (distilled spec §6.5). Owns both collaborators' handles
/// directly rather than reaching through a process-wide database
/// singleton.
pub struct HistoryProvider<C, S> {
    connector: Arc<C>,
    storage: Arc<S>,
}

impl<C, S> HistoryProvider<C, S>
where
    C: Connector,
    S: Storage,
{
    pub fn new(connector: Arc<C>, storage: Arc<S>) -> Self {
        Self { connector, storage }
    }

    async fn hydrate(&self, info: &EventInfo, interval: Interval) -> Result<(), ScalpyError> {
        let days = days_in_interval(interval);
        if days.is_empty() {
            return Ok(());
        }
        debug!(symbol = %info.symbol, days = days.len(), "hydrating storage before serving interval");

        if self.connector.can_batch_download(info.kind) {
            self.hydrate_batch(info, &days).await
        } else {
            self.hydrate_per_day(info, &days).await
        }
    }

    async fn hydrate_per_day(&self, info: &EventInfo, days: &[NaiveDate]) -> Result<(), ScalpyError> {
        for &day in days {
            if self.storage.is_downloaded(info, day).await.map_err(Into::<ScalpyError>::into)? {
                continue;
            }

            let items = self
                .connector
                .get_day(info, day)
                .await
                .map_err(Into::<ScalpyError>::into)?;
            let events = items
                .into_iter()
                .map(|data| Event {
                    timestamp: day_start_ms(day),
                    producer_id: 0,
                    info: info.clone(),
                    data,
                })
                .collect();

            self.storage
                .save(info, events)
                .await
                .map_err(Into::<ScalpyError>::into)?;
            self.storage
                .set_downloaded(info, day, true)
                .await
                .map_err(Into::<ScalpyError>::into)?;
        }
        Ok(())
    }

    async fn hydrate_batch(&self, info: &EventInfo, days: &[NaiveDate]) -> Result<(), ScalpyError> {
        let mut downloaded = Vec::with_capacity(days.len());
        for &day in days {
            downloaded.push(
                self.storage
                    .is_downloaded(info, day)
                    .await
                    .map_err(Into::<ScalpyError>::into)?,
            );
        }

        for (start, end) in coalesce_missing_runs(days, &downloaded) {
            let interval = Interval::new(day_start_ms(start), day_start_ms(end) + DAY_MS - 1.0)?;
            let candles = self
                .connector
                .get_days(info, interval)
                .await
                .map_err(Into::<ScalpyError>::into)?;

            let events = candles
                .into_iter()
                .map(|ohlc| Event {
                    timestamp: ohlc.start_timestamp,
                    producer_id: 0,
                    info: info.clone(),
                    data: MarketPayload::Ohlc(ohlc),
                })
                .collect();

            self.storage
                .save(info, events)
                .await
                .map_err(Into::<ScalpyError>::into)?;

            let mut day = start;
            while day <= end {
                self.storage
                    .set_downloaded(info, day, true)
                    .await
                    .map_err(Into::<ScalpyError>::into)?;
                day += ChronoDuration::days(1);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<C, S> History for HistoryProvider<C, S>
where
    C: Connector,
    S: Storage,
{
    async fn get(&self, info: &EventInfo, interval: Interval) -> Result<Vec<Event>, ScalpyError> {
        self.hydrate(info, interval).await?;
        self.storage
            .get(info, interval)
            .await
            .map_err(Into::into)
    }
}

const DAY_MS: f64 = 86_400_000.0;

fn day_start_ms(day: NaiveDate) -> f64 {
    day.and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
        .timestamp_millis() as f64
}

fn days_in_interval(interval: Interval) -> Vec<NaiveDate> {
    let Some(start) = chrono::DateTime::from_timestamp_millis(interval.start as i64) else {
        return Vec::new();
    };
    let Some(end) = chrono::DateTime::from_timestamp_millis(interval.end as i64) else {
        return Vec::new();
    };

    let mut day = start.date_naive();
    let last = end.date_naive();
    let mut days = Vec::new();
    while day <= last {
        days.push(day);
        day += ChronoDuration::days(1);
    }
    days
}

/// Coalesces the missing-day runs of a batch-downloadable data type
/// (distilled spec §6.5): a run begins at the first missing day, ends the
/// day before a skipped already-downloaded day, and an open run at the end
/// closes at the final day.
fn coalesce_missing_runs(days: &[NaiveDate], downloaded: &[bool]) -> Vec<(NaiveDate, NaiveDate)> {
    let mut runs = Vec::new();
    let mut run_start: Option<NaiveDate> = None;

    for (&day, &is_downloaded) in days.iter().zip(downloaded) {
        if is_downloaded {
            if let Some(start) = run_start.take() {
                runs.push((start, day - ChronoDuration::days(1)));
            }
        } else if run_start.is_none() {
            run_start = Some(day);
        }
    }

    if let Some(start) = run_start {
        runs.push((start, *days.last().expect("non-empty by construction")));
    }

    runs
}

/// Also exposed for the history-provider-free day-coalescing test to
/// exercise the interval-only flavor of scenario 4 directly.
pub fn coalesce_missing_days(
    interval: Interval,
    already_downloaded: &[NaiveDate],
) -> Vec<(NaiveDate, NaiveDate)> {
    let days = days_in_interval(interval);
    let downloaded: Vec<bool> = days
        .iter()
        .map(|day| already_downloaded.contains(day))
        .collect();
    coalesce_missing_runs(&days, &downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario 4: interval `[D1..D7]`, downloaded = `{D2, D5}`; expect
    /// sub-intervals `[D1..D1], [D3..D4], [D6..D7]`.
    #[test]
    fn coalesces_missing_day_runs() {
        let d = |n: u32| NaiveDate::from_ymd_opt(2024, 1, n).unwrap();
        let interval = Interval::new(day_start_ms(d(1)), day_start_ms(d(7))).unwrap();
        let downloaded = vec![d(2), d(5)];

        let runs = coalesce_missing_days(interval, &downloaded);

        assert_eq!(runs, vec![(d(1), d(1)), (d(3), d(4)), (d(6), d(7))]);
    }

    #[test]
    fn fully_downloaded_interval_produces_no_runs() {
        let d = |n: u32| NaiveDate::from_ymd_opt(2024, 1, n).unwrap();
        let interval = Interval::new(day_start_ms(d(1)), day_start_ms(d(3))).unwrap();
        let downloaded = vec![d(1), d(2), d(3)];

        assert!(coalesce_missing_days(interval, &downloaded).is_empty());
    }

    #[test]
    fn fully_missing_interval_is_a_single_run() {
        let d = |n: u32| NaiveDate::from_ymd_opt(2024, 1, n).unwrap();
        let interval = Interval::new(day_start_ms(d(1)), day_start_ms(d(3))).unwrap();

        assert_eq!(coalesce_missing_days(interval, &[]), vec![(d(1), d(3))]);
    }
}
