use async_trait::async_trait;
use chrono::NaiveDate;
use scalpy_core::{DataType, EventInfo, Interval, MarketPayload, Ohlc, OrderbookKind, Orderbook, PriceVolume, Trade};
use serde::Deserialize;
use tracing::debug;

use crate::archive::extract_lines;
use crate::connector::Connector;
use crate::error::ConnectorError;

const DOWNLOAD_BASE: &str = "https://api2.bybit.com/quote/public/support/download/list-files";

/// Supported raw candle periods (minute codes) plus their Bybit-flavored
/// string codes (distilled spec §6.3). Anything outside this table is
/// rejected with a validation error.
fn convert_period(raw: u32) -> Result<String, ConnectorError> {
    match raw {
        1 | 3 | 5 | 15 | 30 | 60 | 120 | 240 | 360 | 720 => Ok(raw.to_string()),
        1440 => Ok("D".to_string()),
        10080 => Ok("W".to_string()),
        43200 => Ok("M".to_string()),
        other => Err(ConnectorError::Validation(format!(
            "unsupported candle period: {other}"
        ))),
    }
}

/// Builds the bit-exact download-list-files URL for one symbol/day range.
fn build_download_list_url(product_id: &str, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "{DOWNLOAD_BASE}?bizType=contract&interval=daily&periods=&productId={product_id}&symbols={symbol}&startDay={}&endDay={}",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d"),
    )
}

#[derive(Debug, Deserialize)]
struct ListFilesResponse {
    result: ListFilesResult,
}

#[derive(Debug, Deserialize)]
struct ListFilesResult {
    list: Vec<ListFilesEntry>,
}

#[derive(Debug, Deserialize)]
struct ListFilesEntry {
    #[serde(rename = "fileName")]
    file_name: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct OrderbookLine {
    cts: f64,
    #[serde(rename = "type")]
    kind: String,
    data: OrderbookLineData,
}

#[derive(Debug, Deserialize)]
struct OrderbookLineData {
    a: Vec<[String; 2]>,
    b: Vec<[String; 2]>,
}

fn parse_price_volume_pairs(pairs: &[[String; 2]]) -> Result<Vec<PriceVolume>, ConnectorError> {
    pairs
        .iter()
        .map(|[price, volume]| {
            Ok(PriceVolume {
                price: price
                    .parse()
                    .map_err(|_| ConnectorError::CorruptInput(format!("bad price '{price}'")))?,
                volume: volume
                    .parse()
                    .map_err(|_| ConnectorError::CorruptInput(format!("bad volume '{volume}'")))?,
            })
        })
        .collect()
}

fn parse_orderbook_line(line: &str) -> Result<(f64, MarketPayload), ConnectorError> {
    let parsed: OrderbookLine = serde_json::from_str(line)
        .map_err(|e| ConnectorError::CorruptInput(format!("malformed orderbook line: {e}")))?;

    let kind = match parsed.kind.as_str() {
        "snapshot" => OrderbookKind::Snapshot,
        "delta" => OrderbookKind::Delta,
        other => {
            return Err(ConnectorError::CorruptInput(format!(
                "unknown orderbook line type '{other}'"
            )))
        }
    };

    let orderbook = Orderbook {
        kind,
        asks: parse_price_volume_pairs(&parsed.data.a)?,
        bids: parse_price_volume_pairs(&parsed.data.b)?,
    };

    Ok((parsed.cts, MarketPayload::Orderbook(orderbook)))
}

/// Parses one `ts,symbol,side,size,price,tick_dir,trade_id,...` trade CSV
/// row. `side` starting with `'B'` means buy; trailing columns beyond
/// `trade_id` are ignored.
fn parse_trade_csv_line(line: &str) -> Result<(f64, MarketPayload), ConnectorError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 7 {
        return Err(ConnectorError::CorruptInput(format!(
            "trade row has {} fields, expected at least 7",
            fields.len()
        )));
    }

    let ts: f64 = fields[0]
        .parse()
        .map_err(|_| ConnectorError::CorruptInput(format!("bad timestamp '{}'", fields[0])))?;
    let is_buy = fields[2].starts_with('B') || fields[2].starts_with('b');
    let size: f64 = fields[3]
        .parse()
        .map_err(|_| ConnectorError::CorruptInput(format!("bad size '{}'", fields[3])))?;
    let price: f64 = fields[4]
        .parse()
        .map_err(|_| ConnectorError::CorruptInput(format!("bad price '{}'", fields[4])))?;
    let trade_id = fields[6].to_string();

    Ok((
        ts,
        MarketPayload::Trade(Trade {
            is_buy,
            size,
            price,
            trade_id: trade_id.into(),
        }),
    ))
}

/// One OHLC CSV row: `start_timestamp,open,high,low,close,volume,turnover`.
/// Unlike the trade/orderbook formats, the distilled spec left the candle
/// row layout unspecified beyond "yields OHLC items"; this mirrors the
/// conventional Bybit kline export column order.
fn parse_ohlc_csv_line(line: &str) -> Result<Ohlc, ConnectorError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 5 {
        return Err(ConnectorError::CorruptInput(format!(
            "kline row has {} fields, expected at least 5",
            fields.len()
        )));
    }

    let parse = |idx: usize| -> Result<f64, ConnectorError> {
        fields[idx]
            .parse()
            .map_err(|_| ConnectorError::CorruptInput(format!("bad numeric field '{}'", fields[idx])))
    };

    Ok(Ohlc {
        start_timestamp: parse(0)?,
        open: parse(1)?,
        high: parse(2)?,
        low: parse(3)?,
        close: parse(4)?,
        volume: fields.get(5).and_then(|f| f.parse().ok()),
        turnover: fields.get(6).and_then(|f| f.parse().ok()),
    })
}

/// Bybit-flavored reference connector: bit-exact URL template, archive
/// handling, and CSV/NDJSON parsing (distilled spec §6.3).
pub struct BybitConnector {
    client: reqwest::Client,
    product_id: String,
}

impl BybitConnector {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            product_id: product_id.into(),
        }
    }

    async fn fetch_first_listed_file(&self, symbol: &str, day: NaiveDate) -> Result<(String, Vec<u8>), ConnectorError> {
        let url = build_download_list_url(&self.product_id, symbol, day, day);
        let response: ListFilesResponse = self.client.get(&url).send().await?.json().await?;
        let entry = response
            .result
            .list
            .first()
            .ok_or_else(|| ConnectorError::Transport(format!("no files listed for {symbol} on {day}")))?;

        let bytes = self.client.get(&entry.url).send().await?.bytes().await?;
        Ok((entry.file_name.clone(), bytes.to_vec()))
    }
}

#[async_trait]
impl Connector for BybitConnector {
    fn can_batch_download(&self, kind: DataType) -> bool {
        matches!(kind, DataType::Kline)
    }

    async fn get_day(
        &self,
        info: &EventInfo,
        day: NaiveDate,
    ) -> Result<Vec<MarketPayload>, ConnectorError> {
        debug!(symbol = %info.symbol, kind = ?info.kind, %day, "downloading a day of ticks from bybit");
        match info.kind {
            DataType::Trade => {
                let (filename, bytes) = self.fetch_first_listed_file(&info.symbol, day).await?;
                extract_lines(&filename, &bytes)?
                    .iter()
                    .map(|line| parse_trade_csv_line(line).map(|(_, payload)| payload))
                    .collect()
            }
            DataType::Orderbook => {
                let (filename, bytes) = self.fetch_first_listed_file(&info.symbol, day).await?;
                extract_lines(&filename, &bytes)?
                    .iter()
                    .map(|line| parse_orderbook_line(line).map(|(_, payload)| payload))
                    .collect()
            }
            other => Err(ConnectorError::NotImplemented("get_day", other)),
        }
    }

    async fn get_days(
        &self,
        info: &EventInfo,
        interval: Interval,
    ) -> Result<Vec<Ohlc>, ConnectorError> {
        let DataType::Kline = info.kind else {
            return Err(ConnectorError::NotImplemented("get_days", info.kind));
        };
        let period = info
            .period
            .ok_or_else(|| ConnectorError::Validation("KLINE EventInfo is missing a period".into()))?;
        convert_period(period)?;

        let start = chrono::DateTime::from_timestamp((interval.start / 1000.0) as i64, 0)
            .ok_or_else(|| ConnectorError::Validation("invalid interval start".into()))?
            .date_naive();
        let end = chrono::DateTime::from_timestamp((interval.end / 1000.0) as i64, 0)
            .ok_or_else(|| ConnectorError::Validation("invalid interval end".into()))?
            .date_naive();

        debug!(symbol = %info.symbol, %start, %end, "downloading a candle range from bybit");
        let url = build_download_list_url(&self.product_id, &info.symbol, start, end);
        let response: ListFilesResponse = self.client.get(&url).send().await?.json().await?;
        let entry = response
            .result
            .list
            .first()
            .ok_or_else(|| ConnectorError::Transport(format!("no kline files listed for {}", info.symbol)))?;

        let bytes = self.client.get(&entry.url).send().await?.bytes().await?;
        extract_lines(&entry.file_name, &bytes)?
            .iter()
            .map(|line| parse_ohlc_csv_line(line))
            .collect()
    }
}
