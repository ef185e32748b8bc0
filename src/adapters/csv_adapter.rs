//! CSV replay candle source.
//!
//! Loads one `<SYMBOL>.csv` per instrument (`timestamp,open,high,low,close,volume`)
//! and replays the merged timeline one bar per tick. The adapter doubles as the
//! clock: "now" is the close time of the newest visible bar.

use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::candle::{BarInterval, Candle};
use crate::domain::error::ZonewatchError;
use crate::ports::clock_port::ClockPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvReplayAdapter {
    series: HashMap<String, Vec<Candle>>,
    timeline: Vec<DateTime<Utc>>,
    cursor: Cell<usize>,
    interval: BarInterval,
}

impl CsvReplayAdapter {
    /// Reads `[market] data_dir` and `warmup_bars` (defaults to `candle_count`).
    pub fn from_config(
        config: &dyn ConfigPort,
        symbols: &[String],
        interval: BarInterval,
    ) -> Result<Self, ZonewatchError> {
        let dir = config.require_string("market", "data_dir")?;
        let candle_count = config.get_int("market", "candle_count", 500);
        let warmup = config.get_int("market", "warmup_bars", candle_count).max(1) as usize;

        Self::load(Path::new(&dir), symbols, interval, warmup)
    }

    pub fn load(
        dir: &Path,
        symbols: &[String],
        interval: BarInterval,
        warmup_bars: usize,
    ) -> Result<Self, ZonewatchError> {
        let mut series = HashMap::new();
        for symbol in symbols {
            let path = csv_path(dir, symbol);
            if !path.exists() {
                warn!(symbol = %symbol, path = %path.display(), "no replay file, instrument will be skipped");
                continue;
            }
            let candles = read_candles(&path, symbol)?;
            info!(symbol = %symbol, bars = candles.len(), "replay series loaded");
            series.insert(symbol.clone(), candles);
        }
        Ok(Self::from_series(series, interval, warmup_bars))
    }

    pub fn from_series(
        mut series: HashMap<String, Vec<Candle>>,
        interval: BarInterval,
        warmup_bars: usize,
    ) -> Self {
        let mut times = BTreeSet::new();
        for candles in series.values_mut() {
            candles.sort_by_key(|c| c.open_time);
            times.extend(candles.iter().map(|c| c.open_time));
        }
        let timeline: Vec<_> = times.into_iter().collect();
        let start = warmup_bars
            .saturating_sub(1)
            .min(timeline.len().saturating_sub(1));

        CsvReplayAdapter {
            series,
            timeline,
            cursor: Cell::new(start),
            interval,
        }
    }

    /// Moves to the next bar. Returns false once the timeline is exhausted.
    pub fn advance(&self) -> bool {
        let next = self.cursor.get() + 1;
        if next >= self.timeline.len() {
            return false;
        }
        self.cursor.set(next);
        true
    }

    /// Bars left to replay after the current one.
    pub fn remaining(&self) -> usize {
        self.timeline.len().saturating_sub(self.cursor.get() + 1)
    }

    fn current_open(&self) -> Option<DateTime<Utc>> {
        self.timeline.get(self.cursor.get()).copied()
    }

    fn visible(&self, instrument: &str) -> Result<&[Candle], ZonewatchError> {
        let candles = self
            .series
            .get(instrument)
            .ok_or_else(|| ZonewatchError::MarketData {
                instrument: instrument.to_string(),
                reason: "no replay data".into(),
            })?;
        let Some(cutoff) = self.current_open() else {
            return Ok(&[]);
        };
        let end = candles.partition_point(|c| c.open_time <= cutoff);
        Ok(&candles[..end])
    }
}

impl MarketDataPort for CsvReplayAdapter {
    fn get_candles(
        &self,
        instrument: &str,
        interval: BarInterval,
        count: usize,
    ) -> Result<Vec<Candle>, ZonewatchError> {
        if interval != self.interval {
            return Err(ZonewatchError::MarketData {
                instrument: instrument.to_string(),
                reason: format!("replay data is {}, requested {}", self.interval, interval),
            });
        }
        let visible = self.visible(instrument)?;
        let start = visible.len().saturating_sub(count);
        Ok(visible[start..].to_vec())
    }

    fn get_last_price(&self, instrument: &str) -> Result<f64, ZonewatchError> {
        self.visible(instrument)?
            .last()
            .map(|c| c.close)
            .ok_or_else(|| ZonewatchError::PriceUnavailable {
                instrument: instrument.to_string(),
                reason: "no bar yet".into(),
            })
    }
}

impl ClockPort for CsvReplayAdapter {
    fn now(&self) -> DateTime<Utc> {
        self.current_open()
            .map(|t| t + self.interval.duration())
            .unwrap_or_default()
    }
}

fn csv_path(dir: &Path, symbol: &str) -> PathBuf {
    dir.join(format!("{}.csv", symbol))
}

fn read_candles(path: &Path, symbol: &str) -> Result<Vec<Candle>, ZonewatchError> {
    let data_err = |reason: String| ZonewatchError::MarketData {
        instrument: symbol.to_string(),
        reason,
    };

    let content = fs::read_to_string(path)
        .map_err(|e| data_err(format!("failed to read {}: {}", path.display(), e)))?;
    let mut rdr = csv::Reader::from_reader(content.as_bytes());

    let mut candles = Vec::new();
    for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = result.map_err(|e| data_err(format!("CSV parse error: {}", e)))?;
        let open_time = parse_timestamp(&row.timestamp).ok_or_else(|| {
            data_err(format!(
                "invalid timestamp '{}' on row {}",
                row.timestamp,
                line + 1
            ))
        })?;
        candles.push(Candle {
            open_time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(candles)
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or epoch seconds/milliseconds.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    let epoch: i64 = s.parse().ok()?;
    if epoch.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
    }
}
