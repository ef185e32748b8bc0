#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::time::Duration as StdDuration;
use zonewatch::domain::candle::{BarInterval, Candle};
use zonewatch::domain::error::ZonewatchError;
use zonewatch::domain::indicator::IndicatorKind;
use zonewatch::domain::position::{OpenEvent, TradeRecord};
use zonewatch::domain::risk::RiskProfile;
use zonewatch::domain::settings::{EngineSettings, PersistPolicy};
use zonewatch::domain::zone::{Zone, ZoneRule};
use zonewatch::ports::market_data_port::MarketDataPort;
use zonewatch::ports::notifier_port::NotifierPort;
use zonewatch::ports::trade_recorder_port::TradeRecorderPort;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

/// Tick times start an hour after the first bar.
pub fn at(secs: i64) -> DateTime<Utc> {
    base_time() + Duration::hours(1) + Duration::seconds(secs)
}

/// Flat 5-minute bars (open = high = low = close).
pub fn flat_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            open_time: base_time() + Duration::minutes(5 * i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100.0,
        })
        .collect()
}

/// fast = last close, slow = 2-period EMA: a rising pair reads ABOVE,
/// a falling pair reads BELOW.
pub fn crossover_settings(symbols: &[&str]) -> EngineSettings {
    let mut settings = EngineSettings {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        interval: BarInterval::minutes(5),
        candle_count: 10,
        indicator: IndicatorKind::DualEma { fast: 1, slow: 2 },
        zone_rule: ZoneRule::Crossover,
        dedup_window: Duration::seconds(30),
        persist: PersistPolicy {
            attempts: 3,
            backoff: StdDuration::ZERO,
        },
        ..EngineSettings::default()
    };
    settings.risk.profile = RiskProfile::SignalOnly;
    settings
}

pub fn oscillator_settings(symbols: &[&str]) -> EngineSettings {
    let mut settings = crossover_settings(symbols);
    settings.indicator = IndicatorKind::Oscillator { period: 2 };
    settings.zone_rule = ZoneRule::Oscillator {
        oversold: 30.0,
        overbought: 70.0,
        hysteresis: 0.5,
    };
    settings
}

#[derive(Default)]
pub struct ScriptedMarket {
    candles: RefCell<HashMap<String, Vec<Candle>>>,
    prices: RefCell<HashMap<String, f64>>,
    failing_candles: RefCell<HashSet<String>>,
    failing_prices: RefCell<HashSet<String>>,
}

impl ScriptedMarket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the series; the last price follows its close unless pinned.
    pub fn set_closes(&self, symbol: &str, closes: &[f64]) {
        self.candles
            .borrow_mut()
            .insert(symbol.to_string(), flat_candles(closes));
        self.prices.borrow_mut().remove(symbol);
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices.borrow_mut().insert(symbol.to_string(), price);
    }

    pub fn fail_candles(&self, symbol: &str, failing: bool) {
        let mut set = self.failing_candles.borrow_mut();
        if failing {
            set.insert(symbol.to_string());
        } else {
            set.remove(symbol);
        }
    }

    pub fn fail_price(&self, symbol: &str, failing: bool) {
        let mut set = self.failing_prices.borrow_mut();
        if failing {
            set.insert(symbol.to_string());
        } else {
            set.remove(symbol);
        }
    }
}

impl MarketDataPort for ScriptedMarket {
    fn get_candles(
        &self,
        instrument: &str,
        _interval: BarInterval,
        count: usize,
    ) -> Result<Vec<Candle>, ZonewatchError> {
        if self.failing_candles.borrow().contains(instrument) {
            return Err(ZonewatchError::MarketData {
                instrument: instrument.to_string(),
                reason: "feed down".into(),
            });
        }
        let candles = self.candles.borrow();
        let series = candles.get(instrument).map(Vec::as_slice).unwrap_or(&[]);
        let start = series.len().saturating_sub(count);
        Ok(series[start..].to_vec())
    }

    fn get_last_price(&self, instrument: &str) -> Result<f64, ZonewatchError> {
        let unavailable = || ZonewatchError::PriceUnavailable {
            instrument: instrument.to_string(),
            reason: "no quote".into(),
        };
        if self.failing_prices.borrow().contains(instrument) {
            return Err(unavailable());
        }
        if let Some(&price) = self.prices.borrow().get(instrument) {
            return Ok(price);
        }
        self.candles
            .borrow()
            .get(instrument)
            .and_then(|c| c.last())
            .map(|c| c.close)
            .ok_or_else(unavailable)
    }
}

#[derive(Default)]
pub struct MemoryRecorder {
    pub zones: RefCell<HashMap<String, Zone>>,
    pub zone_writes: RefCell<Vec<(String, Zone)>>,
    pub trades: RefCell<Vec<TradeRecord>>,
    pub failing_zone_writes: Cell<u32>,
    pub failing_trade_writes: Cell<u32>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(self, symbol: &str, zone: Zone) -> Self {
        self.zones.borrow_mut().insert(symbol.to_string(), zone);
        self
    }

    /// The next `n` zone writes fail.
    pub fn fail_zone_writes(&self, n: u32) {
        self.failing_zone_writes.set(n);
    }

    pub fn fail_trade_writes(&self, n: u32) {
        self.failing_trade_writes.set(n);
    }

    pub fn zone(&self, symbol: &str) -> Option<Zone> {
        self.zones.borrow().get(symbol).copied()
    }

    fn take_failure(counter: &Cell<u32>) -> bool {
        let left = counter.get();
        if left > 0 {
            counter.set(left - 1);
            true
        } else {
            false
        }
    }
}

impl TradeRecorderPort for MemoryRecorder {
    fn load_zone(&self, instrument: &str) -> Result<Option<Zone>, ZonewatchError> {
        Ok(self.zone(instrument))
    }

    fn save_zone(
        &self,
        instrument: &str,
        zone: Zone,
        _at: DateTime<Utc>,
    ) -> Result<(), ZonewatchError> {
        if Self::take_failure(&self.failing_zone_writes) {
            return Err(ZonewatchError::Database {
                reason: "database is locked".into(),
            });
        }
        self.zones.borrow_mut().insert(instrument.to_string(), zone);
        self.zone_writes
            .borrow_mut()
            .push((instrument.to_string(), zone));
        Ok(())
    }

    fn save_trade(&self, trade: &TradeRecord) -> Result<(), ZonewatchError> {
        if Self::take_failure(&self.failing_trade_writes) {
            return Err(ZonewatchError::Database {
                reason: "disk I/O error".into(),
            });
        }
        self.trades.borrow_mut().push(trade.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub opens: RefCell<Vec<OpenEvent>>,
    pub closes: RefCell<Vec<TradeRecord>>,
    pub failing: Cell<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotifierPort for RecordingNotifier {
    fn notify_open(&self, event: &OpenEvent) -> Result<(), ZonewatchError> {
        if self.failing.get() {
            return Err(ZonewatchError::Notify {
                reason: "webhook timeout".into(),
            });
        }
        self.opens.borrow_mut().push(event.clone());
        Ok(())
    }

    fn notify_close(&self, trade: &TradeRecord) -> Result<(), ZonewatchError> {
        if self.failing.get() {
            return Err(ZonewatchError::Notify {
                reason: "webhook timeout".into(),
            });
        }
        self.closes.borrow_mut().push(trade.clone());
        Ok(())
    }
}
