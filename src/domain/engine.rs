//! The evaluation service: one risk pass and one signal pass per tick.
//!
//! Each instrument is evaluated independently. Any failure for one instrument
//! becomes a [`SkipReason`] in the [`TickReport`] and never aborts the tick, so
//! `tick` itself is infallible.

use std::fmt;
use std::thread;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::domain::candle::Candle;
use crate::domain::entry_filter::EntryFilter;
use crate::domain::error::ZonewatchError;
use crate::domain::position::{OpenEvent, Position, TradeRecord};
use crate::domain::position_manager::{PositionManager, SignalOutcome};
use crate::domain::risk::{initial_stop_loss, RiskController};
use crate::domain::settings::EngineSettings;
use crate::domain::zone::{SignalDecision, SignalEvent, Zone, ZoneDetector};
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::notifier_port::NotifierPort;
use crate::ports::trade_recorder_port::TradeRecorderPort;

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MarketData(String),
    PriceUnavailable(String),
    InsufficientHistory { have: usize, need: usize },
    Persistence(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MarketData(reason) => write!(f, "market data: {reason}"),
            SkipReason::PriceUnavailable(reason) => write!(f, "price unavailable: {reason}"),
            SkipReason::InsufficientHistory { have, need } => {
                write!(f, "insufficient history ({have}/{need} candles)")
            }
            SkipReason::Persistence(reason) => write!(f, "persistence: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentOutcome {
    Evaluated,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedInstrument {
    pub instrument: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub at: DateTime<Utc>,
    pub signals: Vec<SignalEvent>,
    pub opened: Vec<OpenEvent>,
    pub closed: Vec<TradeRecord>,
    pub skipped: Vec<SkippedInstrument>,
    pub suppressed: usize,
    pub filtered: usize,
    pub persistence_failures: usize,
}

impl TickReport {
    fn new(at: DateTime<Utc>) -> Self {
        TickReport {
            at,
            signals: Vec::new(),
            opened: Vec::new(),
            closed: Vec::new(),
            skipped: Vec::new(),
            suppressed: 0,
            filtered: 0,
            persistence_failures: 0,
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.signals.is_empty() && self.opened.is_empty() && self.closed.is_empty()
    }
}

/// Owned copy of the engine's mutable state.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub positions: Vec<Position>,
    pub zones: Vec<(String, Zone)>,
}

pub struct Engine<'a> {
    settings: EngineSettings,
    market: &'a dyn MarketDataPort,
    recorder: &'a dyn TradeRecorderPort,
    notifier: &'a dyn NotifierPort,
    detector: ZoneDetector,
    positions: PositionManager,
    risk: RiskController,
    filter: EntryFilter,
}

impl<'a> Engine<'a> {
    pub fn new(
        settings: EngineSettings,
        market: &'a dyn MarketDataPort,
        recorder: &'a dyn TradeRecorderPort,
        notifier: &'a dyn NotifierPort,
    ) -> Self {
        let detector = ZoneDetector::new(settings.zone_rule, settings.dedup_window);
        let positions = PositionManager::new(
            settings.commission_pct,
            settings.max_open_positions,
            settings.interval,
        );
        let risk = RiskController::new(settings.risk.clone());
        let filter = EntryFilter::new(settings.filters);

        Engine {
            settings,
            market,
            recorder,
            notifier,
            detector,
            positions,
            risk,
            filter,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Loads the persisted zone of every watched instrument. Returns how many
    /// were restored; the rest will prime on their first reading.
    pub fn restore_zones(&mut self) -> Result<usize, ZonewatchError> {
        let mut restored = 0;
        for instrument in &self.settings.symbols {
            match self.recorder.load_zone(instrument)? {
                Some(zone) if self.detector.restore(instrument, zone) => {
                    debug!(symbol = %instrument, zone = %zone, "zone restored");
                    restored += 1;
                }
                Some(zone) => {
                    warn!(
                        symbol = %instrument,
                        zone = %zone,
                        "stored zone does not match configured indicator, will re-prime"
                    );
                }
                None => {}
            }
        }
        info!(restored, watched = self.settings.symbols.len(), "zones loaded");
        Ok(restored)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            positions: self.positions.snapshot(),
            zones: self.detector.zones(),
        }
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::new(now);
        self.risk_pass(now, &mut report);

        let symbols = self.settings.symbols.clone();
        for instrument in &symbols {
            if let InstrumentOutcome::Skipped(reason) =
                self.evaluate_instrument(instrument, now, &mut report)
            {
                log_skip(instrument, &reason);
                report.skipped.push(SkippedInstrument {
                    instrument: instrument.clone(),
                    reason,
                });
            }
        }

        if !report.is_quiet() {
            info!(
                signals = report.signals.len(),
                opened = report.opened.len(),
                closed = report.closed.len(),
                skipped = report.skipped.len(),
                open_positions = self.positions.open_count(),
                "tick complete"
            );
        }
        report
    }

    fn risk_pass(&mut self, now: DateTime<Utc>, report: &mut TickReport) {
        for instrument in self.positions.instruments() {
            let price = match self.market.get_last_price(&instrument) {
                Ok(price) => price,
                Err(e) => {
                    let reason = SkipReason::PriceUnavailable(e.to_string());
                    log_skip(&instrument, &reason);
                    report.skipped.push(SkippedInstrument { instrument, reason });
                    continue;
                }
            };

            let mut candles = None;
            let oscillator = if self.risk.params().oscillator_extreme.is_some() {
                match self.fetch_candles(&instrument) {
                    Ok(series) => {
                        let value = self
                            .settings
                            .indicator
                            .compute(&series)
                            .and_then(|r| r.state.oscillator());
                        candles = Some(series);
                        value
                    }
                    Err(e) => {
                        warn!(symbol = %instrument, error = %e, "no oscillator for risk pass");
                        None
                    }
                }
            } else {
                None
            };

            let risk = &self.risk;
            let Some(check) = self
                .positions
                .update(&instrument, |p| risk.evaluate(p, price, oscillator))
            else {
                continue;
            };

            if check.break_even_armed {
                info!(symbol = %instrument, pnl = check.pnl_percent, "break-even armed");
            }
            if check.trailing_armed {
                info!(symbol = %instrument, pnl = check.pnl_percent, "trailing stop armed");
            }

            if let Some(reason) = check.exit {
                let have = candles.unwrap_or_default();
                let hold = self.hold_candles(&instrument, now, have);
                if let Some(trade) =
                    self.positions
                        .on_risk_exit(&instrument, price, now, reason, &hold)
                {
                    self.record_close(trade, report);
                }
            }
        }
    }

    fn evaluate_instrument(
        &mut self,
        instrument: &str,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> InstrumentOutcome {
        let candles = match self.fetch_candles(instrument) {
            Ok(c) => c,
            Err(e) => return InstrumentOutcome::Skipped(SkipReason::MarketData(e.to_string())),
        };

        let Some(reading) = self.settings.indicator.compute(&candles) else {
            return InstrumentOutcome::Skipped(SkipReason::InsufficientHistory {
                have: candles.len(),
                need: self.settings.indicator.min_samples(),
            });
        };

        let price = match self.market.get_last_price(instrument) {
            Ok(p) => p,
            Err(e) => {
                return InstrumentOutcome::Skipped(SkipReason::PriceUnavailable(e.to_string()));
            }
        };

        let Some(transition) = self.detector.evaluate(instrument, &reading.state, price, now)
        else {
            return InstrumentOutcome::Evaluated;
        };

        if transition.changed() {
            let saved = self.persist("zone", instrument, || {
                self.recorder.save_zone(instrument, transition.zone, now)
            });
            if let Err(e) = saved {
                report.persistence_failures += 1;
                error!(
                    symbol = %instrument,
                    zone = %transition.zone,
                    error = %e,
                    "zone write failed, transition deferred to next tick"
                );
                return InstrumentOutcome::Skipped(SkipReason::Persistence(e.to_string()));
            }
            match transition.previous {
                None => info!(
                    symbol = %instrument,
                    zone = %transition.zone,
                    state = %reading.state,
                    "zone primed"
                ),
                Some(from) => info!(
                    symbol = %instrument,
                    from = %from,
                    to = %transition.zone,
                    state = %reading.state,
                    "zone changed"
                ),
            }
        }

        let confirmed = match transition.candidate {
            Some(side) if self.filter.is_enabled() => match self.filter.confirm(side, &candles) {
                Ok(()) => true,
                Err(rejection) => {
                    info!(symbol = %instrument, side = %side, %rejection, "signal filtered");
                    false
                }
            },
            _ => true,
        };

        match self.detector.commit(&transition, confirmed) {
            SignalDecision::NoSignal => {}
            SignalDecision::Unconfirmed(_) => report.filtered += 1,
            SignalDecision::Suppressed(side) => {
                report.suppressed += 1;
                info!(symbol = %instrument, side = %side, "duplicate signal suppressed");
            }
            SignalDecision::Emitted(event) => {
                info!(symbol = %instrument, side = %event.direction, price = event.price, "signal");
                self.apply_signal(&event, candles, report);
                report.signals.push(event);
            }
        }

        InstrumentOutcome::Evaluated
    }

    fn apply_signal(&mut self, event: &SignalEvent, candles: Vec<Candle>, report: &mut TickReport) {
        let stop = initial_stop_loss(event.direction, event.price, &candles, self.risk.params());
        let candles = if self.positions.has_position(&event.instrument) {
            self.hold_candles(&event.instrument, event.timestamp, candles)
        } else {
            candles
        };

        match self.positions.on_signal(event, stop, &candles) {
            SignalOutcome::Opened(open) => self.record_open(open, report),
            SignalOutcome::Flipped { closed, opened } => {
                self.record_close(closed, report);
                self.record_open(opened, report);
            }
            SignalOutcome::Ignored(reason) => {
                info!(symbol = %event.instrument, side = %event.direction, ?reason, "signal ignored");
            }
        }
    }

    fn fetch_candles(&self, instrument: &str) -> Result<Vec<Candle>, ZonewatchError> {
        self.market
            .get_candles(instrument, self.settings.interval, self.settings.history_len())
    }

    /// Candles long enough to span the open position's hold window, reusing
    /// `have` when it already does.
    fn hold_candles(&self, instrument: &str, now: DateTime<Utc>, have: Vec<Candle>) -> Vec<Candle> {
        let Some(position) = self.positions.position(instrument) else {
            return have;
        };
        let need = self.settings.interval.bars_covering(now - position.entry_time);
        let covered = have
            .first()
            .is_some_and(|c| c.open_time <= position.entry_time);
        if covered {
            return have;
        }
        match self
            .market
            .get_candles(instrument, self.settings.interval, need)
        {
            Ok(candles) => candles,
            Err(e) => {
                warn!(symbol = %instrument, error = %e, "hold window candles unavailable");
                have
            }
        }
    }

    fn record_open(&self, open: OpenEvent, report: &mut TickReport) {
        info!(
            symbol = %open.instrument,
            side = %open.side,
            entry = open.entry_price,
            stop = open.stop_loss,
            "position opened"
        );
        if let Err(e) = self.notifier.notify_open(&open) {
            warn!(symbol = %open.instrument, error = %e, "open notification failed");
        }
        report.opened.push(open);
    }

    fn record_close(&self, trade: TradeRecord, report: &mut TickReport) {
        info!(
            symbol = %trade.instrument,
            side = %trade.side,
            reason = %trade.exit_reason,
            raw_pnl = trade.raw_pnl_percent,
            net_pnl = trade.net_pnl_percent,
            "position closed"
        );
        if let Err(e) = self.persist("trade", &trade.instrument, || self.recorder.save_trade(&trade)) {
            report.persistence_failures += 1;
            error!(symbol = %trade.instrument, error = %e, trade = ?trade, "trade write failed");
        }
        if let Err(e) = self.notifier.notify_close(&trade) {
            warn!(symbol = %trade.instrument, error = %e, "close notification failed");
        }
        report.closed.push(trade);
    }

    /// Retries a store write with a fixed backoff. Only persistence errors are
    /// retried.
    fn persist(
        &self,
        what: &str,
        instrument: &str,
        mut write: impl FnMut() -> Result<(), ZonewatchError>,
    ) -> Result<(), ZonewatchError> {
        let attempts = self.settings.persist.attempts.max(1);
        let mut attempt = 1;
        loop {
            match write() {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts && e.is_persistence() => {
                    warn!(symbol = %instrument, what, attempt, error = %e, "write failed, retrying");
                    thread::sleep(self.settings.persist.backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn log_skip(instrument: &str, reason: &SkipReason) {
    match reason {
        SkipReason::InsufficientHistory { .. } => {
            debug!(symbol = %instrument, %reason, "no indicator yet")
        }
        _ => warn!(symbol = %instrument, %reason, "instrument skipped"),
    }
}
