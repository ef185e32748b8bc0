//! Owner of open positions; at most one per instrument.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::candle::{candles_between, BarInterval, Candle};
use super::position::{pnl_percent, ExitReason, OpenEvent, Position, Side, TradeRecord};
use super::zone::SignalEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    SameSide,
    MaxPositions { limit: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Opened(OpenEvent),
    Ignored(IgnoreReason),
    Flipped {
        closed: TradeRecord,
        opened: OpenEvent,
    },
}

#[derive(Debug, Clone)]
pub struct PositionManager {
    positions: BTreeMap<String, Position>,
    commission_pct: f64,
    max_open_positions: usize,
    interval: BarInterval,
}

impl PositionManager {
    /// `max_open_positions == 0` means no cap.
    pub fn new(commission_pct: f64, max_open_positions: usize, interval: BarInterval) -> Self {
        PositionManager {
            positions: BTreeMap::new(),
            commission_pct,
            max_open_positions,
            interval,
        }
    }

    pub fn position(&self, instrument: &str) -> Option<&Position> {
        self.positions.get(instrument)
    }

    pub fn has_position(&self, instrument: &str) -> bool {
        self.positions.contains_key(instrument)
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    pub fn instruments(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    /// Owned copies of every open position.
    pub fn snapshot(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }

    /// Runs `f` against the open position for `instrument`, if any.
    pub fn update<R>(&mut self, instrument: &str, f: impl FnOnce(&mut Position) -> R) -> Option<R> {
        self.positions.get_mut(instrument).map(f)
    }

    /// Applies a directional signal: open, ignore on same side, or flip.
    ///
    /// `candles` is the recent series for the instrument; on a flip the bars
    /// overlapping the closed position's hold window feed the best-case PnL.
    pub fn on_signal(
        &mut self,
        event: &SignalEvent,
        stop_loss: f64,
        candles: &[Candle],
    ) -> SignalOutcome {
        match self.positions.get(&event.instrument).map(|p| p.side) {
            Some(side) if side == event.direction => SignalOutcome::Ignored(IgnoreReason::SameSide),
            Some(_) => {
                let closed = self.close(
                    &event.instrument,
                    event.price,
                    event.timestamp,
                    ExitReason::Signal,
                    candles,
                );
                let opened = self.open(event, stop_loss);
                match (closed, opened) {
                    (Some(closed), Some(opened)) => SignalOutcome::Flipped { closed, opened },
                    (None, Some(opened)) => SignalOutcome::Opened(opened),
                    // open() only fails when a position is still present
                    (_, None) => SignalOutcome::Ignored(IgnoreReason::SameSide),
                }
            }
            None => {
                if self.max_open_positions > 0 && self.positions.len() >= self.max_open_positions {
                    return SignalOutcome::Ignored(IgnoreReason::MaxPositions {
                        limit: self.max_open_positions,
                    });
                }
                match self.open(event, stop_loss) {
                    Some(opened) => SignalOutcome::Opened(opened),
                    None => SignalOutcome::Ignored(IgnoreReason::SameSide),
                }
            }
        }
    }

    /// Unconditional close on a risk rule.
    pub fn on_risk_exit(
        &mut self,
        instrument: &str,
        price: f64,
        time: DateTime<Utc>,
        reason: ExitReason,
        candles: &[Candle],
    ) -> Option<TradeRecord> {
        self.close(instrument, price, time, reason, candles)
    }

    /// Closes and removes the position, returning its trade record.
    pub fn close(
        &mut self,
        instrument: &str,
        price: f64,
        time: DateTime<Utc>,
        reason: ExitReason,
        candles: &[Candle],
    ) -> Option<TradeRecord> {
        let position = self.positions.remove(instrument)?;

        let raw = position.pnl_percent(price);
        let net = raw - self.commission_pct;
        let window = candles_between(candles, position.entry_time, time, self.interval);
        let best = best_case_pnl(&position, &window)
            .unwrap_or(raw)
            .max(position.running_max_pnl)
            .max(raw);

        Some(TradeRecord {
            instrument: position.instrument.clone(),
            side: position.side,
            entry_price: position.entry_price,
            exit_price: price,
            entry_time: position.entry_time,
            exit_time: time,
            hold_minutes: position.hold_minutes(time),
            raw_pnl_percent: raw,
            net_pnl_percent: net,
            best_case_pnl_percent: best,
            exit_reason: reason,
        })
    }

    fn open(&mut self, event: &SignalEvent, stop_loss: f64) -> Option<OpenEvent> {
        if self.positions.contains_key(&event.instrument) {
            warn!(symbol = %event.instrument, "position already open, refusing second open");
            return None;
        }
        let position = Position::new(
            &event.instrument,
            event.direction,
            event.price,
            event.timestamp,
            stop_loss,
        );
        self.positions.insert(event.instrument.clone(), position);
        Some(OpenEvent {
            instrument: event.instrument.clone(),
            side: event.direction,
            entry_price: event.price,
            stop_loss,
            time: event.timestamp,
        })
    }
}

/// Max run-up (LONG) or run-down (SHORT) across the hold window.
fn best_case_pnl(position: &Position, window: &[Candle]) -> Option<f64> {
    let extreme = match position.side {
        Side::Long => window.iter().map(|c| c.high).reduce(f64::max)?,
        Side::Short => window.iter().map(|c| c.low).reduce(f64::min)?,
    };
    Some(pnl_percent(position.side, position.entry_price, extreme))
}
