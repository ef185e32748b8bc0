//! Notional positions and closed-trade records.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LONG" => Ok(Side::Long),
            "SHORT" => Ok(Side::Short),
            other => Err(format!("unknown side '{other}'")),
        }
    }
}

/// Percentage return of a position on `side` opened at `entry` and marked at `price`.
pub fn pnl_percent(side: Side, entry: f64, price: f64) -> f64 {
    match side {
        Side::Long => (price - entry) / entry * 100.0,
        Side::Short => (entry - price) / entry * 100.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub instrument: String,
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: f64,
    pub running_max_pnl: f64,
    pub break_even_activated: bool,
    pub trailing_activated: bool,
    pub trailing_stop_level: f64,
}

impl Position {
    pub fn new(
        instrument: &str,
        side: Side,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        stop_loss: f64,
    ) -> Self {
        Position {
            instrument: instrument.to_string(),
            side,
            entry_price,
            entry_time,
            stop_loss,
            running_max_pnl: 0.0,
            break_even_activated: false,
            trailing_activated: false,
            trailing_stop_level: 0.0,
        }
    }

    pub fn pnl_percent(&self, price: f64) -> f64 {
        pnl_percent(self.side, self.entry_price, price)
    }

    /// Whether `price` has crossed the stop against the position.
    pub fn stop_hit(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price <= self.stop_loss,
            Side::Short => price >= self.stop_loss,
        }
    }

    /// Moves the stop to `candidate` only if that reduces risk.
    /// Returns true when the stop moved.
    pub fn tighten_stop(&mut self, candidate: f64) -> bool {
        let tighter = match self.side {
            Side::Long => candidate > self.stop_loss,
            Side::Short => candidate < self.stop_loss,
        };
        if tighter {
            self.stop_loss = candidate;
        }
        tighter
    }

    pub fn hold_minutes(&self, now: DateTime<Utc>) -> f64 {
        (now - self.entry_time).num_milliseconds() as f64 / 60_000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Signal,
    StopLoss,
    Trailing,
    OscillatorExtreme,
    Emergency,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Signal => "signal",
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::Trailing => "TRAILING",
            ExitReason::OscillatorExtreme => "OSCILLATOR_EXTREME",
            ExitReason::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExitReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signal" => Ok(ExitReason::Signal),
            "STOP_LOSS" => Ok(ExitReason::StopLoss),
            "TRAILING" => Ok(ExitReason::Trailing),
            "OSCILLATOR_EXTREME" => Ok(ExitReason::OscillatorExtreme),
            "EMERGENCY" => Ok(ExitReason::Emergency),
            other => Err(format!("unknown exit reason '{other}'")),
        }
    }
}

/// Emitted when a position is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenEvent {
    pub instrument: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub time: DateTime<Utc>,
}

/// Immutable snapshot of a closed position.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub instrument: String,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub hold_minutes: f64,
    pub raw_pnl_percent: f64,
    pub net_pnl_percent: f64,
    pub best_case_pnl_percent: f64,
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    pub fn is_win(&self) -> bool {
        self.net_pnl_percent > 0.0
    }
}
