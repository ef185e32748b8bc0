//! Risk controller: per-tick exit rules for open positions, plus the initial
//! stop-loss placed on entry.
//!
//! Rule order within one evaluation, all against a single price sample:
//!
//! 1. oscillator-extreme exit (when configured)
//! 2. emergency PnL floor
//! 3. stop-loss
//! 4. break-even lock
//! 5. running-max update and trailing stop
//!
//! Which of 2-5 apply depends on the [`RiskProfile`].

use std::fmt;
use std::str::FromStr;

use super::candle::Candle;
use super::position::{ExitReason, Position, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskProfile {
    /// Exits only on an opposite signal.
    SignalOnly,
    /// Stop-loss and emergency floor.
    StopLoss,
    /// Stop-loss, emergency floor, break-even lock and trailing stop.
    Full,
}

impl RiskProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskProfile::SignalOnly => "signal_only",
            RiskProfile::StopLoss => "stop_loss",
            RiskProfile::Full => "full",
        }
    }

    fn uses_stops(&self) -> bool {
        !matches!(self, RiskProfile::SignalOnly)
    }
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "signal_only" => Ok(RiskProfile::SignalOnly),
            "stop_loss" => Ok(RiskProfile::StopLoss),
            "full" => Ok(RiskProfile::Full),
            other => Err(format!(
                "unknown risk profile '{other}' (expected signal_only, stop_loss or full)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskParams {
    pub profile: RiskProfile,
    pub max_stop_loss_pct: f64,
    pub fallback_stop_loss_pct: f64,
    pub stop_loss_lookback: usize,
    pub break_even_trigger_pct: f64,
    pub break_even_offset_pct: f64,
    pub trailing_activation_pct: f64,
    pub trailing_callback: f64,
    /// 0 disables the floor.
    pub emergency_stop_pct: f64,
    /// Upper oscillator bound for LONG exits; SHORT uses `100 - x`.
    pub oscillator_extreme: Option<f64>,
}

impl Default for RiskParams {
    fn default() -> Self {
        RiskParams {
            profile: RiskProfile::Full,
            max_stop_loss_pct: 1.5,
            fallback_stop_loss_pct: 1.2,
            stop_loss_lookback: 5,
            break_even_trigger_pct: 0.45,
            break_even_offset_pct: 0.02,
            trailing_activation_pct: 0.7,
            trailing_callback: 0.7,
            emergency_stop_pct: 2.0,
            oscillator_extreme: None,
        }
    }
}

/// Initial stop from the recent shadow: lowest low for LONG, highest high for
/// SHORT. Falls back to a fixed distance when the shadow is missing, on the
/// wrong side of entry, or further than `max_stop_loss_pct` away.
pub fn initial_stop_loss(side: Side, entry: f64, candles: &[Candle], params: &RiskParams) -> f64 {
    let lookback = params.stop_loss_lookback.min(candles.len());
    let recent = &candles[candles.len() - lookback..];

    let shadow = match side {
        Side::Long => recent.iter().map(|c| c.low).reduce(f64::min),
        Side::Short => recent.iter().map(|c| c.high).reduce(f64::max),
    };

    let usable = shadow.filter(|&stop| {
        let distance_pct = (entry - stop).abs() / entry * 100.0;
        let right_side = match side {
            Side::Long => stop < entry,
            Side::Short => stop > entry,
        };
        right_side && distance_pct <= params.max_stop_loss_pct
    });

    usable.unwrap_or_else(|| match side {
        Side::Long => entry * (1.0 - params.fallback_stop_loss_pct / 100.0),
        Side::Short => entry * (1.0 + params.fallback_stop_loss_pct / 100.0),
    })
}

/// What one evaluation did to a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskCheck {
    pub pnl_percent: f64,
    pub exit: Option<ExitReason>,
    pub break_even_armed: bool,
    pub trailing_armed: bool,
}

#[derive(Debug, Clone)]
pub struct RiskController {
    params: RiskParams,
}

impl RiskController {
    pub fn new(params: RiskParams) -> Self {
        RiskController { params }
    }

    pub fn params(&self) -> &RiskParams {
        &self.params
    }

    pub fn evaluate(
        &self,
        position: &mut Position,
        price: f64,
        oscillator: Option<f64>,
    ) -> RiskCheck {
        let p = &self.params;
        let pnl = position.pnl_percent(price);
        let mut check = RiskCheck {
            pnl_percent: pnl,
            exit: None,
            break_even_armed: false,
            trailing_armed: false,
        };

        if let (Some(extreme), Some(value)) = (p.oscillator_extreme, oscillator) {
            let hit = match position.side {
                Side::Long => value >= extreme,
                Side::Short => value <= 100.0 - extreme,
            };
            if hit {
                check.exit = Some(ExitReason::OscillatorExtreme);
                return check;
            }
        }

        if p.profile.uses_stops() {
            if p.emergency_stop_pct > 0.0 && pnl <= -p.emergency_stop_pct {
                check.exit = Some(ExitReason::Emergency);
                return check;
            }
            if position.stop_hit(price) {
                check.exit = Some(ExitReason::StopLoss);
                return check;
            }
        }

        let full = p.profile == RiskProfile::Full;

        if full && !position.break_even_activated && pnl >= p.break_even_trigger_pct {
            let offset = p.break_even_offset_pct / 100.0;
            let candidate = match position.side {
                Side::Long => position.entry_price * (1.0 + offset),
                Side::Short => position.entry_price * (1.0 - offset),
            };
            position.tighten_stop(candidate);
            position.break_even_activated = true;
            check.break_even_armed = true;
        }

        if pnl > position.running_max_pnl {
            position.running_max_pnl = pnl;
        }

        if full {
            if !position.trailing_activated
                && position.running_max_pnl >= p.trailing_activation_pct
            {
                position.trailing_activated = true;
                check.trailing_armed = true;
            }
            if position.trailing_activated {
                let level = position.running_max_pnl * p.trailing_callback;
                if level > position.trailing_stop_level {
                    position.trailing_stop_level = level;
                }
                if pnl <= position.trailing_stop_level {
                    check.exit = Some(ExitReason::Trailing);
                }
            }
        }

        check
    }
}
