//! Indicator engine.
//!
//! Turns a candle series into one [`IndicatorReading`] per instrument per tick.
//! Readings are recomputed from scratch every tick; nothing here is stateful.
//! A series shorter than [`IndicatorKind::min_samples`] yields `None`, which the
//! engine treats as "no indicator yet" rather than an error.

pub mod atr;
pub mod ema;
pub mod rsi;

use crate::domain::candle::Candle;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    DualEma { fast: usize, slow: usize },
    Oscillator { period: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorState {
    DualEma { fast: f64, slow: f64 },
    Oscillator { value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorReading {
    pub state: IndicatorState,
    pub last_close: f64,
}

impl IndicatorKind {
    /// Shortest series that produces a reading.
    pub fn min_samples(&self) -> usize {
        match *self {
            IndicatorKind::DualEma { fast, slow } => fast.max(slow).max(1),
            IndicatorKind::Oscillator { period } => period + 1,
        }
    }

    pub fn compute(&self, candles: &[Candle]) -> Option<IndicatorReading> {
        if candles.len() < self.min_samples() {
            return None;
        }
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let last_close = *closes.last()?;

        let state = match *self {
            IndicatorKind::DualEma { fast, slow } => IndicatorState::DualEma {
                fast: ema::last_ema(&closes, fast)?,
                slow: ema::last_ema(&closes, slow)?,
            },
            IndicatorKind::Oscillator { period } => IndicatorState::Oscillator {
                value: rsi::last_rsi(&closes, period)?,
            },
        };

        Some(IndicatorReading { state, last_close })
    }
}

impl IndicatorState {
    pub fn oscillator(&self) -> Option<f64> {
        match *self {
            IndicatorState::Oscillator { value } => Some(value),
            IndicatorState::DualEma { .. } => None,
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::DualEma { fast, slow } => write!(f, "EMA({},{})", fast, slow),
            IndicatorKind::Oscillator { period } => write!(f, "RSI({})", period),
        }
    }
}

impl fmt::Display for IndicatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorState::DualEma { fast, slow } => {
                write!(f, "fast={:.4} slow={:.4} diff={:+.4}", fast, slow, fast - slow)
            }
            IndicatorState::Oscillator { value } => write!(f, "rsi={:.2}", value),
        }
    }
}
