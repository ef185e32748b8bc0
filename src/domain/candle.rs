//! OHLCV candle representation and bar intervals.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }
}

/// Fixed bar interval such as `5m` or `1h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarInterval(Duration);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid bar interval '{0}' (expected e.g. 1m, 5m, 1h, 1d)")]
pub struct BarIntervalError(pub String);

impl BarInterval {
    pub fn minutes(n: i64) -> Self {
        BarInterval(Duration::minutes(n))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    /// Number of whole bars needed to cover `span`, plus the bar in progress.
    pub fn bars_covering(&self, span: Duration) -> usize {
        let bar_secs = self.0.num_seconds().max(1);
        let span_secs = span.num_seconds().max(0);
        (span_secs / bar_secs) as usize + 2
    }
}

impl FromStr for BarInterval {
    type Err = BarIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || BarIntervalError(s.to_string());
        let unit_at = match s.char_indices().last() {
            Some((i, _)) if i > 0 => i,
            _ => return Err(err()),
        };
        let (num, unit) = s.split_at(unit_at);
        let n: i64 = num.parse().map_err(|_| err())?;
        if n <= 0 {
            return Err(err());
        }
        let duration = match unit {
            "m" => Duration::minutes(n),
            "h" => Duration::hours(n),
            "d" => Duration::days(n),
            _ => return Err(err()),
        };
        Ok(BarInterval(duration))
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mins = self.0.num_minutes();
        if mins % 1440 == 0 {
            write!(f, "{}d", mins / 1440)
        } else if mins % 60 == 0 {
            write!(f, "{}h", mins / 60)
        } else {
            write!(f, "{}m", mins)
        }
    }
}

/// Candles whose bar overlaps the closed interval `[from, to]`.
pub fn candles_between(
    candles: &[Candle],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    interval: BarInterval,
) -> Vec<Candle> {
    candles
        .iter()
        .filter(|c| c.open_time + interval.duration() > from && c.open_time <= to)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    fn sample_candle() -> Candle {
        Candle {
            open_time: at(0),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn true_range_hl_dominates() {
        let c = sample_candle();
        assert!((c.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let c = sample_candle();
        // |110 - 70| = 40
        assert!((c.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn direction_and_body() {
        let c = sample_candle();
        assert!(c.is_bullish());
        assert!(!c.is_bearish());
        assert!((c.body() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn interval_parse_and_display() {
        assert_eq!("5m".parse::<BarInterval>().unwrap(), BarInterval::minutes(5));
        assert_eq!("1h".parse::<BarInterval>().unwrap().duration(), Duration::hours(1));
        assert_eq!("4h".parse::<BarInterval>().unwrap().to_string(), "4h");
        assert_eq!("1d".parse::<BarInterval>().unwrap().to_string(), "1d");
        assert_eq!(BarInterval::minutes(15).to_string(), "15m");
    }

    #[test]
    fn interval_rejects_garbage() {
        assert!("".parse::<BarInterval>().is_err());
        assert!("m".parse::<BarInterval>().is_err());
        assert!("0m".parse::<BarInterval>().is_err());
        assert!("5x".parse::<BarInterval>().is_err());
        assert!("-5m".parse::<BarInterval>().is_err());
    }

    #[test]
    fn bars_covering_includes_partial_bars() {
        let interval = BarInterval::minutes(5);
        assert_eq!(interval.bars_covering(Duration::zero()), 2);
        assert_eq!(interval.bars_covering(Duration::minutes(12)), 4);
    }

    #[test]
    fn candles_between_keeps_overlapping_bars() {
        let interval = BarInterval::minutes(5);
        let candles: Vec<Candle> = [0, 5, 10, 15, 20]
            .iter()
            .map(|&m| Candle {
                open_time: at(m),
                ..sample_candle()
            })
            .collect();

        // Entry at 12:07 sits inside the 12:05 bar; exit at 12:15 opens the 12:15 bar.
        let window = candles_between(&candles, at(7), at(15), interval);
        let opens: Vec<_> = window.iter().map(|c| c.open_time).collect();
        assert_eq!(opens, vec![at(5), at(10), at(15)]);
    }
}
