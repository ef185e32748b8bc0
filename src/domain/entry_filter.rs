//! Optional confirmation of candidate signals against the latest bar.
//!
//! Checks run in a fixed order and stop at the first rejection: trend EMA,
//! candle colour, volume surge, then body size against ATR.

use crate::domain::candle::Candle;
use crate::domain::indicator::{atr, ema};
use crate::domain::position::Side;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryFilterParams {
    pub enabled: bool,
    pub trend_ema_period: usize,
    pub require_candle_direction: bool,
    pub volume_multiplier: f64,
    pub volume_lookback: usize,
    pub min_body_atr: f64,
    pub atr_period: usize,
}

impl Default for EntryFilterParams {
    fn default() -> Self {
        EntryFilterParams {
            enabled: false,
            trend_ema_period: 200,
            require_candle_direction: true,
            volume_multiplier: 1.15,
            volume_lookback: 20,
            min_body_atr: 0.4,
            atr_period: 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterRejection {
    InsufficientHistory { have: usize, need: usize },
    AgainstTrend { close: f64, trend: f64 },
    CandleDirection,
    LowVolume { volume: f64, average: f64 },
    SmallBody { body: f64, atr: f64 },
}

impl fmt::Display for FilterRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterRejection::InsufficientHistory { have, need } => {
                write!(f, "insufficient history ({have}/{need} bars)")
            }
            FilterRejection::AgainstTrend { close, trend } => {
                write!(f, "close {close:.4} on wrong side of trend EMA {trend:.4}")
            }
            FilterRejection::CandleDirection => write!(f, "candle colour against direction"),
            FilterRejection::LowVolume { volume, average } => {
                write!(f, "volume {volume:.2} below threshold (avg {average:.2})")
            }
            FilterRejection::SmallBody { body, atr } => {
                write!(f, "body {body:.4} too small for ATR {atr:.4}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntryFilter {
    params: EntryFilterParams,
}

impl EntryFilter {
    pub fn new(params: EntryFilterParams) -> Self {
        EntryFilter { params }
    }

    pub fn is_enabled(&self) -> bool {
        self.params.enabled
    }

    /// Bars needed before any confirmation can pass.
    pub fn min_samples(&self) -> usize {
        let p = &self.params;
        p.trend_ema_period
            .max(p.volume_lookback + 1)
            .max(p.atr_period + 1)
    }

    pub fn confirm(&self, side: Side, candles: &[Candle]) -> Result<(), FilterRejection> {
        if !self.params.enabled {
            return Ok(());
        }
        let need = self.min_samples();
        let Some(last) = candles.last().filter(|_| candles.len() >= need) else {
            return Err(FilterRejection::InsufficientHistory {
                have: candles.len(),
                need,
            });
        };

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        if let Some(trend) = ema::last_ema(&closes, self.params.trend_ema_period) {
            let with_trend = match side {
                Side::Long => last.close > trend,
                Side::Short => last.close < trend,
            };
            if !with_trend {
                return Err(FilterRejection::AgainstTrend {
                    close: last.close,
                    trend,
                });
            }
        }

        if self.params.require_candle_direction {
            let coloured = match side {
                Side::Long => last.is_bullish(),
                Side::Short => last.is_bearish(),
            };
            if !coloured {
                return Err(FilterRejection::CandleDirection);
            }
        }

        let lookback = self.params.volume_lookback;
        if lookback > 0 {
            let prior = &candles[candles.len() - 1 - lookback..candles.len() - 1];
            let average = prior.iter().map(|c| c.volume).sum::<f64>() / lookback as f64;
            if last.volume <= average * self.params.volume_multiplier {
                return Err(FilterRejection::LowVolume {
                    volume: last.volume,
                    average,
                });
            }
        }

        if let Some(atr) = atr::last_atr(candles, self.params.atr_period) {
            if last.body() <= atr * self.params.min_body_atr {
                return Err(FilterRejection::SmallBody {
                    body: last.body(),
                    atr,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn params() -> EntryFilterParams {
        EntryFilterParams {
            enabled: true,
            trend_ema_period: 5,
            require_candle_direction: true,
            volume_multiplier: 1.15,
            volume_lookback: 3,
            min_body_atr: 0.4,
            atr_period: 3,
        }
    }

    /// Gently rising series ending in a strong green bar on high volume.
    fn rising(last_volume: f64, last_open: f64) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut candles: Vec<Candle> = (0..6)
            .map(|i| {
                let close = 100.0 + i as f64 * 0.1;
                Candle {
                    open_time: start + Duration::minutes(5 * i),
                    open: close - 0.05,
                    high: close + 0.1,
                    low: close - 0.1,
                    close,
                    volume: 10.0,
                }
            })
            .collect();
        candles.push(Candle {
            open_time: start + Duration::minutes(30),
            open: last_open,
            high: 101.6,
            low: last_open - 0.05,
            close: 101.5,
            volume: last_volume,
        });
        candles
    }

    #[test]
    fn disabled_filter_confirms_everything() {
        let filter = EntryFilter::new(EntryFilterParams::default());
        assert!(!filter.is_enabled());
        assert_eq!(filter.confirm(Side::Long, &[]), Ok(()));
    }

    #[test]
    fn strong_green_bar_confirms_long() {
        let filter = EntryFilter::new(params());
        assert_eq!(filter.confirm(Side::Long, &rising(20.0, 100.6)), Ok(()));
    }

    #[test]
    fn short_against_uptrend_is_rejected() {
        let filter = EntryFilter::new(params());
        assert!(matches!(
            filter.confirm(Side::Short, &rising(20.0, 100.6)),
            Err(FilterRejection::AgainstTrend { .. })
        ));
    }

    #[test]
    fn red_bar_fails_long_colour_check() {
        let filter = EntryFilter::new(params());
        let mut candles = rising(20.0, 100.6);
        let last = candles.last_mut().unwrap();
        last.open = 101.55;
        assert_eq!(
            filter.confirm(Side::Long, &candles),
            Err(FilterRejection::CandleDirection)
        );
    }

    #[test]
    fn quiet_volume_is_rejected() {
        let filter = EntryFilter::new(params());
        assert!(matches!(
            filter.confirm(Side::Long, &rising(11.0, 100.6)),
            Err(FilterRejection::LowVolume { .. })
        ));
    }

    #[test]
    fn doji_is_rejected() {
        let filter = EntryFilter::new(params());
        assert!(matches!(
            filter.confirm(Side::Long, &rising(20.0, 101.49)),
            Err(FilterRejection::SmallBody { .. })
        ));
    }

    #[test]
    fn short_history_is_rejected() {
        let filter = EntryFilter::new(params());
        let candles = rising(20.0, 100.6);
        assert_eq!(
            filter.confirm(Side::Long, &candles[..3]),
            Err(FilterRejection::InsufficientHistory { have: 3, need: 5 })
        );
    }
}
