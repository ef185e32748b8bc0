//! Engine settings assembled from a [`ConfigPort`].

use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::domain::candle::BarInterval;
use crate::domain::config_validation::validate_engine_config;
use crate::domain::entry_filter::EntryFilterParams;
use crate::domain::error::ZonewatchError;
use crate::domain::indicator::IndicatorKind;
use crate::domain::risk::{RiskParams, RiskProfile};
use crate::domain::watchlist::parse_symbols;
use crate::domain::zone::ZoneRule;
use crate::ports::config_port::ConfigPort;

/// How hard to try before giving up on a store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistPolicy {
    pub attempts: u32,
    pub backoff: StdDuration,
}

impl Default for PersistPolicy {
    fn default() -> Self {
        PersistPolicy {
            attempts: 3,
            backoff: StdDuration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub symbols: Vec<String>,
    pub interval: BarInterval,
    pub candle_count: usize,
    pub indicator: IndicatorKind,
    pub zone_rule: ZoneRule,
    pub dedup_window: Duration,
    pub filters: EntryFilterParams,
    pub risk: RiskParams,
    pub commission_pct: f64,
    pub max_open_positions: usize,
    pub tick: StdDuration,
    pub persist: PersistPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            symbols: Vec::new(),
            interval: BarInterval::minutes(5),
            candle_count: 500,
            indicator: IndicatorKind::DualEma { fast: 20, slow: 50 },
            zone_rule: ZoneRule::Crossover,
            dedup_window: Duration::seconds(30),
            filters: EntryFilterParams::default(),
            risk: RiskParams::default(),
            commission_pct: 0.1,
            max_open_positions: 0,
            tick: StdDuration::from_secs(5),
            persist: PersistPolicy::default(),
        }
    }
}

impl EngineSettings {
    /// Validates then builds; the same config always yields the same settings.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ZonewatchError> {
        validate_engine_config(config)?;

        let symbols = parse_symbols(&config.require_string("market", "symbols")?)?;

        let interval = match config.get_string("market", "interval") {
            Some(s) => s
                .parse::<BarInterval>()
                .map_err(|e| ZonewatchError::ConfigInvalid {
                    section: "market".into(),
                    key: "interval".into(),
                    reason: e.to_string(),
                })?,
            None => BarInterval::minutes(5),
        };

        let use_rsi = config
            .get_string("strategy", "indicator")
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("rsi"));

        let (indicator, zone_rule, oscillator_extreme) = if use_rsi {
            let extreme = config.get_double("strategy", "rsi_extreme_exit", 83.0);
            (
                IndicatorKind::Oscillator {
                    period: config.get_int("strategy", "rsi_period", 14) as usize,
                },
                ZoneRule::Oscillator {
                    oversold: config.get_double("strategy", "rsi_oversold", 30.0),
                    overbought: config.get_double("strategy", "rsi_overbought", 70.0),
                    hysteresis: config.get_double("strategy", "hysteresis", 0.5),
                },
                (extreme > 0.0).then_some(extreme),
            )
        } else {
            (
                IndicatorKind::DualEma {
                    fast: config.get_int("strategy", "ema_fast", 20) as usize,
                    slow: config.get_int("strategy", "ema_slow", 50) as usize,
                },
                ZoneRule::Crossover,
                None,
            )
        };

        let profile = match config.get_string("risk", "profile") {
            Some(s) => s.parse::<RiskProfile>().map_err(|reason| ZonewatchError::ConfigInvalid {
                section: "risk".into(),
                key: "profile".into(),
                reason,
            })?,
            None => RiskProfile::Full,
        };

        let filters = EntryFilterParams {
            enabled: config.get_bool("filters", "enabled", false),
            trend_ema_period: config.get_int("filters", "trend_ema_period", 200) as usize,
            require_candle_direction: config.get_bool("filters", "require_candle_direction", true),
            volume_multiplier: config.get_double("filters", "volume_multiplier", 1.15),
            volume_lookback: config.get_int("filters", "volume_lookback", 20) as usize,
            min_body_atr: config.get_double("filters", "min_body_atr", 0.4),
            atr_period: config.get_int("filters", "atr_period", 14) as usize,
        };

        let risk = RiskParams {
            profile,
            max_stop_loss_pct: config.get_double("risk", "max_stop_loss_pct", 1.5),
            fallback_stop_loss_pct: config.get_double("risk", "fallback_stop_loss_pct", 1.2),
            stop_loss_lookback: config.get_int("risk", "stop_loss_lookback", 5) as usize,
            break_even_trigger_pct: config.get_double("risk", "break_even_trigger_pct", 0.45),
            break_even_offset_pct: config.get_double("risk", "break_even_offset_pct", 0.02),
            trailing_activation_pct: config.get_double("risk", "trailing_activation_pct", 0.7),
            trailing_callback: config.get_double("risk", "trailing_callback", 0.7),
            emergency_stop_pct: config.get_double("risk", "emergency_stop_pct", 2.0),
            oscillator_extreme,
        };

        Ok(EngineSettings {
            symbols,
            interval,
            candle_count: config.get_int("market", "candle_count", 500) as usize,
            indicator,
            zone_rule,
            dedup_window: Duration::seconds(config.get_int("strategy", "dedup_window_secs", 30)),
            filters,
            risk,
            commission_pct: config.get_double("risk", "commission_pct", 0.1),
            max_open_positions: config.get_int("risk", "max_open_positions", 0) as usize,
            tick: StdDuration::from_secs(config.get_int("engine", "tick_secs", 5) as u64),
            persist: PersistPolicy {
                attempts: config.get_int("engine", "persist_retries", 3) as u32,
                backoff: StdDuration::from_millis(
                    config.get_int("engine", "persist_backoff_ms", 200) as u64,
                ),
            },
        })
    }

    /// Candles requested per instrument per tick.
    pub fn history_len(&self) -> usize {
        let mut need = self.candle_count.max(self.indicator.min_samples());
        if self.filters.enabled {
            let p = &self.filters;
            need = need
                .max(p.trend_ema_period)
                .max(p.volume_lookback + 1)
                .max(p.atr_period + 1);
        }
        need
    }
}
