//! Configuration validation.
//!
//! Rejects bad values before any adapter is opened or the engine starts.

use crate::domain::candle::BarInterval;
use crate::domain::error::ZonewatchError;
use crate::domain::risk::RiskProfile;
use crate::domain::watchlist::parse_symbols;
use crate::ports::config_port::ConfigPort;

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), ZonewatchError> {
    validate_market(config)?;
    validate_strategy(config)?;
    validate_filters(config)?;
    validate_risk(config)?;
    validate_engine(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> ZonewatchError {
    ZonewatchError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_market(config: &dyn ConfigPort) -> Result<(), ZonewatchError> {
    let symbols = config.require_string("market", "symbols")?;
    parse_symbols(&symbols)?;

    if let Some(interval) = config.get_string("market", "interval") {
        interval
            .parse::<BarInterval>()
            .map_err(|e| invalid("market", "interval", e.to_string()))?;
    }

    if config.get_int("market", "candle_count", 500) < 2 {
        return Err(invalid("market", "candle_count", "candle_count must be at least 2"));
    }
    Ok(())
}

fn validate_strategy(config: &dyn ConfigPort) -> Result<(), ZonewatchError> {
    let indicator = config
        .get_string("strategy", "indicator")
        .unwrap_or_else(|| "ema".to_string());
    let candle_count = config.get_int("market", "candle_count", 500);

    match indicator.trim().to_ascii_lowercase().as_str() {
        "ema" => {
            let fast = config.get_int("strategy", "ema_fast", 20);
            let slow = config.get_int("strategy", "ema_slow", 50);
            if fast < 1 {
                return Err(invalid("strategy", "ema_fast", "ema_fast must be at least 1"));
            }
            if fast >= slow {
                return Err(invalid(
                    "strategy",
                    "ema_fast",
                    "ema_fast must be less than ema_slow",
                ));
            }
            if candle_count < slow {
                return Err(invalid(
                    "market",
                    "candle_count",
                    format!("candle_count must cover ema_slow ({slow})"),
                ));
            }
        }
        "rsi" => {
            let period = config.get_int("strategy", "rsi_period", 14);
            if period < 1 {
                return Err(invalid("strategy", "rsi_period", "rsi_period must be at least 1"));
            }
            if candle_count < period + 1 {
                return Err(invalid(
                    "market",
                    "candle_count",
                    format!("candle_count must exceed rsi_period ({period})"),
                ));
            }
            let oversold = config.get_double("strategy", "rsi_oversold", 30.0);
            let overbought = config.get_double("strategy", "rsi_overbought", 70.0);
            if !(0.0..=100.0).contains(&oversold) || !(0.0..=100.0).contains(&overbought) {
                return Err(invalid(
                    "strategy",
                    "rsi_oversold",
                    "thresholds must lie within 0-100",
                ));
            }
            if oversold >= overbought {
                return Err(invalid(
                    "strategy",
                    "rsi_oversold",
                    "rsi_oversold must be below rsi_overbought",
                ));
            }
            let hysteresis = config.get_double("strategy", "hysteresis", 0.5);
            if hysteresis < 0.0 || oversold + hysteresis >= overbought - hysteresis {
                return Err(invalid(
                    "strategy",
                    "hysteresis",
                    "hysteresis must be non-negative and leave a NORMAL band",
                ));
            }
            let extreme = config.get_double("strategy", "rsi_extreme_exit", 83.0);
            if extreme != 0.0 && !(50.0..=100.0).contains(&extreme) {
                return Err(invalid(
                    "strategy",
                    "rsi_extreme_exit",
                    "rsi_extreme_exit must be 0 (off) or between 50 and 100",
                ));
            }
        }
        other => {
            return Err(invalid(
                "strategy",
                "indicator",
                format!("unknown indicator '{other}' (expected ema or rsi)"),
            ));
        }
    }

    if config.get_int("strategy", "dedup_window_secs", 30) < 0 {
        return Err(invalid(
            "strategy",
            "dedup_window_secs",
            "dedup_window_secs must be non-negative",
        ));
    }
    Ok(())
}

fn validate_filters(config: &dyn ConfigPort) -> Result<(), ZonewatchError> {
    if !config.get_bool("filters", "enabled", false) {
        return Ok(());
    }
    for (key, default) in [
        ("trend_ema_period", 200),
        ("volume_lookback", 20),
        ("atr_period", 14),
    ] {
        if config.get_int("filters", key, default) < 1 {
            return Err(invalid("filters", key, format!("{key} must be at least 1")));
        }
    }
    for (key, default) in [("volume_multiplier", 1.15), ("min_body_atr", 0.4)] {
        if config.get_double("filters", key, default) < 0.0 {
            return Err(invalid("filters", key, format!("{key} must be non-negative")));
        }
    }
    Ok(())
}

fn validate_risk(config: &dyn ConfigPort) -> Result<(), ZonewatchError> {
    if let Some(profile) = config.get_string("risk", "profile") {
        profile
            .parse::<RiskProfile>()
            .map_err(|reason| invalid("risk", "profile", reason))?;
    }

    for (key, default) in [
        ("commission_pct", 0.1),
        ("break_even_trigger_pct", 0.45),
        ("break_even_offset_pct", 0.02),
        ("emergency_stop_pct", 2.0),
    ] {
        if config.get_double("risk", key, default) < 0.0 {
            return Err(invalid("risk", key, format!("{key} must be non-negative")));
        }
    }
    for (key, default) in [
        ("max_stop_loss_pct", 1.5),
        ("fallback_stop_loss_pct", 1.2),
        ("trailing_activation_pct", 0.7),
    ] {
        if config.get_double("risk", key, default) <= 0.0 {
            return Err(invalid("risk", key, format!("{key} must be positive")));
        }
    }

    let callback = config.get_double("risk", "trailing_callback", 0.7);
    if callback <= 0.0 || callback > 1.0 {
        return Err(invalid(
            "risk",
            "trailing_callback",
            "trailing_callback must be in (0, 1]",
        ));
    }

    let trigger = config.get_double("risk", "break_even_trigger_pct", 0.45);
    let offset = config.get_double("risk", "break_even_offset_pct", 0.02);
    if offset >= trigger {
        return Err(invalid(
            "risk",
            "break_even_offset_pct",
            "break_even_offset_pct must be below break_even_trigger_pct",
        ));
    }

    if config.get_int("risk", "stop_loss_lookback", 5) < 1 {
        return Err(invalid(
            "risk",
            "stop_loss_lookback",
            "stop_loss_lookback must be at least 1",
        ));
    }
    if config.get_int("risk", "max_open_positions", 0) < 0 {
        return Err(invalid(
            "risk",
            "max_open_positions",
            "max_open_positions must be non-negative (0 = no cap)",
        ));
    }
    Ok(())
}

fn validate_engine(config: &dyn ConfigPort) -> Result<(), ZonewatchError> {
    let tick = config.get_int("engine", "tick_secs", 5);
    if !(1..=10).contains(&tick) {
        return Err(invalid("engine", "tick_secs", "tick_secs must be between 1 and 10"));
    }
    if config.get_int("engine", "persist_retries", 3) < 1 {
        return Err(invalid(
            "engine",
            "persist_retries",
            "persist_retries must be at least 1",
        ));
    }
    if config.get_int("engine", "persist_backoff_ms", 200) < 0 {
        return Err(invalid(
            "engine",
            "persist_backoff_ms",
            "persist_backoff_ms must be non-negative",
        ));
    }
    Ok(())
}
