//! Exponential Moving Average, no-adjustment form.
//!
//! k = 2/(n+1), EMA[0] = C[0], then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Every point is defined; callers decide how much history is enough.

pub fn ema_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.is_empty() {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut values = Vec::with_capacity(closes.len());
    let mut ema = closes[0];
    values.push(ema);

    for &close in &closes[1..] {
        ema = close * k + ema * (1.0 - k);
        values.push(ema);
    }

    values
}

/// Last EMA value of the series, or `None` for an empty series or zero period.
pub fn last_ema(closes: &[f64], period: usize) -> Option<f64> {
    ema_series(closes, period).last().copied()
}
