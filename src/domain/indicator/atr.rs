//! Average True Range as a simple mean of the last n true ranges.

use crate::domain::candle::Candle;

pub fn last_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let ranges: Vec<f64> = candles
        .windows(2)
        .map(|pair| pair[1].true_range(pair[0].close))
        .collect();

    let tail = &ranges[ranges.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}
