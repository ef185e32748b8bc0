//! RSI (Relative Strength Index) with Wilder's smoothing.
//!
//! - First average: simple mean of gains/losses over the first n deltas
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)); avg_loss == 0 gives 100.
//! Needs n + 1 closes (n deltas) before the first value exists.

pub fn last_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, pair) in closes.windows(2).enumerate() {
        let change = pair[1] - pair[0];
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };

        if i < period {
            avg_gain += gain / period as f64;
            avg_loss += loss / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        }
    }

    Some(rsi_from_averages(avg_gain, avg_loss))
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_period_plus_one_closes() {
        let closes: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        assert_eq!(last_rsi(&closes, 14), None);

        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        assert!(last_rsi(&closes, 14).is_some());
    }

    #[test]
    fn all_gains_is_100() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let rsi = last_rsi(&closes, 14).unwrap();
        assert!((rsi - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn flat_series_has_no_loss_and_maps_to_max() {
        let rsi = last_rsi(&[50.0; 20], 14).unwrap();
        assert!((rsi - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn all_losses_is_0() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let rsi = last_rsi(&closes, 14).unwrap();
        assert!(rsi.abs() < f64::EPSILON);
    }

    #[test]
    fn symmetric_moves_are_50() {
        // +1, -1 alternating with an even number of deltas in the seed window.
        let closes: Vec<f64> = (0..3).map(|i| if i % 2 == 0 { 10.0 } else { 11.0 }).collect();
        let rsi = last_rsi(&closes, 2).unwrap();
        assert!((rsi - 50.0).abs() < 1e-9);
    }

    #[test]
    fn wilder_smoothing_after_seed() {
        // period 2: deltas +2, -1, +1
        let closes = [10.0, 12.0, 11.0, 12.0];
        let seed_gain = (2.0 + 0.0) / 2.0;
        let seed_loss = (0.0 + 1.0) / 2.0;
        let gain = (seed_gain * 1.0 + 1.0) / 2.0;
        let loss = (seed_loss * 1.0 + 0.0) / 2.0;
        let expected = 100.0 - 100.0 / (1.0 + gain / loss);

        let rsi = last_rsi(&closes, 2).unwrap();
        assert!((rsi - expected).abs() < 1e-12);
    }

    #[test]
    fn stays_in_range() {
        let closes: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        let rsi = last_rsi(&closes, 14).unwrap();
        assert!((0.0..=100.0).contains(&rsi));
    }

    #[test]
    fn zero_period() {
        assert_eq!(last_rsi(&[1.0, 2.0, 3.0], 0), None);
    }
}
