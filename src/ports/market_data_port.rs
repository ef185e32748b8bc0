//! Candle source port.

use crate::domain::candle::{BarInterval, Candle};
use crate::domain::error::ZonewatchError;

pub trait MarketDataPort {
    /// Up to `count` most recent candles, oldest first. A short or empty series
    /// is a valid answer, not an error.
    fn get_candles(
        &self,
        instrument: &str,
        interval: BarInterval,
        count: usize,
    ) -> Result<Vec<Candle>, ZonewatchError>;

    fn get_last_price(&self, instrument: &str) -> Result<f64, ZonewatchError>;
}
