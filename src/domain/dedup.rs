//! Per instrument+direction signal deduplication.

use crate::domain::position::Side;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SignalDeduplicator {
    window: Duration,
    last_admitted: HashMap<(String, Side), DateTime<Utc>>,
}

impl SignalDeduplicator {
    pub fn new(window: Duration) -> Self {
        SignalDeduplicator {
            window,
            last_admitted: HashMap::new(),
        }
    }

    /// Admits a signal unless the same instrument+direction was admitted less
    /// than `window` ago. Suppressed signals do not extend the window.
    pub fn admit(&mut self, instrument: &str, side: Side, at: DateTime<Utc>) -> bool {
        let key = (instrument.to_string(), side);
        if let Some(&previous) = self.last_admitted.get(&key) {
            if at - previous < self.window {
                return false;
            }
        }
        self.last_admitted.insert(key, at);
        true
    }
}
