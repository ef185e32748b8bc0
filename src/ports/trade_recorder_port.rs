//! Durable store for zones and closed trades.

use chrono::{DateTime, Utc};

use crate::domain::error::ZonewatchError;
use crate::domain::position::TradeRecord;
use crate::domain::zone::Zone;

pub trait TradeRecorderPort {
    fn load_zone(&self, instrument: &str) -> Result<Option<Zone>, ZonewatchError>;

    fn save_zone(
        &self,
        instrument: &str,
        zone: Zone,
        at: DateTime<Utc>,
    ) -> Result<(), ZonewatchError>;

    fn save_trade(&self, trade: &TradeRecord) -> Result<(), ZonewatchError>;
}
