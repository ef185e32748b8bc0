//! Outbound notifications for opens and closes.

use crate::domain::error::ZonewatchError;
use crate::domain::position::{OpenEvent, TradeRecord};

pub trait NotifierPort {
    fn notify_open(&self, event: &OpenEvent) -> Result<(), ZonewatchError>;

    fn notify_close(&self, trade: &TradeRecord) -> Result<(), ZonewatchError>;
}
