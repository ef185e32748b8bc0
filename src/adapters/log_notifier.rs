//! Notifier that writes one structured log line per open and close.

use tracing::info;

use crate::domain::error::ZonewatchError;
use crate::domain::position::{OpenEvent, TradeRecord};
use crate::ports::notifier_port::NotifierPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

/// Fewer decimals for larger prices.
pub fn format_price(price: f64) -> String {
    if price < 1.0 {
        format!("{:.4}", price)
    } else if price < 10.0 {
        format!("{:.3}", price)
    } else {
        format!("{:.2}", price)
    }
}

pub fn open_message(event: &OpenEvent) -> String {
    format!(
        "OPEN {} {} @ {} (stop {}) at {}",
        event.side,
        event.instrument,
        format_price(event.entry_price),
        format_price(event.stop_loss),
        event.time.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

pub fn close_message(trade: &TradeRecord) -> String {
    format!(
        "CLOSE {} {} {} -> {} raw {:+.2}% net {:+.2}% best {:+.2}% [{}] held {:.1}m ({} -> {})",
        trade.side,
        trade.instrument,
        format_price(trade.entry_price),
        format_price(trade.exit_price),
        trade.raw_pnl_percent,
        trade.net_pnl_percent,
        trade.best_case_pnl_percent,
        trade.exit_reason,
        trade.hold_minutes,
        trade.entry_time.format("%H:%M:%S"),
        trade.exit_time.format("%H:%M:%S"),
    )
}

impl NotifierPort for LogNotifier {
    fn notify_open(&self, event: &OpenEvent) -> Result<(), ZonewatchError> {
        info!(target: "zonewatch::notify", "{}", open_message(event));
        Ok(())
    }

    fn notify_close(&self, trade: &TradeRecord) -> Result<(), ZonewatchError> {
        info!(target: "zonewatch::notify", "{}", close_message(trade));
        Ok(())
    }
}
