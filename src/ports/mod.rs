//! Port traits for every external collaborator of the engine.

pub mod clock_port;
pub mod config_port;
pub mod market_data_port;
pub mod notifier_port;
pub mod trade_recorder_port;
