//! Core domain types and logic. Nothing in here performs I/O directly.

pub mod candle;
pub mod config_validation;
pub mod dedup;
pub mod engine;
pub mod entry_filter;
pub mod error;
pub mod indicator;
pub mod position;
pub mod position_manager;
pub mod risk;
pub mod scheduler;
pub mod settings;
pub mod watchlist;
pub mod zone;
