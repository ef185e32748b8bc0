//! Domain error types.

use crate::domain::watchlist::WatchlistError;

/// Top-level error type for zonewatch.
#[derive(Debug, thiserror::Error)]
pub enum ZonewatchError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("market data error for {instrument}: {reason}")]
    MarketData { instrument: String, reason: String },

    #[error("no price available for {instrument}: {reason}")]
    PriceUnavailable { instrument: String, reason: String },

    #[error("notification failed: {reason}")]
    Notify { reason: String },

    #[error(transparent)]
    Watchlist(#[from] WatchlistError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ZonewatchError {
    /// Persistence failures must never be swallowed silently by the tick loop.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            ZonewatchError::Database { .. } | ZonewatchError::DatabaseQuery { .. }
        )
    }
}

impl From<&ZonewatchError> for std::process::ExitCode {
    fn from(err: &ZonewatchError) -> Self {
        let code: u8 = match err {
            ZonewatchError::Io(_) | ZonewatchError::Notify { .. } => 1,
            ZonewatchError::ConfigParse { .. }
            | ZonewatchError::ConfigMissing { .. }
            | ZonewatchError::ConfigInvalid { .. } => 2,
            ZonewatchError::Database { .. } | ZonewatchError::DatabaseQuery { .. } => 3,
            ZonewatchError::MarketData { .. } | ZonewatchError::PriceUnavailable { .. } => 4,
            ZonewatchError::Watchlist(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
