//! SQLite trade recorder: persisted zones and closed trades.

use crate::domain::error::ZonewatchError;
use crate::domain::position::TradeRecord;
use crate::domain::zone::Zone;
use crate::ports::config_port::ConfigPort;
use crate::ports::trade_recorder_port::TradeRecorderPort;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

pub struct SqliteTradeRecorder {
    pool: Pool<SqliteConnectionManager>,
}

/// A persisted zone row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredZone {
    pub symbol: String,
    pub zone: Zone,
    pub updated_at: DateTime<Utc>,
}

fn query_err(e: rusqlite::Error) -> ZonewatchError {
    ZonewatchError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn text_conversion_err(
    len: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(len, rusqlite::types::Type::Text, Box::new(e))
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct LabelError(String);

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| text_conversion_err(raw.len(), e))
}

fn parse_label<T: std::str::FromStr<Err = String>>(raw: &str) -> rusqlite::Result<T> {
    raw.parse::<T>()
        .map_err(|e| text_conversion_err(raw.len(), LabelError(e)))
}

impl SqliteTradeRecorder {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ZonewatchError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| ZonewatchError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| ZonewatchError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, ZonewatchError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| ZonewatchError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, ZonewatchError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| ZonewatchError::Database {
                reason: e.to_string(),
            })
    }

    pub fn initialize_schema(&self) -> Result<(), ZonewatchError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS zone_state (
                    symbol TEXT PRIMARY KEY,
                    zone TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS trades (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    symbol TEXT NOT NULL,
                    side TEXT NOT NULL,
                    entry_price REAL NOT NULL,
                    exit_price REAL NOT NULL,
                    entry_time TEXT NOT NULL,
                    exit_time TEXT NOT NULL,
                    hold_minutes REAL NOT NULL,
                    raw_pnl_pct REAL NOT NULL,
                    net_pnl_pct REAL NOT NULL,
                    best_case_pnl_pct REAL NOT NULL,
                    exit_reason TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_trades_symbol ON trades(symbol);
                CREATE INDEX IF NOT EXISTS idx_trades_exit_time ON trades(exit_time);",
            )
            .map_err(query_err)
    }

    /// Most recent trades first.
    pub fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>, ZonewatchError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, side, entry_price, exit_price, entry_time, exit_time,
                        hold_minutes, raw_pnl_pct, net_pnl_pct, best_case_pnl_pct, exit_reason
                 FROM trades
                 ORDER BY id DESC
                 LIMIT ?1",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let side: String = row.get(1)?;
                let entry_time: String = row.get(4)?;
                let exit_time: String = row.get(5)?;
                let reason: String = row.get(10)?;
                Ok(TradeRecord {
                    instrument: row.get(0)?,
                    side: parse_label(&side)?,
                    entry_price: row.get(2)?,
                    exit_price: row.get(3)?,
                    entry_time: parse_time(&entry_time)?,
                    exit_time: parse_time(&exit_time)?,
                    hold_minutes: row.get(6)?,
                    raw_pnl_percent: row.get(7)?,
                    net_pnl_percent: row.get(8)?,
                    best_case_pnl_percent: row.get(9)?,
                    exit_reason: parse_label(&reason)?,
                })
            })
            .map_err(query_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }

    pub fn zones(&self) -> Result<Vec<StoredZone>, ZonewatchError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT symbol, zone, updated_at FROM zone_state ORDER BY symbol")
            .map_err(query_err)?;

        let rows = stmt
            .query_map([], |row| {
                let zone: String = row.get(1)?;
                let updated_at: String = row.get(2)?;
                Ok(StoredZone {
                    symbol: row.get(0)?,
                    zone: parse_label(&zone)?,
                    updated_at: parse_time(&updated_at)?,
                })
            })
            .map_err(query_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }
}

impl TradeRecorderPort for SqliteTradeRecorder {
    fn load_zone(&self, instrument: &str) -> Result<Option<Zone>, ZonewatchError> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT zone FROM zone_state WHERE symbol = ?1",
                params![instrument],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?;

        raw.map(|z| {
            z.parse::<Zone>()
                .map_err(|reason| ZonewatchError::Database { reason })
        })
        .transpose()
    }

    fn save_zone(
        &self,
        instrument: &str,
        zone: Zone,
        at: DateTime<Utc>,
    ) -> Result<(), ZonewatchError> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO zone_state (symbol, zone, updated_at) VALUES (?1, ?2, ?3)",
                params![instrument, zone.as_str(), at.to_rfc3339()],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn save_trade(&self, trade: &TradeRecord) -> Result<(), ZonewatchError> {
        self.conn()?
            .execute(
                "INSERT INTO trades (symbol, side, entry_price, exit_price, entry_time, exit_time,
                                     hold_minutes, raw_pnl_pct, net_pnl_pct, best_case_pnl_pct,
                                     exit_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    trade.instrument,
                    trade.side.as_str(),
                    trade.entry_price,
                    trade.exit_price,
                    trade.entry_time.to_rfc3339(),
                    trade.exit_time.to_rfc3339(),
                    trade.hold_minutes,
                    trade.raw_pnl_percent,
                    trade.net_pnl_percent,
                    trade.best_case_pnl_percent,
                    trade.exit_reason.as_str()
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }
}
