//! CLI integration tests against real files on disk.
//!
//! Tests cover:
//! - `validate` on good, broken and missing configs
//! - `run --fast` over a CSV replay into a SQLite store
//! - `trades` and `zones` listings after a run
//! - A second run resuming from the persisted zone

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tempfile::TempDir;
use zonewatch::adapters::file_config_adapter::FileConfigAdapter;
use zonewatch::adapters::sqlite_adapter::SqliteTradeRecorder;
use zonewatch::cli::{self, Cli, Command};
use zonewatch::domain::position::{ExitReason, Side};
use zonewatch::domain::zone::Zone;

// ExitCode doesn't implement PartialEq, so compare the Debug form.
fn assert_exit(code: ExitCode, expected: u8) {
    assert_eq!(
        format!("{code:?}"),
        format!("{:?}", ExitCode::from(expected)),
        "unexpected exit code"
    );
}

/// Rising, falling, then rising again under EMA(2,3): one SHORT opened at
/// 10.0 and flipped LONG at 10.3.
const CLOSES: [f64; 10] = [10.0, 10.1, 10.2, 10.3, 10.0, 9.7, 9.4, 9.8, 10.3, 10.8];

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();
        write_series(&data.join("BTCUSDT.csv"), &CLOSES);

        let config = dir.path().join("zonewatch.ini");
        fs::write(&config, ini(dir.path())).unwrap();
        Workspace { dir, config }
    }

    fn recorder(&self) -> SqliteTradeRecorder {
        let config = FileConfigAdapter::from_file(&self.config).unwrap();
        SqliteTradeRecorder::from_config(&config).unwrap()
    }

    fn run(&self) -> ExitCode {
        cli::run(Cli {
            command: Command::Run {
                config: self.config.clone(),
                fast: true,
                max_ticks: None,
            },
        })
    }
}

fn ini(root: &Path) -> String {
    format!(
        r#"
[market]
symbols = btcusdt
interval = 5m
candle_count = 10
warmup_bars = 3
data_dir = {data}

[strategy]
indicator = ema
ema_fast = 2
ema_slow = 3
dedup_window_secs = 30

[risk]
profile = signal_only
commission_pct = 0.1

[engine]
tick_secs = 1
persist_backoff_ms = 0

[sqlite]
path = {db}

[logging]
level = warn
"#,
        data = root.join("data").display(),
        db = root.join("zonewatch.db").display(),
    )
}

fn write_series(path: &Path, closes: &[f64]) {
    let mut body = String::from("timestamp,open,high,low,close,volume\n");
    for (i, close) in closes.iter().enumerate() {
        body.push_str(&format!(
            "2024-05-01 10:{:02}:00,{close},{close},{close},{close},250\n",
            i * 5
        ));
    }
    fs::write(path, body).unwrap();
}

mod validate {
    use super::*;

    #[test]
    fn valid_config_succeeds() {
        let ws = Workspace::new();
        let code = cli::run(Cli {
            command: Command::Validate {
                config: ws.config.clone(),
            },
        });
        assert_exit(code, 0);
    }

    #[test]
    fn missing_file_is_config_error() {
        let code = cli::run(Cli {
            command: Command::Validate {
                config: PathBuf::from("/nonexistent/zonewatch.ini"),
            },
        });
        assert_exit(code, 2);
    }

    #[test]
    fn inverted_emas_are_rejected() {
        let ws = Workspace::new();
        let broken = ini(ws.dir.path()).replace("ema_fast = 2", "ema_fast = 5");
        fs::write(&ws.config, broken).unwrap();

        let code = cli::run(Cli {
            command: Command::Validate {
                config: ws.config.clone(),
            },
        });
        assert_exit(code, 2);
    }

    #[test]
    fn duplicate_symbols_are_rejected() {
        let ws = Workspace::new();
        let broken =
            ini(ws.dir.path()).replace("symbols = btcusdt", "symbols = btcusdt, BTCUSDT");
        fs::write(&ws.config, broken).unwrap();

        let code = cli::run(Cli {
            command: Command::Validate {
                config: ws.config.clone(),
            },
        });
        assert_exit(code, 5);
    }
}

mod run {
    use super::*;

    #[test]
    fn replay_records_flip_trade() {
        let ws = Workspace::new();
        assert_exit(ws.run(), 0);

        let trades = ws.recorder().recent_trades(10).unwrap();
        assert_eq!(trades.len(), 1);
        let trade = &trades[0];
        assert_eq!(trade.instrument, "BTCUSDT");
        assert_eq!(trade.side, Side::Short);
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert!((trade.entry_price - 10.0).abs() < 1e-9);
        assert!((trade.exit_price - 10.3).abs() < 1e-9);
        assert!((trade.raw_pnl_percent + 3.0).abs() < 1e-9);
        assert!((trade.net_pnl_percent + 3.1).abs() < 1e-9);
        assert!((trade.hold_minutes - 20.0).abs() < 1e-9);

        let zones = ws.recorder().zones().unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].symbol, "BTCUSDT");
        assert_eq!(zones[0].zone, Zone::Above);
    }

    #[test]
    fn second_run_resumes_from_stored_zone() {
        let ws = Workspace::new();
        assert_exit(ws.run(), 0);
        assert_exit(ws.run(), 0);

        // The stored ABOVE zone means the opening bars do not re-prime, and
        // the same crossover sequence produces the same flip again.
        let trades = ws.recorder().recent_trades(10).unwrap();
        assert_eq!(trades.len(), 2);
        assert!(trades.iter().all(|t| t.side == Side::Short));
    }

    #[test]
    fn max_ticks_stops_early() {
        let ws = Workspace::new();
        let code = cli::run(Cli {
            command: Command::Run {
                config: ws.config.clone(),
                fast: true,
                max_ticks: Some(3),
            },
        });
        assert_exit(code, 0);

        // Three ticks reach the SHORT entry but not the flip.
        assert!(ws.recorder().recent_trades(10).unwrap().is_empty());
        assert_eq!(ws.recorder().zones().unwrap()[0].zone, Zone::Below);
    }

    #[test]
    fn missing_data_dir_is_config_error() {
        let ws = Workspace::new();
        let broken = ini(ws.dir.path()).replace("data_dir", "# data_dir");
        fs::write(&ws.config, broken).unwrap();
        assert_exit(ws.run(), 2);
    }

    #[test]
    fn malformed_csv_is_market_data_error() {
        let ws = Workspace::new();
        fs::write(
            ws.dir.path().join("data").join("BTCUSDT.csv"),
            "timestamp,open,high,low,close,volume\nyesterday,1,1,1,1,1\n",
        )
        .unwrap();
        assert_exit(ws.run(), 4);
    }
}

mod listings {
    use super::*;

    #[test]
    fn trades_and_zones_after_run() {
        let ws = Workspace::new();
        assert_exit(ws.run(), 0);

        let trades = cli::run(Cli {
            command: Command::Trades {
                config: ws.config.clone(),
                limit: 5,
            },
        });
        assert_exit(trades, 0);

        let zones = cli::run(Cli {
            command: Command::Zones {
                config: ws.config.clone(),
            },
        });
        assert_exit(zones, 0);
    }

    #[test]
    fn listings_on_fresh_database() {
        let ws = Workspace::new();
        let trades = cli::run(Cli {
            command: Command::Trades {
                config: ws.config.clone(),
                limit: 5,
            },
        });
        assert_exit(trades, 0);
        assert!(ws.recorder().zones().unwrap().is_empty());
    }
}
