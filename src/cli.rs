//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::error::ZonewatchError;
use crate::domain::settings::EngineSettings;
use crate::logging::init_logging;
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "zonewatch", about = "Indicator zone signals with position risk management")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the engine over the configured replay data
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Do not sleep between ticks
        #[arg(long)]
        fast: bool,
        /// Stop after this many ticks
        #[arg(long)]
        max_ticks: Option<u64>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List recently recorded trades
    Trades {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// List persisted zones
    Zones {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Run {
            config,
            fast,
            max_ticks,
        } => run_engine(&config, fast, max_ticks),
        Command::Validate { config } => run_validate(&config),
        Command::Trades { config, limit } => run_trades(&config, limit),
        Command::Zones { config } => run_zones(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ZonewatchError> {
    let config = FileConfigAdapter::from_file(path)?;
    init_logging(config.get_string("logging", "level").as_deref());
    Ok(config)
}

fn run_validate(config_path: &PathBuf) -> Result<(), ZonewatchError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let settings = EngineSettings::from_config(&config)?;
    config.require_string("market", "data_dir")?;
    config.require_string("sqlite", "path")?;

    eprintln!("Config validated successfully");
    eprintln!("  symbols:   {}", settings.symbols.join(", "));
    eprintln!("  interval:  {}", settings.interval);
    eprintln!("  indicator: {}", settings.indicator);
    eprintln!("  zones:     {:?}", settings.zone_rule);
    eprintln!("  risk:      {}", settings.risk.profile);
    eprintln!("  tick:      {}s", settings.tick.as_secs());
    if settings.filters.enabled {
        eprintln!("  entry filters enabled");
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
fn run_engine(
    config_path: &PathBuf,
    fast: bool,
    max_ticks: Option<u64>,
) -> Result<(), ZonewatchError> {
    use crate::adapters::csv_adapter::CsvReplayAdapter;
    use crate::adapters::log_notifier::LogNotifier;
    use crate::adapters::sqlite_adapter::SqliteTradeRecorder;
    use crate::domain::engine::Engine;
    use crate::domain::scheduler::Scheduler;
    use crate::ports::clock_port::ClockPort;
    use std::ops::ControlFlow;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tracing::{debug, info, warn};

    let config = load_config(config_path)?;
    let settings = EngineSettings::from_config(&config)?;

    let recorder = SqliteTradeRecorder::from_config(&config)?;
    recorder.initialize_schema()?;
    let replay = CsvReplayAdapter::from_config(&config, &settings.symbols, settings.interval)?;
    let clock: &dyn ClockPort = &replay;
    let notifier = LogNotifier;

    let period = if fast { Duration::ZERO } else { settings.tick };
    let scheduler = Scheduler::new(period).with_max_ticks(max_ticks);
    let shutdown = scheduler.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "could not install Ctrl-C handler");
    }

    let mut engine = Engine::new(settings, &replay, &recorder, &notifier);
    engine.restore_zones()?;

    info!(
        symbols = engine.settings().symbols.len(),
        indicator = %engine.settings().indicator,
        interval = %engine.settings().interval,
        bars = replay.remaining() + 1,
        "engine started"
    );

    let mut trades = 0;
    let ticks = scheduler.run(|n| {
        let report = engine.tick(clock.now());
        trades += report.closed.len();
        debug!(tick = n, at = %report.at, skipped = report.skipped.len(), "tick");
        if report.persistence_failures > 0 {
            warn!(tick = n, failures = report.persistence_failures, "persistence failures this tick");
        }
        if replay.advance() {
            ControlFlow::Continue(())
        } else {
            info!("replay exhausted");
            ControlFlow::Break(())
        }
    });

    let snapshot = engine.snapshot();
    for position in &snapshot.positions {
        warn!(
            symbol = %position.instrument,
            side = %position.side,
            entry = position.entry_price,
            "open position discarded at shutdown"
        );
    }
    info!(ticks, trades, open = snapshot.positions.len(), "engine stopped");
    Ok(())
}

#[cfg(feature = "sqlite")]
fn open_recorder(
    config_path: &PathBuf,
) -> Result<crate::adapters::sqlite_adapter::SqliteTradeRecorder, ZonewatchError> {
    let config = load_config(config_path)?;
    let recorder = crate::adapters::sqlite_adapter::SqliteTradeRecorder::from_config(&config)?;
    recorder.initialize_schema()?;
    Ok(recorder)
}

#[cfg(feature = "sqlite")]
fn run_trades(config_path: &PathBuf, limit: usize) -> Result<(), ZonewatchError> {
    let trades = open_recorder(config_path)?.recent_trades(limit)?;
    if trades.is_empty() {
        eprintln!("No trades recorded");
        return Ok(());
    }

    println!(
        "{:<12} {:<5} {:>12} {:>12} {:>8} {:>8} {:>8} {:<18} {:>8}  {}",
        "SYMBOL", "SIDE", "ENTRY", "EXIT", "RAW%", "NET%", "BEST%", "REASON", "HOLD(m)", "EXIT TIME"
    );
    for t in &trades {
        println!(
            "{:<12} {:<5} {:>12.4} {:>12.4} {:>+8.2} {:>+8.2} {:>+8.2} {:<18} {:>8.1}  {}",
            t.instrument,
            t.side,
            t.entry_price,
            t.exit_price,
            t.raw_pnl_percent,
            t.net_pnl_percent,
            t.best_case_pnl_percent,
            t.exit_reason,
            t.hold_minutes,
            t.exit_time.to_rfc3339()
        );
    }

    let wins = trades.iter().filter(|t| t.is_win()).count();
    let net: f64 = trades.iter().map(|t| t.net_pnl_percent).sum();
    println!(
        "\n{} trades, {} wins ({:.1}%), net {:+.2}%",
        trades.len(),
        wins,
        wins as f64 / trades.len() as f64 * 100.0,
        net
    );
    Ok(())
}

#[cfg(feature = "sqlite")]
fn run_zones(config_path: &PathBuf) -> Result<(), ZonewatchError> {
    let zones = open_recorder(config_path)?.zones()?;
    if zones.is_empty() {
        eprintln!("No zones persisted");
        return Ok(());
    }
    for z in &zones {
        println!("{:<12} {:<10} {}", z.symbol, z.zone, z.updated_at.to_rfc3339());
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_required(command: &str) -> Result<(), ZonewatchError> {
    Err(ZonewatchError::Database {
        reason: format!("sqlite feature is required for {command}"),
    })
}

#[cfg(not(feature = "sqlite"))]
fn run_engine(_: &PathBuf, _: bool, _: Option<u64>) -> Result<(), ZonewatchError> {
    sqlite_required("run")
}

#[cfg(not(feature = "sqlite"))]
fn run_trades(_: &PathBuf, _: usize) -> Result<(), ZonewatchError> {
    sqlite_required("trades")
}

#[cfg(not(feature = "sqlite"))]
fn run_zones(_: &PathBuf) -> Result<(), ZonewatchError> {
    sqlite_required("zones")
}
